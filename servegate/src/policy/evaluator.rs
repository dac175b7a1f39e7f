use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace};

use super::decision::{Check, Decision};
use crate::addr::parse_remote_addr;
use crate::error::EvalError;
use crate::exec::{trim_one_newline, ProcessRunner};
use crate::geoip::{GeoIpError, GeoIpLookup};
use crate::ja3::ja3_digest;
use crate::metrics;
use crate::request::RequestView;
use crate::rules::{IpEntry, RuleSet};
use crate::state::StateTracker;

/// Result of a single sub-check.
enum Step {
    Pass,
    /// Fails this check; the remaining checks still run.
    Fail(String),
    /// Denies the whole request right away.
    Block(String),
}

/// Decides whether a request may be served under an effective rule set.
///
/// Holds only shared handles to its collaborators and no per-request state,
/// so one evaluator serves any number of concurrent requests.
#[derive(Clone)]
pub struct PolicyEvaluator {
    state: Arc<dyn StateTracker>,
    geoip: Arc<dyn GeoIpLookup>,
    runner: Arc<dyn ProcessRunner>,
}

impl PolicyEvaluator {
    pub fn new(state: Arc<dyn StateTracker>, geoip: Arc<dyn GeoIpLookup>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { state, geoip, runner }
    }

    pub async fn should_host(&self, rules: &RuleSet, req: &RequestView) -> bool {
        self.evaluate(rules, req).await.is_allow()
    }

    pub async fn evaluate(&self, rules: &RuleSet, req: &RequestView) -> Decision {
        if rules.spec.not_serving {
            trace!("not serving");
            return Decision::deny(Check::NotServing, "route is not serving");
        }

        let client = parse_remote_addr(&req.remote_addr);
        let mut failed: Vec<(Check, String)> = Vec::new();

        let steps = [
            (Check::UserAgent, Ok(self.user_agent(rules, req))),
            (Check::UserAgentBlacklist, Ok(self.user_agent_blacklist(rules, req))),
            (Check::IpRange, self.ip_range(rules, client)),
            (Check::IpBlacklist, Ok(self.ip_blacklist(rules, client))),
            (Check::Method, Ok(self.method(rules, req))),
            (Check::Headers, Ok(self.headers(rules, req))),
            (Check::Ja3, Ok(self.ja3(rules, req))),
        ];
        for (check, res) in steps {
            if let Some(d) = tally(&mut failed, check, res) {
                return d;
            }
        }

        // Exec runs even when an earlier check already failed.
        if let Some(d) = tally(&mut failed, Check::Exec, self.exec(rules, req).await) {
            return d;
        }

        let steps = [
            (Check::ServeLimit, self.serve_limit(rules, req)),
            (Check::Prereq, Ok(self.prereq(rules, client))),
        ];
        for (check, res) in steps {
            if let Some(d) = tally(&mut failed, check, res) {
                return d;
            }
        }

        if let Some(d) = self.geoip(rules, client, &mut failed) {
            return d;
        }

        match failed.into_iter().next() {
            None => Decision::Allow,
            Some((check, reason)) => Decision::deny(check, reason),
        }
    }

    fn user_agent(&self, rules: &RuleSet, req: &RequestView) -> Step {
        if rules.authorized_user_agents.is_empty() {
            trace!("no authorized user agents");
            return Step::Pass;
        }
        let ua = req.user_agent();
        let mut matched = false;
        for re in &rules.authorized_user_agents {
            if re.is_match(&ua) {
                debug!(user_agent = %re.as_str(), "matched user agent");
                matched = true;
            } else {
                trace!(user_agent = %re.as_str(), "did not match authorized user agent");
            }
        }
        if matched {
            Step::Pass
        } else {
            Step::Fail(format!("user agent {ua:?} not authorized"))
        }
    }

    fn user_agent_blacklist(&self, rules: &RuleSet, req: &RequestView) -> Step {
        let ua = req.user_agent();
        for re in &rules.blacklist_user_agents {
            if re.is_match(&ua) {
                debug!(user_agent = %re.as_str(), "blacklisted user agent");
                return Step::Block(format!("user agent matches blacklist {}", re.as_str()));
            }
            trace!(user_agent = %re.as_str(), "did not match blacklisted user agent");
        }
        Step::Pass
    }

    fn ip_range(&self, rules: &RuleSet, client: Option<IpAddr>) -> Result<Step, EvalError> {
        if rules.authorized_ip_range.is_empty() {
            trace!("no authorized IP ranges");
            return Ok(Step::Pass);
        }
        let mut matched = false;
        for entry in &rules.authorized_ip_range {
            if let IpEntry::BadCidr(raw) = entry {
                debug!(ip = %raw, "could not parse IP range");
                return Err(EvalError::BadCidr(raw.clone()));
            }
            if entry.matches(client) {
                debug!(ip = ?entry, "matched authorized IP range");
                matched = true;
            } else {
                trace!(ip = ?entry, "did not match authorized IP range");
            }
        }
        Ok(if matched {
            Step::Pass
        } else {
            Step::Fail(format!("client {} outside authorized IP ranges", display_client(client)))
        })
    }

    fn ip_blacklist(&self, rules: &RuleSet, client: Option<IpAddr>) -> Step {
        for entry in &rules.blacklist_ip_range {
            if entry.matches(client) {
                debug!(ip = ?entry, "matched blacklisted IP range");
                return Step::Block(format!("client {} is blacklisted", display_client(client)));
            }
            trace!(ip = ?entry, "did not match blacklisted IP range");
        }
        Step::Pass
    }

    fn method(&self, rules: &RuleSet, req: &RequestView) -> Step {
        let allowed = &rules.spec.authorized_methods;
        if allowed.is_empty() {
            trace!("no authorized methods");
            return Step::Pass;
        }
        if allowed.iter().any(|m| m == req.method()) {
            debug!(method = %req.method(), "matched HTTP method");
            Step::Pass
        } else {
            Step::Fail(format!("method {} not authorized", req.method()))
        }
    }

    /// Any one configured header carrying its required value satisfies the
    /// whole map.
    fn headers(&self, rules: &RuleSet, req: &RequestView) -> Step {
        let required = &rules.spec.authorized_headers;
        if required.is_empty() {
            trace!("no authorized headers");
            return Step::Pass;
        }
        let mut matched = false;
        for (k, v) in required {
            if req.header(k) == v.as_str() {
                debug!(header_key = %k, header_value = %v, "matched header");
                matched = true;
            } else {
                trace!(header_key = %k, header_value = %v, "did not match header");
            }
        }
        if matched {
            Step::Pass
        } else {
            Step::Fail("no authorized header present".to_string())
        }
    }

    fn ja3(&self, rules: &RuleSet, req: &RequestView) -> Step {
        let allowed = &rules.spec.authorized_ja3;
        if allowed.is_empty() {
            trace!("no authorized JA3 signatures");
            return Step::Pass;
        }
        let digest = ja3_digest(&req.ja3_fingerprint);
        let mut matched = false;
        for j in allowed {
            if *j == digest {
                debug!(target_ja3 = %j, req_ja3 = %digest, "authorized JA3 signature matched");
                matched = true;
            } else {
                trace!(target_ja3 = %j, req_ja3 = %digest, "authorized JA3 signature did not match");
            }
        }
        if matched {
            Step::Pass
        } else {
            Step::Fail(format!("JA3 {digest} not authorized"))
        }
    }

    async fn exec(&self, rules: &RuleSet, req: &RequestView) -> Result<Step, EvalError> {
        let spec = &rules.spec.exec;
        if !spec.is_configured() {
            return Ok(Step::Pass);
        }

        let out = match self.runner.run(Path::new(&spec.script_path), req.raw_dump()).await {
            Ok(out) => out,
            Err(e) => {
                debug!(script = %spec.script_path, error = %e, "exec check failed to run");
                metrics::counters::inc_exec("error");
                return Err(e.into());
            }
        };

        let out = trim_one_newline(&out);
        if out == spec.output {
            debug!(script = %spec.script_path, "exec output matched");
            metrics::counters::inc_exec("match");
            Ok(Step::Pass)
        } else {
            debug!(script = %spec.script_path, output = %out, "exec output did not match");
            metrics::counters::inc_exec("mismatch");
            Ok(Step::Fail(format!("{} printed {out:?}", spec.script_path)))
        }
    }

    fn serve_limit(&self, rules: &RuleSet, req: &RequestView) -> Result<Step, EvalError> {
        let limit = rules.spec.serve;
        let Some(path) = req.path() else {
            return Ok(Step::Pass);
        };
        if limit == 0 {
            return Ok(Step::Pass);
        }

        let hits = self.state.hits_for_path(path).map_err(|e| {
            debug!(error = %e, "error getting times served");
            EvalError::from(e)
        })?;

        if hits >= limit {
            debug!(serve_limit = limit, times_served = hits, "route exceeds times served");
            Ok(Step::Fail(format!("{path} already served {hits}/{limit} times")))
        } else {
            trace!(serve_limit = limit, times_served = hits, "route served");
            Ok(Step::Pass)
        }
    }

    fn prereq(&self, rules: &RuleSet, client: Option<IpAddr>) -> Step {
        let paths = &rules.spec.prereq_paths;
        if paths.is_empty() {
            return Step::Pass;
        }
        if self.state.prerequisites_satisfied(client, paths) {
            debug!(prereqs = ?paths, "matched prerequisites");
            Step::Pass
        } else {
            debug!(prereqs = ?paths, "did not match prerequisites");
            Step::Fail(format!("prerequisites {paths:?} not satisfied"))
        }
    }

    /// Allow-list failure is recorded in `failed`; a lookup error or a
    /// blacklisted country ends evaluation.
    fn geoip(&self, rules: &RuleSet, client: Option<IpAddr>, failed: &mut Vec<(Check, String)>) -> Option<Decision> {
        if !self.geoip.is_loaded() {
            return None;
        }

        let looked_up = client
            .ok_or(GeoIpError::UnparsedAddress)
            .and_then(|ip| self.geoip.country_code_for(ip));
        let cc = match looked_up {
            Ok(cc) => cc,
            Err(e) => {
                debug!(error = %e, "error getting country code");
                return Some(Decision::Fault {
                    check: Check::GeoIp,
                    error: e.into(),
                });
            }
        };

        let geo = &rules.spec.geoip;
        if !geo.authorized_countries.is_empty() {
            if geo.authorized_countries.iter().any(|c| *c == cc) {
                debug!(countrycode = %cc, "matched authorized country code");
            } else {
                trace!(countrycode = %cc, "did not match authorized country code");
                failed.push((Check::GeoIp, format!("country {cc} not authorized")));
            }
        }

        if geo.blacklist_countries.iter().any(|c| *c == cc) {
            debug!(countrycode = %cc, "matched blacklist country code");
            return Some(Decision::deny(Check::GeoIpBlacklist, format!("country {cc} is blacklisted")));
        }

        None
    }
}

fn tally(failed: &mut Vec<(Check, String)>, check: Check, res: Result<Step, EvalError>) -> Option<Decision> {
    match res {
        Ok(Step::Pass) => None,
        Ok(Step::Fail(reason)) => {
            failed.push((check, reason));
            None
        }
        Ok(Step::Block(reason)) => Some(Decision::Deny { check, reason }),
        Err(error) => Some(Decision::Fault { check, error }),
    }
}

fn display_client(client: Option<IpAddr>) -> String {
    client.map(|ip| ip.to_string()).unwrap_or_else(|| "<unparsed>".to_string())
}
