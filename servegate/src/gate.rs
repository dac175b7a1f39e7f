use std::sync::Arc;

use crate::exec::ProcessRunner;
use crate::geoip::GeoIpLookup;
use crate::metrics;
use crate::policy::{Decision, PolicyEvaluator};
use crate::request::RequestView;
use crate::routes::RouteManager;
use crate::rules::RuleSet;
use crate::state::StateTracker;

/// Entry point for the serving layer: resolves the rule layers for a
/// request's path, merges them and evaluates the result.
#[derive(Clone)]
pub struct Gatekeeper {
    routes: RouteManager,
    evaluator: PolicyEvaluator,
}

impl Gatekeeper {
    pub fn new(
        routes: RouteManager,
        state: Arc<dyn StateTracker>,
        geoip: Arc<dyn GeoIpLookup>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            routes,
            evaluator: PolicyEvaluator::new(state, geoip, runner),
        }
    }

    pub fn routes(&self) -> &RouteManager {
        &self.routes
    }

    /// Effective rule set for `path`. Paths without any layer get the empty
    /// (unrestricted) rule set.
    pub fn effective_rules(&self, path: Option<&str>) -> RuleSet {
        let layers = path.map(|p| self.routes.layers_for(p)).unwrap_or_default();
        RuleSet::merge(layers.iter().map(|l| &**l))
    }

    pub async fn decide(&self, req: &RequestView) -> Decision {
        let rules = self.effective_rules(req.path());
        let decision = self.evaluator.evaluate(&rules, req).await;

        let check = decision.check().map(|c| c.as_str()).unwrap_or("");
        metrics::counters::inc_decision(decision.kind_str(), check);

        let path = req.path().unwrap_or("");
        match &decision {
            Decision::Allow => {
                tracing::debug!(path = %path, remote = %req.remote_addr, "serve allowed");
            }
            Decision::Deny { check, reason } => {
                tracing::info!(path = %path, remote = %req.remote_addr, check = %check, reason = %reason, "serve denied");
            }
            Decision::Fault { check, error } => {
                tracing::warn!(path = %path, remote = %req.remote_addr, check = %check, error = %error, "serve denied on fault");
            }
        }

        decision
    }

    pub async fn should_host(&self, req: &RequestView) -> bool {
        self.decide(req).await.is_allow()
    }
}
