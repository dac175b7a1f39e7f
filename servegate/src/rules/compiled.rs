use ipnet::IpNet;
use regex::Regex;
use std::net::IpAddr;

use super::types::RuleSpec;
use crate::error::ConfigError;

/// One entry of an IP allow/block range, classified once at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpEntry {
    Net(IpNet),
    Addr(IpAddr),
    /// Entry contained `/` but is not a valid CIDR block.
    BadCidr(String),
    /// Entry is neither a CIDR block nor an address. Never matches.
    BadAddr(String),
}

impl IpEntry {
    pub fn parse(raw: &str) -> Self {
        if raw.contains('/') {
            match raw.parse::<IpNet>() {
                Ok(net) => IpEntry::Net(net),
                Err(_) => IpEntry::BadCidr(raw.to_string()),
            }
        } else {
            match raw.parse::<IpAddr>() {
                Ok(ip) => IpEntry::Addr(ip.to_canonical()),
                Err(_) => IpEntry::BadAddr(raw.to_string()),
            }
        }
    }

    /// Unparsed entries and an unparsed client never match.
    pub fn matches(&self, client: Option<IpAddr>) -> bool {
        let Some(ip) = client else { return false; };
        match self {
            IpEntry::Net(net) => net.contains(&ip),
            IpEntry::Addr(addr) => *addr == ip,
            IpEntry::BadCidr(_) | IpEntry::BadAddr(_) => false,
        }
    }
}

/// A validated rule layer with its patterns compiled once.
///
/// Evaluation only ever reads a `RuleSet`; layers are combined with
/// [`RuleSet::merge`] rather than mutated.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub(crate) spec: RuleSpec,
    pub(crate) authorized_user_agents: Vec<Regex>,
    pub(crate) blacklist_user_agents: Vec<Regex>,
    pub(crate) authorized_ip_range: Vec<IpEntry>,
    pub(crate) blacklist_ip_range: Vec<IpEntry>,
}

impl RuleSet {
    /// Parse a YAML rule layer and validate its user-agent patterns.
    pub fn load(yaml: &str) -> Result<Self, ConfigError> {
        let spec: RuleSpec = serde_yaml::from_str(yaml)?;
        Self::compile(spec)
    }

    pub fn compile(spec: RuleSpec) -> Result<Self, ConfigError> {
        let authorized_user_agents = compile_patterns(&spec.authorized_user_agents)?;
        let blacklist_user_agents = compile_patterns(&spec.blacklist_user_agents)?;

        Ok(Self {
            authorized_ip_range: spec.authorized_ip_range.iter().map(|r| IpEntry::parse(r)).collect(),
            blacklist_ip_range: spec.blacklist_ip_range.iter().map(|r| IpEntry::parse(r)).collect(),
            authorized_user_agents,
            blacklist_user_agents,
            spec,
        })
    }

    pub fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    pub fn is_unrestricted(&self) -> bool {
        self.spec == RuleSpec::default()
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    let mut out = Vec::with_capacity(patterns.len());
    for p in patterns {
        let re = Regex::new(p).map_err(|source| ConfigError::InvalidPattern {
            pattern: p.clone(),
            source,
        })?;
        out.push(re);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_compiles_user_agent_patterns() {
        let rs = RuleSet::load("authorized_useragents: ['^Mozilla', 'curl/\\d+']\nblacklist_useragents: [bot]").unwrap();
        assert_eq!(rs.authorized_user_agents.len(), 2);
        assert!(rs.authorized_user_agents[1].is_match("curl/8.4.0"));
        assert_eq!(rs.blacklist_user_agents[0].as_str(), "bot");
    }

    #[test]
    fn load_rejects_invalid_pattern_and_names_it() {
        let err = RuleSet::load("blacklist_useragents: ['ok', '(unclosed']").unwrap_err();
        match &err {
            ConfigError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("(unclosed is not valid regex"));
    }

    #[test]
    fn load_rejects_malformed_yaml() {
        assert!(matches!(RuleSet::load("serve: [1, 2"), Err(ConfigError::Parse(_))));
        assert!(matches!(RuleSet::load("serve: -4"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn ip_ranges_are_accepted_unvalidated() {
        let rs = RuleSet::load("authorized_iprange: ['10.0.0.0/33', 'nope']").unwrap();
        assert_eq!(
            rs.authorized_ip_range,
            vec![IpEntry::BadCidr("10.0.0.0/33".into()), IpEntry::BadAddr("nope".into())]
        );
    }

    #[test]
    fn ip_entry_matching() {
        let client = Some("10.1.2.3".parse().unwrap());
        assert!(IpEntry::parse("10.0.0.0/8").matches(client));
        assert!(IpEntry::parse("10.1.2.3").matches(client));
        assert!(!IpEntry::parse("10.1.2.4").matches(client));
        assert!(!IpEntry::parse("11.0.0.0/8").matches(client));
        assert!(IpEntry::parse("::/0").matches(Some("2001:db8::1".parse().unwrap())));
        assert!(!IpEntry::parse("10.0.0.0/8").matches(None));
        assert!(!IpEntry::parse("garbage").matches(None));
    }

    #[test]
    fn mapped_entry_matches_plain_v4_client() {
        assert_eq!(IpEntry::parse("::ffff:10.1.2.3"), IpEntry::Addr("10.1.2.3".parse().unwrap()));
        assert!(IpEntry::parse("::ffff:10.1.2.3").matches(Some("10.1.2.3".parse().unwrap())));
    }

    #[test]
    fn empty_layer_is_unrestricted() {
        assert!(RuleSet::load("{}").unwrap().is_unrestricted());
        assert!(!RuleSet::load("serve: 1").unwrap().is_unrestricted());
    }
}
