use crate::error::EvalError;

/// The sub-check a decision is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Check {
    NotServing,
    UserAgent,
    UserAgentBlacklist,
    IpRange,
    IpBlacklist,
    Method,
    Headers,
    Ja3,
    Exec,
    ServeLimit,
    Prereq,
    GeoIp,
    GeoIpBlacklist,
}

impl Check {
    pub fn as_str(&self) -> &'static str {
        match self {
            Check::NotServing => "not_serving",
            Check::UserAgent => "user_agent",
            Check::UserAgentBlacklist => "user_agent_blacklist",
            Check::IpRange => "ip_range",
            Check::IpBlacklist => "ip_blacklist",
            Check::Method => "method",
            Check::Headers => "headers",
            Check::Ja3 => "ja3",
            Check::Exec => "exec",
            Check::ServeLimit => "serve_limit",
            Check::Prereq => "prereq",
            Check::GeoIp => "geoip",
            Check::GeoIpBlacklist => "geoip_blacklist",
        }
    }
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one request.
///
/// `Deny` is a policy verdict, `Fault` means a check could not be carried out
/// (bad CIDR, script failure, state or GeoIP error). Both mean "do not serve".
#[derive(Debug)]
pub enum Decision {
    Allow,

    Deny {
        check: Check,
        reason: String,
    },

    Fault {
        check: Check,
        error: EvalError,
    },
}

impl Decision {
    pub fn deny(check: Check, reason: impl Into<String>) -> Self {
        Self::Deny {
            check,
            reason: reason.into(),
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Decision::Fault { .. })
    }

    pub fn check(&self) -> Option<Check> {
        match self {
            Decision::Allow => None,
            Decision::Deny { check, .. } | Decision::Fault { check, .. } => Some(*check),
        }
    }

    pub fn reason(&self) -> String {
        match self {
            Decision::Allow => String::new(),
            Decision::Deny { reason, .. } => reason.clone(),
            Decision::Fault { error, .. } => error.to_string(),
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny { .. } => "deny",
            Decision::Fault { .. } => "fault",
        }
    }
}
