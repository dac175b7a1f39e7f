use serde::Deserialize;
use std::collections::BTreeMap;

/// One layer of access conditions, as written in a routes file.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RuleSpec {
    #[serde(rename = "authorized_useragents")]
    pub authorized_user_agents: Vec<String>,
    #[serde(rename = "blacklist_useragents")]
    pub blacklist_user_agents: Vec<String>,

    #[serde(rename = "authorized_iprange")]
    pub authorized_ip_range: Vec<String>,
    #[serde(rename = "blacklist_iprange")]
    pub blacklist_ip_range: Vec<String>,

    pub authorized_methods: Vec<String>,
    pub authorized_headers: BTreeMap<String, String>,
    pub authorized_ja3: Vec<String>,

    pub exec: ExecSpec,

    /// Kill-switch: never serve while set.
    pub not_serving: bool,
    /// Cap on total serves of the route. 0 means unlimited.
    pub serve: u64,

    #[serde(rename = "prereq")]
    pub prereq_paths: Vec<String>,

    pub geoip: GeoIpSpec,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ExecSpec {
    #[serde(rename = "script")]
    pub script_path: String,
    pub output: String,
}

impl ExecSpec {
    pub fn is_configured(&self) -> bool {
        !self.script_path.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct GeoIpSpec {
    pub authorized_countries: Vec<String>,
    pub blacklist_countries: Vec<String>,
}
