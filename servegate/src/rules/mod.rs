pub mod types;
pub mod compiled;
mod merge;

pub use compiled::{IpEntry, RuleSet};
pub use types::{ExecSpec, GeoIpSpec, RuleSpec};
