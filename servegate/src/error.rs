use thiserror::Error;

use crate::exec::ExecError;
use crate::geoip::GeoIpError;
use crate::state::StateError;

/// Raised while loading a rule layer. Aborts registration of that layer.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse rule yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{pattern} is not valid regex: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Infrastructure or configuration fault hit while evaluating a request.
/// Never surfaces to the serving layer as an error; it always means deny.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("could not parse IP range {0}")]
    BadCidr(String),

    #[error("exec: {0}")]
    Exec(#[from] ExecError),

    #[error("serve count: {0}")]
    State(#[from] StateError),

    #[error("geoip: {0}")]
    GeoIp(#[from] GeoIpError),
}
