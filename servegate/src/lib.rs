//! Access-control engine for a file-serving node: decides, per request,
//! whether a route may be served under its layered rule set.

pub mod addr;
pub mod config;
pub mod error;
pub mod exec;
pub mod gate;
pub mod geoip;
pub mod ja3;
pub mod metrics;
pub mod policy;
pub mod request;
pub mod routes;
pub mod rules;
pub mod state;
pub mod telemetry;

pub use error::{ConfigError, EvalError};
pub use gate::Gatekeeper;
pub use policy::{Check, Decision, PolicyEvaluator};
pub use request::RequestView;
pub use rules::{RuleSet, RuleSpec};
