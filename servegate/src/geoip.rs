use std::net::IpAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeoIpError {
    #[error("no country for {0}")]
    NotFound(IpAddr),

    #[error("remote address could not be parsed")]
    UnparsedAddress,

    #[error("lookup failed: {0}")]
    Lookup(String),
}

/// Country lookup backed by an external database.
pub trait GeoIpLookup: Send + Sync {
    /// When false, GeoIP conditions are not evaluated at all.
    fn is_loaded(&self) -> bool;

    fn country_code_for(&self, addr: IpAddr) -> Result<String, GeoIpError>;
}

/// Handle used when no database is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeoIp;

impl GeoIpLookup for NoGeoIp {
    fn is_loaded(&self) -> bool {
        false
    }

    fn country_code_for(&self, _addr: IpAddr) -> Result<String, GeoIpError> {
        Err(GeoIpError::Lookup("no database loaded".to_string()))
    }
}
