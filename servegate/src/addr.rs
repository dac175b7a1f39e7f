use std::net::{IpAddr, SocketAddr};

/// Extract the bare client address from a `host:port` remote address.
///
/// Accepts `1.2.3.4:443`, `[2001:db8::1]:443` and bare addresses. Anything
/// else yields `None`, which never matches an IP, CIDR or GeoIP rule.
///
/// IPv4-mapped IPv6 peers (`[::ffff:10.1.2.3]:443`, as reported by a
/// dual-stack listener) come back as plain IPv4.
pub fn parse_remote_addr(remote: &str) -> Option<IpAddr> {
    parse_any(remote.trim()).map(|ip| ip.to_canonical())
}

fn parse_any(remote: &str) -> Option<IpAddr> {
    if let Ok(sa) = remote.parse::<SocketAddr>() {
        return Some(sa.ip());
    }
    if let Ok(ip) = remote.parse::<IpAddr>() {
        return Some(ip);
    }

    // "[v6]" without a port
    if let Some(inner) = remote.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        return inner.parse().ok();
    }

    let (host, _port) = remote.rsplit_once(':')?;
    host.parse::<std::net::Ipv4Addr>().ok().map(IpAddr::V4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_v4_with_port() {
        assert_eq!(parse_remote_addr("10.1.2.3:443"), Some("10.1.2.3".parse().unwrap()));
    }

    #[test]
    fn parses_v6_forms() {
        let want: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(parse_remote_addr("[2001:db8::1]:8443"), Some(want));
        assert_eq!(parse_remote_addr("[2001:db8::1]"), Some(want));
        assert_eq!(parse_remote_addr("2001:db8::1"), Some(want));
    }

    #[test]
    fn bare_address_without_port() {
        assert_eq!(parse_remote_addr("192.168.0.9"), Some("192.168.0.9".parse().unwrap()));
    }

    #[test]
    fn tolerates_non_numeric_port() {
        assert_eq!(parse_remote_addr("10.0.0.1:http"), Some("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn mapped_v6_becomes_v4() {
        let want: IpAddr = "10.1.2.3".parse().unwrap();
        assert_eq!(parse_remote_addr("[::ffff:10.1.2.3]:443"), Some(want));
        assert_eq!(parse_remote_addr("::ffff:10.1.2.3"), Some(want));
        // compatible (non-mapped) v6 stays v6
        assert!(parse_remote_addr("[::1]:443").unwrap().is_ipv6());
    }

    #[test]
    fn malformed_is_none() {
        assert_eq!(parse_remote_addr(""), None);
        assert_eq!(parse_remote_addr("localhost:80"), None);
        assert_eq!(parse_remote_addr("300.1.1.1:80"), None);
        assert_eq!(parse_remote_addr("not an address"), None);
    }
}
