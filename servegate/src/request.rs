use std::borrow::Cow;

use bytes::{BufMut, Bytes, BytesMut};
use http::header::{HOST, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::routes::normalize_route;

/// What the evaluator sees of an inbound request.
#[derive(Debug, Clone)]
pub struct RequestView {
    pub method: Method,
    /// Request target as received (path plus query). Used for the raw dump.
    pub target: String,
    /// Route path with repeated and trailing slashes collapsed, so layer
    /// lookup and serve counting share one key. `None` when the serving
    /// layer could not parse the URL.
    pub path: Option<String>,
    pub headers: HeaderMap,
    /// `host:port` of the peer.
    pub remote_addr: String,
    /// Raw JA3 string computed by the TLS layer. Empty for plain HTTP.
    pub ja3_fingerprint: String,
    pub body: Bytes,
}

impl RequestView {
    pub fn new(method: Method, target: impl Into<String>, remote_addr: impl Into<String>) -> Self {
        let target = target.into();
        let path = target
            .split(['?', '#'])
            .next()
            .filter(|p| p.starts_with('/'))
            .map(normalize_route);
        Self {
            method,
            target,
            path,
            headers: HeaderMap::new(),
            remote_addr: remote_addr.into(),
            ja3_fingerprint: String::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_ja3(mut self, raw: impl Into<String>) -> Self {
        self.ja3_fingerprint = raw.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &str {
        self.method.as_str()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// First value of `name`, or `""` when absent. Bytes that are not UTF-8
    /// come back as U+FFFD; the rest of the value is kept for matching.
    pub fn header(&self, name: &str) -> Cow<'_, str> {
        match self.headers.get(name) {
            Some(v) => String::from_utf8_lossy(v.as_bytes()),
            None => Cow::Borrowed(""),
        }
    }

    pub fn user_agent(&self) -> Cow<'_, str> {
        self.header(USER_AGENT.as_str())
    }

    /// HTTP/1.1 wire rendering of the request: request line, `Host` first,
    /// remaining headers in received order, blank line, body.
    pub fn raw_dump(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(256 + self.body.len());

        out.put_slice(self.method.as_str().as_bytes());
        out.put_u8(b' ');
        out.put_slice(if self.target.is_empty() { &b"/"[..] } else { self.target.as_bytes() });
        out.put_slice(b" HTTP/1.1\r\n");

        if let Some(host) = self.headers.get(HOST) {
            out.put_slice(b"Host: ");
            out.put_slice(host.as_bytes());
            out.put_slice(b"\r\n");
        }

        for (name, value) in self.headers.iter() {
            if *name == HOST {
                continue;
            }
            out.put_slice(canonical_header_name(name.as_str()).as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }

        out.put_slice(b"\r\n");
        out.put_slice(&self.body);
        out.freeze()
    }
}

/// `x-forwarded-for` -> `X-Forwarded-For`
fn canonical_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for ch in name.chars() {
        if upper {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
        upper = ch == '-';
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn path_is_split_from_query() {
        let req = RequestView::new(Method::GET, "/drop/a.bin?x=1", "1.2.3.4:5");
        assert_eq!(req.path(), Some("/drop/a.bin"));
        assert_eq!(req.target, "/drop/a.bin?x=1");
    }

    #[test]
    fn path_collapses_slashes() {
        let req = RequestView::new(Method::GET, "/drop//p.bin/?x=1", "1.2.3.4:5");
        assert_eq!(req.path(), Some("/drop/p.bin"));
        assert_eq!(req.target, "/drop//p.bin/?x=1");
        assert_eq!(RequestView::new(Method::GET, "/", "1.2.3.4:5").path(), Some("/"));
    }

    #[test]
    fn non_ascii_header_is_kept() {
        let ua = HeaderValue::from_bytes("evilbot/1.0 (café)".as_bytes()).unwrap();
        let req = RequestView::new(Method::GET, "/", "1.2.3.4:5").with_header(USER_AGENT, ua);
        assert_eq!(req.user_agent(), "evilbot/1.0 (café)");

        let raw = HeaderValue::from_bytes(b"bot\xff").unwrap();
        let req = RequestView::new(Method::GET, "/", "1.2.3.4:5").with_header(USER_AGENT, raw);
        assert_eq!(req.user_agent(), "bot\u{fffd}");
    }

    #[test]
    fn non_origin_target_has_no_path() {
        let req = RequestView::new(Method::OPTIONS, "*", "1.2.3.4:5");
        assert_eq!(req.path(), None);
    }

    #[test]
    fn missing_header_is_empty() {
        let req = RequestView::new(Method::GET, "/", "1.2.3.4:5")
            .with_header(USER_AGENT, HeaderValue::from_static("curl/8.0"));
        assert_eq!(req.user_agent(), "curl/8.0");
        assert_eq!(req.header("x-missing"), "");
        assert_eq!(req.header("User-Agent"), "curl/8.0");
    }

    #[test]
    fn raw_dump_wire_format() {
        let req = RequestView::new(Method::POST, "/upload?id=7", "1.2.3.4:5")
            .with_header(USER_AGENT, HeaderValue::from_static("agent"))
            .with_header(HOST, HeaderValue::from_static("cdn.example"))
            .with_header(HeaderName::from_static("x-trace-id"), HeaderValue::from_static("42"))
            .with_body("payload");

        let dump = req.raw_dump();
        let text = std::str::from_utf8(&dump).unwrap();
        assert!(text.starts_with("POST /upload?id=7 HTTP/1.1\r\nHost: cdn.example\r\n"));
        assert!(text.contains("\r\nUser-Agent: agent\r\n"));
        assert!(text.contains("\r\nX-Trace-Id: 42\r\n"));
        assert!(text.ends_with("\r\n\r\npayload"));
        assert_eq!(text.matches("Host:").count(), 1);
    }
}
