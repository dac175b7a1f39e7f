use prometheus::{Encoder, TextEncoder};

/// Prometheus text exposition of every registered metric, for the
/// embedding server to publish.
pub fn gather_as_text() -> String {
    let mf = prometheus::gather();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    let _ = encoder.encode(&mf, &mut buf);
    String::from_utf8_lossy(&buf).to_string()
}
