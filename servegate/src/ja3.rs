use md5::{Digest, Md5};

/// JA3 digest of a raw TLS client fingerprint string: MD5, lowercase hex.
pub fn ja3_digest(raw: &str) -> String {
    format!("{:x}", Md5::digest(raw.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_vector() {
        let raw = "769,47-53-5-10-49161-49162-49171-49172-50-56-19-4,0-10-11,23-24-25,0";
        assert_eq!(ja3_digest(raw), "ada70206e40642a3e4461f35503241d5");
    }

    #[test]
    fn short_fingerprint() {
        assert_eq!(ja3_digest("769,47-53,0-23,0"), "54377dc38c6c9dded5a77129e862fbf3");
    }

    #[test]
    fn deterministic_and_fixed_width() {
        let a = ja3_digest("771,4865-4866,0-23-65281,29-23,0");
        assert_eq!(a, ja3_digest("771,4865-4866,0-23-65281,29-23,0"));
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(ja3_digest(""), "d41d8cd98f00b204e9800998ecf8427e");
    }
}
