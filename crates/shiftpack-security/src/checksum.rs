use sha2::{Digest, Sha256};

fn sha256_hex(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Stable identifier for a fetched payload, e.g. `sha256:9f86d0...`.
pub fn payload_fingerprint(payload: &[u8]) -> String {
    format!("sha256:{}", sha256_hex(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_known_input() {
        assert_eq!(
            sha256_hex(b"test"),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn fingerprint_is_prefixed() {
        assert!(payload_fingerprint(b"").starts_with("sha256:e3b0c442"));
    }
}
