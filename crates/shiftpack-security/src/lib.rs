mod checksum;
mod ed25519;

pub use checksum::payload_fingerprint;
pub use ed25519::TrustedKey;
