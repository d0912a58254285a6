use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `value` followed by `key`
pub fn sha256_hex(value: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}
