use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of arbitrary bytes. Used to fingerprint API tokens
/// and exported statements without keeping the sensitive content around.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
