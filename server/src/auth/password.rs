use sha2::{Digest, Sha256};

/// Salted SHA-256 password digest, hex-encoded.
/// Demo accounts only — a deployment replacing the seed users with real
/// accounts should swap this for a memory-hard KDF at the same seam.
pub fn hash_password(salt_hex: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-shape verification of a candidate password against the
/// stored salt + digest.
pub fn verify_password(salt_hex: &str, password: &str, expected_hash: &str) -> bool {
    hash_password(salt_hex, password) == expected_hash
}
