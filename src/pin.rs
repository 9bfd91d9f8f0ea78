//! Salted one-way PIN hashing
//!
//! Stored form is `salt-hex$digest-hex` with a fresh 16-byte random salt per
//! credential. The digest is SHA-256 over salt followed by the raw PIN.

use rand::RngCore;
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

/// Hash a raw PIN with a fresh random salt
pub fn hash_pin(raw_pin: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = digest_with_salt(&salt, raw_pin);
    format!("{}${}", hex::encode(salt), hex::encode(digest))
}

/// Verify a raw PIN against a stored hash
pub fn verify_pin(raw_pin: &str, stored: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let digest = digest_with_salt(&salt, raw_pin);
    hex::encode(digest) == digest_hex
}

fn digest_with_salt(salt: &[u8], raw_pin: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(raw_pin.as_bytes());
    hasher.finalize().to_vec()
}
