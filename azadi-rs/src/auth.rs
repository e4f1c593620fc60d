//! Password hashing and verification.
//!
//! ## Record format
//!
//! Passwords are persisted as `sha256$<salt>$<base64 digest>` where the
//! digest is `SHA-256(salt || password)` and the salt is a random 32-char hex
//! string. The original system stored the password verbatim; hashing at rest
//! is a deliberate departure.
//!
//! Verification decodes the stored digest and compares it in constant time.
//! A record that does not match the expected shape never verifies.

use base64::prelude::*;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const SCHEME: &str = "sha256";

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let digest = salted_digest(&salt, password);
    format!("{SCHEME}${salt}${}", BASE64_STANDARD.encode(digest))
}

/// Check `password` against a stored record in constant time.
pub fn verify_password(password: &str, record: &str) -> bool {
    let mut parts = record.splitn(3, '$');
    let (Some(scheme), Some(salt), Some(encoded)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let Ok(stored) = BASE64_STANDARD.decode(encoded) else {
        return false;
    };

    let computed = salted_digest(salt, password);
    computed.as_slice().ct_eq(&stored).into()
}

fn salted_digest(salt: &str, password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::{hash_password, verify_password};

    #[test]
    fn correct_password_verifies() {
        let record = hash_password("hunter2");
        assert!(verify_password("hunter2", &record));
    }

    #[test]
    fn wrong_password_fails() {
        let record = hash_password("hunter2");
        assert!(!verify_password("hunter3", &record));
        assert!(!verify_password("", &record));
    }

    #[test]
    fn record_never_contains_plaintext() {
        let record = hash_password("correct horse battery staple");
        assert!(!record.contains("correct horse"));
        assert!(record.starts_with("sha256$"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn malformed_records_never_verify() {
        assert!(!verify_password("pw", ""));
        assert!(!verify_password("pw", "pw"));
        assert!(!verify_password("pw", "sha256$salt"));
        assert!(!verify_password("pw", "md5$salt$AAAA"));
        assert!(!verify_password("pw", "sha256$salt$not-base64!"));
    }
}
