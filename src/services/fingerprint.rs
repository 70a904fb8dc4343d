// src/services/fingerprint.rs

//! Record fingerprints.
//!
//! A fingerprint is the hex SHA-256 of the length-prefixed encoding of
//! `(id, name, grade)`: for each field, its UTF-8 byte length as a big-endian
//! `u64` followed by the bytes. Credits are excluded so that a reformatted
//! credits column alone never reads as a grade change.

use sha2::{Digest, Sha256};

/// Fingerprint a record's identity-relevant fields.
pub fn fingerprint(id: &str, name: &str, grade: &str) -> String {
    let mut hasher = Sha256::new();
    for field in [id, name, grade] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = fingerprint("20-00-0004", "Functional and Object-oriented Programming", "1,7");
        let b = fingerprint("20-00-0004", "Functional and Object-oriented Programming", "1,7");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_each_field_matters() {
        let base = fingerprint("A", "Algo", "4,0");
        assert_ne!(base, fingerprint("B", "Algo", "4,0"));
        assert_ne!(base, fingerprint("A", "Algorithms", "4,0"));
        assert_ne!(base, fingerprint("A", "Algo", "1,3"));
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        assert_ne!(fingerprint("ab", "c", ""), fingerprint("a", "bc", ""));
        assert_ne!(fingerprint("", "", "x"), fingerprint("x", "", ""));
    }

    #[test]
    fn test_known_vector() {
        // Empty fields: three zero-length prefixes.
        let mut hasher = Sha256::new();
        hasher.update([0u8; 24]);
        assert_eq!(fingerprint("", "", ""), hex::encode(hasher.finalize()));
    }
}
