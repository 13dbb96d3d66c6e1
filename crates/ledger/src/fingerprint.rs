//! Content fingerprints.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the UTF-8 bytes of `text` (64 characters).
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            fingerprint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn empty_string_digest() {
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn deterministic_and_well_formed() {
        let a = fingerprint("What is the remote work policy?");
        assert_eq!(a, fingerprint("What is the remote work policy?"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn one_character_change_changes_digest() {
        assert_ne!(fingerprint("policy"), fingerprint("policz"));
    }

    #[test]
    fn hashes_utf8_bytes() {
        // "é" is two bytes in UTF-8
        assert_ne!(fingerprint("é"), fingerprint("e"));
        assert_eq!(fingerprint("é").len(), 64);
    }
}
