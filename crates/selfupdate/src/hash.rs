//! SHA-256 digests for release verification.

use sha2::{Digest, Sha256};

/// Byte length of the digests carried in release manifests.
pub const HASH_LEN: usize = 32;

/// Compute the SHA-256 digest of a byte buffer.
pub fn sha256(data: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Verify `data` against an expected digest.
///
/// `expected` must be exactly [`HASH_LEN`] bytes; any other length fails
/// without hashing.
pub fn verify(data: &[u8], expected: &[u8]) -> bool {
    let Ok(expected) = <&[u8; HASH_LEN]>::try_from(expected) else {
        return false;
    };
    sha256(data) == *expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_deterministic() {
        let data = b"release payload";
        assert_eq!(sha256(data), sha256(data));
        assert_ne!(sha256(b"hello"), sha256(b"world"));
    }

    #[test]
    fn verify_accepts_matching_digest() {
        let data = b"binary bytes";
        let digest = sha256(data);
        assert!(verify(data, &digest));
        assert!(!verify(b"other bytes", &digest));
    }

    #[test]
    fn verify_rejects_wrong_length_digest() {
        assert!(!verify(b"data", b"short"));
        assert!(!verify(b"data", &[0u8; 33]));
    }
}
