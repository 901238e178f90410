//! Message digests and the salted password-hash format.
//!
//! The stored blob is `salt || digest(salt || raw_password)`. The split
//! point is not stored with the blob: it is the salt size of the hashing
//! configuration that produced it, which is why password verification
//! may need to retry with the previous configuration after a rotation.

use serde::{Deserialize, Serialize};
use sha2::Digest;
use subtle::ConstantTimeEq;
use vigil_core::{Result, SecurityError};

/// Digest algorithm used for password hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-224 (SHA-2 family).
    Sha224,
    /// SHA-256 (SHA-2 family).
    Sha256,
    /// SHA-384 (SHA-2 family).
    Sha384,
    /// SHA-512 (SHA-2 family).
    Sha512,
    /// SHA3-224.
    Sha3_224,
    /// SHA3-256.
    Sha3_256,
    /// SHA3-384.
    Sha3_384,
    /// SHA3-512.
    Sha3_512,
}

impl HashAlgorithm {
    /// Digest size in bytes.
    pub fn digest_size(self) -> usize {
        match self {
            Self::Sha224 | Self::Sha3_224 => 28,
            Self::Sha256 | Self::Sha3_256 => 32,
            Self::Sha384 | Self::Sha3_384 => 48,
            Self::Sha512 | Self::Sha3_512 => 64,
        }
    }

    /// Hashes an arbitrary message.
    pub fn digest(self, message: &[u8]) -> Vec<u8> {
        fn run<D: Digest>(message: &[u8]) -> Vec<u8> {
            let mut hasher = D::new();
            hasher.update(message);
            hasher.finalize().to_vec()
        }

        match self {
            Self::Sha224 => run::<sha2::Sha224>(message),
            Self::Sha256 => run::<sha2::Sha256>(message),
            Self::Sha384 => run::<sha2::Sha384>(message),
            Self::Sha512 => run::<sha2::Sha512>(message),
            Self::Sha3_224 => run::<sha3::Sha3_224>(message),
            Self::Sha3_256 => run::<sha3::Sha3_256>(message),
            Self::Sha3_384 => run::<sha3::Sha3_384>(message),
            Self::Sha3_512 => run::<sha3::Sha3_512>(message),
        }
    }
}

/// Hashes a raw password with the supplied salt.
///
/// Deterministic over `(algorithm, salt, raw_password)`.
pub fn hash_password(algorithm: HashAlgorithm, salt: &[u8], raw_password: &str) -> Vec<u8> {
    let mut message = Vec::with_capacity(salt.len() + raw_password.len());
    message.extend_from_slice(salt);
    message.extend_from_slice(raw_password.as_bytes());
    algorithm.digest(&message)
}

/// Builds a storable password blob from a salt and raw password.
pub fn build_password_blob(algorithm: HashAlgorithm, salt: &[u8], raw_password: &str) -> Vec<u8> {
    let mut blob = Vec::with_capacity(salt.len() + algorithm.digest_size());
    blob.extend_from_slice(salt);
    blob.extend_from_slice(&hash_password(algorithm, salt, raw_password));
    blob
}

/// Verifies a raw password against a stored blob.
///
/// `salt_size` selects the split point and must come from the hashing
/// configuration under test. The comparison covers the whole blob and
/// runs in constant time.
pub fn verify_password_blob(
    algorithm: HashAlgorithm,
    salt_size: usize,
    stored: &[u8],
    raw_password: &str,
) -> Result<bool> {
    if stored.len() < salt_size {
        return Err(SecurityError::InvalidArgument(format!(
            "stored password blob is shorter ({}) than the salt size ({salt_size})",
            stored.len()
        )));
    }

    let salt = &stored[..salt_size];
    let candidate = build_password_blob(algorithm, salt, raw_password);
    if candidate.len() != stored.len() {
        return Ok(false);
    }
    Ok(candidate.ct_eq(stored).into())
}
