//! Password-based key derivation.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Supported PBKDF2 inner hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerivedKeyFunction {
    /// PBKDF2 with HMAC-SHA-256.
    Pbkdf2Sha256,
    /// PBKDF2 with HMAC-SHA-512.
    Pbkdf2Sha512,
}

/// Derives `size` bytes of key material from a passphrase.
///
/// Pure over `(function, passphrase, salt, iterations, size)`; the output
/// is zeroized on drop.
pub fn derive_key(
    function: DerivedKeyFunction,
    passphrase: &str,
    salt: &[u8],
    iterations: u32,
    size: usize,
) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(vec![0u8; size]);
    match function {
        DerivedKeyFunction::Pbkdf2Sha256 => {
            pbkdf2::pbkdf2_hmac::<sha2::Sha256>(passphrase.as_bytes(), salt, iterations, &mut key);
        }
        DerivedKeyFunction::Pbkdf2Sha512 => {
            pbkdf2::pbkdf2_hmac::<sha2::Sha512>(passphrase.as_bytes(), salt, iterations, &mut key);
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let first = derive_key(DerivedKeyFunction::Pbkdf2Sha256, "passphrase", b"salt", 1000, 32);
        let second = derive_key(DerivedKeyFunction::Pbkdf2Sha256, "passphrase", b"salt", 1000, 32);
        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn every_input_affects_the_key() {
        let base = derive_key(DerivedKeyFunction::Pbkdf2Sha256, "passphrase", b"salt", 1000, 32);

        let other_salt =
            derive_key(DerivedKeyFunction::Pbkdf2Sha256, "passphrase", b"pepper", 1000, 32);
        let other_pass =
            derive_key(DerivedKeyFunction::Pbkdf2Sha256, "passphrase!", b"salt", 1000, 32);
        let other_iters =
            derive_key(DerivedKeyFunction::Pbkdf2Sha256, "passphrase", b"salt", 1001, 32);
        let other_function =
            derive_key(DerivedKeyFunction::Pbkdf2Sha512, "passphrase", b"salt", 1000, 32);

        assert_ne!(base, other_salt);
        assert_ne!(base, other_pass);
        assert_ne!(base, other_iters);
        assert_ne!(base, other_function);
    }
}
