//! The key generator: configured producer of derived, symmetric and
//! exchanged crypto material.

use crate::exchange::{self, EllipticCurve, KeyValidationLevel};
use crate::kdf::{derive_key, DerivedKeyFunction};
use crate::material::{CipherMode, CipherSuite, SymmetricCipher, SymmetricMaterial};
use crate::salt::random_salt;
use serde::{Deserialize, Serialize};
use vigil_core::{Result, SecurityError};
use zeroize::Zeroizing;

/// Minimum IV size for CCM mode, in bytes.
pub const CCM_MIN_IV_SIZE: usize = 7;
/// Maximum IV size for CCM mode, in bytes; larger IVs are truncated.
pub const CCM_MAX_IV_SIZE: usize = 13;
/// Minimum IV size for GCM mode, in bytes.
pub const GCM_MIN_IV_SIZE: usize = 1;

/// Configuration for password-derived keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedKeyParameters {
    /// Key derivation function.
    pub function: DerivedKeyFunction,
    /// PBKDF2 iteration count.
    pub iterations: u32,
    /// Size of keys produced by [`KeyGenerator::derived_key`], in bytes.
    pub key_size: usize,
    /// Smallest salt accepted for derivation, in bytes.
    pub min_salt_size: usize,
    /// Salt size used when the generator picks the salt, in bytes.
    pub default_salt_size: usize,
}

impl Default for DerivedKeyParameters {
    fn default() -> Self {
        Self {
            function: DerivedKeyFunction::Pbkdf2Sha256,
            iterations: 100_000,
            key_size: 32,
            min_salt_size: 8,
            default_salt_size: 16,
        }
    }
}

/// Configuration for symmetric material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymmetricKeyParameters {
    /// Suite used when the requester does not pick one.
    pub default_suite: CipherSuite,
    /// IV size used when the generator picks the IV, in bytes.
    pub default_iv_size: usize,
    /// Smallest key accepted, in bytes.
    pub min_key_size: usize,
    /// Keys below this size succeed with a warning, in bytes.
    pub default_key_size: usize,
}

impl Default for SymmetricKeyParameters {
    fn default() -> Self {
        Self {
            default_suite: CipherSuite::new(SymmetricCipher::Aes256, CipherMode::Gcm),
            default_iv_size: 12,
            min_key_size: 16,
            default_key_size: 32,
        }
    }
}

/// Configuration for key-exchange material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsymmetricKeyParameters {
    /// Curve used when the requester does not pick one.
    pub default_curve: EllipticCurve,
    /// Scrutiny applied to exchanged key material.
    pub validation_level: KeyValidationLevel,
}

impl Default for AsymmetricKeyParameters {
    fn default() -> Self {
        Self {
            default_curve: EllipticCurve::X25519,
            validation_level: KeyValidationLevel::Low,
        }
    }
}

/// Full key generator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KeyGeneratorConfig {
    /// Derived key parameters.
    pub derived: DerivedKeyParameters,
    /// Symmetric key parameters.
    pub symmetric: SymmetricKeyParameters,
    /// Key exchange parameters.
    pub asymmetric: AsymmetricKeyParameters,
}

/// Configured producer of crypto material.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    derived: DerivedKeyParameters,
    symmetric: SymmetricKeyParameters,
    asymmetric: AsymmetricKeyParameters,
}

impl KeyGenerator {
    /// Validates the configuration and builds a generator.
    pub fn new(config: KeyGeneratorConfig) -> Result<Self> {
        if config.derived.min_salt_size > config.derived.default_salt_size {
            return Err(SecurityError::InvalidArgument(
                "default derived-key salt size must be at least the minimum salt size".into(),
            ));
        }
        if config.symmetric.min_key_size > config.symmetric.default_key_size {
            return Err(SecurityError::InvalidArgument(
                "default symmetric key size must be at least the minimum key size".into(),
            ));
        }
        if config.derived.iterations == 0 {
            return Err(SecurityError::InvalidArgument(
                "derived-key iteration count must be non-zero".into(),
            ));
        }

        Ok(Self {
            derived: config.derived,
            symmetric: config.symmetric,
            asymmetric: config.asymmetric,
        })
    }

    /// Curve used when a request does not pick one.
    pub fn default_curve(&self) -> EllipticCurve {
        self.asymmetric.default_curve
    }

    /// Suite used when a request does not pick one.
    pub fn default_suite(&self) -> CipherSuite {
        self.symmetric.default_suite
    }

    /// Generates a fresh IV of the default (or requested) size.
    pub fn random_iv(&self, size: Option<usize>) -> Vec<u8> {
        random_salt(size.unwrap_or(self.symmetric.default_iv_size))
    }

    /// Generates a fresh key for `cipher`.
    pub fn random_key(&self, cipher: SymmetricCipher) -> Result<Vec<u8>> {
        self.check_key_size(cipher.key_size())?;
        Ok(random_salt(cipher.key_size()))
    }

    /// New symmetric material with the default suite and fresh key + IV.
    pub fn symmetric_material(&self) -> Result<SymmetricMaterial> {
        self.symmetric_material_with(self.symmetric.default_suite)
    }

    /// New symmetric material with fresh key + IV for a chosen suite.
    pub fn symmetric_material_with(&self, suite: CipherSuite) -> Result<SymmetricMaterial> {
        let key = self.random_key(suite.cipher)?;
        let iv = self.random_iv(None);
        self.validate_iv(suite.mode, &iv)?;
        SymmetricMaterial::create(suite, key, iv, None)
    }

    /// Symmetric material from an existing key and IV.
    pub fn symmetric_material_from_parts(
        &self,
        suite: Option<CipherSuite>,
        key: Vec<u8>,
        iv: Vec<u8>,
    ) -> Result<SymmetricMaterial> {
        let suite = suite.unwrap_or(self.symmetric.default_suite);
        self.check_key_size(key.len())?;
        self.validate_iv(suite.mode, &iv)?;
        SymmetricMaterial::create(suite, key, iv, None)
    }

    /// New material derived from a passphrase, with a fresh salt and IV.
    pub fn material_from_passphrase(
        &self,
        suite: Option<CipherSuite>,
        passphrase: &str,
    ) -> Result<SymmetricMaterial> {
        let salt = random_salt(self.derived.default_salt_size);
        let iv = self.random_iv(None);
        self.material_from_passphrase_with(suite, passphrase, None, &salt, &iv)
    }

    /// Material re-derived from a passphrase with existing salt and IV.
    pub fn material_from_passphrase_with(
        &self,
        suite: Option<CipherSuite>,
        passphrase: &str,
        iterations: Option<u32>,
        salt: &[u8],
        iv: &[u8],
    ) -> Result<SymmetricMaterial> {
        if salt.len() < self.derived.min_salt_size {
            return Err(SecurityError::InvalidArgument(format!(
                "derivation salt of {} byte(s) is below the minimum of {}",
                salt.len(),
                self.derived.min_salt_size
            )));
        }

        let suite = suite.unwrap_or(self.symmetric.default_suite);
        self.validate_iv(suite.mode, iv)?;

        let key = derive_key(
            self.derived.function,
            passphrase,
            salt,
            iterations.unwrap_or(self.derived.iterations),
            suite.cipher.key_size(),
        );
        let mut material =
            SymmetricMaterial::create(suite, key.to_vec(), iv.to_vec(), None)?;
        material.set_salt(salt.to_vec());
        Ok(material)
    }

    /// Derives a standalone key of the configured size from a passphrase.
    pub fn derived_key(&self, passphrase: &str, salt: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if salt.len() < self.derived.min_salt_size {
            return Err(SecurityError::InvalidArgument(format!(
                "derivation salt of {} byte(s) is below the minimum of {}",
                salt.len(),
                self.derived.min_salt_size
            )));
        }
        Ok(derive_key(
            self.derived.function,
            passphrase,
            salt,
            self.derived.iterations,
            self.derived.key_size,
        ))
    }

    /// Material agreed through a Diffie-Hellman exchange.
    ///
    /// With no IV supplied, both key and IV are stretched from the shared
    /// secret, so the two parties end up with identical material.
    pub fn exchange_material(
        &self,
        curve: Option<EllipticCurve>,
        private: &[u8],
        peer_public: &[u8],
        iv: Option<&[u8]>,
        suite: Option<CipherSuite>,
    ) -> Result<SymmetricMaterial> {
        let curve = curve.unwrap_or(self.asymmetric.default_curve);
        let suite = suite.unwrap_or(self.symmetric.default_suite);
        let secret = exchange::shared_secret(
            curve,
            private,
            peer_public,
            self.asymmetric.validation_level,
        )?;

        let key_size = suite.cipher.key_size();
        match iv {
            Some(iv) => {
                self.validate_iv(suite.mode, iv)?;
                let (key, _) = exchange::stretch_shared_secret(&secret, key_size, 0)?;
                SymmetricMaterial::create(suite, key.to_vec(), iv.to_vec(), None)
            }
            None => {
                let (key, iv) = exchange::stretch_shared_secret(
                    &secret,
                    key_size,
                    self.symmetric.default_iv_size,
                )?;
                SymmetricMaterial::create(suite, key.to_vec(), iv, None)
            }
        }
    }

    fn check_key_size(&self, key_size: usize) -> Result<()> {
        if key_size < self.symmetric.min_key_size {
            return Err(SecurityError::InvalidArgument(format!(
                "symmetric key of {key_size} byte(s) is below the minimum of {}",
                self.symmetric.min_key_size
            )));
        }
        if key_size < self.symmetric.default_key_size {
            tracing::warn!(
                key_size,
                default = self.symmetric.default_key_size,
                "symmetric key is smaller than the default key size"
            );
        }
        Ok(())
    }

    fn validate_iv(&self, mode: CipherMode, iv: &[u8]) -> Result<()> {
        match mode {
            CipherMode::Gcm => {
                if iv.len() < GCM_MIN_IV_SIZE {
                    return Err(SecurityError::InvalidArgument(
                        "GCM requires a non-empty IV".into(),
                    ));
                }
            }
            CipherMode::Ccm => {
                if iv.len() < CCM_MIN_IV_SIZE {
                    return Err(SecurityError::InvalidArgument(format!(
                        "CCM requires an IV of at least {CCM_MIN_IV_SIZE} byte(s)"
                    )));
                }
                if iv.len() > CCM_MAX_IV_SIZE {
                    tracing::warn!(
                        iv_len = iv.len(),
                        max = CCM_MAX_IV_SIZE,
                        "IV too large for CCM; it will be truncated"
                    );
                }
            }
            CipherMode::Eax => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn generator() -> KeyGenerator {
        KeyGenerator::new(KeyGeneratorConfig::default()).unwrap()
    }

    #[test]
    fn inconsistent_configuration_is_rejected() {
        let mut config = KeyGeneratorConfig::default();
        config.derived.min_salt_size = 32;
        config.derived.default_salt_size = 16;
        assert_matches!(
            KeyGenerator::new(config),
            Err(SecurityError::InvalidArgument(_))
        );

        let mut config = KeyGeneratorConfig::default();
        config.symmetric.min_key_size = 64;
        assert_matches!(
            KeyGenerator::new(config),
            Err(SecurityError::InvalidArgument(_))
        );
    }

    #[test]
    fn default_material_round_trips() {
        let material = generator().symmetric_material().unwrap();
        let sealed = material.encryptor().seal(b"data").unwrap();
        assert_eq!(material.decryptor().open(&sealed).unwrap(), b"data");
        assert_eq!(material.key().len(), 32);
        assert_eq!(material.iv().len(), 12);
    }

    #[test]
    fn undersized_keys_are_rejected() {
        let result =
            generator().symmetric_material_from_parts(None, vec![1u8; 8], vec![1u8; 12]);
        assert_matches!(result, Err(SecurityError::InvalidArgument(_)));
    }

    #[test]
    fn minimum_sized_key_below_default_is_accepted() {
        // 16 bytes is the configured minimum but below the 32-byte default;
        // the warning path must still produce working material.
        let suite = CipherSuite::new(SymmetricCipher::Aes128, CipherMode::Gcm);
        let material = generator()
            .symmetric_material_from_parts(Some(suite), vec![1u8; 16], vec![1u8; 12])
            .unwrap();
        let sealed = material.encryptor().seal(b"data").unwrap();
        assert_eq!(material.decryptor().open(&sealed).unwrap(), b"data");
    }

    #[test]
    fn iv_policy_per_mode() {
        let generator = generator();
        let gcm = CipherSuite::new(SymmetricCipher::Aes256, CipherMode::Gcm);
        let ccm = CipherSuite::new(SymmetricCipher::Aes256, CipherMode::Ccm);
        let eax = CipherSuite::new(SymmetricCipher::Aes256, CipherMode::Eax);

        assert_matches!(
            generator.symmetric_material_from_parts(Some(gcm), vec![1u8; 32], vec![]),
            Err(SecurityError::InvalidArgument(_))
        );
        assert_matches!(
            generator.symmetric_material_from_parts(Some(ccm), vec![1u8; 32], vec![1u8; 5]),
            Err(SecurityError::InvalidArgument(_))
        );
        // Oversized CCM IVs are truncated, not rejected.
        assert!(generator
            .symmetric_material_from_parts(Some(ccm), vec![1u8; 32], vec![1u8; 16])
            .is_ok());
        // EAX takes anything, including an empty IV.
        assert!(generator
            .symmetric_material_from_parts(Some(eax), vec![1u8; 32], vec![])
            .is_ok());
    }

    #[test]
    fn passphrase_material_reproduces_with_same_salt_and_iv() {
        let generator = generator();
        let first = generator
            .material_from_passphrase(None, "correct horse")
            .unwrap();
        let salt = first.salt().unwrap().to_vec();
        let iv = first.iv().to_vec();

        let second = generator
            .material_from_passphrase_with(None, "correct horse", None, &salt, &iv)
            .unwrap();
        assert_eq!(first.key(), second.key());

        let sealed = first.encryptor().seal(b"data").unwrap();
        assert_eq!(second.decryptor().open(&sealed).unwrap(), b"data");
    }

    #[test]
    fn undersized_derivation_salt_is_rejected() {
        let result = generator().material_from_passphrase_with(
            None,
            "pass",
            None,
            &[1, 2, 3],
            &[1u8; 12],
        );
        assert_matches!(result, Err(SecurityError::InvalidArgument(_)));
    }

    #[test]
    fn exchange_material_matches_on_both_sides() {
        let generator = generator();
        for curve in [EllipticCurve::X25519, EllipticCurve::P256] {
            let (private_a, public_a) = crate::exchange::generate_keypair(curve);
            let (private_b, public_b) = crate::exchange::generate_keypair(curve);

            let side_a = generator
                .exchange_material(Some(curve), &private_a, &public_b, None, None)
                .unwrap();
            let side_b = generator
                .exchange_material(Some(curve), &private_b, &public_a, None, None)
                .unwrap();

            assert_eq!(side_a.key(), side_b.key());
            assert_eq!(side_a.iv(), side_b.iv());

            let sealed = side_a.encryptor().seal(b"handshake").unwrap();
            assert_eq!(side_b.decryptor().open(&sealed).unwrap(), b"handshake");
        }
    }
}
