//! Symmetric crypto material: ciphers, modes and sealed/opened payloads.
//!
//! A [`SymmetricMaterial`] bundles the IV, the optional salt, the key and
//! a paired encryptor/decryptor, all produced by the same generation
//! call. The RustCrypto AEAD constructions fix the nonce width per mode,
//! so the stored IV is normalized (truncated or zero-padded) to the
//! mode's width when the handles are built; IV *policy* (minimum sizes,
//! CCM truncation warnings) is enforced by the key generator before the
//! material is created.

use aes_gcm::aead::consts::{U13, U16};
use aes_gcm::aead::generic_array::typenum::Unsigned;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use vigil_core::{Result, SecurityError};
use zeroize::Zeroizing;

type Aes128Ccm = ccm::Ccm<aes::Aes128, U16, U13>;
type Aes256Ccm = ccm::Ccm<aes::Aes256, U16, U13>;
type Aes128Eax = eax::Eax<aes::Aes128>;
type Aes256Eax = eax::Eax<aes::Aes256>;

/// Supported symmetric block ciphers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymmetricCipher {
    /// AES with a 128-bit key.
    Aes128,
    /// AES with a 256-bit key.
    Aes256,
}

impl SymmetricCipher {
    /// Exact key size the cipher requires, in bytes.
    pub fn key_size(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes256 => 32,
        }
    }
}

impl fmt::Display for SymmetricCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aes128 => f.write_str("aes-128"),
            Self::Aes256 => f.write_str("aes-256"),
        }
    }
}

/// Supported authenticated cipher modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherMode {
    /// Galois/Counter Mode.
    Gcm,
    /// Counter with CBC-MAC.
    Ccm,
    /// Encrypt-then-authenticate-then-translate.
    Eax,
}

impl CipherMode {
    /// Nonce width of the underlying construction, in bytes.
    pub fn nonce_width(self) -> usize {
        match self {
            Self::Gcm => 12,
            Self::Ccm => 13,
            Self::Eax => 16,
        }
    }
}

impl fmt::Display for CipherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gcm => f.write_str("gcm"),
            Self::Ccm => f.write_str("ccm"),
            Self::Eax => f.write_str("eax"),
        }
    }
}

/// Cipher plus mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherSuite {
    /// Block cipher.
    pub cipher: SymmetricCipher,
    /// Authenticated mode.
    pub mode: CipherMode,
}

impl CipherSuite {
    /// Shorthand constructor.
    pub fn new(cipher: SymmetricCipher, mode: CipherMode) -> Self {
        Self { cipher, mode }
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.cipher, self.mode)
    }
}

/// Object-safe facade over the concrete AEAD constructions.
trait AeadBackend: Send + Sync {
    fn seal(&self, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;
    fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;
}

impl<A> AeadBackend for A
where
    A: Aead + Send + Sync,
{
    fn seal(&self, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        if nonce.len() != A::NonceSize::to_usize() {
            return Err(SecurityError::LogicError(format!(
                "nonce width {} does not match the construction ({})",
                nonce.len(),
                A::NonceSize::to_usize()
            )));
        }
        self.encrypt(GenericArray::from_slice(nonce), plaintext)
            .map_err(|_| SecurityError::InvalidArgument("sealing failed".into()))
    }

    fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if nonce.len() != A::NonceSize::to_usize() {
            return Err(SecurityError::LogicError(format!(
                "nonce width {} does not match the construction ({})",
                nonce.len(),
                A::NonceSize::to_usize()
            )));
        }
        self.decrypt(GenericArray::from_slice(nonce), ciphertext)
            .map_err(|_| SecurityError::InvalidArgument("opening failed; payload rejected".into()))
    }
}

/// Truncates or zero-pads an IV to the construction's nonce width.
fn normalized_nonce(iv: &[u8], width: usize) -> Vec<u8> {
    let mut nonce = vec![0u8; width];
    let take = iv.len().min(width);
    nonce[..take].copy_from_slice(&iv[..take]);
    nonce
}

/// Sealing half of a material's cipher pair.
#[derive(Clone)]
pub struct Encryptor {
    backend: Arc<dyn AeadBackend>,
    nonce: Vec<u8>,
}

impl Encryptor {
    /// Encrypts and authenticates a payload.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.backend.seal(&self.nonce, plaintext)
    }
}

impl fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encryptor").finish_non_exhaustive()
    }
}

/// Opening half of a material's cipher pair.
#[derive(Clone)]
pub struct Decryptor {
    backend: Arc<dyn AeadBackend>,
    nonce: Vec<u8>,
}

impl Decryptor {
    /// Verifies and decrypts a payload.
    pub fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.backend.open(&self.nonce, ciphertext)
    }
}

impl fmt::Debug for Decryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decryptor").finish_non_exhaustive()
    }
}

/// IV, optional salt, key and the paired cipher handles.
#[derive(Clone)]
pub struct SymmetricMaterial {
    suite: CipherSuite,
    iv: Vec<u8>,
    salt: Option<Vec<u8>>,
    key: Zeroizing<Vec<u8>>,
    encryptor: Encryptor,
    decryptor: Decryptor,
}

impl SymmetricMaterial {
    /// Builds material from its parts.
    ///
    /// The key must have the exact size the cipher requires; IV policy is
    /// the generator's responsibility.
    pub(crate) fn create(
        suite: CipherSuite,
        key: Vec<u8>,
        iv: Vec<u8>,
        salt: Option<Vec<u8>>,
    ) -> Result<Self> {
        if key.len() != suite.cipher.key_size() {
            return Err(SecurityError::InvalidArgument(format!(
                "key size {} is invalid for {} (expected {})",
                key.len(),
                suite.cipher,
                suite.cipher.key_size()
            )));
        }

        let backend: Arc<dyn AeadBackend> = match (suite.cipher, suite.mode) {
            (SymmetricCipher::Aes128, CipherMode::Gcm) => {
                Arc::new(Aes128Gcm::new(GenericArray::from_slice(&key)))
            }
            (SymmetricCipher::Aes256, CipherMode::Gcm) => {
                Arc::new(Aes256Gcm::new(GenericArray::from_slice(&key)))
            }
            (SymmetricCipher::Aes128, CipherMode::Ccm) => {
                Arc::new(Aes128Ccm::new(GenericArray::from_slice(&key)))
            }
            (SymmetricCipher::Aes256, CipherMode::Ccm) => {
                Arc::new(Aes256Ccm::new(GenericArray::from_slice(&key)))
            }
            (SymmetricCipher::Aes128, CipherMode::Eax) => {
                Arc::new(Aes128Eax::new(GenericArray::from_slice(&key)))
            }
            (SymmetricCipher::Aes256, CipherMode::Eax) => {
                Arc::new(Aes256Eax::new(GenericArray::from_slice(&key)))
            }
        };

        let nonce = normalized_nonce(&iv, suite.mode.nonce_width());
        Ok(Self {
            suite,
            iv,
            salt,
            key: Zeroizing::new(key),
            encryptor: Encryptor {
                backend: Arc::clone(&backend),
                nonce: nonce.clone(),
            },
            decryptor: Decryptor { backend, nonce },
        })
    }

    /// Cipher suite the material was built for.
    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    /// Initialization vector as supplied or generated.
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Derivation salt, when the key came from a passphrase.
    pub fn salt(&self) -> Option<&[u8]> {
        self.salt.as_deref()
    }

    /// Symmetric key bytes.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Attaches a derivation salt if none is present yet.
    pub fn set_salt(&mut self, salt: Vec<u8>) {
        if self.salt.is_none() {
            self.salt = Some(salt);
        }
    }

    /// Sealing handle.
    pub fn encryptor(&self) -> &Encryptor {
        &self.encryptor
    }

    /// Opening handle.
    pub fn decryptor(&self) -> &Decryptor {
        &self.decryptor
    }
}

impl fmt::Debug for SymmetricMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricMaterial")
            .field("suite", &self.suite)
            .field("iv_len", &self.iv.len())
            .field("salt_len", &self.salt.as_ref().map(Vec::len))
            .field("key_len", &self.key.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite(cipher: SymmetricCipher, mode: CipherMode) -> CipherSuite {
        CipherSuite::new(cipher, mode)
    }

    #[test]
    fn every_mode_round_trips() {
        for mode in [CipherMode::Gcm, CipherMode::Ccm, CipherMode::Eax] {
            for cipher in [SymmetricCipher::Aes128, SymmetricCipher::Aes256] {
                let key = vec![7u8; cipher.key_size()];
                let material =
                    SymmetricMaterial::create(suite(cipher, mode), key, vec![1u8; 12], None)
                        .unwrap();

                let sealed = material.encryptor().seal(b"payload").unwrap();
                assert_ne!(sealed, b"payload");
                let opened = material.decryptor().open(&sealed).unwrap();
                assert_eq!(opened, b"payload");
            }
        }
    }

    #[test]
    fn tampered_payloads_are_rejected() {
        let material = SymmetricMaterial::create(
            suite(SymmetricCipher::Aes256, CipherMode::Gcm),
            vec![7u8; 32],
            vec![1u8; 12],
            None,
        )
        .unwrap();

        let mut sealed = material.encryptor().seal(b"payload").unwrap();
        sealed[0] ^= 0xff;
        assert!(matches!(
            material.decryptor().open(&sealed),
            Err(SecurityError::InvalidArgument(_))
        ));
    }

    #[test]
    fn wrong_key_size_is_rejected() {
        let result = SymmetricMaterial::create(
            suite(SymmetricCipher::Aes256, CipherMode::Gcm),
            vec![7u8; 16],
            vec![1u8; 12],
            None,
        );
        assert!(matches!(result, Err(SecurityError::InvalidArgument(_))));
    }

    #[test]
    fn salt_can_only_be_attached_once() {
        let mut material = SymmetricMaterial::create(
            suite(SymmetricCipher::Aes128, CipherMode::Eax),
            vec![7u8; 16],
            vec![1u8; 16],
            None,
        )
        .unwrap();

        material.set_salt(vec![1, 2, 3]);
        material.set_salt(vec![9, 9, 9]);
        assert_eq!(material.salt(), Some(&[1u8, 2, 3][..]));
    }
}
