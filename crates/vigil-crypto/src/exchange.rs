//! Diffie-Hellman key exchange.
//!
//! Derives a shared secret from a local private key and a peer public
//! key, then stretches it with HKDF-SHA-256 into symmetric key and IV
//! bytes. Key encodings are raw scalar bytes for X25519 and SEC1 for
//! P-256.

use hkdf::Hkdf;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use vigil_core::{Result, SecurityError};
use zeroize::Zeroizing;

/// Domain separation for the HKDF expansion.
const EXCHANGE_CONTEXT: &[u8] = b"vigil.exchange.v1";

/// Supported curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EllipticCurve {
    /// Curve25519 in Montgomery form.
    X25519,
    /// NIST P-256.
    P256,
}

/// How much scrutiny key material gets before use.
///
/// `Basic` accepts anything structurally valid; `Low` and above reject
/// degenerate exchanges (non-contributory / all-zero shared secrets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyValidationLevel {
    /// Structural checks only.
    Basic,
    /// Reject degenerate shared secrets.
    Low,
    /// Reserved for stricter policies.
    High,
    /// Reserved for the strictest policies.
    Full,
}

/// Generates a fresh keypair for `curve`.
///
/// Returns `(private, public)` in the curve's wire encoding.
pub fn generate_keypair(curve: EllipticCurve) -> (Zeroizing<Vec<u8>>, Vec<u8>) {
    match curve {
        EllipticCurve::X25519 => {
            let secret = x25519_dalek::StaticSecret::random_from_rng(OsRng);
            let public = x25519_dalek::PublicKey::from(&secret);
            (
                Zeroizing::new(secret.to_bytes().to_vec()),
                public.as_bytes().to_vec(),
            )
        }
        EllipticCurve::P256 => {
            let secret = p256::SecretKey::random(&mut OsRng);
            let public = secret.public_key();
            (
                Zeroizing::new(secret.to_bytes().to_vec()),
                public.to_sec1_bytes().into_vec(),
            )
        }
    }
}

/// Computes the raw shared secret between `private` and `peer_public`.
pub fn shared_secret(
    curve: EllipticCurve,
    private: &[u8],
    peer_public: &[u8],
    validation: KeyValidationLevel,
) -> Result<Zeroizing<Vec<u8>>> {
    let secret = match curve {
        EllipticCurve::X25519 => {
            let private: [u8; 32] = private.try_into().map_err(|_| {
                SecurityError::InvalidArgument("X25519 private keys are 32 bytes".into())
            })?;
            let peer_public: [u8; 32] = peer_public.try_into().map_err(|_| {
                SecurityError::InvalidArgument("X25519 public keys are 32 bytes".into())
            })?;

            let secret = x25519_dalek::StaticSecret::from(private);
            let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(peer_public));
            if validation >= KeyValidationLevel::Low && !shared.was_contributory() {
                return Err(SecurityError::InvalidArgument(
                    "non-contributory X25519 exchange".into(),
                ));
            }
            Zeroizing::new(shared.as_bytes().to_vec())
        }
        EllipticCurve::P256 => {
            let secret = p256::SecretKey::from_slice(private).map_err(|_| {
                SecurityError::InvalidArgument("malformed P-256 private key".into())
            })?;
            let peer = p256::PublicKey::from_sec1_bytes(peer_public).map_err(|_| {
                SecurityError::InvalidArgument("malformed P-256 public key".into())
            })?;

            let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
            let bytes = Zeroizing::new(shared.raw_secret_bytes().to_vec());
            if validation >= KeyValidationLevel::Low && bytes.iter().all(|byte| *byte == 0) {
                return Err(SecurityError::InvalidArgument(
                    "degenerate P-256 exchange".into(),
                ));
            }
            bytes
        }
    };

    Ok(secret)
}

/// Stretches a shared secret into `(key, iv)` material.
pub fn stretch_shared_secret(
    secret: &[u8],
    key_size: usize,
    iv_size: usize,
) -> Result<(Zeroizing<Vec<u8>>, Vec<u8>)> {
    let kdf = Hkdf::<Sha256>::new(None, secret);
    let mut output = Zeroizing::new(vec![0u8; key_size + iv_size]);
    kdf.expand(EXCHANGE_CONTEXT, &mut output).map_err(|_| {
        SecurityError::InvalidArgument("requested key+iv material is too long".into())
    })?;

    let key = Zeroizing::new(output[..key_size].to_vec());
    let iv = output[key_size..].to_vec();
    Ok((key, iv))
}
