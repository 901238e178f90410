//! # Vigil Crypto
//!
//! Wraps the cryptographic primitives the security core consumes:
//! salted password hashing, CSPRNG salts, PBKDF2 key derivation,
//! authenticated symmetric material and Diffie-Hellman key exchange.
//!
//! Nothing in this crate holds long-lived state; the [`KeyGenerator`]
//! carries configuration only and every operation is a pure function of
//! its inputs plus OS randomness.

#![forbid(unsafe_code)]

pub mod exchange;
pub mod generator;
pub mod hash;
pub mod kdf;
pub mod material;
pub mod salt;

pub use exchange::{generate_keypair, EllipticCurve, KeyValidationLevel};
pub use generator::{
    AsymmetricKeyParameters, DerivedKeyParameters, KeyGenerator, KeyGeneratorConfig,
    SymmetricKeyParameters,
};
pub use hash::{build_password_blob, hash_password, verify_password_blob, HashAlgorithm};
pub use kdf::{derive_key, DerivedKeyFunction};
pub use material::{
    CipherMode, CipherSuite, Decryptor, Encryptor, SymmetricCipher, SymmetricMaterial,
};
pub use salt::random_salt;
