//! Security manager configuration.

use crate::cache::CacheEvictionPolicy;
use crate::delay::{DelayEscalation, FailedAuthDelay};
use crate::rules::{NameRule, PasswordRule};
use serde::{Deserialize, Serialize};
use vigil_core::Seconds;
use vigil_crypto::{HashAlgorithm, KeyGeneratorConfig};

/// Password hashing parameters for users and devices.
///
/// The salt sizes double as the split point of stored password blobs, so
/// a configuration rotation keeps the outgoing parameters around as the
/// *previous* configuration until every stored hash has been rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHashingConfig {
    /// Salt size for user passwords, in bytes.
    pub user_salt_size: usize,
    /// Salt size for device passwords, in bytes.
    pub device_salt_size: usize,
    /// Digest algorithm for user passwords.
    pub user_algorithm: HashAlgorithm,
    /// Digest algorithm for device passwords.
    pub device_algorithm: HashAlgorithm,
}

impl Default for PasswordHashingConfig {
    fn default() -> Self {
        Self {
            user_salt_size: 16,
            device_salt_size: 16,
            user_algorithm: HashAlgorithm::Sha256,
            device_algorithm: HashAlgorithm::Sha256,
        }
    }
}

/// Full security manager configuration.
#[derive(Debug, Default)]
pub struct SecurityConfig {
    /// Worker tasks in the manager's pool.
    pub thread_pool_size: usize,
    /// User cache capacity; zero means unbounded.
    pub max_user_cache_entries: usize,
    /// Device cache capacity; zero means unbounded.
    pub max_device_cache_entries: usize,
    /// Eviction policy for the user cache.
    pub user_eviction: CacheEvictionPolicy,
    /// Eviction policy for the device cache.
    pub device_eviction: CacheEvictionPolicy,
    /// Random signature size for authorization tokens, in bytes.
    pub authorization_token_signature_size: usize,
    /// Random signature size for authentication tokens, in bytes.
    pub authentication_token_signature_size: usize,
    /// Authentication token validity, in seconds.
    pub authentication_token_validity: Seconds,
    /// Failed-authentication delay policy for users.
    pub user_delay: FailedAuthDelay,
    /// Failed-authentication delay policy for devices.
    pub device_delay: FailedAuthDelay,
    /// Hashing parameters used for new hashes and first-try verification.
    pub hashing: PasswordHashingConfig,
    /// Compatibility parameters from before the last rotation, if any.
    pub previous_hashing: Option<PasswordHashingConfig>,
    /// Key generator parameter bundles.
    pub key_generator: KeyGeneratorConfig,
    /// Initial user name rules.
    pub user_name_rules: Vec<NameRule>,
    /// Initial device name rules.
    pub device_name_rules: Vec<NameRule>,
    /// Initial user password rules.
    pub user_password_rules: Vec<PasswordRule>,
    /// Initial device password rules.
    pub device_password_rules: Vec<PasswordRule>,
}

impl Default for CacheEvictionPolicy {
    fn default() -> Self {
        Self::Lru
    }
}

impl Default for FailedAuthDelay {
    fn default() -> Self {
        Self {
            base: 2,
            escalation: DelayEscalation::Linear,
            max_attempts: 0,
            ignored_attempts: 1,
        }
    }
}

impl SecurityConfig {
    /// A configuration suitable for tests and small deployments.
    pub fn with_defaults() -> Self {
        Self {
            thread_pool_size: 2,
            authorization_token_signature_size: 32,
            authentication_token_signature_size: 32,
            authentication_token_validity: 300,
            ..Self::default()
        }
    }
}
