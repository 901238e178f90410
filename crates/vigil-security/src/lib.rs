//! # Vigil Security
//!
//! The security manager and its supporting machinery: name and password
//! rules, the two-level entity cache, progressive failed-authentication
//! delays, and the request types posted by other components.
//!
//! The manager serializes authentication, authorization and cache
//! mutation behind one primary lock; rule sets have their own locks and
//! key generation releases the primary lock before doing CPU-bound work.

#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod delay;
pub mod manager;
pub mod requests;
pub mod rules;

pub use cache::{CacheEvictionPolicy, EntityCache};
pub use config::{PasswordHashingConfig, SecurityConfig};
pub use delay::{DelayEscalation, FailedAuthDelay};
pub use manager::{RequestStats, SecurityManager};
pub use requests::{
    AuthorizationRequest, DerivedKeyRequest, DeviceAuthenticationRequest, KeyExchangeRequest,
    SymmetricKeyRequest, UserAuthenticationRequest,
};
pub use rules::{NameRule, PasswordRule};
