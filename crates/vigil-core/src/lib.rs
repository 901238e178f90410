//! # Vigil Core
//!
//! Shared foundation for the Vigil security/session core: identifiers,
//! entity records, tokens, the securable-component contract, persistence
//! traits and the worker pool used by the managers.
//!
//! The crates above this one are organized per concern:
//!
//! - `vigil-crypto`: hashing, key derivation and symmetric material
//! - `vigil-instructions`: instruction sets and the dispatcher
//! - `vigil-security`: credential validation and authorization
//! - `vigil-sessions`: session lifecycle and expiration
//!
//! Everything here is intentionally free of policy; the managers own the
//! behavior, this crate owns the vocabulary.

#![forbid(unsafe_code)]

pub mod access;
pub mod error;
pub mod identifiers;
pub mod memory;
pub mod persistence;
pub mod pool;
pub mod records;
pub mod securable;
pub mod tokens;

pub use access::{AccessLevel, ComponentKind, InstructionSetKind};
pub use error::{Result, Seconds, SecurityError};
pub use identifiers::{DeviceId, RuleId, SessionId, SourceId, TokenId, UserId};
pub use memory::MemoryStore;
pub use persistence::{DeviceStore, SessionStore, UserStore};
pub use pool::TaskPool;
pub use records::{DeviceRecord, SessionKind, SessionRecord, TransferKind, UserRecord};
pub use securable::{Securable, TokenVault};
pub use tokens::{AuthenticationToken, AuthorizationToken};
