//! Access levels and component/set kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Access level attached to a user record.
///
/// Ordering is part of the contract: authorization compares a user's level
/// against the minimum level required by an instruction set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum AccessLevel {
    /// No access; such users never pass authentication.
    #[default]
    None,
    /// Regular user.
    User,
    /// Administrative user.
    Admin,
}

/// Kind of a securable backend component.
///
/// At most one component per kind may be registered with the security
/// manager at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// Persistence layer front-end.
    DatabaseManager,
    /// The security manager itself.
    SecurityManager,
    /// Wire/transport layer.
    NetworkManager,
    /// Data-pool storage layer.
    StorageManager,
    /// Session lifecycle manager.
    SessionManager,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DatabaseManager => "database-manager",
            Self::SecurityManager => "security-manager",
            Self::NetworkManager => "network-manager",
            Self::StorageManager => "storage-manager",
            Self::SessionManager => "session-manager",
        };
        f.write_str(name)
    }
}

/// Namespace of related instructions.
///
/// Access policy is granted per set, not per instruction; a user's
/// authorization rules are a set of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InstructionSetKind {
    /// Connection/network control instructions.
    ConnectionManager,
    /// Database administration instructions.
    DatabaseManager,
    /// Storage-pool instructions.
    StorageManager,
    /// Session manager instructions.
    SessionManager,
    /// User entity administration instructions.
    UserManager,
    /// Device entity administration instructions.
    DeviceManager,
}

impl fmt::Display for InstructionSetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ConnectionManager => "connection-manager",
            Self::DatabaseManager => "database-manager",
            Self::StorageManager => "storage-manager",
            Self::SessionManager => "session-manager",
            Self::UserManager => "user-manager",
            Self::DeviceManager => "device-manager",
        };
        f.write_str(name)
    }
}
