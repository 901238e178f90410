//! Entity records: users, devices and sessions.
//!
//! Records are plain values owned by whoever fetched them; the entity
//! cache keeps its own copies and persistence is the source of truth.
//! Mutators that feed the lock-out policy live here so that every
//! manager updates the bookkeeping the same way.

use crate::access::{AccessLevel, InstructionSetKind};
use crate::identifiers::{DeviceId, SessionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A user known to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique user id.
    pub id: UserId,
    /// Unique user name.
    pub username: String,
    /// Stored password blob: `salt || hash`, split by the salt size of the
    /// hashing configuration that produced it.
    #[serde(with = "serde_bytes_hex")]
    pub password: Vec<u8>,
    /// Access level used by authorization.
    pub access_level: AccessLevel,
    /// Instruction sets the user may dispatch into.
    pub authorization_rules: BTreeSet<InstructionSetKind>,
    /// Explicit lock flag; locked users never authenticate.
    pub locked: bool,
    /// Consecutive failed authentication attempts.
    pub failed_auth_attempts: u32,
    /// Timestamp of the most recent failed attempt.
    pub last_failed_auth_at: Option<DateTime<Utc>>,
    /// Timestamp of the most recent successful attempt.
    pub last_success_auth_at: Option<DateTime<Utc>>,
    /// Set by administrative action; surfaces to the entity manager.
    pub force_password_reset: bool,
}

impl UserRecord {
    /// Creates a record with empty bookkeeping.
    pub fn new(id: UserId, username: impl Into<String>, password: Vec<u8>) -> Self {
        Self {
            id,
            username: username.into(),
            password,
            access_level: AccessLevel::User,
            authorization_rules: BTreeSet::new(),
            locked: false,
            failed_auth_attempts: 0,
            last_failed_auth_at: None,
            last_success_auth_at: None,
            force_password_reset: false,
        }
    }

    /// Builder-style access level override.
    pub fn with_access_level(mut self, level: AccessLevel) -> Self {
        self.access_level = level;
        self
    }

    /// Builder-style authorization rule grant.
    pub fn with_rule(mut self, set: InstructionSetKind) -> Self {
        self.authorization_rules.insert(set);
        self
    }

    /// Flips the lock flag; returns whether the record changed.
    pub fn set_locked(&mut self, locked: bool) -> bool {
        if self.locked == locked {
            return false;
        }
        self.locked = locked;
        true
    }

    /// Records a failed authentication attempt at `now`.
    pub fn register_failed_auth(&mut self, now: DateTime<Utc>) {
        self.failed_auth_attempts = self.failed_auth_attempts.saturating_add(1);
        self.last_failed_auth_at = Some(now);
    }

    /// Records a successful authentication at `now` and clears the
    /// failed-attempt counter.
    pub fn register_successful_auth(&mut self, now: DateTime<Utc>) {
        self.failed_auth_attempts = 0;
        self.last_success_auth_at = Some(now);
    }
}

/// Direction of data transfers a device participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    /// Device pushes data to the server.
    Push,
    /// Device pulls data from the server.
    Pull,
}

/// A registered device, always owned by an existing user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Unique device id.
    pub id: DeviceId,
    /// Owning user; every device references an existing user record.
    pub owner: UserId,
    /// Human-readable device name.
    pub name: String,
    /// Stored password blob, same layout as on user records.
    #[serde(with = "serde_bytes_hex")]
    pub password: Vec<u8>,
    /// Transfer direction of the device.
    pub transfer: TransferKind,
    /// Last known address of the device.
    pub ip_address: String,
    /// Last known port of the device.
    pub ip_port: u16,
    /// Explicit lock flag.
    pub locked: bool,
    /// Consecutive failed authentication attempts.
    pub failed_auth_attempts: u32,
    /// Timestamp of the most recent failed attempt.
    pub last_failed_auth_at: Option<DateTime<Utc>>,
    /// Timestamp of the most recent successful attempt.
    pub last_success_auth_at: Option<DateTime<Utc>>,
    /// Free-form descriptive text.
    pub info: String,
}

impl DeviceRecord {
    /// Creates a record with empty bookkeeping.
    pub fn new(id: DeviceId, owner: UserId, name: impl Into<String>, password: Vec<u8>) -> Self {
        Self {
            id,
            owner,
            name: name.into(),
            password,
            transfer: TransferKind::Push,
            ip_address: String::new(),
            ip_port: 0,
            locked: false,
            failed_auth_attempts: 0,
            last_failed_auth_at: None,
            last_success_auth_at: None,
            info: String::new(),
        }
    }

    /// Flips the lock flag; returns whether the record changed.
    pub fn set_locked(&mut self, locked: bool) -> bool {
        if self.locked == locked {
            return false;
        }
        self.locked = locked;
        true
    }

    /// Records a failed authentication attempt at `now`.
    pub fn register_failed_auth(&mut self, now: DateTime<Utc>) {
        self.failed_auth_attempts = self.failed_auth_attempts.saturating_add(1);
        self.last_failed_auth_at = Some(now);
    }

    /// Records a successful authentication at `now` and clears the
    /// failed-attempt counter.
    pub fn register_successful_auth(&mut self, now: DateTime<Utc>) {
        self.failed_auth_attempts = 0;
        self.last_success_auth_at = Some(now);
    }
}

/// Kind of traffic a session carries.
///
/// Command sessions count commands, data sessions count bytes; the two
/// sets of counters never mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    /// Control-channel session.
    Command,
    /// Bulk-transfer session.
    Data,
}

/// Persisted state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Internal session id, assigned by the session manager.
    pub id: SessionId,
    /// Session kind.
    pub kind: SessionKind,
    /// User the session belongs to.
    pub user: UserId,
    /// Device the session belongs to, absent for user-scoped sessions.
    pub device: Option<DeviceId>,
    /// Persistent sessions are immune to the inactivity timeout.
    pub persistent: bool,
    /// Cleared once the session is closed.
    pub active: bool,
    /// When the session was opened.
    pub opened_at: DateTime<Utc>,
    /// When the session was closed, if it was.
    pub closed_at: Option<DateTime<Utc>>,
    /// Last time any activity was recorded on the session.
    pub last_activity_at: DateTime<Utc>,
    /// Bytes sent (data sessions only).
    pub data_sent: u64,
    /// Bytes received (data sessions only).
    pub data_received: u64,
    /// Commands sent (command sessions only).
    pub commands_sent: u64,
    /// Commands received (command sessions only).
    pub commands_received: u64,
}

impl SessionRecord {
    /// Creates an open session record.
    pub fn new(
        id: SessionId,
        kind: SessionKind,
        user: UserId,
        device: Option<DeviceId>,
        persistent: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            user,
            device,
            persistent,
            active: true,
            opened_at: now,
            closed_at: None,
            last_activity_at: now,
            data_sent: 0,
            data_received: 0,
            commands_sent: 0,
            commands_received: 0,
        }
    }

    /// Marks the session closed.
    pub fn close(&mut self, now: DateTime<Utc>) {
        self.active = false;
        self.closed_at = Some(now);
    }

    /// Adds to the sent-data counter and touches the activity timestamp.
    pub fn add_data_sent(&mut self, amount: u64, now: DateTime<Utc>) {
        self.data_sent = self.data_sent.saturating_add(amount);
        self.last_activity_at = now;
    }

    /// Adds to the received-data counter and touches the activity timestamp.
    pub fn add_data_received(&mut self, amount: u64, now: DateTime<Utc>) {
        self.data_received = self.data_received.saturating_add(amount);
        self.last_activity_at = now;
    }

    /// Adds to the sent-commands counter and touches the activity timestamp.
    pub fn add_commands_sent(&mut self, amount: u64, now: DateTime<Utc>) {
        self.commands_sent = self.commands_sent.saturating_add(amount);
        self.last_activity_at = now;
    }

    /// Adds to the received-commands counter and touches the activity
    /// timestamp.
    pub fn add_commands_received(&mut self, amount: u64, now: DateTime<Utc>) {
        self.commands_received = self.commands_received.saturating_add(amount);
        self.last_activity_at = now;
    }
}

/// Serde helper: password blobs as hex strings, keeping record dumps
/// printable.
mod serde_bytes_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_flip_reports_change() {
        let mut user = UserRecord::new(UserId::new(1), "alice", vec![1, 2, 3]);
        assert!(user.set_locked(true));
        assert!(!user.set_locked(true));
        assert!(user.set_locked(false));
    }

    #[test]
    fn failed_then_successful_auth_resets_counter() {
        let now = Utc::now();
        let mut device = DeviceRecord::new(DeviceId::new(9), UserId::new(1), "laptop", vec![]);
        device.register_failed_auth(now);
        device.register_failed_auth(now);
        assert_eq!(device.failed_auth_attempts, 2);

        device.register_successful_auth(now);
        assert_eq!(device.failed_auth_attempts, 0);
        assert_eq!(device.last_success_auth_at, Some(now));
        assert_eq!(device.last_failed_auth_at, Some(now));
    }

    #[test]
    fn session_counters_touch_activity() {
        let opened = Utc::now();
        let mut session = SessionRecord::new(
            SessionId::new(3),
            SessionKind::Data,
            UserId::new(1),
            None,
            false,
            opened,
        );
        let later = opened + chrono::Duration::seconds(5);
        session.add_data_sent(100, later);
        assert_eq!(session.data_sent, 100);
        assert_eq!(session.last_activity_at, later);
    }

    #[test]
    fn records_round_trip_through_serde() {
        let user = UserRecord::new(UserId::new(4), "bob", vec![0xde, 0xad])
            .with_access_level(AccessLevel::Admin)
            .with_rule(InstructionSetKind::SessionManager);
        let json = serde_json::to_string(&user).unwrap();
        let back: UserRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(user, back);
    }
}
