//! Persistence interfaces consumed by the managers.
//!
//! The store is external; these traits are the whole surface the core
//! relies on. Calls are synchronous and are made while the calling
//! manager holds its primary lock, so implementations must not block for
//! long and must provide per-record atomicity with read-after-write
//! consistency.

use crate::error::Result;
use crate::identifiers::{DeviceId, UserId};
use crate::records::{DeviceRecord, SessionRecord, UserRecord};

/// User record lookup and update.
pub trait UserStore: Send + Sync {
    /// Fetches a user by id.
    fn user_by_id(&self, id: UserId) -> Result<Option<UserRecord>>;

    /// Fetches a user by name.
    fn user_by_name(&self, username: &str) -> Result<Option<UserRecord>>;

    /// Replaces the stored record; returns whether a record was updated.
    fn update_user(&self, record: &UserRecord) -> Result<bool>;
}

/// Device record lookup and update.
pub trait DeviceStore: Send + Sync {
    /// Fetches a device by id.
    fn device(&self, id: DeviceId) -> Result<Option<DeviceRecord>>;

    /// Replaces the stored record; returns whether a record was updated.
    fn update_device(&self, record: &DeviceRecord) -> Result<bool>;
}

/// Session record insert and update.
pub trait SessionStore: Send + Sync {
    /// Inserts a new session record.
    fn add_session(&self, record: &SessionRecord) -> Result<()>;

    /// Replaces an existing session record.
    fn update_session(&self, record: &SessionRecord) -> Result<()>;
}
