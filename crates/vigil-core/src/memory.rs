//! In-memory store implementing every persistence trait.
//!
//! Backs the test suites and small deployments; write counters are
//! exposed so commit-policy behavior can be asserted.

use crate::error::Result;
use crate::identifiers::{DeviceId, SessionId, UserId};
use crate::persistence::{DeviceStore, SessionStore, UserStore};
use crate::records::{DeviceRecord, SessionRecord, UserRecord};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, UserRecord>,
    usernames: HashMap<String, UserId>,
    devices: HashMap<DeviceId, DeviceRecord>,
    sessions: HashMap<SessionId, SessionRecord>,
    session_adds: u64,
    session_updates: u64,
}

/// Thread-safe in-memory persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a user record.
    pub fn put_user(&self, record: UserRecord) {
        let mut state = self.state.lock();
        state.usernames.insert(record.username.clone(), record.id);
        state.users.insert(record.id, record);
    }

    /// Inserts or replaces a device record.
    pub fn put_device(&self, record: DeviceRecord) {
        self.state.lock().devices.insert(record.id, record);
    }

    /// Returns a copy of a stored session, if present.
    pub fn session(&self, id: SessionId) -> Option<SessionRecord> {
        self.state.lock().sessions.get(&id).cloned()
    }

    /// Returns a copy of a stored user, if present.
    pub fn stored_user(&self, id: UserId) -> Option<UserRecord> {
        self.state.lock().users.get(&id).cloned()
    }

    /// Returns a copy of a stored device, if present.
    pub fn stored_device(&self, id: DeviceId) -> Option<DeviceRecord> {
        self.state.lock().devices.get(&id).cloned()
    }

    /// `(adds, updates)` performed against the session table.
    pub fn session_writes(&self) -> (u64, u64) {
        let state = self.state.lock();
        (state.session_adds, state.session_updates)
    }
}

impl UserStore for MemoryStore {
    fn user_by_id(&self, id: UserId) -> Result<Option<UserRecord>> {
        Ok(self.state.lock().users.get(&id).cloned())
    }

    fn user_by_name(&self, username: &str) -> Result<Option<UserRecord>> {
        let state = self.state.lock();
        Ok(state
            .usernames
            .get(username)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    fn update_user(&self, record: &UserRecord) -> Result<bool> {
        let mut state = self.state.lock();
        match state.users.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl DeviceStore for MemoryStore {
    fn device(&self, id: DeviceId) -> Result<Option<DeviceRecord>> {
        Ok(self.state.lock().devices.get(&id).cloned())
    }

    fn update_device(&self, record: &DeviceRecord) -> Result<bool> {
        let mut state = self.state.lock();
        match state.devices.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl SessionStore for MemoryStore {
    fn add_session(&self, record: &SessionRecord) -> Result<()> {
        let mut state = self.state.lock();
        state.session_adds += 1;
        state.sessions.insert(record.id, record.clone());
        Ok(())
    }

    fn update_session(&self, record: &SessionRecord) -> Result<()> {
        let mut state = self.state.lock();
        state.session_updates += 1;
        state.sessions.insert(record.id, record.clone());
        Ok(())
    }
}
