//! Bounded, eviction-aware cache of user and device records.
//!
//! Lookups go through the cache to persistence on miss. Every hit bumps
//! the entry's hit counter and the map's global age counter; new entries
//! are seeded with the current age, so counters order entries by
//! recency-of-use. LRU evicts the smallest counter, MRU the largest.
//!
//! Evicting a user also evicts every cached device owned by that user:
//! authorization decisions about a device always start from a user
//! record at least as fresh as the device record.
//!
//! Not internally synchronized; the security manager calls in under its
//! primary lock.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vigil_core::{DeviceId, DeviceRecord, DeviceStore, Result, UserId, UserRecord, UserStore};

/// Which end of the recency order eviction removes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheEvictionPolicy {
    /// Evict the least recently used entry.
    Lru,
    /// Evict the most recently used entry.
    Mru,
}

#[derive(Debug)]
struct CachedUser {
    record: UserRecord,
    hits: u64,
}

#[derive(Debug)]
struct CachedDevice {
    record: DeviceRecord,
    hits: u64,
}

/// Two-level record cache with independent policies per map.
#[derive(Debug)]
pub struct EntityCache {
    max_users: usize,
    max_devices: usize,
    user_policy: CacheEvictionPolicy,
    device_policy: CacheEvictionPolicy,
    user_age: u64,
    device_age: u64,
    users: HashMap<UserId, CachedUser>,
    usernames: HashMap<String, UserId>,
    devices: HashMap<DeviceId, CachedDevice>,
}

impl EntityCache {
    /// Creates an empty cache. A capacity of zero means unbounded.
    pub fn new(
        max_users: usize,
        max_devices: usize,
        user_policy: CacheEvictionPolicy,
        device_policy: CacheEvictionPolicy,
    ) -> Self {
        Self {
            max_users,
            max_devices,
            user_policy,
            device_policy,
            user_age: 0,
            device_age: 0,
            users: HashMap::new(),
            usernames: HashMap::new(),
            devices: HashMap::new(),
        }
    }

    /// Fetches a user by id, loading from persistence on a miss.
    pub fn user_by_id(
        &mut self,
        id: UserId,
        store: &dyn UserStore,
    ) -> Result<Option<&mut UserRecord>> {
        if self.users.contains_key(&id) {
            self.user_age += 1;
            let entry = self.users.get_mut(&id).expect("checked above");
            entry.hits += 1;
            return Ok(Some(&mut entry.record));
        }

        if self.max_users > 0 && self.users.len() >= self.max_users {
            self.evict_user();
        }

        let Some(record) = store.user_by_id(id)? else {
            return Ok(None);
        };

        self.usernames.insert(record.username.clone(), record.id);
        let entry = self.users.entry(record.id).or_insert(CachedUser {
            record,
            hits: self.user_age,
        });
        Ok(Some(&mut entry.record))
    }

    /// Fetches a user by name, loading from persistence on a miss.
    pub fn user_by_name(
        &mut self,
        username: &str,
        store: &dyn UserStore,
    ) -> Result<Option<&mut UserRecord>> {
        if let Some(id) = self.usernames.get(username).copied() {
            return self.user_by_id(id, store);
        }

        if self.max_users > 0 && self.users.len() >= self.max_users {
            self.evict_user();
        }

        let Some(record) = store.user_by_name(username)? else {
            return Ok(None);
        };

        self.usernames.insert(record.username.clone(), record.id);
        let entry = self.users.entry(record.id).or_insert(CachedUser {
            record,
            hits: self.user_age,
        });
        Ok(Some(&mut entry.record))
    }

    /// Fetches a device by id, loading from persistence on a miss.
    pub fn device(
        &mut self,
        id: DeviceId,
        store: &dyn DeviceStore,
    ) -> Result<Option<&mut DeviceRecord>> {
        if self.devices.contains_key(&id) {
            self.device_age += 1;
            let entry = self.devices.get_mut(&id).expect("checked above");
            entry.hits += 1;
            return Ok(Some(&mut entry.record));
        }

        if self.max_devices > 0 && self.devices.len() >= self.max_devices {
            self.evict_device();
        }

        let Some(record) = store.device(id)? else {
            return Ok(None);
        };

        let entry = self.devices.entry(record.id).or_insert(CachedDevice {
            record,
            hits: self.device_age,
        });
        Ok(Some(&mut entry.record))
    }

    /// Drops a cached user and every cached device they own.
    ///
    /// The next fetch reloads from persistence; used after a record is
    /// mutated outside the security manager.
    pub fn invalidate_user(&mut self, id: UserId) {
        let Some(entry) = self.users.remove(&id) else {
            return;
        };
        self.usernames.remove(&entry.record.username);

        let owned: Vec<DeviceId> = self
            .devices
            .iter()
            .filter(|(_, entry)| entry.record.owner == id)
            .map(|(device, _)| *device)
            .collect();
        for device in owned {
            self.devices.remove(&device);
        }
    }

    /// Drops a cached device so the next fetch reloads from persistence.
    pub fn invalidate_device(&mut self, id: DeviceId) {
        self.devices.remove(&id);
    }

    /// Whether a user is currently cached.
    pub fn contains_user(&self, id: UserId) -> bool {
        self.users.contains_key(&id)
    }

    /// Whether a device is currently cached.
    pub fn contains_device(&self, id: DeviceId) -> bool {
        self.devices.contains_key(&id)
    }

    /// Number of cached users.
    pub fn cached_users(&self) -> usize {
        self.users.len()
    }

    /// Number of cached devices.
    pub fn cached_devices(&self) -> usize {
        self.devices.len()
    }

    fn evict_user(&mut self) {
        // Ties resolve by id so repeated runs pick the same victim.
        let target = match self.user_policy {
            CacheEvictionPolicy::Lru => self
                .users
                .iter()
                .min_by_key(|(id, entry)| (entry.hits, **id)),
            CacheEvictionPolicy::Mru => self
                .users
                .iter()
                .max_by_key(|(id, entry)| (entry.hits, **id)),
        }
        .map(|(id, entry)| (*id, entry.record.username.clone()));

        let Some((victim, username)) = target else {
            tracing::debug!("user eviction skipped; cache is empty");
            return;
        };

        self.users.remove(&victim);
        self.usernames.remove(&username);
        tracing::debug!(user = %victim, "user evicted from cache");

        let owned: Vec<DeviceId> = self
            .devices
            .iter()
            .filter(|(_, entry)| entry.record.owner == victim)
            .map(|(id, _)| *id)
            .collect();
        for device in owned {
            self.devices.remove(&device);
            tracing::debug!(device = %device, user = %victim, "owned device evicted from cache");
        }
    }

    fn evict_device(&mut self) {
        let target = match self.device_policy {
            CacheEvictionPolicy::Lru => self
                .devices
                .iter()
                .min_by_key(|(id, entry)| (entry.hits, **id)),
            CacheEvictionPolicy::Mru => self
                .devices
                .iter()
                .max_by_key(|(id, entry)| (entry.hits, **id)),
        }
        .map(|(id, _)| *id);

        let Some(victim) = target else {
            tracing::debug!("device eviction skipped; cache is empty");
            return;
        };

        self.devices.remove(&victim);
        tracing::debug!(device = %victim, "device evicted from cache");
    }
}
