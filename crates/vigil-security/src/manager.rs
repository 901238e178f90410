//! The security manager.
//!
//! Owns live authentication tokens, the entity cache, the registered
//! securable components, the rule sets and the hashing configurations.
//! Requests are posted onto a worker pool and resolve through
//! [`PendingResult`] futures.
//!
//! Lock layout: one primary lock serializes authentication,
//! authorization and cache mutation; name and password rules have their
//! own locks, only ever taken while the primary lock is held (or alone
//! for the rule-management API). Key generation validates the posting
//! source under the primary lock, releases it, and does the CPU-bound
//! work unlocked.

use crate::cache::EntityCache;
use crate::config::{PasswordHashingConfig, SecurityConfig};
use crate::delay::{delay_remaining, FailedAuthDelay};
use crate::requests::{
    AuthorizationRequest, DerivedKeyRequest, DeviceAuthenticationRequest, KeyExchangeRequest,
    SymmetricKeyRequest, UserAuthenticationRequest,
};
use crate::rules::{validate_name, validate_password, NameRule, PasswordRule};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use vigil_core::{
    AccessLevel, AuthenticationToken, AuthorizationToken, ComponentKind, DeviceId, DeviceRecord,
    DeviceStore, RuleId, Seconds, Securable, SecurityError, TaskPool, TokenId, UserId,
    UserRecord, UserStore,
};
use vigil_core::Result;
use vigil_crypto::{
    build_password_blob, random_salt, verify_password_blob, HashAlgorithm, KeyGenerator,
    SymmetricMaterial,
};
use vigil_instructions::{InstructionDispatcher, PendingResult, Responder};

/// Request counters since construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestStats {
    /// Requests accepted for processing.
    pub total: u64,
    /// Requests that completed successfully.
    pub successful: u64,
}

struct AuthState {
    components: HashMap<ComponentKind, Arc<dyn Securable>>,
    cache: EntityCache,
    tokens: HashMap<UserId, VecDeque<AuthenticationToken>>,
    last_authentication_token_id: u64,
    last_authorization_token_id: u64,
}

struct NameRuleState {
    last_id: u32,
    user: IndexMap<RuleId, NameRule>,
    device: IndexMap<RuleId, NameRule>,
}

struct PasswordRuleState {
    last_id: u32,
    user: IndexMap<RuleId, PasswordRule>,
    device: IndexMap<RuleId, PasswordRule>,
    current: PasswordHashingConfig,
    previous: Option<PasswordHashingConfig>,
}

struct SecurityInner {
    pool: TaskPool,
    users: Arc<dyn UserStore>,
    devices: Arc<dyn DeviceStore>,
    dispatcher: Arc<InstructionDispatcher>,
    key_generator: KeyGenerator,
    auth: Mutex<AuthState>,
    names: Mutex<NameRuleState>,
    passwords: Mutex<PasswordRuleState>,
    user_delay: FailedAuthDelay,
    device_delay: FailedAuthDelay,
    authentication_token_signature_size: usize,
    authorization_token_signature_size: usize,
    authentication_token_validity: Seconds,
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
}

/// Handle to the security manager; clones share one instance.
#[derive(Clone)]
pub struct SecurityManager {
    inner: Arc<SecurityInner>,
}

impl SecurityManager {
    /// Validates the configuration and builds the manager.
    ///
    /// Must be called inside a tokio runtime; the worker pool spawns its
    /// tasks immediately.
    pub fn new(
        config: SecurityConfig,
        users: Arc<dyn UserStore>,
        devices: Arc<dyn DeviceStore>,
        dispatcher: Arc<InstructionDispatcher>,
    ) -> Result<Self> {
        if config.authorization_token_signature_size == 0 {
            tracing::warn!("authorization token signature size is zero");
        }
        if config.authentication_token_signature_size == 0 {
            tracing::warn!("authentication token signature size is zero");
        }
        if config.authentication_token_validity == 0 {
            tracing::warn!("authentication token validity is zero; tokens expire immediately");
        }
        if config.hashing.user_salt_size == 0 || config.hashing.device_salt_size == 0 {
            tracing::warn!("a password salt size is zero in the current hashing configuration");
        }
        if config.user_delay.base == 0 || config.device_delay.base == 0 {
            tracing::warn!("an authentication delay base is zero");
        }

        let key_generator = KeyGenerator::new(config.key_generator)?;

        let mut names = NameRuleState {
            last_id: 0,
            user: IndexMap::new(),
            device: IndexMap::new(),
        };
        for rule in config.user_name_rules {
            names.last_id += 1;
            names.user.insert(RuleId::new(names.last_id), rule);
        }
        for rule in config.device_name_rules {
            names.last_id += 1;
            names.device.insert(RuleId::new(names.last_id), rule);
        }

        let mut passwords = PasswordRuleState {
            last_id: 0,
            user: IndexMap::new(),
            device: IndexMap::new(),
            current: config.hashing,
            previous: config.previous_hashing,
        };
        for rule in config.user_password_rules {
            passwords.last_id += 1;
            passwords.user.insert(RuleId::new(passwords.last_id), rule);
        }
        for rule in config.device_password_rules {
            passwords.last_id += 1;
            passwords
                .device
                .insert(RuleId::new(passwords.last_id), rule);
        }

        let inner = SecurityInner {
            pool: TaskPool::new(config.thread_pool_size),
            users,
            devices,
            dispatcher,
            key_generator,
            auth: Mutex::new(AuthState {
                components: HashMap::new(),
                cache: EntityCache::new(
                    config.max_user_cache_entries,
                    config.max_device_cache_entries,
                    config.user_eviction,
                    config.device_eviction,
                ),
                tokens: HashMap::new(),
                last_authentication_token_id: 0,
                last_authorization_token_id: 0,
            }),
            names: Mutex::new(names),
            passwords: Mutex::new(passwords),
            user_delay: config.user_delay,
            device_delay: config.device_delay,
            authentication_token_signature_size: config.authentication_token_signature_size,
            authorization_token_signature_size: config.authorization_token_signature_size,
            authentication_token_validity: config.authentication_token_validity,
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Registers a securable component; at most one per kind.
    pub fn register_securable(&self, component: Arc<dyn Securable>) -> Result<()> {
        let mut auth = self.inner.auth.lock();
        let kind = component.component_kind();
        if auth.components.contains_key(&kind) {
            return Err(SecurityError::InvalidArgument(format!(
                "a component of kind [{kind}] is already present"
            )));
        }
        auth.components.insert(kind, component);
        Ok(())
    }

    /// Deregisters a securable component.
    pub fn deregister_securable(&self, kind: ComponentKind) -> Result<()> {
        let mut auth = self.inner.auth.lock();
        if auth.components.remove(&kind).is_none() {
            return Err(SecurityError::InvalidArgument(format!(
                "a component of kind [{kind}] is not present"
            )));
        }
        Ok(())
    }

    /// Posts a user authentication request.
    pub fn post_user_authentication(
        &self,
        request: UserAuthenticationRequest,
    ) -> PendingResult<AuthenticationToken> {
        let (responder, pending) = PendingResult::channel();
        let inner = Arc::clone(&self.inner);
        self.inner.pool.submit(move || {
            let result = inner.authenticate_user(&request);
            if let Err(error) = &result {
                tracing::debug!(username = request.username(), %error, "user authentication failed");
            }
            responder.send(result);
        });
        pending
    }

    /// Posts a device authentication request.
    pub fn post_device_authentication(
        &self,
        request: DeviceAuthenticationRequest,
    ) -> PendingResult<AuthenticationToken> {
        let (responder, pending) = PendingResult::channel();
        let inner = Arc::clone(&self.inner);
        self.inner.pool.submit(move || {
            let result = inner.authenticate_device(&request);
            if let Err(error) = &result {
                tracing::debug!(device = %request.device(), %error, "device authentication failed");
            }
            responder.send(result);
        });
        pending
    }

    /// Posts an authorization request for one instruction.
    pub fn post_authorization(
        &self,
        request: AuthorizationRequest,
    ) -> PendingResult<AuthorizationToken> {
        let (responder, pending) = PendingResult::channel();
        let inner = Arc::clone(&self.inner);
        self.inner.pool.submit(move || {
            let result = inner.authorize(&request);
            if let Err(error) = &result {
                tracing::debug!(user = %request.user(), %error, "authorization failed");
            }
            responder.send(result);
        });
        pending
    }

    /// Posts a derived-key material request.
    pub fn post_derived_key(&self, request: DerivedKeyRequest) -> PendingResult<SymmetricMaterial> {
        let (responder, pending) = PendingResult::channel();
        let inner = Arc::clone(&self.inner);
        self.inner
            .pool
            .submit(move || inner.generate_derived(request, responder));
        pending
    }

    /// Posts a symmetric material request.
    pub fn post_symmetric_key(
        &self,
        request: SymmetricKeyRequest,
    ) -> PendingResult<SymmetricMaterial> {
        let (responder, pending) = PendingResult::channel();
        let inner = Arc::clone(&self.inner);
        self.inner
            .pool
            .submit(move || inner.generate_symmetric(request, responder));
        pending
    }

    /// Posts a key-exchange material request.
    pub fn post_key_exchange(
        &self,
        request: KeyExchangeRequest,
    ) -> PendingResult<SymmetricMaterial> {
        let (responder, pending) = PendingResult::channel();
        let inner = Arc::clone(&self.inner);
        self.inner
            .pool
            .submit(move || inner.generate_exchange(request, responder));
        pending
    }

    /// Adds a user name rule; returns its id.
    pub fn add_user_name_rule(&self, rule: NameRule) -> RuleId {
        let mut names = self.inner.names.lock();
        names.last_id += 1;
        let id = RuleId::new(names.last_id);
        names.user.insert(id, rule);
        id
    }

    /// Removes a user name rule.
    pub fn remove_user_name_rule(&self, id: RuleId) -> Result<()> {
        let mut names = self.inner.names.lock();
        if names.user.shift_remove(&id).is_none() {
            return Err(SecurityError::InvalidArgument(format!(
                "user name rule [{id}] was not found"
            )));
        }
        Ok(())
    }

    /// Adds a device name rule; returns its id.
    pub fn add_device_name_rule(&self, rule: NameRule) -> RuleId {
        let mut names = self.inner.names.lock();
        names.last_id += 1;
        let id = RuleId::new(names.last_id);
        names.device.insert(id, rule);
        id
    }

    /// Removes a device name rule.
    pub fn remove_device_name_rule(&self, id: RuleId) -> Result<()> {
        let mut names = self.inner.names.lock();
        if names.device.shift_remove(&id).is_none() {
            return Err(SecurityError::InvalidArgument(format!(
                "device name rule [{id}] was not found"
            )));
        }
        Ok(())
    }

    /// Adds a user password rule; returns its id.
    pub fn add_user_password_rule(&self, rule: PasswordRule) -> RuleId {
        let mut passwords = self.inner.passwords.lock();
        passwords.last_id += 1;
        let id = RuleId::new(passwords.last_id);
        passwords.user.insert(id, rule);
        id
    }

    /// Removes a user password rule.
    pub fn remove_user_password_rule(&self, id: RuleId) -> Result<()> {
        let mut passwords = self.inner.passwords.lock();
        if passwords.user.shift_remove(&id).is_none() {
            return Err(SecurityError::InvalidArgument(format!(
                "user password rule [{id}] was not found"
            )));
        }
        Ok(())
    }

    /// Adds a device password rule; returns its id.
    pub fn add_device_password_rule(&self, rule: PasswordRule) -> RuleId {
        let mut passwords = self.inner.passwords.lock();
        passwords.last_id += 1;
        let id = RuleId::new(passwords.last_id);
        passwords.device.insert(id, rule);
        id
    }

    /// Removes a device password rule.
    pub fn remove_device_password_rule(&self, id: RuleId) -> Result<()> {
        let mut passwords = self.inner.passwords.lock();
        if passwords.device.shift_remove(&id).is_none() {
            return Err(SecurityError::InvalidArgument(format!(
                "device password rule [{id}] was not found"
            )));
        }
        Ok(())
    }

    /// Validates a user name against the current rules.
    pub fn is_user_name_valid(&self, name: &str) -> Result<()> {
        let names = self.inner.names.lock();
        validate_name(names.user.values(), name)
    }

    /// Validates a device name against the current rules.
    pub fn is_device_name_valid(&self, name: &str) -> Result<()> {
        let names = self.inner.names.lock();
        validate_name(names.device.values(), name)
    }

    /// Validates a user password and hashes it with a fresh salt under
    /// the current configuration.
    pub fn hash_user_password(&self, raw_password: &str) -> Result<Vec<u8>> {
        let passwords = self.inner.passwords.lock();
        validate_password(passwords.user.values(), raw_password)?;
        let salt = random_salt(passwords.current.user_salt_size);
        Ok(build_password_blob(
            passwords.current.user_algorithm,
            &salt,
            raw_password,
        ))
    }

    /// Validates a device password and hashes it with a fresh salt under
    /// the current configuration.
    pub fn hash_device_password(&self, raw_password: &str) -> Result<Vec<u8>> {
        let passwords = self.inner.passwords.lock();
        validate_password(passwords.device.values(), raw_password)?;
        let salt = random_salt(passwords.current.device_salt_size);
        Ok(build_password_blob(
            passwords.current.device_algorithm,
            &salt,
            raw_password,
        ))
    }

    /// Rotates the hashing configuration: current becomes previous, the
    /// supplied parameters become current.
    ///
    /// Only allowed while no previous configuration is retained.
    pub fn update_password_hashing(&self, new: PasswordHashingConfig) -> Result<()> {
        let mut passwords = self.inner.passwords.lock();
        if passwords.previous.is_some() {
            return Err(SecurityError::LogicError(
                "a previous password hashing configuration is present".into(),
            ));
        }
        if new.user_salt_size == 0 || new.device_salt_size == 0 {
            tracing::warn!("a password salt size is zero in the new hashing configuration");
        }
        passwords.previous = Some(passwords.current);
        passwords.current = new;
        Ok(())
    }

    /// Drops the compatibility hashing configuration.
    pub fn discard_previous_password_hashing(&self) {
        self.inner.passwords.lock().previous = None;
    }

    /// Removes a live authentication token, usually on session close or
    /// re-authentication.
    pub fn remove_authentication_token(&self, token: TokenId, user: UserId) -> Result<()> {
        let mut auth = self.inner.auth.lock();
        let removed = {
            let Some(tokens) = auth.tokens.get_mut(&user) else {
                return Err(SecurityError::InvalidArgument(format!(
                    "no tokens were found for user [{user}]"
                )));
            };
            let before = tokens.len();
            tokens.retain(|candidate| candidate.id() != token);
            if tokens.len() == before {
                return Err(SecurityError::InvalidArgument(format!(
                    "token [{token}] was not found for user [{user}]"
                )));
            }
            tokens.is_empty()
        };
        if removed {
            auth.tokens.remove(&user);
        }
        Ok(())
    }

    /// Drops a user's cached record and their cached devices.
    ///
    /// Entity managers call this after mutating a record outside the
    /// security manager, so the next authentication or authorization
    /// reads fresh state.
    pub fn invalidate_cached_user(&self, user: UserId) {
        self.inner.auth.lock().cache.invalidate_user(user);
    }

    /// Drops a device's cached record.
    pub fn invalidate_cached_device(&self, device: DeviceId) {
        self.inner.auth.lock().cache.invalidate_device(device);
    }

    /// Request counters.
    pub fn stats(&self) -> RequestStats {
        RequestStats {
            total: self.inner.total_requests.load(Ordering::Relaxed),
            successful: self.inner.successful_requests.load(Ordering::Relaxed),
        }
    }
}

impl SecurityInner {
    fn authenticate_user(&self, request: &UserAuthenticationRequest) -> Result<AuthenticationToken> {
        let mut guard = self.auth.lock();
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let auth = &mut *guard;

        if !auth.components.contains_key(&request.source()) {
            tracing::error!(source = %request.source(), "source component not found");
            return Err(SecurityError::LogicError(format!(
                "source [{}] component not found",
                request.source()
            )));
        }

        let now = Utc::now();
        let Some(user) = auth
            .cache
            .user_by_name(request.username(), self.users.as_ref())?
        else {
            tracing::error!(username = request.username(), "no data found for user");
            return Err(SecurityError::UserNotFound);
        };

        if user.locked {
            tracing::error!(username = request.username(), "user is locked");
            return Err(SecurityError::UserLocked { retry_in: None });
        }

        let delay = self.user_delay.delay_for(user.failed_auth_attempts);
        if delay > 0 {
            if let Some(last_failed) = user.last_failed_auth_at {
                let elapsed = (now - last_failed).num_seconds();
                if elapsed < 0 || (elapsed as Seconds) < delay {
                    let remaining = delay_remaining(last_failed, delay, now);
                    tracing::error!(
                        username = request.username(),
                        remaining,
                        attempts = user.failed_auth_attempts,
                        "user delayed because of failed authentication attempts"
                    );
                    return Err(SecurityError::UserLocked {
                        retry_in: Some(remaining),
                    });
                }
            }
        }

        let verified = {
            let passwords = self.passwords.lock();
            let mut verified = blob_matches(
                passwords.current.user_algorithm,
                passwords.current.user_salt_size,
                &user.password,
                request.raw_password(),
            );
            if !verified {
                if let Some(previous) = &passwords.previous {
                    if blob_matches(
                        previous.user_algorithm,
                        previous.user_salt_size,
                        &user.password,
                        request.raw_password(),
                    ) {
                        tracing::warn!(
                            username = request.username(),
                            "user password authenticated with previous configuration"
                        );
                        verified = true;
                    }
                }
            }
            verified
        };

        if !verified {
            user.register_failed_auth(now);
            if self.user_delay.locks_after(user.failed_auth_attempts) {
                tracing::info!(
                    username = request.username(),
                    "user locked after too many failed authentication attempts"
                );
                user.set_locked(true);
            }
            persist_user(self.users.as_ref(), user);
            tracing::error!(username = request.username(), "invalid password supplied");
            return Err(SecurityError::InvalidPassword { reason: None });
        }

        if user.access_level != AccessLevel::User && user.access_level != AccessLevel::Admin {
            tracing::error!(
                username = request.username(),
                "user does not have the required access level"
            );
            return Err(SecurityError::InsufficientUserAccess);
        }
        if user.authorization_rules.is_empty() {
            tracing::error!(
                username = request.username(),
                "user does not have any access permissions"
            );
            return Err(SecurityError::InsufficientUserAccess);
        }

        user.register_successful_auth(now);
        persist_user(self.users.as_ref(), user);
        let user_id = user.id;

        auth.last_authentication_token_id += 1;
        let token = AuthenticationToken::new(
            TokenId::new(auth.last_authentication_token_id),
            random_salt(self.authentication_token_signature_size),
            expiration(now, self.authentication_token_validity),
            user_id,
            None,
        );
        auth.tokens.entry(user_id).or_default().push_back(token.clone());
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        Ok(token)
    }

    fn authenticate_device(
        &self,
        request: &DeviceAuthenticationRequest,
    ) -> Result<AuthenticationToken> {
        let mut guard = self.auth.lock();
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let auth = &mut *guard;

        if !auth.components.contains_key(&request.source()) {
            tracing::error!(source = %request.source(), "source component not found");
            return Err(SecurityError::LogicError(format!(
                "source [{}] component not found",
                request.source()
            )));
        }

        let now = Utc::now();
        let Some(device) = auth.cache.device(request.device(), self.devices.as_ref())? else {
            tracing::error!(device = %request.device(), "no data found for device");
            return Err(SecurityError::DeviceNotFound);
        };

        if device.locked {
            tracing::error!(device = %request.device(), "device is locked");
            return Err(SecurityError::DeviceLocked { retry_in: None });
        }

        let delay = self.device_delay.delay_for(device.failed_auth_attempts);
        if delay > 0 {
            if let Some(last_failed) = device.last_failed_auth_at {
                let elapsed = (now - last_failed).num_seconds();
                if elapsed < 0 || (elapsed as Seconds) < delay {
                    let remaining = delay_remaining(last_failed, delay, now);
                    tracing::error!(
                        device = %request.device(),
                        remaining,
                        attempts = device.failed_auth_attempts,
                        "device delayed because of failed authentication attempts"
                    );
                    return Err(SecurityError::DeviceLocked {
                        retry_in: Some(remaining),
                    });
                }
            }
        }

        let verified = {
            let passwords = self.passwords.lock();
            let mut verified = blob_matches(
                passwords.current.device_algorithm,
                passwords.current.device_salt_size,
                &device.password,
                request.raw_password(),
            );
            if !verified {
                if let Some(previous) = &passwords.previous {
                    if blob_matches(
                        previous.device_algorithm,
                        previous.device_salt_size,
                        &device.password,
                        request.raw_password(),
                    ) {
                        tracing::warn!(
                            device = %request.device(),
                            "device password authenticated with previous configuration"
                        );
                        verified = true;
                    }
                }
            }
            verified
        };

        if !verified {
            device.register_failed_auth(now);
            if self.device_delay.locks_after(device.failed_auth_attempts) {
                tracing::info!(
                    device = %request.device(),
                    "device locked after too many failed authentication attempts"
                );
                device.set_locked(true);
            }
            persist_device(self.devices.as_ref(), device);
            tracing::error!(device = %request.device(), "invalid password supplied");
            return Err(SecurityError::InvalidPassword { reason: None });
        }

        device.register_successful_auth(now);
        persist_device(self.devices.as_ref(), device);
        let owner = device.owner;
        let device_id = device.id;

        auth.last_authentication_token_id += 1;
        let token = AuthenticationToken::new(
            TokenId::new(auth.last_authentication_token_id),
            random_salt(self.authentication_token_signature_size),
            expiration(now, self.authentication_token_validity),
            owner,
            Some(device_id),
        );
        auth.tokens.entry(owner).or_default().push_back(token.clone());
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        Ok(token)
    }

    fn authorize(&self, request: &AuthorizationRequest) -> Result<AuthorizationToken> {
        let mut guard = self.auth.lock();
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let auth = &mut *guard;

        let source_present = auth.components.contains_key(&request.source());
        let target = auth.components.get(&request.target()).cloned();
        let Some(target) = target.filter(|_| source_present) else {
            return Err(SecurityError::LogicError(format!(
                "source [{}] or target [{}] component not found",
                request.source(),
                request.target()
            )));
        };

        let (access_level, set_allowed) = {
            let Some(user) = auth.cache.user_by_id(request.user(), self.users.as_ref())? else {
                tracing::error!(user = %request.user(), "no data found for user");
                return Err(SecurityError::UserNotFound);
            };
            (
                user.access_level,
                user.authorization_rules.contains(&request.set()),
            )
        };

        let now = Utc::now();
        let token_on_file = auth.tokens.get(&request.user()).is_some_and(|tokens| {
            tokens.iter().any(|token| {
                !token.is_expired(now)
                    && token.user() == request.user()
                    && token.device() == request.device()
            })
        });
        if !token_on_file {
            tracing::error!(user = %request.user(), "no valid authentication token on file");
            return Err(SecurityError::UserNotAuthenticated);
        }

        let Some(minimum) = self.dispatcher.minimum_access_level(request.set()) else {
            return Err(SecurityError::LogicError(format!(
                "set [{}] not found or its minimum access level is not defined",
                request.set()
            )));
        };
        if access_level < minimum {
            tracing::error!(user = %request.user(), "insufficient access level");
            return Err(SecurityError::InsufficientUserAccess);
        }

        if !set_allowed {
            tracing::error!(user = %request.user(), set = %request.set(), "instruction not allowed");
            return Err(SecurityError::InstructionNotAllowed);
        }

        if let Some(device_id) = request.device() {
            let Some(device) = auth.cache.device(device_id, self.devices.as_ref())? else {
                tracing::error!(device = %device_id, user = %request.user(), "no data found for device");
                return Err(SecurityError::DeviceNotFound);
            };
            if device.owner != request.user() {
                tracing::error!(device = %device_id, user = %request.user(), "device ownership mismatch");
                return Err(SecurityError::UnexpectedDevice);
            }
            if device.locked {
                tracing::error!(device = %device_id, "device is locked");
                return Err(SecurityError::DeviceLocked { retry_in: None });
            }
        }

        auth.last_authorization_token_id += 1;
        let token = AuthorizationToken::new(
            TokenId::new(auth.last_authorization_token_id),
            random_salt(self.authorization_token_signature_size),
            request.set(),
            request.user(),
            request.device(),
        );
        self.successful_requests.fetch_add(1, Ordering::Relaxed);

        // The target holds the token before the requester's future
        // resolves; a delivery failure fails the request the same way.
        target.post_authorization_token(token.clone())?;
        Ok(token)
    }

    fn generate_derived(
        &self,
        request: DerivedKeyRequest,
        responder: Responder<SymmetricMaterial>,
    ) {
        if let Err(error) = self.ensure_source_registered(request.source()) {
            responder.send(Err(error));
            return;
        }

        let (passphrase, existing, suite, iterations, _) = request.into_parts();
        let result = match existing {
            Some((salt, iv)) => self.key_generator.material_from_passphrase_with(
                suite,
                &passphrase,
                iterations,
                &salt,
                &iv,
            ),
            None => self.key_generator.material_from_passphrase(suite, &passphrase),
        };
        self.finish_generation("derived", result, responder);
    }

    fn generate_symmetric(
        &self,
        request: SymmetricKeyRequest,
        responder: Responder<SymmetricMaterial>,
    ) {
        if let Err(error) = self.ensure_source_registered(request.source()) {
            responder.send(Err(error));
            return;
        }

        let (suite, existing, _) = request.into_parts();
        let result = match (suite, existing) {
            (None, None) => self.key_generator.symmetric_material(),
            (Some(suite), None) => self.key_generator.symmetric_material_with(suite),
            (suite, Some((key, iv))) => {
                self.key_generator.symmetric_material_from_parts(suite, key, iv)
            }
        };
        self.finish_generation("symmetric", result, responder);
    }

    fn generate_exchange(
        &self,
        request: KeyExchangeRequest,
        responder: Responder<SymmetricMaterial>,
    ) {
        if let Err(error) = self.ensure_source_registered(request.source()) {
            responder.send(Err(error));
            return;
        }

        let (curve, private, peer_public, iv, suite, _) = request.into_parts();
        let result = self.key_generator.exchange_material(
            curve,
            &private,
            &peer_public,
            iv.as_deref(),
            suite,
        );
        self.finish_generation("exchange", result, responder);
    }

    fn finish_generation(
        &self,
        operation: &str,
        result: Result<SymmetricMaterial>,
        responder: Responder<SymmetricMaterial>,
    ) {
        match &result {
            Ok(_) => {
                self.successful_requests.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                tracing::error!(operation, %error, "key generation failed");
            }
        }
        responder.send(result);
    }

    fn ensure_source_registered(&self, source: ComponentKind) -> Result<()> {
        let auth = self.auth.lock();
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if auth.components.contains_key(&source) {
            Ok(())
        } else {
            tracing::error!(source = %source, "source component not found");
            Err(SecurityError::LogicError(format!(
                "source [{source}] component not found"
            )))
        }
    }
}

fn blob_matches(
    algorithm: HashAlgorithm,
    salt_size: usize,
    stored: &[u8],
    raw_password: &str,
) -> bool {
    verify_password_blob(algorithm, salt_size, stored, raw_password).unwrap_or_else(|error| {
        tracing::debug!(%error, "stored blob cannot be split with this configuration");
        false
    })
}

fn persist_user(store: &dyn UserStore, record: &UserRecord) {
    match store.update_user(record) {
        Ok(true) => {}
        Ok(false) => tracing::warn!(user = %record.id, "user update matched no stored record"),
        Err(error) => tracing::error!(user = %record.id, %error, "failed to persist user record"),
    }
}

fn persist_device(store: &dyn DeviceStore, record: &DeviceRecord) {
    match store.update_device(record) {
        Ok(true) => {}
        Ok(false) => tracing::warn!(device = %record.id, "device update matched no stored record"),
        Err(error) => {
            tracing::error!(device = %record.id, %error, "failed to persist device record");
        }
    }
}

fn expiration(now: DateTime<Utc>, validity: Seconds) -> DateTime<Utc> {
    let validity = i64::try_from(validity).unwrap_or(i64::MAX);
    let delta = chrono::TimeDelta::try_seconds(validity).unwrap_or(chrono::TimeDelta::MAX);
    now.checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
