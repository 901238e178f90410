//! The session manager.

use crate::instructions::{SessionInstruction, SessionInstructionKind, SessionInstructionOutput};
use crate::types::{CommitPolicy, GetSessionsConstraint, SessionConfig};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast;
use vigil_core::{
    AccessLevel, AuthenticationToken, AuthorizationToken, ComponentKind, DeviceId, Result,
    Seconds, Securable, SecurityError, SessionId, SessionKind, SessionRecord, SessionStore,
    TaskPool, TokenVault, UserId,
};
use vigil_instructions::{
    Envelope, InstructionFamily, InstructionSet, InstructionTarget, Responder,
};
use vigil_security::{
    DeviceAuthenticationRequest, SecurityManager, UserAuthenticationRequest,
};

/// One tracked session.
///
/// The flags and token are guarded by the manager's global lock; the
/// record sits behind its own mutex so counter updates can run without
/// the global lock.
struct SessionEntry {
    data: Arc<Mutex<SessionRecord>>,
    token: AuthenticationToken,
    token_expires_at: DateTime<Utc>,
    added_to_db: bool,
    waiting_for_reauth: bool,
    waiting_for_termination: bool,
}

#[derive(Default)]
struct SessionState {
    last_session_id: u64,
    active: HashMap<SessionId, SessionEntry>,
    by_user: HashMap<UserId, VecDeque<SessionId>>,
    by_device: HashMap<DeviceId, VecDeque<SessionId>>,
    next_sweep_at: Option<DateTime<Utc>>,
    scheduled_sweeps: u64,
    total_sweeps: u64,
}

struct SessionInner {
    security: SecurityManager,
    sessions: Arc<dyn SessionStore>,
    pool: TaskPool,
    vault: TokenVault,
    state: Mutex<SessionState>,
    max_sessions_per_user: u32,
    max_sessions_per_device: u32,
    commit: CommitPolicy,
    inactivity_timeout: Seconds,
    unauth_grace: Seconds,
    expired_events: broadcast::Sender<SessionId>,
    reauth_events: broadcast::Sender<SessionId>,
}

/// Handle to the session manager; clones share one instance.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    /// Builds the manager.
    ///
    /// Must be called inside a tokio runtime; the worker pool spawns its
    /// tasks immediately. Register the manager with the security core
    /// (as a securable component) and with the dispatcher (as an
    /// instruction target) during wiring.
    pub fn new(
        config: SessionConfig,
        security: SecurityManager,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let (expired_events, _) = broadcast::channel(256);
        let (reauth_events, _) = broadcast::channel(256);

        Self {
            inner: Arc::new(SessionInner {
                security,
                sessions,
                pool: TaskPool::new(config.thread_pool_size),
                vault: TokenVault::new(SessionInstruction::SET),
                state: Mutex::new(SessionState::default()),
                max_sessions_per_user: config.max_sessions_per_user,
                max_sessions_per_device: config.max_sessions_per_device,
                commit: config.commit_policy,
                inactivity_timeout: config.inactivity_timeout,
                unauth_grace: config.unauth_grace,
                expired_events,
                reauth_events,
            }),
        }
    }

    /// Opens a session for a user credential.
    pub async fn open_user_session(
        &self,
        username: &str,
        raw_password: &str,
        kind: SessionKind,
        persistent: bool,
    ) -> Result<SessionId> {
        let request = UserAuthenticationRequest::new(username, raw_password, self)?;
        let token = self.inner.security.post_user_authentication(request).await?;
        self.inner.finish_open(token, kind, persistent)
    }

    /// Opens a session for a device credential.
    pub async fn open_device_session(
        &self,
        device: DeviceId,
        raw_password: &str,
        kind: SessionKind,
        persistent: bool,
    ) -> Result<SessionId> {
        let request = DeviceAuthenticationRequest::new(device, raw_password, self)?;
        let token = self.inner.security.post_device_authentication(request).await?;
        self.inner.finish_open(token, kind, persistent)
    }

    /// Re-authenticates a user session whose token has expired.
    ///
    /// Only legal while the session is flagged for re-authentication.
    /// The old token is discarded before the new credential check; if
    /// that check fails the session keeps waiting and the sweep will
    /// eventually terminate it.
    pub async fn reauthenticate_user_session(
        &self,
        session: SessionId,
        username: &str,
        raw_password: &str,
    ) -> Result<()> {
        let request = UserAuthenticationRequest::new(username, raw_password, self)?;
        self.inner.begin_reauthentication(session)?;
        let token = self.inner.security.post_user_authentication(request).await?;
        self.inner.finish_reauthentication(session, token)
    }

    /// Re-authenticates a device session whose token has expired.
    pub async fn reauthenticate_device_session(
        &self,
        session: SessionId,
        device: DeviceId,
        raw_password: &str,
    ) -> Result<()> {
        let request = DeviceAuthenticationRequest::new(device, raw_password, self)?;
        self.inner.begin_reauthentication(session)?;
        let token = self.inner.security.post_device_authentication(request).await?;
        self.inner.finish_reauthentication(session, token)
    }

    /// Closes a session: revokes its token, persists per policy and
    /// unlinks it.
    pub fn close_session(&self, session: SessionId) -> Result<()> {
        let mut state = self.inner.state.lock();
        let Some(entry) = state.active.remove(&session) else {
            return Err(SecurityError::InvalidArgument(format!(
                "unable to find session [{session}]"
            )));
        };

        self.inner.discard_token(&entry.token);

        let mut record = entry.data.lock();
        record.close(Utc::now());
        if self.inner.commit.on_close() {
            self.inner.write_session(&record, entry.added_to_db);
        }

        match record.device {
            None => unlink(&mut state.by_user, record.user, session),
            Some(device) => unlink(&mut state.by_device, device, session),
        }

        tracing::debug!(session = %session, "session closed");
        Ok(())
    }

    /// Adds sent traffic to a data session.
    pub fn add_data_sent(&self, session: SessionId, amount: u64) -> Result<()> {
        self.inner
            .update_counters(session, SessionKind::Data, move |record, now| {
                record.add_data_sent(amount, now);
            })
    }

    /// Adds received traffic to a data session.
    pub fn add_data_received(&self, session: SessionId, amount: u64) -> Result<()> {
        self.inner
            .update_counters(session, SessionKind::Data, move |record, now| {
                record.add_data_received(amount, now);
            })
    }

    /// Adds sent commands to a command session.
    pub fn add_commands_sent(&self, session: SessionId, amount: u64) -> Result<()> {
        self.inner
            .update_counters(session, SessionKind::Command, move |record, now| {
                record.add_commands_sent(amount, now);
            })
    }

    /// Adds received commands to a command session.
    pub fn add_commands_received(&self, session: SessionId, amount: u64) -> Result<()> {
        self.inner
            .update_counters(session, SessionKind::Command, move |record, now| {
                record.add_commands_received(amount, now);
            })
    }

    /// Stream of sessions that expired and await teardown.
    pub fn expired_sessions(&self) -> broadcast::Receiver<SessionId> {
        self.inner.expired_events.subscribe()
    }

    /// Stream of sessions whose token expired within the grace period.
    pub fn reauthentications_required(&self) -> broadcast::Receiver<SessionId> {
        self.inner.reauth_events.subscribe()
    }

    /// Snapshot of one session's record, if it is active.
    pub fn session_snapshot(&self, session: SessionId) -> Option<SessionRecord> {
        let state = self.inner.state.lock();
        state
            .active
            .get(&session)
            .map(|entry| entry.data.lock().clone())
    }

    /// Number of active sessions for a user.
    pub fn user_session_count(&self, user: UserId) -> usize {
        self.inner
            .state
            .lock()
            .by_user
            .get(&user)
            .map_or(0, VecDeque::len)
    }

    /// Number of active sessions for a device.
    pub fn device_session_count(&self, device: DeviceId) -> usize {
        self.inner
            .state
            .lock()
            .by_device
            .get(&device)
            .map_or(0, VecDeque::len)
    }
}

impl Securable for SessionManager {
    fn component_kind(&self) -> ComponentKind {
        ComponentKind::SessionManager
    }

    fn post_authorization_token(&self, token: AuthorizationToken) -> Result<()> {
        self.inner.vault.post(token)
    }
}

impl InstructionTarget<SessionInstruction> for SessionManager {
    fn register_instruction_set(&self, set: &mut InstructionSet<SessionInstruction>) -> bool {
        set.set_minimum_access_level(AccessLevel::Admin);

        let inner = Arc::clone(&self.inner);
        set.bind_handler(SessionInstructionKind::GetSession, move |envelope| {
            inner.handle_get_session(envelope);
        });

        let inner = Arc::clone(&self.inner);
        set.bind_handler(
            SessionInstructionKind::GetSessionsByConstraint,
            move |envelope| {
                inner.handle_get_sessions_by_constraint(envelope);
            },
        );

        let inner = Arc::clone(&self.inner);
        set.bind_handler(
            SessionInstructionKind::ForceSessionExpiration,
            move |envelope| {
                inner.handle_force_expiration(envelope);
            },
        );

        let inner = Arc::clone(&self.inner);
        set.bind_handler(
            SessionInstructionKind::ForceSessionReauthentication,
            move |envelope| {
                inner.handle_force_reauthentication(envelope);
            },
        );

        let inner = Arc::clone(&self.inner);
        set.bind_handler(
            SessionInstructionKind::ForceExpirationProcess,
            move |envelope| {
                inner.handle_force_expiration_process(envelope);
            },
        );

        let inner = Arc::clone(&self.inner);
        set.bind_handler(SessionInstructionKind::DebugGetState, move |envelope| {
            inner.handle_debug_get_state(envelope);
        });

        true
    }
}

impl SessionInner {
    fn finish_open(
        self: &Arc<Self>,
        token: AuthenticationToken,
        kind: SessionKind,
        persistent: bool,
    ) -> Result<SessionId> {
        let now = Utc::now();
        let user = token.user();
        let device = token.device();

        let mut state = self.state.lock();

        match device {
            None => {
                if self.max_sessions_per_user > 0 {
                    let open = state.by_user.get(&user).map_or(0, VecDeque::len);
                    if open as u32 >= self.max_sessions_per_user {
                        self.discard_token(&token);
                        return Err(SecurityError::TooManyUserSessions {
                            limit: self.max_sessions_per_user,
                        });
                    }
                }
            }
            Some(device) => {
                if self.max_sessions_per_device > 0 {
                    let open = state.by_device.get(&device).map_or(0, VecDeque::len);
                    if open as u32 >= self.max_sessions_per_device {
                        self.discard_token(&token);
                        return Err(SecurityError::TooManyDeviceSessions {
                            limit: self.max_sessions_per_device,
                        });
                    }
                }
            }
        }

        state.last_session_id += 1;
        let session = SessionId::new(state.last_session_id);
        let record = SessionRecord::new(session, kind, user, device, persistent, now);

        let added_to_db = if self.commit.on_open() {
            if let Err(error) = self.sessions.add_session(&record) {
                tracing::error!(session = %session, %error, "failed to persist new session");
            }
            true
        } else {
            false
        };

        match device {
            None => state.by_user.entry(user).or_default().push_back(session),
            Some(device) => state.by_device.entry(device).or_default().push_back(session),
        }

        let token_expires_at = token.expires_at();
        state.active.insert(
            session,
            SessionEntry {
                data: Arc::new(Mutex::new(record)),
                token,
                token_expires_at,
                added_to_db,
                waiting_for_reauth: false,
                waiting_for_termination: false,
            },
        );

        let mut next = token_expires_at;
        if self.inactivity_timeout > 0 {
            next = next.min(after_seconds(now, self.inactivity_timeout));
        }
        self.schedule_sweep_if_earlier(&mut state, next);

        tracing::debug!(session = %session, user = %user, "session opened");
        Ok(session)
    }

    /// Validates the re-auth precondition and discards the old token.
    fn begin_reauthentication(&self, session: SessionId) -> Result<()> {
        let state = self.state.lock();
        let Some(entry) = state.active.get(&session) else {
            return Err(SecurityError::InvalidArgument(format!(
                "unable to find session [{session}]"
            )));
        };
        if !entry.waiting_for_reauth {
            return Err(SecurityError::LogicError(format!(
                "session [{session}] is not eligible for re-authentication"
            )));
        }
        self.discard_token(&entry.token);
        Ok(())
    }

    /// Installs the replacement token and clears the re-auth flag.
    fn finish_reauthentication(
        self: &Arc<Self>,
        session: SessionId,
        token: AuthenticationToken,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let Some(entry) = state.active.get_mut(&session) else {
            // The session went away while the credential check ran.
            self.discard_token(&token);
            return Err(SecurityError::InvalidArgument(format!(
                "unable to find session [{session}]"
            )));
        };

        let token_expires_at = token.expires_at();
        entry.token = token;
        entry.token_expires_at = token_expires_at;
        entry.waiting_for_reauth = false;

        if self.commit.on_reauth() {
            let (record, added) = (Arc::clone(&entry.data), entry.added_to_db);
            self.write_session(&record.lock(), added);
        }

        self.schedule_sweep_if_earlier(&mut state, token_expires_at);
        tracing::debug!(session = %session, "session re-authenticated");
        Ok(())
    }

    fn update_counters(
        &self,
        session: SessionId,
        expected_kind: SessionKind,
        apply: impl FnOnce(&mut SessionRecord, DateTime<Utc>),
    ) -> Result<()> {
        let data = {
            let state = self.state.lock();
            let Some(entry) = state.active.get(&session) else {
                return Err(SecurityError::InvalidArgument(format!(
                    "unable to find session [{session}]"
                )));
            };
            Arc::clone(&entry.data)
        };

        let mut record = data.lock();
        if record.kind != expected_kind {
            return Err(SecurityError::LogicError(format!(
                "cannot add {} traffic to a {:?} session [{session}]",
                match expected_kind {
                    SessionKind::Data => "data",
                    SessionKind::Command => "command",
                },
                record.kind
            )));
        }
        if !record.active {
            return Err(SecurityError::LogicError(format!(
                "session [{session}] is not in an active state"
            )));
        }

        apply(&mut record, Utc::now());
        if self.commit.on_update() {
            if let Err(error) = self.sessions.update_session(&record) {
                tracing::error!(session = %session, %error, "failed to persist session update");
            }
        }
        Ok(())
    }

    /// Session and token expiration sweep; runs on the pool's timer.
    fn sweep(self: &Arc<Self>) {
        let mut for_reauth: Vec<SessionId> = Vec::new();
        let mut for_termination: Vec<SessionId> = Vec::new();

        {
            let mut state = self.state.lock();
            state.total_sweeps += 1;
            let now = Utc::now();
            let mut next: Option<DateTime<Utc>> = None;

            for (id, entry) in state.active.iter_mut() {
                if entry.waiting_for_termination {
                    continue;
                }

                if self.inactivity_timeout > 0 {
                    let (persistent, last_activity) = {
                        let record = entry.data.lock();
                        (record.persistent, record.last_activity_at)
                    };
                    if !persistent && after_seconds(last_activity, self.inactivity_timeout) <= now
                    {
                        for_termination.push(*id);
                        entry.waiting_for_termination = true;
                        if entry.waiting_for_reauth {
                            tracing::debug!(
                                session = %id,
                                "session waiting for re-authentication went inactive"
                            );
                        }
                        continue;
                    }
                }

                if entry.token_expires_at <= now {
                    if !entry.waiting_for_reauth && self.unauth_grace > 0 {
                        for_reauth.push(*id);
                        entry.waiting_for_reauth = true;
                        entry.token_expires_at =
                            after_seconds(entry.token_expires_at, self.unauth_grace);
                    } else {
                        tracing::debug!(
                            session = %id,
                            token = %entry.token.id(),
                            "session with expired token scheduled for termination"
                        );
                        for_termination.push(*id);
                        entry.waiting_for_termination = true;
                        continue;
                    }
                }

                // Persistent sessions contribute only their token expiry;
                // their stale activity timestamp would otherwise pin the
                // next sweep into the past.
                let candidate = if self.inactivity_timeout == 0 {
                    entry.token_expires_at
                } else {
                    let record = entry.data.lock();
                    if record.persistent {
                        entry.token_expires_at
                    } else {
                        entry
                            .token_expires_at
                            .min(after_seconds(record.last_activity_at, self.inactivity_timeout))
                    }
                };
                next = Some(next.map_or(candidate, |current| current.min(candidate)));
            }

            match next {
                Some(at)
                    if state
                        .next_sweep_at
                        .map_or(true, |current| current <= now || current > at) =>
                {
                    tracing::debug!(next = %at, "next expiration sweep scheduled");
                    state.next_sweep_at = Some(at);
                    let inner = Arc::clone(self);
                    self.pool.schedule_at(at, move || inner.sweep());
                }
                _ => {
                    if state.scheduled_sweeps <= 1 {
                        state.scheduled_sweeps = 0;
                        state.next_sweep_at = None;
                    } else {
                        state.scheduled_sweeps -= 1;
                    }
                }
            }
        }

        for session in for_reauth {
            let _ = self.reauth_events.send(session);
        }
        for session in for_termination {
            let _ = self.expired_events.send(session);
        }
    }

    fn schedule_sweep_if_earlier(self: &Arc<Self>, state: &mut SessionState, at: DateTime<Utc>) {
        if state.next_sweep_at.map_or(true, |current| current > at) {
            state.scheduled_sweeps += 1;
            state.next_sweep_at = Some(at);
            let inner = Arc::clone(self);
            self.pool.schedule_at(at, move || inner.sweep());
        }
    }

    fn discard_token(&self, token: &AuthenticationToken) {
        if let Err(error) = self
            .security
            .remove_authentication_token(token.id(), token.user())
        {
            tracing::error!(token = %token.id(), %error, "failed to discard authentication token");
        }
    }

    fn write_session(&self, record: &SessionRecord, added_to_db: bool) {
        let result = if added_to_db {
            self.sessions.update_session(record)
        } else {
            self.sessions.add_session(record)
        };
        if let Err(error) = result {
            tracing::error!(session = %record.id, %error, "failed to persist session");
        }
    }

    fn redeem(&self, token: Option<AuthorizationToken>) -> Result<()> {
        let Some(token) = token else {
            return Err(SecurityError::InvalidAuthorizationToken(
                "no token attached to the instruction".into(),
            ));
        };
        self.vault.redeem(token)
    }

    fn handle_get_session(&self, envelope: Envelope<SessionInstruction>) {
        let (instruction, token, responder) = envelope.into_parts();
        if let Err(error) = self.redeem(token) {
            responder.send(Err(error));
            return;
        }

        match instruction {
            SessionInstruction::GetSession { session } => {
                let snapshot = {
                    let state = self.state.lock();
                    state
                        .active
                        .get(&session)
                        .map(|entry| entry.data.lock().clone())
                };
                responder.send(Ok(SessionInstructionOutput::Session(snapshot)));
            }
            other => reject_mismatch(other, responder),
        }
    }

    fn handle_get_sessions_by_constraint(&self, envelope: Envelope<SessionInstruction>) {
        let (instruction, token, responder) = envelope.into_parts();
        if let Err(error) = self.redeem(token) {
            responder.send(Err(error));
            return;
        }

        match instruction {
            SessionInstruction::GetSessionsByConstraint { constraint } => {
                let state = self.state.lock();
                let snapshot_of = |session: &SessionId| {
                    state
                        .active
                        .get(session)
                        .map(|entry| entry.data.lock().clone())
                };

                let sessions: Vec<SessionRecord> = match constraint {
                    GetSessionsConstraint::All => state
                        .active
                        .values()
                        .map(|entry| entry.data.lock().clone())
                        .collect(),
                    GetSessionsConstraint::AllUserSessions => state
                        .by_user
                        .values()
                        .flatten()
                        .filter_map(snapshot_of)
                        .collect(),
                    GetSessionsConstraint::AllDeviceSessions => state
                        .by_device
                        .values()
                        .flatten()
                        .filter_map(snapshot_of)
                        .collect(),
                    GetSessionsConstraint::ForUser(user) => state
                        .by_user
                        .get(&user)
                        .into_iter()
                        .flatten()
                        .filter_map(snapshot_of)
                        .collect(),
                    GetSessionsConstraint::ForDevice(device) => state
                        .by_device
                        .get(&device)
                        .into_iter()
                        .flatten()
                        .filter_map(snapshot_of)
                        .collect(),
                };
                responder.send(Ok(SessionInstructionOutput::Sessions(sessions)));
            }
            other => reject_mismatch(other, responder),
        }
    }

    fn handle_force_expiration(&self, envelope: Envelope<SessionInstruction>) {
        let (instruction, token, responder) = envelope.into_parts();
        if let Err(error) = self.redeem(token) {
            responder.send(Err(error));
            return;
        }

        match instruction {
            SessionInstruction::ForceSessionExpiration { session } => {
                {
                    let mut state = self.state.lock();
                    let Some(entry) = state.active.get_mut(&session) else {
                        responder.send(Err(SecurityError::InvalidArgument(format!(
                            "unable to find session [{session}]"
                        ))));
                        return;
                    };
                    if !entry.waiting_for_termination {
                        entry.waiting_for_termination = true;
                        if entry.waiting_for_reauth {
                            tracing::debug!(
                                session = %session,
                                "session waiting for re-authentication force-expired"
                            );
                        }
                    }
                }
                let _ = self.expired_events.send(session);
                responder.send(Ok(SessionInstructionOutput::Done(true)));
            }
            other => reject_mismatch(other, responder),
        }
    }

    fn handle_force_reauthentication(&self, envelope: Envelope<SessionInstruction>) {
        let (instruction, token, responder) = envelope.into_parts();
        if let Err(error) = self.redeem(token) {
            responder.send(Err(error));
            return;
        }

        match instruction {
            SessionInstruction::ForceSessionReauthentication { session } => {
                {
                    let mut state = self.state.lock();
                    let Some(entry) = state.active.get_mut(&session) else {
                        responder.send(Err(SecurityError::InvalidArgument(format!(
                            "unable to find session [{session}]"
                        ))));
                        return;
                    };
                    if !entry.waiting_for_reauth {
                        entry.waiting_for_reauth = true;
                        entry.token_expires_at = after_seconds(Utc::now(), self.unauth_grace);
                    }
                }
                let _ = self.reauth_events.send(session);
                responder.send(Ok(SessionInstructionOutput::Done(true)));
            }
            other => reject_mismatch(other, responder),
        }
    }

    fn handle_force_expiration_process(
        self: &Arc<Self>,
        envelope: Envelope<SessionInstruction>,
    ) {
        let (instruction, token, responder) = envelope.into_parts();
        if let Err(error) = self.redeem(token) {
            responder.send(Err(error));
            return;
        }

        match instruction {
            SessionInstruction::ForceExpirationProcess { delay } => {
                let at = after_seconds(Utc::now(), delay);
                {
                    let mut state = self.state.lock();
                    state.scheduled_sweeps += 1;
                    if state.next_sweep_at.map_or(true, |current| current > at) {
                        state.next_sweep_at = Some(at);
                    }
                }
                let inner = Arc::clone(self);
                self.pool.schedule_at(at, move || inner.sweep());
                responder.send(Ok(SessionInstructionOutput::Done(true)));
            }
            other => reject_mismatch(other, responder),
        }
    }

    fn handle_debug_get_state(&self, envelope: Envelope<SessionInstruction>) {
        let (instruction, token, responder) = envelope.into_parts();
        if let Err(error) = self.redeem(token) {
            responder.send(Err(error));
            return;
        }

        match instruction {
            SessionInstruction::DebugGetState => {
                let state = self.state.lock();
                let dump = serde_json::json!({
                    "max_sessions_per_user": self.max_sessions_per_user,
                    "max_sessions_per_device": self.max_sessions_per_device,
                    "commit_policy": self.commit,
                    "inactivity_timeout": self.inactivity_timeout,
                    "unauth_grace": self.unauth_grace,
                    "last_session_id": state.last_session_id,
                    "active_sessions": state.active.len(),
                    "users_with_sessions": state.by_user.len(),
                    "devices_with_sessions": state.by_device.len(),
                    "next_sweep_at": state.next_sweep_at,
                    "scheduled_sweeps": state.scheduled_sweeps,
                    "total_sweeps": state.total_sweeps,
                    "pending_authorization_tokens": self.vault.pending(),
                });
                responder.send(Ok(SessionInstructionOutput::State(dump)));
            }
            other => reject_mismatch(other, responder),
        }
    }
}

fn reject_mismatch(
    instruction: SessionInstruction,
    responder: Responder<SessionInstructionOutput>,
) {
    tracing::error!(?instruction, "handler received a mismatched instruction variant");
    responder.send(Err(SecurityError::LogicError(
        "handler received a mismatched instruction variant".into(),
    )));
}

fn unlink<K: std::hash::Hash + Eq>(
    index: &mut HashMap<K, VecDeque<SessionId>>,
    key: K,
    session: SessionId,
) {
    if let Some(sessions) = index.get_mut(&key) {
        sessions.retain(|candidate| *candidate != session);
        if sessions.is_empty() {
            index.remove(&key);
        }
    }
}

fn after_seconds(timestamp: DateTime<Utc>, seconds: Seconds) -> DateTime<Utc> {
    let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
    let delta = chrono::TimeDelta::try_seconds(seconds).unwrap_or(chrono::TimeDelta::MAX);
    timestamp
        .checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
