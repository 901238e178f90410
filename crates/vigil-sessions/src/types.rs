//! Session manager configuration and query types.

use serde::{Deserialize, Serialize};
use vigil_core::{DeviceId, Seconds, UserId};

/// When session state is flushed to persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CommitPolicy {
    /// Session data never reaches persistence.
    Never,
    /// Persist on open and on close.
    OnClose,
    /// Persist on open, on re-authentication and on close.
    OnReauth,
    /// Persist on open, on every counter update, on re-authentication
    /// and on close.
    #[default]
    OnUpdate,
}

impl CommitPolicy {
    /// Whether a freshly opened session is written out.
    pub fn on_open(self) -> bool {
        self != Self::Never
    }

    /// Whether counter updates are written out.
    pub fn on_update(self) -> bool {
        self == Self::OnUpdate
    }

    /// Whether re-authentication is written out.
    pub fn on_reauth(self) -> bool {
        matches!(self, Self::OnReauth | Self::OnUpdate)
    }

    /// Whether closing is written out.
    pub fn on_close(self) -> bool {
        self != Self::Never
    }
}

/// Which sessions a query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GetSessionsConstraint {
    /// Every active session.
    All,
    /// Every user-scoped session.
    AllUserSessions,
    /// Every device-scoped session.
    AllDeviceSessions,
    /// Sessions of one user.
    ForUser(UserId),
    /// Sessions of one device.
    ForDevice(DeviceId),
}

/// Session manager configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Worker tasks in the manager's pool.
    pub thread_pool_size: usize,
    /// Concurrent sessions allowed per user; zero means unlimited.
    pub max_sessions_per_user: u32,
    /// Concurrent sessions allowed per device; zero means unlimited.
    pub max_sessions_per_device: u32,
    /// Persistence policy for session state.
    pub commit_policy: CommitPolicy,
    /// Idle time after which a non-persistent session expires, in
    /// seconds; zero disables the timeout.
    pub inactivity_timeout: Seconds,
    /// Grace period granted for re-authentication after the token
    /// expires, in seconds; zero expires the session immediately.
    pub unauth_grace: Seconds,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: 2,
            max_sessions_per_user: 0,
            max_sessions_per_device: 0,
            commit_policy: CommitPolicy::OnUpdate,
            inactivity_timeout: 0,
            unauth_grace: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_policy_matrix() {
        for (policy, open, update, reauth, close) in [
            (CommitPolicy::Never, false, false, false, false),
            (CommitPolicy::OnClose, true, false, false, true),
            (CommitPolicy::OnReauth, true, false, true, true),
            (CommitPolicy::OnUpdate, true, true, true, true),
        ] {
            assert_eq!(policy.on_open(), open);
            assert_eq!(policy.on_update(), update);
            assert_eq!(policy.on_reauth(), reauth);
            assert_eq!(policy.on_close(), close);
        }
    }
}
