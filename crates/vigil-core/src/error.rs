//! Error taxonomy shared by every Vigil component.
//!
//! Requests resolve to `Result<T, SecurityError>`; the requester decides
//! whether to retry. Only two failures are handled locally by the
//! managers: password verification falls back to the previous hashing
//! configuration, and delay-calculation overflow is clamped.

use thiserror::Error;

/// Duration in whole seconds, the only time unit the configuration speaks.
pub type Seconds = u64;

/// Convenience alias used across the workspace.
pub type Result<T, E = SecurityError> = std::result::Result<T, E>;

/// Every failure the security/session core can surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    /// No user record exists for the supplied id or name.
    #[error("user not found")]
    UserNotFound,

    /// No device record exists for the supplied id.
    #[error("device not found")]
    DeviceNotFound,

    /// Password verification failed with every applicable configuration,
    /// or a candidate password violated a password rule.
    #[error("invalid password{}", reason_suffix(.reason))]
    InvalidPassword {
        /// The failed rule's reason, when a rule rejected the password.
        reason: Option<String>,
    },

    /// The user is locked, either explicitly or by the failed-attempt delay.
    #[error("user is locked{}", retry_suffix(.retry_in))]
    UserLocked {
        /// Remaining delay in seconds, when the lock is delay-based.
        retry_in: Option<Seconds>,
    },

    /// The device is locked, either explicitly or by the failed-attempt delay.
    #[error("device is locked{}", retry_suffix(.retry_in))]
    DeviceLocked {
        /// Remaining delay in seconds, when the lock is delay-based.
        retry_in: Option<Seconds>,
    },

    /// The user's access level is below what the operation requires.
    #[error("insufficient user access")]
    InsufficientUserAccess,

    /// The device does not belong to the user named in the request.
    #[error("device does not belong to the expected user")]
    UnexpectedDevice,

    /// The user's authorization rules do not cover the instruction's set.
    #[error("instruction not allowed for user")]
    InstructionNotAllowed,

    /// No live authentication token is on file for the user/device pair.
    #[error("user is not authenticated")]
    UserNotAuthenticated,

    /// A one-shot authorization token was missing, already used or did not
    /// match the one delivered to the target.
    #[error("invalid authorization token: {0}")]
    InvalidAuthorizationToken(String),

    /// The user reached the concurrent-session cap.
    #[error("too many concurrent sessions for user (limit {limit})")]
    TooManyUserSessions {
        /// Configured per-user limit.
        limit: u32,
    },

    /// The device reached the concurrent-session cap.
    #[error("too many concurrent sessions for device (limit {limit})")]
    TooManyDeviceSessions {
        /// Configured per-device limit.
        limit: u32,
    },

    /// Malformed request, bad configuration, or an out-of-range key/IV.
    /// Rejected at entry, before any state is touched.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Wiring or configuration bug: unregistered component or set,
    /// invalid access-rule record, impossible state transition.
    #[error("logic error: {0}")]
    LogicError(String),
}

fn retry_suffix(retry_in: &Option<Seconds>) -> String {
    match retry_in {
        Some(seconds) => format!(" for {seconds} more second(s)"),
        None => String::new(),
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {reason}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_errors_render_remaining_time() {
        let with = SecurityError::UserLocked { retry_in: Some(4) };
        let without = SecurityError::DeviceLocked { retry_in: None };
        assert_eq!(with.to_string(), "user is locked for 4 more second(s)");
        assert_eq!(without.to_string(), "device is locked");
    }
}
