//! The session manager's own instruction set.

use crate::types::GetSessionsConstraint;
use vigil_core::{InstructionSetKind, Seconds, SessionId, SessionRecord};
use vigil_instructions::InstructionFamily;

/// Discriminants of [`SessionInstruction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionInstructionKind {
    /// [`SessionInstruction::GetSession`].
    GetSession,
    /// [`SessionInstruction::GetSessionsByConstraint`].
    GetSessionsByConstraint,
    /// [`SessionInstruction::ForceSessionExpiration`].
    ForceSessionExpiration,
    /// [`SessionInstruction::ForceSessionReauthentication`].
    ForceSessionReauthentication,
    /// [`SessionInstruction::ForceExpirationProcess`].
    ForceExpirationProcess,
    /// [`SessionInstruction::DebugGetState`].
    DebugGetState,
}

/// Administrative instructions served by the session manager.
#[derive(Debug)]
pub enum SessionInstruction {
    /// Fetch a snapshot of one session.
    GetSession {
        /// Session to fetch.
        session: SessionId,
    },
    /// Fetch snapshots of every session matching a constraint.
    GetSessionsByConstraint {
        /// Which sessions to include.
        constraint: GetSessionsConstraint,
    },
    /// Mark a session for termination and fire the expiration event.
    ForceSessionExpiration {
        /// Session to expire.
        session: SessionId,
    },
    /// Mark a session for re-authentication and fire the event.
    ForceSessionReauthentication {
        /// Session to flag.
        session: SessionId,
    },
    /// Schedule an extra expiration sweep.
    ForceExpirationProcess {
        /// Delay before the sweep, in seconds.
        delay: Seconds,
    },
    /// Dump the manager's state for diagnostics.
    DebugGetState,
}

/// Results of [`SessionInstruction`] variants.
#[derive(Debug)]
pub enum SessionInstructionOutput {
    /// A single session snapshot, if the session exists.
    Session(Option<SessionRecord>),
    /// Matching session snapshots.
    Sessions(Vec<SessionRecord>),
    /// Whether the operation took effect.
    Done(bool),
    /// Diagnostic state dump.
    State(serde_json::Value),
}

impl InstructionFamily for SessionInstruction {
    type Kind = SessionInstructionKind;
    type Output = SessionInstructionOutput;
    const SET: InstructionSetKind = InstructionSetKind::SessionManager;

    fn kind(&self) -> SessionInstructionKind {
        match self {
            Self::GetSession { .. } => SessionInstructionKind::GetSession,
            Self::GetSessionsByConstraint { .. } => {
                SessionInstructionKind::GetSessionsByConstraint
            }
            Self::ForceSessionExpiration { .. } => SessionInstructionKind::ForceSessionExpiration,
            Self::ForceSessionReauthentication { .. } => {
                SessionInstructionKind::ForceSessionReauthentication
            }
            Self::ForceExpirationProcess { .. } => SessionInstructionKind::ForceExpirationProcess,
            Self::DebugGetState => SessionInstructionKind::DebugGetState,
        }
    }
}
