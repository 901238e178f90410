//! End-to-end instruction flow: source → dispatcher → session manager,
//! with one-shot authorization tokens redeemed by the target.

mod common;

use assert_matches::assert_matches;
use common::{put_alice, wire, Env, ALICE, PASSWORD};
use parking_lot::Mutex;
use vigil_core::{
    AuthorizationToken, ComponentKind, InstructionSetKind, SecurityError, SessionId, SessionKind,
};
use vigil_instructions::{Envelope, ErasedEnvelope, InstructionRelay, InstructionSource};
use vigil_security::{AuthorizationRequest, SecurityConfig};
use vigil_sessions::{
    GetSessionsConstraint, SessionConfig, SessionInstruction, SessionInstructionOutput,
};

/// A source that forwards whatever the test emits.
#[derive(Default)]
struct TestSource {
    relay: Mutex<Option<InstructionRelay>>,
}

impl TestSource {
    fn emit(&self, envelope: Box<dyn ErasedEnvelope>) {
        let relay = self.relay.lock();
        relay.as_ref().expect("relay not installed")(envelope);
    }
}

impl InstructionSource for TestSource {
    fn required_instruction_sets(&self) -> Vec<InstructionSetKind> {
        vec![InstructionSetKind::SessionManager]
    }

    fn attach_instruction_relay(&self, relay: InstructionRelay) -> bool {
        *self.relay.lock() = Some(relay);
        true
    }
}

async fn authorized_token(env: &Env) -> AuthorizationToken {
    let request = AuthorizationRequest::new(
        ALICE,
        &env.sessions,
        ComponentKind::SessionManager,
        InstructionSetKind::SessionManager,
    );
    env.security.post_authorization(request).await.unwrap()
}

async fn open_admin_session(env: &Env) -> SessionId {
    env.sessions
        .open_user_session("alice", PASSWORD, SessionKind::Command, false)
        .await
        .unwrap()
}

#[tokio::test]
async fn authorized_instructions_execute_once() {
    let env = wire(SecurityConfig::with_defaults(), SessionConfig::default());
    put_alice(&env);
    let source = TestSource::default();
    env.dispatcher.register_source(&source).unwrap();

    let session = open_admin_session(&env).await;
    let token = authorized_token(&env).await;

    let (envelope, pending) =
        Envelope::new(SessionInstruction::GetSession { session }, Some(token.clone()));
    source.emit(Box::new(envelope));
    let output = pending.await.unwrap();
    assert_matches!(
        output,
        SessionInstructionOutput::Session(Some(record)) if record.id == session
    );

    // The same capability cannot authorize a second instruction.
    let (envelope, pending) =
        Envelope::new(SessionInstruction::GetSession { session }, Some(token));
    source.emit(Box::new(envelope));
    assert_matches!(
        pending.await,
        Err(SecurityError::InvalidAuthorizationToken(_))
    );
}

#[tokio::test]
async fn instructions_without_tokens_are_rejected() {
    let env = wire(SecurityConfig::with_defaults(), SessionConfig::default());
    put_alice(&env);
    let source = TestSource::default();
    env.dispatcher.register_source(&source).unwrap();

    let session = open_admin_session(&env).await;
    let (envelope, pending) = Envelope::new(SessionInstruction::GetSession { session }, None);
    source.emit(Box::new(envelope));
    assert_matches!(
        pending.await,
        Err(SecurityError::InvalidAuthorizationToken(_))
    );
}

#[tokio::test]
async fn constraint_queries_cover_the_indexes() {
    let env = wire(SecurityConfig::with_defaults(), SessionConfig::default());
    put_alice(&env);
    let source = TestSource::default();
    env.dispatcher.register_source(&source).unwrap();

    let first = open_admin_session(&env).await;
    let second = open_admin_session(&env).await;

    for (constraint, expected) in [
        (GetSessionsConstraint::All, 2usize),
        (GetSessionsConstraint::AllUserSessions, 2),
        (GetSessionsConstraint::AllDeviceSessions, 0),
        (GetSessionsConstraint::ForUser(ALICE), 2),
    ] {
        let token = authorized_token(&env).await;
        let (envelope, pending) = Envelope::new(
            SessionInstruction::GetSessionsByConstraint { constraint },
            Some(token),
        );
        source.emit(Box::new(envelope));
        let output = pending.await.unwrap();
        let SessionInstructionOutput::Sessions(records) = output else {
            panic!("unexpected output variant");
        };
        assert_eq!(records.len(), expected, "constraint {constraint:?}");
    }

    let _ = (first, second);
}

#[tokio::test]
async fn forced_expiration_fires_the_event() {
    let env = wire(SecurityConfig::with_defaults(), SessionConfig::default());
    put_alice(&env);
    let source = TestSource::default();
    env.dispatcher.register_source(&source).unwrap();

    let session = open_admin_session(&env).await;
    let mut expired = env.sessions.expired_sessions();

    let token = authorized_token(&env).await;
    let (envelope, pending) = Envelope::new(
        SessionInstruction::ForceSessionExpiration { session },
        Some(token),
    );
    source.emit(Box::new(envelope));
    assert_matches!(pending.await.unwrap(), SessionInstructionOutput::Done(true));
    assert_eq!(expired.recv().await.unwrap(), session);

    // Unknown sessions are caller errors, and the token is still spent.
    let token = authorized_token(&env).await;
    let (envelope, pending) = Envelope::new(
        SessionInstruction::ForceSessionExpiration {
            session: SessionId::new(999),
        },
        Some(token),
    );
    source.emit(Box::new(envelope));
    assert_matches!(pending.await, Err(SecurityError::InvalidArgument(_)));
}

#[tokio::test]
async fn forced_reauthentication_flags_the_session() {
    let env = wire(SecurityConfig::with_defaults(), SessionConfig::default());
    put_alice(&env);
    let source = TestSource::default();
    env.dispatcher.register_source(&source).unwrap();

    let session = open_admin_session(&env).await;
    let mut reauth = env.sessions.reauthentications_required();

    let token = authorized_token(&env).await;
    let (envelope, pending) = Envelope::new(
        SessionInstruction::ForceSessionReauthentication { session },
        Some(token),
    );
    source.emit(Box::new(envelope));
    assert_matches!(pending.await.unwrap(), SessionInstructionOutput::Done(true));
    assert_eq!(reauth.recv().await.unwrap(), session);

    // The flag is genuinely set: re-authentication is now legal.
    env.sessions
        .reauthenticate_user_session(session, "alice", PASSWORD)
        .await
        .unwrap();
}

#[tokio::test]
async fn debug_state_reports_the_manager_shape() {
    let env = wire(SecurityConfig::with_defaults(), SessionConfig::default());
    put_alice(&env);
    let source = TestSource::default();
    env.dispatcher.register_source(&source).unwrap();

    let _session = open_admin_session(&env).await;
    let token = authorized_token(&env).await;
    let (envelope, pending) = Envelope::new(SessionInstruction::DebugGetState, Some(token));
    source.emit(Box::new(envelope));

    let SessionInstructionOutput::State(state) = pending.await.unwrap() else {
        panic!("unexpected output variant");
    };
    assert_eq!(state["active_sessions"], 1);
    assert_eq!(state["last_session_id"], 1);
    assert_eq!(state["pending_authorization_tokens"], 0);
}

#[tokio::test]
async fn extra_sweeps_can_be_forced() {
    let env = wire(SecurityConfig::with_defaults(), SessionConfig::default());
    put_alice(&env);
    let source = TestSource::default();
    env.dispatcher.register_source(&source).unwrap();

    let _session = open_admin_session(&env).await;
    let token = authorized_token(&env).await;
    let (envelope, pending) = Envelope::new(
        SessionInstruction::ForceExpirationProcess { delay: 0 },
        Some(token),
    );
    source.emit(Box::new(envelope));
    assert_matches!(pending.await.unwrap(), SessionInstructionOutput::Done(true));
}
