//! Session lifecycle: open, close, caps, counters and commit policies.

mod common;

use assert_matches::assert_matches;
use common::{put_alice, put_laptop, wire, ALICE, LAPTOP, PASSWORD};
use vigil_core::{ComponentKind, InstructionSetKind, SecurityError, SessionId, SessionKind};
use vigil_security::{AuthorizationRequest, SecurityConfig};
use vigil_sessions::{CommitPolicy, SessionConfig};

#[tokio::test]
async fn sessions_open_and_close() {
    let env = wire(SecurityConfig::with_defaults(), SessionConfig::default());
    put_alice(&env);

    let session = env
        .sessions
        .open_user_session("alice", PASSWORD, SessionKind::Command, false)
        .await
        .unwrap();

    let snapshot = env.sessions.session_snapshot(session).unwrap();
    assert_eq!(snapshot.user, ALICE);
    assert_eq!(snapshot.kind, SessionKind::Command);
    assert_eq!(snapshot.device, None);
    assert!(snapshot.active);
    assert_eq!(env.sessions.user_session_count(ALICE), 1);

    env.sessions.close_session(session).unwrap();
    assert_eq!(env.sessions.user_session_count(ALICE), 0);
    assert!(env.sessions.session_snapshot(session).is_none());

    // Closing again is a caller error.
    assert_matches!(
        env.sessions.close_session(session),
        Err(SecurityError::InvalidArgument(_))
    );

    // The persisted record is closed too (policy persists on open+close).
    let stored = env.store.session(session).unwrap();
    assert!(!stored.active);
    assert!(stored.closed_at.is_some());
}

#[tokio::test]
async fn commit_policy_never_skips_persistence_entirely() {
    let session_config = SessionConfig {
        commit_policy: CommitPolicy::Never,
        ..SessionConfig::default()
    };
    let env = wire(SecurityConfig::with_defaults(), session_config);
    put_alice(&env);

    let session = env
        .sessions
        .open_user_session("alice", PASSWORD, SessionKind::Data, false)
        .await
        .unwrap();
    env.sessions.add_data_sent(session, 1024).unwrap();
    env.sessions.close_session(session).unwrap();

    assert_eq!(env.store.session_writes(), (0, 0));
}

#[tokio::test]
async fn commit_policy_on_update_writes_every_counter_change() {
    let env = wire(SecurityConfig::with_defaults(), SessionConfig::default());
    put_alice(&env);

    let session = env
        .sessions
        .open_user_session("alice", PASSWORD, SessionKind::Data, false)
        .await
        .unwrap();
    let (adds, _) = env.store.session_writes();
    assert_eq!(adds, 1);

    env.sessions.add_data_sent(session, 10).unwrap();
    env.sessions.add_data_received(session, 20).unwrap();
    let (_, updates) = env.store.session_writes();
    assert_eq!(updates, 2);

    let stored = env.store.session(session).unwrap();
    assert_eq!(stored.data_sent, 10);
    assert_eq!(stored.data_received, 20);
}

#[tokio::test]
async fn counter_kinds_are_enforced() {
    let env = wire(SecurityConfig::with_defaults(), SessionConfig::default());
    put_alice(&env);

    let data = env
        .sessions
        .open_user_session("alice", PASSWORD, SessionKind::Data, false)
        .await
        .unwrap();
    let command = env
        .sessions
        .open_user_session("alice", PASSWORD, SessionKind::Command, false)
        .await
        .unwrap();

    assert_matches!(
        env.sessions.add_commands_sent(data, 1),
        Err(SecurityError::LogicError(_))
    );
    assert_matches!(
        env.sessions.add_data_sent(command, 1),
        Err(SecurityError::LogicError(_))
    );

    env.sessions.add_commands_received(command, 3).unwrap();
    env.sessions.add_data_received(data, 3).unwrap();

    assert_matches!(
        env.sessions.add_data_sent(SessionId::new(999), 1),
        Err(SecurityError::InvalidArgument(_))
    );
}

#[tokio::test]
async fn user_session_cap_revokes_the_extra_token() {
    let session_config = SessionConfig {
        max_sessions_per_user: 2,
        ..SessionConfig::default()
    };
    let env = wire(SecurityConfig::with_defaults(), session_config);
    put_alice(&env);

    let first = env
        .sessions
        .open_user_session("alice", PASSWORD, SessionKind::Command, false)
        .await
        .unwrap();
    let second = env
        .sessions
        .open_user_session("alice", PASSWORD, SessionKind::Command, false)
        .await
        .unwrap();

    assert_matches!(
        env.sessions
            .open_user_session("alice", PASSWORD, SessionKind::Command, false)
            .await,
        Err(SecurityError::TooManyUserSessions { limit: 2 })
    );
    assert_eq!(env.sessions.user_session_count(ALICE), 2);

    // While the first two sessions hold live tokens, authorization works.
    let request = AuthorizationRequest::new(
        ALICE,
        &env.sessions,
        ComponentKind::SessionManager,
        InstructionSetKind::SessionManager,
    );
    env.security.post_authorization(request).await.unwrap();

    // Closing both sessions leaves no tokens at all: the token minted for
    // the rejected third session was revoked when the cap tripped.
    env.sessions.close_session(first).unwrap();
    env.sessions.close_session(second).unwrap();
    let request = AuthorizationRequest::new(
        ALICE,
        &env.sessions,
        ComponentKind::SessionManager,
        InstructionSetKind::SessionManager,
    );
    assert_matches!(
        env.security.post_authorization(request).await,
        Err(SecurityError::UserNotAuthenticated)
    );
}

#[tokio::test]
async fn device_session_cap_is_independent() {
    let session_config = SessionConfig {
        max_sessions_per_device: 1,
        ..SessionConfig::default()
    };
    let env = wire(SecurityConfig::with_defaults(), session_config);
    put_alice(&env);
    put_laptop(&env);

    let session = env
        .sessions
        .open_device_session(LAPTOP, PASSWORD, SessionKind::Data, false)
        .await
        .unwrap();
    let snapshot = env.sessions.session_snapshot(session).unwrap();
    assert_eq!(snapshot.device, Some(LAPTOP));
    assert_eq!(snapshot.user, ALICE);

    assert_matches!(
        env.sessions
            .open_device_session(LAPTOP, PASSWORD, SessionKind::Data, false)
            .await,
        Err(SecurityError::TooManyDeviceSessions { limit: 1 })
    );
    assert_eq!(env.sessions.device_session_count(LAPTOP), 1);
}

#[tokio::test]
async fn reauthentication_requires_the_waiting_state() {
    let env = wire(SecurityConfig::with_defaults(), SessionConfig::default());
    put_alice(&env);

    let session = env
        .sessions
        .open_user_session("alice", PASSWORD, SessionKind::Command, false)
        .await
        .unwrap();

    // Fresh sessions are not eligible; the state must not change.
    assert_matches!(
        env.sessions
            .reauthenticate_user_session(session, "alice", PASSWORD)
            .await,
        Err(SecurityError::LogicError(_))
    );
    assert!(env.sessions.session_snapshot(session).unwrap().active);

    assert_matches!(
        env.sessions
            .reauthenticate_user_session(SessionId::new(999), "alice", PASSWORD)
            .await,
        Err(SecurityError::InvalidArgument(_))
    );
}

#[tokio::test]
async fn failed_authentication_never_creates_a_session() {
    let env = wire(SecurityConfig::with_defaults(), SessionConfig::default());
    put_alice(&env);

    assert_matches!(
        env.sessions
            .open_user_session("alice", "wrong", SessionKind::Command, false)
            .await,
        Err(SecurityError::InvalidPassword { .. })
    );
    assert_eq!(env.sessions.user_session_count(ALICE), 0);
    assert_eq!(env.store.session_writes(), (0, 0));
}
