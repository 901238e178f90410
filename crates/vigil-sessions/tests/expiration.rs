//! Timer-driven expiration and re-authentication sweeps.
//!
//! These tests run against the wall clock with second-scale timeouts;
//! generous upper bounds keep them stable on slow machines.

mod common;

use assert_matches::assert_matches;
use common::{put_alice, wire, ALICE, PASSWORD};
use std::time::Duration;
use vigil_core::{SecurityError, SessionKind};
use vigil_security::SecurityConfig;
use vigil_sessions::SessionConfig;

fn short_token_security(validity: u64) -> SecurityConfig {
    let mut config = SecurityConfig::with_defaults();
    config.authentication_token_validity = validity;
    config
}

#[tokio::test]
async fn expired_tokens_trigger_reauthentication_then_termination() {
    let session_config = SessionConfig {
        unauth_grace: 3,
        inactivity_timeout: 0,
        ..SessionConfig::default()
    };
    let env = wire(short_token_security(2), session_config);
    put_alice(&env);

    let mut reauth = env.sessions.reauthentications_required();
    let mut expired = env.sessions.expired_sessions();

    let session = env
        .sessions
        .open_user_session("alice", PASSWORD, SessionKind::Command, false)
        .await
        .unwrap();

    // The token lives for 2 seconds; the sweep then asks for re-auth.
    let flagged = tokio::time::timeout(Duration::from_secs(4), reauth.recv())
        .await
        .expect("re-authentication event did not fire")
        .unwrap();
    assert_eq!(flagged, session);

    // Nobody re-authenticates within the 3-second grace; the session is
    // then handed out for termination.
    let terminated = tokio::time::timeout(Duration::from_secs(6), expired.recv())
        .await
        .expect("expiration event did not fire")
        .unwrap();
    assert_eq!(terminated, session);

    // Tearing the session down on the event removes it from the indexes.
    env.sessions.close_session(session).unwrap();
    assert_eq!(env.sessions.user_session_count(ALICE), 0);
}

#[tokio::test]
async fn reauthentication_within_the_grace_keeps_the_session() {
    let session_config = SessionConfig {
        unauth_grace: 30,
        inactivity_timeout: 0,
        ..SessionConfig::default()
    };
    let env = wire(short_token_security(1), session_config);
    put_alice(&env);

    let mut reauth = env.sessions.reauthentications_required();
    let session = env
        .sessions
        .open_user_session("alice", PASSWORD, SessionKind::Command, false)
        .await
        .unwrap();

    let flagged = tokio::time::timeout(Duration::from_secs(3), reauth.recv())
        .await
        .expect("re-authentication event did not fire")
        .unwrap();
    assert_eq!(flagged, session);

    env.sessions
        .reauthenticate_user_session(session, "alice", PASSWORD)
        .await
        .unwrap();

    // The flag is cleared: a second re-authentication is illegal again.
    assert_matches!(
        env.sessions
            .reauthenticate_user_session(session, "alice", PASSWORD)
            .await,
        Err(SecurityError::LogicError(_))
    );
    assert!(env.sessions.session_snapshot(session).unwrap().active);
    assert_eq!(env.sessions.user_session_count(ALICE), 1);
}

#[tokio::test]
async fn inactive_sessions_expire_without_grace() {
    let session_config = SessionConfig {
        inactivity_timeout: 1,
        unauth_grace: 0,
        ..SessionConfig::default()
    };
    let env = wire(short_token_security(600), session_config);
    put_alice(&env);

    let mut expired = env.sessions.expired_sessions();
    let session = env
        .sessions
        .open_user_session("alice", PASSWORD, SessionKind::Data, false)
        .await
        .unwrap();

    let terminated = tokio::time::timeout(Duration::from_secs(3), expired.recv())
        .await
        .expect("inactivity expiration did not fire")
        .unwrap();
    assert_eq!(terminated, session);
}

#[tokio::test]
async fn persistent_sessions_ignore_the_inactivity_timeout() {
    let session_config = SessionConfig {
        inactivity_timeout: 1,
        unauth_grace: 0,
        ..SessionConfig::default()
    };
    let env = wire(short_token_security(600), session_config);
    put_alice(&env);

    let mut expired = env.sessions.expired_sessions();
    let _session = env
        .sessions
        .open_user_session("alice", PASSWORD, SessionKind::Data, true)
        .await
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_millis(2_500), expired.recv()).await;
    assert!(outcome.is_err(), "persistent session expired unexpectedly");
}

#[tokio::test]
async fn failed_reauthentication_leaves_the_session_waiting() {
    let session_config = SessionConfig {
        unauth_grace: 30,
        inactivity_timeout: 0,
        ..SessionConfig::default()
    };
    let env = wire(short_token_security(1), session_config);
    put_alice(&env);

    let mut reauth = env.sessions.reauthentications_required();
    let session = env
        .sessions
        .open_user_session("alice", PASSWORD, SessionKind::Command, false)
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(3), reauth.recv())
        .await
        .expect("re-authentication event did not fire")
        .unwrap();

    // The wrong password fails the credential check; the session stays
    // flagged, so a later correct attempt is still possible.
    assert_matches!(
        env.sessions
            .reauthenticate_user_session(session, "alice", "wrong")
            .await,
        Err(SecurityError::InvalidPassword { .. })
    );
    env.sessions
        .reauthenticate_user_session(session, "alice", PASSWORD)
        .await
        .unwrap();
}
