//! Shared wiring for the session manager tests.

#![allow(dead_code)]

use std::sync::Arc;
use vigil_core::{
    AccessLevel, DeviceId, DeviceRecord, InstructionSetKind, MemoryStore, Securable, UserId,
    UserRecord,
};
use vigil_crypto::{build_password_blob, random_salt};
use vigil_instructions::InstructionDispatcher;
use vigil_security::{PasswordHashingConfig, SecurityConfig, SecurityManager};
use vigil_sessions::{SessionConfig, SessionInstruction, SessionManager};

pub const ALICE: UserId = UserId::new(1);
pub const LAPTOP: DeviceId = DeviceId::new(7);
pub const PASSWORD: &str = "P@ssw0rd1";

pub struct Env {
    pub store: Arc<MemoryStore>,
    pub dispatcher: Arc<InstructionDispatcher>,
    pub security: SecurityManager,
    pub sessions: SessionManager,
}

/// Installs a test subscriber once so `RUST_LOG` controls test output.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Wires the full stack: store, dispatcher, security core and session
/// manager, with the session manager registered both as a securable
/// component and as an instruction target.
pub fn wire(security_config: SecurityConfig, session_config: SessionConfig) -> Env {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let dispatcher = InstructionDispatcher::new(vec![InstructionSetKind::SessionManager]);

    let security = SecurityManager::new(
        security_config,
        store.clone(),
        store.clone(),
        Arc::clone(&dispatcher),
    )
    .unwrap();

    let sessions = SessionManager::new(session_config, security.clone(), store.clone());
    security
        .register_securable(Arc::new(sessions.clone()) as Arc<dyn Securable>)
        .unwrap();
    dispatcher
        .register_target::<SessionInstruction, _>(&sessions)
        .unwrap();

    Env {
        store,
        dispatcher,
        security,
        sessions,
    }
}

/// Seeds alice as an admin allowed to use the session manager set.
pub fn put_alice(env: &Env) {
    let hashing = PasswordHashingConfig::default();
    let salt = random_salt(hashing.user_salt_size);
    let blob = build_password_blob(hashing.user_algorithm, &salt, PASSWORD);
    env.store.put_user(
        UserRecord::new(ALICE, "alice", blob)
            .with_access_level(AccessLevel::Admin)
            .with_rule(InstructionSetKind::SessionManager),
    );
}

/// Seeds alice's laptop with the shared password.
pub fn put_laptop(env: &Env) {
    let hashing = PasswordHashingConfig::default();
    let salt = random_salt(hashing.device_salt_size);
    let blob = build_password_blob(hashing.device_algorithm, &salt, PASSWORD);
    env.store
        .put_device(DeviceRecord::new(LAPTOP, ALICE, "laptop", blob));
}
