//! Shared wiring for the security manager tests.

#![allow(dead_code)]

use std::sync::Arc;
use vigil_core::{
    AccessLevel, AuthorizationToken, ComponentKind, InstructionSetKind, MemoryStore, Result,
    Securable, TokenVault, UserId, UserRecord,
};
use vigil_crypto::build_password_blob;
use vigil_instructions::{Envelope, InstructionDispatcher, InstructionFamily, InstructionSet, InstructionTarget};
use vigil_security::{PasswordHashingConfig, SecurityConfig, SecurityManager};

/// Securable stub standing in for a registered backend component.
pub struct StubComponent {
    kind: ComponentKind,
    pub vault: TokenVault,
}

impl StubComponent {
    pub fn new(kind: ComponentKind, set: InstructionSetKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            vault: TokenVault::new(set),
        })
    }
}

impl Securable for StubComponent {
    fn component_kind(&self) -> ComponentKind {
        self.kind
    }

    fn post_authorization_token(&self, token: AuthorizationToken) -> Result<()> {
        self.vault.post(token)
    }
}

/// One-variant family so the dispatcher has a registered storage set.
#[derive(Debug)]
pub struct Probe;

impl InstructionFamily for Probe {
    type Kind = ();
    type Output = ();
    const SET: InstructionSetKind = InstructionSetKind::StorageManager;

    fn kind(&self) {}
}

pub struct ProbeTarget(pub AccessLevel);

impl InstructionTarget<Probe> for ProbeTarget {
    fn register_instruction_set(&self, set: &mut InstructionSet<Probe>) -> bool {
        set.set_minimum_access_level(self.0);
        set.bind_handler((), |envelope: Envelope<Probe>| envelope.resolve(Ok(())));
        true
    }
}

pub struct Setup {
    pub store: Arc<MemoryStore>,
    pub dispatcher: Arc<InstructionDispatcher>,
    pub manager: SecurityManager,
    pub session_source: Arc<StubComponent>,
    pub storage_target: Arc<StubComponent>,
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

/// Wires a manager with a storage target requiring `User` access.
pub fn setup(config: SecurityConfig) -> Setup {
    setup_with_min_level(config, AccessLevel::User)
}

/// Wires a manager with a storage target requiring `min_level` access.
pub fn setup_with_min_level(config: SecurityConfig, min_level: AccessLevel) -> Setup {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let dispatcher = InstructionDispatcher::new(vec![InstructionSetKind::StorageManager]);
    dispatcher
        .register_target::<Probe, _>(&ProbeTarget(min_level))
        .unwrap();

    let manager = SecurityManager::new(
        config,
        store.clone(),
        store.clone(),
        Arc::clone(&dispatcher),
    )
    .unwrap();

    let session_source = StubComponent::new(
        ComponentKind::SessionManager,
        InstructionSetKind::StorageManager,
    );
    let storage_target = StubComponent::new(
        ComponentKind::StorageManager,
        InstructionSetKind::StorageManager,
    );
    manager
        .register_securable(session_source.clone() as Arc<dyn Securable>)
        .unwrap();
    manager
        .register_securable(storage_target.clone() as Arc<dyn Securable>)
        .unwrap();

    Setup {
        store,
        dispatcher,
        manager,
        session_source,
        storage_target,
    }
}

/// A user record whose password was hashed under `hashing`.
pub fn user_with_password(
    id: u64,
    username: &str,
    raw_password: &str,
    hashing: &PasswordHashingConfig,
) -> UserRecord {
    let salt = vigil_crypto::random_salt(hashing.user_salt_size);
    let blob = build_password_blob(hashing.user_algorithm, &salt, raw_password);
    UserRecord::new(UserId::new(id), username, blob)
        .with_rule(InstructionSetKind::StorageManager)
}
