//! Requests posted to the security manager.
//!
//! Construction validates arguments up front: a malformed request never
//! reaches a worker. Each request records the kind of the component that
//! posted it, taken from the component itself so sources cannot claim a
//! kind they do not have.

use vigil_core::{
    ComponentKind, DeviceId, InstructionSetKind, Result, Securable, SecurityError, UserId,
};
use vigil_crypto::{CipherSuite, EllipticCurve};

/// User-credential authentication request.
///
/// Only the session manager may post authentication requests.
#[derive(Debug)]
pub struct UserAuthenticationRequest {
    username: String,
    raw_password: String,
    source: ComponentKind,
}

impl UserAuthenticationRequest {
    /// Validates and builds the request.
    pub fn new(
        username: impl Into<String>,
        raw_password: impl Into<String>,
        source: &dyn Securable,
    ) -> Result<Self> {
        let username = username.into();
        let raw_password = raw_password.into();
        if username.is_empty() {
            return Err(SecurityError::InvalidArgument("empty user name".into()));
        }
        if raw_password.is_empty() {
            return Err(SecurityError::InvalidArgument("empty password".into()));
        }
        let source = source.component_kind();
        if source != ComponentKind::SessionManager {
            return Err(SecurityError::InvalidArgument(format!(
                "authentication requests must come from the session manager, not [{source}]"
            )));
        }
        Ok(Self {
            username,
            raw_password,
            source,
        })
    }

    /// Name of the user to authenticate.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Supplied raw password.
    pub fn raw_password(&self) -> &str {
        &self.raw_password
    }

    /// Kind of the posting component.
    pub fn source(&self) -> ComponentKind {
        self.source
    }
}

/// Device-credential authentication request.
#[derive(Debug)]
pub struct DeviceAuthenticationRequest {
    device: DeviceId,
    raw_password: String,
    source: ComponentKind,
}

impl DeviceAuthenticationRequest {
    /// Validates and builds the request.
    pub fn new(
        device: DeviceId,
        raw_password: impl Into<String>,
        source: &dyn Securable,
    ) -> Result<Self> {
        let raw_password = raw_password.into();
        if raw_password.is_empty() {
            return Err(SecurityError::InvalidArgument("empty password".into()));
        }
        let source = source.component_kind();
        if source != ComponentKind::SessionManager {
            return Err(SecurityError::InvalidArgument(format!(
                "authentication requests must come from the session manager, not [{source}]"
            )));
        }
        Ok(Self {
            device,
            raw_password,
            source,
        })
    }

    /// Device to authenticate.
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Supplied raw password.
    pub fn raw_password(&self) -> &str {
        &self.raw_password
    }

    /// Kind of the posting component.
    pub fn source(&self) -> ComponentKind {
        self.source
    }
}

/// Per-instruction authorization request.
///
/// Carries the instruction's parent set; the instruction itself stays
/// with the caller and travels through the dispatcher once the token is
/// issued.
#[derive(Debug)]
pub struct AuthorizationRequest {
    user: UserId,
    device: Option<DeviceId>,
    source: ComponentKind,
    target: ComponentKind,
    set: InstructionSetKind,
}

impl AuthorizationRequest {
    /// Builds a user-scoped request.
    pub fn new(
        user: UserId,
        source: &dyn Securable,
        target: ComponentKind,
        set: InstructionSetKind,
    ) -> Self {
        Self {
            user,
            device: None,
            source: source.component_kind(),
            target,
            set,
        }
    }

    /// Builds a device-scoped request.
    pub fn for_device(
        user: UserId,
        device: DeviceId,
        source: &dyn Securable,
        target: ComponentKind,
        set: InstructionSetKind,
    ) -> Self {
        Self {
            user,
            device: Some(device),
            source: source.component_kind(),
            target,
            set,
        }
    }

    /// User requesting the instruction.
    pub fn user(&self) -> UserId {
        self.user
    }

    /// Device requesting the instruction, if any.
    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    /// Kind of the posting component.
    pub fn source(&self) -> ComponentKind {
        self.source
    }

    /// Kind of the component that will execute the instruction.
    pub fn target(&self) -> ComponentKind {
        self.target
    }

    /// Parent set of the instruction being authorized.
    pub fn set(&self) -> InstructionSetKind {
        self.set
    }
}

/// Request for passphrase-derived symmetric material.
#[derive(Debug)]
pub struct DerivedKeyRequest {
    passphrase: String,
    existing: Option<(Vec<u8>, Vec<u8>)>,
    suite: Option<CipherSuite>,
    iterations: Option<u32>,
    source: ComponentKind,
}

impl DerivedKeyRequest {
    /// Request for fresh material derived from `passphrase`.
    pub fn new(passphrase: impl Into<String>, source: &dyn Securable) -> Result<Self> {
        let passphrase = passphrase.into();
        if passphrase.is_empty() {
            return Err(SecurityError::InvalidArgument("empty passphrase".into()));
        }
        Ok(Self {
            passphrase,
            existing: None,
            suite: None,
            iterations: None,
            source: source.component_kind(),
        })
    }

    /// Re-derive with an existing salt and IV.
    pub fn with_existing(mut self, salt: Vec<u8>, iv: Vec<u8>) -> Self {
        self.existing = Some((salt, iv));
        self
    }

    /// Override the cipher suite.
    pub fn with_suite(mut self, suite: CipherSuite) -> Self {
        self.suite = Some(suite);
        self
    }

    /// Override the iteration count.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = Some(iterations);
        self
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        String,
        Option<(Vec<u8>, Vec<u8>)>,
        Option<CipherSuite>,
        Option<u32>,
        ComponentKind,
    ) {
        (
            self.passphrase,
            self.existing,
            self.suite,
            self.iterations,
            self.source,
        )
    }

    /// Kind of the posting component.
    pub fn source(&self) -> ComponentKind {
        self.source
    }
}

/// Request for fresh or re-wrapped symmetric material.
#[derive(Debug)]
pub struct SymmetricKeyRequest {
    suite: Option<CipherSuite>,
    existing: Option<(Vec<u8>, Vec<u8>)>,
    source: ComponentKind,
}

impl SymmetricKeyRequest {
    /// Request for brand-new material.
    pub fn new(source: &dyn Securable) -> Self {
        Self {
            suite: None,
            existing: None,
            source: source.component_kind(),
        }
    }

    /// Wrap an existing key and IV instead of generating.
    pub fn with_existing(mut self, key: Vec<u8>, iv: Vec<u8>) -> Self {
        self.existing = Some((key, iv));
        self
    }

    /// Override the cipher suite.
    pub fn with_suite(mut self, suite: CipherSuite) -> Self {
        self.suite = Some(suite);
        self
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Option<CipherSuite>,
        Option<(Vec<u8>, Vec<u8>)>,
        ComponentKind,
    ) {
        (self.suite, self.existing, self.source)
    }

    /// Kind of the posting component.
    pub fn source(&self) -> ComponentKind {
        self.source
    }
}

/// Request for key-exchange-derived symmetric material.
#[derive(Debug)]
pub struct KeyExchangeRequest {
    curve: Option<EllipticCurve>,
    private: Vec<u8>,
    peer_public: Vec<u8>,
    iv: Option<Vec<u8>>,
    suite: Option<CipherSuite>,
    source: ComponentKind,
}

impl KeyExchangeRequest {
    /// Validates and builds the request.
    pub fn new(private: Vec<u8>, peer_public: Vec<u8>, source: &dyn Securable) -> Result<Self> {
        if private.is_empty() || peer_public.is_empty() {
            return Err(SecurityError::InvalidArgument(
                "exchange keys must be non-empty".into(),
            ));
        }
        Ok(Self {
            curve: None,
            private,
            peer_public,
            iv: None,
            suite: None,
            source: source.component_kind(),
        })
    }

    /// Override the curve.
    pub fn with_curve(mut self, curve: EllipticCurve) -> Self {
        self.curve = Some(curve);
        self
    }

    /// Use an existing IV instead of stretching one from the secret.
    pub fn with_iv(mut self, iv: Vec<u8>) -> Self {
        self.iv = Some(iv);
        self
    }

    /// Override the cipher suite.
    pub fn with_suite(mut self, suite: CipherSuite) -> Self {
        self.suite = Some(suite);
        self
    }

    #[allow(clippy::type_complexity)]
    pub(crate) fn into_parts(
        self,
    ) -> (
        Option<EllipticCurve>,
        Vec<u8>,
        Vec<u8>,
        Option<Vec<u8>>,
        Option<CipherSuite>,
        ComponentKind,
    ) {
        (
            self.curve,
            self.private,
            self.peer_public,
            self.iv,
            self.suite,
            self.source,
        )
    }

    /// Kind of the posting component.
    pub fn source(&self) -> ComponentKind {
        self.source
    }
}
