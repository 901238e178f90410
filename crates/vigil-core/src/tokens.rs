//! Authentication and authorization tokens.
//!
//! Authentication tokens are long-lived (seconds to hours) and prove a
//! recent credential check; authorization tokens are one-shot
//! capabilities for a single instruction against a single target.
//! Both carry an opaque random signature produced by the security
//! manager; token ids come from its monotonic counters.

use crate::access::InstructionSetKind;
use crate::identifiers::{DeviceId, TokenId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Proof of a recent successful credential check.
///
/// Equality compares `(id, signature)` bit-exact; the remaining fields
/// are informational. A token is *valid* only while the security manager
/// still has it on file and it has not expired.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthenticationToken {
    id: TokenId,
    signature: Vec<u8>,
    expires_at: DateTime<Utc>,
    user: UserId,
    device: Option<DeviceId>,
}

impl AuthenticationToken {
    /// Creates a token; only the security manager should do this.
    pub fn new(
        id: TokenId,
        signature: Vec<u8>,
        expires_at: DateTime<Utc>,
        user: UserId,
        device: Option<DeviceId>,
    ) -> Self {
        Self {
            id,
            signature,
            expires_at,
            user,
            device,
        }
    }

    /// Token id.
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// Opaque random signature.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Expiration timestamp.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// User the token was issued to.
    pub fn user(&self) -> UserId {
        self.user
    }

    /// Device the token was issued to, absent for user-scoped tokens.
    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    /// Whether the token has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl PartialEq for AuthenticationToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.signature == other.signature
    }
}

impl Eq for AuthenticationToken {}

impl fmt::Debug for AuthenticationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationToken")
            .field("id", &self.id)
            .field("signature", &SignaturePreview(&self.signature))
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .field("device", &self.device)
            .finish()
    }
}

/// One-shot capability for a single instruction.
///
/// Issued by the security manager, delivered to the target ahead of the
/// instruction, redeemed exactly once by the target and then destroyed.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthorizationToken {
    id: TokenId,
    signature: Vec<u8>,
    set: InstructionSetKind,
    user: UserId,
    device: Option<DeviceId>,
}

impl AuthorizationToken {
    /// Creates a token; only the security manager should do this.
    pub fn new(
        id: TokenId,
        signature: Vec<u8>,
        set: InstructionSetKind,
        user: UserId,
        device: Option<DeviceId>,
    ) -> Self {
        Self {
            id,
            signature,
            set,
            user,
            device,
        }
    }

    /// Token id.
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// Opaque random signature.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Instruction set the token authorizes.
    pub fn authorized_set(&self) -> InstructionSetKind {
        self.set
    }

    /// User the token was issued for.
    pub fn user(&self) -> UserId {
        self.user
    }

    /// Device the token was issued for, if any.
    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    /// Whether `other` is the same capability.
    ///
    /// Signatures are compared in constant time; ids and bindings are not
    /// secret.
    pub fn matches(&self, other: &Self) -> bool {
        let signatures_equal: bool = self.signature.ct_eq(&other.signature).into();
        self.id == other.id
            && signatures_equal
            && self.set == other.set
            && self.user == other.user
            && self.device == other.device
    }
}

impl fmt::Debug for AuthorizationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationToken")
            .field("id", &self.id)
            .field("signature", &SignaturePreview(&self.signature))
            .field("set", &self.set)
            .field("user", &self.user)
            .field("device", &self.device)
            .finish()
    }
}

/// Shows only a short hex prefix of a signature in debug output.
struct SignaturePreview<'a>(&'a [u8]);

impl fmt::Debug for SignaturePreview<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = &self.0[..self.0.len().min(4)];
        write!(f, "{}..({}B)", hex::encode(head), self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(id: u64, signature: Vec<u8>) -> AuthenticationToken {
        AuthenticationToken::new(
            TokenId::new(id),
            signature,
            Utc::now() + chrono::Duration::seconds(30),
            UserId::new(1),
            None,
        )
    }

    #[test]
    fn equality_is_id_and_signature() {
        let a = token(1, vec![1, 2, 3]);
        let b = token(1, vec![1, 2, 3]);
        let c = token(1, vec![1, 2, 4]);
        let d = token(2, vec![1, 2, 3]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn authorization_match_requires_all_bindings() {
        let base = AuthorizationToken::new(
            TokenId::new(5),
            vec![9, 9],
            InstructionSetKind::SessionManager,
            UserId::new(1),
            None,
        );
        assert!(base.matches(&base.clone()));

        let other_set = AuthorizationToken::new(
            TokenId::new(5),
            vec![9, 9],
            InstructionSetKind::UserManager,
            UserId::new(1),
            None,
        );
        assert!(!base.matches(&other_set));
    }

    #[test]
    fn debug_output_redacts_signatures() {
        let printed = format!("{:?}", token(1, vec![0xaa; 16]));
        assert!(!printed.contains(&hex::encode([0xaa; 16])));
    }
}
