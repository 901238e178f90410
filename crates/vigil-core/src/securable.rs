//! Contract for securable components and the one-shot token vault.
//!
//! Every securable target accepts authorization tokens ahead of the
//! instructions they authorize, and redeems each token exactly once when
//! the paired instruction arrives. The vault centralizes the bookkeeping
//! so targets only decide *when* to verify, never *how*.

use crate::access::{ComponentKind, InstructionSetKind};
use crate::error::{Result, SecurityError};
use crate::identifiers::TokenId;
use crate::tokens::AuthorizationToken;
use parking_lot::Mutex;
use std::collections::HashMap;

/// A backend component that accepts token-gated instructions.
pub trait Securable: Send + Sync {
    /// The component kind, used for registration and routing.
    fn component_kind(&self) -> ComponentKind;

    /// Delivers a one-shot authorization token ahead of its instruction.
    ///
    /// Called by the security manager before the requester's future
    /// resolves; the insert must be complete before the token is visible
    /// to any instruction handler.
    fn post_authorization_token(&self, token: AuthorizationToken) -> Result<()>;
}

/// Mutex-guarded map of expected one-shot tokens, keyed by token id.
///
/// The vault's mutex is a leaf lock: it is never held across calls into
/// other components.
#[derive(Debug)]
pub struct TokenVault {
    set: InstructionSetKind,
    tokens: Mutex<HashMap<TokenId, AuthorizationToken>>,
}

impl TokenVault {
    /// Creates a vault accepting tokens bound to `set`.
    pub fn new(set: InstructionSetKind) -> Self {
        Self {
            set,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Stores a freshly issued token.
    ///
    /// A token for the wrong set or a duplicate id is a wiring bug, not a
    /// client error.
    pub fn post(&self, token: AuthorizationToken) -> Result<()> {
        if token.authorized_set() != self.set {
            return Err(SecurityError::LogicError(format!(
                "token {} is bound to set [{}], vault expects [{}]",
                token.id(),
                token.authorized_set(),
                self.set
            )));
        }

        let mut tokens = self.tokens.lock();
        if tokens.contains_key(&token.id()) {
            return Err(SecurityError::LogicError(format!(
                "a token with id {} is already present",
                token.id()
            )));
        }

        tracing::debug!(token = %token.id(), set = %self.set, "authorization token stored");
        tokens.insert(token.id(), token);
        Ok(())
    }

    /// Redeems the instruction-carried token against the stored one.
    ///
    /// On success the stored token is removed; a second redemption of the
    /// same capability fails. The token is consumed by value either way,
    /// so it cannot be replayed by the caller.
    pub fn redeem(&self, token: AuthorizationToken) -> Result<()> {
        let mut tokens = self.tokens.lock();
        let Some(expected) = tokens.get(&token.id()) else {
            return Err(SecurityError::InvalidAuthorizationToken(format!(
                "token {} was not found",
                token.id()
            )));
        };

        if !expected.matches(&token) || token.authorized_set() != self.set {
            return Err(SecurityError::InvalidAuthorizationToken(format!(
                "token {} does not match the one expected by the target",
                token.id()
            )));
        }

        tokens.remove(&token.id());
        tracing::debug!(token = %token.id(), set = %self.set, "authorization token redeemed");
        Ok(())
    }

    /// Number of tokens currently awaiting redemption.
    pub fn pending(&self) -> usize {
        self.tokens.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::UserId;
    use assert_matches::assert_matches;

    fn make_token(id: u64, set: InstructionSetKind) -> AuthorizationToken {
        AuthorizationToken::new(TokenId::new(id), vec![7, 7, 7], set, UserId::new(1), None)
    }

    #[test]
    fn redeem_consumes_exactly_once() {
        let vault = TokenVault::new(InstructionSetKind::SessionManager);
        let token = make_token(1, InstructionSetKind::SessionManager);
        vault.post(token.clone()).unwrap();

        vault.redeem(token.clone()).unwrap();
        assert_matches!(
            vault.redeem(token),
            Err(SecurityError::InvalidAuthorizationToken(_))
        );
        assert_eq!(vault.pending(), 0);
    }

    #[test]
    fn mismatched_signature_is_rejected_and_kept() {
        let vault = TokenVault::new(InstructionSetKind::SessionManager);
        vault
            .post(make_token(1, InstructionSetKind::SessionManager))
            .unwrap();

        let forged = AuthorizationToken::new(
            TokenId::new(1),
            vec![0, 0, 0],
            InstructionSetKind::SessionManager,
            UserId::new(1),
            None,
        );
        assert_matches!(
            vault.redeem(forged),
            Err(SecurityError::InvalidAuthorizationToken(_))
        );
        assert_eq!(vault.pending(), 1);
    }

    #[test]
    fn wrong_set_and_duplicates_are_logic_errors() {
        let vault = TokenVault::new(InstructionSetKind::SessionManager);
        assert_matches!(
            vault.post(make_token(1, InstructionSetKind::UserManager)),
            Err(SecurityError::LogicError(_))
        );

        vault
            .post(make_token(2, InstructionSetKind::SessionManager))
            .unwrap();
        assert_matches!(
            vault.post(make_token(2, InstructionSetKind::SessionManager)),
            Err(SecurityError::LogicError(_))
        );
    }
}
