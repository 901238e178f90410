//! Instruction families, envelopes and result futures.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use vigil_core::{AuthorizationToken, InstructionSetKind, Result, SecurityError};

/// A family of related instructions forming one set.
///
/// Implementors are tagged sum types: one enum per set, one variant per
/// instruction. `Kind` is the variant discriminant used to key handler
/// tables; `Output` is the family-wide result type.
pub trait InstructionFamily: Send + fmt::Debug + 'static {
    /// Discriminant enum identifying each instruction variant.
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Result payload delivered through the instruction's future.
    type Output: Send + 'static;

    /// The set this family belongs to.
    const SET: InstructionSetKind;

    /// Discriminant of this instruction.
    fn kind(&self) -> Self::Kind;

    /// Self-check run by the dispatcher before routing.
    fn is_valid(&self) -> bool {
        true
    }
}

/// Write-half of an instruction's result future.
#[derive(Debug)]
pub struct Responder<T> {
    sender: oneshot::Sender<Result<T>>,
}

impl<T> Responder<T> {
    /// Resolves the paired [`PendingResult`].
    ///
    /// The requester may have given up and dropped its future; that is
    /// not an error for the responder.
    pub fn send(self, result: Result<T>) {
        let _ = self.sender.send(result);
    }
}

/// Future for an instruction's (or security request's) result.
///
/// Dropping the future cancels nothing that is already running; the
/// worker finishes its current item and the result is discarded.
#[derive(Debug)]
pub struct PendingResult<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> PendingResult<T> {
    /// Creates a connected responder/future pair.
    pub fn channel() -> (Responder<T>, Self) {
        let (sender, receiver) = oneshot::channel();
        (Responder { sender }, Self { receiver })
    }
}

impl<T> Future for PendingResult<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(context) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(SecurityError::LogicError(
                "request was dropped without a response".into(),
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// An instruction in flight: payload, one-shot token and responder.
pub struct Envelope<F: InstructionFamily> {
    instruction: F,
    token: Option<AuthorizationToken>,
    responder: Responder<F::Output>,
}

impl<F: InstructionFamily> fmt::Debug for Envelope<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("instruction", &self.instruction)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl<F: InstructionFamily> Envelope<F> {
    /// Wraps an instruction; returns the envelope and the result future
    /// kept by the requester.
    pub fn new(
        instruction: F,
        token: Option<AuthorizationToken>,
    ) -> (Self, PendingResult<F::Output>) {
        let (responder, pending) = PendingResult::channel();
        (
            Self {
                instruction,
                token,
                responder,
            },
            pending,
        )
    }

    /// The wrapped instruction.
    pub fn instruction(&self) -> &F {
        &self.instruction
    }

    /// Resolves the instruction with a final result.
    pub fn resolve(self, result: Result<F::Output>) {
        self.responder.send(result);
    }

    /// Splits the envelope for handler consumption.
    ///
    /// The token moves out by value; redeeming it consumes it.
    pub fn into_parts(self) -> (F, Option<AuthorizationToken>, Responder<F::Output>) {
        (self.instruction, self.token, self.responder)
    }
}

/// Type-erased envelope as the dispatcher sees it.
///
/// One downcast happens at the set boundary, recovering the typed
/// envelope; individual instructions are matched, never downcast.
pub trait ErasedEnvelope: Send {
    /// Set the wrapped instruction belongs to.
    fn set_kind(&self) -> InstructionSetKind;

    /// Runs the instruction's self-check.
    fn is_valid(&self) -> bool;

    /// Fails the instruction before it reaches a target.
    fn reject(self: Box<Self>, error: SecurityError);

    /// Erases to `Any` for the set-boundary downcast.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<F: InstructionFamily> ErasedEnvelope for Envelope<F> {
    fn set_kind(&self) -> InstructionSetKind {
        F::SET
    }

    fn is_valid(&self) -> bool {
        self.instruction.is_valid()
    }

    fn reject(self: Box<Self>, error: SecurityError) {
        self.responder.send(Err(error));
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[derive(Debug)]
    struct Noop;

    impl InstructionFamily for Noop {
        type Kind = ();
        type Output = u32;
        const SET: InstructionSetKind = InstructionSetKind::StorageManager;

        fn kind(&self) {}
    }

    #[tokio::test]
    async fn resolving_an_envelope_completes_the_future() {
        let (envelope, pending) = Envelope::new(Noop, None);
        envelope.resolve(Ok(7));
        assert_eq!(pending.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn dropping_the_envelope_surfaces_a_logic_error() {
        let (envelope, pending) = Envelope::new(Noop, None);
        drop(envelope);
        assert_matches!(pending.await, Err(SecurityError::LogicError(_)));
    }
}
