//! Per-set handler tables.
//!
//! When a target registers, the dispatcher creates an [`InstructionSet`]
//! for the target's family and hands it over for binding; every variant
//! the target serves gets a handler. Variants left unbound answer
//! `LogicError` when an instruction reaches them.

use crate::instruction::{Envelope, ErasedEnvelope, InstructionFamily};
use indexmap::IndexMap;
use std::any::Any;
use vigil_core::{AccessLevel, InstructionSetKind, SecurityError};

type Handler<F> = Box<dyn Fn(Envelope<F>) + Send + Sync>;

/// A target that consumes instructions of one family.
pub trait InstructionTarget<F: InstructionFamily> {
    /// Binds handlers into the set created by the dispatcher.
    ///
    /// Returning `false` aborts the registration.
    fn register_instruction_set(&self, set: &mut InstructionSet<F>) -> bool;
}

/// Handler table for one instruction family.
pub struct InstructionSet<F: InstructionFamily> {
    handlers: IndexMap<F::Kind, Handler<F>>,
    minimum_access_level: AccessLevel,
}

impl<F: InstructionFamily> Default for InstructionSet<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: InstructionFamily> InstructionSet<F> {
    /// Creates an empty table; every variant starts unbound.
    pub fn new() -> Self {
        Self {
            handlers: IndexMap::new(),
            minimum_access_level: AccessLevel::Admin,
        }
    }

    /// Binds a handler for one instruction variant, replacing any
    /// previous binding.
    pub fn bind_handler(
        &mut self,
        kind: F::Kind,
        handler: impl Fn(Envelope<F>) + Send + Sync + 'static,
    ) {
        self.handlers.insert(kind, Box::new(handler));
    }

    /// Sets the access level required for this set; Admin unless the
    /// target lowers it.
    pub fn set_minimum_access_level(&mut self, level: AccessLevel) {
        self.minimum_access_level = level;
    }

    /// Access level required for this set.
    pub fn minimum_access_level(&self) -> AccessLevel {
        self.minimum_access_level
    }

    /// Number of bound variants.
    pub fn bound_handlers(&self) -> usize {
        self.handlers.len()
    }

    fn dispatch(&self, envelope: Envelope<F>) {
        let kind = envelope.instruction().kind();
        match self.handlers.get(&kind) {
            Some(handler) => handler(envelope),
            None => {
                tracing::error!(set = %F::SET, ?kind, "instruction variant has no bound handler");
                envelope.resolve(Err(SecurityError::LogicError(format!(
                    "no handler bound for {kind:?} in set [{}]",
                    F::SET
                ))));
            }
        }
    }
}

/// Type-erased set as stored by the dispatcher.
pub(crate) trait ErasedSet: Send + Sync {
    fn set_kind(&self) -> InstructionSetKind;
    fn minimum_access_level(&self) -> AccessLevel;
    fn process(&self, envelope: Box<dyn Any + Send>);
}

impl<F: InstructionFamily> ErasedSet for InstructionSet<F> {
    fn set_kind(&self) -> InstructionSetKind {
        F::SET
    }

    fn minimum_access_level(&self) -> AccessLevel {
        self.minimum_access_level
    }

    fn process(&self, envelope: Box<dyn Any + Send>) {
        match envelope.downcast::<Envelope<F>>() {
            Ok(envelope) => self.dispatch(*envelope),
            Err(_) => {
                // Two families mapped to one set kind; the envelope's
                // responder is unreachable, so the future resolves to the
                // dropped-request error on its own.
                tracing::error!(set = %F::SET, "envelope type does not match the registered set");
            }
        }
    }
}

/// Adapter from the erased-envelope route into the erased set.
pub(crate) fn route(set: &dyn ErasedSet, envelope: Box<dyn ErasedEnvelope>) {
    set.process(envelope.into_any());
}
