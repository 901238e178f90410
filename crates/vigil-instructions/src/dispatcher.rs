//! Routing of instructions from registered sources to registered targets.
//!
//! Registration happens once, during wiring, before any instruction is
//! processed; processing itself is thread-safe. At least one source and
//! one target must be registered for anything to flow.

use crate::instruction::{ErasedEnvelope, InstructionFamily};
use crate::set::{route, ErasedSet, InstructionSet, InstructionTarget};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use vigil_core::{AccessLevel, InstructionSetKind, Result, SecurityError, SourceId};

/// Callback installed into a source; invoked once per outgoing
/// instruction.
pub type InstructionRelay = Arc<dyn Fn(Box<dyn ErasedEnvelope>) + Send + Sync>;

/// A component that emits instructions.
pub trait InstructionSource {
    /// Set kinds the source intends to emit into.
    fn required_instruction_sets(&self) -> Vec<InstructionSetKind>;

    /// Installs the dispatcher's relay; returning `false` aborts the
    /// registration.
    fn attach_instruction_relay(&self, relay: InstructionRelay) -> bool;
}

#[derive(Default)]
struct DispatcherState {
    targets: HashMap<InstructionSetKind, Arc<dyn ErasedSet>>,
    sources: HashMap<SourceId, Vec<InstructionSetKind>>,
    last_source_id: u64,
}

/// Routes validated instructions between sources and targets.
pub struct InstructionDispatcher {
    expected_sets: Vec<InstructionSetKind>,
    state: RwLock<DispatcherState>,
}

impl InstructionDispatcher {
    /// Creates a dispatcher accepting the listed set kinds.
    pub fn new(expected_sets: Vec<InstructionSetKind>) -> Arc<Self> {
        Arc::new(Self {
            expected_sets,
            state: RwLock::new(DispatcherState::default()),
        })
    }

    /// Registers a target for family `F`.
    ///
    /// The dispatcher creates the family's [`InstructionSet`] and hands
    /// it to the target for handler binding. At most one target per set.
    pub fn register_target<F, T>(&self, target: &T) -> Result<()>
    where
        F: InstructionFamily,
        T: InstructionTarget<F>,
    {
        if !self.expected_sets.contains(&F::SET) {
            return Err(SecurityError::InvalidArgument(format!(
                "set [{}] is not expected by this dispatcher",
                F::SET
            )));
        }

        let mut state = self.state.write();
        if state.targets.contains_key(&F::SET) {
            return Err(SecurityError::InvalidArgument(format!(
                "a target for set [{}] is already registered",
                F::SET
            )));
        }

        let mut set = InstructionSet::<F>::new();
        if !target.register_instruction_set(&mut set) {
            return Err(SecurityError::InvalidArgument(format!(
                "target refused the instruction set for [{}]",
                F::SET
            )));
        }

        tracing::debug!(set = %F::SET, handlers = set.bound_handlers(), "instruction target registered");
        state.targets.insert(F::SET, Arc::new(set));
        Ok(())
    }

    /// Registers a source and installs the relay it will emit through.
    pub fn register_source(
        self: &Arc<Self>,
        source: &dyn InstructionSource,
    ) -> Result<SourceId> {
        let required = source.required_instruction_sets();
        if required.is_empty() {
            return Err(SecurityError::InvalidArgument(
                "source declared no instruction sets".into(),
            ));
        }
        for set in &required {
            if !self.expected_sets.contains(set) {
                return Err(SecurityError::InvalidArgument(format!(
                    "source requires unexpected set [{set}]"
                )));
            }
        }

        let source_id = {
            let mut state = self.state.write();
            state.last_source_id += 1;
            let source_id = SourceId::new(state.last_source_id);
            state.sources.insert(source_id, required);
            source_id
        };

        let dispatcher = Arc::clone(self);
        let relay: InstructionRelay = Arc::new(move |envelope| {
            dispatcher.process(source_id, envelope);
        });

        if !source.attach_instruction_relay(relay) {
            self.state.write().sources.remove(&source_id);
            return Err(SecurityError::InvalidArgument(
                "source refused the instruction relay".into(),
            ));
        }

        tracing::debug!(source = %source_id, "instruction source registered");
        Ok(source_id)
    }

    /// Routes one instruction from `source` to the target of its set.
    ///
    /// Authorization is not checked here; the caller obtained the token
    /// from the security core and the target verifies it.
    pub fn process(&self, source: SourceId, envelope: Box<dyn ErasedEnvelope>) {
        if !envelope.is_valid() {
            tracing::debug!(source = %source, "instruction failed its self-check");
            envelope.reject(SecurityError::InvalidArgument(
                "instruction failed validation".into(),
            ));
            return;
        }

        let set_kind = envelope.set_kind();
        let state = self.state.read();

        let Some(allowed) = state.sources.get(&source) else {
            tracing::error!(source = %source, "instruction from unknown source");
            envelope.reject(SecurityError::LogicError(format!(
                "source [{source}] is not registered"
            )));
            return;
        };

        if !allowed.contains(&set_kind) {
            tracing::error!(source = %source, set = %set_kind, "set not allowed for source");
            envelope.reject(SecurityError::LogicError(format!(
                "set [{set_kind}] is not allowed for source [{source}]"
            )));
            return;
        }

        let Some(target) = state.targets.get(&set_kind) else {
            envelope.reject(SecurityError::LogicError(format!(
                "no target registered for set [{set_kind}]"
            )));
            return;
        };

        let target = Arc::clone(target);
        drop(state);

        tracing::trace!(source = %source, set = %set_kind, "instruction dispatched");
        route(target.as_ref(), envelope);
    }

    /// Minimum access level required by a set, if the set is registered.
    ///
    /// Read-only once wiring is complete.
    pub fn minimum_access_level(&self, set: InstructionSetKind) -> Option<AccessLevel> {
        self.state
            .read()
            .targets
            .get(&set)
            .map(|target| target.minimum_access_level())
    }
}
