//! # Vigil Instructions
//!
//! Instruction families, per-set handler tables and the dispatcher that
//! routes instructions from registered sources to registered targets.
//!
//! Instructions are tagged sum types, one family per set. An instruction
//! travels inside an [`Envelope`] together with its one-shot
//! authorization token and a responder; the requester keeps the matching
//! [`PendingResult`] future. The dispatcher performs no authorization of
//! its own: obtaining the token is the caller's job, verifying it is the
//! target's.

#![forbid(unsafe_code)]

pub mod dispatcher;
pub mod instruction;
pub mod set;

pub use dispatcher::{InstructionDispatcher, InstructionRelay, InstructionSource};
pub use instruction::{
    Envelope, ErasedEnvelope, InstructionFamily, PendingResult, Responder,
};
pub use set::{InstructionSet, InstructionTarget};
