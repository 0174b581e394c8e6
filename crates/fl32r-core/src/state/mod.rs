//! Architectural CPU state: registers, flags and lifecycle state.

/// Condition and privilege flags.
pub mod flags;
/// Register file and register identifiers.
pub mod registers;
/// Host-observable lifecycle state machine.
pub mod run_state;

pub use flags::{Flags, FLAG_MASK, FLAG_NEGATIVE, FLAG_OVERFLOW, FLAG_ZERO};
pub use registers::{Register, RegisterFile, REGISTER_COUNT};
pub use run_state::RunState;
