//! Fault and trap taxonomy for CPU-visible faults and vectoring errors.

use thiserror::Error;

/// CPU-visible fault raised while fetching, decoding or executing.
///
/// Faults never escape into host code: the trap controller vectors every one
/// of them through the vector table. The discriminant is the vector slot the
/// fault is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Fault {
    /// Virtual address outside the VMEM window, or physical address outside RAM/ROM.
    #[error("memory access outside the translation window or backing store")]
    Memory = 0x03,
    /// Privileged register or instruction used without the privilege flag.
    #[error("privileged register or instruction used without privilege")]
    Privilege = 0x04,
    /// Unknown opcode or invalid software interrupt index.
    #[error("illegal instruction")]
    IllegalInstruction = 0x05,
    /// `DIV`/`UDIV`/`MOD`/`UMOD` with a zero divisor.
    #[error("division by zero")]
    DivideByZero = 0x06,
    /// `PUSH`/`CALL`/`CLR` would move the stack pointer below address zero.
    #[error("stack overflow")]
    StackOverflow = 0x07,
    /// `POP`/`RET` would move the stack pointer past the top of the address space.
    #[error("stack underflow")]
    StackUnderflow = 0x08,
    /// Checked arithmetic overflow.
    #[error("arithmetic overflow")]
    ArithmeticOverflow = 0x09,
    /// Software breakpoint trap.
    #[error("breakpoint")]
    Breakpoint = 0x0A,
}

impl Fault {
    /// All faults in vector-slot order.
    pub const ALL: [Self; 8] = [
        Self::Memory,
        Self::Privilege,
        Self::IllegalInstruction,
        Self::DivideByZero,
        Self::StackOverflow,
        Self::StackUnderflow,
        Self::ArithmeticOverflow,
        Self::Breakpoint,
    ];

    /// Vector table slot this fault is dispatched through.
    #[must_use]
    pub const fn vector_slot(self) -> u32 {
        self as u32
    }

    /// Maps a vector slot back to the fault that owns it.
    #[must_use]
    pub const fn from_vector_slot(slot: u32) -> Option<Self> {
        match slot {
            0x03 => Some(Self::Memory),
            0x04 => Some(Self::Privilege),
            0x05 => Some(Self::IllegalInstruction),
            0x06 => Some(Self::DivideByZero),
            0x07 => Some(Self::StackOverflow),
            0x08 => Some(Self::StackUnderflow),
            0x09 => Some(Self::ArithmeticOverflow),
            0x0A => Some(Self::Breakpoint),
            _ => None,
        }
    }
}

/// What caused a trap entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TrapCause {
    /// A fault detected during fetch, decode or execute.
    Fault(Fault),
    /// `INT` with the given software vector index.
    Software(u32),
    /// A device or host raised the given hardware interrupt index.
    Hardware(u32),
}

impl TrapCause {
    /// Returns `true` for software and hardware interrupts.
    #[must_use]
    pub const fn is_interrupt(self) -> bool {
        matches!(self, Self::Software(_) | Self::Hardware(_))
    }
}

/// Unrecoverable vector table defect hit during trap entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TrapError {
    /// The slot and its panic/unhandled fallback both hold zero.
    #[error("vector slot {slot} is undefined and its fallback is undefined too")]
    UndefinedVector {
        /// Slot that was read last.
        slot: u32,
    },
    /// The vector table itself could not be read.
    #[error("vector slot {slot} could not be read: {fault}")]
    VectorUnreadable {
        /// Slot whose read faulted.
        slot: u32,
        /// Fault raised by the read.
        fault: Fault,
    },
}
