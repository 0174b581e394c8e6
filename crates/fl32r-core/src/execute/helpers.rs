//! Helper functions for instruction execution.

#![allow(clippy::cast_sign_loss)]

use crate::encoding::Opcode;
use crate::fault::Fault;
use crate::machine::Machine;
use crate::state::Flags;

/// Lowest SP that still leaves room for a push.
const STACK_FLOOR: u32 = 4;
/// Highest SP that can be popped from without wrapping.
const STACK_CEILING: u32 = 0xFFFF_FFFB;

/// Computes `base + offset` with 32-bit wraparound.
#[must_use]
pub const fn compute_effective_address(base: u32, offset: i32) -> u32 {
    base.wrapping_add(offset as u32)
}

/// Target of a relative branch from the post-fetch `pc`.
#[must_use]
pub const fn branch_target(pc: u32, displacement: i32) -> u32 {
    pc.wrapping_add(displacement as u32)
}

/// Evaluates the condition of a relative jump against `flags`.
///
/// Non-jump opcodes and `JMP`/`CALL` are unconditional.
#[must_use]
pub const fn condition_holds(opcode: Opcode, flags: Flags) -> bool {
    let Flags {
        zero: z,
        negative: n,
        overflow: o,
        ..
    } = flags;
    match opcode {
        Opcode::Jeq => z,
        Opcode::Jne => !z,
        Opcode::Jgt => !n && !z,
        Opcode::Jlt => n,
        Opcode::Jge => !n || z,
        Opcode::Jle => n || z,
        Opcode::Jof => o,
        Opcode::Jno => !o,
        _ => true,
    }
}

impl Machine {
    /// Pushes `value`: writes `[SP - 4]`, then lowers SP by 4.
    ///
    /// # Errors
    ///
    /// [`Fault::StackOverflow`] when SP would wrap below 0, or
    /// [`Fault::Memory`] when the slot is not writable. SP is unchanged on error.
    pub(crate) fn push(&mut self, value: u32) -> Result<(), Fault> {
        let sp = self.registers.sp();
        if sp < STACK_FLOOR {
            return Err(Fault::StackOverflow);
        }
        let slot = sp - 4;
        self.write_word(slot, value)?;
        self.registers.set_sp(slot);
        Ok(())
    }

    /// Pops a word: reads `[SP]`, then raises SP by 4.
    ///
    /// # Errors
    ///
    /// [`Fault::StackUnderflow`] when SP would wrap past 2^32, or
    /// [`Fault::Memory`] when the slot is not readable. SP is unchanged on error.
    pub(crate) fn pop(&mut self) -> Result<u32, Fault> {
        let sp = self.registers.sp();
        if sp > STACK_CEILING {
            return Err(Fault::StackUnderflow);
        }
        let value = self.read_word(sp)?;
        self.registers.set_sp(sp + 4);
        Ok(value)
    }
}
