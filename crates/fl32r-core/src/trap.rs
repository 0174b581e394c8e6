//! Vector table geometry and the common trap entry sequence.

use crate::fault::{TrapCause, TrapError};
use crate::machine::Machine;
use crate::state::Register;

/// Slot read by the boot probe; never dispatched to by the core.
pub const PROBE_VECTOR: u32 = 0;
/// Slot for faults raised while already privileged, and undefined fault vectors.
pub const PANIC_VECTOR: u32 = 1;
/// Slot for invalid or undefined interrupt vectors.
pub const UNHANDLED_INTERRUPT_VECTOR: u32 = 2;
/// First software interrupt slot.
pub const SOFTWARE_VECTOR_BASE: u32 = 11;
/// Bytes per vector slot.
pub const VECTOR_SLOT_BYTES: u32 = 4;

/// Placement and sizing of the vector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct VectorTable {
    base: u32,
    software: u32,
    hardware: u32,
}

impl VectorTable {
    /// Table at physical `base` with the given interrupt block sizes.
    #[must_use]
    pub const fn new(base: u32, software: u32, hardware: u32) -> Self {
        Self {
            base,
            software,
            hardware,
        }
    }

    /// Physical address of slot 0.
    #[must_use]
    pub const fn base(self) -> u32 {
        self.base
    }

    /// Number of software interrupt vectors.
    #[must_use]
    pub const fn software_vectors(self) -> u32 {
        self.software
    }

    /// Number of hardware interrupt vectors.
    #[must_use]
    pub const fn hardware_vectors(self) -> u32 {
        self.hardware
    }

    /// Physical address of `slot`.
    #[must_use]
    pub const fn slot_address(self, slot: u32) -> u32 {
        self.base
            .wrapping_add(slot.wrapping_mul(VECTOR_SLOT_BYTES))
    }

    /// Slot for software interrupt `index`, if in range.
    #[must_use]
    pub const fn software_slot(self, index: u32) -> Option<u32> {
        if index < self.software {
            Some(SOFTWARE_VECTOR_BASE + index)
        } else {
            None
        }
    }

    /// Slot for hardware interrupt `index`, if in range.
    #[must_use]
    pub const fn hardware_slot(self, index: u32) -> Option<u32> {
        if index < self.hardware {
            Some(SOFTWARE_VECTOR_BASE + self.software + index)
        } else {
            None
        }
    }

    /// One past the last table byte.
    #[must_use]
    pub const fn end(self) -> u64 {
        let slots = SOFTWARE_VECTOR_BASE as u64 + self.software as u64 + self.hardware as u64;
        self.base as u64 + slots * VECTOR_SLOT_BYTES as u64
    }
}

impl Machine {
    /// Enters the handler for `cause` and returns its address.
    ///
    /// Saves PC and packed flags, escalates privilege, masks interrupts and
    /// resets the VMEM window before reading the vector. A zero vector falls
    /// back to the panic slot (faults) or the unhandled-interrupt slot
    /// (interrupts); a fault raised while already privileged goes straight to
    /// panic.
    ///
    /// # Errors
    ///
    /// Returns [`TrapError`] when the vector and its fallback are both
    /// undefined or the table cannot be read. Trap state has already been
    /// saved at that point; the caller is expected to stop execution.
    pub fn enter_trap(&mut self, cause: TrapCause) -> Result<u32, TrapError> {
        let (slot, fallback) = match cause {
            TrapCause::Fault(_) if self.flags.privileged => (PANIC_VECTOR, PANIC_VECTOR),
            TrapCause::Fault(fault) => (fault.vector_slot(), PANIC_VECTOR),
            TrapCause::Software(index) => (
                self.vectors
                    .software_slot(index)
                    .unwrap_or(UNHANDLED_INTERRUPT_VECTOR),
                UNHANDLED_INTERRUPT_VECTOR,
            ),
            TrapCause::Hardware(index) => (
                self.vectors
                    .hardware_slot(index)
                    .unwrap_or(UNHANDLED_INTERRUPT_VECTOR),
                UNHANDLED_INTERRUPT_VECTOR,
            ),
        };

        self.saved_pc = self.registers.pc();
        self.saved_flags = self.flags.pack();
        self.flags.privileged = true;
        self.interrupts_masked = true;
        self.registers.set(Register::VMEM_OFFSET, 0);
        self.registers.set(Register::VMEM_BOUND, 0);

        let mut used = slot;
        let mut handler = self.read_vector(slot)?;
        if handler == 0 && fallback != slot {
            used = fallback;
            handler = self.read_vector(fallback)?;
        }
        if handler == 0 {
            log::error!("{cause:?}: vector slot {used} is undefined");
            return Err(TrapError::UndefinedVector { slot: used });
        }

        log::debug!(
            "trap {cause:?}: saved pc {:#010x}, vector slot {used} -> {handler:#010x}",
            self.saved_pc
        );
        self.registers.set_pc(handler);
        Ok(handler)
    }

    fn read_vector(&mut self, slot: u32) -> Result<u32, TrapError> {
        let address = self.vectors.slot_address(slot);
        self.read_physical_word(address).map_err(|fault| {
            log::error!("vector slot {slot} at {address:#010x} unreadable: {fault}");
            TrapError::VectorUnreadable { slot, fault }
        })
    }
}
