//! Public host-facing configuration, error and step-outcome types.

use thiserror::Error;

use crate::encoding::Opcode;
use crate::fault::{TrapCause, TrapError};
use crate::memory::map::{DEFAULT_MMIO_SIZE, DEFAULT_ROM_SIZE};
use crate::memory::MemoryLayout;
use crate::trap::{VectorTable, SOFTWARE_VECTOR_BASE};

/// Default main memory size (16 MiB).
pub const DEFAULT_MEMORY_SIZE: u64 = 16 * 1024 * 1024;

/// Default clock frequency (32 MHz).
pub const DEFAULT_FREQUENCY_HZ: i64 = 32_000_000;

/// Default physical address of the vector table.
pub const DEFAULT_VECTOR_TABLE_BASE: u32 = 0x0000_0100;

/// Default number of software interrupt vectors.
pub const DEFAULT_SOFTWARE_VECTORS: u32 = 32;

/// Default number of hardware interrupt vectors.
pub const DEFAULT_HARDWARE_VECTORS: u32 = 16;

/// Construction-time configuration for a CPU instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CpuConfig {
    /// Size of main memory in bytes.
    ///
    /// Must fit below the ROM window and must hold the whole vector table, so
    /// sizes below `vector_table_base + 4 * vector_slots()` (including 0) are
    /// rejected by [`validate`](Self::validate).
    pub memory_size: u64,
    /// Clock frequency used for throttling; `<= 0` runs unthrottled.
    pub frequency_hz: i64,
    /// Size of the ROM window directly below MMIO.
    pub rom_size: u32,
    /// Size of the MMIO window at the top of the address range.
    pub mmio_size: u32,
    /// Physical address of vector slot 0.
    pub vector_table_base: u32,
    /// Number of software interrupt vectors.
    pub software_vectors: u32,
    /// Number of hardware interrupt vectors.
    pub hardware_vectors: u32,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            rom_size: DEFAULT_ROM_SIZE,
            mmio_size: DEFAULT_MMIO_SIZE,
            vector_table_base: DEFAULT_VECTOR_TABLE_BASE,
            software_vectors: DEFAULT_SOFTWARE_VECTORS,
            hardware_vectors: DEFAULT_HARDWARE_VECTORS,
        }
    }
}

impl CpuConfig {
    /// Checks the configuration and derives the physical memory layout.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<MemoryLayout, ConfigError> {
        let layout = MemoryLayout::new(self.rom_size, self.mmio_size)?;
        if self.memory_size > layout.ram_window() {
            return Err(ConfigError::MemoryTooLarge {
                size: self.memory_size,
                limit: layout.ram_window(),
            });
        }
        if self.software_vectors == 0 || self.hardware_vectors == 0 {
            return Err(ConfigError::NoVectors);
        }
        let end = self.vector_table().end();
        if end > self.memory_size {
            return Err(ConfigError::VectorTableOutOfRange {
                base: self.vector_table_base,
                end,
                memory_size: self.memory_size,
            });
        }
        Ok(layout)
    }

    /// Vector table described by this configuration.
    #[must_use]
    pub const fn vector_table(&self) -> VectorTable {
        VectorTable::new(
            self.vector_table_base,
            self.software_vectors,
            self.hardware_vectors,
        )
    }

    /// Total number of vector slots (core, fault, software and hardware).
    #[must_use]
    pub const fn vector_slots(&self) -> u64 {
        SOFTWARE_VECTOR_BASE as u64 + self.software_vectors as u64 + self.hardware_vectors as u64
    }
}

/// Invalid construction-time configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// ROM and MMIO windows leave no room for RAM.
    #[error("rom window {rom_size:#x} and mmio window {mmio_size:#x} leave no room for ram")]
    WindowsTooLarge {
        /// Requested ROM window size.
        rom_size: u32,
        /// Requested MMIO window size.
        mmio_size: u32,
    },
    /// Main memory extends into the ROM window.
    #[error("memory size {size:#x} exceeds the ram window of {limit:#x} bytes")]
    MemoryTooLarge {
        /// Requested memory size.
        size: u64,
        /// Largest size that fits below ROM.
        limit: u64,
    },
    /// Software or hardware vector count is zero.
    #[error("software and hardware vector counts must be nonzero")]
    NoVectors,
    /// Vector table does not fit inside main memory.
    #[error("vector table at {base:#010x} ends at {end:#x}, past memory size {memory_size:#x}")]
    VectorTableOutOfRange {
        /// Configured table base.
        base: u32,
        /// One past the last table byte.
        end: u64,
        /// Configured memory size.
        memory_size: u64,
    },
}

/// Lifecycle or usage error reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    /// Configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// `load_program` was already called.
    #[error("a program image is already loaded")]
    ProgramAlreadyLoaded,
    /// Image does not fit in the target store.
    #[error("program image of {size} bytes exceeds capacity of {capacity} bytes")]
    ProgramTooLarge {
        /// Image length.
        size: u64,
        /// Store length.
        capacity: u64,
    },
    /// `start` was already called, or setup was attempted after start.
    #[error("cpu already started")]
    AlreadyStarted,
    /// `start` without a loaded program.
    #[error("no program image loaded")]
    NotLoaded,
    /// Operation requires a started, not killed CPU.
    #[error("cpu is not available")]
    NotAvailable,
    /// Operation is not allowed on a killed CPU.
    #[error("cpu has been killed")]
    Killed,
    /// Single-step mode is already active.
    #[error("single-step mode already active")]
    SingleStepAlreadyActive,
    /// Single-step mode is not active.
    #[error("single-step mode not active")]
    SingleStepInactive,
    /// The run loop stopped on an unrecoverable vector table defect.
    #[error("execution aborted: {0}")]
    Aborted(#[from] TrapError),
}

/// Result of one fetch-decode-execute step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// Instruction retired normally.
    Retired {
        /// Retired opcode.
        opcode: Opcode,
        /// Cycle cost charged.
        cycles: u32,
    },
    /// A fault or interrupt was vectored to its handler.
    Trapped {
        /// What caused the trap.
        cause: TrapCause,
        /// Cycle cost charged, including trap entry.
        cycles: u32,
    },
    /// `HLT` retired; the CPU waits for an interrupt or `resume`.
    Halted {
        /// Cycle cost charged.
        cycles: u32,
    },
    /// `KILL` retired; the run loop terminates.
    Killed {
        /// Cycle cost charged.
        cycles: u32,
    },
    /// A breakpoint matched; nothing was executed.
    Breakpoint {
        /// Program counter of the unexecuted instruction.
        pc: u32,
    },
    /// Trap entry hit an unrecoverable vector table defect.
    Aborted(TrapError),
}

impl StepOutcome {
    /// Cycle cost charged for this step.
    #[must_use]
    pub const fn cycles(self) -> u32 {
        match self {
            Self::Retired { cycles, .. }
            | Self::Trapped { cycles, .. }
            | Self::Halted { cycles }
            | Self::Killed { cycles } => cycles,
            Self::Breakpoint { .. } | Self::Aborted(_) => 0,
        }
    }
}
