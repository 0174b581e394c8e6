//! CPU core emulator for the FL32R 32-bit big-endian RISC instruction set.

/// Fault taxonomy and trap causes.
pub mod fault;
pub use fault::{Fault, TrapCause, TrapError};

/// Raw byte stores and the physical memory map.
pub mod memory;
pub use memory::{
    AddressSpace, AddressSpaceError, MemoryLayout, MemoryRegion, ADDRESS_SPACE_SIZE,
};

/// Architectural CPU state model primitives.
pub mod state;
pub use state::{
    Flags, Register, RegisterFile, RunState, FLAG_MASK, FLAG_NEGATIVE, FLAG_OVERFLOW, FLAG_ZERO,
    REGISTER_COUNT,
};

/// Opcode table, operand shapes and instruction encoders.
pub mod encoding;
pub use encoding::{
    encode_i, encode_j, encode_m, encode_no, encode_r, encode_u, sign_extend, InstructionFormat,
    Opcode, OPCODE_TABLE,
};

/// Instruction decode with lazy field extraction.
pub mod decoder;
pub use decoder::{DecodedInstruction, Decoder, Operands};

/// Instruction disassembly.
pub mod disasm;
pub use disasm::{disassemble, disassemble_window, DisassemblyRow};

/// Host-facing configuration, errors and step outcomes.
pub mod api;
pub use api::{
    ConfigError, CpuConfig, CpuError, StepOutcome, DEFAULT_FREQUENCY_HZ, DEFAULT_HARDWARE_VECTORS,
    DEFAULT_MEMORY_SIZE, DEFAULT_SOFTWARE_VECTORS, DEFAULT_VECTOR_TABLE_BASE,
};

/// Deterministic instruction cycle-cost table and throttling.
pub mod timing;
pub use timing::{cycle_cost, opcode_cycles, CycleCostKind, Throttle, CYCLE_COST_TABLE};

/// MMIO device contract, bus and interrupt line.
pub mod mmio;
pub use mmio::{InterruptLine, MmioBus, MmioDevice};

/// Breakpoint sets.
pub mod debug;
pub use debug::Breakpoints;

/// The owned machine aggregate and its step function.
pub mod machine;
pub use machine::Machine;

/// Virtual-to-physical translation and memory access.
pub mod mmu;

/// Vector table layout and trap entry.
pub mod trap;
pub use trap::VectorTable;

/// Instruction execution pipeline.
pub mod execute;
pub use execute::{ExecuteOutcome, FlagsUpdate};

/// Lifecycle and debug controller with a blocking run loop.
pub mod cpu;
pub use cpu::{Cpu, MemoryView};

/// Reference MMIO peripherals.
pub mod peripherals;
pub use peripherals::{DebugConsole, HardwareTimer};

#[cfg(test)]
use proptest as _;
