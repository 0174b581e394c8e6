//! Reference MMIO peripherals.

/// Character and word output to a host sink.
pub mod console;
/// Microsecond counter with a compare interrupt.
pub mod timer;

pub use console::{DebugConsole, CONSOLE_SIZE};
pub use timer::{HardwareTimer, TIMER_IRQ, TIMER_SIZE};
