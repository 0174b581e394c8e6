//! Debug console peripheral.
//!
//! | offset | access | meaning                                   |
//! |--------|--------|-------------------------------------------|
//! | 0x00   | W      | transmit character (byte, or word low byte) |
//! | 0x04   | W      | transmit word as `0x%08X\n`               |
//! | 0x08   | R      | status, always 1 (ready)                  |

use std::io::Write;

use crate::mmio::MmioDevice;

/// Window size claimed by the console.
pub const CONSOLE_SIZE: u32 = 16;

const REG_TX_CHAR: u32 = 0x00;
const REG_TX_WORD: u32 = 0x04;
const REG_STATUS: u32 = 0x08;

/// Write-only text output device.
pub struct DebugConsole<W> {
    base: u32,
    sink: W,
}

impl<W: Write + Send> DebugConsole<W> {
    /// Console at physical `base` writing to `sink`.
    pub const fn new(base: u32, sink: W) -> Self {
        Self { base, sink }
    }

    fn emit(&mut self, bytes: &[u8]) {
        if let Err(err) = self.sink.write_all(bytes).and_then(|()| self.sink.flush()) {
            log::warn!("debug console at {:#010x}: write failed: {err}", self.base);
        }
    }
}

impl DebugConsole<std::io::Stdout> {
    /// Console at physical `base` writing to standard output.
    #[must_use]
    pub fn stdout(base: u32) -> Self {
        Self::new(base, std::io::stdout())
    }
}

impl<W> std::fmt::Debug for DebugConsole<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugConsole")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl<W: Write + Send> MmioDevice for DebugConsole<W> {
    fn base(&self) -> u32 {
        self.base
    }

    fn size(&self) -> u32 {
        CONSOLE_SIZE
    }

    fn read_word(&mut self, offset: u32) -> u32 {
        u32::from(offset == REG_STATUS)
    }

    fn write_word(&mut self, offset: u32, value: u32) {
        if offset == REG_TX_WORD {
            self.emit(format!("0x{value:08X}\n").as_bytes());
        } else {
            self.write_byte(offset, value.to_be_bytes()[3]);
        }
    }

    fn read_byte(&mut self, offset: u32) -> u8 {
        u8::from(offset == REG_STATUS)
    }

    fn write_byte(&mut self, offset: u32, value: u8) {
        if offset == REG_TX_CHAR {
            self.emit(&[value]);
        }
    }
}
