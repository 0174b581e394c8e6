//! Hardware timer peripheral.
//!
//! A free-running microsecond counter with a compare register. When enabled
//! and the counter reaches compare, [`tick`](MmioDevice::tick) raises
//! hardware interrupt [`TIMER_IRQ`]; in periodic mode compare advances by the
//! programmed period.

#![allow(clippy::cast_possible_truncation)]

use std::time::Instant;

use crate::mmio::{InterruptLine, MmioDevice};

/// Window size claimed by the timer.
pub const TIMER_SIZE: u32 = 16;
/// Hardware interrupt index raised on compare.
pub const TIMER_IRQ: u32 = 0;

/// Counter bits 31..0.
pub const REG_COUNT_LO: u32 = 0x00;
/// Counter bits 63..32.
pub const REG_COUNT_HI: u32 = 0x04;
/// Compare value and periodic reload.
pub const REG_COMPARE: u32 = 0x08;
/// Control register.
pub const REG_CTRL: u32 = 0x0C;

/// Timer running.
pub const CTRL_ENABLE: u32 = 1 << 0;
/// Raise an interrupt on compare.
pub const CTRL_IRQ_ENABLE: u32 = 1 << 1;
/// Reload compare after each match.
pub const CTRL_PERIODIC: u32 = 1 << 2;
/// Write 1 to acknowledge a pending match.
pub const CTRL_IRQ_ACK: u32 = 1 << 3;
/// Write 1 to restart the counter and disarm compare.
pub const CTRL_RESET: u32 = 1 << 4;

/// Microsecond timer raising a hardware interrupt on compare.
#[derive(Debug)]
pub struct HardwareTimer {
    base: u32,
    irq: InterruptLine,
    epoch: Instant,
    compare: u64,
    period: u64,
    ctrl: u32,
    irq_pending: bool,
}

impl HardwareTimer {
    /// Timer at physical `base` raising interrupts on `irq`.
    #[must_use]
    pub fn new(base: u32, irq: InterruptLine) -> Self {
        Self {
            base,
            irq,
            epoch: Instant::now(),
            compare: u64::MAX,
            period: 0,
            ctrl: 0,
            irq_pending: false,
        }
    }

    fn counter(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    fn reset_counter(&mut self) {
        self.epoch = Instant::now();
        self.compare = u64::MAX;
        self.irq_pending = false;
    }
}

impl MmioDevice for HardwareTimer {
    fn base(&self) -> u32 {
        self.base
    }

    fn size(&self) -> u32 {
        TIMER_SIZE
    }

    fn read_word(&mut self, offset: u32) -> u32 {
        match offset {
            REG_COUNT_LO => self.counter() as u32,
            REG_COUNT_HI => (self.counter() >> 32) as u32,
            REG_COMPARE => self.compare as u32,
            REG_CTRL => self.ctrl,
            _ => 0,
        }
    }

    fn write_word(&mut self, offset: u32, value: u32) {
        match offset {
            REG_COMPARE => {
                self.compare = u64::from(value);
                self.period = u64::from(value);
            }
            REG_CTRL => {
                if value & CTRL_RESET != 0 {
                    self.reset_counter();
                }
                if value & CTRL_IRQ_ACK != 0 {
                    self.irq_pending = false;
                }
                self.ctrl = value & !(CTRL_RESET | CTRL_IRQ_ACK);
            }
            _ => {}
        }
    }

    fn tick(&mut self) {
        if self.ctrl & CTRL_ENABLE == 0 || self.irq_pending {
            return;
        }
        if self.counter() < self.compare {
            return;
        }
        self.irq_pending = true;
        if self.ctrl & CTRL_IRQ_ENABLE != 0 {
            log::trace!("timer at {:#010x} raising irq {TIMER_IRQ}", self.base);
            self.irq.raise(TIMER_IRQ);
        }
        if self.ctrl & CTRL_PERIODIC != 0 {
            self.compare = self.compare.saturating_add(self.period);
            self.irq_pending = false;
        }
    }
}
