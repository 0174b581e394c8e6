//! Shared builders for the integration suites.

#![allow(dead_code)]

use fl32r_core::{Cpu, CpuConfig, Machine, Register, StepOutcome, DEFAULT_VECTOR_TABLE_BASE};

/// Main memory used by every suite.
pub const MEMORY_SIZE: u64 = 0x1000;
/// Where handler code is placed by convention.
pub const HANDLER: u32 = 0x600;

pub fn r(index: u8) -> Register {
    Register::new(index).expect("valid register index")
}

pub fn config() -> CpuConfig {
    CpuConfig {
        memory_size: MEMORY_SIZE,
        frequency_hz: 0,
        ..CpuConfig::default()
    }
}

/// Flat boot image assembled from words placed at physical addresses.
#[derive(Debug, Clone, Default)]
pub struct Image {
    bytes: Vec<u8>,
}

impl Image {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn program(words: &[u32]) -> Self {
        Self::new().at(0, words)
    }

    pub fn at(mut self, address: u32, words: &[u32]) -> Self {
        let start = address as usize;
        let end = start + words.len() * 4;
        if self.bytes.len() < end {
            self.bytes.resize(end, 0);
        }
        for (chunk, word) in self.bytes[start..end].chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        self
    }

    pub fn vector(self, slot: u32, handler: u32) -> Self {
        self.at(DEFAULT_VECTOR_TABLE_BASE + slot * 4, &[handler])
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn machine(&self) -> Machine {
        let mut machine = Machine::new(&config()).expect("valid config");
        machine.load_image(self.bytes()).expect("image fits");
        machine
    }

    pub fn cpu(&self) -> Cpu {
        let cpu = Cpu::new(config()).expect("valid config");
        cpu.load_program(self.bytes()).expect("image fits");
        cpu
    }
}

/// Steps until the machine halts, is killed, aborts or hits a breakpoint.
pub fn run(machine: &mut Machine, limit: usize) -> StepOutcome {
    for _ in 0..limit {
        let outcome = machine.step(true);
        match outcome {
            StepOutcome::Retired { .. } | StepOutcome::Trapped { .. } => {}
            _ => return outcome,
        }
    }
    panic!("program did not stop within {limit} steps");
}
