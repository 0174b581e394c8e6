#![no_main]

use fl32r_core::{disassemble, CpuConfig, Decoder, Machine, StepOutcome};
use libfuzzer_sys::fuzz_target;

const MEMORY_SIZE: u64 = 0x1000;
const MAX_STEPS: usize = 256;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let word = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    if let Ok(instr) = Decoder::decode(word) {
        assert_eq!(Decoder::decode(instr.encode()).map(|d| d.operands()), Ok(instr.operands()));
    }
    let _ = disassemble(word);

    let config = CpuConfig {
        memory_size: MEMORY_SIZE,
        frequency_hz: 0,
        ..CpuConfig::default()
    };
    let Ok(mut machine) = Machine::new(&config) else {
        return;
    };
    let image = &data[..data.len().min(MEMORY_SIZE as usize)];
    if machine.load_image(image).is_err() {
        return;
    }
    if data.len() > 4 && data[4] & 1 == 1 {
        machine.flags_mut().privileged = false;
    }

    for _ in 0..MAX_STEPS {
        match machine.step(false) {
            StepOutcome::Retired { .. } | StepOutcome::Trapped { .. } => {}
            StepOutcome::Halted { .. }
            | StepOutcome::Killed { .. }
            | StepOutcome::Breakpoint { .. }
            | StepOutcome::Aborted(_) => break,
        }
        assert_eq!(machine.registers().get(fl32r_core::Register::ZERO), 0);
    }
});
