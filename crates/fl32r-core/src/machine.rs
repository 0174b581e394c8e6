//! The owned CPU aggregate: architectural state, memories, bus and debug state.
//!
//! Every subsystem (MMU, trap controller, execution unit) is an `impl Machine`
//! block in its own module operating on this single owner.

use crate::api::{ConfigError, CpuConfig, CpuError, StepOutcome};
use crate::debug::Breakpoints;
use crate::decoder::Decoder;
use crate::disasm::disassemble;
use crate::execute::ExecuteOutcome;
use crate::fault::{Fault, TrapCause};
use crate::memory::{AddressSpace, MemoryLayout};
use crate::mmio::{InterruptLine, MmioBus, MmioDevice};
use crate::state::{Flags, Register, RegisterFile};
use crate::timing::{cycle_cost, opcode_cycles, CycleCostKind};
use crate::trap::VectorTable;

/// Complete CPU state with no internal aliasing.
#[derive(Debug)]
pub struct Machine {
    pub(crate) registers: RegisterFile,
    pub(crate) flags: Flags,
    pub(crate) interrupts_masked: bool,
    pub(crate) saved_pc: u32,
    pub(crate) saved_flags: u32,
    pub(crate) ram: AddressSpace,
    pub(crate) rom: AddressSpace,
    pub(crate) bus: MmioBus,
    pub(crate) layout: MemoryLayout,
    pub(crate) vectors: VectorTable,
    irq: InterruptLine,
    breakpoints: Breakpoints,
    resume_past_breakpoint: Option<u32>,
}

impl Machine {
    /// Builds a booted machine with zeroed memories and an empty bus.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` fails validation.
    pub fn new(config: &CpuConfig) -> Result<Self, ConfigError> {
        let layout = config.validate()?;
        let ram = AddressSpace::new(config.memory_size).map_err(|_| ConfigError::MemoryTooLarge {
            size: config.memory_size,
            limit: layout.ram_window(),
        })?;
        let rom = AddressSpace::new(layout.rom_size()).map_err(|_| {
            ConfigError::WindowsTooLarge {
                rom_size: config.rom_size,
                mmio_size: config.mmio_size,
            }
        })?;
        let mut machine = Self {
            registers: RegisterFile::default(),
            flags: Flags::boot(),
            interrupts_masked: false,
            saved_pc: 0,
            saved_flags: 0,
            ram,
            rom,
            bus: MmioBus::new(),
            layout,
            vectors: config.vector_table(),
            irq: InterruptLine::new(),
            breakpoints: Breakpoints::default(),
            resume_past_breakpoint: None,
        };
        machine.boot();
        Ok(machine)
    }

    /// Resets registers, flags and trap state to the boot configuration.
    ///
    /// PC is 0, SP is the last byte of main memory, and the CPU is privileged
    /// with interrupts unmasked. Memory, devices and breakpoints are kept;
    /// pending hardware interrupts are discarded.
    #[allow(clippy::cast_possible_truncation)]
    pub fn boot(&mut self) {
        self.registers.clear();
        self.registers.set_pc(0);
        self.registers
            .set_sp(self.ram.len().saturating_sub(1) as u32);
        self.flags = Flags::boot();
        self.interrupts_masked = false;
        self.saved_pc = 0;
        self.saved_flags = 0;
        self.resume_past_breakpoint = None;
        self.irq.clear();
    }

    /// Copies a program image to physical address 0.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::ProgramTooLarge`] when the image exceeds main memory.
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), CpuError> {
        self.ram
            .write_slice(0, image)
            .map_err(|_| CpuError::ProgramTooLarge {
                size: image.len() as u64,
                capacity: self.ram.len(),
            })
    }

    /// Copies an image to the start of the ROM window.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::ProgramTooLarge`] when the image exceeds the ROM window.
    pub fn load_rom(&mut self, image: &[u8]) -> Result<(), CpuError> {
        self.rom
            .write_slice(0, image)
            .map_err(|_| CpuError::ProgramTooLarge {
                size: image.len() as u64,
                capacity: self.rom.len(),
            })
    }

    /// Appends an MMIO device to the bus.
    pub fn register_device(&mut self, device: Box<dyn MmioDevice>) {
        self.bus.register(device);
    }

    /// Handle for raising hardware interrupts into this machine.
    #[must_use]
    pub fn interrupt_line(&self) -> InterruptLine {
        self.irq.clone()
    }

    /// Register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Mutable register file, for host-side setup.
    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    /// Current flags.
    #[must_use]
    pub const fn flags(&self) -> Flags {
        self.flags
    }

    /// Mutable flags, for host-side setup.
    pub fn flags_mut(&mut self) -> &mut Flags {
        &mut self.flags
    }

    /// Returns `true` while software and hardware interrupts are ignored.
    #[must_use]
    pub const fn interrupts_masked(&self) -> bool {
        self.interrupts_masked
    }

    /// PC saved by the most recent trap entry.
    #[must_use]
    pub const fn saved_pc(&self) -> u32 {
        self.saved_pc
    }

    /// Packed flags saved by the most recent trap entry.
    #[must_use]
    pub const fn saved_flags(&self) -> u32 {
        self.saved_flags
    }

    /// Main memory.
    #[must_use]
    pub const fn ram(&self) -> &AddressSpace {
        &self.ram
    }

    /// Physical memory layout.
    #[must_use]
    pub const fn layout(&self) -> MemoryLayout {
        self.layout
    }

    /// Vector table geometry.
    #[must_use]
    pub const fn vectors(&self) -> VectorTable {
        self.vectors
    }

    /// Breakpoint sets.
    #[must_use]
    pub const fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    /// Mutable breakpoint sets.
    pub fn breakpoints_mut(&mut self) -> &mut Breakpoints {
        &mut self.breakpoints
    }

    /// Returns `true` when a hardware interrupt is waiting.
    #[must_use]
    pub fn has_pending_interrupt(&self) -> bool {
        self.irq.has_pending()
    }

    /// Advances device time without executing, used while halted.
    pub fn idle_tick(&mut self) {
        self.bus.tick();
    }

    /// Runs one fetch-decode-execute step, then ticks the bus.
    ///
    /// With `honor_breakpoints`, a breakpoint at the current PC stops the step
    /// before anything executes; the next honoring step at that same PC runs
    /// the instruction instead of stopping again.
    pub fn step(&mut self, honor_breakpoints: bool) -> StepOutcome {
        let outcome = self.step_inner(honor_breakpoints);
        if !matches!(outcome, StepOutcome::Breakpoint { .. }) {
            self.bus.tick();
        }
        outcome
    }

    fn step_inner(&mut self, honor_breakpoints: bool) -> StepOutcome {
        if let Some(outcome) = self.poll_interrupts() {
            return outcome;
        }

        let pc = self.registers.pc();
        if honor_breakpoints
            && self.resume_past_breakpoint != Some(pc)
            && self.breakpoint_hit(pc)
        {
            log::debug!("breakpoint hit at {pc:#010x}");
            self.resume_past_breakpoint = Some(pc);
            return StepOutcome::Breakpoint { pc };
        }
        self.resume_past_breakpoint = None;

        let word = match self.read_word(pc) {
            Ok(word) => word,
            Err(fault) => return self.trap(TrapCause::Fault(fault), 0),
        };
        self.registers.set_pc(pc.wrapping_add(4));
        log::trace!("{pc:#010x}: {}", disassemble(word));

        let instr = match Decoder::decode(word) {
            Ok(instr) => instr,
            Err(fault) => {
                return self.trap(TrapCause::Fault(fault), cycle_cost(CycleCostKind::Simple))
            }
        };
        let opcode = instr.opcode();
        let cycles = opcode_cycles(opcode);
        match self.execute(instr) {
            Ok(ExecuteOutcome::Continue) => StepOutcome::Retired { opcode, cycles },
            Ok(ExecuteOutcome::SoftwareInterrupt(index)) => {
                self.trap(TrapCause::Software(index), cycles)
            }
            Ok(ExecuteOutcome::Halt) => StepOutcome::Halted { cycles },
            Ok(ExecuteOutcome::Kill) => StepOutcome::Killed { cycles },
            Err(fault) => self.trap(TrapCause::Fault(fault), cycles),
        }
    }

    fn poll_interrupts(&mut self) -> Option<StepOutcome> {
        if self.interrupts_masked {
            while let Some(index) = self.irq.take() {
                log::warn!("hardware interrupt {index} dropped while interrupts are masked");
            }
            return None;
        }
        let index = self.irq.take()?;
        Some(self.trap(TrapCause::Hardware(index), 0))
    }

    fn breakpoint_hit(&self, pc: u32) -> bool {
        if self.breakpoints.is_empty() {
            return false;
        }
        self.breakpoints.has_virtual(pc)
            || self
                .translate(pc)
                .is_ok_and(|phys| self.breakpoints.has_physical(phys))
    }

    fn trap(&mut self, cause: TrapCause, cycles: u32) -> StepOutcome {
        match self.enter_trap(cause) {
            Ok(_) => StepOutcome::Trapped {
                cause,
                cycles: cycles + cycle_cost(CycleCostKind::TrapEntry),
            },
            Err(error) => StepOutcome::Aborted(error),
        }
    }

    /// Privilege-checked register read for instruction operands.
    pub(crate) const fn reg(&self, reg: Register) -> Result<u32, Fault> {
        self.registers.read(reg, self.flags.privileged)
    }

    /// Privilege-checked register write for instruction results.
    pub(crate) fn set_reg(&mut self, reg: Register, value: u32) -> Result<(), Fault> {
        self.registers.write(reg, value, self.flags.privileged)
    }

    /// Fails with a privilege fault unless `reg` is writable right now.
    pub(crate) const fn check_writable(&self, reg: Register) -> Result<(), Fault> {
        if reg.is_privileged() && !self.flags.privileged {
            Err(Fault::Privilege)
        } else {
            Ok(())
        }
    }

    /// Fails with a privilege fault unless the CPU is privileged.
    pub(crate) const fn require_privilege(&self) -> Result<(), Fault> {
        if self.flags.privileged {
            Ok(())
        } else {
            Err(Fault::Privilege)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Machine;
    use crate::api::{CpuConfig, CpuError, StepOutcome};
    use crate::encoding::{encode_no, encode_u, Opcode};
    use crate::fault::{Fault, TrapCause};
    use crate::state::Register;

    fn small_config() -> CpuConfig {
        CpuConfig {
            memory_size: 0x1000,
            ..CpuConfig::default()
        }
    }

    fn machine_with(words: &[u32]) -> Machine {
        let mut machine = Machine::new(&small_config()).expect("valid config");
        let image: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        machine.load_image(&image).expect("image fits");
        machine
    }

    #[test]
    fn boot_places_stack_at_last_byte_and_grants_privilege() {
        let machine = machine_with(&[]);
        assert_eq!(machine.registers().pc(), 0);
        assert_eq!(machine.registers().sp(), 0xFFF);
        assert!(machine.flags().privileged);
        assert!(!machine.interrupts_masked());
    }

    #[test]
    fn oversized_image_is_rejected() {
        let mut machine = Machine::new(&small_config()).expect("valid config");
        assert_eq!(
            machine.load_image(&[0; 0x1001]),
            Err(CpuError::ProgramTooLarge {
                size: 0x1001,
                capacity: 0x1000
            })
        );
    }

    #[test]
    fn step_advances_pc_and_reports_cost() {
        let r1 = Register::new(1).expect("valid register");
        let mut machine = machine_with(&[encode_u(Opcode::Lli, r1, 0x1234)]);
        assert_eq!(
            machine.step(true),
            StepOutcome::Retired {
                opcode: Opcode::Lli,
                cycles: 1
            }
        );
        assert_eq!(machine.registers().pc(), 4);
        assert_eq!(machine.registers().get(r1), 0x1234);
    }

    #[test]
    fn illegal_opcode_is_vectored_not_returned() {
        let mut machine = machine_with(&[0xFF00_0000]);
        machine.flags_mut().privileged = false;
        let handler = 0x200_u32;
        let slot = machine.vectors().slot_address(Fault::IllegalInstruction.vector_slot());
        machine
            .ram
            .write_slice(u64::from(slot), &handler.to_be_bytes())
            .expect("slot in memory");
        let outcome = machine.step(true);
        assert_eq!(
            outcome,
            StepOutcome::Trapped {
                cause: TrapCause::Fault(Fault::IllegalInstruction),
                cycles: 6
            }
        );
        assert_eq!(machine.registers().pc(), handler);
        assert_eq!(machine.saved_pc(), 4);
    }

    #[test]
    fn breakpoint_stops_once_then_executes() {
        let mut machine = machine_with(&[encode_no(Opcode::Nop), encode_no(Opcode::Nop)]);
        machine.breakpoints_mut().add_virtual(0);
        assert_eq!(machine.step(true), StepOutcome::Breakpoint { pc: 0 });
        assert_eq!(machine.registers().pc(), 0);
        assert!(matches!(machine.step(true), StepOutcome::Retired { .. }));
        assert_eq!(machine.registers().pc(), 4);
    }

    #[test]
    fn masked_hardware_interrupts_are_dropped() {
        let mut machine = machine_with(&[encode_no(Opcode::Nop)]);
        machine.interrupts_masked = true;
        machine.interrupt_line().raise(1);
        assert!(matches!(machine.step(true), StepOutcome::Retired { .. }));
        assert!(!machine.has_pending_interrupt());
    }
}
