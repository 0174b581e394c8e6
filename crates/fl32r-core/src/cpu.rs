//! Host-facing lifecycle and debug controller.
//!
//! [`Cpu`] wraps a [`Machine`] behind one mutex, held for exactly one step,
//! and keeps the run-control flags in atomics so `halt`, `resume`, `kill`,
//! single-step toggles and breakpoint edits can come from any thread while
//! [`Cpu::start`] runs the loop.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::api::{CpuConfig, CpuError, StepOutcome};
use crate::disasm::{disassemble_window, DisassemblyRow};
use crate::machine::Machine;
use crate::mmio::{InterruptLine, MmioDevice};
use crate::state::{RunState, REGISTER_COUNT};
use crate::timing::Throttle;

/// A CPU instance with a blocking run loop and thread-safe controls.
#[derive(Debug)]
pub struct Cpu {
    machine: Mutex<Machine>,
    frequency_hz: AtomicI64,
    loaded: AtomicBool,
    started: AtomicBool,
    killed: AtomicBool,
    halted: AtomicBool,
    waiting_for_interrupt: AtomicBool,
    single_step: AtomicBool,
}

impl Cpu {
    /// Builds a CPU from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::Config`] when the configuration is invalid.
    pub fn new(config: CpuConfig) -> Result<Self, CpuError> {
        let machine = Machine::new(&config)?;
        Ok(Self {
            machine: Mutex::new(machine),
            frequency_hz: AtomicI64::new(config.frequency_hz),
            loaded: AtomicBool::new(false),
            started: AtomicBool::new(false),
            killed: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            waiting_for_interrupt: AtomicBool::new(false),
            single_step: AtomicBool::new(false),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Machine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_available(&self) -> Result<(), CpuError> {
        if self.run_state().is_available() {
            Ok(())
        } else {
            Err(CpuError::NotAvailable)
        }
    }

    /// Adds a device to the MMIO bus.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::AlreadyStarted`] once the run loop has started.
    pub fn register_device(&self, device: Box<dyn MmioDevice>) -> Result<(), CpuError> {
        if self.started.load(Ordering::SeqCst) {
            return Err(CpuError::AlreadyStarted);
        }
        self.lock().register_device(device);
        Ok(())
    }

    /// Handle devices and host threads use to raise hardware interrupts.
    #[must_use]
    pub fn interrupt_line(&self) -> InterruptLine {
        self.lock().interrupt_line()
    }

    /// Raises hardware interrupt `index`.
    pub fn raise_interrupt(&self, index: u32) {
        self.interrupt_line().raise(index);
    }

    /// Clock frequency used for throttling; `<= 0` means unthrottled.
    #[must_use]
    pub fn frequency_hz(&self) -> i64 {
        self.frequency_hz.load(Ordering::SeqCst)
    }

    /// Changes the throttle frequency; takes effect on the next instruction.
    pub fn set_frequency_hz(&self, hz: i64) {
        self.frequency_hz.store(hz, Ordering::SeqCst);
    }

    /// Copies the boot image to address 0 and resets the CPU to boot state.
    ///
    /// # Errors
    ///
    /// [`CpuError::ProgramAlreadyLoaded`] on a second call,
    /// [`CpuError::AlreadyStarted`] after `start`, and
    /// [`CpuError::ProgramTooLarge`] when the image exceeds main memory.
    pub fn load_program(&self, image: &[u8]) -> Result<(), CpuError> {
        if self.started.load(Ordering::SeqCst) {
            return Err(CpuError::AlreadyStarted);
        }
        if self.loaded.load(Ordering::SeqCst) {
            return Err(CpuError::ProgramAlreadyLoaded);
        }
        let mut machine = self.lock();
        machine.load_image(image)?;
        machine.boot();
        self.loaded.store(true, Ordering::SeqCst);
        log::debug!("loaded {} byte program image", image.len());
        Ok(())
    }

    /// Copies an image into the ROM window.
    ///
    /// # Errors
    ///
    /// [`CpuError::AlreadyStarted`] after `start`, and
    /// [`CpuError::ProgramTooLarge`] when the image exceeds the ROM window.
    pub fn load_rom(&self, image: &[u8]) -> Result<(), CpuError> {
        if self.started.load(Ordering::SeqCst) {
            return Err(CpuError::AlreadyStarted);
        }
        self.lock().load_rom(image)
    }

    /// Runs the fetch-decode-execute loop on the calling thread until killed.
    ///
    /// With `single_step`, the loop starts parked in single-step mode and only
    /// [`step_execution`](Self::step_execution) advances the CPU. A halted or
    /// single-stepping CPU spins on its control flags rather than blocking.
    ///
    /// # Errors
    ///
    /// [`CpuError::NotLoaded`] without a program, [`CpuError::AlreadyStarted`]
    /// on a second call, [`CpuError::Killed`] after a kill, and
    /// [`CpuError::Aborted`] when trap entry hits an unusable vector table; the
    /// CPU is killed in that case.
    pub fn start(&self, single_step: bool) -> Result<(), CpuError> {
        if self.killed.load(Ordering::SeqCst) {
            return Err(CpuError::Killed);
        }
        if !self.loaded.load(Ordering::SeqCst) {
            return Err(CpuError::NotLoaded);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CpuError::AlreadyStarted);
        }
        if single_step {
            self.single_step.store(true, Ordering::SeqCst);
        }
        log::debug!("run loop started (single step: {single_step})");

        while !self.killed.load(Ordering::SeqCst) {
            if self.is_parked() {
                std::hint::spin_loop();
                continue;
            }
            if self.waiting_for_interrupt.load(Ordering::SeqCst) {
                self.wait_for_interrupt();
                continue;
            }

            let started = Instant::now();
            let mut machine = self.lock();
            // Controls flip their flags under the lock; re-check before stepping.
            if self.is_parked() || self.killed.load(Ordering::SeqCst) {
                continue;
            }
            let outcome = machine.step(true);
            drop(machine);
            self.apply_outcome(outcome)?;
            let throttle = Throttle::from_frequency(self.frequency_hz());
            if throttle.is_throttled() {
                throttle.pace(outcome.cycles(), started);
            } else {
                // Let host control calls reach the lock between steps.
                std::thread::yield_now();
            }
        }
        log::debug!("run loop exited");
        Ok(())
    }

    fn is_parked(&self) -> bool {
        self.halted.load(Ordering::SeqCst) || self.single_step.load(Ordering::SeqCst)
    }

    fn wait_for_interrupt(&self) {
        let mut machine = self.lock();
        if machine.has_pending_interrupt() {
            log::debug!("woken from halt by hardware interrupt");
            self.waiting_for_interrupt.store(false, Ordering::SeqCst);
        } else {
            machine.idle_tick();
            drop(machine);
            std::hint::spin_loop();
        }
    }

    fn apply_outcome(&self, outcome: StepOutcome) -> Result<(), CpuError> {
        match outcome {
            StepOutcome::Retired { .. } | StepOutcome::Trapped { .. } => {}
            StepOutcome::Halted { .. } => {
                log::debug!("halted by instruction");
                self.waiting_for_interrupt.store(true, Ordering::SeqCst);
            }
            StepOutcome::Killed { .. } => {
                log::debug!("killed by instruction");
                self.killed.store(true, Ordering::SeqCst);
            }
            StepOutcome::Breakpoint { pc } => {
                log::debug!("entering single-step mode at breakpoint {pc:#010x}");
                self.single_step.store(true, Ordering::SeqCst);
            }
            StepOutcome::Aborted(error) => {
                self.killed.store(true, Ordering::SeqCst);
                return Err(CpuError::Aborted(error));
            }
        }
        Ok(())
    }

    /// Pauses the run loop; a no-op when already halted.
    ///
    /// No instruction executes autonomously after this returns.
    ///
    /// # Errors
    ///
    /// [`CpuError::NotAvailable`] before start or after kill.
    pub fn halt(&self) -> Result<(), CpuError> {
        self.ensure_available()?;
        let _machine = self.lock();
        if !self.halted.swap(true, Ordering::SeqCst) {
            log::debug!("halted by host");
        }
        Ok(())
    }

    /// Resumes a halted run loop, including one halted by `HLT`.
    ///
    /// # Errors
    ///
    /// [`CpuError::NotAvailable`] before start or after kill.
    pub fn resume(&self) -> Result<(), CpuError> {
        self.ensure_available()?;
        let was_halted = self.halted.swap(false, Ordering::SeqCst)
            | self.waiting_for_interrupt.swap(false, Ordering::SeqCst);
        if was_halted {
            log::debug!("resumed by host");
        }
        Ok(())
    }

    /// Returns registers, flags and trap state to boot configuration.
    ///
    /// Memory and devices are kept. With `to_single_step` the CPU parks in
    /// single-step mode; otherwise it leaves it.
    ///
    /// # Errors
    ///
    /// [`CpuError::Killed`] after a kill.
    pub fn reset(&self, to_single_step: bool) -> Result<(), CpuError> {
        if self.killed.load(Ordering::SeqCst) {
            return Err(CpuError::Killed);
        }
        let mut machine = self.lock();
        machine.boot();
        self.halted.store(false, Ordering::SeqCst);
        self.waiting_for_interrupt.store(false, Ordering::SeqCst);
        self.single_step.store(to_single_step, Ordering::SeqCst);
        drop(machine);
        log::debug!("reset (single step: {to_single_step})");
        Ok(())
    }

    /// Stops the run loop permanently after the current instruction.
    ///
    /// # Errors
    ///
    /// [`CpuError::NotAvailable`] before start or after a previous kill.
    pub fn kill(&self) -> Result<(), CpuError> {
        self.ensure_available()?;
        let _machine = self.lock();
        self.killed.store(true, Ordering::SeqCst);
        log::debug!("killed by host");
        Ok(())
    }

    /// Parks the run loop so only [`step_execution`](Self::step_execution) advances it.
    ///
    /// # Errors
    ///
    /// [`CpuError::NotAvailable`] or [`CpuError::SingleStepAlreadyActive`].
    pub fn activate_single_step_mode(&self) -> Result<(), CpuError> {
        self.ensure_available()?;
        let _machine = self.lock();
        if self.single_step.swap(true, Ordering::SeqCst) {
            return Err(CpuError::SingleStepAlreadyActive);
        }
        log::debug!("single-step mode on");
        Ok(())
    }

    /// Leaves single-step mode and lets the run loop continue.
    ///
    /// # Errors
    ///
    /// [`CpuError::NotAvailable`] or [`CpuError::SingleStepInactive`].
    pub fn deactivate_single_step_mode(&self) -> Result<(), CpuError> {
        self.ensure_available()?;
        if !self.single_step.swap(false, Ordering::SeqCst) {
            return Err(CpuError::SingleStepInactive);
        }
        log::debug!("single-step mode off");
        Ok(())
    }

    /// Executes exactly one instruction while in single-step mode.
    ///
    /// Breakpoints are not checked. `HLT` retires without parking the CPU;
    /// `KILL` kills it.
    ///
    /// # Errors
    ///
    /// [`CpuError::NotAvailable`], [`CpuError::SingleStepInactive`], or
    /// [`CpuError::Aborted`] when trap entry fails (the CPU is killed).
    pub fn step_execution(&self) -> Result<StepOutcome, CpuError> {
        self.ensure_available()?;
        if !self.single_step.load(Ordering::SeqCst) {
            return Err(CpuError::SingleStepInactive);
        }
        let outcome = self.lock().step(false);
        match outcome {
            StepOutcome::Killed { .. } => self.killed.store(true, Ordering::SeqCst),
            StepOutcome::Aborted(error) => {
                self.killed.store(true, Ordering::SeqCst);
                return Err(CpuError::Aborted(error));
            }
            _ => {}
        }
        Ok(outcome)
    }

    /// Adds a breakpoint on virtual PC `address`; returns `false` if already set.
    pub fn add_breakpoint(&self, address: u32) -> bool {
        self.lock().breakpoints_mut().add_virtual(address)
    }

    /// Removes a virtual breakpoint; returns `false` if it was not set.
    pub fn remove_breakpoint(&self, address: u32) -> bool {
        self.lock().breakpoints_mut().remove_virtual(address)
    }

    /// Adds a breakpoint on physical PC `address`; returns `false` if already set.
    pub fn add_physical_breakpoint(&self, address: u32) -> bool {
        self.lock().breakpoints_mut().add_physical(address)
    }

    /// Removes a physical breakpoint; returns `false` if it was not set.
    pub fn remove_physical_breakpoint(&self, address: u32) -> bool {
        self.lock().breakpoints_mut().remove_physical(address)
    }

    /// Copy of all 32 registers, taken between instructions.
    #[must_use]
    pub fn dump_registers(&self) -> [u32; REGISTER_COUNT] {
        self.lock().registers().snapshot()
    }

    /// Flags in the order zero, negative, overflow, privilege.
    #[must_use]
    pub fn dump_flags(&self) -> [bool; 4] {
        self.lock().flags().as_array()
    }

    /// Read-only view of main memory; the CPU does not step while it is held.
    #[must_use]
    pub fn memory(&self) -> MemoryView<'_> {
        MemoryView {
            machine: self.lock(),
        }
    }

    /// Runs `f` with exclusive access to the machine between steps.
    pub fn with_machine<R>(&self, f: impl FnOnce(&mut Machine) -> R) -> R {
        f(&mut self.lock())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn run_state(&self) -> RunState {
        if self.killed.load(Ordering::SeqCst) {
            RunState::Killed
        } else if !self.started.load(Ordering::SeqCst) {
            RunState::NotStarted
        } else if self.single_step.load(Ordering::SeqCst) {
            RunState::SingleStep
        } else if self.halted.load(Ordering::SeqCst)
            || self.waiting_for_interrupt.load(Ordering::SeqCst)
        {
            RunState::Halted
        } else {
            RunState::Running
        }
    }

    /// Returns `true` once `start` has been called.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Returns `true` after a kill.
    #[must_use]
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// Returns `true` when started and not killed.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.run_state().is_available()
    }
}

/// Stable read-only view of main memory.
///
/// Holds the machine lock, so no instruction executes while it is alive.
pub struct MemoryView<'a> {
    machine: MutexGuard<'a, Machine>,
}

impl MemoryView<'_> {
    /// Main memory bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        self.machine.ram().as_slice()
    }

    /// Disassembles the words around `center`.
    #[must_use]
    pub fn disassemble(&self, center: u32, before: u32, after: u32) -> Vec<DisassemblyRow> {
        disassemble_window(center, before, after, self.as_slice())
    }
}

impl Deref for MemoryView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl std::fmt::Debug for MemoryView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryView")
            .field("len", &self.as_slice().len())
            .finish()
    }
}
