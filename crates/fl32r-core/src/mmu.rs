//! Base+bound address translation and physical region dispatch.
//!
//! A virtual address `v` is valid when `v < window`, where the window is the
//! VMEM bound register or the whole 32-bit range when the bound is 0. Valid
//! addresses map to `(offset + v) mod 2^32`, which is then dispatched to RAM,
//! ROM or the MMIO bus.

use crate::fault::Fault;
use crate::machine::Machine;
use crate::memory::{MemoryRegion, ADDRESS_SPACE_SIZE};
use crate::state::Register;

impl Machine {
    /// Size of the current translation window in bytes.
    #[must_use]
    pub fn window_size(&self) -> u64 {
        match self.registers.get(Register::VMEM_BOUND) {
            0 => ADDRESS_SPACE_SIZE,
            bound => u64::from(bound),
        }
    }

    /// Translates a virtual address to a physical one.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Memory`] when `vaddr` lies outside the window.
    pub fn translate(&self, vaddr: u32) -> Result<u32, Fault> {
        if u64::from(vaddr) >= self.window_size() {
            return Err(Fault::Memory);
        }
        Ok(self.registers.get(Register::VMEM_OFFSET).wrapping_add(vaddr))
    }

    /// Reads one byte through translation.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Memory`] for addresses outside the window or outside RAM.
    pub fn read_byte(&mut self, vaddr: u32) -> Result<u8, Fault> {
        let phys = self.translate(vaddr)?;
        self.read_physical_byte(phys)
    }

    /// Writes one byte through translation.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Memory`] for addresses outside the window or outside RAM.
    pub fn write_byte(&mut self, vaddr: u32, value: u8) -> Result<(), Fault> {
        let phys = self.translate(vaddr)?;
        self.write_physical_byte(phys, value)
    }

    /// Reads a big-endian word through translation.
    ///
    /// A word that lands entirely on one MMIO device is a single device word
    /// access; everything else is four byte reads, highest address first.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Memory`] when any byte is out of range.
    pub fn read_word(&mut self, vaddr: u32) -> Result<u32, Fault> {
        if let Some(phys) = self.mmio_word_target(vaddr) {
            return Ok(self.bus.read_word(phys));
        }
        let mut bytes = [0_u8; 4];
        for (i, byte) in (0_u32..4).zip(bytes.iter_mut()).rev() {
            let addr = vaddr.checked_add(i).ok_or(Fault::Memory)?;
            *byte = self.read_byte(addr)?;
        }
        Ok(u32::from_be_bytes(bytes))
    }

    /// Writes a big-endian word through translation.
    ///
    /// Bytes are written highest address first; a fault part-way leaves the
    /// bytes already written in place.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Memory`] when any byte is out of range.
    pub fn write_word(&mut self, vaddr: u32, value: u32) -> Result<(), Fault> {
        if let Some(phys) = self.mmio_word_target(vaddr) {
            self.bus.write_word(phys, value);
            return Ok(());
        }
        for (i, byte) in (0_u32..4).zip(value.to_be_bytes()).rev() {
            let addr = vaddr.checked_add(i).ok_or(Fault::Memory)?;
            self.write_byte(addr, byte)?;
        }
        Ok(())
    }

    fn mmio_word_target(&self, vaddr: u32) -> Option<u32> {
        if u64::from(vaddr) + 3 >= self.window_size() {
            return None;
        }
        let phys = self.translate(vaddr).ok()?;
        let aligned = phys & 3 == 0;
        (aligned
            && self.layout.classify(phys) == MemoryRegion::Mmio
            && self.bus.maps_word(phys))
        .then_some(phys)
    }

    /// Reads a physical byte.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Memory`] for RAM-window addresses past the end of main memory.
    pub fn read_physical_byte(&mut self, phys: u32) -> Result<u8, Fault> {
        match self.layout.classify(phys) {
            MemoryRegion::Ram => self.ram.get(u64::from(phys)).map_err(|_| Fault::Memory),
            MemoryRegion::Rom => self
                .rom
                .get(u64::from(phys) - self.layout.rom_start())
                .map_err(|_| Fault::Memory),
            MemoryRegion::Mmio => Ok(self.bus.read_byte(phys)),
        }
    }

    /// Writes a physical byte; ROM writes are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Memory`] for RAM-window addresses past the end of main memory.
    pub fn write_physical_byte(&mut self, phys: u32, value: u8) -> Result<(), Fault> {
        match self.layout.classify(phys) {
            MemoryRegion::Ram => self
                .ram
                .set(u64::from(phys), value)
                .map_err(|_| Fault::Memory),
            MemoryRegion::Rom => {
                log::warn!("write of {value:#04x} to rom at {phys:#010x} dropped");
                Ok(())
            }
            MemoryRegion::Mmio => {
                self.bus.write_byte(phys, value);
                Ok(())
            }
        }
    }

    /// Reads a physical big-endian word, highest byte first.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Memory`] when any byte is out of range.
    pub fn read_physical_word(&mut self, phys: u32) -> Result<u32, Fault> {
        let mut bytes = [0_u8; 4];
        for (i, byte) in (0_u32..4).zip(bytes.iter_mut()).rev() {
            let addr = phys.checked_add(i).ok_or(Fault::Memory)?;
            *byte = self.read_physical_byte(addr)?;
        }
        Ok(u32::from_be_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use crate::api::CpuConfig;
    use crate::fault::Fault;
    use crate::machine::Machine;
    use crate::state::Register;

    fn machine() -> Machine {
        Machine::new(&CpuConfig {
            memory_size: 0x4000,
            ..CpuConfig::default()
        })
        .expect("valid config")
    }

    #[test]
    fn vmem_window_offsets_and_bounds_accesses() {
        let mut machine = machine();
        machine.registers_mut().set(Register::VMEM_OFFSET, 0x1000);
        machine.registers_mut().set(Register::VMEM_BOUND, 0x100);
        assert_eq!(machine.translate(0x50), Ok(0x1050));
        assert_eq!(machine.translate(0x200), Err(Fault::Memory));
        machine.write_byte(0x50, 0xAB).expect("in window");
        assert_eq!(machine.ram().get(0x1050), Ok(0xAB));
    }

    #[test]
    fn zero_bound_opens_full_window_but_ram_is_still_checked() {
        let mut machine = machine();
        assert_eq!(machine.translate(0x8000), Ok(0x8000));
        assert_eq!(machine.read_byte(0x8000), Err(Fault::Memory));
    }

    #[test]
    fn words_are_big_endian() {
        let mut machine = machine();
        machine.write_word(0x10, 0x1122_3344).expect("in ram");
        assert_eq!(&machine.ram().as_slice()[0x10..0x14], &[0x11, 0x22, 0x33, 0x44]);
        assert_eq!(machine.read_word(0x10), Ok(0x1122_3344));
    }

    #[test]
    fn physical_words_assemble_from_four_bytes() {
        let mut machine = machine();
        for (offset, byte) in [0xCA_u8, 0xFE, 0xBA, 0xBE].into_iter().enumerate() {
            machine
                .write_physical_byte(0x20 + u32::try_from(offset).expect("small"), byte)
                .expect("in ram");
        }
        assert_eq!(machine.read_physical_word(0x20), Ok(0xCAFE_BABE));
        assert_eq!(machine.read_physical_word(0x3FFD), Err(Fault::Memory));
    }

    #[test]
    fn word_write_straddling_end_of_ram_faults_before_committing() {
        let mut machine = machine();
        assert_eq!(machine.write_word(0x3FFE, 0xAABB_CCDD), Err(Fault::Memory));
        assert_eq!(machine.ram().get(0x3FFE), Ok(0));
        assert_eq!(machine.ram().get(0x3FFF), Ok(0));
    }

    #[test]
    fn rom_is_readable_and_write_protected() {
        let mut machine = machine();
        machine.load_rom(&[0xDE, 0xAD]).expect("fits in rom");
        let rom = u32::try_from(machine.layout().rom_start()).expect("rom below 4 GiB");
        assert_eq!(machine.read_word(rom), Ok(0xDEAD_0000));
        machine.write_byte(rom, 0).expect("dropped, not faulted");
        assert_eq!(machine.read_byte(rom), Ok(0xDE));
    }

    #[test]
    fn unmapped_mmio_reads_zero_without_fault() {
        let mut machine = machine();
        assert_eq!(machine.read_word(0xFFFF_0000), Ok(0));
        assert_eq!(machine.write_word(0xFFFF_FFFC, 1), Ok(()));
    }

    #[test]
    fn word_at_top_of_address_space_does_not_wrap() {
        let mut machine = machine();
        assert_eq!(machine.read_word(0xFFFF_FFFE), Err(Fault::Memory));
    }
}
