use crate::Fault;

/// Number of architecturally visible registers (`r0..r31`).
pub const REGISTER_COUNT: usize = 32;

/// A 5-bit register index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Register(u8);

impl Register {
    /// Hard-wired zero register.
    pub const ZERO: Self = Self(24);
    /// Stack pointer.
    pub const SP: Self = Self(25);
    /// Program counter.
    pub const PC: Self = Self(26);
    /// VMEM window offset (privileged).
    pub const VMEM_OFFSET: Self = Self(27);
    /// VMEM window bound (privileged).
    pub const VMEM_BOUND: Self = Self(28);
    /// First privileged scratch register.
    pub const SCRATCH1: Self = Self(29);
    /// Second privileged scratch register.
    pub const SCRATCH2: Self = Self(30);
    /// Third privileged scratch register.
    pub const SCRATCH3: Self = Self(31);

    /// First index that requires the privilege flag.
    pub const FIRST_PRIVILEGED: u8 = 27;

    /// Builds a register from the low five bits of `bits`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_u5(bits: u32) -> Self {
        Self((bits & 0x1F) as u8)
    }

    /// Builds a register from an index in `0..32`.
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < REGISTER_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Array index of this register.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw 5-bit field value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0 as u32
    }

    /// Returns `true` for the VMEM control and scratch registers.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        self.0 >= Self::FIRST_PRIVILEGED
    }

    /// Assembly name of this register.
    #[must_use]
    pub const fn name(self) -> &'static str {
        const NAMES: [&str; REGISTER_COUNT] = [
            "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12",
            "r13", "r14", "r15", "r16", "r17", "r18", "r19", "r20", "r21", "r22", "r23", "rz",
            "rsp", "rpc", "hmo", "hmb", "hm1", "hm2", "hm3",
        ];
        NAMES[self.0 as usize]
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The 32-entry register file.
///
/// [`get`](Self::get)/[`set`](Self::set) are the raw core paths; instruction
/// operands go through [`read`](Self::read)/[`write`](Self::write), which
/// enforce privilege.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    values: [u32; REGISTER_COUNT],
}

impl RegisterFile {
    /// Reads a register; the zero register always reads 0.
    #[must_use]
    pub const fn get(&self, reg: Register) -> u32 {
        if reg.0 == Register::ZERO.0 {
            0
        } else {
            self.values[reg.index()]
        }
    }

    /// Writes a register; writes to the zero register are discarded.
    pub const fn set(&mut self, reg: Register, value: u32) {
        if reg.0 != Register::ZERO.0 {
            self.values[reg.index()] = value;
        }
    }

    /// Program counter.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.values[Register::PC.index()]
    }

    /// Writes the program counter.
    pub const fn set_pc(&mut self, value: u32) {
        self.values[Register::PC.index()] = value;
    }

    /// Stack pointer.
    #[must_use]
    pub const fn sp(&self) -> u32 {
        self.values[Register::SP.index()]
    }

    /// Writes the stack pointer.
    pub const fn set_sp(&mut self, value: u32) {
        self.values[Register::SP.index()] = value;
    }

    /// Privilege-checked operand read.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Privilege`] for registers 27..=31 when `privileged` is false.
    pub const fn read(&self, reg: Register, privileged: bool) -> Result<u32, Fault> {
        if reg.is_privileged() && !privileged {
            return Err(Fault::Privilege);
        }
        Ok(self.get(reg))
    }

    /// Privilege-checked operand write.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Privilege`] for registers 27..=31 when `privileged` is false;
    /// the register is left unchanged.
    pub const fn write(&mut self, reg: Register, value: u32, privileged: bool) -> Result<(), Fault> {
        if reg.is_privileged() && !privileged {
            return Err(Fault::Privilege);
        }
        self.set(reg, value);
        Ok(())
    }

    /// Copy of every register value, zero register included as 0.
    #[must_use]
    pub const fn snapshot(&self) -> [u32; REGISTER_COUNT] {
        let mut out = self.values;
        out[Register::ZERO.index()] = 0;
        out
    }

    /// Zeroes every register.
    pub const fn clear(&mut self) {
        self.values = [0; REGISTER_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::{Register, RegisterFile, REGISTER_COUNT};
    use crate::Fault;

    #[test]
    fn zero_register_discards_writes() {
        let mut regs = RegisterFile::default();
        regs.set(Register::ZERO, 0xDEAD_BEEF);
        assert_eq!(regs.get(Register::ZERO), 0);
        regs.write(Register::ZERO, 7, false).unwrap();
        assert_eq!(regs.read(Register::ZERO, false), Ok(0));
        assert_eq!(regs.snapshot()[24], 0);
    }

    #[test]
    fn privileged_registers_reject_unprivileged_access() {
        let mut regs = RegisterFile::default();
        for index in 27..32 {
            let reg = Register::new(index).expect("valid register index");
            regs.set(reg, 0x55);
            assert_eq!(regs.read(reg, false), Err(Fault::Privilege));
            assert_eq!(regs.write(reg, 1, false), Err(Fault::Privilege));
            assert_eq!(regs.get(reg), 0x55);
            assert_eq!(regs.read(reg, true), Ok(0x55));
        }
    }

    #[test]
    fn pc_and_sp_are_ordinary_registers() {
        let mut regs = RegisterFile::default();
        regs.write(Register::PC, 0x40, false).unwrap();
        regs.write(Register::SP, 0x80, false).unwrap();
        assert_eq!(regs.pc(), 0x40);
        assert_eq!(regs.sp(), 0x80);
    }

    #[test]
    fn register_indices_decode_from_five_bits() {
        assert_eq!(Register::from_u5(0xFF).index(), 31);
        assert!(Register::new(32).is_none());
        assert_eq!(Register::new(3).map(Register::name), Some("r3"));
        assert_eq!(Register::SP.name(), "rsp");
        assert_eq!(Register::SCRATCH3.to_string(), "hm3");
        assert_eq!(REGISTER_COUNT, 32);
    }
}
