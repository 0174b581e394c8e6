//! Opcode table, operand shapes and pure instruction-word encoders.

#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use crate::state::Register;

/// Operand shape of the low 24 bits of an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InstructionFormat {
    /// No operand fields.
    No,
    /// Three registers in bits 23..19, 18..14, 13..9.
    R,
    /// Register in bits 23..19 and a 16-bit immediate in bits 18..3.
    U,
    /// Raw 24-bit field.
    J,
    /// Register in bits 23..19 and a signed 19-bit immediate.
    I,
    /// Two registers and a signed 14-bit immediate.
    M,
}

/// Assigned opcodes (`OP` field, bits 31..24).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Opcode {
    Nop = 0x00,
    Mov = 0x01,
    Lui = 0x02,
    Lli = 0x03,
    Ldw = 0x04,
    Ldb = 0x05,
    Stw = 0x06,
    Stb = 0x07,
    Add = 0x10,
    Sub = 0x11,
    Mul = 0x12,
    Umul = 0x13,
    Div = 0x14,
    Udiv = 0x15,
    Mod = 0x16,
    Umod = 0x17,
    And = 0x18,
    Or = 0x19,
    Xor = 0x1A,
    Shr = 0x1B,
    Sra = 0x1C,
    Shl = 0x1D,
    Not = 0x1E,
    Addi = 0x20,
    Ori = 0x21,
    Xori = 0x22,
    Andi = 0x23,
    Shli = 0x24,
    Srai = 0x25,
    Shri = 0x26,
    Jmp = 0x30,
    Jr = 0x31,
    Cmp = 0x32,
    Jeq = 0x33,
    Jne = 0x34,
    Jlt = 0x35,
    Jgt = 0x36,
    Jle = 0x37,
    Jge = 0x38,
    Jof = 0x39,
    Jno = 0x3A,
    Call = 0x3B,
    Clr = 0x3C,
    Ret = 0x3D,
    Int = 0x3E,
    Push = 0x40,
    Pop = 0x41,
    Vmo = 0x50,
    Vmb = 0x51,
    Hlr = 0x52,
    Sti = 0x53,
    Cli = 0x54,
    Gtfs = 0x55,
    Gtpc = 0x56,
    Stfs = 0x57,
    Hlt = 0x7A,
    Kill = 0x7B,
}

/// Single source-of-truth opcode table: opcode, mnemonic, operand shape.
///
/// Any opcode byte not present here is illegal.
pub const OPCODE_TABLE: &[(Opcode, &str, InstructionFormat)] = &[
    (Opcode::Nop, "NOP", InstructionFormat::No),
    (Opcode::Mov, "MOV", InstructionFormat::R),
    (Opcode::Lui, "LUI", InstructionFormat::U),
    (Opcode::Lli, "LLI", InstructionFormat::U),
    (Opcode::Ldw, "LDW", InstructionFormat::M),
    (Opcode::Ldb, "LDB", InstructionFormat::M),
    (Opcode::Stw, "STW", InstructionFormat::M),
    (Opcode::Stb, "STB", InstructionFormat::M),
    (Opcode::Add, "ADD", InstructionFormat::R),
    (Opcode::Sub, "SUB", InstructionFormat::R),
    (Opcode::Mul, "MUL", InstructionFormat::R),
    (Opcode::Umul, "UMUL", InstructionFormat::R),
    (Opcode::Div, "DIV", InstructionFormat::R),
    (Opcode::Udiv, "UDIV", InstructionFormat::R),
    (Opcode::Mod, "MOD", InstructionFormat::R),
    (Opcode::Umod, "UMOD", InstructionFormat::R),
    (Opcode::And, "AND", InstructionFormat::R),
    (Opcode::Or, "OR", InstructionFormat::R),
    (Opcode::Xor, "XOR", InstructionFormat::R),
    (Opcode::Shr, "SHR", InstructionFormat::R),
    (Opcode::Sra, "SRA", InstructionFormat::R),
    (Opcode::Shl, "SHL", InstructionFormat::R),
    (Opcode::Not, "NOT", InstructionFormat::R),
    (Opcode::Addi, "ADDI", InstructionFormat::I),
    (Opcode::Ori, "ORI", InstructionFormat::I),
    (Opcode::Xori, "XORI", InstructionFormat::I),
    (Opcode::Andi, "ANDI", InstructionFormat::I),
    (Opcode::Shli, "SHLI", InstructionFormat::I),
    (Opcode::Srai, "SRAI", InstructionFormat::I),
    (Opcode::Shri, "SHRI", InstructionFormat::I),
    (Opcode::Jmp, "JMP", InstructionFormat::J),
    (Opcode::Jr, "JR", InstructionFormat::R),
    (Opcode::Cmp, "CMP", InstructionFormat::R),
    (Opcode::Jeq, "JEQ", InstructionFormat::J),
    (Opcode::Jne, "JNE", InstructionFormat::J),
    (Opcode::Jlt, "JLT", InstructionFormat::J),
    (Opcode::Jgt, "JGT", InstructionFormat::J),
    (Opcode::Jle, "JLE", InstructionFormat::J),
    (Opcode::Jge, "JGE", InstructionFormat::J),
    (Opcode::Jof, "JOF", InstructionFormat::J),
    (Opcode::Jno, "JNO", InstructionFormat::J),
    (Opcode::Call, "CALL", InstructionFormat::J),
    (Opcode::Clr, "CLR", InstructionFormat::R),
    (Opcode::Ret, "RET", InstructionFormat::No),
    (Opcode::Int, "INT", InstructionFormat::J),
    (Opcode::Push, "PUSH", InstructionFormat::R),
    (Opcode::Pop, "POP", InstructionFormat::R),
    (Opcode::Vmo, "VMO", InstructionFormat::R),
    (Opcode::Vmb, "VMB", InstructionFormat::R),
    (Opcode::Hlr, "HLR", InstructionFormat::R),
    (Opcode::Sti, "STI", InstructionFormat::No),
    (Opcode::Cli, "CLI", InstructionFormat::No),
    (Opcode::Gtfs, "GTFS", InstructionFormat::R),
    (Opcode::Gtpc, "GTPC", InstructionFormat::R),
    (Opcode::Stfs, "STFS", InstructionFormat::R),
    (Opcode::Hlt, "HLT", InstructionFormat::No),
    (Opcode::Kill, "KILL", InstructionFormat::No),
];

const OPCODE_LOOKUP: [Option<Opcode>; 256] = build_lookup();

const fn build_lookup() -> [Option<Opcode>; 256] {
    let mut lookup = [None; 256];
    let mut i = 0;
    while i < OPCODE_TABLE.len() {
        let opcode = OPCODE_TABLE[i].0;
        assert!(lookup[opcode as usize].is_none(), "duplicate opcode");
        lookup[opcode as usize] = Some(opcode);
        i += 1;
    }
    lookup
}

const fn table_entry(opcode: Opcode) -> (Opcode, &'static str, InstructionFormat) {
    let mut i = 0;
    while i < OPCODE_TABLE.len() {
        if OPCODE_TABLE[i].0 as u8 == opcode as u8 {
            return OPCODE_TABLE[i];
        }
        i += 1;
    }
    (opcode, "???", InstructionFormat::No)
}

impl Opcode {
    /// Looks up an opcode byte; `None` means illegal.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        OPCODE_LOOKUP[byte as usize]
    }

    /// Opcode byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Upper-case assembly mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        table_entry(self).1
    }

    /// Operand shape.
    #[must_use]
    pub const fn format(self) -> InstructionFormat {
        table_entry(self).2
    }

    /// Returns `true` for instructions that require the privilege flag.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(
            self,
            Self::Vmo
                | Self::Vmb
                | Self::Hlr
                | Self::Sti
                | Self::Cli
                | Self::Gtfs
                | Self::Gtpc
                | Self::Stfs
                | Self::Hlt
                | Self::Kill
        )
    }
}

/// Sign-extends the low `bits` bits of `value`.
///
/// If the field's top bit is set the result is `field | (-1 << bits)`,
/// otherwise the unsigned field value.
#[must_use]
pub const fn sign_extend(value: u32, bits: u32) -> i32 {
    let field = value & ((1 << bits) - 1);
    if field & (1 << (bits - 1)) != 0 {
        (field | (u32::MAX << bits)) as i32
    } else {
        field as i32
    }
}

/// Mask of the 24-bit operand field.
pub const OPERAND_MASK: u32 = 0x00FF_FFFF;

/// Encodes a no-operand instruction.
#[must_use]
pub const fn encode_no(op: Opcode) -> u32 {
    (op as u32) << 24
}

/// Encodes a register-triple instruction.
#[must_use]
pub const fn encode_r(op: Opcode, r0: Register, r1: Register, r2: Register) -> u32 {
    ((op as u32) << 24) | (r0.bits() << 19) | (r1.bits() << 14) | (r2.bits() << 9)
}

/// Encodes a register plus 16-bit immediate.
#[must_use]
pub const fn encode_u(op: Opcode, reg: Register, imm16: u16) -> u32 {
    ((op as u32) << 24) | (reg.bits() << 19) | ((imm16 as u32) << 3)
}

/// Encodes a raw 24-bit field; higher bits of `imm24` are dropped.
#[must_use]
pub const fn encode_j(op: Opcode, imm24: u32) -> u32 {
    ((op as u32) << 24) | (imm24 & OPERAND_MASK)
}

/// Encodes a register plus 19-bit immediate; higher bits of `imm19` are dropped.
#[must_use]
pub const fn encode_i(op: Opcode, reg: Register, imm19: i32) -> u32 {
    ((op as u32) << 24) | (reg.bits() << 19) | ((imm19 as u32) & 0x7_FFFF)
}

/// Encodes two registers plus 14-bit immediate; higher bits of `imm14` are dropped.
#[must_use]
pub const fn encode_m(op: Opcode, r0: Register, r1: Register, imm14: i32) -> u32 {
    ((op as u32) << 24) | (r0.bits() << 19) | (r1.bits() << 14) | ((imm14 as u32) & 0x3FFF)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{
        encode_i, encode_j, encode_m, encode_no, encode_r, encode_u, sign_extend,
        InstructionFormat, Opcode, OPCODE_TABLE,
    };
    use crate::state::Register;
    use rstest::rstest;

    fn reg(index: u8) -> Register {
        Register::new(index).expect("valid register index")
    }

    #[test]
    fn table_has_unique_opcodes_and_mnemonics() {
        let bytes: HashSet<_> = OPCODE_TABLE.iter().map(|(op, _, _)| *op as u8).collect();
        let names: HashSet<_> = OPCODE_TABLE.iter().map(|(_, name, _)| *name).collect();
        assert_eq!(bytes.len(), OPCODE_TABLE.len());
        assert_eq!(names.len(), OPCODE_TABLE.len());
    }

    #[test]
    fn every_opcode_byte_resolves_only_through_the_table() {
        for byte in 0..=u8::MAX {
            let expected = OPCODE_TABLE.iter().find(|(op, _, _)| *op as u8 == byte);
            assert_eq!(Opcode::from_u8(byte), expected.map(|(op, _, _)| *op));
        }
    }

    #[test]
    fn table_metadata_is_reachable_from_opcode() {
        for (op, name, format) in OPCODE_TABLE {
            assert_eq!(op.mnemonic(), *name);
            assert_eq!(op.format(), *format);
        }
    }

    #[rstest]
    #[case(8192, 14, -8192)]
    #[case(8191, 14, 8191)]
    #[case(0x4_0000, 19, -262_144)]
    #[case(0x3_FFFF, 19, 262_143)]
    #[case(0xFF_FFFF, 24, -1)]
    #[case(0x7F_FFFF, 24, 8_388_607)]
    fn sign_extension_boundaries(#[case] value: u32, #[case] bits: u32, #[case] expected: i32) {
        assert_eq!(sign_extend(value, bits), expected);
    }

    #[test]
    fn encoders_place_fields_at_documented_bits() {
        assert_eq!(encode_no(Opcode::Kill), 0x7B00_0000);
        assert_eq!(
            encode_r(Opcode::Add, reg(2), reg(1), reg(1)),
            0x1000_0000 | (2 << 19) | (1 << 14) | (1 << 9)
        );
        assert_eq!(encode_u(Opcode::Lui, reg(1), 0x00FF), 0x0208_07F8);
        assert_eq!(encode_j(Opcode::Jmp, 0xFFFF_FFFC), 0x30FF_FFFC);
        assert_eq!(encode_i(Opcode::Ori, reg(1), -1), 0x210F_FFFF);
        assert_eq!(encode_m(Opcode::Ldw, reg(3), reg(4), -4), 0x0419_3FFC);
    }

    #[test]
    fn privileged_opcodes_are_exactly_the_control_group() {
        let privileged: Vec<_> = OPCODE_TABLE
            .iter()
            .filter(|(op, _, _)| op.is_privileged())
            .map(|(_, name, _)| *name)
            .collect();
        assert_eq!(
            privileged,
            ["VMO", "VMB", "HLR", "STI", "CLI", "GTFS", "GTPC", "STFS", "HLT", "KILL"]
        );
        assert_eq!(Opcode::Nop.format(), InstructionFormat::No);
    }
}
