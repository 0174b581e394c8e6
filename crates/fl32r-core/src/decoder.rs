//! Instruction decoder for the FL32R ISA.
//!
//! Decoding only classifies the opcode byte; operand fields are extracted
//! lazily by bit-masking, since the opcode alone fixes the operand shape.

#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use crate::encoding::{
    encode_i, encode_j, encode_m, encode_no, encode_r, encode_u, sign_extend, InstructionFormat,
    Opcode, OPERAND_MASK,
};
use crate::state::Register;
use crate::Fault;

/// A classified instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DecodedInstruction {
    opcode: Opcode,
    word: u32,
}

/// Operand fields of a decoded instruction, typed by shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Operands {
    No,
    R {
        r0: Register,
        r1: Register,
        r2: Register,
    },
    U {
        reg: Register,
        imm16: u16,
    },
    J {
        imm24: u32,
    },
    I {
        reg: Register,
        imm19: i32,
    },
    M {
        r0: Register,
        r1: Register,
        imm14: i32,
    },
}

impl DecodedInstruction {
    /// Decoded opcode.
    #[must_use]
    pub const fn opcode(self) -> Opcode {
        self.opcode
    }

    /// Raw instruction word as fetched.
    #[must_use]
    pub const fn word(self) -> u32 {
        self.word
    }

    /// Register field 0 (bits 23..19).
    #[must_use]
    pub const fn r0(self) -> Register {
        Register::from_u5(self.word >> 19)
    }

    /// Register field 1 (bits 18..14).
    #[must_use]
    pub const fn r1(self) -> Register {
        Register::from_u5(self.word >> 14)
    }

    /// Register field 2 (bits 13..9).
    #[must_use]
    pub const fn r2(self) -> Register {
        Register::from_u5(self.word >> 9)
    }

    /// U-type 16-bit immediate (bits 18..3).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn imm16(self) -> u16 {
        ((self.word >> 3) & 0xFFFF) as u16
    }

    /// I-type sign-extended 19-bit immediate.
    #[must_use]
    pub const fn imm19(self) -> i32 {
        sign_extend(self.word, 19)
    }

    /// M-type sign-extended 14-bit immediate.
    #[must_use]
    pub const fn imm14(self) -> i32 {
        sign_extend(self.word, 14)
    }

    /// J-type raw 24-bit field, zero-extended.
    #[must_use]
    pub const fn imm24(self) -> u32 {
        self.word & OPERAND_MASK
    }

    /// J-type field as a sign-extended relative displacement.
    #[must_use]
    pub const fn displacement(self) -> i32 {
        sign_extend(self.word, 24)
    }

    /// Operand fields for this instruction's shape.
    #[must_use]
    pub const fn operands(self) -> Operands {
        match self.opcode.format() {
            InstructionFormat::No => Operands::No,
            InstructionFormat::R => Operands::R {
                r0: self.r0(),
                r1: self.r1(),
                r2: self.r2(),
            },
            InstructionFormat::U => Operands::U {
                reg: self.r0(),
                imm16: self.imm16(),
            },
            InstructionFormat::J => Operands::J {
                imm24: self.imm24(),
            },
            InstructionFormat::I => Operands::I {
                reg: self.r0(),
                imm19: self.imm19(),
            },
            InstructionFormat::M => Operands::M {
                r0: self.r0(),
                r1: self.r1(),
                imm14: self.imm14(),
            },
        }
    }

    /// Re-encodes the opcode and the fields of its shape; unused bits are zero.
    #[must_use]
    pub const fn encode(self) -> u32 {
        match self.operands() {
            Operands::No => encode_no(self.opcode),
            Operands::R { r0, r1, r2 } => encode_r(self.opcode, r0, r1, r2),
            Operands::U { reg, imm16 } => encode_u(self.opcode, reg, imm16),
            Operands::J { imm24 } => encode_j(self.opcode, imm24),
            Operands::I { reg, imm19 } => encode_i(self.opcode, reg, imm19),
            Operands::M { r0, r1, imm14 } => encode_m(self.opcode, r0, r1, imm14),
        }
    }
}

/// Instruction decoder for the FL32R ISA.
pub struct Decoder;

impl Decoder {
    /// Decodes a 32-bit instruction word.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::IllegalInstruction`] when the opcode byte is unassigned.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn decode(word: u32) -> Result<DecodedInstruction, Fault> {
        match Opcode::from_u8((word >> 24) as u8) {
            Some(opcode) => Ok(DecodedInstruction { opcode, word }),
            None => Err(Fault::IllegalInstruction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Decoder, Operands};
    use crate::encoding::{encode_m, encode_no, encode_r, encode_u, Opcode, OPCODE_TABLE};
    use crate::state::Register;
    use crate::Fault;

    fn reg(index: u8) -> Register {
        Register::new(index).expect("valid register index")
    }

    #[test]
    fn decode_kill_instruction() {
        let instr = Decoder::decode(0x7B00_0000).expect("should decode");
        assert_eq!(instr.opcode(), Opcode::Kill);
        assert_eq!(instr.operands(), Operands::No);
    }

    #[test]
    fn unassigned_opcodes_fault() {
        for byte in 0..=u8::MAX {
            let word = u32::from(byte) << 24;
            let assigned = OPCODE_TABLE.iter().any(|(op, _, _)| *op as u8 == byte);
            assert_eq!(
                Decoder::decode(word).is_ok(),
                assigned,
                "opcode {byte:#04x} classification"
            );
            if !assigned {
                assert_eq!(Decoder::decode(word), Err(Fault::IllegalInstruction));
            }
        }
    }

    #[test]
    fn register_fields_extract_from_documented_bits() {
        let word = encode_r(Opcode::Sub, reg(31), reg(17), reg(3));
        let instr = Decoder::decode(word).expect("should decode");
        assert_eq!(
            instr.operands(),
            Operands::R {
                r0: reg(31),
                r1: reg(17),
                r2: reg(3)
            }
        );
    }

    #[test]
    fn m_type_offset_is_sign_extended() {
        let word = encode_m(Opcode::Ldw, reg(1), reg(2), 8192);
        let instr = Decoder::decode(word).expect("should decode");
        assert_eq!(instr.imm14(), -8192);
        let word = encode_m(Opcode::Ldw, reg(1), reg(2), 8191);
        assert_eq!(Decoder::decode(word).expect("should decode").imm14(), 8191);
    }

    #[test]
    fn u_type_immediate_is_unsigned() {
        let word = encode_u(Opcode::Lli, reg(5), 0xBEEF);
        let instr = Decoder::decode(word).expect("should decode");
        assert_eq!(
            instr.operands(),
            Operands::U {
                reg: reg(5),
                imm16: 0xBEEF
            }
        );
    }

    #[test]
    fn j_type_exposes_raw_and_signed_views() {
        let instr = Decoder::decode(0x30FF_FFF8).expect("should decode");
        assert_eq!(instr.imm24(), 0x00FF_FFF8);
        assert_eq!(instr.displacement(), -8);
    }

    #[test]
    fn encode_clears_unused_bits() {
        let instr = Decoder::decode(encode_no(Opcode::Nop) | 0x1FF).expect("should decode");
        assert_eq!(instr.encode(), 0);
        let noisy = encode_r(Opcode::Add, reg(1), reg(2), reg(3)) | 0x1FF;
        let instr = Decoder::decode(noisy).expect("should decode");
        assert_eq!(instr.encode(), noisy & !0x1FF);
    }
}
