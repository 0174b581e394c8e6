//! Instruction disassembly for the FL32R ISA.
//!
//! Used for trace logging and debug views over physical memory.

use std::fmt::Write as _;

use crate::decoder::{DecodedInstruction, Decoder, Operands};
use crate::encoding::Opcode;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bytes per instruction word.
pub const INSTRUCTION_BYTES: u32 = 4;

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Address of the instruction word.
    pub address: u32,
    /// Raw big-endian instruction word.
    pub word: u32,
    /// Upper-case mnemonic, or `.word` for illegal opcodes.
    pub mnemonic: String,
    /// Formatted operands (e.g. `r1, [r2 + 4]`).
    pub operands: String,
    /// Whether the opcode byte is unassigned.
    pub is_illegal: bool,
}

impl DisassemblyRow {
    /// Disassembles one word located at `address`.
    #[must_use]
    pub fn new(address: u32, word: u32) -> Self {
        match Decoder::decode(word) {
            Ok(instr) => Self {
                address,
                word,
                mnemonic: instr.opcode().mnemonic().to_owned(),
                operands: format_operands(instr),
                is_illegal: false,
            },
            Err(_) => Self {
                address,
                word,
                mnemonic: ".word".to_owned(),
                operands: format!("{word:#010x}"),
                is_illegal: true,
            },
        }
    }

    /// Renders `MNEMONIC operands`.
    #[must_use]
    pub fn text(&self) -> String {
        if self.operands.is_empty() {
            self.mnemonic.clone()
        } else {
            format!("{} {}", self.mnemonic, self.operands)
        }
    }
}

/// Disassembles a single instruction word.
#[must_use]
pub fn disassemble(word: u32) -> String {
    DisassemblyRow::new(0, word).text()
}

fn signed_hex(value: i32) -> String {
    if value < 0 {
        format!("-{:#x}", value.unsigned_abs())
    } else {
        format!("+{value:#x}")
    }
}

fn format_operands(instr: DecodedInstruction) -> String {
    let opcode = instr.opcode();
    match instr.operands() {
        Operands::No => String::new(),
        Operands::R { r0, r1, r2 } => match opcode {
            Opcode::Mov | Opcode::Not | Opcode::Cmp => format!("{r0}, {r1}"),
            Opcode::Jr
            | Opcode::Clr
            | Opcode::Push
            | Opcode::Pop
            | Opcode::Vmo
            | Opcode::Vmb
            | Opcode::Hlr
            | Opcode::Gtfs
            | Opcode::Gtpc
            | Opcode::Stfs => r0.to_string(),
            _ => format!("{r0}, {r1}, {r2}"),
        },
        Operands::U { reg, imm16 } => format!("{reg}, {imm16:#06x}"),
        Operands::J { imm24 } => {
            if opcode == Opcode::Int {
                imm24.to_string()
            } else {
                signed_hex(instr.displacement())
            }
        }
        Operands::I { reg, imm19 } => format!("{reg}, {imm19}"),
        Operands::M { r0, r1, imm14 } => {
            let mut text = format!("{r0}, [{r1}");
            if imm14 != 0 {
                let sign = if imm14 < 0 { '-' } else { '+' };
                let _ = write!(text, " {sign} {}", imm14.unsigned_abs());
            }
            text.push(']');
            text
        }
    }
}

/// Disassembles `before` words before and `after` words after `center`.
///
/// Words that do not fit entirely inside `memory` are omitted.
#[must_use]
pub fn disassemble_window(
    center: u32,
    before: u32,
    after: u32,
    memory: &[u8],
) -> Vec<DisassemblyRow> {
    let start = center.saturating_sub(before.saturating_mul(INSTRUCTION_BYTES));
    let fits = u32::try_from(memory.len() / 4).unwrap_or(u32::MAX);
    let count = ((center - start) / INSTRUCTION_BYTES)
        .saturating_add(1)
        .saturating_add(after)
        .min(fits);
    (0..count)
        .filter_map(|i| {
            let address = start.checked_add(i.checked_mul(INSTRUCTION_BYTES)?)?;
            let at = usize::try_from(address).ok()?;
            let bytes: [u8; 4] = memory.get(at..at.checked_add(4)?)?.try_into().ok()?;
            Some(DisassemblyRow::new(address, u32::from_be_bytes(bytes)))
        })
        .collect()
}
