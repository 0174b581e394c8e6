//! Instruction execution for the FL32R ISA.
//!
//! The machine has already fetched the word and advanced PC by 4 when
//! [`Machine::execute`] runs, so every relative branch and every saved return
//! address refers to the post-fetch PC. Each handler checks its operands and
//! privilege before committing: a returned [`Fault`] leaves registers and flags
//! untouched, except for bytes a partially faulted word store already wrote.

#![allow(clippy::cast_sign_loss, clippy::cast_possible_wrap, clippy::too_many_lines)]

mod flags;
mod helpers;

pub use flags::{add_overflows, add_with_flags, sub_overflows, sub_with_flags, FlagsUpdate};
pub use helpers::{branch_target, compute_effective_address, condition_holds};

use crate::decoder::DecodedInstruction;
use crate::encoding::Opcode;
use crate::fault::Fault;
use crate::machine::Machine;
use crate::state::Register;

/// What the step loop should do after an instruction completes without a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// Fetch the next instruction.
    Continue,
    /// `INT` requested a software trap with this index.
    SoftwareInterrupt(u32),
    /// `HLT`: stop until resumed or woken by a hardware interrupt.
    Halt,
    /// `KILL`: stop the run loop permanently.
    Kill,
}

impl Machine {
    /// Executes one decoded instruction against this machine.
    ///
    /// # Errors
    ///
    /// Returns the [`Fault`] the instruction raised; the caller vectors it.
    pub(crate) fn execute(&mut self, instr: DecodedInstruction) -> Result<ExecuteOutcome, Fault> {
        let opcode = instr.opcode();
        if opcode.is_privileged() {
            self.require_privilege()?;
        }
        let (r0, r1, r2) = (instr.r0(), instr.r1(), instr.r2());

        match opcode {
            Opcode::Nop => {}

            // Data movement.
            Opcode::Mov => {
                let value = self.reg(r1)?;
                self.set_reg(r0, value)?;
            }
            Opcode::Lui => self.set_reg(r0, u32::from(instr.imm16()) << 16)?,
            Opcode::Lli => self.set_reg(r0, u32::from(instr.imm16()))?,
            Opcode::Ldw | Opcode::Ldb => {
                self.check_writable(r0)?;
                let address = compute_effective_address(self.reg(r1)?, instr.imm14());
                let value = if opcode == Opcode::Ldw {
                    self.read_word(address)?
                } else {
                    u32::from(self.read_byte(address)?)
                };
                self.set_reg(r0, value)?;
            }
            Opcode::Stw | Opcode::Stb => {
                let value = self.reg(r0)?;
                let address = compute_effective_address(self.reg(r1)?, instr.imm14());
                if opcode == Opcode::Stw {
                    self.write_word(address, value)?;
                } else {
                    self.write_byte(address, value.to_be_bytes()[3])?;
                }
            }

            // Three-register ALU.
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Umul
            | Opcode::Div
            | Opcode::Udiv
            | Opcode::Mod
            | Opcode::Umod
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Shl
            | Opcode::Shr
            | Opcode::Sra => {
                self.check_writable(r0)?;
                let (a, b) = (self.reg(r1)?, self.reg(r2)?);
                let (result, update) = alu(opcode, a, b)?;
                self.set_reg(r0, result)?;
                update.apply(&mut self.flags);
            }
            Opcode::Not => {
                let result = !self.reg(r1)?;
                self.set_reg(r0, result)?;
                FlagsUpdate::Zero(result).apply(&mut self.flags);
            }

            // Register-immediate ALU.
            Opcode::Addi
            | Opcode::Andi
            | Opcode::Ori
            | Opcode::Xori
            | Opcode::Shli
            | Opcode::Shri
            | Opcode::Srai => {
                let a = self.reg(r0)?;
                let imm = instr.imm19() as u32;
                let (result, update) = match opcode {
                    Opcode::Addi => add_with_flags(a, imm),
                    Opcode::Andi => zero_only(a & imm),
                    Opcode::Ori => zero_only(a | imm),
                    Opcode::Xori => zero_only(a ^ imm),
                    Opcode::Shli => zero_only(a << (imm & 31)),
                    Opcode::Shri => zero_only(a >> (imm & 31)),
                    _ => zero_only(((a as i32) >> (imm & 31)) as u32),
                };
                self.set_reg(r0, result)?;
                update.apply(&mut self.flags);
            }

            Opcode::Cmp => {
                let (_, update) = sub_with_flags(self.reg(r0)?, self.reg(r1)?);
                update.apply(&mut self.flags);
            }

            // Control flow.
            Opcode::Jmp
            | Opcode::Jeq
            | Opcode::Jne
            | Opcode::Jlt
            | Opcode::Jgt
            | Opcode::Jle
            | Opcode::Jge
            | Opcode::Jof
            | Opcode::Jno => {
                if condition_holds(opcode, self.flags) {
                    let target = branch_target(self.registers.pc(), instr.displacement());
                    self.registers.set_pc(target);
                }
            }
            Opcode::Call => {
                let pc = self.registers.pc();
                self.push(pc)?;
                self.registers.set_pc(branch_target(pc, instr.displacement()));
            }
            Opcode::Jr => {
                let target = self.reg(r0)?;
                self.registers.set_pc(target);
            }
            Opcode::Clr => {
                let target = self.reg(r0)?;
                self.push(self.registers.pc())?;
                self.registers.set_pc(target);
            }
            Opcode::Ret => {
                let target = self.pop()?;
                self.registers.set_pc(target);
            }
            Opcode::Int => {
                let index = instr.imm24();
                if self.vectors.software_slot(index).is_none() {
                    return Err(Fault::IllegalInstruction);
                }
                if !self.interrupts_masked {
                    return Ok(ExecuteOutcome::SoftwareInterrupt(index));
                }
            }

            // Stack.
            Opcode::Push => {
                let value = self.reg(r0)?;
                self.push(value)?;
            }
            Opcode::Pop => {
                self.check_writable(r0)?;
                let value = self.pop()?;
                self.set_reg(r0, value)?;
            }

            // Privileged.
            Opcode::Vmo => {
                let value = self.reg(r0)?;
                self.registers.set(Register::VMEM_OFFSET, value);
            }
            Opcode::Vmb => {
                let value = self.reg(r0)?;
                self.registers.set(Register::VMEM_BOUND, value);
            }
            Opcode::Hlr => {
                let target = self.reg(r0)?;
                self.flags.privileged = false;
                self.registers.set_pc(target);
            }
            Opcode::Sti => self.interrupts_masked = true,
            Opcode::Cli => self.interrupts_masked = false,
            Opcode::Gtfs => self.set_reg(r0, self.saved_flags)?,
            Opcode::Gtpc => self.set_reg(r0, self.saved_pc)?,
            Opcode::Stfs => {
                let packed = self.reg(r0)?;
                self.flags.restore(packed);
            }
            Opcode::Hlt => return Ok(ExecuteOutcome::Halt),
            Opcode::Kill => return Ok(ExecuteOutcome::Kill),
        }
        Ok(ExecuteOutcome::Continue)
    }
}

const fn zero_only(result: u32) -> (u32, FlagsUpdate) {
    (result, FlagsUpdate::Zero(result))
}

/// Result and flag update of a three-register ALU opcode.
fn alu(opcode: Opcode, a: u32, b: u32) -> Result<(u32, FlagsUpdate), Fault> {
    let zn = |result: u32| (result, FlagsUpdate::ZeroNegative(result));
    let divisor = |b: u32| if b == 0 { Err(Fault::DivideByZero) } else { Ok(b) };
    Ok(match opcode {
        Opcode::Add => add_with_flags(a, b),
        Opcode::Sub => sub_with_flags(a, b),
        Opcode::Mul => zn((a as i32).wrapping_mul(b as i32) as u32),
        Opcode::Umul => zn(a.wrapping_mul(b)),
        Opcode::Div => zn((a as i32).wrapping_div(divisor(b)? as i32) as u32),
        Opcode::Udiv => zn(a / divisor(b)?),
        Opcode::Mod => zn((a as i32).wrapping_rem(divisor(b)? as i32) as u32),
        Opcode::Umod => zn(a % divisor(b)?),
        Opcode::And => zero_only(a & b),
        Opcode::Or => zero_only(a | b),
        Opcode::Xor => zero_only(a ^ b),
        Opcode::Shl => zero_only(a << (b & 31)),
        Opcode::Shr => zero_only(a >> (b & 31)),
        Opcode::Sra => zero_only(((a as i32) >> (b & 31)) as u32),
        _ => return Err(Fault::IllegalInstruction),
    })
}
