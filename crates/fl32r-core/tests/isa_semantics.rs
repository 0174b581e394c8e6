//! Instruction semantics exercised through whole programs on a bare machine.

#![allow(clippy::pedantic, clippy::nursery)]

mod support;

use fl32r_core::{
    encode_i, encode_j, encode_m, encode_no, encode_r, encode_u, Fault, Opcode, Register,
    StepOutcome, TrapCause,
};
use log as _;
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use support::{r, run, Image, HANDLER};
use thiserror as _;

#[test]
fn boot_image_composes_immediates_and_round_trips_the_stack() {
    let mut machine = Image::program(&[
        encode_u(Opcode::Lui, r(1), 0x00FF),
        encode_i(Opcode::Ori, r(1), 0xBE),
        encode_r(Opcode::Add, r(2), r(1), r(1)),
        encode_r(Opcode::Push, r(2), Register::ZERO, Register::ZERO),
        encode_r(Opcode::Pop, r(3), Register::ZERO, Register::ZERO),
        encode_no(Opcode::Kill),
    ])
    .machine();
    let sp = machine.registers().sp();

    assert!(matches!(run(&mut machine, 16), StepOutcome::Killed { .. }));
    let regs = machine.registers();
    assert_eq!(regs.get(r(1)), 0x00FF_00BE);
    assert_eq!(regs.get(r(2)), 0x01FE_017C);
    assert_eq!(regs.get(r(3)), regs.get(r(2)));
    assert_eq!(regs.sp(), sp);
}

#[test]
fn countdown_loop_branches_on_zero_flag() {
    let mut machine = Image::program(&[
        encode_u(Opcode::Lli, r(1), 5),
        encode_u(Opcode::Lli, r(2), 0),
        encode_i(Opcode::Addi, r(2), 3),
        encode_i(Opcode::Addi, r(1), -1),
        encode_j(Opcode::Jne, (-12_i32) as u32 & 0x00FF_FFFF),
        encode_no(Opcode::Kill),
    ])
    .machine();
    assert!(matches!(run(&mut machine, 64), StepOutcome::Killed { .. }));
    assert_eq!(machine.registers().get(r(2)), 15);
    assert!(machine.flags().zero);
}

#[test]
fn call_and_ret_return_past_the_call_site() {
    let mut machine = Image::program(&[
        encode_j(Opcode::Call, 8),
        encode_no(Opcode::Kill),
        encode_no(Opcode::Nop),
        encode_u(Opcode::Lli, r(1), 0x42),
        encode_no(Opcode::Ret),
    ])
    .machine();
    let sp = machine.registers().sp();
    assert!(matches!(run(&mut machine, 16), StepOutcome::Killed { .. }));
    assert_eq!(machine.registers().get(r(1)), 0x42);
    assert_eq!(machine.registers().sp(), sp);
    assert_eq!(machine.registers().pc(), 8);
}

#[rstest]
#[case(5, -3, Opcode::Jgt, true)]
#[case(-3, 5, Opcode::Jgt, false)]
#[case(-3, 5, Opcode::Jlt, true)]
#[case(4, 4, Opcode::Jge, true)]
#[case(4, 4, Opcode::Jle, true)]
#[case(4, 4, Opcode::Jne, false)]
#[case(4, 4, Opcode::Jeq, true)]
fn compare_then_branch_is_signed(
    #[case] a: i32,
    #[case] b: i32,
    #[case] jump: Opcode,
    #[case] taken: bool,
) {
    let mut machine = Image::program(&[
        encode_i(Opcode::Addi, r(1), a),
        encode_i(Opcode::Addi, r(2), b),
        encode_r(Opcode::Cmp, r(1), r(2), Register::ZERO),
        encode_j(jump, 8),
        encode_u(Opcode::Lli, r(3), 1),
        encode_no(Opcode::Kill),
        encode_u(Opcode::Lli, r(3), 2),
        encode_no(Opcode::Kill),
    ])
    .machine();
    assert!(matches!(run(&mut machine, 16), StepOutcome::Killed { .. }));
    assert_eq!(machine.registers().get(r(3)), if taken { 2 } else { 1 });
}

#[test]
fn overflow_branch_follows_add() {
    let mut machine = Image::program(&[
        encode_u(Opcode::Lui, r(1), 0x7FFF),
        encode_i(Opcode::Ori, r(1), 0xFFFF),
        encode_i(Opcode::Addi, r(1), 1),
        encode_j(Opcode::Jof, 4),
        encode_no(Opcode::Kill),
        encode_u(Opcode::Lli, r(2), 1),
        encode_no(Opcode::Kill),
    ])
    .machine();
    assert!(matches!(run(&mut machine, 16), StepOutcome::Killed { .. }));
    assert_eq!(machine.registers().get(r(1)), 0x8000_0000);
    assert_eq!(machine.registers().get(r(2)), 1);
}

#[test]
fn byte_and_word_memory_round_trip() {
    let mut machine = Image::program(&[
        encode_u(Opcode::Lui, r(1), 0xCAFE),
        encode_i(Opcode::Ori, r(1), 0xBABE),
        encode_u(Opcode::Lli, r(2), 0x800),
        encode_m(Opcode::Stw, r(1), r(2), 4),
        encode_m(Opcode::Ldb, r(3), r(2), 5),
        encode_m(Opcode::Stb, r(3), r(2), -1),
        encode_m(Opcode::Ldw, r(4), r(2), -4),
        encode_no(Opcode::Kill),
    ])
    .machine();
    assert!(matches!(run(&mut machine, 16), StepOutcome::Killed { .. }));
    assert_eq!(&machine.ram().as_slice()[0x804..0x808], &[0xCA, 0xFE, 0xBA, 0xBE]);
    assert_eq!(machine.registers().get(r(3)), 0xFE);
    assert_eq!(machine.registers().get(r(4)), 0x0000_00FE);
}

#[test]
fn zero_register_reads_zero_after_writes() {
    let mut machine = Image::program(&[
        encode_u(Opcode::Lli, Register::ZERO, 0x1234),
        encode_r(Opcode::Mov, r(1), Register::ZERO, Register::ZERO),
        encode_no(Opcode::Kill),
    ])
    .machine();
    assert!(matches!(run(&mut machine, 8), StepOutcome::Killed { .. }));
    assert_eq!(machine.registers().get(Register::ZERO), 0);
    assert_eq!(machine.registers().get(r(1)), 0);
}

#[test]
fn user_code_runs_inside_its_vmem_window() {
    let kernel = [
        encode_u(Opcode::Lli, r(1), 0x800),
        encode_u(Opcode::Lli, r(2), 0x100),
        encode_u(Opcode::Lli, r(4), 0x20),
        encode_r(Opcode::Vmb, r(2), Register::ZERO, Register::ZERO),
        encode_r(Opcode::Vmo, r(1), Register::ZERO, Register::ZERO),
    ];
    // The window takes effect on the very next fetch (virtual 0x14).
    let trampoline = [encode_r(Opcode::Hlr, r(4), Register::ZERO, Register::ZERO)];
    let user = [
        encode_u(Opcode::Lli, r(3), 7),
        encode_m(Opcode::Stw, r(3), Register::ZERO, 0x10),
        encode_j(Opcode::Int, 0),
    ];
    let handler = [
        encode_r(Opcode::Gtpc, r(5), Register::ZERO, Register::ZERO),
        encode_no(Opcode::Kill),
    ];
    let mut machine = Image::program(&kernel)
        .at(0x814, &trampoline)
        .at(0x820, &user)
        .at(HANDLER, &handler)
        .vector(11, HANDLER)
        .machine();

    assert!(matches!(run(&mut machine, 32), StepOutcome::Killed { .. }));
    assert_eq!(machine.ram().get(0x813), Ok(7));
    assert_eq!(machine.registers().get(r(5)), 0x2C);
    assert!(machine.flags().privileged);
    assert_eq!(machine.registers().get(Register::VMEM_OFFSET), 0);
}

#[test]
fn user_store_outside_window_faults() {
    let handler = [encode_no(Opcode::Kill)];
    let mut machine = Image::program(&[
        encode_u(Opcode::Lli, r(2), 0x200),
        encode_r(Opcode::Vmb, r(2), Register::ZERO, Register::ZERO),
        encode_u(Opcode::Lli, r(4), 0x10),
        encode_r(Opcode::Hlr, r(4), Register::ZERO, Register::ZERO),
        encode_m(Opcode::Stw, r(2), r(2), 0),
    ])
    .at(HANDLER, &handler)
    .vector(Fault::Memory.vector_slot(), HANDLER)
    .machine();

    let outcomes: Vec<_> = (0..5).map(|_| machine.step(true)).collect();
    assert_eq!(
        outcomes[4],
        StepOutcome::Trapped {
            cause: TrapCause::Fault(Fault::Memory),
            cycles: 9
        }
    );
    assert_eq!(machine.saved_pc(), 0x14);
    assert_eq!(machine.registers().pc(), HANDLER);
}
