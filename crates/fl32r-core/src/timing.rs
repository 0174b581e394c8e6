//! Approximate per-instruction cycle costs and wall-clock throttling.

use std::time::{Duration, Instant};

use crate::encoding::Opcode;

/// Instruction and dispatch forms with fixed cycle costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleCostKind {
    /// Register moves, ALU, immediates, compare and control instructions.
    Simple,
    /// Byte load or store.
    ByteMemory,
    /// Word load or store.
    WordMemory,
    /// Multiply.
    Mul,
    /// Divide or modulo.
    Div,
    /// Stack push or pop.
    Stack,
    /// Relative or register jump.
    Jump,
    /// Call, register call, return or software interrupt.
    Call,
    /// Trap entry sequence.
    TrapEntry,
}

/// Single source-of-truth cycle-cost table.
pub const CYCLE_COST_TABLE: &[(CycleCostKind, u32)] = &[
    (CycleCostKind::Simple, 1),
    (CycleCostKind::ByteMemory, 2),
    (CycleCostKind::WordMemory, 4),
    (CycleCostKind::Mul, 3),
    (CycleCostKind::Div, 8),
    (CycleCostKind::Stack, 3),
    (CycleCostKind::Jump, 2),
    (CycleCostKind::Call, 5),
    (CycleCostKind::TrapEntry, 5),
];

/// Looks up the fixed cycle cost of `kind`.
#[must_use]
pub fn cycle_cost(kind: CycleCostKind) -> u32 {
    CYCLE_COST_TABLE
        .iter()
        .find_map(|(entry, cost)| (*entry == kind).then_some(*cost))
        .unwrap_or(1)
}

/// Cost class of an opcode.
#[must_use]
pub const fn cost_kind(opcode: Opcode) -> CycleCostKind {
    match opcode {
        Opcode::Ldb | Opcode::Stb => CycleCostKind::ByteMemory,
        Opcode::Ldw | Opcode::Stw => CycleCostKind::WordMemory,
        Opcode::Mul | Opcode::Umul => CycleCostKind::Mul,
        Opcode::Div | Opcode::Udiv | Opcode::Mod | Opcode::Umod => CycleCostKind::Div,
        Opcode::Push | Opcode::Pop => CycleCostKind::Stack,
        Opcode::Jmp
        | Opcode::Jr
        | Opcode::Jeq
        | Opcode::Jne
        | Opcode::Jlt
        | Opcode::Jgt
        | Opcode::Jle
        | Opcode::Jge
        | Opcode::Jof
        | Opcode::Jno => CycleCostKind::Jump,
        Opcode::Call | Opcode::Clr | Opcode::Ret | Opcode::Int => CycleCostKind::Call,
        _ => CycleCostKind::Simple,
    }
}

/// Cycle cost of executing `opcode`.
#[must_use]
pub fn opcode_cycles(opcode: Opcode) -> u32 {
    cycle_cost(cost_kind(opcode))
}

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Busy-wait pacing to a target clock frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    hz: Option<u64>,
}

impl Throttle {
    /// Pacing for `hz`; `hz <= 0` disables throttling.
    #[must_use]
    pub fn from_frequency(hz: i64) -> Self {
        let hz = u64::try_from(hz).ok().filter(|hz| *hz > 0);
        Self { hz }
    }

    /// Returns `true` when pacing is active.
    #[must_use]
    pub const fn is_throttled(self) -> bool {
        self.hz.is_some()
    }

    /// Wall-clock budget for `cycles`: `cycles * 1e9 / hz` nanoseconds, rounded down.
    #[must_use]
    pub fn budget(self, cycles: u32) -> Duration {
        self.hz.map_or(Duration::ZERO, |hz| {
            let nanos = u128::from(cycles) * NANOS_PER_SECOND / u128::from(hz);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        })
    }

    /// Spins until `cycles` worth of wall-clock time has elapsed since `started`.
    ///
    /// Time already spent executing counts against the budget. Spinning keeps
    /// sub-microsecond cycle costs meaningful; sleeping would not.
    pub fn pace(self, cycles: u32, started: Instant) {
        let deadline = started + self.budget(cycles);
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{cost_kind, cycle_cost, opcode_cycles, CycleCostKind, Throttle, CYCLE_COST_TABLE};
    use crate::encoding::{Opcode, OPCODE_TABLE};
    use rstest::rstest;

    #[test]
    fn every_cost_kind_has_exactly_one_entry() {
        for (kind, _) in CYCLE_COST_TABLE {
            let matches = CYCLE_COST_TABLE.iter().filter(|(k, _)| k == kind).count();
            assert_eq!(matches, 1, "{kind:?}");
        }
    }

    #[rstest]
    #[case(Opcode::Nop, 1)]
    #[case(Opcode::Ldw, 4)]
    #[case(Opcode::Ldb, 2)]
    #[case(Opcode::Stw, 4)]
    #[case(Opcode::Stb, 2)]
    #[case(Opcode::Mul, 3)]
    #[case(Opcode::Div, 8)]
    #[case(Opcode::Umod, 8)]
    #[case(Opcode::Push, 3)]
    #[case(Opcode::Pop, 3)]
    #[case(Opcode::Jeq, 2)]
    #[case(Opcode::Call, 5)]
    #[case(Opcode::Ret, 5)]
    #[case(Opcode::Hlt, 1)]
    fn opcode_costs_match_table(#[case] opcode: Opcode, #[case] cycles: u32) {
        assert_eq!(opcode_cycles(opcode), cycles);
    }

    #[test]
    fn every_opcode_costs_at_least_one_cycle() {
        for (opcode, _, _) in OPCODE_TABLE {
            assert!(cycle_cost(cost_kind(*opcode)) >= 1);
        }
        assert_eq!(cycle_cost(CycleCostKind::TrapEntry), 5);
    }

    #[test]
    fn non_positive_frequency_disables_throttling() {
        assert!(!Throttle::from_frequency(0).is_throttled());
        assert!(!Throttle::from_frequency(-5).is_throttled());
        assert_eq!(Throttle::from_frequency(0).budget(100), Duration::ZERO);
    }

    #[test]
    fn budget_scales_with_cycles() {
        let throttle = Throttle::from_frequency(1_000_000);
        assert_eq!(throttle.budget(8), Duration::from_micros(8));
    }

    #[rstest]
    #[case(300_000_000, 3, Duration::from_nanos(10))]
    #[case(32_000_000, 32_000_000, Duration::from_secs(1))]
    #[case(2_000_000_000, 2_000_000, Duration::from_millis(1))]
    #[case(3, 1, Duration::from_nanos(333_333_333))]
    fn budget_is_exact_for_non_divisor_frequencies(
        #[case] hz: i64,
        #[case] cycles: u32,
        #[case] expected: Duration,
    ) {
        let throttle = Throttle::from_frequency(hz);
        assert!(throttle.is_throttled());
        assert_eq!(throttle.budget(cycles), expected);
    }

    #[test]
    fn pace_waits_until_budget_elapsed() {
        let throttle = Throttle::from_frequency(1_000);
        let started = Instant::now();
        throttle.pace(2, started);
        assert!(started.elapsed() >= Duration::from_millis(2));
    }
}
