//! Flag update behaviours for the different instruction classes.

use crate::state::Flags;

/// How an instruction updates the condition flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagsUpdate {
    /// No change.
    #[default]
    None,
    /// Zero only (bitwise and shift instructions).
    Zero(u32),
    /// Zero and negative (multiply, divide, modulo).
    ZeroNegative(u32),
    /// Zero, negative and overflow (add, subtract, compare).
    Arithmetic {
        /// Wrapped result.
        result: u32,
        /// Two's-complement overflow.
        overflow: bool,
    },
}

impl FlagsUpdate {
    /// Applies this update to `flags`.
    pub const fn apply(self, flags: &mut Flags) {
        match self {
            Self::None => {}
            Self::Zero(result) => flags.zero = result == 0,
            Self::ZeroNegative(result) => flags.set_zn(result),
            Self::Arithmetic { result, overflow } => {
                flags.set_zn(result);
                flags.overflow = overflow;
            }
        }
    }
}

/// Signed overflow of `a + b = result`: both operands share a sign the result lacks.
#[must_use]
pub const fn add_overflows(a: u32, b: u32, result: u32) -> bool {
    (a ^ result) & (b ^ result) & 0x8000_0000 != 0
}

/// Signed overflow of `a - b = result`: operand signs differ and the result's
/// sign differs from the minuend.
#[must_use]
pub const fn sub_overflows(a: u32, b: u32, result: u32) -> bool {
    (a ^ b) & (a ^ result) & 0x8000_0000 != 0
}

/// Wrapping add with its flag update.
#[must_use]
pub const fn add_with_flags(a: u32, b: u32) -> (u32, FlagsUpdate) {
    let result = a.wrapping_add(b);
    (
        result,
        FlagsUpdate::Arithmetic {
            result,
            overflow: add_overflows(a, b, result),
        },
    )
}

/// Wrapping subtract with its flag update.
#[must_use]
pub const fn sub_with_flags(a: u32, b: u32) -> (u32, FlagsUpdate) {
    let result = a.wrapping_sub(b);
    (
        result,
        FlagsUpdate::Arithmetic {
            result,
            overflow: sub_overflows(a, b, result),
        },
    )
}
