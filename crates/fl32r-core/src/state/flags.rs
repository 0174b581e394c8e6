/// Packed-flags bit for zero result.
pub const FLAG_ZERO: u32 = 1 << 31;
/// Packed-flags bit for negative result.
pub const FLAG_NEGATIVE: u32 = 1 << 30;
/// Packed-flags bit for signed overflow.
pub const FLAG_OVERFLOW: u32 = 1 << 29;
/// Mask of the condition bits carried by a packed flags word.
pub const FLAG_MASK: u32 = FLAG_ZERO | FLAG_NEGATIVE | FLAG_OVERFLOW;

/// Condition flags plus the privilege flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Flags {
    /// Last result was zero.
    pub zero: bool,
    /// Last result had its sign bit set.
    pub negative: bool,
    /// Last add/sub/compare overflowed as two's complement.
    pub overflow: bool,
    /// Privileged mode.
    pub privileged: bool,
}

impl Flags {
    /// Flag state after boot or reset: conditions clear, privileged.
    #[must_use]
    pub const fn boot() -> Self {
        Self {
            zero: false,
            negative: false,
            overflow: false,
            privileged: true,
        }
    }

    /// Sets zero and negative from `result`.
    #[allow(clippy::cast_possible_wrap)]
    pub const fn set_zn(&mut self, result: u32) {
        self.zero = result == 0;
        self.negative = (result as i32) < 0;
    }

    /// Packs the condition flags into one word (Z bit 31, N bit 30, O bit 29).
    #[must_use]
    pub const fn pack(self) -> u32 {
        let mut packed = 0;
        if self.zero {
            packed |= FLAG_ZERO;
        }
        if self.negative {
            packed |= FLAG_NEGATIVE;
        }
        if self.overflow {
            packed |= FLAG_OVERFLOW;
        }
        packed
    }

    /// Restores the condition flags from a packed word; privilege is untouched.
    pub const fn restore(&mut self, packed: u32) {
        self.zero = packed & FLAG_ZERO != 0;
        self.negative = packed & FLAG_NEGATIVE != 0;
        self.overflow = packed & FLAG_OVERFLOW != 0;
    }

    /// Flags in debug order: zero, negative, overflow, privilege.
    #[must_use]
    pub const fn as_array(self) -> [bool; 4] {
        [self.zero, self.negative, self.overflow, self.privileged]
    }
}
