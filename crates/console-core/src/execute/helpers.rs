//! Arithmetic helpers shared by the executors.

/// Comparison used by the conditional jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    NotEqual,
    Equal,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
}

impl Condition {
    /// Evaluates `value <op> acu`.
    #[must_use]
    pub const fn holds(self, value: u16, acu: u16) -> bool {
        match self {
            Self::NotEqual => value != acu,
            Self::Equal => value == acu,
            Self::Less => value < acu,
            Self::Greater => value > acu,
            Self::LessOrEqual => value <= acu,
            Self::GreaterOrEqual => value >= acu,
        }
    }
}

/// Logical left shift; shifting by 16 or more clears the value.
#[must_use]
pub fn shift_left(value: u16, by: u16) -> u16 {
    value.checked_shl(u32::from(by)).unwrap_or(0)
}

/// Logical right shift; shifting by 16 or more clears the value.
#[must_use]
pub fn shift_right(value: u16, by: u16) -> u16 {
    value.checked_shr(u32::from(by)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{shift_left, shift_right, Condition};

    #[test]
    fn shifts_saturate_to_zero() {
        assert_eq!(shift_left(0x0001, 4), 0x0010);
        assert_eq!(shift_left(0x8001, 1), 0x0002);
        assert_eq!(shift_left(0xFFFF, 16), 0);
        assert_eq!(shift_right(0x8000, 15), 1);
        assert_eq!(shift_right(0xFFFF, 200), 0);
    }

    #[test]
    fn conditions_put_the_operand_on_the_left() {
        assert!(Condition::Less.holds(1, 2));
        assert!(!Condition::Less.holds(2, 1));
        assert!(Condition::GreaterOrEqual.holds(2, 2));
        assert!(Condition::NotEqual.holds(0, 1));
    }
}
