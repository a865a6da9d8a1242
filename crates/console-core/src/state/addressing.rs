use num_enum::{IntoPrimitive, TryFromPrimitive};

/// How data addresses and jump targets are interpreted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum AddressingMode {
    /// Addresses are used as-is.
    #[default]
    Absolute = 0,
    /// Addresses are offset by the base of the region that owns IP.
    Relative = 1,
}

/// Active coordinate system for data addresses.
///
/// This is the only place that converts between mode-relative and absolute
/// addresses. Both directions wrap modulo 2^16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemorySpace {
    mode: AddressingMode,
    base: u16,
}

impl MemorySpace {
    /// Absolute addressing with base 0.
    pub const ABSOLUTE: Self = Self {
        mode: AddressingMode::Absolute,
        base: 0,
    };

    /// Builds a space for `mode`; the base is forced to 0 in absolute mode.
    #[must_use]
    pub const fn new(mode: AddressingMode, base: u16) -> Self {
        match mode {
            AddressingMode::Absolute => Self::ABSOLUTE,
            AddressingMode::Relative => Self { mode, base },
        }
    }

    /// Current addressing mode.
    #[must_use]
    pub const fn mode(self) -> AddressingMode {
        self.mode
    }

    /// Current memory-space base.
    #[must_use]
    pub const fn base(self) -> u16 {
        self.base
    }

    /// Converts a mode-relative address to an absolute one.
    #[must_use]
    pub const fn to_absolute(self, address: u16) -> u16 {
        address.wrapping_add(self.base)
    }

    /// Re-expresses an absolute address in this space's coordinates.
    #[must_use]
    pub const fn from_absolute(self, address: u16) -> u16 {
        address.wrapping_sub(self.base)
    }

    /// Re-expresses `address`, given in `self`'s coordinates, in `target`'s.
    #[must_use]
    pub const fn reexpress(self, address: u16, target: Self) -> u16 {
        target.from_absolute(self.to_absolute(address))
    }
}

#[cfg(test)]
mod tests {
    use super::{AddressingMode, MemorySpace};

    #[test]
    fn mode_byte_decodes_through_num_enum() {
        assert_eq!(AddressingMode::try_from(0_u8), Ok(AddressingMode::Absolute));
        assert_eq!(AddressingMode::try_from(1_u8), Ok(AddressingMode::Relative));
        assert!(AddressingMode::try_from(2_u8).is_err());
        assert_eq!(u8::from(AddressingMode::Relative), 1);
    }

    #[test]
    fn absolute_space_ignores_base() {
        let space = MemorySpace::new(AddressingMode::Absolute, 0x400);
        assert_eq!(space.base(), 0);
        assert_eq!(space.to_absolute(0x10), 0x10);
    }

    #[test]
    fn relative_space_offsets_and_wraps() {
        let space = MemorySpace::new(AddressingMode::Relative, 0x0400);
        assert_eq!(space.to_absolute(0x0010), 0x0410);
        assert_eq!(space.from_absolute(0x0410), 0x0010);
        assert_eq!(space.from_absolute(0x0000), 0xFC00);
        assert_eq!(space.reexpress(0x0010, MemorySpace::ABSOLUTE), 0x0410);
        assert_eq!(MemorySpace::ABSOLUTE.reexpress(0x0410, space), 0x0010);
    }
}
