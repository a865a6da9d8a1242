/// One encoded operand field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum OperandKind {
    /// Register index byte.
    Register,
    /// Register index byte whose register holds an address.
    RegisterPointer,
    /// 8-bit literal.
    Literal8,
    /// 16-bit big-endian literal.
    Literal16,
    /// 16-bit big-endian memory address.
    Address,
}

impl OperandKind {
    /// Encoded width in bytes.
    #[must_use]
    pub const fn width(self) -> u8 {
        match self {
            Self::Register | Self::RegisterPointer | Self::Literal8 => 1,
            Self::Literal16 | Self::Address => 2,
        }
    }
}

/// Operand-encoding shapes of the instruction table.
///
/// Each shape fixes the operand field order and therefore the total encoded
/// instruction length, opcode byte included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum OperandShape {
    /// 16-bit literal, register.
    LitReg,
    /// Register, 16-bit literal.
    RegLit,
    /// Register, 8-bit literal.
    RegLit8,
    /// Register, register.
    RegReg,
    /// Register, address.
    RegMem,
    /// Address, register.
    MemReg,
    /// 16-bit literal, address.
    LitMem,
    /// 8-bit literal, address.
    Lit8Mem,
    /// Register holding an address, register.
    RegPtrReg,
    /// Register, register holding an address.
    RegRegPtr,
    /// 16-bit base literal, offset register, destination register.
    LitOffReg,
    /// No operands.
    NoArgs,
    /// One register.
    SingleReg,
    /// One 16-bit literal.
    SingleLit,
    /// One address.
    SingleMem,
    /// One register holding an address.
    RegPtr,
    /// One 8-bit literal.
    SingleLit8,
    /// Three registers.
    RegRegReg,
}

impl OperandShape {
    /// Every shape in table order.
    pub const ALL: [Self; 18] = [
        Self::LitReg,
        Self::RegLit,
        Self::RegLit8,
        Self::RegReg,
        Self::RegMem,
        Self::MemReg,
        Self::LitMem,
        Self::Lit8Mem,
        Self::RegPtrReg,
        Self::RegRegPtr,
        Self::LitOffReg,
        Self::NoArgs,
        Self::SingleReg,
        Self::SingleLit,
        Self::SingleMem,
        Self::RegPtr,
        Self::SingleLit8,
        Self::RegRegReg,
    ];

    /// Operand fields in encoding order.
    #[must_use]
    pub const fn operands(self) -> &'static [OperandKind] {
        use OperandKind::{Address, Literal16, Literal8, Register, RegisterPointer};
        match self {
            Self::LitReg => &[Literal16, Register],
            Self::RegLit => &[Register, Literal16],
            Self::RegLit8 => &[Register, Literal8],
            Self::RegReg => &[Register, Register],
            Self::RegMem => &[Register, Address],
            Self::MemReg => &[Address, Register],
            Self::LitMem => &[Literal16, Address],
            Self::Lit8Mem => &[Literal8, Address],
            Self::RegPtrReg => &[RegisterPointer, Register],
            Self::RegRegPtr => &[Register, RegisterPointer],
            Self::LitOffReg => &[Literal16, Register, Register],
            Self::NoArgs => &[],
            Self::SingleReg => &[Register],
            Self::SingleLit => &[Literal16],
            Self::SingleMem => &[Address],
            Self::RegPtr => &[RegisterPointer],
            Self::SingleLit8 => &[Literal8],
            Self::RegRegReg => &[Register, Register, Register],
        }
    }

    /// Total encoded length in bytes, opcode included.
    #[must_use]
    pub const fn size(self) -> u8 {
        let operands = self.operands();
        let mut total = 1;
        let mut index = 0;
        while index < operands.len() {
            total += operands[index].width();
            index += 1;
        }
        total
    }

    /// Name used in the tabular instruction source.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LitReg => "litReg",
            Self::RegLit => "regLit",
            Self::RegLit8 => "regLit8",
            Self::RegReg => "regReg",
            Self::RegMem => "regMem",
            Self::MemReg => "memReg",
            Self::LitMem => "litMem",
            Self::Lit8Mem => "lit8Mem",
            Self::RegPtrReg => "regPtrReg",
            Self::RegRegPtr => "regRegPtr",
            Self::LitOffReg => "litOffReg",
            Self::NoArgs => "noArgs",
            Self::SingleReg => "singleReg",
            Self::SingleLit => "singleLit",
            Self::SingleMem => "singleMem",
            Self::RegPtr => "regPtr",
            Self::SingleLit8 => "singleLit8",
            Self::RegRegReg => "regRegReg",
        }
    }

    /// Parses a shape name as written in the tabular instruction source.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|shape| shape.name() == name)
    }
}

impl std::fmt::Display for OperandShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::OperandShape;
    use rstest::rstest;

    #[rstest]
    #[case(OperandShape::LitReg, 4)]
    #[case(OperandShape::RegLit, 4)]
    #[case(OperandShape::RegLit8, 3)]
    #[case(OperandShape::RegReg, 3)]
    #[case(OperandShape::RegMem, 4)]
    #[case(OperandShape::MemReg, 4)]
    #[case(OperandShape::LitMem, 5)]
    #[case(OperandShape::Lit8Mem, 4)]
    #[case(OperandShape::RegPtrReg, 3)]
    #[case(OperandShape::RegRegPtr, 3)]
    #[case(OperandShape::LitOffReg, 5)]
    #[case(OperandShape::NoArgs, 1)]
    #[case(OperandShape::SingleReg, 2)]
    #[case(OperandShape::SingleLit, 3)]
    #[case(OperandShape::SingleMem, 3)]
    #[case(OperandShape::RegPtr, 2)]
    #[case(OperandShape::SingleLit8, 2)]
    #[case(OperandShape::RegRegReg, 4)]
    fn shape_sizes_are_fixed(#[case] shape: OperandShape, #[case] size: u8) {
        assert_eq!(shape.size(), size);
    }

    #[test]
    fn names_round_trip_for_every_shape() {
        for shape in OperandShape::ALL {
            assert_eq!(OperandShape::from_name(shape.name()), Some(shape));
        }
        assert_eq!(OperandShape::from_name("LitReg"), None);
        assert_eq!(OperandShape::from_name(""), None);
    }
}
