//! Instruction set table: opcode, tag, operand shape and mnemonic per
//! instruction.
//!
//! The table is built once at startup and handed to the CPU and executors by
//! reference. [`InstructionSet::default`] is the stock table; hosts may load a
//! replacement from its tabular text form with [`InstructionSet::parse`].

use std::collections::HashMap;

use thiserror::Error;

use crate::encoding::OperandShape;

/// One row of the instruction table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Instruction {
    /// Stable identifier the executors dispatch on (e.g. `MOV_LIT_REG`).
    pub tag: String,
    /// Encoded opcode byte.
    pub opcode: u8,
    /// Operand-encoding shape.
    pub shape: OperandShape,
    /// Assembly mnemonic.
    pub mnemonic: String,
}

impl Instruction {
    /// Encoded length in bytes, opcode included.
    #[must_use]
    pub const fn size(&self) -> u8 {
        self.shape.size()
    }
}

/// Failure while loading a tabular instruction source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstructionTableError {
    /// The source has no header row.
    #[error("instruction table is empty or missing its header row")]
    MissingHeader,
    /// A required column is absent from the header or a row.
    #[error("line {line}: missing `{column}` column")]
    MissingColumn {
        /// 1-based source line.
        line: usize,
        /// Column name.
        column: &'static str,
    },
    /// The opcode cell is not a `0xNN` byte.
    #[error("line {line}: invalid opcode `{value}`")]
    InvalidOpcode {
        /// 1-based source line.
        line: usize,
        /// Offending cell text.
        value: String,
    },
    /// The shape cell names no known operand shape.
    #[error("line {line}: unknown operand shape `{value}`")]
    UnknownShape {
        /// 1-based source line.
        line: usize,
        /// Offending cell text.
        value: String,
    },
    /// Two rows share an opcode.
    #[error("line {line}: opcode {opcode:#04x} is already assigned")]
    DuplicateOpcode {
        /// 1-based source line.
        line: usize,
        /// Repeated opcode.
        opcode: u8,
    },
    /// Two rows share a tag.
    #[error("line {line}: tag `{tag}` is already defined")]
    DuplicateTag {
        /// 1-based source line.
        line: usize,
        /// Repeated tag.
        tag: String,
    },
}

/// Opcode and tag indexed instruction table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionSet {
    instructions: Vec<Instruction>,
    by_opcode: HashMap<u8, usize>,
    by_tag: HashMap<String, usize>,
}

/// The stock table as `(tag, opcode, shape, mnemonic)` rows.
pub const DEFAULT_INSTRUCTIONS: &[(&str, u8, OperandShape, &str)] = {
    use OperandShape::{
        Lit8Mem, LitMem, LitOffReg, LitReg, MemReg, NoArgs, RegLit, RegLit8, RegMem, RegPtr,
        RegPtrReg, RegReg, RegRegPtr, SingleLit, SingleLit8, SingleMem, SingleReg,
    };
    &[
        ("HLT", 0x00, NoArgs, "hlt"),
        ("NOP", 0x01, NoArgs, "nop"),
        ("BRK", 0x02, NoArgs, "brk"),
        ("LOG_REG", 0x03, SingleReg, "log"),
        ("LOG_REG_PTR", 0x04, RegPtr, "log"),
        ("RET_INT", 0x05, NoArgs, "rti"),
        ("LOG_MEM", 0x06, SingleMem, "log"),
        ("INT_LIT", 0x07, SingleLit, "int"),
        ("INT_REG", 0x08, SingleReg, "int"),
        ("MEM_MODE_SET", 0x09, SingleLit8, "mmode"),
        ("SEND_SIG", 0x0A, SingleReg, "sig"),
        ("REAL_REG_PTR", 0x0B, RegPtrReg, "real"),
        ("MOV_LIT_REG", 0x10, LitReg, "mov"),
        ("MOV_REG_REG", 0x11, RegReg, "mov"),
        ("MOV_REG_MEM", 0x12, RegMem, "mov"),
        ("MOV_MEM_REG", 0x13, MemReg, "mov"),
        ("MOV_LIT_MEM", 0x14, LitMem, "mov"),
        ("MOV_REG_PTR_REG", 0x15, RegPtrReg, "mov"),
        ("MOV_REG_REG_PTR", 0x16, RegRegPtr, "mov"),
        ("MOV_LIT_OFF_REG", 0x17, LitOffReg, "mov"),
        ("MOV8_LIT_MEM", 0x18, Lit8Mem, "mov8"),
        ("MOV8_MEM_REG", 0x19, MemReg, "mov8"),
        ("MOVL_REG_MEM", 0x1A, RegMem, "movl"),
        ("MOVH_REG_MEM", 0x1B, RegMem, "movh"),
        ("MOV8_REG_PTR_REG", 0x1C, RegPtrReg, "mov8"),
        ("MOV8_REG_REG_PTR", 0x1D, RegRegPtr, "mov8"),
        ("ADD_REG_REG", 0x20, RegReg, "add"),
        ("ADD_LIT_REG", 0x21, LitReg, "add"),
        ("SUB_LIT_REG", 0x22, RegLit, "sub"),
        ("SUB_REG_LIT", 0x23, RegLit, "sub"),
        ("SUB_REG_REG", 0x24, RegReg, "sub"),
        ("INC_REG", 0x25, SingleReg, "inc"),
        ("DEC_REG", 0x26, SingleReg, "dec"),
        ("MUL_LIT_REG", 0x27, LitReg, "mul"),
        ("MUL_REG_REG", 0x28, RegReg, "mul"),
        ("LSF_REG_LIT", 0x30, RegLit8, "lsf"),
        ("LSF_REG_REG", 0x31, RegReg, "lsf"),
        ("RSF_REG_LIT", 0x32, RegLit8, "rsf"),
        ("RSF_REG_REG", 0x33, RegReg, "rsf"),
        ("AND_REG_LIT", 0x34, RegLit, "and"),
        ("AND_REG_REG", 0x35, RegReg, "and"),
        ("OR_REG_LIT", 0x36, RegLit, "or"),
        ("OR_REG_REG", 0x37, RegReg, "or"),
        ("XOR_REG_LIT", 0x38, RegLit, "xor"),
        ("XOR_REG_REG", 0x39, RegReg, "xor"),
        ("NOT", 0x3A, SingleReg, "not"),
        ("JMP_LIT", 0x40, SingleMem, "jmp"),
        ("JMP_REG", 0x41, SingleReg, "jmp"),
        ("JMP_NOT_EQ", 0x42, LitMem, "jne"),
        ("JNE_REG", 0x43, RegMem, "jne"),
        ("JEQ_LIT", 0x44, LitMem, "jeq"),
        ("JEQ_REG", 0x45, RegMem, "jeq"),
        ("JLT_LIT", 0x46, LitMem, "jlt"),
        ("JLT_REG", 0x47, RegMem, "jlt"),
        ("JGT_LIT", 0x48, LitMem, "jgt"),
        ("JGT_REG", 0x49, RegMem, "jgt"),
        ("JLE_LIT", 0x4A, LitMem, "jle"),
        ("JLE_REG", 0x4B, RegMem, "jle"),
        ("JGE_LIT", 0x4C, LitMem, "jge"),
        ("JGE_REG", 0x4D, RegMem, "jge"),
        ("PSH_LIT", 0x50, SingleLit, "psh"),
        ("PSH_REG", 0x51, SingleReg, "psh"),
        ("POP", 0x52, SingleReg, "pop"),
        ("CAL_LIT", 0x53, SingleMem, "cal"),
        ("CAL_REG", 0x54, SingleReg, "cal"),
        ("RET", 0x55, NoArgs, "ret"),
    ]
};

const COLUMNS: [&str; 4] = ["tag", "opcode", "type", "mnemonic"];

impl Default for InstructionSet {
    fn default() -> Self {
        let mut set = Self::empty();
        for (tag, opcode, shape, mnemonic) in DEFAULT_INSTRUCTIONS {
            set.insert(Instruction {
                tag: (*tag).to_owned(),
                opcode: *opcode,
                shape: *shape,
                mnemonic: (*mnemonic).to_owned(),
            });
        }
        set
    }
}

impl InstructionSet {
    fn empty() -> Self {
        Self {
            instructions: Vec::new(),
            by_opcode: HashMap::new(),
            by_tag: HashMap::new(),
        }
    }

    fn insert(&mut self, instruction: Instruction) {
        let index = self.instructions.len();
        self.by_opcode.insert(instruction.opcode, index);
        self.by_tag.insert(instruction.tag.clone(), index);
        self.instructions.push(instruction);
    }

    /// Parses the tabular text form.
    ///
    /// The first non-blank line is a comma-separated header naming the
    /// `tag`, `opcode`, `type` and `mnemonic` columns in any order. Each
    /// following line is one instruction with the opcode written as `0xNN`.
    /// Blank lines and lines starting with `#` are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first malformed row; see [`InstructionTableError`].
    pub fn parse(source: &str) -> Result<Self, InstructionTableError> {
        let mut lines = source
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

        let (header_line, header) = lines.next().ok_or(InstructionTableError::MissingHeader)?;
        let header: Vec<&str> = header.split(',').map(str::trim).collect();
        let mut positions = [0_usize; 4];
        for (slot, column) in positions.iter_mut().zip(COLUMNS) {
            *slot = header
                .iter()
                .position(|cell| cell.eq_ignore_ascii_case(column))
                .ok_or(InstructionTableError::MissingColumn {
                    line: header_line,
                    column,
                })?;
        }

        let mut set = Self::empty();
        for (line, row) in lines {
            let cells: Vec<&str> = row.split(',').map(str::trim).collect();
            let cell = |column: usize| {
                cells
                    .get(positions[column])
                    .copied()
                    .filter(|cell| !cell.is_empty())
                    .ok_or(InstructionTableError::MissingColumn {
                        line,
                        column: COLUMNS[column],
                    })
            };
            let tag = cell(0)?;
            let opcode_text = cell(1)?;
            let shape_text = cell(2)?;
            let mnemonic = cell(3)?;

            let opcode = parse_opcode(opcode_text).ok_or_else(|| {
                InstructionTableError::InvalidOpcode {
                    line,
                    value: opcode_text.to_owned(),
                }
            })?;
            let shape = OperandShape::from_name(shape_text).ok_or_else(|| {
                InstructionTableError::UnknownShape {
                    line,
                    value: shape_text.to_owned(),
                }
            })?;
            if set.by_opcode.contains_key(&opcode) {
                return Err(InstructionTableError::DuplicateOpcode { line, opcode });
            }
            if set.by_tag.contains_key(tag) {
                return Err(InstructionTableError::DuplicateTag {
                    line,
                    tag: tag.to_owned(),
                });
            }
            set.insert(Instruction {
                tag: tag.to_owned(),
                opcode,
                shape,
                mnemonic: mnemonic.to_owned(),
            });
        }
        Ok(set)
    }

    /// Renders the table in the text form accepted by [`Self::parse`].
    #[must_use]
    pub fn to_table(&self) -> String {
        let mut out = COLUMNS.join(",");
        out.push('\n');
        for instruction in &self.instructions {
            out.push_str(&format!(
                "{},{:#04x},{},{}\n",
                instruction.tag, instruction.opcode, instruction.shape, instruction.mnemonic
            ));
        }
        out
    }

    /// Looks up an instruction by opcode byte.
    #[must_use]
    pub fn by_opcode(&self, opcode: u8) -> Option<&Instruction> {
        self.by_opcode
            .get(&opcode)
            .map(|index| &self.instructions[*index])
    }

    /// Looks up an instruction by tag.
    #[must_use]
    pub fn by_tag(&self, tag: &str) -> Option<&Instruction> {
        self.by_tag.get(tag).map(|index| &self.instructions[*index])
    }

    /// Opcode assigned to `tag`.
    #[must_use]
    pub fn opcode(&self, tag: &str) -> Option<u8> {
        self.by_tag(tag).map(|instruction| instruction.opcode)
    }

    /// Instructions in table order.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` for a table with no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

fn parse_opcode(text: &str) -> Option<u8> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))?;
    u8::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::{InstructionSet, InstructionTableError, DEFAULT_INSTRUCTIONS};
    use crate::encoding::OperandShape;
    use rstest::rstest;

    #[test]
    fn default_table_has_unique_opcodes_and_tags() {
        let set = InstructionSet::default();
        assert_eq!(set.len(), DEFAULT_INSTRUCTIONS.len());
        for instruction in set.iter() {
            assert_eq!(set.by_opcode(instruction.opcode), Some(instruction));
            assert_eq!(set.by_tag(&instruction.tag), Some(instruction));
        }
    }

    #[test]
    fn default_table_round_trips_through_text() {
        let set = InstructionSet::default();
        assert_eq!(InstructionSet::parse(&set.to_table()).unwrap(), set);
    }

    #[test]
    fn parse_accepts_reordered_columns_comments_and_blanks() {
        let source = "\n# custom table\nmnemonic, type, opcode, tag\nhlt,noArgs,0x00,HLT\n\nmov, litReg, 0x10, MOV_LIT_REG\n";
        let set = InstructionSet::parse(source).unwrap();

        assert_eq!(set.len(), 2);
        let mov = set.by_opcode(0x10).unwrap();
        assert_eq!(mov.tag, "MOV_LIT_REG");
        assert_eq!(mov.shape, OperandShape::LitReg);
        assert_eq!(mov.size(), 4);
        assert_eq!(set.opcode("HLT"), Some(0x00));
    }

    #[rstest]
    #[case("", InstructionTableError::MissingHeader)]
    #[case(
        "tag,opcode,mnemonic\n",
        InstructionTableError::MissingColumn { line: 1, column: "type" }
    )]
    #[case(
        "tag,opcode,type,mnemonic\nHLT,0x00,noArgs\n",
        InstructionTableError::MissingColumn { line: 2, column: "mnemonic" }
    )]
    #[case(
        "tag,opcode,type,mnemonic\nHLT,00,noArgs,hlt\n",
        InstructionTableError::InvalidOpcode { line: 2, value: "00".into() }
    )]
    #[case(
        "tag,opcode,type,mnemonic\nHLT,0x100,noArgs,hlt\n",
        InstructionTableError::InvalidOpcode { line: 2, value: "0x100".into() }
    )]
    #[case(
        "tag,opcode,type,mnemonic\nHLT,0x00,none,hlt\n",
        InstructionTableError::UnknownShape { line: 2, value: "none".into() }
    )]
    #[case(
        "tag,opcode,type,mnemonic\nHLT,0x00,noArgs,hlt\nNOP,0x00,noArgs,nop\n",
        InstructionTableError::DuplicateOpcode { line: 3, opcode: 0 }
    )]
    #[case(
        "tag,opcode,type,mnemonic\nHLT,0x00,noArgs,hlt\nHLT,0x01,noArgs,hlt\n",
        InstructionTableError::DuplicateTag { line: 3, tag: "HLT".into() }
    )]
    fn malformed_tables_fail_the_load(
        #[case] source: &str,
        #[case] expected: InstructionTableError,
    ) {
        assert_eq!(InstructionSet::parse(source), Err(expected));
    }
}
