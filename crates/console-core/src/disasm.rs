//! Instruction disassembly for the debug trace.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::memory::MemoryDevice;
use crate::InstructionSet;

/// One disassembled instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Address of the opcode byte.
    pub address: u16,
    /// Opcode byte.
    pub opcode: u8,
    /// Instruction tag, or `.byte` for an opcode the table does not define.
    pub tag: String,
    /// Assembly mnemonic.
    pub mnemonic: String,
    /// Operand bytes following the opcode.
    pub operands: Vec<u8>,
    /// Encoded length in bytes.
    pub len: u8,
}

impl fmt::Display for DisassemblyRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)?;
        if !self.operands.is_empty() {
            f.write_str(" $")?;
            for byte in &self.operands {
                write!(f, " {byte:02x}")?;
            }
        }
        Ok(())
    }
}

/// Disassembles the instruction at `address`.
///
/// Operand bytes are read according to the instruction's shape; a truncated
/// tail (unmapped or past the device) keeps the bytes that could be read.
/// Returns `None` when the opcode byte itself cannot be read.
#[must_use]
pub fn disassemble_at(
    memory: &dyn MemoryDevice,
    instructions: &InstructionSet,
    address: u16,
) -> Option<DisassemblyRow> {
    let opcode = memory.read_u8(address).ok()?;
    let Some(instruction) = instructions.by_opcode(opcode) else {
        return Some(DisassemblyRow {
            address,
            opcode,
            tag: ".byte".to_owned(),
            mnemonic: format!("{opcode:#04x}"),
            operands: Vec::new(),
            len: 1,
        });
    };

    let operands = (1..u16::from(instruction.size()))
        .map_while(|offset| memory.read_u8(address.wrapping_add(offset)).ok())
        .collect();
    Some(DisassemblyRow {
        address,
        opcode,
        tag: instruction.tag.clone(),
        mnemonic: instruction.mnemonic.clone(),
        operands,
        len: instruction.size(),
    })
}

/// Disassembles up to `count` consecutive instructions starting at `address`.
#[must_use]
pub fn disassemble_range(
    memory: &dyn MemoryDevice,
    instructions: &InstructionSet,
    address: u16,
    count: usize,
) -> Vec<DisassemblyRow> {
    let mut rows = Vec::with_capacity(count);
    let mut cursor = address;
    while rows.len() < count {
        let Some(row) = disassemble_at(memory, instructions, cursor) else {
            break;
        };
        cursor = cursor.wrapping_add(u16::from(row.len));
        rows.push(row);
    }
    rows
}
