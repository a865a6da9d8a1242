//! System-service microcode.
//!
//! A small ROM routine implements interrupts 2, 3 and 4, which hand programs
//! the addresses of the device tables in the accumulator. The table addresses
//! are only known once layout is complete, so the routine is assembled as a
//! build step with the addresses written at fixed patch offsets.

use crate::layout::LayoutError;
use crate::memory::address_bytes;
use crate::state::{RegisterRole, RequiredRegisters};
use crate::InstructionSet;

/// Length of the assembled routine in bytes.
pub const SYSTEM_MICROCODE_LEN: u16 = 19;

/// Entry offset of interrupt 2: `acu = comm table + 2 * r1`.
pub const COMM_TABLE_ENTRY: u16 = 0;
/// Entry offset of interrupt 3: `acu = device-name table`.
pub const NAME_TABLE_ENTRY: u16 = 9;
/// Entry offset of interrupt 4: `acu = first-interrupt table`.
pub const INTERRUPT_TABLE_ENTRY: u16 = 14;

/// Offset of the comm-table literal.
pub const COMM_TABLE_PATCH: usize = 5;
/// Offset of the name-table literal.
pub const NAME_TABLE_PATCH: usize = 10;
/// Offset of the first-interrupt-table literal.
pub const INTERRUPT_TABLE_PATCH: usize = 15;

/// Register the comm-table service reads the device index from.
pub const SERVICE_ARGUMENT_REGISTER: &str = "r1";

/// Register index bytes the routine is assembled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceRegisters {
    /// Index of the accumulator, which receives every result.
    pub accumulator: u8,
    /// Index of [`SERVICE_ARGUMENT_REGISTER`].
    pub argument: u8,
}

impl Default for ServiceRegisters {
    fn default() -> Self {
        Self {
            accumulator: 1,
            argument: 2,
        }
    }
}

impl ServiceRegisters {
    /// Finds the accumulator and argument registers among `names`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::MissingRegister`] when either register is absent
    /// or declared past index 255.
    pub fn resolve<S: AsRef<str>>(
        names: &[S],
        required: &RequiredRegisters,
    ) -> Result<Self, LayoutError> {
        let index = |wanted: &str| {
            names
                .iter()
                .position(|name| name.as_ref() == wanted)
                .and_then(|index| u8::try_from(index).ok())
                .ok_or_else(|| LayoutError::MissingRegister {
                    name: wanted.to_owned(),
                })
        };
        Ok(Self {
            accumulator: index(required.name(RegisterRole::Accumulator))?,
            argument: index(SERVICE_ARGUMENT_REGISTER)?,
        })
    }
}

/// Absolute addresses of the three device lookup tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceTables {
    /// Device comm-buffer address table (one word per device).
    pub comm: u16,
    /// Device name table (one byte per device).
    pub names: u16,
    /// Device first-interrupt table (one byte per device).
    pub interrupts: u16,
}

/// Assembles the system-service routine for `tables`.
///
/// Opcodes are looked up by tag in `instructions` and register operands come
/// from `registers`, so custom tables and register files keep working as long
/// as the table defines `MUL_LIT_REG`, `ADD_LIT_REG`, `MOV_LIT_REG` and
/// `RET_INT`.
///
/// # Errors
///
/// Returns [`LayoutError::MissingInstruction`] when one of those tags is
/// absent.
pub fn assemble(
    instructions: &InstructionSet,
    registers: ServiceRegisters,
    tables: DeviceTables,
) -> Result<Box<[u8]>, LayoutError> {
    let opcode = |tag: &'static str| {
        instructions
            .opcode(tag)
            .ok_or(LayoutError::MissingInstruction { tag })
    };
    let mul = opcode("MUL_LIT_REG")?;
    let add = opcode("ADD_LIT_REG")?;
    let mov = opcode("MOV_LIT_REG")?;
    let rti = opcode("RET_INT")?;

    let ServiceRegisters {
        accumulator: acu,
        argument: r1,
    } = registers;

    let mut code = [
        mul, 0x00, 0x02, r1, //
        add, 0x00, 0x00, acu, //
        rti, //
        mov, 0x00, 0x00, acu, //
        rti, //
        mov, 0x00, 0x00, acu, //
        rti,
    ];
    for (offset, address) in [
        (COMM_TABLE_PATCH, tables.comm),
        (NAME_TABLE_PATCH, tables.names),
        (INTERRUPT_TABLE_PATCH, tables.interrupts),
    ] {
        code[offset..offset + 2].copy_from_slice(&address_bytes(address));
    }
    Ok(code.to_vec().into_boxed_slice())
}
