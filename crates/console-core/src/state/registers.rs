use std::fmt;

use crate::memory::{MemoryDevice, Ram};
use crate::MachineError;

/// Name of the RAM device backing the register file.
pub const REGISTER_FILE_NAME: &str = "CPU-Registers";

/// Register names of the stock machine, in encoding order.
///
/// The operand byte of a register-addressing instruction is the index into
/// this list.
pub const DEFAULT_REGISTER_NAMES: [&str; 14] = [
    "ip", "acu", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "sp", "fp", "mb", "im",
];

/// The five registers every register set must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RegisterRole {
    /// Instruction pointer.
    InstructionPointer,
    /// Accumulator; receives arithmetic and bitwise results.
    Accumulator,
    /// Stack pointer.
    StackPointer,
    /// Frame pointer.
    FramePointer,
    /// Interrupt mask.
    InterruptMask,
}

impl RegisterRole {
    /// All roles in reporting order.
    pub const ALL: [Self; 5] = [
        Self::InstructionPointer,
        Self::Accumulator,
        Self::StackPointer,
        Self::FramePointer,
        Self::InterruptMask,
    ];
}

impl fmt::Display for RegisterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InstructionPointer => "instruction pointer",
            Self::Accumulator => "accumulator",
            Self::StackPointer => "stack pointer",
            Self::FramePointer => "frame pointer",
            Self::InterruptMask => "interrupt mask",
        })
    }
}

/// Binds each [`RegisterRole`] to a register name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RequiredRegisters {
    /// Instruction pointer register name.
    pub ip: String,
    /// Accumulator register name.
    pub acu: String,
    /// Stack pointer register name.
    pub sp: String,
    /// Frame pointer register name.
    pub fp: String,
    /// Interrupt mask register name.
    pub im: String,
}

impl Default for RequiredRegisters {
    fn default() -> Self {
        Self {
            ip: "ip".into(),
            acu: "acu".into(),
            sp: "sp".into(),
            fp: "fp".into(),
            im: "im".into(),
        }
    }
}

impl RequiredRegisters {
    /// Register name bound to `role`.
    #[must_use]
    pub fn name(&self, role: RegisterRole) -> &str {
        match role {
            RegisterRole::InstructionPointer => &self.ip,
            RegisterRole::Accumulator => &self.acu,
            RegisterRole::StackPointer => &self.sp,
            RegisterRole::FramePointer => &self.fp,
            RegisterRole::InterruptMask => &self.im,
        }
    }
}

/// Ordered named 16-bit registers stored in a small RAM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    names: Vec<String>,
    memory: Ram,
    roles: [usize; 5],
}

impl RegisterFile {
    /// Builds a zeroed register file.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::MissingRequiredRegister`] for the first role
    /// whose register is not among `names`.
    pub fn new<S: AsRef<str>>(
        names: &[S],
        required: &RequiredRegisters,
    ) -> Result<Self, MachineError> {
        let names: Vec<String> = names.iter().map(|name| name.as_ref().to_owned()).collect();
        let mut roles = [0; 5];
        for (slot, role) in roles.iter_mut().zip(RegisterRole::ALL) {
            let wanted = required.name(role);
            *slot = names
                .iter()
                .position(|name| name == wanted)
                .ok_or_else(|| MachineError::MissingRequiredRegister {
                    role,
                    name: wanted.to_owned(),
                })?;
        }
        let memory = Ram::new(REGISTER_FILE_NAME, names.len() * 2);
        Ok(Self {
            names,
            memory,
            roles,
        })
    }

    /// Builds the stock register file.
    #[must_use]
    pub fn standard() -> Self {
        let names: Vec<String> = DEFAULT_REGISTER_NAMES.iter().map(|n| (*n).to_owned()).collect();
        Self {
            names,
            memory: Ram::new(REGISTER_FILE_NAME, DEFAULT_REGISTER_NAMES.len() * 2),
            roles: [0, 1, 10, 11, 13],
        }
    }

    /// Register names in declared order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of registers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` for a register file with no registers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Declared index of `role`'s register.
    #[must_use]
    pub const fn role_index(&self, role: RegisterRole) -> usize {
        self.roles[role as usize]
    }

    /// Reads the register bound to `role`.
    #[must_use]
    pub fn role(&self, role: RegisterRole) -> u16 {
        self.read_index(self.role_index(role))
    }

    /// Writes the register bound to `role`.
    pub fn set_role(&mut self, role: RegisterRole, value: u16) {
        self.write_index(self.role_index(role), value);
    }

    /// Reads the register at declared `index`.
    ///
    /// # Panics
    ///
    /// Panics when `index` is out of range.
    #[must_use]
    pub fn read_index(&self, index: usize) -> u16 {
        let bytes = self.memory.as_bytes();
        u16::from_be_bytes([bytes[index * 2], bytes[index * 2 + 1]])
    }

    /// Writes the register at declared `index`.
    ///
    /// # Panics
    ///
    /// Panics when `index` is out of range.
    pub fn write_index(&mut self, index: usize, value: u16) {
        self.memory.as_bytes_mut()[index * 2..index * 2 + 2].copy_from_slice(&value.to_be_bytes());
    }

    /// Reads the register at byte offset `offset` of the backing RAM.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::OutOfBounds`] past the last register.
    pub fn read_offset(&self, offset: u16) -> Result<u16, MachineError> {
        self.memory.read_u16(offset)
    }

    /// Writes the register at byte offset `offset` of the backing RAM.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::OutOfBounds`] past the last register.
    pub fn write_offset(&mut self, offset: u16, value: u16) -> Result<(), MachineError> {
        self.memory.write_u16(offset, value)
    }

    fn index_of(&self, name: &str) -> Result<usize, MachineError> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .ok_or_else(|| MachineError::UnknownRegister(name.to_owned()))
    }

    /// Reads a register by name.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::UnknownRegister`] when no register is called `name`.
    pub fn get(&self, name: &str) -> Result<u16, MachineError> {
        Ok(self.read_index(self.index_of(name)?))
    }

    /// Writes a register by name.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::UnknownRegister`] when no register is called `name`.
    pub fn set(&mut self, name: &str, value: u16) -> Result<(), MachineError> {
        let index = self.index_of(name)?;
        self.write_index(index, value);
        Ok(())
    }

    /// Declared indices of every register the call frame saves, in push order.
    pub fn frame_indices(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        let acu = self.role_index(RegisterRole::Accumulator);
        (0..self.names.len()).filter(move |index| *index != acu)
    }

    /// Name/value pairs in declared order.
    pub fn snapshot(&self) -> impl Iterator<Item = (&str, u16)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.as_str(), self.read_index(index)))
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::{RegisterFile, RegisterRole, RequiredRegisters, DEFAULT_REGISTER_NAMES};
    use crate::MachineError;

    #[test]
    fn standard_file_matches_role_lookup() {
        let from_names =
            RegisterFile::new(&DEFAULT_REGISTER_NAMES, &RequiredRegisters::default()).unwrap();
        assert_eq!(from_names, RegisterFile::standard());
        for role in RegisterRole::ALL {
            assert_eq!(
                from_names.role_index(role),
                RegisterFile::standard().role_index(role)
            );
        }
    }

    #[test]
    fn missing_role_is_reported() {
        let err = RegisterFile::new(&["ip", "acu", "sp", "fp"], &RequiredRegisters::default())
            .unwrap_err();
        assert_eq!(
            err,
            MachineError::MissingRequiredRegister {
                role: RegisterRole::InterruptMask,
                name: "im".into()
            }
        );
        assert_eq!(
            err.to_string(),
            "register set is missing the interrupt mask register `im`"
        );
    }

    #[test]
    fn custom_role_names_are_honoured() {
        let required = RequiredRegisters {
            ip: "pc".into(),
            ..RequiredRegisters::default()
        };
        let mut file = RegisterFile::new(&["acu", "pc", "sp", "fp", "im"], &required).unwrap();
        file.set_role(RegisterRole::InstructionPointer, 0x1234);
        assert_eq!(file.get("pc").unwrap(), 0x1234);
        assert_eq!(file.read_offset(2).unwrap(), 0x1234);
    }

    #[test]
    fn registers_are_addressed_by_doubled_index() {
        let mut file = RegisterFile::standard();
        file.write_offset(4, 0xCAFE).unwrap();
        assert_eq!(file.get("r1").unwrap(), 0xCAFE);
        assert!(file.read_offset(28).is_err());
        assert_eq!(
            file.get("r9"),
            Err(MachineError::UnknownRegister("r9".into()))
        );
    }

    #[test]
    fn frame_indices_skip_the_accumulator() {
        let file = RegisterFile::standard();
        let saved: Vec<usize> = file.frame_indices().collect();
        assert_eq!(saved.len(), DEFAULT_REGISTER_NAMES.len() - 1);
        assert!(!saved.contains(&1));
        assert_eq!(saved.first(), Some(&0));
    }
}
