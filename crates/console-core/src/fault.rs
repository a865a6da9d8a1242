use thiserror::Error;

use crate::state::RegisterRole;

/// Fault classes used to group machine errors for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Address routing or device backing-store violation.
    Memory,
    /// Stack discipline violation.
    Stack,
    /// Opcode or operand could not be decoded.
    Decode,
    /// Machine was assembled with an inconsistent configuration.
    Configuration,
    /// Attached-device contract violation.
    Device,
}

/// Stable fault taxonomy for everything that can stop the machine.
///
/// Every variant is fatal to the current run. [`MachineError::UnknownInstruction`]
/// is the one case an extended executor may intercept before it propagates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MachineError {
    /// No mapped region contains the address.
    #[error("address {address:#06x} is not mapped to a memory device")]
    UnmappedAddress {
        /// Address presented to the mapper.
        address: u16,
    },
    /// A bulk slice or load would span more than one mapped region.
    #[error("range {from:#06x}..{to:#06x} crosses a memory device boundary")]
    CrossDeviceAccess {
        /// First address of the requested range.
        from: u16,
        /// Exclusive end of the requested range.
        to: u32,
    },
    /// `pop` was attempted while the stack pointer sits at its initial value.
    #[error("stack underflow")]
    StackUnderflow,
    /// No executor in the chain understands the opcode.
    #[error("unknown instruction {opcode:#04x}")]
    UnknownInstruction {
        /// Opcode byte that failed to dispatch.
        opcode: u8,
    },
    /// A register set does not name one of the five required roles.
    #[error("register set is missing the {role} register `{name}`")]
    MissingRequiredRegister {
        /// Role that is not covered.
        role: RegisterRole,
        /// Register name the role map expects.
        name: String,
    },
    /// A write reached a read-only device.
    #[error("write to read-only device `{device}` at {address:#06x}")]
    ReadOnlyViolation {
        /// Name of the rejecting device.
        device: String,
        /// Device-local address of the write.
        address: u16,
    },
    /// A device-local access fell outside the device's backing store.
    #[error("access at {address:#06x} is outside device `{device}`")]
    OutOfBounds {
        /// Name of the device.
        device: String,
        /// Device-local address of the access.
        address: u32,
    },
    /// `MEM_MODE_SET` received a mode byte that names no addressing mode.
    #[error("invalid addressing mode {0:#04x}")]
    InvalidAddressingMode(u8),
    /// `SEND_SIG` named a device id that is not attached.
    #[error("no device attached with id {id}")]
    UnknownDevice {
        /// Requested device id.
        id: u8,
    },
    /// Register lookup by name failed.
    #[error("no register named `{0}`")]
    UnknownRegister(String),
}

impl MachineError {
    /// Returns the reporting class for this error.
    #[must_use]
    pub const fn class(&self) -> FaultClass {
        match self {
            Self::UnmappedAddress { .. }
            | Self::CrossDeviceAccess { .. }
            | Self::ReadOnlyViolation { .. }
            | Self::OutOfBounds { .. } => FaultClass::Memory,
            Self::StackUnderflow => FaultClass::Stack,
            Self::UnknownInstruction { .. } | Self::InvalidAddressingMode(_) => FaultClass::Decode,
            Self::MissingRequiredRegister { .. } | Self::UnknownRegister(_) => {
                FaultClass::Configuration
            }
            Self::UnknownDevice { .. } => FaultClass::Device,
        }
    }

    /// Returns `true` when an extended executor is allowed to take over.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownInstruction { .. })
    }
}

/// A fault that aborted [`crate::Cpu::step`].
///
/// Carries the context a host needs to report a hardware-style trap: the
/// opcode at fault (absent when the opcode fetch itself failed), the
/// instruction pointer of the faulting instruction and the name of the memory
/// device that owns that address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cpu fault at ip {ip:#06x} in `{}`: {cause}", .device.as_deref().unwrap_or("unmapped memory"))]
pub struct CpuFault {
    /// Opcode being executed, when it was fetched.
    pub opcode: Option<u8>,
    /// Instruction pointer at the start of the faulting instruction.
    pub ip: u16,
    /// Name of the device that owns `ip`, when mapped.
    pub device: Option<String>,
    /// Underlying machine error.
    #[source]
    pub cause: MachineError,
}

#[cfg(test)]
mod tests {
    use super::{CpuFault, FaultClass, MachineError};
    use crate::state::RegisterRole;

    #[test]
    fn only_unknown_instruction_is_recoverable() {
        assert!(MachineError::UnknownInstruction { opcode: 0xEE }.is_recoverable());
        assert!(!MachineError::StackUnderflow.is_recoverable());
        assert!(!MachineError::UnmappedAddress { address: 0 }.is_recoverable());
        assert!(!MachineError::CrossDeviceAccess { from: 0, to: 4 }.is_recoverable());
    }

    #[test]
    fn class_mapping_matches_fault_taxonomy() {
        assert_eq!(
            MachineError::UnmappedAddress { address: 1 }.class(),
            FaultClass::Memory
        );
        assert_eq!(
            MachineError::ReadOnlyViolation {
                device: "rom".into(),
                address: 0
            }
            .class(),
            FaultClass::Memory
        );
        assert_eq!(MachineError::StackUnderflow.class(), FaultClass::Stack);
        assert_eq!(
            MachineError::UnknownInstruction { opcode: 1 }.class(),
            FaultClass::Decode
        );
        assert_eq!(
            MachineError::MissingRequiredRegister {
                role: RegisterRole::StackPointer,
                name: "sp".into()
            }
            .class(),
            FaultClass::Configuration
        );
        assert_eq!(
            MachineError::UnknownDevice { id: 3 }.class(),
            FaultClass::Device
        );
    }

    #[test]
    fn cpu_fault_message_names_device_and_cause() {
        let fault = CpuFault {
            opcode: Some(0xEE),
            ip: 0x0040,
            device: Some("Program Memory".into()),
            cause: MachineError::UnknownInstruction { opcode: 0xEE },
        };
        assert_eq!(
            fault.to_string(),
            "cpu fault at ip 0x0040 in `Program Memory`: unknown instruction 0xee"
        );

        let unmapped = CpuFault {
            opcode: None,
            ip: 0xFFF0,
            device: None,
            cause: MachineError::UnmappedAddress { address: 0xFFF0 },
        };
        assert!(unmapped.to_string().contains("unmapped memory"));
    }
}
