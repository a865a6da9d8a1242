//! Core machine for the 16-bit fantasy console.

/// Memory devices and the address-space mapper.
pub mod memory;
pub use memory::{
    read_u16_be, write_u16_be, Capability, MappedRegion, MemoryDevice, MemoryMapper, Ram, Rom,
    ADDRESS_SPACE_BYTES,
};

/// Machine-wide fault taxonomy.
pub mod fault;
pub use fault::{CpuFault, FaultClass, MachineError};

/// Register file, addressing modes and run state.
pub mod state;
pub use state::{
    AddressingMode, MemorySpace, RegisterFile, RegisterRole, RequiredRegisters, RunState,
    DEFAULT_REGISTER_NAMES,
};

/// Operand shapes and their encoded widths.
pub mod encoding;
pub use encoding::{OperandKind, OperandShape};

/// Instruction table: built-in defaults and the tabular text form.
pub mod instruction_set;
pub use instruction_set::{
    Instruction, InstructionSet, InstructionTableError, DEFAULT_INSTRUCTIONS,
};

/// The CPU.
pub mod cpu;
pub use cpu::Cpu;

/// Instruction semantics and executor chaining.
pub mod execute;
pub use execute::{ChainedExecutor, DefaultExecutor, Executor, ExtendedExecutor, Operation};

/// Attached-device contract.
pub mod device;
pub use device::{AttachedDevice, Device, ResourceGrant, ResourceRequest};

/// Loadable programs.
pub mod program;
pub use program::{BinaryProgram, Hosting, Program};

/// System-service microcode assembled at boot.
pub mod microcode;
pub use microcode::{DeviceTables, ServiceRegisters, SERVICE_ARGUMENT_REGISTER};

/// Boot-time address-space layout.
pub mod layout;
pub use layout::{
    DevicePlacement, LayoutError, SystemLayout, MAX_CODE_SPACE, MAX_COMM_BUFFER,
    MAX_DEVICE_INTERRUPTS, VECTOR_TABLE_ADDRESS,
};

/// Instruction disassembly for traces.
pub mod disasm;
pub use disasm::{disassemble_at, disassemble_range, DisassemblyRow};

/// Hex dump of the address space.
pub mod dump;
pub use dump::{dump_address_space, DUMP_LINE_BYTES};

/// Host-facing configuration, builder and machine runner.
pub mod api;
pub use api::{
    BootError, BreakpointHost, BuildError, Machine, MachineBuilder, MachineConfig,
    ResumeImmediately, DEFAULT_MEMORY_SIZE,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
