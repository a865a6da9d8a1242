//! CPU state model: register file, run state and addressing mode.

/// Addressing modes and the absolute/relative translation rule.
pub mod addressing;
/// Named register file and required-role map.
pub mod registers;
/// CPU run-state machine.
pub mod run_state;

pub use addressing::{AddressingMode, MemorySpace};
pub use registers::{
    RegisterFile, RegisterRole, RequiredRegisters, DEFAULT_REGISTER_NAMES, REGISTER_FILE_NAME,
};
pub use run_state::RunState;
