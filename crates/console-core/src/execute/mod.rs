//! Instruction semantics.
//!
//! An [`Executor`] maps one fetched opcode onto CPU state changes. The CPU
//! owns a single executor; [`ChainedExecutor`] lets an [`ExtendedExecutor`]
//! pick up opcodes the primary executor does not know before the
//! `UnknownInstruction` fault propagates.

mod default;
mod helpers;

pub use default::{DefaultExecutor, Operation};

use crate::{Cpu, MachineError};

/// Instruction semantics for a CPU.
pub trait Executor {
    /// Executes `opcode`, whose operands follow at the CPU's instruction
    /// pointer.
    ///
    /// Returns `true` when the machine should halt.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::UnknownInstruction`] for opcodes this executor
    /// does not implement, or any fault raised while executing.
    fn execute(&self, cpu: &mut Cpu, opcode: u8) -> Result<bool, MachineError>;
}

/// Additional instruction semantics consulted for opcodes the primary
/// executor rejects.
pub trait ExtendedExecutor {
    /// Executes `opcode`; same contract as [`Executor::execute`].
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::UnknownInstruction`] when the opcode is unknown
    /// here too.
    fn extend(&self, cpu: &mut Cpu, opcode: u8) -> Result<bool, MachineError>;
}

/// Executor that falls back to an extension on unknown opcodes.
pub struct ChainedExecutor<P, E> {
    primary: P,
    extension: E,
}

impl<P: Executor, E: ExtendedExecutor> ChainedExecutor<P, E> {
    /// Chains `extension` after `primary`.
    pub const fn new(primary: P, extension: E) -> Self {
        Self { primary, extension }
    }
}

impl<P: Executor, E: ExtendedExecutor> Executor for ChainedExecutor<P, E> {
    fn execute(&self, cpu: &mut Cpu, opcode: u8) -> Result<bool, MachineError> {
        match self.primary.execute(cpu, opcode) {
            Err(error) if error.is_recoverable() => self.extension.extend(cpu, opcode),
            other => other,
        }
    }
}

impl<T: Executor + ?Sized> Executor for std::rc::Rc<T> {
    fn execute(&self, cpu: &mut Cpu, opcode: u8) -> Result<bool, MachineError> {
        (**self).execute(cpu, opcode)
    }
}

impl<T: ExtendedExecutor + ?Sized> ExtendedExecutor for std::rc::Rc<T> {
    fn extend(&self, cpu: &mut Cpu, opcode: u8) -> Result<bool, MachineError> {
        (**self).extend(cpu, opcode)
    }
}

impl<T: ExtendedExecutor + ?Sized> ExtendedExecutor for Box<T> {
    fn extend(&self, cpu: &mut Cpu, opcode: u8) -> Result<bool, MachineError> {
        (**self).extend(cpu, opcode)
    }
}
