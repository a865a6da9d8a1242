//! Host-facing machine assembly: configuration, the CPU builder and the
//! boot-and-run entry point.

use std::rc::Rc;

use thiserror::Error;

use crate::cpu::CpuParts;
use crate::device::{AttachedDevice, Device};
use crate::execute::{ChainedExecutor, DefaultExecutor, Executor, ExtendedExecutor};
use crate::layout::{LayoutError, SystemLayout};
use crate::memory::MemoryMapper;
use crate::microcode::ServiceRegisters;
use crate::program::{Hosting, Program};
use crate::state::{RegisterFile, RequiredRegisters, DEFAULT_REGISTER_NAMES};
use crate::{Cpu, CpuFault, InstructionSet, MachineError};

/// Default memory size: the whole 16-bit space minus the last byte.
pub const DEFAULT_MEMORY_SIZE: u32 = 0xFFFF;

/// Top-level machine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MachineConfig {
    /// Bytes of addressable memory; at most `0x10000`.
    pub memory_size: u32,
    /// Emits the layout report and a per-step register/disassembly trace.
    pub debug: bool,
    /// Waits on the breakpoint host after every instruction.
    pub step_through: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            debug: false,
            step_through: false,
        }
    }
}

/// Suspends execution on `BRK` and in step-through mode.
pub trait BreakpointHost {
    /// Blocks until execution may continue; `ip` is the current instruction
    /// pointer.
    fn wait_for_resume(&mut self, ip: u16);
}

/// Breakpoint host that never blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResumeImmediately;

impl BreakpointHost for ResumeImmediately {
    fn wait_for_resume(&mut self, _ip: u16) {}
}

/// CPU assembly failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// [`MachineBuilder::memory`] was never called.
    #[error("no memory was supplied to the machine builder")]
    NoMemory,
    /// Both a custom executor and an extended executor were supplied.
    #[error("an extended executor can only extend the default executor")]
    ExtendedCustomExecutor,
    /// Register validation or the boot sequence failed.
    #[error(transparent)]
    Machine(#[from] MachineError),
}

/// Boot failure of a whole machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootError {
    /// Address-space layout failed.
    #[error(transparent)]
    Layout(#[from] LayoutError),
    /// CPU assembly failed.
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Assembles a [`Cpu`].
pub struct MachineBuilder {
    memory: Option<MemoryMapper>,
    register_names: Vec<String>,
    required: RequiredRegisters,
    vector_base: u16,
    debug: bool,
    step_through: bool,
    instructions: Rc<InstructionSet>,
    executor: Option<Rc<dyn Executor>>,
    extension: Option<Box<dyn ExtendedExecutor>>,
    devices: Vec<AttachedDevice>,
    breakpoints: Box<dyn BreakpointHost>,
}

impl Default for MachineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineBuilder {
    /// Starts from the stock registers, instruction table and executor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory: None,
            register_names: DEFAULT_REGISTER_NAMES.iter().map(|n| (*n).to_owned()).collect(),
            required: RequiredRegisters::default(),
            vector_base: 0,
            debug: false,
            step_through: false,
            instructions: Rc::new(InstructionSet::default()),
            executor: None,
            extension: None,
            devices: Vec::new(),
            breakpoints: Box::new(ResumeImmediately),
        }
    }

    /// Address space the CPU runs against.
    #[must_use]
    pub fn memory(mut self, memory: MemoryMapper) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Custom register names and role map.
    #[must_use]
    pub fn registers<S: AsRef<str>>(mut self, names: &[S], required: RequiredRegisters) -> Self {
        self.register_names = names.iter().map(|n| n.as_ref().to_owned()).collect();
        self.required = required;
        self
    }

    /// Absolute address of the interrupt vector table.
    #[must_use]
    pub const fn interrupt_vector(mut self, address: u16) -> Self {
        self.vector_base = address;
        self
    }

    /// Enables the per-step debug trace.
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Waits on the breakpoint host after every instruction.
    #[must_use]
    pub const fn pause_after_step(mut self, pause: bool) -> Self {
        self.step_through = pause;
        self
    }

    /// Instruction table used by the default executor and the debug trace.
    #[must_use]
    pub fn instructions(mut self, instructions: Rc<InstructionSet>) -> Self {
        self.instructions = instructions;
        self
    }

    /// Instruction table the builder currently holds.
    #[must_use]
    pub fn instruction_set(&self) -> &InstructionSet {
        &self.instructions
    }

    /// Replaces the default executor.
    #[must_use]
    pub fn executor(mut self, executor: Rc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Chains an extension after the default executor.
    #[must_use]
    pub fn extended_executor(mut self, extension: Box<dyn ExtendedExecutor>) -> Self {
        self.extension = Some(extension);
        self
    }

    /// Attaches a device that already holds its grant.
    #[must_use]
    pub fn attach(mut self, device: AttachedDevice) -> Self {
        self.devices.push(device);
        self
    }

    /// Host consulted by `BRK` and step-through mode.
    #[must_use]
    pub fn breakpoint_host(mut self, host: Box<dyn BreakpointHost>) -> Self {
        self.breakpoints = host;
        self
    }

    /// Register operands for the system-service microcode.
    ///
    /// The register file is validated first so a missing role is reported
    /// as such.
    fn service_registers(&self) -> Result<ServiceRegisters, BootError> {
        RegisterFile::new(self.register_names.as_slice(), &self.required)
            .map_err(BuildError::from)?;
        Ok(ServiceRegisters::resolve(
            self.register_names.as_slice(),
            &self.required,
        )?)
    }

    /// Validates the configuration and boots the CPU.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when no memory was supplied, an extension is
    /// combined with a custom executor, the register set lacks a required
    /// role, or the boot sequence faults.
    pub fn build(self) -> Result<Cpu, BuildError> {
        let memory = self.memory.ok_or(BuildError::NoMemory)?;
        let registers = RegisterFile::new(self.register_names.as_slice(), &self.required)?;
        let executor: Rc<dyn Executor> = match (self.executor, self.extension) {
            (Some(_), Some(_)) => return Err(BuildError::ExtendedCustomExecutor),
            (Some(executor), None) => executor,
            (None, Some(extension)) => Rc::new(ChainedExecutor::new(
                DefaultExecutor::new(&self.instructions),
                extension,
            )),
            (None, None) => Rc::new(DefaultExecutor::new(&self.instructions)),
        };
        let cpu = Cpu::boot(CpuParts {
            memory,
            registers,
            vector_base: self.vector_base,
            instructions: self.instructions,
            executor,
            devices: self.devices,
            breakpoints: self.breakpoints,
            debug: self.debug,
            step_through: self.step_through,
        })?;
        Ok(cpu)
    }
}

/// A booted machine: planned address space, CPU and program.
pub struct Machine {
    cpu: Cpu,
    program: Box<dyn Program>,
    layout: SystemLayout,
}

impl Machine {
    /// Lays out memory for `program` and `devices` and boots a stock CPU.
    ///
    /// # Errors
    ///
    /// Returns [`BootError`] when layout or CPU assembly fails.
    pub fn boot(
        config: &MachineConfig,
        program: Box<dyn Program>,
        devices: Vec<Box<dyn Device>>,
    ) -> Result<Self, BootError> {
        Self::boot_with(config, program, devices, MachineBuilder::new())
    }

    /// Like [`Self::boot`], starting from a customised builder (registers,
    /// instruction table, executors, breakpoint host). Memory, devices, the
    /// vector table address and the flags in `config` are filled in here.
    ///
    /// # Errors
    ///
    /// Returns [`BootError`] when layout or CPU assembly fails.
    pub fn boot_with(
        config: &MachineConfig,
        program: Box<dyn Program>,
        devices: Vec<Box<dyn Device>>,
        builder: MachineBuilder,
    ) -> Result<Self, BootError> {
        let requests: Vec<_> = devices.iter().map(|device| device.request()).collect();
        let layout = SystemLayout::plan(config.memory_size, &requests)?;
        if config.debug {
            layout.report();
        }
        let registers = builder.service_registers()?;
        let (memory, attached) = layout.build(
            builder.instruction_set(),
            registers,
            program.as_ref(),
            devices,
        )?;

        let builder = attached
            .into_iter()
            .fold(builder.memory(memory), MachineBuilder::attach)
            .interrupt_vector(layout.vector_base())
            .debug(config.debug)
            .pause_after_step(config.step_through);
        let cpu = builder.build()?;
        Ok(Self {
            cpu,
            program,
            layout,
        })
    }

    /// Runs until halt, honouring the program's hosting model.
    ///
    /// Returns the number of instructions executed.
    ///
    /// # Errors
    ///
    /// Returns the first [`CpuFault`].
    pub fn run(&mut self) -> Result<u64, CpuFault> {
        match self.program.hosting() {
            Hosting::Inline => {
                self.program.on_start(&mut self.cpu);
                self.cpu.run()
            }
            Hosting::Forked => {
                let retired = self.cpu.run()?;
                self.program.on_exit();
                Ok(retired)
            }
        }
    }

    /// Borrows the CPU.
    #[must_use]
    pub const fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Mutably borrows the CPU.
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// The planned address-space layout.
    #[must_use]
    pub const fn layout(&self) -> &SystemLayout {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::{BuildError, MachineBuilder, MachineConfig, DEFAULT_MEMORY_SIZE};
    use crate::execute::{DefaultExecutor, ExtendedExecutor};
    use crate::memory::{MemoryMapper, Ram};
    use crate::state::{RegisterRole, RequiredRegisters};
    use crate::{Cpu, MachineError};
    use std::rc::Rc;

    struct Nothing;

    impl ExtendedExecutor for Nothing {
        fn extend(&self, _cpu: &mut Cpu, opcode: u8) -> Result<bool, MachineError> {
            Err(MachineError::UnknownInstruction { opcode })
        }
    }

    fn vectors_at_zero() -> MemoryMapper {
        // reset vector 0x0010, stack origin 0x0100
        let image = [0x00, 0x10, 0x01, 0x00];
        let mut mapper = MemoryMapper::new();
        mapper.map(
            Box::new(Ram::with_image("memory", 0x100, &image).unwrap()),
            0,
            0x100,
            false,
        );
        mapper
    }

    #[test]
    fn config_defaults() {
        let config = MachineConfig::default();
        assert_eq!(config.memory_size, DEFAULT_MEMORY_SIZE);
        assert!(!config.debug);
        assert!(!config.step_through);
    }

    #[test]
    fn build_requires_memory() {
        assert!(matches!(
            MachineBuilder::new().build(),
            Err(BuildError::NoMemory)
        ));
    }

    #[test]
    fn extension_cannot_extend_a_custom_executor() {
        let result = MachineBuilder::new()
            .memory(vectors_at_zero())
            .executor(Rc::new(DefaultExecutor::default()))
            .extended_executor(Box::new(Nothing))
            .build();
        assert!(matches!(result, Err(BuildError::ExtendedCustomExecutor)));
    }

    #[test]
    fn missing_register_role_fails_the_build() {
        let result = MachineBuilder::new()
            .memory(vectors_at_zero())
            .registers(&["ip", "acu", "sp", "fp"], RequiredRegisters::default())
            .build();
        assert!(matches!(
            result,
            Err(BuildError::Machine(MachineError::MissingRequiredRegister {
                role: RegisterRole::InterruptMask,
                ..
            }))
        ));
    }

    #[test]
    fn build_boots_from_the_vector_table() {
        let cpu = MachineBuilder::new()
            .memory(vectors_at_zero())
            .build()
            .unwrap();
        assert_eq!(cpu.ip(), 0x0010);
        assert_eq!(cpu.stack_origin(), 0x0100);
        assert_eq!(cpu.im(), 0xFFFF);
    }
}
