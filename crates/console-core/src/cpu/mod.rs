//! The CPU: register file, fetch cycle, addressing modes, stack discipline and
//! interrupt delivery.

mod interrupt;
mod stack;

use std::fmt::Write as _;
use std::rc::Rc;

use crate::api::BreakpointHost;
use crate::device::AttachedDevice;
use crate::disasm::disassemble_at;
use crate::execute::Executor;
use crate::memory::{MemoryDevice, MemoryMapper};
use crate::state::{AddressingMode, MemorySpace, RegisterFile, RegisterRole, RunState};
use crate::{CpuFault, InstructionSet, MachineError};

/// Everything a CPU is assembled from; produced by [`crate::MachineBuilder`].
pub(crate) struct CpuParts {
    pub(crate) memory: MemoryMapper,
    pub(crate) registers: RegisterFile,
    pub(crate) vector_base: u16,
    pub(crate) instructions: Rc<InstructionSet>,
    pub(crate) executor: Rc<dyn Executor>,
    pub(crate) devices: Vec<AttachedDevice>,
    pub(crate) breakpoints: Box<dyn BreakpointHost>,
    pub(crate) debug: bool,
    pub(crate) step_through: bool,
}

/// A 16-bit CPU bound to its address space.
pub struct Cpu {
    registers: RegisterFile,
    memory: MemoryMapper,
    space: MemorySpace,
    run_state: RunState,
    frame_bytes: u16,
    stack_origin: u16,
    vector_base: u16,
    instructions: Rc<InstructionSet>,
    executor: Rc<dyn Executor>,
    devices: Vec<AttachedDevice>,
    breakpoints: Box<dyn BreakpointHost>,
    debug: bool,
    step_through: bool,
    retired: u64,
}

impl Cpu {
    /// Resets the CPU and delivers the boot interrupt.
    ///
    /// IP and SP come from the first two vector entries, IM is set to `0xFFFF`
    /// and interrupt 0 is raised so execution starts in relative mode based at
    /// the region owning the reset vector.
    pub(crate) fn boot(parts: CpuParts) -> Result<Self, MachineError> {
        let reset_vector = parts.memory.read_u16(parts.vector_base)?;
        let stack_origin = parts.memory.read_u16(parts.vector_base.wrapping_add(2))?;

        let mut cpu = Self {
            registers: parts.registers,
            memory: parts.memory,
            space: MemorySpace::ABSOLUTE,
            run_state: RunState::Reset,
            frame_bytes: 0,
            stack_origin,
            vector_base: parts.vector_base,
            instructions: parts.instructions,
            executor: parts.executor,
            devices: parts.devices,
            breakpoints: parts.breakpoints,
            debug: parts.debug,
            step_through: parts.step_through,
            retired: 0,
        };
        cpu.set_ip(reset_vector);
        cpu.set_role(RegisterRole::StackPointer, stack_origin);
        cpu.set_role(RegisterRole::FramePointer, stack_origin);
        cpu.set_role(RegisterRole::InterruptMask, 0xFFFF);
        log::debug!("reset vector {reset_vector:#06x}, stack origin {stack_origin:#06x}");

        cpu.handle_interrupt(0)?;
        cpu.frame_bytes = 0;
        cpu.run_state = RunState::Running;
        Ok(cpu)
    }

    // Registers

    /// Borrows the register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Reads a register by name.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::UnknownRegister`] for an unknown name.
    pub fn register(&self, name: &str) -> Result<u16, MachineError> {
        self.registers.get(name)
    }

    /// Writes a register by name.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::UnknownRegister`] for an unknown name.
    pub fn set_register(&mut self, name: &str, value: u16) -> Result<(), MachineError> {
        self.registers.set(name, value)
    }

    /// Reads the register at a fetched byte offset (see
    /// [`Self::fetch_register_index`]).
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::OutOfBounds`] past the last register.
    pub fn register_at(&self, offset: u16) -> Result<u16, MachineError> {
        self.registers.read_offset(offset)
    }

    /// Writes the register at a fetched byte offset.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::OutOfBounds`] past the last register.
    pub fn set_register_at(&mut self, offset: u16, value: u16) -> Result<(), MachineError> {
        self.registers.write_offset(offset, value)
    }

    /// Reads the register bound to `role`.
    #[must_use]
    pub fn role(&self, role: RegisterRole) -> u16 {
        self.registers.role(role)
    }

    /// Writes the register bound to `role`.
    pub fn set_role(&mut self, role: RegisterRole, value: u16) {
        self.registers.set_role(role, value);
    }

    /// Instruction pointer (always absolute).
    #[must_use]
    pub fn ip(&self) -> u16 {
        self.role(RegisterRole::InstructionPointer)
    }

    /// Sets the instruction pointer to an absolute address.
    pub fn set_ip(&mut self, value: u16) {
        self.set_role(RegisterRole::InstructionPointer, value);
    }

    /// Accumulator.
    #[must_use]
    pub fn acu(&self) -> u16 {
        self.role(RegisterRole::Accumulator)
    }

    /// Sets the accumulator.
    pub fn set_acu(&mut self, value: u16) {
        self.set_role(RegisterRole::Accumulator, value);
    }

    /// Stack pointer, in the current addressing mode's coordinates.
    #[must_use]
    pub fn sp(&self) -> u16 {
        self.role(RegisterRole::StackPointer)
    }

    /// Frame pointer, in the current addressing mode's coordinates.
    #[must_use]
    pub fn fp(&self) -> u16 {
        self.role(RegisterRole::FramePointer)
    }

    /// Interrupt mask.
    #[must_use]
    pub fn im(&self) -> u16 {
        self.role(RegisterRole::InterruptMask)
    }

    // Memory

    /// Borrows the address space.
    #[must_use]
    pub const fn memory(&self) -> &MemoryMapper {
        &self.memory
    }

    /// Mutably borrows the address space (absolute addresses).
    pub fn memory_mut(&mut self) -> &mut MemoryMapper {
        &mut self.memory
    }

    /// Reads a data byte at a mode-relative address.
    ///
    /// # Errors
    ///
    /// Propagates mapper faults.
    pub fn read_u8(&self, address: u16) -> Result<u8, MachineError> {
        self.memory.read_u8(self.space.to_absolute(address))
    }

    /// Reads a data word at a mode-relative address.
    ///
    /// # Errors
    ///
    /// Propagates mapper faults.
    pub fn read_u16(&self, address: u16) -> Result<u16, MachineError> {
        self.memory.read_u16(self.space.to_absolute(address))
    }

    /// Writes a data byte at a mode-relative address.
    ///
    /// # Errors
    ///
    /// Propagates mapper faults.
    pub fn write_u8(&mut self, address: u16, value: u8) -> Result<(), MachineError> {
        let absolute = self.space.to_absolute(address);
        self.memory.write_u8(absolute, value)
    }

    /// Writes a data word at a mode-relative address.
    ///
    /// # Errors
    ///
    /// Propagates mapper faults.
    pub fn write_u16(&mut self, address: u16, value: u16) -> Result<(), MachineError> {
        let absolute = self.space.to_absolute(address);
        self.memory.write_u16(absolute, value)
    }

    // Fetch

    /// Reads the byte at IP and advances IP by one.
    ///
    /// # Errors
    ///
    /// Propagates mapper faults; IP is left unchanged on failure.
    pub fn fetch(&mut self) -> Result<u8, MachineError> {
        let value = self.peek()?;
        self.set_ip(self.ip().wrapping_add(1));
        Ok(value)
    }

    /// Reads the word at IP and advances IP by two.
    ///
    /// # Errors
    ///
    /// Propagates mapper faults; IP is left unchanged on failure.
    pub fn fetch16(&mut self) -> Result<u16, MachineError> {
        let value = self.peek16()?;
        self.set_ip(self.ip().wrapping_add(2));
        Ok(value)
    }

    /// Reads the byte at IP without advancing.
    ///
    /// # Errors
    ///
    /// Propagates mapper faults.
    pub fn peek(&self) -> Result<u8, MachineError> {
        self.memory.read_u8(self.ip())
    }

    /// Reads the word at IP without advancing.
    ///
    /// # Errors
    ///
    /// Propagates mapper faults.
    pub fn peek16(&self) -> Result<u16, MachineError> {
        self.memory.read_u16(self.ip())
    }

    /// Fetches a register index byte and returns its register-file byte
    /// offset (index times two).
    ///
    /// # Errors
    ///
    /// Propagates mapper faults.
    pub fn fetch_register_index(&mut self) -> Result<u16, MachineError> {
        Ok(u16::from(self.fetch()?) * 2)
    }

    // Addressing

    /// Active addressing mode.
    #[must_use]
    pub const fn mode(&self) -> AddressingMode {
        self.space.mode()
    }

    /// Active addressing mode and base.
    #[must_use]
    pub const fn memory_space(&self) -> MemorySpace {
        self.space
    }

    /// Switches addressing mode.
    ///
    /// The base becomes the start of the region owning IP (0 when IP is
    /// unmapped or `mode` is absolute). SP and FP are re-expressed in the new
    /// coordinates so they keep pointing at the same absolute addresses.
    pub fn set_mode(&mut self, mode: AddressingMode) {
        let base = match mode {
            AddressingMode::Absolute => 0,
            AddressingMode::Relative => self
                .memory
                .region_at(self.ip())
                .map_or(0, crate::memory::MappedRegion::start),
        };
        let old = self.space;
        let new = MemorySpace::new(mode, base);
        for role in [RegisterRole::StackPointer, RegisterRole::FramePointer] {
            let value = old.reexpress(self.role(role), new);
            self.set_role(role, value);
        }
        self.space = new;
    }

    /// Converts a mode-relative address into its absolute form.
    #[must_use]
    pub const fn real_address(&self, address: u16) -> u16 {
        self.space.to_absolute(address)
    }

    /// Jumps to a mode-relative address.
    pub fn jump_to(&mut self, address: u16) {
        self.set_ip(self.real_address(address));
    }

    // Execution

    /// Current run state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Instructions executed so far.
    #[must_use]
    pub const fn retired(&self) -> u64 {
        self.retired
    }

    /// Instruction table the CPU was built with.
    #[must_use]
    pub fn instructions(&self) -> &InstructionSet {
        &self.instructions
    }

    /// Attached devices in attach order.
    #[must_use]
    pub fn devices(&self) -> &[AttachedDevice] {
        &self.devices
    }

    /// Suspends until the breakpoint host resumes execution.
    pub fn breakpoint(&mut self) {
        let ip = self.ip();
        log::info!("breakpoint at {ip:#06x}");
        self.breakpoints.wait_for_resume(ip);
    }

    /// Fetches and executes one instruction.
    ///
    /// Returns `true` once the machine has halted. A halted CPU keeps IP on
    /// the `HLT` instruction and further calls do nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`CpuFault`] describing the opcode, IP and owning device.
    pub fn step(&mut self) -> Result<bool, CpuFault> {
        if self.run_state.is_halted() {
            return Ok(true);
        }
        let start = self.ip();
        if self.debug {
            self.trace(start);
        }

        let opcode = self.fetch().map_err(|cause| self.fault(None, start, cause))?;
        let executor = Rc::clone(&self.executor);
        let halted = executor
            .execute(self, opcode)
            .map_err(|cause| self.fault(Some(opcode), start, cause))?;
        self.retired += 1;

        if halted {
            self.set_ip(start);
            self.run_state = RunState::Halted;
            log::debug!("halted at {start:#06x} after {} instructions", self.retired);
        } else if self.step_through {
            let ip = self.ip();
            self.breakpoints.wait_for_resume(ip);
        }
        Ok(halted)
    }

    /// Steps until the machine halts.
    ///
    /// Returns the number of instructions executed by this call.
    ///
    /// # Errors
    ///
    /// Returns the first [`CpuFault`].
    pub fn run(&mut self) -> Result<u64, CpuFault> {
        let before = self.retired;
        while !self.step()? {}
        Ok(self.retired - before)
    }

    fn fault(&self, opcode: Option<u8>, ip: u16, cause: MachineError) -> CpuFault {
        let fault = CpuFault {
            opcode,
            ip,
            device: self.memory.region_at(ip).map(|region| region.name().to_owned()),
            cause,
        };
        log::error!("{fault}");
        if let Some(instruction) = opcode.and_then(|op| self.instructions.by_opcode(op)) {
            log::error!("faulting instruction: {}", instruction.tag);
        }
        log::error!("registers:\n{}", self.register_dump());
        fault
    }

    fn trace(&self, ip: u16) {
        log::debug!("{}", self.register_dump());
        let local = self
            .memory
            .region_at(ip)
            .map_or(ip, |region| ip.wrapping_sub(region.start()));
        match disassemble_at(&self.memory, &self.instructions, ip) {
            Some(row) => log::debug!("{local:#06x}: {row}"),
            None => log::debug!("{local:#06x}: <unreadable>"),
        }
    }

    /// Renders every register, four per line, followed by the addressing mode.
    #[must_use]
    pub fn register_dump(&self) -> String {
        let mut out = String::new();
        for (index, (name, value)) in self.registers.snapshot().enumerate() {
            if index > 0 && index % 4 == 0 {
                out.push('\n');
            }
            let _ = write!(out, "{name:>4}: {value:#06x}    ");
        }
        match self.mode() {
            AddressingMode::Relative => {
                let _ = write!(out, " MM: Rel to {:#06x}", self.space.base());
            }
            AddressingMode::Absolute => out.push_str(" MM: abs"),
        }
        out
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("registers", &self.registers)
            .field("space", &self.space)
            .field("run_state", &self.run_state)
            .field("frame_bytes", &self.frame_bytes)
            .field("stack_origin", &self.stack_origin)
            .field("retired", &self.retired)
            .finish_non_exhaustive()
    }
}
