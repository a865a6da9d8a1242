use super::Cpu;
use crate::state::{AddressingMode, RunState};
use crate::MachineError;
use crate::memory::MemoryDevice;

impl Cpu {
    /// Absolute address of the interrupt vector table.
    #[must_use]
    pub const fn vector_base(&self) -> u16 {
        self.vector_base
    }

    /// Raises interrupt `value`.
    ///
    /// Nothing happens unless every bit of `value` is set in IM. Otherwise the
    /// handler address is read from `vector_base + 2 * value`, IP is saved on
    /// the stack (only when not already inside a handler, so a nested
    /// interrupt loses the outer return address) and execution continues at
    /// the handler in relative mode.
    ///
    /// # Errors
    ///
    /// Propagates vector-read and stack faults.
    pub fn handle_interrupt(&mut self, value: u16) -> Result<(), MachineError> {
        if value & self.im() != value {
            log::trace!("interrupt {value:#06x} masked");
            return Ok(());
        }
        let slot = self.vector_base.wrapping_add(value.wrapping_mul(2));
        let handler = self.memory.read_u16(slot)?;

        if !self.run_state.in_handler() {
            self.push(self.ip())?;
        }
        self.run_state = RunState::InHandler;
        self.set_ip(handler);
        self.set_mode(AddressingMode::Relative);
        log::trace!("interrupt {value:#06x} -> {handler:#06x}");
        Ok(())
    }

    /// Returns from an interrupt handler: pops IP and resumes in relative
    /// mode.
    ///
    /// # Errors
    ///
    /// Propagates stack faults.
    pub fn exit_interrupt_handler(&mut self) -> Result<(), MachineError> {
        let ip = self.pop()?;
        self.set_ip(ip);
        self.run_state = RunState::Running;
        self.set_mode(AddressingMode::Relative);
        Ok(())
    }

    /// Signals the attached device with id `id`.
    ///
    /// The device sees its communication buffer. An interrupt value it returns
    /// is raised immediately.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::UnknownDevice`] when no device has that id.
    pub fn signal_device(&mut self, id: u8) -> Result<(), MachineError> {
        let attached = self
            .devices
            .iter_mut()
            .find(|attached| attached.grant().id == id)
            .ok_or(MachineError::UnknownDevice { id })?;
        let comm = self
            .memory
            .device_named_mut(attached.comm_region())
            .ok_or(MachineError::UnknownDevice { id })?;
        let raised = attached.signal(comm);
        if let Some(value) = raised {
            log::debug!("device {id} raised interrupt {value:#06x}");
            self.handle_interrupt(value)?;
        }
        Ok(())
    }
}
