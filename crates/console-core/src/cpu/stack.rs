//! Stack and call-frame protocol.
//!
//! The stack grows downward in two-byte words through the current addressing
//! mode. `frame_bytes` counts the bytes pushed since the current frame was
//! opened by [`Cpu::push_state`].

use super::Cpu;
use crate::state::RegisterRole;
use crate::MachineError;

impl Cpu {
    /// Bytes pushed into the current call frame.
    #[must_use]
    pub const fn frame_bytes(&self) -> u16 {
        self.frame_bytes
    }

    /// Absolute address of the empty stack.
    #[must_use]
    pub const fn stack_origin(&self) -> u16 {
        self.stack_origin
    }

    /// Returns `true` when SP sits at the stack origin.
    #[must_use]
    pub fn stack_is_empty(&self) -> bool {
        self.space.to_absolute(self.sp()) == self.stack_origin
    }

    /// Pushes a word: SP moves down two bytes, then `value` is stored at SP.
    ///
    /// # Errors
    ///
    /// Propagates mapper faults; SP is left unchanged on failure.
    pub fn push(&mut self, value: u16) -> Result<(), MachineError> {
        let sp = self.sp().wrapping_sub(2);
        self.write_u16(sp, value)?;
        self.set_role(RegisterRole::StackPointer, sp);
        self.frame_bytes = self.frame_bytes.wrapping_add(2);
        Ok(())
    }

    /// Pops a word.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::StackUnderflow`] when the stack is empty, or a
    /// mapper fault.
    pub fn pop(&mut self) -> Result<u16, MachineError> {
        if self.stack_is_empty() {
            return Err(MachineError::StackUnderflow);
        }
        let sp = self.sp();
        let value = self.read_u16(sp)?;
        self.set_role(RegisterRole::StackPointer, sp.wrapping_add(2));
        self.frame_bytes = self.frame_bytes.wrapping_sub(2);
        Ok(value)
    }

    /// Opens a call frame.
    ///
    /// Pushes every register except the accumulator in declared order, then
    /// the current frame counter. FP is set to the new SP and the counter
    /// restarts at zero.
    ///
    /// # Errors
    ///
    /// Propagates stack faults.
    pub fn push_state(&mut self) -> Result<(), MachineError> {
        let saved: Vec<usize> = self.registers.frame_indices().collect();
        for index in saved {
            self.push(self.registers.read_index(index))?;
        }
        self.push(self.frame_bytes)?;
        self.set_role(RegisterRole::FramePointer, self.sp());
        self.frame_bytes = 0;
        Ok(())
    }

    /// Closes the current call frame.
    ///
    /// SP is reset to FP, the saved frame counter and registers are popped in
    /// reverse order, so FP is back at the caller's frame. The caller's
    /// argument words are then discarded: when the restored counter is
    /// non-zero the top word is an argument count and that many further words
    /// are dropped.
    ///
    /// # Errors
    ///
    /// Propagates stack faults.
    pub fn pop_state(&mut self) -> Result<(), MachineError> {
        let frame_base = self.fp();
        self.set_role(RegisterRole::StackPointer, frame_base);

        let saved_bytes = self.pop()?;
        let restored: Vec<usize> = self.registers.frame_indices().rev().collect();
        for index in restored {
            let value = self.pop()?;
            self.registers.write_index(index, value);
        }
        self.frame_bytes = saved_bytes;

        if saved_bytes != 0 {
            let arguments = self.pop()?;
            for _ in 0..arguments {
                self.pop()?;
            }
        }
        Ok(())
    }
}
