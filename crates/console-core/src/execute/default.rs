//! The stock instruction semantics.

use super::helpers::{shift_left, shift_right, Condition};
use super::Executor;
use crate::state::AddressingMode;
use crate::{Cpu, InstructionSet, MachineError};

macro_rules! operations {
    ( $( $( #[doc = $doc:expr] )+ $name:ident = $tag:literal , )+ ) => {
        /// Semantic operations the default executor implements, keyed by
        /// instruction tag.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Operation {
            $(
                $( #[doc = $doc] )+
                $name,
            )+
        }

        impl Operation {
            /// Every operation.
            pub const ALL: &'static [Self] = &[
                $( Self::$name , )+
            ];

            /// Instruction tag bound to this operation.
            #[must_use]
            pub const fn tag(self) -> &'static str {
                match self {
                    $( Self::$name => $tag , )+
                }
            }

            /// Resolves an instruction tag.
            #[must_use]
            pub fn from_tag(tag: &str) -> Option<Self> {
                match tag {
                    $( $tag => Some(Self::$name) , )+
                    _ => None,
                }
            }
        }

        impl ::std::fmt::Display for Operation {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.tag())
            }
        }
    }
}

operations! {
    /// Stop the machine.
    Halt = "HLT",
    /// Do nothing.
    Nop = "NOP",
    /// Wait for the breakpoint host.
    Break = "BRK",
    /// Log a register.
    LogReg = "LOG_REG",
    /// Log the word a register points at.
    LogRegPtr = "LOG_REG_PTR",
    /// Return from an interrupt handler.
    ReturnInterrupt = "RET_INT",
    /// Log a memory word.
    LogMem = "LOG_MEM",
    /// Raise a literal interrupt.
    InterruptLit = "INT_LIT",
    /// Raise the interrupt held in a register.
    InterruptReg = "INT_REG",
    /// Switch addressing mode.
    MemModeSet = "MEM_MODE_SET",
    /// Signal the device whose id is in a register.
    SendSignal = "SEND_SIG",
    /// Convert the address in a register to its absolute form.
    RealRegPtr = "REAL_REG_PTR",
    /// `reg = lit`
    MovLitReg = "MOV_LIT_REG",
    /// `to = from`
    MovRegReg = "MOV_REG_REG",
    /// `mem16[addr] = reg`
    MovRegMem = "MOV_REG_MEM",
    /// `reg = mem16[addr]`
    MovMemReg = "MOV_MEM_REG",
    /// `mem16[addr] = lit`
    MovLitMem = "MOV_LIT_MEM",
    /// `to = mem16[from]`
    MovRegPtrReg = "MOV_REG_PTR_REG",
    /// `mem16[to] = from`
    MovRegRegPtr = "MOV_REG_REG_PTR",
    /// `to = mem16[base + offset]`
    MovLitOffReg = "MOV_LIT_OFF_REG",
    /// `mem8[addr] = lit8`
    Mov8LitMem = "MOV8_LIT_MEM",
    /// `reg = mem8[addr]`
    Mov8MemReg = "MOV8_MEM_REG",
    /// `mem8[addr] = low(reg)`
    MovLowRegMem = "MOVL_REG_MEM",
    /// `mem8[addr] = high(reg)`
    MovHighRegMem = "MOVH_REG_MEM",
    /// `to = mem8[from]`
    Mov8RegPtrReg = "MOV8_REG_PTR_REG",
    /// `mem8[to] = low(from)`
    Mov8RegRegPtr = "MOV8_REG_REG_PTR",
    /// `acu = r1 + r2`
    AddRegReg = "ADD_REG_REG",
    /// `acu = lit + reg`
    AddLitReg = "ADD_LIT_REG",
    /// `acu = reg - lit`
    SubLitReg = "SUB_LIT_REG",
    /// `acu = lit - reg`
    SubRegLit = "SUB_REG_LIT",
    /// `acu = r2 + r1`
    SubRegReg = "SUB_REG_REG",
    /// `reg += 1`
    IncReg = "INC_REG",
    /// `reg -= 1`
    DecReg = "DEC_REG",
    /// `acu = lit * reg`
    MulLitReg = "MUL_LIT_REG",
    /// `acu = r1 * r2`
    MulRegReg = "MUL_REG_REG",
    /// `reg <<= lit8`
    LsfRegLit = "LSF_REG_LIT",
    /// `r1 <<= r2`
    LsfRegReg = "LSF_REG_REG",
    /// `reg >>= lit8`
    RsfRegLit = "RSF_REG_LIT",
    /// `r1 >>= r2`
    RsfRegReg = "RSF_REG_REG",
    /// `acu = reg & lit`
    AndRegLit = "AND_REG_LIT",
    /// `acu = r1 & r2`
    AndRegReg = "AND_REG_REG",
    /// `acu = reg | lit`
    OrRegLit = "OR_REG_LIT",
    /// `acu = r1 | r2`
    OrRegReg = "OR_REG_REG",
    /// `acu = reg ^ lit`
    XorRegLit = "XOR_REG_LIT",
    /// `acu = r1 ^ r2`
    XorRegReg = "XOR_REG_REG",
    /// `acu = !reg`
    Not = "NOT",
    /// Unconditional jump to a literal address.
    JmpLit = "JMP_LIT",
    /// Unconditional jump to the address in a register.
    JmpReg = "JMP_REG",
    /// Jump if `lit != acu`.
    JneLit = "JMP_NOT_EQ",
    /// Jump if `reg != acu`.
    JneReg = "JNE_REG",
    /// Jump if `lit == acu`.
    JeqLit = "JEQ_LIT",
    /// Jump if `reg == acu`.
    JeqReg = "JEQ_REG",
    /// Jump if `lit < acu`.
    JltLit = "JLT_LIT",
    /// Jump if `reg < acu`.
    JltReg = "JLT_REG",
    /// Jump if `lit > acu`.
    JgtLit = "JGT_LIT",
    /// Jump if `reg > acu`.
    JgtReg = "JGT_REG",
    /// Jump if `lit <= acu`.
    JleLit = "JLE_LIT",
    /// Jump if `reg <= acu`.
    JleReg = "JLE_REG",
    /// Jump if `lit >= acu`.
    JgeLit = "JGE_LIT",
    /// Jump if `reg >= acu`.
    JgeReg = "JGE_REG",
    /// Push a literal.
    PushLit = "PSH_LIT",
    /// Push a register.
    PushReg = "PSH_REG",
    /// Pop into a register.
    Pop = "POP",
    /// Call a literal address.
    CallLit = "CAL_LIT",
    /// Call the address in a register.
    CallReg = "CAL_REG",
    /// Return from a call.
    Return = "RET",
}

impl Operation {
    const fn condition(self) -> Option<Condition> {
        match self {
            Self::JneLit | Self::JneReg => Some(Condition::NotEqual),
            Self::JeqLit | Self::JeqReg => Some(Condition::Equal),
            Self::JltLit | Self::JltReg => Some(Condition::Less),
            Self::JgtLit | Self::JgtReg => Some(Condition::Greater),
            Self::JleLit | Self::JleReg => Some(Condition::LessOrEqual),
            Self::JgeLit | Self::JgeReg => Some(Condition::GreaterOrEqual),
            _ => None,
        }
    }
}

/// Total opcode dispatch table built from an [`InstructionSet`].
///
/// Opcodes whose tag names no [`Operation`] are left empty and fault with
/// [`MachineError::UnknownInstruction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultExecutor {
    table: [Option<Operation>; 256],
}

impl DefaultExecutor {
    /// Builds the dispatch table for `instructions`.
    #[must_use]
    pub fn new(instructions: &InstructionSet) -> Self {
        let mut table = [None; 256];
        for instruction in instructions.iter() {
            table[usize::from(instruction.opcode)] = Operation::from_tag(&instruction.tag);
        }
        Self { table }
    }

    /// Operation dispatched for `opcode`.
    #[must_use]
    pub const fn operation(&self, opcode: u8) -> Option<Operation> {
        self.table[opcode as usize]
    }
}

impl Default for DefaultExecutor {
    fn default() -> Self {
        Self::new(&InstructionSet::default())
    }
}

impl Executor for DefaultExecutor {
    fn execute(&self, cpu: &mut Cpu, opcode: u8) -> Result<bool, MachineError> {
        let operation = self
            .operation(opcode)
            .ok_or(MachineError::UnknownInstruction { opcode })?;
        run(cpu, operation)
    }
}

/// Fetches `reg, reg` and returns both register values.
fn fetch_reg_pair(cpu: &mut Cpu) -> Result<(u16, u16), MachineError> {
    let r1 = cpu.fetch_register_index()?;
    let r2 = cpu.fetch_register_index()?;
    Ok((cpu.register_at(r1)?, cpu.register_at(r2)?))
}

/// Fetches `reg, lit16` and returns the register value and literal.
fn fetch_reg_lit(cpu: &mut Cpu) -> Result<(u16, u16), MachineError> {
    let reg = cpu.fetch_register_index()?;
    let literal = cpu.fetch16()?;
    Ok((cpu.register_at(reg)?, literal))
}

/// Fetches `lit16, reg` and returns the literal and register value.
fn fetch_lit_reg(cpu: &mut Cpu) -> Result<(u16, u16), MachineError> {
    let literal = cpu.fetch16()?;
    let reg = cpu.fetch_register_index()?;
    Ok((literal, cpu.register_at(reg)?))
}

/// Fetches the target address and jumps when `value <op> acu` holds. The
/// address is always consumed so a false condition falls through past the
/// whole instruction.
fn branch(cpu: &mut Cpu, operation: Operation, value: u16) -> Result<(), MachineError> {
    let address = cpu.fetch16()?;
    if operation
        .condition()
        .is_some_and(|condition| condition.holds(value, cpu.acu()))
    {
        cpu.jump_to(address);
    }
    Ok(())
}

#[allow(clippy::too_many_lines)]
fn run(cpu: &mut Cpu, operation: Operation) -> Result<bool, MachineError> {
    use Operation as Op;

    match operation {
        Op::Halt => return Ok(true),
        Op::Nop => {}
        Op::Break => cpu.breakpoint(),
        Op::LogReg => {
            let reg = cpu.fetch_register_index()?;
            let value = cpu.register_at(reg)?;
            log::info!("LOG: {}, {value}, {value:#06x}", reg / 2);
        }
        Op::LogRegPtr => {
            let reg = cpu.fetch_register_index()?;
            let address = cpu.register_at(reg)?;
            let value = cpu.read_u16(address)?;
            log::info!("LOG: {address}: {value} | HEX - {address:#06x}: {value:#06x}");
        }
        Op::LogMem => {
            let address = cpu.fetch16()?;
            let value = cpu.read_u16(address)?;
            log::info!("LOG: {address}: {value} | HEX - {address:#06x}: {value:#06x}");
        }
        Op::ReturnInterrupt => cpu.exit_interrupt_handler()?,
        Op::InterruptLit => {
            let value = cpu.fetch16()?;
            cpu.handle_interrupt(value)?;
        }
        Op::InterruptReg => {
            let reg = cpu.fetch_register_index()?;
            let value = cpu.register_at(reg)?;
            cpu.handle_interrupt(value)?;
        }
        Op::MemModeSet => {
            let byte = cpu.fetch()?;
            let mode = AddressingMode::try_from(byte)
                .map_err(|_| MachineError::InvalidAddressingMode(byte))?;
            cpu.set_mode(mode);
        }
        Op::SendSignal => {
            let reg = cpu.fetch_register_index()?;
            let [_, id] = cpu.register_at(reg)?.to_be_bytes();
            cpu.signal_device(id)?;
        }
        Op::RealRegPtr => {
            let from = cpu.fetch_register_index()?;
            let to = cpu.fetch_register_index()?;
            let address = cpu.register_at(from)?;
            cpu.set_register_at(to, cpu.real_address(address))?;
        }

        Op::MovLitReg => {
            let literal = cpu.fetch16()?;
            let reg = cpu.fetch_register_index()?;
            cpu.set_register_at(reg, literal)?;
        }
        Op::MovRegReg => {
            let from = cpu.fetch_register_index()?;
            let to = cpu.fetch_register_index()?;
            cpu.set_register_at(to, cpu.register_at(from)?)?;
        }
        Op::MovRegMem => {
            let from = cpu.fetch_register_index()?;
            let address = cpu.fetch16()?;
            cpu.write_u16(address, cpu.register_at(from)?)?;
        }
        Op::MovMemReg => {
            let address = cpu.fetch16()?;
            let to = cpu.fetch_register_index()?;
            cpu.set_register_at(to, cpu.read_u16(address)?)?;
        }
        Op::MovLitMem => {
            let value = cpu.fetch16()?;
            let address = cpu.fetch16()?;
            cpu.write_u16(address, value)?;
        }
        Op::MovRegPtrReg => {
            let from = cpu.fetch_register_index()?;
            let to = cpu.fetch_register_index()?;
            let pointer = cpu.register_at(from)?;
            cpu.set_register_at(to, cpu.read_u16(pointer)?)?;
        }
        Op::MovRegRegPtr => {
            let (value, pointer) = fetch_reg_pair(cpu)?;
            cpu.write_u16(pointer, value)?;
        }
        Op::MovLitOffReg => {
            let base = cpu.fetch16()?;
            let from = cpu.fetch_register_index()?;
            let to = cpu.fetch_register_index()?;
            let offset = cpu.register_at(from)?;
            cpu.set_register_at(to, cpu.read_u16(base.wrapping_add(offset))?)?;
        }
        Op::Mov8LitMem => {
            let literal = cpu.fetch()?;
            let address = cpu.fetch16()?;
            cpu.write_u8(address, literal)?;
        }
        Op::Mov8MemReg => {
            let address = cpu.fetch16()?;
            let to = cpu.fetch_register_index()?;
            cpu.set_register_at(to, u16::from(cpu.read_u8(address)?))?;
        }
        Op::MovLowRegMem | Op::MovHighRegMem => {
            let from = cpu.fetch_register_index()?;
            let address = cpu.fetch16()?;
            let [high, low] = cpu.register_at(from)?.to_be_bytes();
            let byte = if operation == Op::MovHighRegMem { high } else { low };
            cpu.write_u8(address, byte)?;
        }
        Op::Mov8RegPtrReg => {
            let from = cpu.fetch_register_index()?;
            let to = cpu.fetch_register_index()?;
            let pointer = cpu.register_at(from)?;
            cpu.set_register_at(to, u16::from(cpu.read_u8(pointer)?))?;
        }
        Op::Mov8RegRegPtr => {
            let (value, pointer) = fetch_reg_pair(cpu)?;
            let [_, low] = value.to_be_bytes();
            cpu.write_u8(pointer, low)?;
        }

        Op::AddRegReg => {
            let (a, b) = fetch_reg_pair(cpu)?;
            cpu.set_acu(a.wrapping_add(b));
        }
        Op::AddLitReg => {
            let (literal, value) = fetch_lit_reg(cpu)?;
            cpu.set_acu(literal.wrapping_add(value));
        }
        Op::SubLitReg => {
            let (value, literal) = fetch_reg_lit(cpu)?;
            cpu.set_acu(value.wrapping_sub(literal));
        }
        Op::SubRegLit => {
            let (value, literal) = fetch_reg_lit(cpu)?;
            cpu.set_acu(literal.wrapping_sub(value));
        }
        // Adds rather than subtracts; programs depend on this encoding.
        Op::SubRegReg => {
            let (a, b) = fetch_reg_pair(cpu)?;
            cpu.set_acu(b.wrapping_add(a));
        }
        Op::IncReg | Op::DecReg => {
            let reg = cpu.fetch_register_index()?;
            let value = cpu.register_at(reg)?;
            let next = if operation == Op::IncReg {
                value.wrapping_add(1)
            } else {
                value.wrapping_sub(1)
            };
            cpu.set_register_at(reg, next)?;
        }
        Op::MulLitReg => {
            let (literal, value) = fetch_lit_reg(cpu)?;
            cpu.set_acu(literal.wrapping_mul(value));
        }
        Op::MulRegReg => {
            let (a, b) = fetch_reg_pair(cpu)?;
            cpu.set_acu(a.wrapping_mul(b));
        }

        Op::LsfRegLit | Op::RsfRegLit => {
            let reg = cpu.fetch_register_index()?;
            let by = u16::from(cpu.fetch()?);
            let value = cpu.register_at(reg)?;
            let shifted = if operation == Op::LsfRegLit {
                shift_left(value, by)
            } else {
                shift_right(value, by)
            };
            cpu.set_register_at(reg, shifted)?;
        }
        Op::LsfRegReg | Op::RsfRegReg => {
            let reg = cpu.fetch_register_index()?;
            let by_reg = cpu.fetch_register_index()?;
            let value = cpu.register_at(reg)?;
            let by = cpu.register_at(by_reg)?;
            let shifted = if operation == Op::LsfRegReg {
                shift_left(value, by)
            } else {
                shift_right(value, by)
            };
            cpu.set_register_at(reg, shifted)?;
        }
        Op::AndRegLit => {
            let (value, literal) = fetch_reg_lit(cpu)?;
            cpu.set_acu(value & literal);
        }
        Op::AndRegReg => {
            let (a, b) = fetch_reg_pair(cpu)?;
            cpu.set_acu(a & b);
        }
        Op::OrRegLit => {
            let (value, literal) = fetch_reg_lit(cpu)?;
            cpu.set_acu(value | literal);
        }
        Op::OrRegReg => {
            let (a, b) = fetch_reg_pair(cpu)?;
            cpu.set_acu(a | b);
        }
        Op::XorRegLit => {
            let (value, literal) = fetch_reg_lit(cpu)?;
            cpu.set_acu(value ^ literal);
        }
        Op::XorRegReg => {
            let (a, b) = fetch_reg_pair(cpu)?;
            cpu.set_acu(a ^ b);
        }
        Op::Not => {
            let reg = cpu.fetch_register_index()?;
            cpu.set_acu(!cpu.register_at(reg)?);
        }

        Op::JmpLit => {
            let address = cpu.fetch16()?;
            cpu.jump_to(address);
        }
        Op::JmpReg => {
            let reg = cpu.fetch_register_index()?;
            let address = cpu.register_at(reg)?;
            cpu.jump_to(address);
        }

        Op::PushLit => {
            let value = cpu.fetch16()?;
            cpu.push(value)?;
        }
        Op::PushReg => {
            let reg = cpu.fetch_register_index()?;
            cpu.push(cpu.register_at(reg)?)?;
        }
        Op::Pop => {
            let reg = cpu.fetch_register_index()?;
            let value = cpu.pop()?;
            cpu.set_register_at(reg, value)?;
        }
        Op::CallLit => {
            let address = cpu.fetch16()?;
            cpu.push_state()?;
            cpu.jump_to(address);
        }
        Op::CallReg => {
            let reg = cpu.fetch_register_index()?;
            let address = cpu.register_at(reg)?;
            cpu.push_state()?;
            cpu.jump_to(address);
        }
        Op::Return => cpu.pop_state()?,

        Op::JneLit | Op::JeqLit | Op::JltLit | Op::JgtLit | Op::JleLit | Op::JgeLit => {
            let value = cpu.fetch16()?;
            branch(cpu, operation, value)?;
        }
        Op::JneReg | Op::JeqReg | Op::JltReg | Op::JgtReg | Op::JleReg | Op::JgeReg => {
            let reg = cpu.fetch_register_index()?;
            let value = cpu.register_at(reg)?;
            branch(cpu, operation, value)?;
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::{DefaultExecutor, Operation};
    use crate::InstructionSet;

    #[test]
    fn every_default_instruction_has_an_operation() {
        let set = InstructionSet::default();
        let executor = DefaultExecutor::new(&set);
        for instruction in set.iter() {
            let operation = executor.operation(instruction.opcode).unwrap();
            assert_eq!(operation.tag(), instruction.tag);
        }
        assert_eq!(Operation::ALL.len(), set.len());
    }

    #[test]
    fn unknown_tags_leave_the_slot_empty() {
        let set = InstructionSet::parse("tag,opcode,type,mnemonic\nFANCY,0x99,noArgs,fancy\n")
            .unwrap();
        let executor = DefaultExecutor::new(&set);
        assert_eq!(executor.operation(0x99), None);
        assert_eq!(executor.operation(0x00), None);
    }

    #[test]
    fn tags_round_trip() {
        for operation in Operation::ALL {
            assert_eq!(Operation::from_tag(operation.tag()), Some(*operation));
            assert_eq!(operation.to_string(), operation.tag());
        }
        assert_eq!(Operation::from_tag("MOV_BLOCK"), None);
    }
}
