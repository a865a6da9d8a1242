//! Stack, call-frame, interrupt-mask and addressing-mode properties.

#![allow(clippy::pedantic, clippy::nursery)]

use console_core::{
    AddressingMode, Cpu, MachineBuilder, MachineError, MemoryDevice, MemoryMapper, Ram,
    RegisterRole, RunState,
};
use log as _;
use num_enum as _;
use proptest::prelude::*;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

const RESET_VECTOR: u16 = 0x0100;
const STACK_ORIGIN: u16 = 0x0800;

/// A CPU over one 64 KiB RAM, vector table at 0.
fn flat_cpu() -> Cpu {
    let mut image = vec![0; 4];
    image[..2].copy_from_slice(&RESET_VECTOR.to_be_bytes());
    image[2..].copy_from_slice(&STACK_ORIGIN.to_be_bytes());
    let mut mapper = MemoryMapper::new();
    mapper.map(
        Box::new(Ram::with_image("memory", 0x10000, &image).unwrap()),
        0,
        0x10000,
        false,
    );
    MachineBuilder::new().memory(mapper).build().unwrap()
}

/// A CPU whose program region starts at 0x0100, so relative mode has a
/// non-zero base.
fn split_cpu() -> Cpu {
    let mut vectors = vec![0; 4];
    vectors[..2].copy_from_slice(&RESET_VECTOR.to_be_bytes());
    vectors[2..].copy_from_slice(&STACK_ORIGIN.to_be_bytes());
    let mut mapper = MemoryMapper::new();
    mapper.map(
        Box::new(Ram::with_image("vectors", 0x100, &vectors).unwrap()),
        0,
        0x100,
        false,
    );
    mapper.map(Box::new(Ram::new("program", 0xF00)), 0x100, 0xF00, true);
    MachineBuilder::new().memory(mapper).build().unwrap()
}

fn registers_of(cpu: &Cpu) -> Vec<u16> {
    cpu.registers().snapshot().map(|(_, value)| value).collect()
}

#[test]
fn boot_saves_the_reset_ip_and_starts_relative() {
    let cpu = split_cpu();
    assert_eq!(cpu.ip(), RESET_VECTOR);
    assert_eq!(cpu.mode(), AddressingMode::Relative);
    assert_eq!(cpu.memory_space().base(), 0x100);
    assert_eq!(cpu.run_state(), RunState::Running);
    assert_eq!(cpu.frame_bytes(), 0);
    // SP is expressed relative to the program region
    assert_eq!(cpu.real_address(cpu.sp()), STACK_ORIGIN - 2);
    assert_eq!(cpu.memory().read_u16(STACK_ORIGIN - 2), Ok(RESET_VECTOR));
}

#[test]
fn popping_the_empty_stack_underflows() {
    let mut cpu = flat_cpu();
    assert_eq!(cpu.pop(), Ok(RESET_VECTOR));
    assert!(cpu.stack_is_empty());
    assert_eq!(cpu.pop(), Err(MachineError::StackUnderflow));
}

#[rstest]
#[case(AddressingMode::Absolute)]
#[case(AddressingMode::Relative)]
fn stack_words_land_below_sp(#[case] mode: AddressingMode) {
    let mut cpu = split_cpu();
    cpu.set_mode(mode);
    let sp = cpu.real_address(cpu.sp());

    cpu.push(0xBEEF).unwrap();

    assert_eq!(cpu.real_address(cpu.sp()), sp - 2);
    assert_eq!(cpu.memory().read_u16(sp - 2), Ok(0xBEEF));
    assert_eq!(cpu.frame_bytes(), 2);
}

#[test]
fn call_frame_discards_caller_arguments() {
    let mut cpu = flat_cpu();
    let sp = cpu.sp();
    cpu.push(11).unwrap();
    cpu.push(22).unwrap();
    cpu.push(2).unwrap();

    cpu.push_state().unwrap();
    assert_eq!(cpu.fp(), cpu.sp());
    assert_eq!(cpu.frame_bytes(), 0);
    cpu.pop_state().unwrap();

    assert_eq!(cpu.sp(), sp);
    assert_eq!(cpu.frame_bytes(), 0);
}

#[test]
fn nested_interrupt_keeps_the_outer_return_address() {
    let mut cpu = flat_cpu();
    let memory = cpu.memory_mut();
    memory.write_u16(10, 0x0200).unwrap(); // vector 5
    memory.write_u16(12, 0x0300).unwrap(); // vector 6
    memory.load(&[0x07, 0x00, 0x05, 0x00], RESET_VECTOR).unwrap(); // int $5; hlt
    memory.load(&[0x07, 0x00, 0x06], 0x0200).unwrap(); // int $6
    memory.load(&[0x05], 0x0300).unwrap(); // rti

    assert_eq!(cpu.step(), Ok(false));
    assert_eq!(cpu.ip(), 0x0200);
    assert_eq!(cpu.run_state(), RunState::InHandler);
    let sp = cpu.sp();

    assert_eq!(cpu.step(), Ok(false));
    assert_eq!(cpu.ip(), 0x0300);
    assert_eq!(cpu.sp(), sp);

    assert_eq!(cpu.step(), Ok(false));
    assert_eq!(cpu.ip(), RESET_VECTOR + 3);
    assert_eq!(cpu.run_state(), RunState::Running);
    assert_eq!(cpu.step(), Ok(true));
}

proptest! {
    #[test]
    fn push_then_pop_round_trips(values in proptest::collection::vec(any::<u16>(), 1..32)) {
        let mut cpu = flat_cpu();
        let registers = registers_of(&cpu);
        let frame = cpu.frame_bytes();

        for value in &values {
            cpu.push(*value).unwrap();
        }
        for value in values.iter().rev() {
            prop_assert_eq!(cpu.pop(), Ok(*value));
        }

        prop_assert_eq!(registers_of(&cpu), registers);
        prop_assert_eq!(cpu.frame_bytes(), frame);
    }

    #[test]
    fn pop_then_push_restores_memory(value in any::<u16>(), other in any::<u16>()) {
        let mut cpu = flat_cpu();
        cpu.push(value).unwrap();
        cpu.push(other).unwrap();
        let registers = registers_of(&cpu);
        let top = cpu.memory().slice(cpu.sp(), u32::from(STACK_ORIGIN)).unwrap();

        let popped = cpu.pop().unwrap();
        cpu.push(popped).unwrap();

        prop_assert_eq!(registers_of(&cpu), registers);
        prop_assert_eq!(cpu.memory().slice(cpu.sp(), u32::from(STACK_ORIGIN)).unwrap(), top);
    }

    #[test]
    fn call_frame_restores_the_caller(
        caller in proptest::collection::vec(any::<u16>(), 8),
        callee in proptest::collection::vec(any::<u16>(), 8),
        arguments in proptest::collection::vec(any::<u16>(), 0..4),
        scratch in proptest::collection::vec(any::<u16>(), 0..6),
    ) {
        let mut cpu = flat_cpu();
        for (index, value) in caller.iter().enumerate() {
            cpu.set_register(&format!("r{}", index + 1), *value).unwrap();
        }
        let sp_before_arguments = cpu.sp();
        if !arguments.is_empty() {
            for argument in &arguments {
                cpu.push(*argument).unwrap();
            }
            cpu.push(arguments.len() as u16).unwrap();
        }
        let acu = cpu.acu();
        let before: Vec<(String, u16)> = cpu
            .registers()
            .snapshot()
            .map(|(name, value)| (name.to_owned(), value))
            .collect();

        cpu.push_state().unwrap();
        for (index, value) in callee.iter().enumerate() {
            cpu.set_register(&format!("r{}", index + 1), *value).unwrap();
        }
        cpu.set_ip(0x4242);
        cpu.set_acu(acu.wrapping_add(1));
        cpu.set_role(RegisterRole::InterruptMask, 0);
        for word in &scratch {
            cpu.push(*word).unwrap();
        }
        cpu.pop_state().unwrap();

        for (name, value) in before {
            match name.as_str() {
                "acu" => {
                    prop_assert_eq!(cpu.acu(), acu.wrapping_add(1));
                }
                "sp" => {
                    prop_assert_eq!(cpu.sp(), sp_before_arguments);
                }
                _ => {
                    prop_assert_eq!(cpu.register(&name).unwrap(), value, "register {}", name);
                }
            }
        }
    }

    #[test]
    fn masked_interrupts_change_nothing(value in any::<u16>(), mask in any::<u16>()) {
        prop_assume!(value & mask != value);
        let mut cpu = flat_cpu();
        cpu.set_role(RegisterRole::InterruptMask, mask);
        let registers = registers_of(&cpu);
        let space = cpu.memory_space();

        cpu.handle_interrupt(value).unwrap();

        prop_assert_eq!(registers_of(&cpu), registers);
        prop_assert_eq!(cpu.memory_space(), space);
        prop_assert_eq!(cpu.run_state(), RunState::Running);
    }

    #[test]
    fn unmasked_interrupts_always_fire(value in any::<u16>()) {
        let mut cpu = flat_cpu();
        let sp = cpu.sp();
        let ip = cpu.ip();
        let handler = cpu.memory().read_u16(value.wrapping_mul(2)).unwrap();

        cpu.handle_interrupt(value).unwrap();

        prop_assert_eq!(cpu.ip(), handler);
        prop_assert_eq!(cpu.run_state(), RunState::InHandler);
        prop_assert_eq!(cpu.sp(), sp.wrapping_sub(2));
        prop_assert_eq!(cpu.memory().read_u16(cpu.sp()), Ok(ip));
    }

    #[test]
    fn double_mode_switch_restores_sp(sp in any::<u16>(), from_relative in any::<bool>()) {
        let mut cpu = split_cpu();
        let (first, second) = if from_relative {
            (AddressingMode::Absolute, AddressingMode::Relative)
        } else {
            cpu.set_mode(AddressingMode::Absolute);
            (AddressingMode::Relative, AddressingMode::Absolute)
        };
        cpu.set_role(RegisterRole::StackPointer, sp);

        cpu.set_mode(first);
        cpu.set_mode(second);

        prop_assert_eq!(cpu.sp(), sp);
    }
}
