#![no_main]

use console_core::{BinaryProgram, Machine, MachineConfig, MemoryDevice};
use libfuzzer_sys::fuzz_target;

const STEP_LIMIT: usize = 4096;

fuzz_target!(|data: &[u8]| {
    let config = MachineConfig {
        memory_size: 0x1000,
        ..MachineConfig::default()
    };
    let Ok(mut machine) = Machine::boot(&config, Box::new(BinaryProgram::new(data.to_vec())), Vec::new())
    else {
        return;
    };

    for _ in 0..STEP_LIMIT {
        match machine.cpu_mut().step() {
            Ok(true) => {
                let cpu = machine.cpu();
                let ip = cpu.ip();
                assert_eq!(cpu.memory().read_u8(ip).ok(), cpu.instructions().opcode("HLT"));
                break;
            }
            Ok(false) => {}
            Err(fault) => {
                // a fault always names the opcode unless the fetch itself failed
                assert!(fault.opcode.is_some() || fault.cause.class() == console_core::FaultClass::Memory);
                break;
            }
        }
    }
});
