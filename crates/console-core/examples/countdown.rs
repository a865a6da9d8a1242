//! Counts down from five, then rings a bell device.
//!
//! ```sh
//! cargo run -p console-core --example countdown
//! ```

use console_core::{
    dump_address_space, BinaryProgram, Device, Machine, MachineConfig, MemoryDevice,
    ResourceGrant, ResourceRequest,
};
use log as _;
use num_enum as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

const ACU: u8 = 1;
const R1: u8 = 2;
const R2: u8 = 3;

/// Prints the first comm-buffer byte each time it is signalled.
#[derive(Default)]
struct Bell {
    rings: u8,
}

impl Device for Bell {
    fn request(&self) -> ResourceRequest {
        ResourceRequest {
            name: 0xB1,
            interrupts: Vec::new(),
            code_space: 3,
            comm_buffer: 2,
        }
    }

    fn code_image(&self) -> Vec<u8> {
        Vec::new()
    }

    fn lock_comm_buffer(&mut self, grant: &ResourceGrant) {
        println!(
            "bell attached as device {} with comm buffer at {:#06x}",
            grant.id, grant.comm_address
        );
    }

    fn signal(&mut self, comm: &mut dyn MemoryDevice) -> Option<u16> {
        self.rings += 1;
        let _ = comm.write_u8(0, self.rings);
        println!("ding ({})", self.rings);
        None
    }
}

fn main() {
    let program = vec![
        0x10, 0x00, 0x05, R1, // 0: mov $5, r1
        0x03, R1, // 4: log r1
        0x26, R1, // 6: dec r1
        0x10, 0x00, 0x00, ACU, // 8: mov $0, acu
        0x43, R1, 0x00, 0x04, // 12: jne r1, &4
        0x10, 0x00, 0x00, R2, // 16: mov $0, r2
        0x0A, R2, // 20: sig r2
        0x00, // 22: hlt
    ];
    let config = MachineConfig {
        memory_size: 0x100,
        ..MachineConfig::default()
    };
    let mut machine = match Machine::boot(
        &config,
        Box::new(BinaryProgram::new(program)),
        vec![Box::new(Bell::default())],
    ) {
        Ok(machine) => machine,
        Err(error) => {
            eprintln!("boot failed: {error}");
            std::process::exit(1);
        }
    };

    match machine.run() {
        Ok(retired) => {
            println!("halted after {retired} instructions");
            println!("{}", machine.cpu().register_dump());
            print!("{}", dump_address_space(machine.cpu().memory(), 0x40));
        }
        Err(fault) => {
            eprintln!("{fault}");
            std::process::exit(1);
        }
    }
}
