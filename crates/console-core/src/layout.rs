//! Boot-time layout of the address space.
//!
//! The planner lays out, in address order:
//!
//! 1. the interrupt vector table at 0;
//! 2. the system-service microcode;
//! 3. one code region per device, then one comm buffer per device;
//! 4. the device-name, comm-address and first-interrupt tables;
//! 5. program memory covering the rest of the configured memory.
//!
//! Device requests are capped; the granted amounts are handed back to each
//! device through its [`ResourceGrant`].

#![allow(clippy::cast_possible_truncation)]

use thiserror::Error;

use crate::device::{AttachedDevice, Device, ResourceGrant, ResourceRequest};
use crate::memory::{
    address_bytes, MemoryDevice, MemoryMapper, Ram, Rom, ADDRESS_SPACE_BYTES,
};
use crate::microcode::{
    self, DeviceTables, ServiceRegisters, COMM_TABLE_ENTRY, INTERRUPT_TABLE_ENTRY,
    NAME_TABLE_ENTRY, SYSTEM_MICROCODE_LEN,
};
use crate::program::Program;
use crate::{InstructionSet, MachineError};

/// Address of the interrupt vector table.
pub const VECTOR_TABLE_ADDRESS: u16 = 0;
/// Vectors reserved for the system: reset, stack origin and services 2..=4.
pub const SYSTEM_VECTOR_COUNT: u16 = 5;
/// Interrupt vectors granted per device at most.
pub const MAX_DEVICE_INTERRUPTS: usize = 2;
/// Code-space bytes granted per device at most.
pub const MAX_CODE_SPACE: u16 = 600;
/// Communication-buffer bytes granted per device at most.
pub const MAX_COMM_BUFFER: u16 = 50;
/// Bytes the planner prepends to a device's code image: id, comm address.
pub const DEVICE_HEADER_LEN: u16 = 3;

/// Region names used by the planner.
pub mod regions {
    /// Interrupt vector table.
    pub const INTERRUPT_VECTOR: &str = "Interrupt Vector";
    /// System-service microcode.
    pub const SYSTEM_INTERRUPTS: &str = "System Interrupts";
    /// Device-name table.
    pub const DEVICE_NAMES: &str = "Device Name Array";
    /// Device comm-address table.
    pub const DEVICE_COMM: &str = "Device Comm Array";
    /// Device first-interrupt table.
    pub const DEVICE_INTERRUPTS: &str = "Device Interrupts Array";
    /// Program memory.
    pub const PROGRAM: &str = "Program Memory";

    /// Code region of device `index`.
    #[must_use]
    pub fn device_code(index: usize) -> String {
        format!("Dev {index} CodeSpace")
    }

    /// Communication buffer of device `index`.
    #[must_use]
    pub fn device_comm(index: usize) -> String {
        format!("Dev {index} Communication Buffer")
    }
}

/// Failure while laying out or populating the address space.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// Memory size exceeds the 16-bit address space.
    #[error("memory size {size:#x} exceeds the 64 KiB address space")]
    MemoryTooLarge {
        /// Requested size.
        size: u32,
    },
    /// The system regions alone do not fit.
    #[error("memory size {size:#x} cannot hold {overhead:#x} bytes of system regions")]
    MemoryTooSmall {
        /// Requested size.
        size: u32,
        /// Bytes needed before program memory.
        overhead: u32,
    },
    /// More devices than one-byte ids can address.
    #[error("{count} devices attached; at most 256 are supported")]
    TooManyDevices {
        /// Attached device count.
        count: usize,
    },
    /// A device's interrupt number does not fit its one-byte table entry.
    #[error("interrupt {interrupt} does not fit the first-interrupt table")]
    InterruptOutOfRange {
        /// First interrupt number granted to the device.
        interrupt: u16,
    },
    /// The system regions leave no room for program memory.
    #[error("memory size {size:#x} leaves no program memory")]
    NoProgramMemory {
        /// Configured memory size.
        size: u32,
    },
    /// The program image does not fit program memory.
    #[error("program image of {image} bytes exceeds {available} bytes of program memory")]
    ProgramTooLarge {
        /// Image length.
        image: usize,
        /// Program memory size.
        available: u32,
    },
    /// The program's start address lies outside program memory.
    #[error("program start address {start:#06x} is outside program memory")]
    StartOutsideProgram {
        /// Declared start address.
        start: u16,
    },
    /// The instruction table lacks an opcode the microcode needs.
    #[error("instruction table has no `{tag}` instruction")]
    MissingInstruction {
        /// Missing tag.
        tag: &'static str,
    },
    /// The register file lacks a register the microcode addresses.
    #[error("register file has no `{name}` register")]
    MissingRegister {
        /// Missing register name.
        name: String,
    },
    /// Populating a region failed.
    #[error(transparent)]
    Memory(#[from] MachineError),
}

/// Planned placement of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePlacement {
    /// Original request.
    pub request: ResourceRequest,
    /// Allocation handed to the device.
    pub grant: ResourceGrant,
    /// Absolute handler addresses, one per granted interrupt.
    pub handlers: Vec<u16>,
}

/// Address-space plan computed from the memory size and device requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemLayout {
    memory_size: u32,
    vector_len: u16,
    microcode_address: u16,
    devices: Vec<DevicePlacement>,
    tables: DeviceTables,
    program_address: u16,
}

impl SystemLayout {
    /// Plans the layout for `requests` in attach order.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError`] when the memory size is outside the address
    /// space, too many devices are attached or the system regions do not fit.
    pub fn plan(memory_size: u32, requests: &[ResourceRequest]) -> Result<Self, LayoutError> {
        if memory_size > ADDRESS_SPACE_BYTES {
            return Err(LayoutError::MemoryTooLarge { size: memory_size });
        }
        if requests.len() > usize::from(u8::MAX) + 1 {
            return Err(LayoutError::TooManyDevices {
                count: requests.len(),
            });
        }
        let device_count = requests.len() as u32;

        let granted_interrupts: u32 = requests
            .iter()
            .map(|request| request.interrupts.len().min(MAX_DEVICE_INTERRUPTS) as u32)
            .sum();
        let vector_len = 2 * (u32::from(SYSTEM_VECTOR_COUNT) + granted_interrupts);
        let microcode_address = vector_len;
        let code_base = microcode_address + u32::from(SYSTEM_MICROCODE_LEN);
        let code_total: u32 = requests
            .iter()
            .map(|request| u32::from(request.code_space.min(MAX_CODE_SPACE)))
            .sum();
        let comm_base = code_base + code_total;
        let comm_total: u32 = requests
            .iter()
            .map(|request| u32::from(request.comm_buffer.min(MAX_COMM_BUFFER)))
            .sum();
        let names = comm_base + comm_total;
        let comm_table = names + device_count;
        let interrupt_table = comm_table + 2 * device_count;
        let overhead = interrupt_table + device_count;
        if overhead > memory_size {
            return Err(LayoutError::MemoryTooSmall {
                size: memory_size,
                overhead,
            });
        }

        let mut devices = Vec::with_capacity(requests.len());
        let mut code_address = code_base;
        let mut comm_address = comm_base;
        let mut next_interrupt = SYSTEM_VECTOR_COUNT;
        for (index, request) in requests.iter().enumerate() {
            let code_space = request.code_space.min(MAX_CODE_SPACE);
            let comm_buffer = request.comm_buffer.min(MAX_COMM_BUFFER);
            let offsets = &request.interrupts[..request.interrupts.len().min(MAX_DEVICE_INTERRUPTS)];
            let interrupts: Vec<u16> = (next_interrupt..).take(offsets.len()).collect();
            let first_interrupt = match interrupts.first() {
                Some(&first) => u8::try_from(first)
                    .map_err(|_| LayoutError::InterruptOutOfRange { interrupt: first })?,
                None => 0,
            };
            next_interrupt += offsets.len() as u16;
            let handlers = offsets
                .iter()
                .map(|offset| {
                    (code_address as u16)
                        .wrapping_add(DEVICE_HEADER_LEN)
                        .wrapping_add(*offset)
                })
                .collect();

            let grant = ResourceGrant {
                id: index as u8,
                code_address: code_address as u16,
                code_space,
                comm_address: comm_address as u16,
                comm_buffer,
                interrupts,
                first_interrupt,
            };
            if grant.truncates(request) {
                log::warn!(
                    "device {index} (type {:#04x}) request truncated: code {}/{}, comm {}/{}, interrupts {}/{}",
                    request.name,
                    grant.code_space,
                    request.code_space,
                    grant.comm_buffer,
                    request.comm_buffer,
                    grant.interrupts.len(),
                    request.interrupts.len(),
                );
            }
            devices.push(DevicePlacement {
                request: request.clone(),
                grant,
                handlers,
            });
            code_address += u32::from(code_space);
            comm_address += u32::from(comm_buffer);
        }

        Ok(Self {
            memory_size,
            vector_len: vector_len as u16,
            microcode_address: microcode_address as u16,
            devices,
            tables: DeviceTables {
                comm: comm_table as u16,
                names: names as u16,
                interrupts: interrupt_table as u16,
            },
            program_address: overhead as u16,
        })
    }

    /// Configured memory size.
    #[must_use]
    pub const fn memory_size(&self) -> u32 {
        self.memory_size
    }

    /// Address of the interrupt vector table the CPU boots from.
    #[must_use]
    pub const fn vector_base(&self) -> u16 {
        VECTOR_TABLE_ADDRESS
    }

    /// Length of the interrupt vector table in bytes.
    #[must_use]
    pub const fn vector_len(&self) -> u16 {
        self.vector_len
    }

    /// Start of the system-service microcode.
    #[must_use]
    pub const fn microcode_address(&self) -> u16 {
        self.microcode_address
    }

    /// Device placements in attach order.
    #[must_use]
    pub fn devices(&self) -> &[DevicePlacement] {
        &self.devices
    }

    /// Addresses of the device lookup tables.
    #[must_use]
    pub const fn tables(&self) -> DeviceTables {
        self.tables
    }

    /// Start of program memory; equals the total system overhead.
    #[must_use]
    pub const fn program_address(&self) -> u16 {
        self.program_address
    }

    /// Size of program memory in bytes.
    #[must_use]
    pub const fn program_size(&self) -> u32 {
        self.memory_size - self.program_address as u32
    }

    /// Interrupt vector table contents.
    #[must_use]
    pub fn vector_table(&self, program_start: u16) -> Vec<u8> {
        let system = [
            self.program_address.wrapping_add(program_start),
            self.memory_size as u16,
            self.microcode_address + COMM_TABLE_ENTRY,
            self.microcode_address + NAME_TABLE_ENTRY,
            self.microcode_address + INTERRUPT_TABLE_ENTRY,
        ];
        system
            .into_iter()
            .chain(self.devices.iter().flat_map(|device| device.handlers.iter().copied()))
            .flat_map(address_bytes)
            .collect()
    }

    /// Logs the memory map at info level.
    pub fn report(&self) {
        log::info!("Memory Layout");
        log::info!("Interrupt Vector {:#06x}", self.vector_base());
        log::info!("System Interrupts Code {:#06x}", self.microcode_address);
        for device in &self.devices {
            log::info!(
                "Device {:#04x} Code {:#06x}",
                device.request.name,
                device.grant.code_address
            );
        }
        for device in &self.devices {
            log::info!(
                "Device {:#04x} Comm Buf {:#06x}",
                device.request.name,
                device.grant.comm_address
            );
        }
        log::info!("Device Name Array {:#06x}", self.tables.names);
        log::info!("Device Comm Array {:#06x}", self.tables.comm);
        log::info!("Device Interrupt Array {:#06x}", self.tables.interrupts);
        log::info!("Program Memory {:#06x}", self.program_address);
    }

    /// Maps every planned region into a fresh mapper, loads the program and
    /// the device code images, and locks each device's comm buffer.
    ///
    /// `devices` must be in the order their requests were planned.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError`] when there is no program memory, the program
    /// does not fit or a region cannot be populated.
    pub fn build(
        &self,
        instructions: &InstructionSet,
        registers: ServiceRegisters,
        program: &dyn Program,
        devices: Vec<Box<dyn Device>>,
    ) -> Result<(MemoryMapper, Vec<AttachedDevice>), LayoutError> {
        let image = program.image();
        let program_size = self.program_size();
        if program_size == 0 {
            return Err(LayoutError::NoProgramMemory {
                size: self.memory_size,
            });
        }
        if image.len() > program_size as usize {
            return Err(LayoutError::ProgramTooLarge {
                image: image.len(),
                available: program_size,
            });
        }
        let start = program.start_address();
        if u32::from(start) >= program_size {
            return Err(LayoutError::StartOutsideProgram { start });
        }

        let mut mapper = MemoryMapper::new();
        let vectors = self.vector_table(start);
        mapper.map(
            Box::new(Rom::new(regions::INTERRUPT_VECTOR, vectors)),
            self.vector_base(),
            u32::from(self.vector_len),
            false,
        );
        let code = microcode::assemble(instructions, registers, self.tables)?;
        mapper.map(
            Box::new(Rom::new(regions::SYSTEM_INTERRUPTS, code)),
            self.microcode_address,
            u32::from(SYSTEM_MICROCODE_LEN),
            true,
        );

        for (index, (placement, device)) in self.devices.iter().zip(&devices).enumerate() {
            let grant = &placement.grant;
            let size = usize::from(grant.code_space);
            let mut bytes = Vec::with_capacity(size);
            bytes.push(grant.id);
            bytes.extend_from_slice(&address_bytes(grant.comm_address));
            bytes.extend(device.code_image());
            if bytes.len() > size {
                log::warn!(
                    "device {index} code image of {} bytes truncated to {size}",
                    bytes.len()
                );
                bytes.truncate(size);
            }
            let ram = Ram::with_image(regions::device_code(index), size, &bytes)?;
            mapper.map(
                Box::new(ram),
                grant.code_address,
                u32::from(grant.code_space),
                true,
            );
        }
        for (index, placement) in self.devices.iter().enumerate() {
            let grant = &placement.grant;
            mapper.map(
                Box::new(Ram::new(
                    regions::device_comm(index),
                    usize::from(grant.comm_buffer),
                )),
                grant.comm_address,
                u32::from(grant.comm_buffer),
                true,
            );
        }

        let names: Vec<u8> = self.devices.iter().map(|d| d.request.name).collect();
        let comm: Vec<u8> = self
            .devices
            .iter()
            .flat_map(|d| address_bytes(d.grant.comm_address))
            .collect();
        let firsts: Vec<u8> = self.devices.iter().map(|d| d.grant.first_interrupt).collect();
        for (name, address, bytes) in [
            (regions::DEVICE_NAMES, self.tables.names, names),
            (regions::DEVICE_COMM, self.tables.comm, comm),
            (regions::DEVICE_INTERRUPTS, self.tables.interrupts, firsts),
        ] {
            let len = bytes.len() as u32;
            mapper.map(Box::new(Rom::new(name, bytes)), address, len, true);
        }

        let mut ram = Ram::new(regions::PROGRAM, program_size as usize);
        ram.load(image, 0)?;
        mapper.map(Box::new(ram), self.program_address, program_size, true);

        let attached = self
            .devices
            .iter()
            .zip(devices)
            .enumerate()
            .map(|(index, (placement, mut device))| {
                device.lock_comm_buffer(&placement.grant);
                AttachedDevice::new(device, placement.grant.clone(), regions::device_comm(index))
            })
            .collect();
        Ok((mapper, attached))
    }
}
