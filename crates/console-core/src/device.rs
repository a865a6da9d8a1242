//! Attached-device contract.
//!
//! A device declares the resources it wants, receives what the layout planner
//! granted and is signalled synchronously by `SEND_SIG`. Only the memory and
//! interrupt contract is defined here; device behaviour is up to the
//! implementor.

use crate::memory::MemoryDevice;

/// Resources a device asks for at boot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ResourceRequest {
    /// One-byte device type, published in the device-name table.
    pub name: u8,
    /// Handler entry offsets into the device's code image, one per
    /// interrupt.
    pub interrupts: Vec<u16>,
    /// Code-space bytes, including the three-byte header.
    pub code_space: u16,
    /// Communication-buffer bytes.
    pub comm_buffer: u16,
}

/// What the planner actually allocated; amounts may be lower than requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ResourceGrant {
    /// Device id used by `SEND_SIG`; the attach index.
    pub id: u8,
    /// Absolute start of the code region.
    pub code_address: u16,
    /// Granted code-space bytes.
    pub code_space: u16,
    /// Absolute start of the communication buffer.
    pub comm_address: u16,
    /// Granted communication-buffer bytes.
    pub comm_buffer: u16,
    /// Interrupt numbers assigned to the device's handlers, in request order.
    pub interrupts: Vec<u16>,
    /// First interrupt number, or 0 when none was granted.
    pub first_interrupt: u8,
}

impl ResourceGrant {
    /// Returns `true` when any part of `request` was cut down.
    #[must_use]
    pub fn truncates(&self, request: &ResourceRequest) -> bool {
        self.code_space < request.code_space
            || self.comm_buffer < request.comm_buffer
            || self.interrupts.len() < request.interrupts.len()
    }
}

/// A device attached to the machine.
pub trait Device {
    /// Resources the device asks for.
    fn request(&self) -> ResourceRequest;

    /// Code image loaded into the device's code region after the header.
    fn code_image(&self) -> Vec<u8>;

    /// Called once with the final allocation before the CPU starts.
    fn lock_comm_buffer(&mut self, grant: &ResourceGrant);

    /// Called by `SEND_SIG`.
    ///
    /// `comm` is the device's communication buffer, addressed from 0. A
    /// returned value is raised as an interrupt before the signalling
    /// instruction retires.
    fn signal(&mut self, comm: &mut dyn MemoryDevice) -> Option<u16>;
}

/// A device together with its grant and the name of its mapped comm region.
pub struct AttachedDevice {
    device: Box<dyn Device>,
    grant: ResourceGrant,
    comm_region: String,
}

impl AttachedDevice {
    /// Binds `device` to its grant.
    #[must_use]
    pub fn new(device: Box<dyn Device>, grant: ResourceGrant, comm_region: String) -> Self {
        Self {
            device,
            grant,
            comm_region,
        }
    }

    /// Granted resources.
    #[must_use]
    pub const fn grant(&self) -> &ResourceGrant {
        &self.grant
    }

    /// Name of the mapped communication-buffer region.
    #[must_use]
    pub fn comm_region(&self) -> &str {
        &self.comm_region
    }

    pub(crate) fn signal(&mut self, comm: &mut dyn MemoryDevice) -> Option<u16> {
        self.device.signal(comm)
    }
}

impl std::fmt::Debug for AttachedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedDevice")
            .field("grant", &self.grant)
            .field("comm_region", &self.comm_region)
            .finish_non_exhaustive()
    }
}
