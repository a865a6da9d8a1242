//! Address-space mapper composing memory devices into one flat 16-bit space.

#![allow(clippy::cast_possible_truncation)]

use std::fmt;

use super::{Capability, MemoryDevice, ADDRESS_SPACE_BYTES};
use crate::MachineError;

/// One device mounted into the address space.
pub struct MappedRegion {
    device: Box<dyn MemoryDevice>,
    start: u16,
    end: u32,
    remap: bool,
}

impl MappedRegion {
    /// Inclusive start address.
    #[must_use]
    pub const fn start(&self) -> u16 {
        self.start
    }

    /// Exclusive end address (`start + size`).
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.end
    }

    /// Number of addresses covered.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.end - self.start as u32
    }

    /// `true` when addresses are rebased to the region start before reaching
    /// the device.
    #[must_use]
    pub const fn remap(&self) -> bool {
        self.remap
    }

    /// Name of the mounted device.
    #[must_use]
    pub fn name(&self) -> &str {
        self.device.name()
    }

    /// Borrows the mounted device.
    #[must_use]
    pub fn device(&self) -> &dyn MemoryDevice {
        self.device.as_ref()
    }

    /// Returns `true` when `address` falls inside `[start, end)`.
    #[must_use]
    pub const fn contains(&self, address: u16) -> bool {
        address >= self.start && (address as u32) < self.end
    }

    const fn translate(&self, address: u16) -> u16 {
        if self.remap {
            address - self.start
        } else {
            address
        }
    }
}

impl fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedRegion")
            .field("device", &self.device.name())
            .field("start", &self.start)
            .field("end", &self.end)
            .field("remap", &self.remap)
            .finish()
    }
}

/// Ordered set of mapped regions.
///
/// Lookups scan regions in insertion order and the first region containing an
/// address wins. Overlap is not checked: the layout planner is responsible for
/// producing disjoint regions.
#[derive(Debug, Default)]
pub struct MemoryMapper {
    regions: Vec<MappedRegion>,
}

impl MemoryMapper {
    /// Creates an empty mapper; every address is unmapped.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: Vec::new(),
        }
    }

    /// Appends `device` as a region covering `[start, start + size)`.
    ///
    /// Regions that would extend past the 16-bit address space are clipped at
    /// `0x10000`.
    pub fn map(&mut self, device: Box<dyn MemoryDevice>, start: u16, size: u32, remap: bool) {
        let end = (u32::from(start) + size).min(ADDRESS_SPACE_BYTES);
        log::trace!(
            "mapping `{}` at {start:#06x}..{end:#06x} (remap: {remap})",
            device.name()
        );
        self.regions.push(MappedRegion {
            device,
            start,
            end,
            remap,
        });
    }

    /// Iterates regions in mapping order.
    pub fn regions(&self) -> impl Iterator<Item = &MappedRegion> {
        self.regions.iter()
    }

    /// Returns the first region containing `address`.
    #[must_use]
    pub fn region_at(&self, address: u16) -> Option<&MappedRegion> {
        self.regions.iter().find(|region| region.contains(address))
    }

    /// Returns the first region whose device is called `name`.
    #[must_use]
    pub fn region_named(&self, name: &str) -> Option<&MappedRegion> {
        self.regions.iter().find(|region| region.name() == name)
    }

    /// Mutably borrows the first device called `name`.
    pub fn device_named_mut(&mut self, name: &str) -> Option<&mut dyn MemoryDevice> {
        for region in &mut self.regions {
            if region.device.name() == name {
                return Some(region.device.as_mut());
            }
        }
        None
    }

    fn locate(&self, address: u16) -> Result<&MappedRegion, MachineError> {
        self.region_at(address)
            .ok_or(MachineError::UnmappedAddress { address })
    }

    fn locate_mut(&mut self, address: u16) -> Result<&mut MappedRegion, MachineError> {
        self.regions
            .iter_mut()
            .find(|region| region.contains(address))
            .ok_or(MachineError::UnmappedAddress { address })
    }

    /// Resolves a bulk range to its single owning region.
    fn locate_range(&self, from: u16, to: u32) -> Result<&MappedRegion, MachineError> {
        let region = self.locate(from)?;
        if to > region.end || to < u32::from(from) {
            return Err(MachineError::CrossDeviceAccess { from, to });
        }
        Ok(region)
    }
}

impl MemoryDevice for MemoryMapper {
    fn name(&self) -> &str {
        "Memory Mapper"
    }

    fn capability(&self) -> Capability {
        Capability::ReadWrite
    }

    fn size(&self) -> u32 {
        ADDRESS_SPACE_BYTES
    }

    fn read_u8(&self, address: u16) -> Result<u8, MachineError> {
        let region = self.locate(address)?;
        region.device.read_u8(region.translate(address))
    }

    fn write_u8(&mut self, address: u16, value: u8) -> Result<(), MachineError> {
        let region = self.locate_mut(address)?;
        let local = region.translate(address);
        region.device.write_u8(local, value)
    }

    fn read_u16(&self, address: u16) -> Result<u16, MachineError> {
        let region = self.locate(address)?;
        region.device.read_u16(region.translate(address))
    }

    fn write_u16(&mut self, address: u16, value: u16) -> Result<(), MachineError> {
        let region = self.locate_mut(address)?;
        let local = region.translate(address);
        region.device.write_u16(local, value)
    }

    fn load(&mut self, data: &[u8], start: u16) -> Result<(), MachineError> {
        let to = u32::from(start) + data.len() as u32;
        self.locate_range(start, to)?;
        let region = self.locate_mut(start)?;
        let local = region.translate(start);
        region.device.load(data, local)
    }

    fn slice(&self, from: u16, to: u32) -> Result<Vec<u8>, MachineError> {
        let region = self.locate_range(from, to)?;
        let local_from = region.translate(from);
        let local_to = to - u32::from(from - local_from);
        region.device.slice(local_from, local_to)
    }
}
