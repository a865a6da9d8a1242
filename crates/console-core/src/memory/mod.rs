//! Memory devices and the address-space mapper.

/// RAM and ROM backing stores.
pub mod device;
/// Address-space mapper composing devices into one 16-bit space.
pub mod map;

pub use device::{Ram, Rom};
pub use map::{MappedRegion, MemoryMapper};

use crate::MachineError;

/// Size in bytes of the flat 16-bit address space (64 KiB).
pub const ADDRESS_SPACE_BYTES: u32 = u16::MAX as u32 + 1;

/// Whether a device accepts writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Capability {
    /// Preloaded, write-protected storage.
    ReadOnly,
    /// Mutable storage.
    ReadWrite,
}

/// A named addressable unit.
///
/// Addresses are device-local. 16-bit values are stored big-endian, high byte
/// at the lower address.
pub trait MemoryDevice {
    /// Human-readable device name used in fault reports.
    fn name(&self) -> &str;

    /// Read/write capability of the device.
    fn capability(&self) -> Capability;

    /// Size of the backing store in bytes.
    fn size(&self) -> u32;

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns an error when `address` is not backed by this device.
    fn read_u8(&self, address: u16) -> Result<u8, MachineError>;

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Returns an error when `address` is not backed by this device or the
    /// device is read-only.
    fn write_u8(&mut self, address: u16, value: u8) -> Result<(), MachineError>;

    /// Reads a big-endian 16-bit value.
    ///
    /// # Errors
    ///
    /// Returns an error when either byte is not backed by this device.
    fn read_u16(&self, address: u16) -> Result<u16, MachineError> {
        let high = self.read_u8(address)?;
        let low = self.read_u8(address.wrapping_add(1))?;
        Ok(u16::from_be_bytes([high, low]))
    }

    /// Writes a big-endian 16-bit value.
    ///
    /// # Errors
    ///
    /// Returns an error when either byte is not backed by this device or the
    /// device is read-only.
    fn write_u16(&mut self, address: u16, value: u16) -> Result<(), MachineError> {
        let [high, low] = value.to_be_bytes();
        self.write_u8(address, high)?;
        self.write_u8(address.wrapping_add(1), low)
    }

    /// Copies `data` into the device starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns an error when the range does not fit the device or the device
    /// is read-only.
    fn load(&mut self, data: &[u8], start: u16) -> Result<(), MachineError>;

    /// Copies out the bytes in `from..to`.
    ///
    /// # Errors
    ///
    /// Returns an error when the range does not fit the device.
    fn slice(&self, from: u16, to: u32) -> Result<Vec<u8>, MachineError>;
}

/// Reads a big-endian 16-bit value from a byte slice.
#[must_use]
pub fn read_u16_be(bytes: &[u8], index: usize) -> Option<u16> {
    let high = *bytes.get(index)?;
    let low = *bytes.get(index + 1)?;
    Some(u16::from_be_bytes([high, low]))
}

/// Writes a big-endian 16-bit value into a byte slice.
///
/// Returns `false` without writing when the slot does not fit.
pub fn write_u16_be(bytes: &mut [u8], index: usize, value: u16) -> bool {
    match bytes.get_mut(index..index + 2) {
        Some(slot) => {
            slot.copy_from_slice(&value.to_be_bytes());
            true
        }
        None => false,
    }
}

/// Splits an address into its big-endian byte pair.
#[must_use]
pub const fn address_bytes(address: u16) -> [u8; 2] {
    address.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::{address_bytes, read_u16_be, write_u16_be};

    #[test]
    fn words_are_big_endian() {
        let mut bytes = [0_u8; 4];
        assert!(write_u16_be(&mut bytes, 1, 0x1234));
        assert_eq!(bytes, [0x00, 0x12, 0x34, 0x00]);
        assert_eq!(read_u16_be(&bytes, 1), Some(0x1234));
        assert_eq!(address_bytes(0xBEEF), [0xBE, 0xEF]);
    }

    #[test]
    fn word_helpers_reject_short_slots() {
        let mut bytes = [0_u8; 2];
        assert!(!write_u16_be(&mut bytes, 1, 0xFFFF));
        assert_eq!(bytes, [0, 0]);
        assert_eq!(read_u16_be(&bytes, 1), None);
    }
}
