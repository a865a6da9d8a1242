//! Plain RAM and preloaded ROM backing stores.

#![allow(clippy::cast_possible_truncation)]

use super::{read_u16_be, write_u16_be, Capability, MemoryDevice};
use crate::MachineError;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ByteStore {
    name: String,
    bytes: Box<[u8]>,
}

impl ByteStore {
    fn new(name: String, bytes: Box<[u8]>) -> Self {
        Self { name, bytes }
    }

    fn out_of_bounds(&self, address: u32) -> MachineError {
        MachineError::OutOfBounds {
            device: self.name.clone(),
            address,
        }
    }

    fn read_u8(&self, address: u16) -> Result<u8, MachineError> {
        self.bytes
            .get(usize::from(address))
            .copied()
            .ok_or_else(|| self.out_of_bounds(u32::from(address)))
    }

    fn write_u8(&mut self, address: u16, value: u8) -> Result<(), MachineError> {
        match self.bytes.get_mut(usize::from(address)) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.out_of_bounds(u32::from(address))),
        }
    }

    /// Word reads that run off the end fall back to byte reads, which wrap at
    /// `0xFFFF` and report the first missing byte.
    fn read_u16(&self, address: u16) -> Result<u16, MachineError> {
        match read_u16_be(&self.bytes, usize::from(address)) {
            Some(value) => Ok(value),
            None => {
                let high = self.read_u8(address)?;
                let low = self.read_u8(address.wrapping_add(1))?;
                Ok(u16::from_be_bytes([high, low]))
            }
        }
    }

    fn write_u16(&mut self, address: u16, value: u16) -> Result<(), MachineError> {
        if write_u16_be(&mut self.bytes, usize::from(address), value) {
            return Ok(());
        }
        let [high, low] = value.to_be_bytes();
        self.write_u8(address, high)?;
        self.write_u8(address.wrapping_add(1), low)
    }

    fn range(&self, from: u16, to: u32) -> Result<std::ops::Range<usize>, MachineError> {
        let start = usize::from(from);
        let end = to as usize;
        if end < start || end > self.bytes.len() {
            return Err(self.out_of_bounds(to));
        }
        Ok(start..end)
    }

    fn load(&mut self, data: &[u8], start: u16) -> Result<(), MachineError> {
        let end = u32::from(start) + data.len() as u32;
        let range = self.range(start, end)?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    fn slice(&self, from: u16, to: u32) -> Result<Vec<u8>, MachineError> {
        let range = self.range(from, to)?;
        Ok(self.bytes[range].to_vec())
    }

    fn size(&self) -> u32 {
        self.bytes.len() as u32
    }
}

/// Mutable byte-addressable memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ram {
    store: ByteStore,
}

impl Ram {
    /// Creates a zeroed RAM of `size` bytes.
    #[must_use]
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            store: ByteStore::new(name.into(), vec![0; size].into_boxed_slice()),
        }
    }

    /// Creates a RAM of `size` bytes with `image` copied in at offset 0.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::OutOfBounds`] when `image` is larger than `size`.
    pub fn with_image(
        name: impl Into<String>,
        size: usize,
        image: &[u8],
    ) -> Result<Self, MachineError> {
        let mut ram = Self::new(name, size);
        ram.load(image, 0)?;
        Ok(ram)
    }

    /// Borrows the full backing store.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.store.bytes
    }

    /// Mutably borrows the full backing store.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.store.bytes
    }
}

impl MemoryDevice for Ram {
    fn name(&self) -> &str {
        &self.store.name
    }

    fn capability(&self) -> Capability {
        Capability::ReadWrite
    }

    fn size(&self) -> u32 {
        self.store.size()
    }

    fn read_u8(&self, address: u16) -> Result<u8, MachineError> {
        self.store.read_u8(address)
    }

    fn write_u8(&mut self, address: u16, value: u8) -> Result<(), MachineError> {
        self.store.write_u8(address, value)
    }

    fn read_u16(&self, address: u16) -> Result<u16, MachineError> {
        self.store.read_u16(address)
    }

    fn write_u16(&mut self, address: u16, value: u16) -> Result<(), MachineError> {
        self.store.write_u16(address, value)
    }

    fn load(&mut self, data: &[u8], start: u16) -> Result<(), MachineError> {
        self.store.load(data, start)
    }

    fn slice(&self, from: u16, to: u32) -> Result<Vec<u8>, MachineError> {
        self.store.slice(from, to)
    }
}

/// Write-protected memory whose contents are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rom {
    store: ByteStore,
}

impl Rom {
    /// Creates a ROM holding exactly `image`.
    #[must_use]
    pub fn new(name: impl Into<String>, image: impl Into<Box<[u8]>>) -> Self {
        Self {
            store: ByteStore::new(name.into(), image.into()),
        }
    }

    fn reject(&self, address: u16) -> MachineError {
        MachineError::ReadOnlyViolation {
            device: self.store.name.clone(),
            address,
        }
    }
}

impl MemoryDevice for Rom {
    fn name(&self) -> &str {
        &self.store.name
    }

    fn capability(&self) -> Capability {
        Capability::ReadOnly
    }

    fn size(&self) -> u32 {
        self.store.size()
    }

    fn read_u8(&self, address: u16) -> Result<u8, MachineError> {
        self.store.read_u8(address)
    }

    fn write_u8(&mut self, address: u16, _value: u8) -> Result<(), MachineError> {
        Err(self.reject(address))
    }

    fn read_u16(&self, address: u16) -> Result<u16, MachineError> {
        self.store.read_u16(address)
    }

    fn write_u16(&mut self, address: u16, _value: u16) -> Result<(), MachineError> {
        Err(self.reject(address))
    }

    fn load(&mut self, _data: &[u8], start: u16) -> Result<(), MachineError> {
        Err(self.reject(start))
    }

    fn slice(&self, from: u16, to: u32) -> Result<Vec<u8>, MachineError> {
        self.store.slice(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::{Ram, Rom};
    use crate::memory::{Capability, MemoryDevice};
    use crate::MachineError;

    #[test]
    fn ram_round_trips_bytes_and_words() {
        let mut ram = Ram::new("scratch", 8);
        ram.write_u8(0, 0xAB).unwrap();
        ram.write_u16(2, 0x1234).unwrap();

        assert_eq!(ram.read_u8(0).unwrap(), 0xAB);
        assert_eq!(ram.read_u16(2).unwrap(), 0x1234);
        assert_eq!(ram.as_bytes()[2..4], [0x12, 0x34]);
        assert_eq!(ram.capability(), Capability::ReadWrite);
    }

    #[test]
    fn ram_rejects_accesses_past_its_end() {
        let mut ram = Ram::new("tiny", 2);
        assert_eq!(
            ram.read_u16(1),
            Err(MachineError::OutOfBounds {
                device: "tiny".into(),
                address: 2
            })
        );
        assert!(ram.write_u8(2, 1).is_err());
        assert!(ram.load(&[1, 2, 3], 0).is_err());
        assert_eq!(ram.as_bytes(), &[0, 0]);
    }

    #[test]
    fn ram_with_image_preloads_from_offset_zero() {
        let ram = Ram::with_image("program", 4, &[1, 2]).unwrap();
        assert_eq!(ram.as_bytes(), &[1, 2, 0, 0]);
        assert!(Ram::with_image("program", 1, &[1, 2]).is_err());
    }

    #[test]
    fn rom_rejects_writes_without_changing_state() {
        let mut rom = Rom::new("vectors", vec![0x00, 0x10]);

        assert_eq!(
            rom.write_u8(0, 0xFF),
            Err(MachineError::ReadOnlyViolation {
                device: "vectors".into(),
                address: 0
            })
        );
        assert!(rom.write_u16(0, 0xFFFF).is_err());
        assert!(rom.load(&[9], 1).is_err());
        assert_eq!(rom.read_u16(0).unwrap(), 0x0010);
        assert_eq!(rom.capability(), Capability::ReadOnly);
    }

    #[test]
    fn words_at_the_end_of_a_full_bank_wrap_to_zero() {
        let mut ram = Ram::new("bank", 0x10000);
        ram.write_u16(0xFFFF, 0xABCD).unwrap();
        assert_eq!(ram.read_u8(0xFFFF).unwrap(), 0xAB);
        assert_eq!(ram.read_u8(0).unwrap(), 0xCD);
        assert_eq!(ram.read_u16(0xFFFF).unwrap(), 0xABCD);
    }

    #[test]
    fn partial_word_write_reports_the_missing_byte() {
        let mut ram = Ram::new("tiny", 3);
        assert_eq!(
            ram.write_u16(2, 0x1234),
            Err(MachineError::OutOfBounds {
                device: "tiny".into(),
                address: 3
            })
        );
    }

    #[test]
    fn slice_is_end_exclusive() {
        let ram = Ram::with_image("program", 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(ram.slice(1, 3).unwrap(), vec![2, 3]);
        assert_eq!(ram.slice(0, 4).unwrap(), vec![1, 2, 3, 4]);
        assert!(ram.slice(0, 5).is_err());
        assert!(ram.slice(3, 2).is_err());
    }
}
