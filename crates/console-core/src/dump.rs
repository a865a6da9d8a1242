//! Hex dump of the address space.

use std::fmt::Write as _;

use crate::memory::MemoryDevice;

/// Bytes rendered per dump line.
pub const DUMP_LINE_BYTES: u32 = 16;

/// Renders `[0, end)` of `memory` as a hex dump.
///
/// Each line starts with the address of its first byte; bytes that cannot be
/// read are shown as `--`.
#[must_use]
pub fn dump_address_space(memory: &dyn MemoryDevice, end: u32) -> String {
    let end = end.min(memory.size());
    let mut out = String::new();
    for address in 0..end {
        if address % DUMP_LINE_BYTES == 0 {
            if address > 0 {
                out.push('\n');
            }
            let _ = write!(out, "{address:#06x}:");
        }
        match u16::try_from(address).ok().map(|a| memory.read_u8(a)) {
            Some(Ok(byte)) => {
                let _ = write!(out, " {byte:02x}");
            }
            _ => out.push_str(" --"),
        }
    }
    out.push('\n');
    out
}
