//! Program images loaded into program memory.

use crate::Cpu;

/// How the host runs a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Hosting {
    /// The program's start hook runs on the host thread before the CPU loop.
    #[default]
    Inline,
    /// The program runs alongside the host; its exit hook runs once the CPU
    /// halts.
    Forked,
}

/// A loadable program.
pub trait Program {
    /// Raw image copied to the start of program memory.
    fn image(&self) -> &[u8];

    /// Entry offset within program memory.
    fn start_address(&self) -> u16 {
        0
    }

    /// Hosting model.
    fn hosting(&self) -> Hosting {
        Hosting::Inline
    }

    /// Called before the CPU loop starts for [`Hosting::Inline`] programs.
    fn on_start(&mut self, _cpu: &mut Cpu) {}

    /// Called after the CPU halts for [`Hosting::Forked`] programs.
    fn on_exit(&mut self) {}
}

/// A flat binary loaded at program-memory offset 0 and entered there.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BinaryProgram {
    image: Vec<u8>,
}

impl BinaryProgram {
    /// Wraps a raw image.
    #[must_use]
    pub const fn new(image: Vec<u8>) -> Self {
        Self { image }
    }
}

impl From<Vec<u8>> for BinaryProgram {
    fn from(image: Vec<u8>) -> Self {
        Self::new(image)
    }
}

impl Program for BinaryProgram {
    fn image(&self) -> &[u8] {
        &self.image
    }
}
