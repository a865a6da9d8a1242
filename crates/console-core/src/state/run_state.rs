/// CPU execution state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// Constructed, boot interrupt not yet delivered.
    #[default]
    Reset,
    /// Executing the program.
    Running,
    /// Executing an interrupt handler; IP of the interrupted code is saved.
    InHandler,
    /// A `HLT` instruction was executed.
    Halted,
}

impl RunState {
    /// Returns `true` while the CPU is inside an interrupt handler.
    #[must_use]
    pub const fn in_handler(self) -> bool {
        matches!(self, Self::InHandler)
    }

    /// Returns `true` once the CPU has halted.
    #[must_use]
    pub const fn is_halted(self) -> bool {
        matches!(self, Self::Halted)
    }
}

#[cfg(test)]
mod tests {
    use super::RunState;

    #[test]
    fn run_state_default_is_reset() {
        assert_eq!(RunState::default(), RunState::Reset);
    }

    #[test]
    fn predicates_match_only_their_state() {
        assert!(RunState::InHandler.in_handler());
        assert!(!RunState::Running.in_handler());
        assert!(RunState::Halted.is_halted());
        assert!(!RunState::Reset.is_halted());
    }
}
