/// Host-observable lifecycle state of a [`Cpu`](crate::Cpu).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// `start` has not been called yet.
    #[default]
    NotStarted,
    /// The run loop is executing instructions.
    Running,
    /// Halted by `HLT` or by the host.
    Halted,
    /// Waiting for explicit `step_execution` calls.
    SingleStep,
    /// Terminal; the run loop has exited or will exit.
    Killed,
}

impl RunState {
    /// Returns `true` once `start` has been called, including after a kill.
    #[must_use]
    pub const fn is_started(self) -> bool {
        !matches!(self, Self::NotStarted)
    }

    /// Returns `true` for states that accept lifecycle and debug operations.
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Running | Self::Halted | Self::SingleStep)
    }
}

#[cfg(test)]
mod tests {
    use super::RunState;

    #[test]
    fn default_state_is_not_started() {
        assert_eq!(RunState::default(), RunState::NotStarted);
        assert!(!RunState::NotStarted.is_started());
    }

    #[test]
    fn killed_is_started_but_unavailable() {
        assert!(RunState::Killed.is_started());
        assert!(!RunState::Killed.is_available());
        assert!(RunState::SingleStep.is_available());
    }
}
