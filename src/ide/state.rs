//! Execution state of the controller.

/// Performance of a solution, measured on the canonical test set.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct SolutionStats {
    /// Instructions executed to finish the canonical test set.
    pub cycles_executed: u64,
    /// Memory bytes accessed to finish the canonical test set.
    pub memory_bytes_accessed: u64
}

/// Why a run entered the [`State::Error`] state.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Fault {
    /// The program wrote an unexpected byte.
    OutputMismatch {
        /// Index of the test set being verified.
        test_set: usize,
        /// Position of the byte within the test set's expected output.
        index: usize
    },
    /// The program assembled but has no instructions.
    EmptyProgram
}
impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fault::OutputMismatch { test_set, index } => write!(f, "incorrect output at position {index} of test set {test_set}"),
            Fault::EmptyProgram => f.write_str("program has no instructions"),
        }
    }
}

/// The state of the execution controller.
///
/// `Error` and `Done` are sticky: only a stop or reset leaves them.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Default)]
pub enum State {
    /// Nothing has executed since the last load, stop, or reset.
    #[default]
    Stopped,
    /// At least one step has executed and no terminal condition was hit.
    Running,
    /// The program stopped before every test set was completed.
    Halted,
    /// A fault occurred. Only the first fault is kept.
    Error {
        /// The first fault that occurred.
        fault: Fault,
        /// Whether the program has since halted.
        halted: bool
    },
    /// Every test set was completed without error.
    Done(SolutionStats)
}
impl State {
    /// The state after a step executes.
    pub fn started(self) -> Self {
        match self {
            State::Stopped => State::Running,
            s => s
        }
    }

    /// The state after a fault occurs.
    pub fn fault(self, fault: Fault) -> Self {
        match self {
            State::Stopped | State::Running => State::Error { fault, halted: false },
            State::Halted => State::Error { fault, halted: true },
            s @ (State::Error { .. } | State::Done(_)) => s,
        }
    }

    /// The state after the program stops early.
    pub fn halt(self) -> Self {
        match self {
            State::Stopped | State::Running => State::Halted,
            State::Error { fault, .. } => State::Error { fault, halted: true },
            s @ (State::Halted | State::Done(_)) => s,
        }
    }

    /// The state after the final test set completes.
    ///
    /// A run with a fault can never complete.
    pub fn complete(self, stats: SolutionStats) -> Self {
        match self {
            State::Stopped | State::Running => State::Done(stats),
            s => s
        }
    }

    /// Whether every test set was completed.
    pub fn is_done(&self) -> bool {
        matches!(self, State::Done(_))
    }
    /// Whether a fault occurred.
    pub fn has_error(&self) -> bool {
        matches!(self, State::Error { .. })
    }
    /// Whether the program stopped before completing.
    pub fn is_halted(&self) -> bool {
        matches!(self, State::Halted | State::Error { halted: true, .. })
    }
    /// The fault, if one occurred.
    pub fn fault_info(&self) -> Option<Fault> {
        match *self {
            State::Error { fault, .. } => Some(fault),
            _ => None
        }
    }
    /// Whether the program is mid-execution.
    pub fn is_executing(&self) -> bool {
        matches!(self, State::Running | State::Error { fault: Fault::OutputMismatch { .. }, halted: false })
    }

    /// A short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            State::Done(_) => "Completed",
            s if s.is_executing() => "Running",
            _ => "Stopped"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Fault, SolutionStats, State};

    const MISMATCH: Fault = Fault::OutputMismatch { test_set: 0, index: 2 };

    #[test]
    fn test_labels() {
        let stats = SolutionStats { cycles_executed: 4, memory_bytes_accessed: 24 };

        assert_eq!(State::Stopped.label(), "Stopped");
        assert_eq!(State::Stopped.started().label(), "Running");
        assert_eq!(State::Running.halt().label(), "Stopped");
        assert_eq!(State::Running.complete(stats).label(), "Completed");
        assert_eq!(State::Running.fault(MISMATCH).label(), "Running");
        assert_eq!(State::Running.fault(MISMATCH).halt().label(), "Stopped");
        assert_eq!(State::Stopped.fault(Fault::EmptyProgram).label(), "Stopped");
    }

    #[test]
    fn test_sticky() {
        let stats = SolutionStats::default();

        // first fault wins
        let s = State::Running.fault(MISMATCH).fault(Fault::EmptyProgram);
        assert_eq!(s.fault_info(), Some(MISMATCH));
        // faulted runs never complete
        assert!(!s.complete(stats).is_done());
        assert!(s.started().has_error());

        // done survives everything but an explicit stop
        let s = State::Running.complete(stats);
        assert!(s.fault(MISMATCH).is_done());
        assert!(s.halt().is_done());
        assert!(s.started().is_done());
    }

    #[test]
    fn test_halt_and_error() {
        let s = State::Running.halt();
        assert!(s.is_halted());
        assert!(!s.has_error());

        let s = s.fault(MISMATCH);
        assert_eq!(s, State::Error { fault: MISMATCH, halted: true });
        assert!(s.is_halted());
        assert!(!s.is_executing());
    }
}
