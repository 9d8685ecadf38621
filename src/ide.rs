//! Execution control for the SIC-1 development environment.
//!
//! This module consists of:
//! - [`Controller`]: Loads programs, steps them, and verifies their output against a puzzle's test sets.
//! - [`AutoStepper`]: Ticks a shared controller from a background thread.
//! - [`Ide`]: A controller and its stepper, bundled together.
//! - [`State`], [`RunSession`]: What the controller reports.
//! - [`Event`]: Notifications for the surrounding application.
//!
//! # Example
//!
//! ```
//! use sic1_ensemble::ide::{Ide, IdeConfig, State};
//! use sic1_ensemble::puzzle::{PuzzleTest, TestSet};
//!
//! let tests = PuzzleTest::single(TestSet::new([3, 4], [3, 4]));
//! let mut ide = Ide::new(tests, IdeConfig::default());
//!
//! ide.load("
//!     loop: subleq tmp, @IN
//!           subleq @OUT, tmp
//!           subleq tmp, tmp, loop
//!     tmp:  .data 0
//! ").unwrap();
//!
//! for _ in 0..5 {
//!     ide.step();
//! }
//! let state = ide.with_controller(|c| c.state());
//! assert!(matches!(state, State::Done(_)));
//! ```
mod controller;
mod session;
mod state;
mod stepper;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel as cbc;

use crate::asm::CompilationError;
use crate::puzzle::PuzzleTest;

pub use controller::Controller;
pub use session::RunSession;
pub use state::{Fault, SolutionStats, State};
pub use stepper::AutoStepper;

/// Notifications raised by the [`Controller`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Event {
    /// The source failed to assemble.
    CompilationFailed(CompilationError),
    /// The program stopped before completing every test set.
    Halted,
    /// The program has no instructions.
    NoProgram,
    /// Every test set was completed. This fires once per session.
    PuzzleCompleted {
        /// Instructions executed to finish the canonical test set.
        cycles_executed: u64,
        /// Memory bytes accessed to finish the canonical test set.
        memory_bytes_accessed: u64,
        /// The program's bytes.
        program_bytes: Vec<u8>
    },
    /// An output byte matched the expected output.
    OutputCorrect,
    /// An output byte did not match the expected output.
    OutputIncorrect,
    /// The source should be saved.
    SaveRequested,
}

/// Configuration for an [`Ide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdeConfig {
    /// Time between automatic steps while running.
    ///
    /// Default: 20 ms
    pub auto_step_interval: Duration
}
impl Default for IdeConfig {
    fn default() -> Self {
        Self { auto_step_interval: Duration::from_millis(20) }
    }
}

/// Locks the mutex, recovering the guard if the mutex was poisoned.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A shared [`Controller`] along with the [`AutoStepper`] that runs it.
///
/// At most one stepper exists at a time.
/// Pausing, stopping, or resetting cancels it before returning.
#[derive(Debug)]
pub struct Ide {
    stepper: Option<AutoStepper>,
    controller: Arc<Mutex<Controller>>,
    config: IdeConfig,
}
impl Ide {
    /// Creates an environment for the given test sets.
    pub fn new(tests: PuzzleTest, config: IdeConfig) -> Self {
        Self {
            stepper: None,
            controller: Arc::new(Mutex::new(Controller::new(tests))),
            config,
        }
    }

    /// The configuration.
    pub fn config(&self) -> &IdeConfig {
        &self.config
    }

    /// Calls the function with the locked controller.
    pub fn with_controller<R>(&self, f: impl FnOnce(&mut Controller) -> R) -> R {
        f(&mut lock(&self.controller))
    }

    fn cancel_stepper(&mut self) {
        if let Some(stepper) = self.stepper.take() {
            stepper.cancel();
        }
    }

    /// Assembles the source and starts a new session. See [`Controller::load`].
    pub fn load(&mut self, source: &str) -> Result<(), CompilationError> {
        let result = self.with_controller(|c| c.load(source));
        if result.is_ok() {
            self.cancel_stepper();
        }
        result
    }

    /// Stops stepping automatically, then executes one instruction. See [`Controller::step`].
    pub fn step(&mut self) {
        self.with_controller(|c| {
            c.pause();
            c.step();
        });
        self.cancel_stepper();
    }

    /// Starts stepping the program at the configured interval. See [`Controller::run`].
    pub fn run(&mut self, source: &str) -> Result<(), CompilationError> {
        let ticks = cbc::tick(self.config.auto_step_interval);
        self.run_driven_by(source, ticks)
    }

    /// Starts stepping the program once per tick received.
    pub fn run_driven_by(&mut self, source: &str, ticks: cbc::Receiver<Instant>) -> Result<(), CompilationError> {
        self.cancel_stepper();
        let active = self.with_controller(|c| -> Result<bool, CompilationError> {
            c.run(source)?;
            Ok(c.is_auto_stepping())
        })?;

        if active {
            self.stepper = Some(AutoStepper::spawn(Arc::downgrade(&self.controller), ticks));
        }
        Ok(())
    }

    /// Stops stepping automatically. See [`Controller::pause`].
    pub fn pause(&mut self) {
        self.with_controller(Controller::pause);
        self.cancel_stepper();
    }

    /// Discards the session. See [`Controller::stop`].
    pub fn stop(&mut self) {
        self.with_controller(Controller::stop);
        self.cancel_stepper();
    }

    /// Stops and switches to different test sets. See [`Controller::reset`].
    pub fn reset(&mut self, tests: PuzzleTest) {
        self.with_controller(|c| c.reset(tests));
        self.cancel_stepper();
    }

    /// Creates a receiver for the controller's events.
    pub fn subscribe(&self) -> cbc::Receiver<Event> {
        self.with_controller(Controller::subscribe)
    }

    /// Whether a stepper is currently running the program.
    pub fn is_running(&self) -> bool {
        self.stepper.as_ref().is_some_and(|s| !s.is_finished())
    }

    /// Waits until the stepper exits on its own.
    pub fn join(&mut self) {
        if let Some(stepper) = self.stepper.take() {
            stepper.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crossbeam_channel as cbc;

    use crate::puzzle::{self, PuzzleTest, RandomProvider, TestProvider, TestSet};

    use super::{Event, Ide, IdeConfig, State};

    const ECHO: &str = "
        loop: subleq tmp, @IN
        subleq @OUT, tmp
        subleq tmp, tmp, loop
        tmp: .data 0
    ";

    fn ticks(n: usize) -> cbc::Receiver<Instant> {
        let (tx, rx) = cbc::bounded(n);
        for _ in 0..n {
            tx.send(Instant::now()).unwrap();
        }
        rx
    }

    fn echo_tests() -> PuzzleTest {
        RandomProvider::seeded(99).tests_for(puzzle::find("Echo").unwrap())
    }

    #[test]
    fn test_run_matches_manual_steps() {
        let tests = echo_tests();
        // 3 instructions per byte
        let n = tests.test_sets().iter()
            .map(|s| s.output.len() * 3 - 1)
            .sum::<usize>();

        let mut manual = Ide::new(tests.clone(), IdeConfig::default());
        manual.load(ECHO).unwrap();
        for _ in 0..n {
            manual.step();
        }

        let mut auto = Ide::new(tests, IdeConfig::default());
        auto.run_driven_by(ECHO, ticks(n)).unwrap();
        auto.join();

        let (m_state, m_session) = manual.with_controller(|c| (c.state(), c.session().clone()));
        let (a_state, a_session) = auto.with_controller(|c| (c.state(), c.session().clone()));
        assert!(matches!(m_state, State::Done(_)));
        assert_eq!(m_state, a_state);
        assert_eq!(m_session.test_set(), a_session.test_set());
        assert_eq!(m_session.actual_output(), a_session.actual_output());
        assert_eq!(m_session.mismatches(), a_session.mismatches());
        assert_eq!(m_session.solution(), a_session.solution());
        assert_eq!(m_session.cycles_executed(), a_session.cycles_executed());
        assert_eq!(m_session.memory(), a_session.memory());
    }

    #[test]
    fn test_pause_stops_ticks() {
        let mut ide = Ide::new(PuzzleTest::single(TestSet::new([1, 2, 3], [1, 2, 3])), IdeConfig::default());
        let events = ide.subscribe();

        let (tx, rx) = cbc::unbounded();
        ide.run_driven_by(ECHO, rx).unwrap();
        assert!(ide.is_running());
        tx.send(Instant::now()).unwrap();
        tx.send(Instant::now()).unwrap();

        // the second step writes the first output
        assert_eq!(events.recv_timeout(Duration::from_secs(5)), Ok(Event::OutputCorrect));
        ide.pause();
        assert!(!ide.is_running());

        let _ = tx.send(Instant::now());
        let (cycles, bytes) = ide.with_controller(|c| {
            (c.session().cycles_executed(), c.session().memory_bytes_accessed())
        });
        assert_eq!((cycles, bytes), (2, 12));
        assert_eq!(ide.with_controller(|c| c.state()), State::Running);
    }

    #[test]
    fn test_manual_step_pauses() {
        let mut ide = Ide::new(PuzzleTest::single(TestSet::new([1, 2, 3], [1, 2, 3])), IdeConfig::default());
        let (tx, rx) = cbc::unbounded();
        ide.run_driven_by(ECHO, rx).unwrap();
        assert!(ide.is_running());

        ide.step();
        assert!(!ide.is_running());
        assert!(!ide.with_controller(|c| c.is_auto_stepping()));

        let _ = tx.send(Instant::now());
        assert_eq!(ide.with_controller(|c| c.session().cycles_executed()), 1);
    }

    #[test]
    fn test_run_with_timer() {
        let config = IdeConfig { auto_step_interval: Duration::from_millis(1) };
        let mut ide = Ide::new(PuzzleTest::single(TestSet::new([5], [5])), config);
        ide.run(ECHO).unwrap();
        ide.join();

        assert!(ide.with_controller(|c| c.is_done()));
        assert!(!ide.is_running());
    }

    #[test]
    fn test_compile_error_does_not_start() {
        let mut ide = Ide::new(echo_tests(), IdeConfig::default());
        let events = ide.subscribe();

        let err = ide.run("subleq").unwrap_err();
        assert_eq!(err.line, Some(1));
        assert!(!ide.is_running());
        assert!(matches!(events.try_recv(), Ok(Event::CompilationFailed(_))));
    }

    #[test]
    fn test_stop_and_reset() {
        let mut ide = Ide::new(echo_tests(), IdeConfig::default());
        let (_tx, rx) = cbc::unbounded::<Instant>();
        ide.run_driven_by(ECHO, rx).unwrap();
        ide.step();

        ide.stop();
        assert!(!ide.is_running());
        ide.with_controller(|c| {
            assert_eq!(c.state(), State::Stopped);
            assert!(!c.is_loaded());
        });

        ide.reset(PuzzleTest::single(TestSet::default()));
        assert_eq!(ide.with_controller(|c| c.tests().len()), 1);
    }
}
