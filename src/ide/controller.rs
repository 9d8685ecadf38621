//! The execution controller.

use crossbeam_channel as cbc;

use crate::asm::{Assemble, Assembler, CompilationError};
use crate::ast::ADDRESS_HALT;
use crate::puzzle::{PuzzleTest, TestSet};
use crate::sim::{Emulator, Hooks, Sic1Emulator, StateUpdate};

use super::session::RunSession;
use super::state::{Fault, SolutionStats, State};
use super::Event;

/// Delivers events to every live subscriber.
#[derive(Debug, Default)]
struct EventBus {
    subscribers: Vec<cbc::Sender<Event>>
}
impl EventBus {
    fn subscribe(&mut self) -> cbc::Receiver<Event> {
        let (tx, rx) = cbc::unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: Event) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Drives an emulator through a program and verifies its output against a puzzle's test sets.
///
/// The controller is synchronous: every operation returns once its work is done.
/// For continuous execution, [`Controller::run`] only marks the controller as auto-stepping;
/// something else (typically an [`AutoStepper`]) must call [`Controller::tick`] periodically.
///
/// [`AutoStepper`]: super::AutoStepper
#[derive(Debug)]
pub struct Controller<A = Assembler, E = Sic1Emulator> {
    assembler: A,
    tests: PuzzleTest,
    session: RunSession,
    emulator: Option<E>,
    state: State,
    auto_step: bool,
    events: EventBus,
}

impl Controller {
    /// Creates a controller for the given test sets, using the SIC-1 assembler and emulator.
    pub fn new(tests: PuzzleTest) -> Self {
        Self::with_assembler(Assembler, tests)
    }
}
impl<A: Assemble, E: Emulator> Controller<A, E> {
    /// Creates a controller with a custom assembler.
    pub fn with_assembler(assembler: A, tests: PuzzleTest) -> Self {
        Self {
            assembler,
            tests,
            session: RunSession::default(),
            emulator: None,
            state: State::Stopped,
            auto_step: false,
            events: EventBus::default(),
        }
    }

    /// Assembles the source and starts a new session.
    ///
    /// If assembly fails, the error is returned and reported as [`Event::CompilationFailed`],
    /// and the controller is otherwise unchanged.
    pub fn load(&mut self, source: &str) -> Result<(), CompilationError> {
        let lines: Vec<String> = source.lines().map(String::from).collect();
        let program = match self.assembler.assemble(&lines) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(line = ?e.line, error = %e, "compilation failed");
                self.events.emit(Event::CompilationFailed(e.clone()));
                return Err(e);
            }
        };

        let emulator = E::load(&program);
        tracing::info!(
            bytes = program.bytes().len(),
            instructions = program.instruction_count(),
            "program loaded"
        );

        self.session = RunSession::new(program, lines);
        self.session.record(&emulator.state());
        self.state = State::Stopped;
        self.auto_step = false;

        // an empty program never steps, so no later state update can detect this
        if emulator.is_empty() {
            tracing::warn!("program has no instructions");
            self.state = self.state.fault(Fault::EmptyProgram);
            self.events.emit(Event::NoProgram);
        }
        self.emulator = Some(emulator);

        Ok(())
    }

    /// Whether a step would execute an instruction.
    fn can_step(&self) -> bool {
        match &self.emulator {
            Some(emu) => !self.state.is_done() && (self.session.is_reset_pending() || emu.is_running()),
            None => false,
        }
    }

    /// Executes one instruction.
    ///
    /// This does nothing if no program is loaded, the puzzle is done, or the program has halted.
    pub fn step(&mut self) {
        if !self.can_step() { return };
        let Some(emulator) = self.emulator.as_mut() else { return };

        self.state = self.state.started();

        let set = &self.tests[self.session.test_set()];
        let mut hooks = SessionHooks {
            session: &mut self.session,
            set,
            tests: &self.tests,
            state: &mut self.state,
            events: &mut self.events,
        };
        if hooks.session.take_reset() {
            tracing::debug!(test_set = hooks.session.test_set(), "resetting emulator for next test set");
            emulator.reset(&mut hooks);
        }
        emulator.step(&mut hooks);

        if !self.state.is_done() && !self.session.is_reset_pending() && !emulator.is_running() {
            tracing::info!(
                test_set = self.session.test_set(),
                cycles = emulator.cycles_executed(),
                "program halted before completing"
            );
            self.state = self.state.halt();
            self.auto_step = false;
            self.events.emit(Event::Halted);
        }
        if self.state.is_done() || self.state.has_error() {
            self.auto_step = false;
        }
    }

    /// Starts continuous execution.
    ///
    /// If no program is loaded (or the loaded one halted), the source is loaded first.
    /// Afterwards, [`Controller::tick`] steps the program until it halts, errors, completes, or is paused.
    pub fn run(&mut self, source: &str) -> Result<(), CompilationError> {
        if self.emulator.is_none() || self.state.is_halted() {
            self.load(source)?;
        }
        self.auto_step = self.can_step();
        tracing::debug!(auto_step = self.auto_step, "run requested");
        Ok(())
    }

    /// Performs one scheduled step.
    ///
    /// This steps only if the controller is auto-stepping,
    /// and returns whether it is still auto-stepping afterwards.
    pub fn tick(&mut self) -> bool {
        if !self.auto_step { return false };
        self.step();
        self.auto_step
    }

    /// Stops continuous execution. The session is left as is.
    pub fn pause(&mut self) {
        if std::mem::take(&mut self.auto_step) {
            tracing::debug!(cycles = self.session.cycles_executed(), "paused");
        }
    }

    /// Discards the session and returns to [`State::Stopped`].
    ///
    /// The current test sets are kept. Use [`Controller::reset`] to replace them.
    pub fn stop(&mut self) {
        self.auto_step = false;
        self.emulator = None;
        self.session = RunSession::default();
        self.state = State::Stopped;
        tracing::debug!("stopped");
    }

    /// Stops and switches to a different set of tests.
    pub fn reset(&mut self, tests: PuzzleTest) {
        self.stop();
        self.tests = tests;
    }

    /// Creates a receiver for this controller's events.
    pub fn subscribe(&mut self) -> cbc::Receiver<Event> {
        self.events.subscribe()
    }

    /// Notifies subscribers that the source should be saved.
    pub fn request_save(&mut self) {
        self.events.emit(Event::SaveRequested);
    }

    /// The current state.
    pub fn state(&self) -> State {
        self.state
    }
    /// The current session.
    pub fn session(&self) -> &RunSession {
        &self.session
    }
    /// The test sets being verified against.
    pub fn tests(&self) -> &PuzzleTest {
        &self.tests
    }
    /// The emulator, if a program is loaded.
    pub fn emulator(&self) -> Option<&E> {
        self.emulator.as_ref()
    }
    /// Whether a program is loaded.
    pub fn is_loaded(&self) -> bool {
        self.emulator.is_some()
    }
    /// Whether [`Controller::tick`] will step.
    pub fn is_auto_stepping(&self) -> bool {
        self.auto_step
    }
    /// Whether the program is mid-execution.
    pub fn is_executing(&self) -> bool {
        self.state.is_executing()
    }
    /// Whether any step has executed since the last load.
    pub fn has_started(&self) -> bool {
        self.state != State::Stopped && self.state.fault_info() != Some(Fault::EmptyProgram)
    }
    /// Whether every test set was completed.
    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }
    /// Whether a fault occurred.
    pub fn has_error(&self) -> bool {
        self.state.has_error()
    }
    /// Whether the program has read input during this session.
    pub fn has_read_input(&self) -> bool {
        self.session.has_read_input()
    }
    /// The loaded program's bytes.
    pub fn program_bytes(&self) -> &[u8] {
        self.session.program_bytes()
    }
    /// Position of the next input byte, if the current test set has input left.
    pub fn input_index(&self) -> Option<usize> {
        let cursor = self.session.input_cursor();
        (cursor < self.current_set().input.len()).then_some(cursor)
    }
    /// Position of the next expected output byte, if the current test set expects more output.
    pub fn output_index(&self) -> Option<usize> {
        let cursor = self.session.output_cursor();
        (cursor < self.current_set().output.len()).then_some(cursor)
    }
    fn current_set(&self) -> &TestSet {
        // the session is discarded whenever the tests change, so this is always in bounds
        &self.tests[self.session.test_set()]
    }
}

/// Emulator hooks which update the session while a step executes.
struct SessionHooks<'a> {
    session: &'a mut RunSession,
    set: &'a TestSet,
    tests: &'a PuzzleTest,
    state: &'a mut State,
    events: &'a mut EventBus,
}
impl Hooks for SessionHooks<'_> {
    fn read_input(&mut self) -> u8 {
        self.session.read_input(self.set)
    }

    fn write_output(&mut self, value: u8) {
        let index = self.session.output_cursor();
        match self.session.write_output(self.set, value) {
            Some(true) => self.events.emit(Event::OutputCorrect),
            Some(false) => {
                let test_set = self.session.test_set();
                tracing::debug!(test_set, index, value, "incorrect output");
                *self.state = self.state.fault(Fault::OutputMismatch { test_set, index });
                self.events.emit(Event::OutputIncorrect);
            },
            None => tracing::trace!(value, "output past end of test set"),
        }
    }

    fn on_memory_write(&mut self, addr: u8, value: u8) {
        self.session.write_memory(addr, value);
    }

    fn on_state_update(&mut self, update: &StateUpdate) {
        self.session.record(update);

        // a jump to @HALT still counts, so a program may halt right after its last output
        let running = update.running || update.ip == ADDRESS_HALT;
        if !running
            || !self.session.is_set_finished(self.set)
            || self.state.has_error()
            || self.state.is_done()
        {
            return;
        }

        let test_set = self.session.test_set();
        if test_set == 0 {
            self.session.capture_solution(SolutionStats {
                cycles_executed: update.cycles_executed,
                memory_bytes_accessed: update.memory_bytes_accessed,
            });
        }

        if test_set + 1 < self.tests.len() {
            tracing::debug!(test_set = test_set + 1, "advancing to next test set");
            self.session.advance();
        } else {
            let stats = self.session.solution().unwrap_or_default();
            tracing::info!(
                cycles = stats.cycles_executed,
                bytes = stats.memory_bytes_accessed,
                "puzzle completed"
            );
            *self.state = self.state.complete(stats);
            self.events.emit(Event::PuzzleCompleted {
                cycles_executed: stats.cycles_executed,
                memory_bytes_accessed: stats.memory_bytes_accessed,
                program_bytes: self.session.program_bytes().to_vec(),
            });
        }
    }
}
