//! Bookkeeping for one load-to-completion cycle.

use std::collections::{BTreeMap, BTreeSet};

use crate::asm::Program;
use crate::puzzle::TestSet;
use crate::sim::mem::Memory;
use crate::sim::{StateUpdate, VariableValue};

use super::state::SolutionStats;

/// The mutable state of one run of a program against a puzzle's test sets.
///
/// A fresh session is created on every successful load and discarded on stop.
/// Only the [`Controller`] mutates it.
///
/// [`Controller`]: super::Controller
#[derive(Debug, Clone, Default)]
pub struct RunSession {
    program: Program,
    source_lines: Vec<String>,

    test_set: usize,
    input_cursor: usize,
    output_cursor: usize,
    actual_output: Vec<u8>,
    mismatches: BTreeSet<usize>,
    solution: Option<SolutionStats>,
    has_read_input: bool,
    reset_required: bool,

    // latest emulator state, for display
    cycles_executed: u64,
    memory_bytes_accessed: u64,
    address: u8,
    source_line: Option<usize>,
    variables: Vec<VariableValue>,
    memory: Memory,
}
impl RunSession {
    /// Creates a session for a freshly loaded program.
    pub fn new(program: Program, source_lines: Vec<String>) -> Self {
        Self {
            memory: Memory::with_program(&program),
            program,
            source_lines,
            ..Default::default()
        }
    }

    pub(super) fn read_input(&mut self, set: &TestSet) -> u8 {
        self.has_read_input = true;
        match set.input.get(self.input_cursor) {
            Some(&byte) => {
                self.input_cursor += 1;
                byte
            },
            None => 0,
        }
    }

    /// Verifies an output byte against the expected output.
    ///
    /// Returns whether the byte was correct, or `None` if all expected output was already written.
    pub(super) fn write_output(&mut self, set: &TestSet, value: u8) -> Option<bool> {
        let &expected = set.output.get(self.output_cursor)?;
        self.actual_output.push(value);

        let correct = value == expected;
        if !correct {
            self.mismatches.insert(self.output_cursor);
        }
        self.output_cursor += 1;
        Some(correct)
    }

    pub(super) fn write_memory(&mut self, addr: u8, value: u8) {
        self.memory[addr] = value;
    }

    pub(super) fn record(&mut self, update: &StateUpdate) {
        self.cycles_executed = update.cycles_executed;
        self.memory_bytes_accessed = update.memory_bytes_accessed;
        self.address = update.ip;
        self.source_line = update.source_line;
        self.variables.clone_from(&update.variables);
    }

    pub(super) fn is_set_finished(&self, set: &TestSet) -> bool {
        self.output_cursor == set.output.len()
    }

    /// Records solution statistics. Only the first call has any effect.
    pub(super) fn capture_solution(&mut self, stats: SolutionStats) {
        self.solution.get_or_insert(stats);
    }

    /// Moves on to the next test set. The emulator reset is deferred to the next step.
    pub(super) fn advance(&mut self) {
        self.test_set += 1;
        self.input_cursor = 0;
        self.output_cursor = 0;
        self.actual_output.clear();
        self.reset_required = true;
    }

    pub(super) fn take_reset(&mut self) -> bool {
        std::mem::take(&mut self.reset_required)
    }

    /// The loaded program.
    pub fn program(&self) -> &Program {
        &self.program
    }
    /// The loaded program's bytes.
    pub fn program_bytes(&self) -> &[u8] {
        self.program.bytes()
    }
    /// The loaded program's labels.
    pub fn labels(&self) -> &BTreeMap<String, u8> {
        self.program.labels()
    }
    /// The source lines the program was assembled from.
    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }

    /// Index of the test set currently being verified.
    pub fn test_set(&self) -> usize {
        self.test_set
    }
    /// Number of input bytes consumed from the current test set.
    pub fn input_cursor(&self) -> usize {
        self.input_cursor
    }
    /// Number of output bytes verified for the current test set.
    pub fn output_cursor(&self) -> usize {
        self.output_cursor
    }
    /// Output written during the current test set.
    pub fn actual_output(&self) -> &[u8] {
        &self.actual_output
    }
    /// Every output position which was ever incorrect.
    ///
    /// Positions are relative to the test set they occurred in.
    pub fn mismatches(&self) -> &BTreeSet<usize> {
        &self.mismatches
    }
    /// Statistics captured when the canonical test set completed.
    pub fn solution(&self) -> Option<SolutionStats> {
        self.solution
    }
    /// Whether the program has ever read input.
    pub fn has_read_input(&self) -> bool {
        self.has_read_input
    }
    /// Whether the emulator will be reset before the next step.
    pub fn is_reset_pending(&self) -> bool {
        self.reset_required
    }

    /// Instructions executed, as of the last state update.
    pub fn cycles_executed(&self) -> u64 {
        self.cycles_executed
    }
    /// Memory bytes accessed, as of the last state update.
    pub fn memory_bytes_accessed(&self) -> u64 {
        self.memory_bytes_accessed
    }
    /// The instruction pointer, as of the last state update.
    pub fn address(&self) -> u8 {
        self.address
    }
    /// The source line of the current instruction, if it is in user memory.
    pub fn source_line(&self) -> Option<usize> {
        self.source_line
    }
    /// Variable values, as of the last state update.
    pub fn variables(&self) -> &[VariableValue] {
        &self.variables
    }
    /// A mirror of the emulator's memory.
    pub fn memory(&self) -> &Memory {
        &self.memory
    }
}
