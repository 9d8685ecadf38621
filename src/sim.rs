//! Emulating assembled SIC-1 programs.
//!
//! This module is focused on executing fully assembled code (i.e., [`Program`]).
//!
//! This module consists of:
//! - [`Emulator`]: The seam the execution controller uses to drive a machine.
//! - [`Hooks`]: The callbacks a machine invokes during execution (IO, memory writes, state updates).
//! - [`Sic1Emulator`]: The SIC-1 implementation of [`Emulator`].
//! - [`mem`]: The module handling memory.
//! - [`observer`]: The module tracking memory accesses.
//!
//! # Usage
//!
//! The emulator does not own its hooks. They are passed into every call that
//! can invoke them, so the caller is free to keep its own state alongside the emulator.
//!
//! ```
//! use sic1_ensemble::asm::assemble;
//! use sic1_ensemble::sim::{Emulator, Hooks, Sic1Emulator, StateUpdate};
//!
//! #[derive(Default)]
//! struct Echo { input: Vec<u8>, output: Vec<u8> }
//! impl Hooks for Echo {
//!     fn read_input(&mut self) -> u8 { self.input.pop().unwrap_or(0) }
//!     fn write_output(&mut self, value: u8) { self.output.push(value) }
//!     fn on_memory_write(&mut self, _addr: u8, _value: u8) {}
//!     fn on_state_update(&mut self, _state: &StateUpdate) {}
//! }
//!
//! let program = assemble(&[
//!     "subleq tmp, @IN",
//!     "subleq @OUT, tmp",
//!     "tmp: .data 0",
//! ]).unwrap();
//!
//! let mut hooks = Echo { input: vec![42], ..Default::default() };
//! let mut emu = Sic1Emulator::new(&program);
//! emu.step(&mut hooks);
//! emu.step(&mut hooks);
//!
//! assert_eq!(hooks.output, [42]);
//! assert_eq!(emu.cycles_executed(), 2);
//! ```
pub mod mem;
pub mod observer;

use crate::asm::Program;
use crate::ast::{ADDRESS_HALT, ADDRESS_INPUT, ADDRESS_OUTPUT, ADDRESS_USER_MAX};

use self::mem::Memory;
use self::observer::AccessObserver;

/// The current value of a labeled `.data` location.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct VariableValue {
    /// The label's name.
    pub label: String,
    /// The label's address.
    pub address: u8,
    /// The byte currently stored at the label's address.
    pub value: u8
}

/// A snapshot of emulator state, reported after every step.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct StateUpdate {
    /// Whether the emulator can continue executing.
    pub running: bool,
    /// The instruction pointer.
    pub ip: u8,
    /// Number of instructions executed since the last reset.
    pub cycles_executed: u64,
    /// Number of memory bytes accessed since the last reset.
    pub memory_bytes_accessed: u64,
    /// The 0-based source line of the instruction at `ip`, if `ip` is in user memory.
    pub source_line: Option<usize>,
    /// Current values of all variables.
    pub variables: Vec<VariableValue>
}

/// Callbacks invoked by an [`Emulator`] while it executes.
pub trait Hooks {
    /// Called when the program reads `@IN`. Returns the input byte.
    fn read_input(&mut self) -> u8;

    /// Called when the program writes to `@OUT`.
    fn write_output(&mut self, value: u8);

    /// Called whenever a byte of user memory is written.
    fn on_memory_write(&mut self, addr: u8, value: u8);

    /// Called after every step with the resulting state.
    fn on_state_update(&mut self, state: &StateUpdate);
}
impl dyn Hooks {} // assert Hooks is dyn safe

/// A machine that can execute a [`Program`] one step at a time.
pub trait Emulator {
    /// Creates a machine with the program loaded and ready to execute.
    fn load(program: &Program) -> Self where Self: Sized;

    /// Executes one step.
    ///
    /// This calls [`Hooks::on_state_update`] once the step completes.
    /// If the machine is not running, this does nothing.
    fn step(&mut self, hooks: &mut dyn Hooks);

    /// Restores the machine to its freshly-loaded state.
    ///
    /// Any bytes of memory changed by this call are reported through [`Hooks::on_memory_write`].
    fn reset(&mut self, hooks: &mut dyn Hooks);

    /// Gets a snapshot of the machine's current state.
    fn state(&self) -> StateUpdate;

    /// Whether the machine can continue executing.
    fn is_running(&self) -> bool;

    /// Whether the loaded program has no instructions.
    fn is_empty(&self) -> bool;

    /// Number of instructions executed since the last reset.
    fn cycles_executed(&self) -> u64;

    /// Number of memory bytes accessed since the last reset.
    fn memory_bytes_accessed(&self) -> u64;
}

/// Executes assembled SIC-1 code.
///
/// Each step executes one `subleq A B C` instruction:
/// `mem[A] = mem[A] - mem[B]`, then jump to `C` if the result (as a signed byte) is not positive.
///
/// Reading `@IN` requests a byte of input, writing `@OUT` produces a byte of output,
/// and jumping past `@MAX` (e.g., to `@HALT`) stops execution.
#[derive(Debug, Clone)]
pub struct Sic1Emulator {
    program: Program,

    /// The emulator's memory.
    pub mem: Memory,

    /// The instruction pointer.
    pub ip: u8,

    cycles_executed: u64,

    /// Tracks memory accesses.
    pub observer: AccessObserver,
}
impl Sic1Emulator {
    /// Creates an emulator with the given program loaded.
    pub fn new(program: &Program) -> Self {
        Self {
            program: program.clone(),
            mem: Memory::with_program(program),
            ip: 0,
            cycles_executed: 0,
            observer: Default::default()
        }
    }

    /// Reads the byte at the given address as an instruction operand.
    fn read(&mut self, addr: u8, hooks: &mut dyn Hooks) -> u8 {
        self.observer.record_read(addr);
        match addr {
            ADDRESS_INPUT => hooks.read_input(),
            ADDRESS_OUTPUT | ADDRESS_HALT => 0,
            _ => self.mem[addr]
        }
    }

    /// Writes the result of an instruction to the given address.
    fn write(&mut self, addr: u8, value: u8, hooks: &mut dyn Hooks) {
        match addr {
            ADDRESS_OUTPUT => {
                self.observer.record_write(addr, false);
                hooks.write_output(value);
            },
            ADDRESS_INPUT | ADDRESS_HALT => self.observer.record_write(addr, false),
            _ => {
                self.observer.record_write(addr, self.mem[addr] != value);
                self.mem[addr] = value;
                hooks.on_memory_write(addr, value);
            }
        }
    }

    /// Reads the instruction byte at the given address.
    fn fetch(&mut self, addr: u8) -> u8 {
        self.observer.record_read(addr);
        self.mem[addr]
    }
}
impl Emulator for Sic1Emulator {
    fn load(program: &Program) -> Self {
        Self::new(program)
    }

    fn step(&mut self, hooks: &mut dyn Hooks) {
        if !self.is_running() { return };

        self.observer.clear_step();

        let ip = self.ip;
        let a = self.fetch(ip);
        let b = self.fetch(ip.wrapping_add(1));
        let c = self.fetch(ip.wrapping_add(2));

        let result = self.read(a, hooks).wrapping_sub(self.read(b, hooks));
        self.write(a, result, hooks);

        self.ip = match (result as i8) <= 0 {
            true  => c,
            // ip <= @MAX, so this cannot overflow
            false => ip + 3,
        };
        self.cycles_executed += 1;

        hooks.on_state_update(&self.state());
    }

    fn reset(&mut self, hooks: &mut dyn Hooks) {
        let fresh = Memory::with_program(&self.program);
        for addr in 0..=u8::MAX {
            if self.mem[addr] != fresh[addr] {
                hooks.on_memory_write(addr, fresh[addr]);
            }
        }

        self.mem = fresh;
        self.ip = 0;
        self.cycles_executed = 0;
        self.observer.clear();
    }

    fn state(&self) -> StateUpdate {
        StateUpdate {
            running: self.is_running(),
            ip: self.ip,
            cycles_executed: self.cycles_executed,
            memory_bytes_accessed: self.memory_bytes_accessed(),
            source_line: match self.ip <= ADDRESS_USER_MAX {
                true  => self.program.source_line(self.ip),
                false => None,
            },
            variables: self.program.variables()
                .iter()
                .map(|v| VariableValue {
                    label: v.label.clone(),
                    address: v.address,
                    value: self.mem[v.address]
                })
                .collect()
        }
    }

    fn is_running(&self) -> bool {
        !self.program.is_empty() && self.ip <= ADDRESS_USER_MAX
    }

    fn is_empty(&self) -> bool {
        self.program.is_empty()
    }

    fn cycles_executed(&self) -> u64 {
        self.cycles_executed
    }

    fn memory_bytes_accessed(&self) -> u64 {
        self.observer.total()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use crate::asm::{assemble, Program};
    use crate::ast::ADDRESS_HALT;

    use super::{Emulator, Hooks, Sic1Emulator, StateUpdate};

    /// Hooks which record everything that happens.
    #[derive(Default)]
    struct Recorder {
        input: VecDeque<u8>,
        output: Vec<u8>,
        writes: Vec<(u8, u8)>,
        updates: Vec<StateUpdate>,
    }
    impl Hooks for Recorder {
        fn read_input(&mut self) -> u8 {
            self.input.pop_front().unwrap_or(0)
        }
        fn write_output(&mut self, value: u8) {
            self.output.push(value);
        }
        fn on_memory_write(&mut self, addr: u8, value: u8) {
            self.writes.push((addr, value));
        }
        fn on_state_update(&mut self, state: &StateUpdate) {
            self.updates.push(state.clone());
        }
    }

    fn program(src: &str) -> Program {
        let lines: Vec<_> = src.lines().collect();
        assemble(&lines).unwrap()
    }

    #[test]
    fn test_subleq_branching() {
        let prog = program("
            subleq x, one, neg   ; x = 2 - 1 = 1 > 0, fall through
            subleq x, one, zero  ; x = 1 - 1 = 0 <= 0, branch
            neg: subleq x, x
            zero: subleq x, one  ; x = 0 - 1 = -1
            x: .data 2
            one: .data 1
        ");
        let mut emu = Sic1Emulator::new(&prog);
        let mut hooks = Recorder::default();
        let x = prog.label_address("x").unwrap();

        emu.step(&mut hooks);
        assert_eq!(emu.mem[x], 1);
        assert_eq!(emu.ip, 3);

        emu.step(&mut hooks);
        assert_eq!(emu.mem[x], 0);
        assert_eq!(Some(emu.ip), prog.label_address("zero"));

        emu.step(&mut hooks);
        assert_eq!(emu.mem[x], 255);
        assert_eq!(hooks.writes, [(x, 1), (x, 0), (x, 255)]);
        assert_eq!(hooks.updates.len(), 3);
    }

    #[test]
    fn test_io() {
        let prog = program("
            loop: subleq tmp, @IN
            subleq @OUT, tmp
            subleq tmp, tmp, loop
            tmp: .data 0
        ");
        let mut emu = Sic1Emulator::new(&prog);
        let mut hooks = Recorder { input: VecDeque::from([1, 2, 3]), ..Default::default() };

        for _ in 0..9 {
            emu.step(&mut hooks);
        }
        assert_eq!(hooks.output, [1, 2, 3]);
        assert!(emu.is_running());
        assert_eq!(emu.cycles_executed(), 9);
        assert_eq!(emu.memory_bytes_accessed(), 9 * 6);
    }

    #[test]
    fn test_halt() {
        let prog = program("subleq x, x, @HALT\nx: .data 5");
        let mut emu = Sic1Emulator::new(&prog);
        let mut hooks = Recorder::default();

        assert!(emu.is_running());
        emu.step(&mut hooks);
        assert!(!emu.is_running());
        assert_eq!(emu.ip, ADDRESS_HALT);

        let last = hooks.updates.last().unwrap();
        assert!(!last.running);
        assert_eq!(last.source_line, None);

        // stepping a halted emulator does nothing
        emu.step(&mut hooks);
        assert_eq!(emu.cycles_executed(), 1);
        assert_eq!(hooks.updates.len(), 1);
    }

    #[test]
    fn test_empty() {
        let prog = program("x: .data 1 2 3");
        let mut emu = Sic1Emulator::new(&prog);
        let mut hooks = Recorder::default();

        assert!(emu.is_empty());
        assert!(!emu.is_running());
        emu.step(&mut hooks);
        assert_eq!(emu.cycles_executed(), 0);
        assert!(hooks.updates.is_empty());
    }

    #[test]
    fn test_reset() {
        let prog = program("
            subleq x, one
            subleq y, one
            x: .data 7
            y: .data 7
            one: .data 1
        ");
        let mut emu = Sic1Emulator::new(&prog);
        let mut hooks = Recorder::default();
        emu.step(&mut hooks);
        emu.step(&mut hooks);
        hooks.writes.clear();

        emu.reset(&mut hooks);
        assert_eq!(emu.ip, 0);
        assert_eq!(emu.cycles_executed(), 0);
        assert_eq!(emu.memory_bytes_accessed(), 0);
        assert_eq!(hooks.writes, [(6, 7), (7, 7)]);
        assert_eq!(emu.mem.as_slice()[..9], *prog.bytes());
    }

    #[test]
    fn test_state_variables() {
        let prog = program("subleq x, one\nx: .data 4\none: .data 1");
        let mut emu = Sic1Emulator::new(&prog);
        let state = emu.state();
        assert_eq!(state.source_line, Some(0));
        assert_eq!(state.variables.len(), 2);
        assert_eq!(state.variables[0].value, 4);

        emu.step(&mut Recorder::default());
        let state = emu.state();
        assert_eq!(state.variables[0].label, "x");
        assert_eq!(state.variables[0].value, 3);
        assert_eq!(state.source_line, Some(1));
    }
}
