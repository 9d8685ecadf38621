//! A SIC-1 assembler, emulator, and execution controller.
//!
//! This is meant to be the backend of an interactive SIC-1 programming-puzzle environment:
//! programs are assembled, stepped (or run continuously), and have their output verified
//! against a puzzle's test sets.
//!
//! # Usage
//!
//! To convert SIC-1 source to a program image, it must be assembled:
//! ```
//! use sic1_ensemble::asm::assemble;
//!
//! let program = assemble(&[
//!     "subleq @OUT, n_one",
//!     "n_one: .data -1",
//! ]).unwrap();
//! assert_eq!(program.bytes(), &[254, 3, 3, 255]);
//! ```
//!
//! Executing a program against a puzzle is handled by the [`ide::Controller`]:
//! ```
//! use sic1_ensemble::ide::{Controller, Event, State};
//! use sic1_ensemble::puzzle::{self, CanonicalProvider, TestProvider};
//!
//! let echo = puzzle::find("Echo").unwrap();
//! let mut controller = Controller::new(CanonicalProvider.tests_for(echo));
//! let events = controller.subscribe();
//!
//! controller.load("
//!     loop: subleq tmp, @IN
//!           subleq @OUT, tmp
//!           subleq tmp, tmp, loop
//!     tmp:  .data 0
//! ").unwrap();
//!
//! while !controller.is_done() && !controller.has_error() {
//!     controller.step();
//! }
//! assert!(matches!(controller.state(), State::Done(_)));
//! assert!(events.try_iter().any(|e| matches!(e, Event::PuzzleCompleted { .. })));
//! ```
//!
//! For continuous execution on a background thread, see [`ide::Ide`].
#![warn(missing_docs)]

pub mod parse;
pub mod ast;
pub mod asm;
pub mod sim;
pub mod puzzle;
pub mod ide;
