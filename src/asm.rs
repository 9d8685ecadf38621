//! Assembling SIC-1 source lines into program images.
//!
//! This module is used to convert source lines into a [`Program`]
//! that can be executed by the emulator.
//!
//! The assembler module notably consists of:
//! - [`assemble`]: The main function which assembles source lines into a program.
//! - [`Assemble`]: The seam the execution controller uses to invoke an assembler.
//! - [`Program`]: The assembled program image, with its label map and debug information.
//! - [`CompilationError`]: The diagnostic produced when source fails to assemble.
//!
//! # Example
//! ```
//! use sic1_ensemble::asm::assemble;
//!
//! let src = [
//!     "loop: subleq @OUT, n_one",
//!     "      subleq zero, zero, loop",
//!     "n_one: .data -1",
//!     "zero: .data 0",
//! ];
//! let program = assemble(&src).unwrap();
//! assert_eq!(program.bytes(), &[254, 6, 3, 7, 7, 0, 255, 0]);
//! assert_eq!(program.label_address("n_one"), Some(6));
//! assert_eq!(program.instruction_count(), 2);
//! ```

use std::collections::BTreeMap;

use crate::ast::{DataItem, Line, Stmt, Value, ADDRESS_INPUT};
use crate::parse::{parse_line, ParseErr};

/// Maximum number of bytes a program may occupy (all of user memory).
pub const MAX_PROGRAM_BYTES: usize = ADDRESS_INPUT as usize;

/// Kinds of errors that can occur from assembling given assembly code.
///
/// See [`CompilationError`] for this error type with line information included.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum CompileErrKind {
    /// A line could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseErr),
    /// There were multiple labels of the same name.
    #[error("label was defined multiple times: {0}")]
    DuplicateLabel(String),
    /// A referenced label was never defined.
    #[error("label is not defined: {0}")]
    UndefinedLabel(String),
    /// A value does not fit in a byte.
    #[error("value {0} does not fit in a byte (must be between -128 and 255)")]
    ValueOutOfRange(i32),
    /// The program does not fit in user memory.
    #[error("program is {0} bytes, but only {MAX_PROGRAM_BYTES} bytes are available")]
    ProgramTooLarge(usize),
}

/// Error from assembling given assembly code.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
#[error("{}{kind}", line_prefix(.line))]
pub struct CompilationError {
    /// The kind of error.
    pub kind: CompileErrKind,
    /// The 1-based source line this error occurred on, if one applies.
    pub line: Option<usize>
}
fn line_prefix(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!("line {n}: "),
        None => String::new(),
    }
}
impl CompilationError {
    fn new(kind: impl Into<CompileErrKind>, line_index: Option<usize>) -> Self {
        Self { kind: kind.into(), line: line_index.map(|i| i + 1) }
    }
    /// The diagnostic message, without line information.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

/// A label attached to a `.data` statement, which is displayed as a variable.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Variable {
    /// The label's name.
    pub label: String,
    /// The label's address.
    pub address: u8
}

/// An assembled program image.
///
/// This is produced once per load and is immutable thereafter.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Program {
    bytes: Vec<u8>,
    labels: BTreeMap<String, u8>,
    variables: Vec<Variable>,
    source_map: Vec<usize>,
    instruction_count: usize,
}
impl Program {
    /// The program's bytes, loaded starting at address 0.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
    /// All labels and their addresses.
    pub fn labels(&self) -> &BTreeMap<String, u8> {
        &self.labels
    }
    /// Gets the address of a label, if it is defined.
    pub fn label_address(&self, label: &str) -> Option<u8> {
        self.labels.get(label).copied()
    }
    /// Labels attached to `.data` statements, in source order.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
    /// Gets the 0-based source line which emitted the byte at the given address.
    pub fn source_line(&self, addr: u8) -> Option<usize> {
        self.source_map.get(usize::from(addr)).copied()
    }
    /// Number of `subleq` instructions in this program.
    pub fn instruction_count(&self) -> usize {
        self.instruction_count
    }
    /// Whether this program has no instructions to execute.
    pub fn is_empty(&self) -> bool {
        self.instruction_count == 0
    }
}

/// Something that can compile source lines into a [`Program`].
///
/// The execution controller uses this to compile source on load.
pub trait Assemble {
    /// Assembles the given source lines.
    fn assemble(&self, lines: &[String]) -> Result<Program, CompilationError>;
}

/// The SIC-1 assembler.
#[derive(Debug, Default, Clone, Copy)]
pub struct Assembler;
impl Assemble for Assembler {
    fn assemble(&self, lines: &[String]) -> Result<Program, CompilationError> {
        assemble(lines)
    }
}

/// Assembles SIC-1 source lines into a program.
///
/// Assembly occurs in two passes:
/// 1. Every line is parsed and every label is assigned an address.
/// 2. Every statement is emitted, with label references resolved.
pub fn assemble<S: AsRef<str>>(lines: &[S]) -> Result<Program, CompilationError> {
    let parsed = lines.iter()
        .enumerate()
        .map(|(i, l)| parse_line(l.as_ref()).map_err(|e| CompilationError::new(e, Some(i))))
        .collect::<Result<Vec<_>, _>>()?;

    let sym = SymbolTable::new(&parsed)?;

    let mut program = Program {
        bytes: Vec::with_capacity(sym.size),
        labels: sym.labels,
        variables: sym.variables,
        source_map: Vec::with_capacity(sym.size),
        instruction_count: 0
    };

    for (i, line) in parsed.iter().enumerate() {
        let Some(stmt) = &line.stmt else { continue };
        let resolve = |v: &Value| resolve_value(v, &program.labels)
            .map_err(|e| CompilationError::new(e, Some(i)));

        let start = program.bytes.len();
        match stmt {
            Stmt::Subleq { a, b, c } => {
                let a = resolve(a)?;
                let b = resolve(b)?;
                let c = match c {
                    Some(c) => resolve(c)?,
                    // this fits, since the program fits in memory
                    None => (start + 3) as u8,
                };
                program.bytes.extend([a, b, c]);
                program.instruction_count += 1;
            },
            Stmt::Data(items) => for item in items {
                match item {
                    DataItem::Value(v) => program.bytes.push(resolve(v)?),
                    DataItem::Str(s) => program.bytes.extend_from_slice(s),
                }
            }
        }
        program.source_map.resize(program.bytes.len(), i);
    }

    Ok(program)
}

/// Label information computed during the first pass.
struct SymbolTable {
    labels: BTreeMap<String, u8>,
    variables: Vec<Variable>,
    size: usize
}
impl SymbolTable {
    fn new(lines: &[Line]) -> Result<Self, CompilationError> {
        let mut labels = BTreeMap::new();
        let mut variables = vec![];
        let mut pending: Vec<&str> = vec![];
        let mut addr = 0usize;

        for (i, line) in lines.iter().enumerate() {
            for label in &line.labels {
                let taken = labels.contains_key(label) || pending.contains(&label.as_str());
                if taken {
                    return Err(CompilationError::new(CompileErrKind::DuplicateLabel(label.clone()), Some(i)));
                }
                pending.push(label);
            }

            let Some(stmt) = &line.stmt else { continue };
            if addr + stmt.len() > MAX_PROGRAM_BYTES {
                return Err(CompilationError::new(CompileErrKind::ProgramTooLarge(addr + stmt.len()), Some(i)));
            }

            for label in pending.drain(..) {
                // addr < MAX_PROGRAM_BYTES, so this fits
                labels.insert(label.to_string(), addr as u8);
                if let Stmt::Data(_) = stmt {
                    variables.push(Variable { label: label.to_string(), address: addr as u8 });
                }
            }
            addr += stmt.len();
        }

        // Trailing labels point past the end of the program.
        for label in pending {
            // addr <= MAX_PROGRAM_BYTES, so this fits
            labels.insert(label.to_string(), addr as u8);
        }

        Ok(Self { labels, variables, size: addr })
    }
}

fn resolve_value(value: &Value, labels: &BTreeMap<String, u8>) -> Result<u8, CompileErrKind> {
    let n = match value {
        Value::Literal(n) => i32::from(*n),
        Value::Char(c) => return Ok(*c),
        Value::Builtin(b) => return Ok(b.address()),
        Value::Label { name, offset } => {
            let addr = labels.get(name)
                .ok_or_else(|| CompileErrKind::UndefinedLabel(name.clone()))?;
            let n = i32::from(*addr) + i32::from(*offset);
            return u8::try_from(n).map_err(|_| CompileErrKind::ValueOutOfRange(n));
        }
    };

    match n {
        // negative values are stored in two's complement
        -128..=255 => Ok(n as u8),
        _ => Err(CompileErrKind::ValueOutOfRange(n))
    }
}
