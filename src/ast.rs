//! Components relating to the abstract syntax tree of SIC-1 assembly.
//!
//! Each source line parses into a [`Line`], which holds any labels defined on that line
//! and at most one statement ([`Stmt`]).

use std::fmt::Write as _;

/// Address of the last byte of user memory (`@MAX`).
pub const ADDRESS_USER_MAX: u8 = 252;
/// Address which reads input (`@IN`).
pub const ADDRESS_INPUT: u8 = 253;
/// Address which writes output (`@OUT`).
pub const ADDRESS_OUTPUT: u8 = 254;
/// Address which halts execution when jumped to (`@HALT`).
pub const ADDRESS_HALT: u8 = 255;

/// A built-in address name, written with an `@` prefix.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Builtin {
    /// `@IN`
    In,
    /// `@OUT`
    Out,
    /// `@HALT`
    Halt,
    /// `@MAX`
    Max,
}
impl Builtin {
    /// The address this built-in refers to.
    pub fn address(self) -> u8 {
        match self {
            Builtin::In   => ADDRESS_INPUT,
            Builtin::Out  => ADDRESS_OUTPUT,
            Builtin::Halt => ADDRESS_HALT,
            Builtin::Max  => ADDRESS_USER_MAX,
        }
    }
}
impl std::str::FromStr for Builtin {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &*s.to_uppercase() {
            "IN"   => Ok(Builtin::In),
            "OUT"  => Ok(Builtin::Out),
            "HALT" => Ok(Builtin::Halt),
            "MAX"  => Ok(Builtin::Max),
            _ => Err(())
        }
    }
}
impl std::fmt::Display for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Builtin::In   => f.write_str("@IN"),
            Builtin::Out  => f.write_str("@OUT"),
            Builtin::Halt => f.write_str("@HALT"),
            Builtin::Max  => f.write_str("@MAX"),
        }
    }
}

/// A single byte-sized value, as written in an operand or a `.data` directive.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Value {
    /// A numeric literal. This is range-checked during assembly.
    Literal(i16),
    /// A character literal.
    Char(u8),
    /// A reference to a label, with an optional offset (e.g., `loop+3`).
    Label {
        /// Name of the label.
        name: String,
        /// Offset added to the label's address.
        offset: i16
    },
    /// A built-in address.
    Builtin(Builtin),
}
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Literal(n) => write!(f, "{n}"),
            Value::Char(c) if c.is_ascii_graphic() || *c == b' ' => write!(f, "'{}'", char::from(*c)),
            Value::Char(c) => write!(f, "{c}"),
            Value::Label { name, offset: 0 } => f.write_str(name),
            Value::Label { name, offset } if *offset > 0 => write!(f, "{name}+{offset}"),
            Value::Label { name, offset } => write!(f, "{name}{offset}"),
            Value::Builtin(b) => b.fmt(f),
        }
    }
}

/// An element of a `.data` directive.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DataItem {
    /// A single byte.
    Value(Value),
    /// A string literal, which expands to one byte per character.
    Str(Vec<u8>),
}
impl DataItem {
    /// Number of bytes this item occupies.
    pub fn len(&self) -> usize {
        match self {
            DataItem::Value(_) => 1,
            DataItem::Str(s) => s.len(),
        }
    }
    /// Whether this item occupies no bytes (an empty string literal).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A statement, which emits bytes into the program.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Stmt {
    /// `subleq A B [C]`
    Subleq {
        /// Address subtracted from (and written to).
        a: Value,
        /// Address subtracted.
        b: Value,
        /// Branch target if the result is not positive. Defaults to the next instruction.
        c: Option<Value>
    },
    /// `.data v ...`
    Data(Vec<DataItem>),
}
impl Stmt {
    /// Number of bytes this statement emits.
    pub fn len(&self) -> usize {
        match self {
            Stmt::Subleq { .. } => 3,
            Stmt::Data(items) => items.iter().map(DataItem::len).sum(),
        }
    }
    /// Whether this statement emits no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
impl std::fmt::Display for Stmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stmt::Subleq { a, b, c: None } => write!(f, "subleq {a} {b}"),
            Stmt::Subleq { a, b, c: Some(c) } => write!(f, "subleq {a} {b} {c}"),
            Stmt::Data(items) => {
                f.write_str(".data")?;
                for item in items {
                    match item {
                        DataItem::Value(v) => write!(f, " {v}")?,
                        DataItem::Str(s) => {
                            f.write_str(" \"")?;
                            for &b in s {
                                match b {
                                    b'\n' => f.write_str("\\n")?,
                                    b'"'  => f.write_str("\\\"")?,
                                    b'\\' => f.write_str("\\\\")?,
                                    0     => f.write_str("\\0")?,
                                    b => f.write_char(char::from(b))?,
                                }
                            }
                            f.write_char('"')?;
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

/// One parsed source line.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Line {
    /// Labels defined on this line.
    pub labels: Vec<String>,
    /// The statement on this line, if present.
    pub stmt: Option<Stmt>,
}

#[cfg(test)]
mod tests {
    use super::{Builtin, DataItem, Stmt, Value};

    #[test]
    fn test_stmt_len() {
        let stmt = Stmt::Subleq { a: Value::Literal(1), b: Value::Literal(2), c: None };
        assert_eq!(stmt.len(), 3);

        let stmt = Stmt::Data(vec![
            DataItem::Value(Value::Literal(0)),
            DataItem::Str(b"abc".to_vec()),
            DataItem::Str(vec![]),
        ]);
        assert_eq!(stmt.len(), 4);
    }

    #[test]
    fn test_display() {
        let stmt = Stmt::Subleq {
            a: Value::Builtin(Builtin::Out),
            b: Value::Label { name: "x".to_string(), offset: -1 },
            c: Some(Value::Label { name: "loop".to_string(), offset: 2 }),
        };
        assert_eq!(stmt.to_string(), "subleq @OUT x-1 loop+2");

        let stmt = Stmt::Data(vec![DataItem::Value(Value::Char(b'a')), DataItem::Str(b"hi\n".to_vec())]);
        assert_eq!(stmt.to_string(), ".data 'a' \"hi\\n\"");
    }
}
