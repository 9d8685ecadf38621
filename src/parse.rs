//! Parsing SIC-1 assembly source lines into an AST.
//!
//! Source is parsed one line at a time with [`parse_line`], which
//! tokenizes the line (see [`lex`]) and produces a [`Line`].
//!
//! ```
//! use sic1_ensemble::parse::parse_line;
//! use sic1_ensemble::ast::{Builtin, Stmt, Value};
//!
//! let line = parse_line("loop: subleq @OUT, n_one ; print 1").unwrap();
//! assert_eq!(line.labels, ["loop"]);
//! assert_eq!(line.stmt, Some(Stmt::Subleq {
//!     a: Value::Builtin(Builtin::Out),
//!     b: Value::Label { name: "n_one".to_string(), offset: 0 },
//!     c: None
//! }));
//! ```

pub mod lex;

use std::iter::Peekable;
use std::ops::Range;

use logos::Logos;

use crate::ast::{DataItem, Line, Stmt, Value};
use lex::{LexErr, Token};

/// Errors that can occur while parsing a single source line.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum ParseErr {
    /// The line could not be tokenized.
    #[error(transparent)]
    Lex(#[from] LexErr),
    /// A token appeared where it is not allowed.
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    /// An instruction or directive was missing operands.
    #[error("{0} is missing operands")]
    MissingOperand(&'static str),
    /// An instruction was given too many operands.
    #[error("subleq takes at most 3 operands")]
    TooManyOperands,
    /// An identifier was used as an instruction but is not one.
    #[error("unknown instruction: {0}")]
    UnknownInstruction(String),
    /// A directive was used which does not exist.
    #[error("unknown directive: .{0}")]
    UnknownDirective(String),
}

type Tokens = Peekable<std::vec::IntoIter<(Token, Range<usize>)>>;

/// Parses a single line of SIC-1 assembly.
pub fn parse_line(src: &str) -> Result<Line, ParseErr> {
    let tokens: Vec<_> = Token::lexer(src)
        .spanned()
        .map(|(tok, span)| tok.map(|t| (t, span)))
        .filter(|r| !matches!(r, Ok((Token::Comment, _))))
        .collect::<Result<_, _>>()?;

    let mut tokens = tokens.into_iter().peekable();
    let mut line = Line::default();

    // Labels:
    while let Some((Token::Ident(_), _)) = tokens.peek() {
        let mut lookahead = tokens.clone();
        lookahead.next();
        if !matches!(lookahead.peek(), Some((Token::Colon, _))) { break; }

        if let Some((Token::Ident(name), _)) = tokens.next() {
            line.labels.push(name);
        }
        tokens.next(); // colon
    }

    let Some((head, _)) = tokens.next() else { return Ok(line) };
    let stmt = match head {
        Token::Ident(id) if id.eq_ignore_ascii_case("subleq") => parse_subleq(&mut tokens)?,
        Token::Ident(id) => return Err(ParseErr::UnknownInstruction(id)),
        Token::Directive(d) if d.eq_ignore_ascii_case("data") => parse_data(&mut tokens)?,
        Token::Directive(d) => return Err(ParseErr::UnknownDirective(d)),
        t => return Err(unexpected(&t)),
    };

    if let Some((t, _)) = tokens.next() {
        return Err(unexpected(&t));
    }
    line.stmt = Some(stmt);
    Ok(line)
}

fn unexpected(t: &Token) -> ParseErr {
    let desc = match t {
        Token::Number(n)    => n.to_string(),
        Token::Ident(id)    => id.clone(),
        Token::Builtin(b)   => b.to_string(),
        Token::Directive(d) => format!(".{d}"),
        Token::Char(c)      => format!("'{}'", char::from(*c)),
        Token::String(_)    => "string literal".to_string(),
        Token::Colon        => ":".to_string(),
        Token::Comma        => ",".to_string(),
        Token::Plus         => "+".to_string(),
        Token::Comment      => ";".to_string(),
    };
    ParseErr::UnexpectedToken(desc)
}

/// Skips an optional comma between operands.
fn skip_comma(tokens: &mut Tokens) {
    if let Some((Token::Comma, _)) = tokens.peek() {
        tokens.next();
    }
}

fn parse_subleq(tokens: &mut Tokens) -> Result<Stmt, ParseErr> {
    let mut operands = Vec::with_capacity(3);
    while tokens.peek().is_some() {
        if operands.len() == 3 { return Err(ParseErr::TooManyOperands) };
        operands.push(parse_value(tokens)?);
        skip_comma(tokens);
    }

    let mut operands = operands.into_iter();
    match (operands.next(), operands.next(), operands.next()) {
        (Some(a), Some(b), c) => Ok(Stmt::Subleq { a, b, c }),
        _ => Err(ParseErr::MissingOperand("subleq")),
    }
}

fn parse_data(tokens: &mut Tokens) -> Result<Stmt, ParseErr> {
    let mut items = vec![];
    while let Some((tok, _)) = tokens.peek() {
        let item = match tok {
            Token::String(_) => match tokens.next() {
                Some((Token::String(s), _)) => DataItem::Str(s),
                _ => unreachable!("peeked token should have been a string literal"),
            },
            _ => DataItem::Value(parse_value(tokens)?),
        };
        items.push(item);
        skip_comma(tokens);
    }

    match items.is_empty() {
        true  => Err(ParseErr::MissingOperand(".data")),
        false => Ok(Stmt::Data(items)),
    }
}

fn parse_value(tokens: &mut Tokens) -> Result<Value, ParseErr> {
    let Some((tok, span)) = tokens.next() else {
        return Err(ParseErr::MissingOperand("subleq"));
    };

    match tok {
        Token::Number(n)  => Ok(Value::Literal(n)),
        Token::Char(c)    => Ok(Value::Char(c)),
        Token::Builtin(b) => Ok(Value::Builtin(b)),
        Token::Ident(name) => {
            let offset = match tokens.peek() {
                Some((Token::Plus, _)) => {
                    tokens.next();
                    match tokens.next() {
                        Some((Token::Number(n), _)) => n,
                        Some((t, _)) => return Err(unexpected(&t)),
                        None => return Err(unexpected(&Token::Plus)),
                    }
                },
                // `label-1` lexes as a label followed by a negative number;
                // treat it as an offset only if there is no space between them.
                Some((Token::Number(n), nspan)) if *n < 0 && nspan.start == span.end => {
                    let n = *n;
                    tokens.next();
                    n
                },
                _ => 0
            };
            Ok(Value::Label { name, offset })
        },
        t => Err(unexpected(&t))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Builtin, DataItem, Stmt, Value};

    use super::lex::LexErr;
    use super::{parse_line, ParseErr};

    fn label(name: &str, offset: i16) -> Value {
        Value::Label { name: name.to_string(), offset }
    }

    #[test]
    fn test_empty_and_comments() {
        let line = parse_line("").unwrap();
        assert!(line.labels.is_empty());
        assert!(line.stmt.is_none());

        let line = parse_line("   ; nothing to see here").unwrap();
        assert!(line.stmt.is_none());
    }

    #[test]
    fn test_subleq_forms() {
        let line = parse_line("subleq a b").unwrap();
        assert_eq!(line.stmt, Some(Stmt::Subleq { a: label("a", 0), b: label("b", 0), c: None }));

        let line = parse_line("SUBLEQ a, b, @HALT").unwrap();
        assert_eq!(line.stmt, Some(Stmt::Subleq {
            a: label("a", 0),
            b: label("b", 0),
            c: Some(Value::Builtin(Builtin::Halt))
        }));

        let line = parse_line("subleq a+1 b-1 -1").unwrap();
        assert_eq!(line.stmt, Some(Stmt::Subleq {
            a: label("a", 1),
            b: label("b", -1),
            c: Some(Value::Literal(-1))
        }));
    }

    #[test]
    fn test_labels() {
        let line = parse_line("start: loop: subleq a b").unwrap();
        assert_eq!(line.labels, ["start", "loop"]);
        assert!(line.stmt.is_some());

        let line = parse_line("end:").unwrap();
        assert_eq!(line.labels, ["end"]);
        assert!(line.stmt.is_none());
    }

    #[test]
    fn test_data() {
        let line = parse_line(r#"msg: .data "Hi", 0, 'x' @MAX"#).unwrap();
        assert_eq!(line.labels, ["msg"]);
        assert_eq!(line.stmt, Some(Stmt::Data(vec![
            DataItem::Str(b"Hi".to_vec()),
            DataItem::Value(Value::Literal(0)),
            DataItem::Value(Value::Char(b'x')),
            DataItem::Value(Value::Builtin(Builtin::Max)),
        ])));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_line("subleq a"), Err(ParseErr::MissingOperand("subleq")));
        assert_eq!(parse_line("subleq a b c d"), Err(ParseErr::TooManyOperands));
        assert_eq!(parse_line(".data"), Err(ParseErr::MissingOperand(".data")));
        assert_eq!(parse_line("add a b"), Err(ParseErr::UnknownInstruction("add".to_string())));
        assert_eq!(parse_line(".orig 3"), Err(ParseErr::UnknownDirective("orig".to_string())));
        assert_eq!(parse_line("subleq a, :"), Err(ParseErr::UnexpectedToken(":".to_string())));
        assert_eq!(parse_line("subleq a $"), Err(ParseErr::Lex(LexErr::InvalidSymbol)));
    }
}
