//! Tokenizing SIC-1 assembly.
//!
//! This module holds the tokens that characterize SIC-1 assembly ([`Token`]).
//! This module is used by the parser to facilitate the conversion of
//! assembly source lines into an AST.
//!
//! Source is tokenized one line at a time, so there is no newline token.

use std::num::IntErrorKind;

use logos::{Lexer, Logos};

use crate::ast::Builtin;

/// A unit of information in SIC-1 source code.
#[derive(Debug, Logos, PartialEq, Eq, Clone)]
#[logos(skip r"[ \t\r]+", error = LexErr)]
pub enum Token {
    // Note, this regex spans over tokens that are technically invalid
    // (e.g., 23trst matches even though it shouldn't).
    // This is intended.
    // The regex collects what would be considered one discernable unit
    // and validates it using the validator function.

    /// A numeric value (e.g., `9`, `-14`, `0x7F`, etc.)
    #[regex(r"-?\d\w*", lex_number)]
    Number(i16),

    /// An identifier.
    ///
    /// This can refer to either a label or the `subleq` mnemonic.
    #[regex(r"[A-Za-z_]\w*", |lx| lx.slice().to_string())]
    Ident(String),

    /// A built-in address (e.g., `@IN`, `@OUT`).
    #[regex(r"@\w*", lex_builtin)]
    Builtin(Builtin),

    /// A directive (e.g., `.data`).
    #[regex(r"\.[A-Za-z_]\w*", |lx| lx.slice()[1..].to_string())]
    Directive(String),

    /// A character literal (e.g., `'a'`).
    #[token("'", lex_char_literal)]
    Char(u8),

    /// A string literal (e.g., `"Hello!"`)
    #[token(r#"""#, lex_str_literal)]
    String(Vec<u8>),

    /// A colon, which ends a label definition.
    #[token(":")]
    Colon,

    /// A comma, which can optionally delineate operands.
    #[token(",")]
    Comma,

    /// A plus sign, used to offset a label (e.g., `loop+3`).
    #[token("+")]
    Plus,

    /// A comment, which starts with a semicolon and spans the remaining part of the line.
    #[regex(r";.*")]
    Comment,
}

/// Any errors raised in attempting to tokenize a source line.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, thiserror::Error)]
pub enum LexErr {
    /// Numeric literal cannot fit within the range of an i16.
    #[error("numeric literal is too large")]
    DoesNotFit,
    /// Hex literal (starting with 0x) has invalid hex digits.
    #[error("invalid hex literal")]
    InvalidHex,
    /// Numeric literal could not be parsed because it has invalid digits.
    #[error("invalid decimal literal")]
    InvalidNumeric,
    /// Int parsing failed but the reason why is unknown.
    #[error("could not parse integer")]
    UnknownIntErr,
    /// Character literal is missing an end quotation mark or is empty.
    #[error("malformed character literal")]
    InvalidCharLit,
    /// Character literal holds a character that does not fit in a byte.
    #[error("character does not fit in a byte")]
    CharTooWide,
    /// String literal is missing an end quotation mark.
    #[error("unclosed string literal")]
    UnclosedStrLit,
    /// `@` was followed by a name that is not a built-in address.
    #[error("unknown built-in address")]
    UnknownBuiltin,
    /// A symbol was used which is not allowed in SIC-1 assembly.
    #[default]
    #[error("unrecognized symbol")]
    InvalidSymbol
}

fn convert_int_error(e: &IntErrorKind, invalid_digits_err: LexErr) -> LexErr {
    match e {
        IntErrorKind::Empty        => invalid_digits_err,
        IntErrorKind::InvalidDigit => invalid_digits_err,
        IntErrorKind::PosOverflow  => LexErr::DoesNotFit,
        IntErrorKind::NegOverflow  => LexErr::DoesNotFit,
        _ => LexErr::UnknownIntErr,
    }
}
fn lex_number(lx: &Lexer<'_, Token>) -> Result<i16, LexErr> {
    let slice = lx.slice();
    let (negative, digits) = match slice.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, slice),
    };

    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i16::from_str_radix(hex, 16)
            .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidHex))?,
        None => digits.parse::<i16>()
            .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidNumeric))?,
    };

    Ok(if negative { -magnitude } else { magnitude })
}
fn lex_builtin(lx: &Lexer<'_, Token>) -> Result<Builtin, LexErr> {
    lx.slice()[1..].parse().map_err(|_| LexErr::UnknownBuiltin)
}
fn unescape(esc: u8) -> Option<u8> {
    match esc {
        b'n'  => Some(b'\n'),
        b'r'  => Some(b'\r'),
        b't'  => Some(b'\t'),
        b'\\' => Some(b'\\'),
        b'0'  => Some(0),
        b'\'' => Some(b'\''),
        b'"'  => Some(b'"'),
        _ => None
    }
}
fn lex_char_literal(lx: &mut Lexer<'_, Token>) -> Result<u8, LexErr> {
    let rem = lx.remainder();
    let mut chars = rem.char_indices();

    let value = match chars.next() {
        Some((_, '\\')) => {
            let (_, esc) = chars.next().ok_or(LexErr::InvalidCharLit)?;
            u8::try_from(esc).ok()
                .and_then(unescape)
                .ok_or(LexErr::InvalidCharLit)?
        },
        Some((_, '\'')) | None => return Err(LexErr::InvalidCharLit),
        Some((_, c)) => u8::try_from(c).map_err(|_| LexErr::CharTooWide)?,
    };

    match chars.next() {
        Some((n, '\'')) => {
            lx.bump(n + 1);
            Ok(value)
        },
        _ => {
            lx.bump(rem.len());
            Err(LexErr::InvalidCharLit)
        }
    }
}
fn lex_str_literal(lx: &mut Lexer<'_, Token>) -> Result<Vec<u8>, LexErr> {
    let rem = lx.remainder();

    // consume tokens up to the end of the literal and including the unescaped quote
    let mut escaped = false;
    let mut end = None;
    for (n, c) in rem.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => {
                end = Some(n);
                break;
            },
            _ => {}
        }
    }

    let Some(len) = end else {
        lx.bump(rem.len());
        return Err(LexErr::UnclosedStrLit);
    };
    lx.bump(len + 1);

    let inner = &rem[..len];
    let mut buf = Vec::with_capacity(inner.len());
    let mut bytes = inner.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'\\' => {
                // there always has to be one, since the closing quote cannot be escaped
                let esc = bytes.next().unwrap_or(b'\\');
                match unescape(esc) {
                    Some(e) => buf.push(e),
                    None => buf.extend([b'\\', esc]),
                }
            },
            b => buf.push(b)
        }
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use logos::Logos;

    use crate::ast::Builtin;
    use crate::parse::lex::{LexErr, Token};

    fn lex(src: &str) -> Vec<Result<Token, LexErr>> {
        Token::lexer(src).collect()
    }
    fn ident(s: &str) -> Token {
        Token::Ident(s.to_string())
    }

    #[test]
    fn test_numeric_success() {
        assert_eq!(lex("0 9 255 -128"), [
            Ok(Token::Number(0)),
            Ok(Token::Number(9)),
            Ok(Token::Number(255)),
            Ok(Token::Number(-128)),
        ]);
        assert_eq!(lex("0x7F 0XfF -0x10"), [
            Ok(Token::Number(0x7F)),
            Ok(Token::Number(0xFF)),
            Ok(Token::Number(-0x10)),
        ]);
    }

    #[test]
    fn test_numeric_fail() {
        assert_eq!(lex("12abc"), [Err(LexErr::InvalidNumeric)]);
        assert_eq!(lex("0xZZ"), [Err(LexErr::InvalidHex)]);
        assert_eq!(lex("0x"), [Err(LexErr::InvalidHex)]);
        assert_eq!(lex("99999"), [Err(LexErr::DoesNotFit)]);
    }

    #[test]
    fn test_instruction_line() {
        assert_eq!(lex("loop: subleq @OUT, n_one ; print"), [
            Ok(ident("loop")),
            Ok(Token::Colon),
            Ok(ident("subleq")),
            Ok(Token::Builtin(Builtin::Out)),
            Ok(Token::Comma),
            Ok(ident("n_one")),
            Ok(Token::Comment),
        ]);
        assert_eq!(lex("subleq a+1 b"), [
            Ok(ident("subleq")),
            Ok(ident("a")),
            Ok(Token::Plus),
            Ok(Token::Number(1)),
            Ok(ident("b")),
        ]);
    }

    #[test]
    fn test_builtins() {
        assert_eq!(lex("@IN @out @Halt @MAX"), [
            Ok(Token::Builtin(Builtin::In)),
            Ok(Token::Builtin(Builtin::Out)),
            Ok(Token::Builtin(Builtin::Halt)),
            Ok(Token::Builtin(Builtin::Max)),
        ]);
        assert_eq!(lex("@NOPE"), [Err(LexErr::UnknownBuiltin)]);
    }

    #[test]
    fn test_char_literals() {
        assert_eq!(lex(r"'a' '\n' '\'' ' '"), [
            Ok(Token::Char(b'a')),
            Ok(Token::Char(b'\n')),
            Ok(Token::Char(b'\'')),
            Ok(Token::Char(b' ')),
        ]);
        assert_eq!(lex("''"), [Err(LexErr::InvalidCharLit), Err(LexErr::InvalidCharLit)]);
        assert_eq!(lex("'ab'")[0], Err(LexErr::InvalidCharLit));
    }

    #[test]
    fn test_str_literals() {
        assert_eq!(lex(r#".data "Hi\n" 0"#), [
            Ok(Token::Directive("data".to_string())),
            Ok(Token::String(b"Hi\n".to_vec())),
            Ok(Token::Number(0)),
        ]);
        assert_eq!(lex(r#""say \"x\"""#), [Ok(Token::String(b"say \"x\"".to_vec()))]);
        assert_eq!(lex(r#""oops"#), [Err(LexErr::UnclosedStrLit)]);
    }

    #[test]
    fn test_invalid_symbol() {
        assert_eq!(lex("subleq $"), [Ok(ident("subleq")), Err(LexErr::InvalidSymbol)]);
    }
}
