//! Tokenizer for the blueprint declaration language.
//!
//! Built on logos for error-resilient lexing: unknown input becomes an
//! `Error` token instead of aborting, so the parser can skip it and keep
//! going with the rest of the file.

use logos::Logos;
use std::ops::Range;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum TokenKind {
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("=")]
    Equal,
    #[token("+=")]
    PlusEqual,
    #[token("+")]
    Plus,

    #[token("true")]
    True,
    #[token("false")]
    False,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[regex(r#""([^"\\]|\\.)*""#)]
    #[regex(r#"'([^'\\]|\\.)*'"#)]
    Str,

    #[regex(r"-?[0-9]+")]
    Int,

    /// Anything the grammar does not know about.
    Error,

    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Range<usize>,
}

/// Tokenize a whole blueprint file. Always ends with an `Eof` token.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = TokenKind::lexer(input);
    let mut tokens = Vec::new();

    while let Some(kind) = lexer.next() {
        let kind = kind.unwrap_or(TokenKind::Error);
        tokens.push(Token {
            kind,
            text: lexer.slice().to_string(),
            span: lexer.span(),
        });
    }

    let len = input.len();
    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        span: len..len,
    });

    tokens
}

/// Map a byte offset back to a 1-indexed (line, column) pair.
pub fn line_col(input: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(input.len());
    let mut line = 1;
    let mut line_start = 0;
    for (pos, byte) in input.as_bytes()[..offset].iter().enumerate() {
        if *byte == b'\n' {
            line += 1;
            line_start = pos + 1;
        }
    }
    (line, offset - line_start + 1)
}

/// Strip the surrounding quotes from a string token and resolve the
/// escape sequences the language defines.
pub fn unquote(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
