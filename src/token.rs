// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Terminal token kinds produced by the [lexer][crate::lexer] (§4.1).
//!

use core::fmt;

/// Comparison and string-match operators recognized at the token level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpToken {
    /// `==`
    Eq,
    /// `!=`
    Neq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `~=` (regex match, symmetric spelling)
    TildeEq,
    /// `^=` (starts-with shorthand)
    CaretEq,
    /// `$=` (ends-with shorthand)
    DollarEq,
    /// `=~` (regex match)
    EqTilde,
}

impl fmt::Display for OpToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpToken::Eq => "==",
            OpToken::Neq => "!=",
            OpToken::Lt => "<",
            OpToken::Lte => "<=",
            OpToken::Gt => ">",
            OpToken::Gte => ">=",
            OpToken::TildeEq => "~=",
            OpToken::CaretEq => "^=",
            OpToken::DollarEq => "$=",
            OpToken::EqTilde => "=~",
        };
        write!(f, "{s}")
    }
}

/// A single lexical token kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `[A-Za-z0-9_\-][A-Za-z0-9_\-/#]*`
    Ident(String),
    /// `[[target|display]]` — only `target` is surfaced.
    Ref {
        /// Link target text, verbatim.
        target: String,
        /// Optional display text after the first `|`.
        display: Option<String>,
    },
    /// `"..."` with `\"` escapes, unescaped value.
    Str(String),
    /// `/.../` or `r"..."`, raw pattern text (unescaped for the raw form).
    Regex(String),
    /// One of the comparison/match operators.
    Op(OpToken),
    /// `:`
    Colon,
    /// `.`
    Dot,
    /// `!`
    Bang,
    /// `|`
    Pipe,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,`
    Comma,
    /// `*`
    Star,
    /// `_` not immediately followed by an identifier character.
    Underscore,
    /// `|>` pipeline introducer.
    PipeArrow,
    /// `=` (used only in `NAME = AGG(...)` pipeline assignments).
    Assign,
    /// End of input.
    Eof,
    /// Unrecognized byte; carries it for the error message.
    Error(char),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "{s}"),
            TokenKind::Ref { target, .. } => write!(f, "[[{target}]]"),
            TokenKind::Str(s) => write!(f, "{s:?}"),
            TokenKind::Regex(s) => write!(f, "/{s}/"),
            TokenKind::Op(op) => write!(f, "{op}"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Bang => write!(f, "!"),
            TokenKind::Pipe => write!(f, "|"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Underscore => write!(f, "_"),
            TokenKind::PipeArrow => write!(f, "|>"),
            TokenKind::Assign => write!(f, "="),
            TokenKind::Eof => write!(f, "<eof>"),
            TokenKind::Error(c) => write!(f, "unexpected byte {c:?}"),
        }
    }
}

/// A token plus its 1-based character position in the source query.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The token's kind and payload.
    pub kind: TokenKind,
    /// 1-based character offset of the token's first character.
    pub pos: usize,
}
