// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Byte/char-stream tokenizer (§4.1).
//!
//! A single forward-scanning `Lexer` over the query text. Whitespace is
//! insignificant and simply separates tokens. Unrecognized input yields an
//! `Error` token rather than panicking or recovering — per §7's "no
//! retries, no recovery inside the engine" policy, the parser turns that
//! into a fatal [`QueryError::Lex`].
//!

use crate::error::{Position, QueryError};
use crate::token::{OpToken, Token, TokenKind};

/// Tokenizer over a query string.
pub struct Lexer<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_ident_continue(c: char) -> bool {
    is_ident_start(c) || c == '/' || c == '#'
}

impl<'a> Lexer<'a> {
    /// Build a lexer over `src`.
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    /// Tokenize the whole input, ending with one `Eof` token.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = matches!(tok.kind, TokenKind::Eof);
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.pos;
        let pos = start + 1; // 1-based
        let Some(c) = self.peek() else {
            return Token { kind: TokenKind::Eof, pos };
        };

        let kind = match c {
            '[' if self.peek_at(1) == Some('[') => self.lex_ref(),
            '[' => {
                self.bump();
                TokenKind::LBracket
            }
            ']' => {
                self.bump();
                TokenKind::RBracket
            }
            '(' => {
                self.bump();
                TokenKind::LParen
            }
            ')' => {
                self.bump();
                TokenKind::RParen
            }
            '{' => {
                self.bump();
                TokenKind::LBrace
            }
            '}' => {
                self.bump();
                TokenKind::RBrace
            }
            ',' => {
                self.bump();
                TokenKind::Comma
            }
            '.' => {
                self.bump();
                TokenKind::Dot
            }
            ':' => {
                self.bump();
                TokenKind::Colon
            }
            '*' => {
                self.bump();
                TokenKind::Star
            }
            '"' => self.lex_string(),
            '/' => self.lex_regex_slash(),
            '!' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Op(OpToken::Neq)
                } else {
                    TokenKind::Bang
                }
            }
            '=' => {
                self.bump();
                match self.peek() {
                    Some('=') => {
                        self.bump();
                        TokenKind::Op(OpToken::Eq)
                    }
                    Some('~') => {
                        self.bump();
                        TokenKind::Op(OpToken::EqTilde)
                    }
                    _ => TokenKind::Assign,
                }
            }
            '<' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Op(OpToken::Lte)
                } else {
                    TokenKind::Op(OpToken::Lt)
                }
            }
            '>' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Op(OpToken::Gte)
                } else {
                    TokenKind::Op(OpToken::Gt)
                }
            }
            '~' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Op(OpToken::TildeEq)
                } else {
                    TokenKind::Error('~')
                }
            }
            '^' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Op(OpToken::CaretEq)
                } else {
                    TokenKind::Error('^')
                }
            }
            '$' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Op(OpToken::DollarEq)
                } else {
                    TokenKind::Error('$')
                }
            }
            '|' => {
                self.bump();
                if self.peek() == Some('>') {
                    self.bump();
                    TokenKind::PipeArrow
                } else {
                    TokenKind::Pipe
                }
            }
            '_' => {
                self.bump();
                if matches!(self.peek(), Some(c) if is_ident_continue(c)) {
                    self.lex_ident_rest(start)
                } else {
                    TokenKind::Underscore
                }
            }
            'r' if self.peek_at(1) == Some('"') => {
                self.bump();
                self.lex_raw_regex()
            }
            c if is_ident_start(c) => self.lex_ident_rest(start),
            other => {
                self.bump();
                TokenKind::Error(other)
            }
        };
        Token { kind, pos }
    }

    fn lex_ident_rest(&mut self, start: usize) -> TokenKind {
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.pos += 1;
        }
        let s: String = self.chars[start..self.pos].iter().collect();
        TokenKind::Ident(s)
    }

    fn lex_string(&mut self) -> TokenKind {
        self.bump(); // opening quote
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return TokenKind::Error('"'),
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('"') => s.push('"'),
                    Some('\\') => s.push('\\'),
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(other) => s.push(other),
                    None => return TokenKind::Error('"'),
                },
                Some(c) => s.push(c),
            }
        }
        TokenKind::Str(s)
    }

    fn lex_regex_slash(&mut self) -> TokenKind {
        self.bump(); // opening '/'
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return TokenKind::Error('/'),
                Some('/') => break,
                Some('\\') => {
                    s.push('\\');
                    if let Some(c) = self.bump() {
                        s.push(c);
                    }
                }
                Some(c) => s.push(c),
            }
        }
        TokenKind::Regex(s)
    }

    fn lex_raw_regex(&mut self) -> TokenKind {
        self.bump(); // opening '"'
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return TokenKind::Error('"'),
                Some('"') => break,
                Some(c) => s.push(c),
            }
        }
        TokenKind::Regex(s)
    }

    fn lex_ref(&mut self) -> TokenKind {
        self.bump();
        self.bump(); // consume "[["
        let mut depth = 0i32;
        let mut inner = String::new();
        loop {
            match self.peek() {
                None => return TokenKind::Error('['),
                Some(']') if self.peek_at(1) == Some(']') && depth == 0 => {
                    self.bump();
                    self.bump();
                    break;
                }
                Some('[') => {
                    depth += 1;
                    inner.push(self.bump().unwrap());
                }
                Some(']') => {
                    depth -= 1;
                    inner.push(self.bump().unwrap());
                }
                Some(c) => {
                    inner.push(c);
                    self.bump();
                }
            }
        }
        match inner.split_once('|') {
            Some((target, display)) => TokenKind::Ref {
                target: target.to_string(),
                display: Some(display.to_string()),
            },
            None => TokenKind::Ref {
                target: inner,
                display: None,
            },
        }
    }
}

/// Tokenize `src`, surfacing the first `Error` token (if any) as a
/// [`QueryError::Lex`].
pub fn lex(src: &str) -> Result<Vec<Token>, QueryError> {
    let tokens = Lexer::new(src).tokenize();
    if let Some(tok) = tokens.iter().find(|t| matches!(t.kind, TokenKind::Error(_))) {
        let TokenKind::Error(c) = tok.kind else { unreachable!() };
        return Err(QueryError::Lex {
            pos: Position(tok.pos),
            message: format!("unrecognized byte {c:?}").into(),
        });
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_kind_colon_type() {
        assert_eq!(
            kinds("object:project"),
            vec![
                TokenKind::Ident("object".into()),
                TokenKind::Colon,
                TokenKind::Ident("project".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lexes_field_predicate() {
        assert_eq!(
            kinds(".status==active"),
            vec![
                TokenKind::Dot,
                TokenKind::Ident("status".into()),
                TokenKind::Op(OpToken::Eq),
                TokenKind::Ident("active".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lexes_ref_with_display_text() {
        let toks = kinds("[[projects/website|Website]]");
        assert_eq!(
            toks[0],
            TokenKind::Ref {
                target: "projects/website".into(),
                display: Some("Website".into())
            }
        );
    }

    #[test]
    fn lexes_nested_brackets_in_ref() {
        let toks = kinds("[[a[1]b]]");
        assert_eq!(
            toks[0],
            TokenKind::Ref {
                target: "a[1]b".into(),
                display: None
            }
        );
    }

    #[test]
    fn bare_underscore_is_underscore_token() {
        assert_eq!(kinds("_"), vec![TokenKind::Underscore, TokenKind::Eof]);
    }

    #[test]
    fn underscore_prefix_is_ident() {
        assert_eq!(
            kinds("_foo"),
            vec![TokenKind::Ident("_foo".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_string_escape() {
        assert_eq!(
            kinds(r#""a\"b""#),
            vec![TokenKind::Str("a\"b".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_pipeline_arrow_and_assign() {
        assert_eq!(
            kinds("|> n=count"),
            vec![
                TokenKind::PipeArrow,
                TokenKind::Ident("n".into()),
                TokenKind::Assign,
                TokenKind::Ident("count".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unrecognized_byte_is_lex_error() {
        assert!(lex("object:foo .x==@").is_err());
    }
}
