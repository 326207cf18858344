// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Lexer turning MiniLang source text into a token stream.

use std::fmt;

use crate::token::{keyword_kind, Token, TokenKind};

/// Error from the lexing stage, positioned at the offending character.
#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub line: u32,
    pub column: usize,
}

impl LexError {
    fn new(message: impl Into<String>, line: u32, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.message, self.line, self.column)
    }
}

impl std::error::Error for LexError {}

/// Single-pass scanner with one-byte lookahead.
///
/// Sources are ASCII in practice; scanning works on the raw bytes and treats
/// anything outside the recognized set as a lex error.
pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: u32,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Scan the whole source into tokens, ending with EOF.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments()?;

            let ch = self.peek();
            if ch == b'\0' {
                tokens.push(Token::new(TokenKind::Eof, "", self.line, self.col));
                break;
            }

            let start_line = self.line;
            let start_col = self.col;
            let c = self.advance();

            if c.is_ascii_alphabetic() || c == b'_' {
                tokens.push(self.identifier(start_line, start_col));
                continue;
            }
            if c.is_ascii_digit() {
                tokens.push(self.number(start_line, start_col));
                continue;
            }

            let kind = match c {
                b'+' => TokenKind::Plus,
                b'-' => TokenKind::Minus,
                b'*' => TokenKind::Star,
                b'/' => TokenKind::Slash,
                b'(' => TokenKind::LParen,
                b')' => TokenKind::RParen,
                b'{' => TokenKind::LBrace,
                b'}' => TokenKind::RBrace,
                b';' => TokenKind::Semi,
                b'!' => {
                    if self.matches(b'=') {
                        tokens.push(Token::new(TokenKind::Ne, "!=", start_line, start_col));
                        continue;
                    }
                    return Err(LexError::new(
                        "Unexpected '!' (expected '!=')",
                        start_line,
                        start_col,
                    ));
                }
                b'=' => {
                    if self.matches(b'=') {
                        tokens.push(Token::new(TokenKind::Eq, "==", start_line, start_col));
                        continue;
                    }
                    TokenKind::Assign
                }
                b'<' => {
                    if self.matches(b'=') {
                        tokens.push(Token::new(TokenKind::Le, "<=", start_line, start_col));
                        continue;
                    }
                    TokenKind::Lt
                }
                b'>' => {
                    if self.matches(b'=') {
                        tokens.push(Token::new(TokenKind::Ge, ">=", start_line, start_col));
                        continue;
                    }
                    TokenKind::Gt
                }
                _ => {
                    return Err(LexError::new(
                        format!("Unexpected character '{}'", c as char),
                        start_line,
                        start_col,
                    ));
                }
            };
            tokens.push(Token::new(kind, (c as char).to_string(), start_line, start_col));
        }
        Ok(tokens)
    }

    fn peek(&self) -> u8 {
        self.source.get(self.pos).copied().unwrap_or(b'\0')
    }

    fn peek_next(&self) -> u8 {
        self.source.get(self.pos + 1).copied().unwrap_or(b'\0')
    }

    fn advance(&mut self) -> u8 {
        let ch = self.peek();
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        ch
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.peek() == expected {
            self.advance();
            return true;
        }
        false
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            let ch = self.peek();
            if ch == b' ' || ch == b'\r' || ch == b'\t' || ch == b'\n' {
                self.advance();
                continue;
            }
            if ch == b'/' && self.peek_next() == b'/' {
                while self.peek() != b'\n' && self.peek() != b'\0' {
                    self.advance();
                }
                continue;
            }
            if ch == b'/' && self.peek_next() == b'*' {
                self.advance();
                self.advance();
                loop {
                    if self.peek() == b'\0' {
                        return Err(LexError::new(
                            "Unterminated block comment",
                            self.line,
                            self.col,
                        ));
                    }
                    if self.peek() == b'*' && self.peek_next() == b'/' {
                        self.advance();
                        self.advance();
                        break;
                    }
                    self.advance();
                }
                continue;
            }
            break;
        }
        Ok(())
    }

    fn identifier(&mut self, start_line: u32, start_col: usize) -> Token {
        let start = self.pos - 1;
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[start..self.pos])
            .unwrap_or_default()
            .to_string();
        let kind = keyword_kind(&text).unwrap_or(TokenKind::Ident);
        Token::new(kind, text, start_line, start_col)
    }

    fn number(&mut self, start_line: u32, start_col: usize) -> Token {
        let start = self.pos - 1;
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[start..self.pos])
            .unwrap_or_default()
            .to_string();
        Token::new(TokenKind::Number, text, start_line, start_col)
    }
}

/// Convenience wrapper used by the pipeline and tests.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}
