// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Recursive-descent LL(1) parser building the AST from the token stream.
//!
//! Grammar (precedence climbs from the bottom):
//!
//! ```text
//! program    := stmt* 'end' EOF
//! stmt       := 'read' IDENT ';'
//!             | 'print' expr ';'
//!             | IDENT '=' expr ';'
//!             | 'if' expr '{' stmt* '}' 'else' '{' stmt* '}'
//!             | 'while' expr '{' stmt* '}'
//! expr       := equality
//! equality   := comparison (('==' | '!=') comparison)*
//! comparison := term (('<' | '>' | '<=' | '>=') term)*
//! term       := factor (('+' | '-') factor)*
//! factor     := unary (('*' | '/') unary)*
//! unary      := '-' unary | primary
//! primary    := NUMBER | IDENT | '(' expr ')'
//! ```
//!
//! All binary operators are left-associative; unary minus is
//! right-associative and binds tighter than any binary operator. The `else`
//! clause is mandatory.

use std::fmt;

use crate::ast::{BinOp, Expr, Program, Span, Stmt, UnOp};
use crate::token::{Token, TokenKind};

/// Error from the parsing stage, naming the expected and found tokens.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, line: u32, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }

    fn expected(message: &str, found: &Token) -> Self {
        Self::new(
            format!(
                "{message}, found {} '{}'",
                found.kind.name(),
                found.lexeme
            ),
            found.line,
            found.column,
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.message, self.line, self.column)
    }
}

impl std::error::Error for ParseError {}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Token streams always end with EOF; the lexer guarantees this.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();
        while self.peek().kind != TokenKind::End {
            if self.peek().kind == TokenKind::Eof {
                let tok = self.peek();
                return Err(ParseError::new(
                    "Expected 'end' before EOF",
                    tok.line,
                    tok.column,
                ));
            }
            body.push(self.statement()?);
        }
        self.consume(TokenKind::End, "Expected 'end' to terminate program")?;
        self.consume(TokenKind::Eof, "Expected no tokens after 'end'")?;
        Ok(Program { body })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        // Never advance past the trailing EOF.
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn matches(&mut self, kinds: &[TokenKind]) -> Option<Token> {
        if kinds.contains(&self.peek().kind) {
            return Some(self.advance());
        }
        None
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParseError> {
        if self.peek().kind == kind {
            return Ok(self.advance());
        }
        Err(ParseError::expected(message, self.peek()))
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let tok = self.peek().clone();
        let span = Span::new(tok.line, tok.column);
        match tok.kind {
            TokenKind::Read => {
                self.advance();
                let name = self
                    .consume(TokenKind::Ident, "Expected identifier after 'read'")?
                    .lexeme;
                self.consume(TokenKind::Semi, "Expected ';' after read statement")?;
                Ok(Stmt::Read { name, span })
            }
            TokenKind::Print => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenKind::Semi, "Expected ';' after print expression")?;
                Ok(Stmt::Print { expr, span })
            }
            TokenKind::If => {
                self.advance();
                let cond = self.expression()?;
                self.consume(TokenKind::LBrace, "Expected '{' to start if-block")?;
                let then_body = self.block(TokenKind::RBrace)?;
                self.consume(TokenKind::RBrace, "Expected '}' to end if-block")?;
                self.consume(TokenKind::Else, "Expected 'else' after if-block")?;
                self.consume(TokenKind::LBrace, "Expected '{' to start else-block")?;
                let else_body = self.block(TokenKind::RBrace)?;
                self.consume(TokenKind::RBrace, "Expected '}' to end else-block")?;
                Ok(Stmt::IfElse {
                    cond,
                    then_body,
                    else_body,
                    span,
                })
            }
            TokenKind::While => {
                self.advance();
                let cond = self.expression()?;
                self.consume(TokenKind::LBrace, "Expected '{' to start while-block")?;
                let body = self.block(TokenKind::RBrace)?;
                self.consume(TokenKind::RBrace, "Expected '}' to end while-block")?;
                Ok(Stmt::While { cond, body, span })
            }
            TokenKind::Ident => {
                let name = self.advance().lexeme;
                self.consume(
                    TokenKind::Assign,
                    "Expected '=' after identifier in assignment",
                )?;
                let expr = self.expression()?;
                self.consume(TokenKind::Semi, "Expected ';' after assignment")?;
                Ok(Stmt::Assign { name, expr, span })
            }
            _ => Err(ParseError::new(
                format!("Unexpected token {} '{}'", tok.kind.name(), tok.lexeme),
                tok.line,
                tok.column,
            )),
        }
    }

    /// Statements up to (not consuming) the closing delimiter; EOF inside a
    /// block falls through to statement() which reports the stray token.
    fn block(&mut self, until: TokenKind) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();
        while self.peek().kind != until {
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.equality()
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.comparison()?;
        while let Some(op_tok) = self.matches(&[TokenKind::Eq, TokenKind::Ne]) {
            let right = self.comparison()?;
            expr = binary(expr, &op_tok, right);
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.term()?;
        while let Some(op_tok) = self.matches(&[
            TokenKind::Lt,
            TokenKind::Gt,
            TokenKind::Le,
            TokenKind::Ge,
        ]) {
            let right = self.term()?;
            expr = binary(expr, &op_tok, right);
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.factor()?;
        while let Some(op_tok) = self.matches(&[TokenKind::Plus, TokenKind::Minus]) {
            let right = self.factor()?;
            expr = binary(expr, &op_tok, right);
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.unary()?;
        while let Some(op_tok) = self.matches(&[TokenKind::Star, TokenKind::Slash]) {
            let right = self.unary()?;
            expr = binary(expr, &op_tok, right);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if let Some(op_tok) = self.matches(&[TokenKind::Minus]) {
            let expr = self.unary()?;
            return Ok(Expr::Unary {
                op: UnOp::Neg,
                expr: Box::new(expr),
                span: Span::new(op_tok.line, op_tok.column),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        let span = Span::new(tok.line, tok.column);
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                let value: i64 = tok.lexeme.parse().map_err(|_| {
                    ParseError::new(
                        format!("Integer literal '{}' out of range", tok.lexeme),
                        tok.line,
                        tok.column,
                    )
                })?;
                Ok(Expr::Number(value, span))
            }
            TokenKind::Ident => {
                self.advance();
                Ok(Expr::Var(tok.lexeme, span))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenKind::RParen, "Expected ')' after expression")?;
                Ok(expr)
            }
            _ => Err(ParseError::expected("Expected expression", &tok)),
        }
    }
}

fn binary(left: Expr, op_tok: &Token, right: Expr) -> Expr {
    let op = match op_tok.kind {
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Star => BinOp::Mul,
        TokenKind::Slash => BinOp::Div,
        TokenKind::Lt => BinOp::Lt,
        TokenKind::Gt => BinOp::Gt,
        TokenKind::Le => BinOp::Le,
        TokenKind::Ge => BinOp::Ge,
        TokenKind::Eq => BinOp::Eq,
        TokenKind::Ne => BinOp::Ne,
        // matches() only hands operator tokens to this constructor
        _ => unreachable!("non-operator token in binary()"),
    };
    let span = Span::new(op_tok.line, op_tok.column);
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span,
    }
}
