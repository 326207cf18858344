// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Constant folding over the AST.
//!
//! Folds constant subexpressions bottom-up and prunes `if/else` branches
//! whose condition folds to a constant, splicing the taken branch in place.
//! Arithmetic wraps the same way the VM does, so folded results match
//! runtime results bit-for-bit. Division by a constant zero is never
//! folded; the expression survives so the runtime error is preserved.

use crate::ast::{BinOp, Expr, Program, Stmt, UnOp};

/// Fold a whole program.
pub fn fold_program(program: Program) -> Program {
    Program {
        body: fold_block(program.body),
    }
}

fn fold_block(body: Vec<Stmt>) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(body.len());
    for stmt in body {
        fold_stmt(stmt, &mut out);
    }
    out
}

fn fold_stmt(stmt: Stmt, out: &mut Vec<Stmt>) {
    match stmt {
        Stmt::Read { .. } => out.push(stmt),
        Stmt::Print { expr, span } => out.push(Stmt::Print {
            expr: fold_expr(expr),
            span,
        }),
        Stmt::Assign { name, expr, span } => out.push(Stmt::Assign {
            name,
            expr: fold_expr(expr),
            span,
        }),
        Stmt::IfElse {
            cond,
            then_body,
            else_body,
            span,
        } => {
            let cond = fold_expr(cond);
            let then_body = fold_block(then_body);
            let else_body = fold_block(else_body);
            if let Expr::Number(value, _) = cond {
                let taken = if value != 0 { then_body } else { else_body };
                out.extend(taken);
            } else {
                out.push(Stmt::IfElse {
                    cond,
                    then_body,
                    else_body,
                    span,
                });
            }
        }
        Stmt::While { cond, body, span } => out.push(Stmt::While {
            cond: fold_expr(cond),
            body: fold_block(body),
            span,
        }),
    }
}

/// Fold one expression bottom-up.
pub fn fold_expr(expr: Expr) -> Expr {
    match expr {
        Expr::Number(_, _) | Expr::Var(_, _) => expr,
        Expr::Unary { op, expr, span } => {
            let inner = fold_expr(*expr);
            if let Expr::Number(value, _) = inner {
                return Expr::Number(eval_unary(op, value), span);
            }
            Expr::Unary {
                op,
                expr: Box::new(inner),
                span,
            }
        }
        Expr::Binary {
            op,
            left,
            right,
            span,
        } => {
            let left = fold_expr(*left);
            let right = fold_expr(*right);
            if let (Expr::Number(a, _), Expr::Number(b, _)) = (&left, &right) {
                if let Some(value) = eval_binary(op, *a, *b) {
                    return Expr::Number(value, span);
                }
            }
            Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            }
        }
    }
}

pub fn eval_unary(op: UnOp, value: i64) -> i64 {
    match op {
        UnOp::Neg => value.wrapping_neg(),
    }
}

/// Compile-time evaluation of a binary operator. Returns None for division
/// by zero, which must stay a runtime error.
pub fn eval_binary(op: BinOp, a: i64, b: i64) -> Option<i64> {
    Some(match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => {
            if b == 0 {
                return None;
            }
            a.wrapping_div(b)
        }
        BinOp::Eq => (a == b) as i64,
        BinOp::Ne => (a != b) as i64,
        BinOp::Lt => (a < b) as i64,
        BinOp::Gt => (a > b) as i64,
        BinOp::Le => (a <= b) as i64,
        BinOp::Ge => (a >= b) as i64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn parse(source: &str) -> Program {
        Parser::new(tokenize(source).expect("lex failure"))
            .parse()
            .expect("parse failure")
    }

    fn fold_source(source: &str) -> Program {
        fold_program(parse(source))
    }

    fn first_print_expr(program: &Program) -> &Expr {
        match program.body.first() {
            Some(Stmt::Print { expr, .. }) => expr,
            other => panic!("expected print statement, got {other:?}"),
        }
    }

    #[test]
    fn folds_arithmetic_with_precedence() {
        let program = fold_source("print 2 + 3 * 4; end");
        assert!(matches!(first_print_expr(&program), Expr::Number(14, _)));
    }

    #[test]
    fn folds_unary_minus() {
        let program = fold_source("print -5; end");
        assert!(matches!(first_print_expr(&program), Expr::Number(-5, _)));
    }

    #[test]
    fn division_truncates_toward_zero() {
        assert_eq!(eval_binary(BinOp::Div, 7, 2), Some(3));
        assert_eq!(eval_binary(BinOp::Div, -7, 2), Some(-3));
        assert_eq!(eval_binary(BinOp::Div, 7, -2), Some(-3));
    }

    #[test]
    fn relational_folds_to_zero_or_one() {
        let program = fold_source("print 1 < 2; print 3 == 4; end");
        assert!(matches!(&program.body[0], Stmt::Print { expr: Expr::Number(1, _), .. }));
        assert!(matches!(&program.body[1], Stmt::Print { expr: Expr::Number(0, _), .. }));
    }

    #[test]
    fn division_by_constant_zero_is_not_folded() {
        let program = fold_source("x = 1 / 0; end");
        match &program.body[0] {
            Stmt::Assign { expr, .. } => {
                assert!(matches!(expr, Expr::Binary { op: BinOp::Div, .. }));
            }
            other => panic!("expected assign, got {other:?}"),
        }
    }

    #[test]
    fn constant_true_condition_inlines_then_branch() {
        let program = fold_source("if 1 { print 10; } else { print 20; } end");
        assert_eq!(program.body.len(), 1);
        assert!(matches!(&program.body[0], Stmt::Print { expr: Expr::Number(10, _), .. }));
    }

    #[test]
    fn constant_false_condition_inlines_else_branch() {
        let program = fold_source("if 2 - 2 { print 10; } else { print 20; print 21; } end");
        assert_eq!(program.body.len(), 2);
        assert!(matches!(&program.body[0], Stmt::Print { expr: Expr::Number(20, _), .. }));
    }

    #[test]
    fn variable_condition_is_kept() {
        let program = fold_source("read c; if c { print 1; } else { print 0; } end");
        assert!(matches!(&program.body[1], Stmt::IfElse { .. }));
    }

    #[test]
    fn folds_inside_while_without_unrolling() {
        let program = fold_source("read n; while n > 1 + 1 { n = n - 1; } end");
        match &program.body[1] {
            Stmt::While { cond, .. } => match cond {
                Expr::Binary { op: BinOp::Gt, right, .. } => {
                    assert!(matches!(**right, Expr::Number(2, _)));
                }
                other => panic!("expected folded comparison, got {other:?}"),
            },
            other => panic!("expected while, got {other:?}"),
        }
    }

    #[test]
    fn folding_is_idempotent() {
        let src = "read a; x = 2 + 3 * 4 - a; if 1 < 2 { print x; } else { print 0; } end";
        let once = fold_program(parse(src));
        let twice = fold_program(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn mixed_expression_folds_constant_subtrees_only() {
        let program = fold_source("read a; print a + 2 * 3; end");
        match &program.body[1] {
            Stmt::Print { expr, .. } => {
                assert_eq!(expr.to_string(), "(a + 6)");
            }
            other => panic!("expected print, got {other:?}"),
        }
    }
}
