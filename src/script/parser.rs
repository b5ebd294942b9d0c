// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Recursive-descent parser from tokens to [`Program`].
//!
//! Expression precedence, lowest first:
//! conditional, `or`, `and`, `not`, comparison, `+ -`, `* / // %`,
//! unary `- +`, `**`, postfix (call, subscript, attribute), atom.
//!
//! Recursion depth is bounded by `max_depth` so hostile inputs cannot blow
//! the host stack before validation finishes.

use crate::script::ast::*;
use crate::script::error::ScriptSyntaxError;
use crate::script::lexer::{Keyword, Token, TokenKind};

pub fn parse(tokens: Vec<Token>, max_depth: usize) -> Result<Program, ScriptSyntaxError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth,
    };
    let mut body = Vec::new();
    parser.skip_newlines();
    while !parser.at(&TokenKind::Eof) {
        body.push(parser.statement()?);
        parser.skip_newlines();
    }
    Ok(Program { body })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    // ---- statements -------------------------------------------------------

    fn statement(&mut self) -> Result<Stmt, ScriptSyntaxError> {
        let line = self.current().line;
        match self.current().kind.clone() {
            TokenKind::Keyword(Keyword::If) => self.if_statement(line),
            TokenKind::Keyword(Keyword::While) => {
                self.advance();
                let cond = self.expression()?;
                let body = self.block()?;
                Ok(Stmt {
                    kind: StmtKind::While { cond, body },
                    line,
                })
            }
            TokenKind::Keyword(Keyword::For) => {
                self.advance();
                let var = self.expect_name()?;
                self.expect_keyword(Keyword::In)?;
                let iter = self.expression()?;
                let body = self.block()?;
                Ok(Stmt {
                    kind: StmtKind::For { var, iter, body },
                    line,
                })
            }
            _ => {
                let stmt = self.simple_statement()?;
                self.end_of_statement()?;
                Ok(stmt)
            }
        }
    }

    fn if_statement(&mut self, line: usize) -> Result<Stmt, ScriptSyntaxError> {
        self.advance();
        let mut branches = Vec::new();
        let cond = self.expression()?;
        branches.push((cond, self.block()?));

        let mut orelse = Vec::new();
        loop {
            if self.at_keyword(Keyword::Elif) {
                self.advance();
                let cond = self.expression()?;
                branches.push((cond, self.block()?));
            } else if self.at_keyword(Keyword::Else) {
                self.advance();
                orelse = self.block()?;
                break;
            } else {
                break;
            }
        }
        Ok(Stmt {
            kind: StmtKind::If { branches, orelse },
            line,
        })
    }

    /// `':' simple_stmt NEWLINE` or `':' NEWLINE INDENT stmt+ DEDENT`.
    fn block(&mut self) -> Result<Vec<Stmt>, ScriptSyntaxError> {
        self.expect_op(":")?;
        self.enter()?;
        let result = if self.at(&TokenKind::Newline) {
            self.advance();
            self.skip_newlines();
            if !self.at(&TokenKind::Indent) {
                return Err(self.error("expected an indented block"));
            }
            self.advance();
            let mut body = Vec::new();
            while !self.at(&TokenKind::Dedent) && !self.at(&TokenKind::Eof) {
                body.push(self.statement()?);
                self.skip_newlines();
            }
            if self.at(&TokenKind::Dedent) {
                self.advance();
            }
            Ok(body)
        } else {
            let stmt = self.simple_statement()?;
            self.end_of_statement()?;
            Ok(vec![stmt])
        };
        self.leave();
        result
    }

    fn simple_statement(&mut self) -> Result<Stmt, ScriptSyntaxError> {
        let token = self.current().clone();
        let line = token.line;
        let kind = match token.kind {
            TokenKind::Keyword(Keyword::Pass) => {
                self.advance();
                StmtKind::Pass
            }
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                StmtKind::Break
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.advance();
                StmtKind::Continue
            }
            TokenKind::Keyword(Keyword::Assert) => {
                self.advance();
                let test = self.expression()?;
                let msg = if self.at_op(",") {
                    self.advance();
                    Some(self.expression()?)
                } else {
                    None
                };
                StmtKind::Assert { test, msg }
            }
            TokenKind::Keyword(Keyword::Raise) => {
                self.advance();
                StmtKind::Raise(self.expression()?)
            }
            TokenKind::Keyword(kw)
                if !matches!(
                    kw,
                    Keyword::Not | Keyword::True | Keyword::False | Keyword::None
                ) =>
            {
                return Err(self.error(format!("'{}' is not supported here", kw.as_str())));
            }
            _ => {
                let expr = self.expression()?;
                if self.at_op("=") {
                    self.advance();
                    let target = self.to_target(expr)?;
                    let value = self.expression()?;
                    StmtKind::Assign { target, value }
                } else if let Some(op) = self.augmented_op() {
                    self.advance();
                    let target = self.to_target(expr)?;
                    let value = self.expression()?;
                    StmtKind::AugAssign { target, op, value }
                } else {
                    StmtKind::Expr(expr)
                }
            }
        };
        Ok(Stmt { kind, line })
    }

    fn augmented_op(&self) -> Option<BinOp> {
        match self.current().kind {
            TokenKind::Op("+=") => Some(BinOp::Add),
            TokenKind::Op("-=") => Some(BinOp::Sub),
            TokenKind::Op("*=") => Some(BinOp::Mul),
            TokenKind::Op("/=") => Some(BinOp::Div),
            _ => None,
        }
    }

    fn to_target(&self, expr: Expr) -> Result<Target, ScriptSyntaxError> {
        match expr.kind {
            ExprKind::Name(name) => Ok(Target::Name(name)),
            ExprKind::Index { base, index } => Ok(Target::Index {
                base: *base,
                index: *index,
            }),
            ExprKind::Attr { base, name } => Ok(Target::Attr { base: *base, name }),
            _ => Err(ScriptSyntaxError::new(expr.line, 0, "cannot assign to expression")),
        }
    }

    fn end_of_statement(&mut self) -> Result<(), ScriptSyntaxError> {
        match self.current().kind {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof | TokenKind::Dedent => Ok(()),
            _ => Err(self.error("expected end of statement")),
        }
    }

    // ---- expressions ------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, ScriptSyntaxError> {
        self.enter()?;
        let result = self.conditional();
        self.leave();
        result
    }

    fn conditional(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let then = self.or_expr()?;
        if !self.at_keyword(Keyword::If) {
            return Ok(then);
        }
        self.advance();
        let cond = self.or_expr()?;
        self.expect_keyword(Keyword::Else)?;
        let orelse = self.expression()?;
        let line = then.line;
        Ok(Expr {
            kind: ExprKind::IfExpr {
                cond: Box::new(cond),
                then: Box::new(then),
                orelse: Box::new(orelse),
            },
            line,
        })
    }

    fn or_expr(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let mut lhs = self.and_expr()?;
        while self.at_keyword(Keyword::Or) {
            self.advance();
            let rhs = self.and_expr()?;
            lhs = bool_op(BoolOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let mut lhs = self.not_expr()?;
        while self.at_keyword(Keyword::And) {
            self.advance();
            let rhs = self.not_expr()?;
            lhs = bool_op(BoolOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, ScriptSyntaxError> {
        if self.at_keyword(Keyword::Not) {
            let line = self.current().line;
            self.advance();
            self.enter()?;
            let operand = self.not_expr();
            self.leave();
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand?),
                },
                line,
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let first = self.arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            let rhs = self.arith()?;
            rest.push((op, rhs));
        }
        if rest.is_empty() {
            return Ok(first);
        }
        let line = first.line;
        Ok(Expr {
            kind: ExprKind::Compare {
                first: Box::new(first),
                rest,
            },
            line,
        })
    }

    /// Consumes and returns a comparison operator, if one is next.
    fn comparison_op(&mut self) -> Option<CmpOp> {
        let next_is = |kw| self.peek_kind(1) == Some(&TokenKind::Keyword(kw));
        let op = match self.current().kind {
            TokenKind::Op("==") => CmpOp::Eq,
            TokenKind::Op("!=") => CmpOp::NotEq,
            TokenKind::Op("<") => CmpOp::Lt,
            TokenKind::Op("<=") => CmpOp::LtE,
            TokenKind::Op(">") => CmpOp::Gt,
            TokenKind::Op(">=") => CmpOp::GtE,
            TokenKind::Keyword(Keyword::In) => CmpOp::In,
            TokenKind::Keyword(Keyword::Not) if next_is(Keyword::In) => CmpOp::NotIn,
            TokenKind::Keyword(Keyword::Is) if next_is(Keyword::Not) => CmpOp::IsNot,
            TokenKind::Keyword(Keyword::Is) => CmpOp::Is,
            _ => return None,
        };
        if matches!(op, CmpOp::NotIn | CmpOp::IsNot) {
            self.advance();
        }
        self.advance();
        Some(op)
    }

    fn arith(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Op("+") => BinOp::Add,
                TokenKind::Op("-") => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Op("*") => BinOp::Mul,
                TokenKind::Op("/") => BinOp::Div,
                TokenKind::Op("//") => BinOp::FloorDiv,
                TokenKind::Op("%") => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.factor()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn factor(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let op = match self.current().kind {
            TokenKind::Op("-") => UnaryOp::Neg,
            TokenKind::Op("+") => UnaryOp::Pos,
            _ => return self.power(),
        };
        let line = self.current().line;
        self.advance();
        self.enter()?;
        let operand = self.factor();
        self.leave();
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand?),
            },
            line,
        })
    }

    fn power(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let base = self.postfix()?;
        if !self.at_op("**") {
            return Ok(base);
        }
        self.advance();
        self.enter()?;
        let exponent = self.factor();
        self.leave();
        Ok(binary(BinOp::Pow, base, exponent?))
    }

    fn postfix(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let mut expr = self.atom()?;
        loop {
            let line = self.current().line;
            if self.at_op("(") {
                self.advance();
                let args = self.comma_separated(")")?;
                expr = Expr {
                    kind: ExprKind::Call {
                        func: Box::new(expr),
                        args,
                    },
                    line,
                };
            } else if self.at_op("[") {
                self.advance();
                let index = self.expression()?;
                self.expect_op("]")?;
                expr = Expr {
                    kind: ExprKind::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    },
                    line,
                };
            } else if self.at_op(".") {
                self.advance();
                let name = self.expect_name()?;
                expr = Expr {
                    kind: ExprKind::Attr {
                        base: Box::new(expr),
                        name,
                    },
                    line,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn atom(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let token = self.current().clone();
        let line = token.line;
        let kind = match token.kind {
            TokenKind::Name(name) => ExprKind::Name(name),
            TokenKind::Int(v) => ExprKind::Literal(Literal::Int(v)),
            TokenKind::Float(v) => ExprKind::Literal(Literal::Float(v)),
            TokenKind::Str(s) => ExprKind::Literal(Literal::Str(s)),
            TokenKind::Keyword(Keyword::True) => ExprKind::Literal(Literal::Bool(true)),
            TokenKind::Keyword(Keyword::False) => ExprKind::Literal(Literal::Bool(false)),
            TokenKind::Keyword(Keyword::None) => ExprKind::Literal(Literal::None),
            TokenKind::Op("(") => {
                self.advance();
                let inner = self.expression()?;
                self.expect_op(")")?;
                return Ok(inner);
            }
            TokenKind::Op("[") => {
                self.advance();
                let items = self.comma_separated("]")?;
                return Ok(Expr {
                    kind: ExprKind::List(items),
                    line,
                });
            }
            TokenKind::Op("{") => {
                self.advance();
                return self.dict_literal(line);
            }
            TokenKind::Keyword(kw) => {
                return Err(self.error(format!("'{}' is not supported here", kw.as_str())))
            }
            _ => return Err(self.error("expected an expression")),
        };
        self.advance();
        Ok(Expr { kind, line })
    }

    fn dict_literal(&mut self, line: usize) -> Result<Expr, ScriptSyntaxError> {
        let mut entries = Vec::new();
        while !self.at_op("}") {
            let key = self.expression()?;
            self.expect_op(":")?;
            let value = self.expression()?;
            entries.push((key, value));
            if self.at_op(",") {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_op("}")?;
        Ok(Expr {
            kind: ExprKind::Dict(entries),
            line,
        })
    }

    fn comma_separated(&mut self, close: &'static str) -> Result<Vec<Expr>, ScriptSyntaxError> {
        let mut items = Vec::new();
        while !self.at_op(close) {
            items.push(self.expression()?);
            if self.at_op(",") {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_op(close)?;
        Ok(items)
    }

    // ---- token helpers ----------------------------------------------------

    fn enter(&mut self) -> Result<(), ScriptSyntaxError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.error(format!(
                "script nesting exceeds the maximum depth of {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn current(&self) -> &Token {
        // The lexer always terminates the stream with Eof.
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.current().kind, TokenKind::Op(o) if o == op)
    }

    fn at_keyword(&self, kw: Keyword) -> bool {
        self.current().kind == TokenKind::Keyword(kw)
    }

    fn skip_newlines(&mut self) {
        while self.at(&TokenKind::Newline) {
            self.advance();
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<(), ScriptSyntaxError> {
        if self.at_op(op) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected '{op}'")))
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<(), ScriptSyntaxError> {
        if self.at_keyword(kw) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", kw.as_str())))
        }
    }

    fn expect_name(&mut self) -> Result<String, ScriptSyntaxError> {
        match self.current().kind.clone() {
            TokenKind::Name(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("expected a name")),
        }
    }

    fn error(&self, message: impl Into<String>) -> ScriptSyntaxError {
        let token = self.current();
        ScriptSyntaxError::new(token.line, token.column, message)
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    let line = lhs.line;
    Expr {
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        line,
    }
}

fn bool_op(op: BoolOp, lhs: Expr, rhs: Expr) -> Expr {
    let line = lhs.line;
    Expr {
        kind: ExprKind::BoolOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::lexer::tokenize;

    fn parse_source(source: &str) -> Result<Program, ScriptSyntaxError> {
        parse(tokenize(source)?, 64)
    }

    #[test]
    fn parses_single_line_if_with_augmented_assignment() {
        let program = parse_source("if ratio > 3.0: confidence += 0.05").unwrap();
        assert_eq!(program.body.len(), 1);
        let StmtKind::If { branches, orelse } = &program.body[0].kind else {
            panic!("expected if statement");
        };
        assert_eq!(branches.len(), 1);
        assert!(orelse.is_empty());
        assert!(matches!(
            branches[0].1[0].kind,
            StmtKind::AugAssign { op: BinOp::Add, .. }
        ));
    }

    #[test]
    fn parses_elif_else_chain_and_nested_blocks() {
        let source = "\
if x > 1:
    y = 1
elif x > 0:
    for k in signal.keys():
        print(k)
else:
    pass
";
        let program = parse_source(source).unwrap();
        let StmtKind::If { branches, orelse } = &program.body[0].kind else {
            panic!("expected if statement");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(orelse, &vec![Stmt { kind: StmtKind::Pass, line: 7 }]);
        assert!(matches!(branches[1].1[0].kind, StmtKind::For { .. }));
    }

    #[test]
    fn power_binds_tighter_than_unary_minus() {
        let program = parse_source("x = -2 ** 2").unwrap();
        let StmtKind::Assign { value, .. } = &program.body[0].kind else {
            panic!("expected assignment");
        };
        assert!(matches!(
            value.kind,
            ExprKind::Unary { op: UnaryOp::Neg, .. }
        ));
    }

    #[test]
    fn parses_not_in_and_is_not() {
        let program = parse_source("a = 'x' not in d\nb = v is not None").unwrap();
        let StmtKind::Assign { value, .. } = &program.body[0].kind else {
            panic!("expected assignment");
        };
        let ExprKind::Compare { rest, .. } = &value.kind else {
            panic!("expected comparison");
        };
        assert_eq!(rest[0].0, CmpOp::NotIn);
        let StmtKind::Assign { value, .. } = &program.body[1].kind else {
            panic!("expected assignment");
        };
        let ExprKind::Compare { rest, .. } = &value.kind else {
            panic!("expected comparison");
        };
        assert_eq!(rest[0].0, CmpOp::IsNot);
    }

    #[test]
    fn rejects_assignment_to_call() {
        let err = parse_source("len(x) = 3").unwrap_err();
        assert!(err.message.contains("cannot assign"));
    }

    #[test]
    fn rejects_unsupported_keywords() {
        let err = parse_source("def f():\n    pass").unwrap_err();
        assert!(err.message.contains("'def' is not supported"));
    }

    #[test]
    fn enforces_maximum_depth() {
        let source = format!("x = {}1{}", "(".repeat(80), ")".repeat(80));
        let err = parse_source(&source).unwrap_err();
        assert!(err.message.contains("maximum depth"));
    }

    #[test]
    fn parses_dict_and_list_literals() {
        let program = parse_source("d = {'a': 1, 'b': [1, 2,],}").unwrap();
        let StmtKind::Assign { value, .. } = &program.body[0].kind else {
            panic!("expected assignment");
        };
        let ExprKind::Dict(entries) = &value.kind else {
            panic!("expected dict literal");
        };
        assert_eq!(entries.len(), 2);
    }
}
