// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Static pre-execution gate for transformation scripts.
//!
//! Validation runs in four passes and fails closed at the first violation:
//!
//! 1. **Size**: the raw source must fit `max_script_bytes`.
//! 2. **Token scan**: imports, unsupported keywords, underscore-prefixed
//!    names, dunder string literals, dynamic-evaluation names and
//!    system-level names are rejected wherever they appear.
//! 3. **Tree scan**: after parsing (bounded by `max_nesting`), every name
//!    must be a script-local binding or on the allow-list, every attribute
//!    must be on the attribute allow-list, and library names cannot be
//!    rebound.
//! 4. **Compile**: the program is lowered for the script engine. Forms the
//!    engine cannot run, such as calling a value, are rejected here.

use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::SecurityError;
use crate::script::ast::{Expr, ExprKind, Program, Stmt, StmtKind, Target};
use crate::script::builtins::{BUILTIN_FUNCTIONS, MATH_MEMBERS, VALUE_METHODS};
use crate::script::compile::{compile, CompiledScript};
use crate::script::lexer::{tokenize, Keyword, Token, TokenKind};
use crate::script::parser::parse;
use crate::signal::{FIELD_ALIASES, RECORD_FIELDS};
use crate::utils::sha256_base64;

/// Name bound to the input record in every script namespace.
pub const INPUT_BINDING: &str = "signal";
/// Name a script assigns to return a replacement record.
pub const OUTPUT_BINDING: &str = "result";

const MODULE_NAMES: [&str; 2] = ["math", "Decimal"];

const DYNAMIC_EVALUATION: [&str; 17] = [
    "eval",
    "exec",
    "compile",
    "getattr",
    "setattr",
    "delattr",
    "hasattr",
    "globals",
    "locals",
    "vars",
    "dir",
    "type",
    "object",
    "super",
    "memoryview",
    "breakpoint",
    "callable",
];

const SYSTEM_SYMBOLS: [&str; 27] = [
    "os",
    "sys",
    "subprocess",
    "socket",
    "shutil",
    "pathlib",
    "open",
    "io",
    "builtins",
    "importlib",
    "ctypes",
    "threading",
    "multiprocessing",
    "http",
    "urllib",
    "requests",
    "pickle",
    "marshal",
    "exit",
    "quit",
    "platform",
    "resource",
    "gc",
    "inspect",
    "input",
    "help",
    "time",
];

/// A script that passed validation, ready to run against any number of
/// records. Cloning is cheap; the program is shared.
#[derive(Debug, Clone)]
pub struct ValidatedScript {
    program: Arc<Program>,
    compiled: Arc<CompiledScript>,
    digest: String,
    size_bytes: usize,
}

impl ValidatedScript {
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    pub fn compiled(&self) -> &Arc<CompiledScript> {
        &self.compiled
    }

    /// Base64 SHA-256 of the source text.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

#[derive(Debug, Clone)]
pub struct ScriptValidator {
    max_script_bytes: usize,
    max_nesting: usize,
}

impl ScriptValidator {
    pub fn new(max_script_bytes: usize, max_nesting: usize) -> Self {
        Self {
            max_script_bytes,
            max_nesting,
        }
    }

    pub fn validate(&self, source: &str) -> Result<ValidatedScript, SecurityError> {
        if source.len() > self.max_script_bytes {
            return Err(SecurityError::TooLarge {
                size: source.len(),
                limit: self.max_script_bytes,
            });
        }

        let tokens = tokenize(source)?;
        scan_tokens(&tokens)?;

        let program = parse(tokens, self.max_nesting)?;
        TreeScan::new(&program).check_block(&program.body)?;
        let compiled = compile(&program, self.max_nesting)?;

        Ok(ValidatedScript {
            program: Arc::new(program),
            compiled: Arc::new(compiled),
            digest: sha256_base64(source.as_bytes()),
            size_bytes: source.len(),
        })
    }
}

fn scan_tokens(tokens: &[Token]) -> Result<(), SecurityError> {
    for token in tokens {
        let line = token.line;
        match &token.kind {
            TokenKind::Keyword(Keyword::Import | Keyword::From) => {
                return Err(SecurityError::ModuleImport { line });
            }
            TokenKind::Keyword(
                kw @ (Keyword::Def
                | Keyword::Class
                | Keyword::Lambda
                | Keyword::With
                | Keyword::Try
                | Keyword::Except
                | Keyword::Finally
                | Keyword::Global
                | Keyword::Nonlocal
                | Keyword::Del
                | Keyword::Return
                | Keyword::Yield
                | Keyword::Async
                | Keyword::Await
                | Keyword::As),
            ) => {
                return Err(SecurityError::ForbiddenConstruct {
                    construct: kw.as_str().to_string(),
                    line,
                });
            }
            TokenKind::Name(name) => check_name_token(name, line)?,
            TokenKind::Str(literal) if literal.contains("__") => {
                return Err(SecurityError::DunderAccess {
                    name: literal.clone(),
                    line,
                });
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_name_token(name: &str, line: usize) -> Result<(), SecurityError> {
    if name.starts_with('_') {
        return Err(SecurityError::DunderAccess {
            name: name.to_string(),
            line,
        });
    }
    if DYNAMIC_EVALUATION.contains(&name) {
        return Err(SecurityError::DynamicEvaluation {
            name: name.to_string(),
            line,
        });
    }
    if SYSTEM_SYMBOLS.contains(&name) {
        return Err(SecurityError::SystemAccess {
            name: name.to_string(),
            line,
        });
    }
    Ok(())
}

fn is_library_name(name: &str) -> bool {
    MODULE_NAMES.contains(&name) || BUILTIN_FUNCTIONS.contains(&name)
}

fn is_allowed_attribute(name: &str) -> bool {
    MATH_MEMBERS.contains(&name) || VALUE_METHODS.contains(&name) || RECORD_FIELDS.contains(&name)
}

struct TreeScan {
    bound: HashSet<String>,
}

impl TreeScan {
    /// Any name assigned anywhere in the script counts as a local binding.
    fn new(program: &Program) -> Self {
        let mut bound: HashSet<String> = [INPUT_BINDING, OUTPUT_BINDING]
            .into_iter()
            .chain(FIELD_ALIASES.iter().map(|(alias, _)| *alias))
            .map(str::to_string)
            .collect();
        collect_bindings(&program.body, &mut bound);
        Self { bound }
    }

    fn check_block(&self, body: &[Stmt]) -> Result<(), SecurityError> {
        body.iter().try_for_each(|stmt| self.check_stmt(stmt))
    }

    fn check_stmt(&self, stmt: &Stmt) -> Result<(), SecurityError> {
        match &stmt.kind {
            StmtKind::Expr(expr) | StmtKind::Raise(expr) => self.check_expr(expr),
            StmtKind::Assign { target, value } | StmtKind::AugAssign { target, value, .. } => {
                self.check_target(target, stmt.line)?;
                self.check_expr(value)
            }
            StmtKind::If { branches, orelse } => {
                for (cond, body) in branches {
                    self.check_expr(cond)?;
                    self.check_block(body)?;
                }
                self.check_block(orelse)
            }
            StmtKind::While { cond, body } => {
                self.check_expr(cond)?;
                self.check_block(body)
            }
            StmtKind::For { var, iter, body } => {
                self.check_binding(var, stmt.line)?;
                self.check_expr(iter)?;
                self.check_block(body)
            }
            StmtKind::Assert { test, msg } => {
                self.check_expr(test)?;
                msg.as_ref().map_or(Ok(()), |m| self.check_expr(m))
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Pass => Ok(()),
        }
    }

    fn check_target(&self, target: &Target, line: usize) -> Result<(), SecurityError> {
        match target {
            Target::Name(name) => self.check_binding(name, line),
            Target::Index { base, index } => {
                self.check_expr(base)?;
                self.check_expr(index)
            }
            Target::Attr { base, name } => {
                // Only record fields are writable through attribute syntax.
                if !RECORD_FIELDS.contains(&name.as_str()) {
                    return Err(SecurityError::ForbiddenAttribute {
                        name: name.clone(),
                        line,
                    });
                }
                self.check_expr(base)
            }
        }
    }

    fn check_binding(&self, name: &str, line: usize) -> Result<(), SecurityError> {
        if is_library_name(name) {
            return Err(SecurityError::LibraryRebinding {
                name: name.to_string(),
                line,
            });
        }
        Ok(())
    }

    fn check_expr(&self, expr: &Expr) -> Result<(), SecurityError> {
        match &expr.kind {
            ExprKind::Literal(_) => Ok(()),
            ExprKind::Name(name) => {
                if self.bound.contains(name) || is_library_name(name) {
                    Ok(())
                } else {
                    Err(SecurityError::UnknownIdentifier {
                        name: name.clone(),
                        line: expr.line,
                    })
                }
            }
            ExprKind::List(items) => items.iter().try_for_each(|item| self.check_expr(item)),
            ExprKind::Dict(entries) => entries.iter().try_for_each(|(k, v)| {
                self.check_expr(k)?;
                self.check_expr(v)
            }),
            ExprKind::Attr { base, name } => {
                if !is_allowed_attribute(name) {
                    return Err(SecurityError::ForbiddenAttribute {
                        name: name.clone(),
                        line: expr.line,
                    });
                }
                self.check_expr(base)
            }
            ExprKind::Index { base, index } => {
                self.check_expr(base)?;
                self.check_expr(index)
            }
            ExprKind::Call { func, args } => {
                self.check_expr(func)?;
                args.iter().try_for_each(|arg| self.check_expr(arg))
            }
            ExprKind::Unary { operand, .. } => self.check_expr(operand),
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::BoolOp { lhs, rhs, .. } => {
                self.check_expr(lhs)?;
                self.check_expr(rhs)
            }
            ExprKind::Compare { first, rest } => {
                self.check_expr(first)?;
                rest.iter().try_for_each(|(_, e)| self.check_expr(e))
            }
            ExprKind::IfExpr { cond, then, orelse } => {
                self.check_expr(cond)?;
                self.check_expr(then)?;
                self.check_expr(orelse)
            }
        }
    }
}

pub(crate) fn collect_bindings(body: &[Stmt], bound: &mut HashSet<String>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Assign {
                target: Target::Name(name),
                ..
            }
            | StmtKind::AugAssign {
                target: Target::Name(name),
                ..
            } => {
                bound.insert(name.clone());
            }
            StmtKind::For { var, body, .. } => {
                bound.insert(var.clone());
                collect_bindings(body, bound);
            }
            StmtKind::While { body, .. } => collect_bindings(body, bound),
            StmtKind::If { branches, orelse } => {
                for (_, body) in branches {
                    collect_bindings(body, bound);
                }
                collect_bindings(orelse, bound);
            }
            _ => {}
        }
    }
}
