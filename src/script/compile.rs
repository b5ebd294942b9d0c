// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Lowering of validated programs onto the embedded engine.
//!
//! The syntax tree is rewritten into engine source in which every
//! operation is a call to a host function registered by
//! [`engine`](crate::script::engine). Script variables become `v_<name>`,
//! compiler temporaries `t_<n>` and host functions `rt_<name>`; the token
//! scan already rejects underscore-prefixed names, so the three spaces
//! cannot collide. Each statement is emitted on its own line and a line map
//! translates engine positions back to script lines.

use rhai::{Engine, OptimizationLevel, AST};
use std::collections::HashSet;
use std::fmt::Write as _;

use crate::errors::SecurityError;
use crate::script::ast::{
    BinOp, BoolOp, CmpOp, Expr, ExprKind, Literal, Program, Stmt, StmtKind, Target, UnaryOp,
};
use crate::script::builtins::{math_constant, Builtin, MathFn, Method};
use crate::script::error::ScriptSyntaxError;
use crate::script::validator::{collect_bindings, INPUT_BINDING};
use crate::signal::{FIELD_ALIASES, RECORD_FIELDS};

/// Most arguments a library call may take, `print`, `min` and `max` aside.
const MAX_CALL_ARGS: usize = 4;

/// A program compiled for the engine, shared by every record of a batch.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    ast: AST,
    lines: Vec<usize>,
}

impl CompiledScript {
    pub fn ast(&self) -> &AST {
        &self.ast
    }

    /// Script line of an engine source line; 0 when unknown.
    pub fn source_line(&self, engine_line: Option<usize>) -> usize {
        engine_line
            .and_then(|line| line.checked_sub(1))
            .and_then(|index| self.lines.get(index))
            .copied()
            .unwrap_or(0)
    }
}

/// Engine variable holding the script name `name`.
pub fn variable(name: &str) -> String {
    format!("v_{name}")
}

/// Host function implementing a binary operator.
pub fn binary_host(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "rt_add",
        BinOp::Sub => "rt_sub",
        BinOp::Mul => "rt_mul",
        BinOp::Div => "rt_div",
        BinOp::FloorDiv => "rt_floordiv",
        BinOp::Mod => "rt_mod",
        BinOp::Pow => "rt_pow",
    }
}

/// Host function implementing a comparison operator.
pub fn compare_host(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "rt_eq",
        CmpOp::NotEq => "rt_ne",
        CmpOp::Lt => "rt_lt",
        CmpOp::LtE => "rt_le",
        CmpOp::Gt => "rt_gt",
        CmpOp::GtE => "rt_ge",
        CmpOp::In => "rt_in",
        CmpOp::NotIn => "rt_not_in",
        CmpOp::Is => "rt_is",
        CmpOp::IsNot => "rt_is_not",
    }
}

pub fn unary_host(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "rt_neg",
        UnaryOp::Pos => "rt_pos",
        UnaryOp::Not => "rt_not",
    }
}

/// Lowers and compiles a program that already passed the tree scan.
pub fn compile(program: &Program, max_nesting: usize) -> Result<CompiledScript, SecurityError> {
    let (source, lines) = lower(program)?;

    let mut engine = Engine::new_raw();
    engine.set_optimization_level(OptimizationLevel::None);
    let depth = max_nesting.saturating_mul(4).saturating_add(32);
    engine.set_max_expr_depths(depth, depth);

    let ast = engine.compile(&source).map_err(|err| {
        let line = err
            .position()
            .line()
            .and_then(|l| lines.get(l.saturating_sub(1)))
            .copied()
            .unwrap_or(0);
        SecurityError::Syntax(ScriptSyntaxError::new(line, 0, err.err_type().to_string()))
    })?;

    Ok(CompiledScript { ast, lines })
}

/// Engine source for a program together with its line map.
pub fn lower(program: &Program) -> Result<(String, Vec<usize>), SecurityError> {
    let mut lowering = Lowering::default();

    let prebound: HashSet<&str> = std::iter::once(INPUT_BINDING)
        .chain(FIELD_ALIASES.iter().map(|(alias, _)| *alias))
        .collect();
    let mut assigned = HashSet::new();
    collect_bindings(&program.body, &mut assigned);
    let mut hoisted: Vec<String> = assigned
        .into_iter()
        .filter(|name| !prebound.contains(name.as_str()))
        .collect();
    hoisted.sort();
    if !hoisted.is_empty() {
        let prelude: Vec<String> = hoisted
            .iter()
            .map(|name| format!("let {} = ();", variable(name)))
            .collect();
        lowering.emit(prelude.join(" "), 1);
    }

    lowering.stmts(&program.body)?;
    Ok((lowering.out, lowering.lines))
}

fn forbidden(construct: impl Into<String>, line: usize) -> SecurityError {
    SecurityError::ForbiddenConstruct {
        construct: construct.into(),
        line,
    }
}

/// An assignable location rooted at a script variable.
struct Place<'a> {
    root: &'a str,
    steps: Vec<Step<'a>>,
}

enum Step<'a> {
    Index(&'a Expr),
    Field(&'a str),
}

impl<'a> Place<'a> {
    fn of(expr: &'a Expr) -> Option<Self> {
        match &expr.kind {
            ExprKind::Name(name) => Some(Place {
                root: name,
                steps: Vec::new(),
            }),
            ExprKind::Index { base, index } => {
                let mut place = Place::of(base)?;
                place.steps.push(Step::Index(index));
                Some(place)
            }
            ExprKind::Attr { base, name } => {
                let mut place = Place::of(base)?;
                place.steps.push(Step::Field(name));
                Some(place)
            }
            _ => None,
        }
    }

    /// Containers between the root and a value stored into this place.
    fn levels(&self) -> usize {
        self.steps.len() + 1
    }
}

#[derive(Default)]
struct Lowering {
    out: String,
    lines: Vec<usize>,
    indent: usize,
    temps: usize,
}

impl Lowering {
    fn emit(&mut self, code: impl AsRef<str>, line: usize) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(code.as_ref());
        self.out.push('\n');
        self.lines.push(line);
    }

    fn temp(&mut self) -> String {
        self.temps += 1;
        format!("t_{}", self.temps)
    }

    fn stmts(&mut self, body: &[Stmt]) -> Result<(), SecurityError> {
        body.iter().try_for_each(|stmt| self.stmt(stmt))
    }

    fn block(&mut self, body: &[Stmt]) -> Result<(), SecurityError> {
        self.indent += 1;
        let result = self.stmts(body);
        self.indent -= 1;
        result
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), SecurityError> {
        let line = stmt.line;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                let code = self.expr(expr)?;
                self.emit(statement(code), line);
            }
            StmtKind::Assign { target, value } => {
                let code = self.assign(target, value)?;
                self.emit(code, line);
            }
            StmtKind::AugAssign { target, op, value } => {
                let code = self.aug_assign(target, *op, value)?;
                self.emit(code, line);
            }
            StmtKind::If { branches, orelse } => {
                for (i, (cond, body)) in branches.iter().enumerate() {
                    let test = self.truthy(cond)?;
                    if i == 0 {
                        self.emit(format!("if {test} {{"), cond.line);
                    } else {
                        self.emit(format!("}} else if {test} {{"), cond.line);
                    }
                    self.block(body)?;
                }
                if !orelse.is_empty() {
                    self.emit("} else {", line);
                    self.block(orelse)?;
                }
                self.emit("}", line);
            }
            StmtKind::While { cond, body } => {
                let test = self.truthy(cond)?;
                self.emit(format!("while {test} {{"), line);
                self.block(body)?;
                self.emit("}", line);
            }
            StmtKind::For { var, iter, body } => {
                let items = self.with_receiver("rt_iter", iter, &[])?;
                let item = self.temp();
                self.emit(
                    format!("for {item} in {items} {{ {} = {item};", variable(var)),
                    line,
                );
                self.block(body)?;
                self.emit("}", line);
            }
            StmtKind::Assert { test, msg } => {
                let failed = self.with_receiver("rt_not", test, &[])?;
                let message = match msg {
                    Some(m) => self.expr(m)?,
                    None => "\"\"".to_string(),
                };
                self.emit(
                    format!("if {failed} {{ rt_assert_failed({message}); }}"),
                    line,
                );
            }
            StmtKind::Raise(expr) => {
                let message = self.expr(expr)?;
                self.emit(format!("rt_raise({message});"), line);
            }
            StmtKind::Break => self.emit("break;", line),
            StmtKind::Continue => self.emit("continue;", line),
            StmtKind::Pass => {}
        }
        Ok(())
    }

    fn assign(&mut self, target: &Target, value: &Expr) -> Result<String, SecurityError> {
        match target {
            Target::Name(name) => {
                let code = self.expr(value)?;
                Ok(format!("{} = {};", variable(name), stored(code, value, 0)))
            }
            Target::Index { base, index } => {
                let index = self.expr(index)?;
                let code = self.expr(value)?;
                self.mutate(base, |levels| {
                    format!("rt_set_item({index}, {})", stored(code, value, levels))
                })
                .map(statement)
            }
            Target::Attr { base, name } => {
                let code = self.expr(value)?;
                self.mutate(base, |levels| {
                    format!("rt_set_attr({}, {})", quote(name), stored(code, value, levels))
                })
                .map(statement)
            }
        }
    }

    fn aug_assign(
        &mut self,
        target: &Target,
        op: BinOp,
        value: &Expr,
    ) -> Result<String, SecurityError> {
        let host = binary_host(op);
        let rhs = self.expr(value)?;
        match target {
            Target::Name(name) => {
                let var = variable(name);
                Ok(format!("{var} = rt_store({host}({var}, {rhs}), 0);"))
            }
            Target::Index { base, index } => {
                let key = self.temp();
                let index = self.expr(index)?;
                let Some(place) = Place::of(base) else {
                    let container = self.temp();
                    let base = self.expr(base)?;
                    return Ok(statement(format!(
                        "{{ let {container} = {base}; let {key} = {index}; {container}.rt_set_item({key}, {host}({container}.rt_get_item({key}), {rhs})) }}"
                    )));
                };
                let (prefix, path) = self.path(&place)?;
                let levels = place.levels();
                Ok(statement(format!(
                    "{{ {prefix}let {key} = {index}; {path}.rt_set_item({key}, rt_store({host}({path}.rt_get_item({key}), {rhs}), {levels})) }}"
                )))
            }
            Target::Attr { base, name } => {
                let field = quote(name);
                let Some(place) = Place::of(base) else {
                    let container = self.temp();
                    let base = self.expr(base)?;
                    return Ok(statement(format!(
                        "{{ let {container} = {base}; {container}.rt_set_attr({field}, {host}({container}.rt_field({field}), {rhs})) }}"
                    )));
                };
                let (prefix, path) = self.path(&place)?;
                let levels = place.levels();
                Ok(statement(format!(
                    "{{ {prefix}{path}.rt_set_attr({field}, rt_store({host}({path}.rt_field({field}), {rhs}), {levels})) }}"
                )))
            }
        }
    }

    /// Applies a mutating host call to the container `base` in place.
    ///
    /// The closure receives the container's level below the root and
    /// returns the call, e.g. `rt_append(x)`.
    fn mutate(
        &mut self,
        base: &Expr,
        call: impl FnOnce(usize) -> String,
    ) -> Result<String, SecurityError> {
        match Place::of(base) {
            Some(place) => {
                let (prefix, path) = self.path(&place)?;
                let call = call(place.levels());
                if prefix.is_empty() {
                    Ok(format!("{path}.{call}"))
                } else {
                    Ok(format!("{{ {prefix}{path}.{call} }}"))
                }
            }
            None => {
                let container = self.temp();
                let base = self.expr(base)?;
                let call = call(1);
                Ok(format!("{{ let {container} = {base}; {container}.{call} }}"))
            }
        }
    }

    /// Checked slots leading to a place, as `let` bindings, and the engine
    /// path that reaches it.
    fn path(&mut self, place: &Place<'_>) -> Result<(String, String), SecurityError> {
        let mut prefix = String::new();
        let mut path = variable(place.root);
        for step in &place.steps {
            let slot = self.temp();
            let checked = match step {
                Step::Index(index) => format!("rt_slot({})", self.expr(index)?),
                Step::Field(name) => format!("rt_field_slot({})", quote(name)),
            };
            let _ = write!(prefix, "let {slot} = {path}.{checked}; ");
            path = format!("{path}[{slot}]");
        }
        Ok((prefix, path))
    }

    fn truthy(&mut self, expr: &Expr) -> Result<String, SecurityError> {
        self.with_receiver("rt_truthy", expr, &[])
    }

    /// Calls `host` with `first` as its receiver. Variables are passed by
    /// reference; any other expression is evaluated into a temporary.
    fn with_receiver(
        &mut self,
        host: &str,
        first: &Expr,
        rest: &[String],
    ) -> Result<String, SecurityError> {
        if let ExprKind::Name(name) = &first.kind {
            if !is_library(name) {
                return Ok(format!("{}.{host}({})", variable(name), rest.join(", ")));
            }
        }
        let first = self.expr(first)?;
        let args: Vec<String> = std::iter::once(first).chain(rest.iter().cloned()).collect();
        Ok(format!("{host}({})", args.join(", ")))
    }

    fn exprs(&mut self, exprs: &[Expr]) -> Result<Vec<String>, SecurityError> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn expr(&mut self, expr: &Expr) -> Result<String, SecurityError> {
        let line = expr.line;
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(literal_code(literal)),
            ExprKind::Name(name) => {
                if is_library(name) {
                    return Err(forbidden(format!("'{name}' used as a value"), line));
                }
                Ok(variable(name))
            }
            ExprKind::List(items) => {
                let items = self.exprs(items)?;
                Ok(format!("rt_list_of([{}])", items.join(", ")))
            }
            ExprKind::Dict(entries) => {
                let mut flat = Vec::with_capacity(entries.len() * 2);
                for (key, value) in entries {
                    flat.push(self.expr(key)?);
                    flat.push(self.expr(value)?);
                }
                Ok(format!("rt_dict_of([{}])", flat.join(", ")))
            }
            ExprKind::Attr { base, name } => {
                if is_math(base) {
                    return match (math_constant(name), name.as_str()) {
                        (Some(_), "inf" | "nan") => Ok(format!("rt_math_const({})", quote(name))),
                        (Some(value), _) => Ok(float_code(value)),
                        (None, _) => Err(forbidden(format!("'math.{name}' used as a value"), line)),
                    };
                }
                if Method::from_name(name).is_some() && !RECORD_FIELDS.contains(&name.as_str()) {
                    return Err(forbidden(format!("method '{name}' used as a value"), line));
                }
                self.with_receiver("rt_field", base, &[quote(name)])
            }
            ExprKind::Index { base, index } => {
                let index = self.expr(index)?;
                self.with_receiver("rt_get_item", base, &[index])
            }
            ExprKind::Call { func, args } => self.call(func, args, line),
            ExprKind::Unary { op, operand } => self.with_receiver(unary_host(*op), operand, &[]),
            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.expr(lhs)?;
                let r = self.expr(rhs)?;
                Ok(format!("{}({l}, {r})", binary_host(*op)))
            }
            ExprKind::Compare { first, rest } => self.compare(first, rest),
            ExprKind::BoolOp { op, lhs, rhs } => {
                let t = self.temp();
                let l = self.expr(lhs)?;
                let r = self.expr(rhs)?;
                Ok(match op {
                    BoolOp::And => {
                        format!("{{ let {t} = {l}; if {t}.rt_truthy() {{ {r} }} else {{ {t} }} }}")
                    }
                    BoolOp::Or => {
                        format!("{{ let {t} = {l}; if {t}.rt_truthy() {{ {t} }} else {{ {r} }} }}")
                    }
                })
            }
            ExprKind::IfExpr { cond, then, orelse } => {
                let test = self.truthy(cond)?;
                let then = self.expr(then)?;
                let orelse = self.expr(orelse)?;
                Ok(format!("if {test} {{ {then} }} else {{ {orelse} }}"))
            }
        }
    }

    fn compare(&mut self, first: &Expr, rest: &[(CmpOp, Expr)]) -> Result<String, SecurityError> {
        if let [(op, rhs)] = rest {
            let l = self.expr(first)?;
            let r = self.expr(rhs)?;
            return Ok(format!("{}({l}, {r})", compare_host(*op)));
        }
        let head = self.temp();
        let first = self.expr(first)?;
        let chain = self.compare_chain(&head, rest)?;
        Ok(format!("{{ let {head} = {first}; {chain} }}"))
    }

    fn compare_chain(&mut self, prev: &str, rest: &[(CmpOp, Expr)]) -> Result<String, SecurityError> {
        let Some(((op, rhs), tail)) = rest.split_first() else {
            return Ok("true".to_string());
        };
        let current = self.temp();
        let value = self.expr(rhs)?;
        let test = format!("{}({prev}, {current})", compare_host(*op));
        if tail.is_empty() {
            return Ok(format!("{{ let {current} = {value}; {test} }}"));
        }
        let more = self.compare_chain(&current, tail)?;
        Ok(format!(
            "{{ let {current} = {value}; if {test} {{ {more} }} else {{ false }} }}"
        ))
    }

    fn call(&mut self, func: &Expr, args: &[Expr], line: usize) -> Result<String, SecurityError> {
        match &func.kind {
            ExprKind::Name(name) if name == "Decimal" => {
                self.library_call("rt_decimal", name, args, line)
            }
            ExprKind::Name(name) => match Builtin::from_name(name) {
                Some(Builtin::Print) => {
                    let args = self.exprs(args)?;
                    Ok(format!("rt_print([{}])", args.join(", ")))
                }
                Some(extremum @ (Builtin::Min | Builtin::Max)) if args.len() > 1 => {
                    let args = self.exprs(args)?;
                    Ok(format!("{}([{}])", extremum.host_name(), args.join(", ")))
                }
                Some(builtin) => self.library_call(&builtin.host_name(), name, args, line),
                None => Err(forbidden("call of a non-library value", line)),
            },
            ExprKind::Attr { base, name } if is_math(base) => match MathFn::from_name(name) {
                Some(f) => self.library_call(&f.host_name(), name, args, line),
                None => Err(forbidden("call of a non-library value", line)),
            },
            ExprKind::Attr { base, name } => match Method::from_name(name) {
                Some(Method::Append) => {
                    let [item] = args else {
                        let args = self.exprs(args)?;
                        return self.with_receiver("rt_append", base, &args);
                    };
                    let code = self.expr(item)?;
                    self.mutate(base, |levels| {
                        format!("rt_append({})", stored(code, item, levels))
                    })
                }
                Some(method) => {
                    if args.len() > MAX_CALL_ARGS {
                        return Err(forbidden(format!("too many arguments to '{name}'"), line));
                    }
                    let args = self.exprs(args)?;
                    self.with_receiver(&method.host_name(), base, &args)
                }
                None => Err(forbidden("call of a non-library value", line)),
            },
            _ => Err(forbidden("call of a non-library value", line)),
        }
    }

    fn library_call(
        &mut self,
        host: &str,
        name: &str,
        args: &[Expr],
        line: usize,
    ) -> Result<String, SecurityError> {
        if args.len() > MAX_CALL_ARGS {
            return Err(forbidden(format!("too many arguments to '{name}'"), line));
        }
        match args.split_first() {
            None => Ok(format!("{host}()")),
            Some((first, rest)) => {
                let rest = self.exprs(rest)?;
                self.with_receiver(host, first, &rest)
            }
        }
    }
}

fn is_library(name: &str) -> bool {
    name == "math" || name == "Decimal" || Builtin::from_name(name).is_some()
}

fn is_math(expr: &Expr) -> bool {
    matches!(&expr.kind, ExprKind::Name(name) if name == "math")
}

/// Wraps a value stored into a variable or container so it is charged
/// against the memory ceiling. Scalar literals are free.
fn stored(code: String, value: &Expr, levels: usize) -> String {
    match &value.kind {
        ExprKind::Literal(literal) if !matches!(literal, Literal::Str(_)) => code,
        _ => format!("rt_store({code}, {levels})"),
    }
}

/// Block and `if` expressions need parentheses to stand as statements.
fn statement(code: String) -> String {
    if code.starts_with('{') || code.starts_with("if ") {
        format!("({code});")
    } else {
        format!("{code};")
    }
}

fn literal_code(literal: &Literal) -> String {
    match literal {
        Literal::None => "()".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Int(i) if *i >= 0 => i.to_string(),
        Literal::Int(i) => format!("rt_neg({})", i.unsigned_abs()),
        Literal::Float(f) => float_code(*f),
        Literal::Str(s) => quote(s),
    }
}

fn float_code(f: f64) -> String {
    if !f.is_finite() {
        let name = if f.is_nan() { "nan" } else { "inf" };
        return format!("rt_math_const(\"{name}\")");
    }
    let text = format!("{:e}", f.abs());
    let (mantissa, exponent) = text.split_once('e').unwrap_or((&text, "0"));
    let mantissa = if mantissa.contains('.') {
        mantissa.to_string()
    } else {
        format!("{mantissa}.0")
    };
    let literal = format!("{mantissa}e{exponent}");
    if f.is_sign_negative() {
        format!("rt_neg({literal})")
    } else {
        literal
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::lexer::tokenize;
    use crate::script::parser::parse;

    fn program(source: &str) -> Program {
        parse(tokenize(source).unwrap(), 32).unwrap()
    }

    fn lowered(source: &str) -> String {
        lower(&program(source)).unwrap().0
    }

    #[test]
    fn assignments_are_hoisted_and_charged() {
        let code = lowered("x = [1, 2]\nconfidence = 0.5");
        assert!(code.starts_with("let v_x = ();\n"));
        assert!(code.contains("v_x = rt_store(rt_list_of([1, 2]), 0);"));
        assert!(code.contains("v_confidence = 5.0e-1;"));
        assert!(!code.contains("let v_confidence"));
    }

    #[test]
    fn nested_item_assignment_mutates_in_place() {
        let code = lowered("signal['features']['m'] = 1.5");
        assert!(code.contains(
            "let t_1 = v_signal.rt_slot(\"features\"); v_signal[t_1].rt_set_item(\"m\", 1.5e0)"
        ));
    }

    #[test]
    fn append_on_a_variable_passes_it_by_reference() {
        let code = lowered("xs = []\nxs.append([1])");
        assert!(code.contains("v_xs.rt_append(rt_store(rt_list_of([1]), 1));"));
    }

    #[test]
    fn statements_map_back_to_script_lines() {
        let (code, lines) = lower(&program("x = 1\nif x:\n    y = 2\nelse:\n    y = 3")).unwrap();
        assert_eq!(code.lines().count(), lines.len());
        assert_eq!(lines, vec![1, 1, 2, 3, 2, 5, 2]);
    }

    #[test]
    fn library_values_and_foreign_calls_are_rejected() {
        let err = lower(&program("f = len")).unwrap_err();
        assert!(matches!(err, SecurityError::ForbiddenConstruct { line: 1, .. }));
        let err = lower(&program("x = 1\ny = x(2)")).unwrap_err();
        assert!(matches!(err, SecurityError::ForbiddenConstruct { line: 2, .. }));
        let err = lower(&program("k = signal.keys")).unwrap_err();
        assert!(matches!(err, SecurityError::ForbiddenConstruct { .. }));
        let err = lower(&program("x = round(1, 2, 3, 4, 5)")).unwrap_err();
        assert!(matches!(err, SecurityError::ForbiddenConstruct { .. }));
    }

    #[test]
    fn literals_lower_to_engine_syntax() {
        assert_eq!(float_code(0.1), "1.0e-1");
        assert_eq!(float_code(1234.5), "1.2345e3");
        assert_eq!(float_code(f64::INFINITY), "rt_math_const(\"inf\")");
        assert_eq!(quote("a\"b\\\n"), "\"a\\\"b\\\\\\n\"");
    }

    #[test]
    fn lowered_programs_compile() {
        let source = "\
total = 0
for i in range(10):
    if 0 < i <= 5 and not i % 2:
        total += i
    elif i > 8:
        break
label = 'hi' if total else 'lo'
d = {'a': [1, 2]}
d['a'][0] += 5
signal.features['total'] = total
assert total == 6, 'sum'
";
        assert!(compile(&program(source), 32).is_ok());
    }
}
