// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Execution of compiled scripts on the embedded `rhai` engine.
//!
//! Each record gets its own [`ScriptRunner`]: a raw engine with no
//! standard packages, only the host library registered below, and hard
//! limits taken from the record's [`Meter`]. The engine counts operations
//! against the fuel budget and enforces per-value size ceilings; the
//! progress hook polls the interrupt flag on every operation and the
//! wall-clock deadline every [`DEADLINE_POLL_INTERVAL`] operations.
//! Values stored into variables and containers are charged against the
//! memory ceiling. Accounting is monotonic: freed values are not credited
//! back.

use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Scope, INT};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::script::ast::{BinOp, CmpOp, UnaryOp};
use crate::script::builtins::{
    call_builtin, call_math, call_method, iterate, make_decimal, math_constant, Builtin, MathFn,
    Method,
};
use crate::script::compile::{binary_host, compare_host, unary_host, CompiledScript};
use crate::script::error::{raise, too_large, EvalError, ExceptionKind, HostResult, Raised};
use crate::script::ops;
use crate::script::value::{depth, render_prefix, truthy, Footprint, Limits};

/// How often, in operations, the wall-clock deadline is polled.
const DEADLINE_POLL_INTERVAL: u64 = 1024;

/// Receives lines written with `print`.
pub trait ConsoleSink: Send + Sync {
    fn write_line(&self, line: &str);

    /// Longest line, in characters, the sink keeps. `print` renders no
    /// more than this.
    fn max_line_chars(&self) -> usize {
        usize::MAX
    }
}

/// Fuel, memory and interruption settings for one execution.
#[derive(Debug, Clone)]
pub struct Meter {
    fuel_budget: u64,
    memory_limit: usize,
    interrupt: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl Meter {
    pub fn new(fuel_budget: u64, memory_limit: usize) -> Self {
        Self {
            fuel_budget,
            memory_limit,
            interrupt: None,
            deadline: None,
        }
    }

    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn fuel_budget(&self) -> u64 {
        self.fuel_budget
    }

    pub fn memory_limit(&self) -> usize {
        self.memory_limit
    }
}

pub struct ScriptRunner {
    engine: Engine,
    meter: Meter,
    fuel_used: Arc<AtomicU64>,
    memory_used: Arc<AtomicUsize>,
}

impl ScriptRunner {
    pub fn new(meter: Meter, console: Arc<dyn ConsoleSink>) -> Self {
        let limits = Limits::for_memory(meter.memory_limit);
        let fuel_used = Arc::new(AtomicU64::new(0));
        let memory_used = Arc::new(AtomicUsize::new(0));

        let mut engine = Engine::new_raw();
        engine.set_max_operations(meter.fuel_budget.max(1));
        engine.set_max_string_size(limits.max_string_bytes);
        engine.set_max_array_size(limits.max_list_items);
        engine.set_max_map_size(limits.max_dict_entries);
        engine.set_max_call_levels(8);
        engine.register_iterator::<Array>();

        {
            let fuel_used = Arc::clone(&fuel_used);
            let interrupt = meter.interrupt.clone();
            let deadline = meter.deadline;
            engine.on_progress(move |ops| {
                fuel_used.store(ops, Ordering::Relaxed);
                if interrupt
                    .as_ref()
                    .is_some_and(|flag| flag.load(Ordering::Relaxed))
                {
                    return Some(Dynamic::UNIT);
                }
                if ops % DEADLINE_POLL_INTERVAL == 0
                    && deadline.is_some_and(|deadline| Instant::now() >= deadline)
                {
                    return Some(Dynamic::UNIT);
                }
                None
            });
        }

        register_operators(&mut engine, limits);
        register_library(&mut engine, limits, console);
        register_storage(&mut engine, limits, meter.memory_limit, Arc::clone(&memory_used));

        Self {
            engine,
            meter,
            fuel_used,
            memory_used,
        }
    }

    /// Runs `script` against the variables already pushed into `scope`.
    /// Top-level variables of the script remain in `scope` afterwards.
    pub fn run(&self, script: &CompiledScript, scope: &mut Scope<'_>) -> Result<(), EvalError> {
        self.engine
            .run_ast_with_scope(scope, script.ast())
            .map_err(|err| self.classify(*err, script))
    }

    pub fn fuel_consumed(&self) -> u64 {
        self.fuel_used.load(Ordering::Relaxed)
    }

    pub fn memory_used(&self) -> usize {
        self.memory_used.load(Ordering::Relaxed)
    }

    fn classify(&self, err: EvalAltResult, script: &CompiledScript) -> EvalError {
        let line = script.source_line(err.position().line());
        let exception = |kind, message: String| EvalError::exception(kind, line, message);
        match err {
            EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => self.classify(*inner, script),
            EvalAltResult::ErrorRuntime(payload, _) => {
                let message = payload.to_string();
                match payload.try_cast::<Raised>() {
                    Some(raised) => exception(raised.kind, raised.message),
                    None => exception(ExceptionKind::ScriptError, message),
                }
            }
            EvalAltResult::ErrorTooManyOperations(..) => {
                self.fuel_used.store(self.meter.fuel_budget, Ordering::Relaxed);
                EvalError::FuelExhausted(self.meter.fuel_budget)
            }
            EvalAltResult::ErrorTerminated(..) => EvalError::Interrupted,
            EvalAltResult::ErrorDataTooLarge(..) | EvalAltResult::ErrorStackOverflow(..) => {
                EvalError::MemoryExceeded {
                    limit: self.meter.memory_limit,
                }
            }
            EvalAltResult::ErrorArrayBounds(..) | EvalAltResult::ErrorStringBounds(..) => {
                exception(ExceptionKind::IndexError, "index out of range".into())
            }
            EvalAltResult::ErrorIndexNotFound(key, _) => {
                exception(ExceptionKind::KeyError, format!("'{key}'"))
            }
            EvalAltResult::ErrorPropertyNotFound(name, _) => {
                exception(ExceptionKind::KeyError, format!("'{name}'"))
            }
            EvalAltResult::ErrorVariableNotFound(name, _) => {
                let name = name.strip_prefix("v_").unwrap_or(&name).to_string();
                exception(
                    ExceptionKind::NameError,
                    format!("name '{name}' is not defined"),
                )
            }
            EvalAltResult::ErrorArithmetic(message, _) => {
                let kind = if message.contains("zero") {
                    ExceptionKind::ZeroDivisionError
                } else {
                    ExceptionKind::OverflowError
                };
                exception(kind, message)
            }
            err @ (EvalAltResult::ErrorMismatchDataType(..)
            | EvalAltResult::ErrorMismatchOutputType(..)
            | EvalAltResult::ErrorFunctionNotFound(..)
            | EvalAltResult::ErrorIndexingType(..)
            | EvalAltResult::ErrorFor(..)) => exception(ExceptionKind::TypeError, err.to_string()),
            other => exception(ExceptionKind::ScriptError, other.to_string()),
        }
    }
}

/// Registers `name` for a receiver plus zero to four further arguments.
fn register_receiver<F>(engine: &mut Engine, name: &str, f: F)
where
    F: Fn(&mut Dynamic, &[&Dynamic]) -> HostResult<Dynamic> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let g = Arc::clone(&f);
    engine.register_fn(name, move |a: &mut Dynamic| g(a, &[]));
    let g = Arc::clone(&f);
    engine.register_fn(name, move |a: &mut Dynamic, b: Dynamic| g(a, &[&b]));
    let g = Arc::clone(&f);
    engine.register_fn(name, move |a: &mut Dynamic, b: Dynamic, c: Dynamic| {
        g(a, &[&b, &c])
    });
    let g = Arc::clone(&f);
    engine.register_fn(
        name,
        move |a: &mut Dynamic, b: Dynamic, c: Dynamic, d: Dynamic| g(a, &[&b, &c, &d]),
    );
    engine.register_fn(
        name,
        move |a: &mut Dynamic, b: Dynamic, c: Dynamic, d: Dynamic, e: Dynamic| {
            f(a, &[&b, &c, &d, &e])
        },
    );
}

/// Registers a library function callable with zero to four arguments.
fn register_function<F>(engine: &mut Engine, name: &str, f: F)
where
    F: Fn(&[&Dynamic]) -> HostResult<Dynamic> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let g = Arc::clone(&f);
    engine.register_fn(name, move || g(&[]));
    register_receiver(engine, name, move |first, rest| {
        let mut args = Vec::with_capacity(rest.len() + 1);
        args.push(&*first);
        args.extend_from_slice(rest);
        f(&args)
    });
}

fn register_operators(engine: &mut Engine, limits: Limits) {
    for op in [
        BinOp::Add,
        BinOp::Sub,
        BinOp::Mul,
        BinOp::Div,
        BinOp::FloorDiv,
        BinOp::Mod,
        BinOp::Pow,
    ] {
        engine.register_fn(binary_host(op), move |a: Dynamic, b: Dynamic| {
            ops::binary(op, &a, &b, &limits)
        });
    }
    for op in [
        CmpOp::Eq,
        CmpOp::NotEq,
        CmpOp::Lt,
        CmpOp::LtE,
        CmpOp::Gt,
        CmpOp::GtE,
        CmpOp::In,
        CmpOp::NotIn,
        CmpOp::Is,
        CmpOp::IsNot,
    ] {
        engine.register_fn(compare_host(op), move |a: Dynamic, b: Dynamic| {
            ops::compare(op, &a, &b)
        });
    }
    for op in [UnaryOp::Neg, UnaryOp::Pos, UnaryOp::Not] {
        engine.register_fn(unary_host(op), move |a: &mut Dynamic| ops::unary(op, a));
    }

    engine.register_fn("rt_truthy", |a: &mut Dynamic| truthy(a));
    engine.register_fn("rt_iter", move |a: &mut Dynamic| iterate(a, &limits));
    engine.register_fn("rt_get_item", |base: &mut Dynamic, index: Dynamic| {
        ops::get_item(base, &index)
    });
    engine.register_fn(
        "rt_set_item",
        move |base: &mut Dynamic, index: Dynamic, value: Dynamic| {
            ops::set_item(base, &index, value, &limits)
        },
    );
    engine.register_fn("rt_slot", |base: &mut Dynamic, index: Dynamic| {
        ops::slot(base, &index)
    });
    engine.register_fn("rt_field", |base: &mut Dynamic, name: ImmutableString| {
        ops::field(base, &name)
    });
    engine.register_fn("rt_field_slot", |base: &mut Dynamic, name: ImmutableString| {
        ops::field_slot(base, &name)
    });
    engine.register_fn(
        "rt_set_attr",
        move |base: &mut Dynamic, name: ImmutableString, value: Dynamic| {
            ops::set_attr(base, &name, value, &limits)
        },
    );
    engine.register_fn("rt_list_of", move |items: Array| ops::list_of(items, &limits));
    engine.register_fn("rt_dict_of", move |flat: Array| ops::dict_of(flat, &limits));
}

fn register_library(engine: &mut Engine, limits: Limits, console: Arc<dyn ConsoleSink>) {
    for builtin in Builtin::ALL {
        if builtin == Builtin::Print {
            continue;
        }
        register_function(engine, &builtin.host_name(), move |args| {
            call_builtin(builtin, args, &limits)
        });
    }
    for f in MathFn::ALL {
        register_function(engine, &f.host_name(), move |args| call_math(f, args));
    }
    for method in Method::ALL {
        register_receiver(engine, &method.host_name(), move |receiver, args| {
            call_method(receiver, method, args, &limits)
        });
    }
    register_function(engine, "rt_decimal", make_decimal);
    engine.register_fn("rt_math_const", |name: ImmutableString| {
        math_constant(&name).unwrap_or(f64::NAN)
    });

    let budget = console
        .max_line_chars()
        .saturating_mul(4)
        .saturating_add(4)
        .min(limits.max_string_bytes);
    engine.register_fn("rt_print", move |args: Array| {
        let mut line = String::new();
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                line.push(' ');
            }
            let (text, complete) = render_prefix(arg, budget.saturating_sub(line.len()));
            line.push_str(&text);
            if !complete {
                break;
            }
        }
        console.write_line(&line);
    });

    engine.register_fn("rt_assert_failed", move |message: Dynamic| -> HostResult<()> {
        let (text, _) = render_prefix(&message, limits.max_string_bytes);
        Err(raise(ExceptionKind::AssertionError, text))
    });
    engine.register_fn("rt_raise", move |message: Dynamic| -> HostResult<()> {
        let (text, _) = render_prefix(&message, limits.max_string_bytes);
        Err(raise(ExceptionKind::ScriptError, text))
    });
}

/// `rt_store` charges a value stored `levels` containers below a variable.
fn register_storage(
    engine: &mut Engine,
    limits: Limits,
    memory_limit: usize,
    memory_used: Arc<AtomicUsize>,
) {
    engine.register_fn("rt_store", move |value: Dynamic, levels: INT| -> HostResult<Dynamic> {
        let levels = usize::try_from(levels).unwrap_or(0);
        if depth(&value).saturating_add(levels) > limits.max_depth {
            return Err(too_large("Nesting depth of containers"));
        }
        let footprint = Footprint::of(&value);
        if let Some(what) = footprint.exceeds(&limits) {
            return Err(too_large(what));
        }
        let bytes = footprint.bytes();
        if bytes > 0 {
            let total = memory_used
                .fetch_add(bytes, Ordering::Relaxed)
                .saturating_add(bytes);
            if total > memory_limit {
                return Err(too_large("Memory"));
            }
        }
        Ok(value)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::compile::{compile, variable};
    use crate::script::lexer::tokenize;
    use crate::script::parser::parse;
    use crate::script::value::render;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Lines {
        lines: Mutex<Vec<String>>,
        max_chars: Option<usize>,
    }

    impl Lines {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.lines.lock().unwrap())
        }
    }

    impl ConsoleSink for Lines {
        fn write_line(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }

        fn max_line_chars(&self) -> usize {
            self.max_chars.unwrap_or(usize::MAX)
        }
    }

    fn compiled(source: &str) -> CompiledScript {
        compile(&parse(tokenize(source).unwrap(), 64).unwrap(), 64).unwrap()
    }

    fn run_meter(source: &str, meter: Meter) -> (Result<(), EvalError>, Scope<'static>, Vec<String>) {
        let console = Arc::new(Lines::default());
        let runner = ScriptRunner::new(meter, console.clone());
        let mut scope = Scope::new();
        let result = runner.run(&compiled(source), &mut scope);
        (result, scope, console.take())
    }

    fn run_with(source: &str, fuel: u64, memory: usize) -> (Result<(), EvalError>, Scope<'static>, Vec<String>) {
        run_meter(source, Meter::new(fuel, memory))
    }

    fn run(source: &str) -> Scope<'static> {
        let (result, scope, _) = run_with(source, 100_000, 1 << 20);
        result.unwrap();
        scope
    }

    fn display(scope: &Scope<'_>, name: &str) -> String {
        let value = scope.get_value::<Dynamic>(&variable(name)).unwrap();
        render(&value, 4096).unwrap()
    }

    #[test]
    fn integer_arithmetic_follows_floor_semantics() {
        let s = run("a = -7 // 2\nb = -7 % 2\nc = 7 / 2\nd = 2 ** 10");
        assert_eq!(display(&s, "a"), "-4");
        assert_eq!(display(&s, "b"), "1");
        assert_eq!(display(&s, "c"), "3.5");
        assert_eq!(display(&s, "d"), "1024");
    }

    #[test]
    fn integer_overflow_raises() {
        let (result, _, _) = run_with("x = 9223372036854775807 + 1", 100, 1024);
        assert!(matches!(
            result,
            Err(EvalError::Exception {
                kind: ExceptionKind::OverflowError,
                ..
            })
        ));
    }

    #[test]
    fn decimal_arithmetic_is_exact_and_rejects_floats() {
        let s = run("x = Decimal('0.1') + Decimal('0.2')\ny = Decimal('1.5') * 2");
        assert_eq!(display(&s, "x"), "0.3");
        assert_eq!(display(&s, "y"), "3.0");

        let (result, _, _) = run_with("z = Decimal('1') + 0.5", 100, 1024);
        assert!(matches!(
            result,
            Err(EvalError::Exception {
                kind: ExceptionKind::TypeError,
                line: 1,
                ..
            })
        ));
    }

    #[test]
    fn control_flow_and_chained_comparison() {
        let source = "\
total = 0
for i in range(10):
    if i % 2 == 0:
        continue
    if i > 7:
        break
    total += i
n = 0
while True:
    n += 1
    if n >= 3: break
ok = 0 < n <= 3 < 4
";
        let s = run(source);
        assert_eq!(display(&s, "total"), "16");
        assert_eq!(display(&s, "n"), "3");
        assert_eq!(display(&s, "ok"), "True");
    }

    #[test]
    fn print_goes_to_console_sink() {
        let (result, _, lines) = run_with("print('ratio', 3.5, [1, 'a'], None)", 100, 4096);
        result.unwrap();
        assert_eq!(lines, vec!["ratio 3.5 [1, 'a'] None".to_string()]);
    }

    #[test]
    fn print_renders_no_more_than_a_console_line() {
        let console = Arc::new(Lines {
            max_chars: Some(20),
            ..Lines::default()
        });
        let runner = ScriptRunner::new(Meter::new(10_000, 64 * 1024), console.clone());
        let mut scope = Scope::new();
        runner
            .run(&compiled("l = [123456789] * 4000\nprint('wide', l)"), &mut scope)
            .unwrap();
        let lines = console.take();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("wide [123456789, "));
        assert!(lines[0].len() <= 20 * 4 + 4);
    }

    #[test]
    fn infinite_loop_exhausts_fuel() {
        let console: Arc<dyn ConsoleSink> = Arc::new(Lines::default());
        let runner = ScriptRunner::new(Meter::new(500, 1024), console);
        let mut scope = Scope::new();
        let result = runner.run(&compiled("while True:\n    pass"), &mut scope);
        assert_eq!(result, Err(EvalError::FuelExhausted(500)));
        assert_eq!(runner.fuel_consumed(), 500);
    }

    #[test]
    fn growing_list_exceeds_memory() {
        let (result, _, _) = run_with("xs = []\nwhile True:\n    xs.append(1)", 1_000_000, 4096);
        assert_eq!(result, Err(EvalError::MemoryExceeded { limit: 4096 }));
    }

    #[test]
    fn stored_values_are_charged_cumulatively() {
        let source = "\
for i in range(100):
    row = [0] * 100
";
        let (result, _, _) = run_with(source, 1_000_000, 64 * 1024);
        assert_eq!(result, Err(EvalError::MemoryExceeded { limit: 64 * 1024 }));
    }

    #[test]
    fn nesting_past_the_depth_ceiling_is_a_memory_error() {
        let source = "\
a = []
for i in range(1000):
    a = [a]
";
        let (result, _, _) = run_with(source, 1_000_000, 1 << 20);
        assert_eq!(result, Err(EvalError::MemoryExceeded { limit: 1 << 20 }));
    }

    #[test]
    fn raised_interrupt_flag_stops_execution() {
        let flag = Arc::new(AtomicBool::new(true));
        let meter = Meter::new(1_000, 1024).with_interrupt(flag);
        let (result, _, _) = run_meter("x = 1", meter);
        assert_eq!(result, Err(EvalError::Interrupted));
    }

    #[test]
    fn past_deadline_stops_execution() {
        let meter = Meter::new(u64::MAX, 1 << 20).with_deadline(Instant::now());
        let (result, _, _) = run_meter("while True:\n    pass", meter);
        assert_eq!(result, Err(EvalError::Interrupted));
    }

    #[test]
    fn containers_are_values_and_mutate_in_place() {
        let source = "\
d = {'confidence_score': 0.5, 'features': {}}
d['features']['momentum'] = 1.5
f = d['features']
f['copy'] = True
d.confidence_score = 0.75
d['features']['momentum'] += 1
got = d.get('missing', 'fallback')
has = 'momentum' in d.features
";
        let s = run(source);
        assert_eq!(
            display(&s, "d"),
            "{'confidence_score': 0.75, 'features': {'momentum': 2.5}}"
        );
        assert_eq!(display(&s, "f"), "{'copy': True, 'momentum': 1.5}");
        assert_eq!(display(&s, "got"), "fallback");
        assert_eq!(display(&s, "has"), "True");
    }

    #[test]
    fn self_append_and_equality_terminate() {
        let source = "\
a = []
b = [a]
a.append(b)
c = []
d = [c]
c.append(d)
same = a == c
";
        let s = run(source);
        assert_eq!(display(&s, "a"), "[[[]]]");
        assert_eq!(display(&s, "same"), "True");
    }

    #[test]
    fn runtime_errors_carry_kind_and_line() {
        let (result, _, _) = run_with("x = 1\ny = {}\nz = y['missing']", 100, 4096);
        assert_eq!(
            result,
            Err(EvalError::Exception {
                kind: ExceptionKind::KeyError,
                message: "'missing'".into(),
                line: 3,
            })
        );

        let (result, _, _) = run_with("raise 'bad ticker'", 100, 4096);
        assert_eq!(
            result,
            Err(EvalError::Exception {
                kind: ExceptionKind::ScriptError,
                message: "bad ticker".into(),
                line: 1,
            })
        );

        let (result, _, _) = run_with("assert 1 > 2, 'nope'", 100, 4096);
        assert!(matches!(
            result,
            Err(EvalError::Exception {
                kind: ExceptionKind::AssertionError,
                ..
            })
        ));
    }

    #[test]
    fn unassigned_names_read_as_none() {
        let s = run("if False:\n    y = 1\nx = y");
        assert_eq!(display(&s, "x"), "None");
    }

    #[test]
    fn short_circuit_and_conditional_expression() {
        let s = run("a = None or 'default'\nb = 0 and 1 / 0\nc = 'hi' if a else 'lo'");
        assert_eq!(display(&s, "a"), "default");
        assert_eq!(display(&s, "b"), "0");
        assert_eq!(display(&s, "c"), "hi");
    }

    #[test]
    fn fuel_consumed_is_reported() {
        let console: Arc<dyn ConsoleSink> = Arc::new(Lines::default());
        let runner = ScriptRunner::new(Meter::new(1_000, 1024), console);
        let mut scope = Scope::new();
        runner.run(&compiled("x = 1 + 2"), &mut scope).unwrap();
        assert!(runner.fuel_consumed() > 0);
        assert!(runner.fuel_consumed() < 20);
    }
}
