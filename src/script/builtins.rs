// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The allow-listed library surface: builtins, the `math` module, the
//! `Decimal` type and value methods.
//!
//! Everything here is a pure function of its arguments and is registered
//! with the engine as a host function. Results that can grow with their
//! inputs are sized against [`Limits`] before they are built.

use rhai::{Array, Dynamic, Map};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::str::FromStr;

use crate::script::error::{raise, too_large, type_error, value_error, ExceptionKind, HostResult};
use crate::script::value::{
    as_number, as_str, list, render, str_value, truthy, type_name, values_cmp, values_equal,
    Limits, Number,
};

pub const BUILTIN_FUNCTIONS: [&str; 13] = [
    "len", "abs", "min", "max", "round", "int", "float", "str", "bool", "list", "dict", "range",
    "print",
];

pub const MATH_MEMBERS: [&str; 16] = [
    "pi", "e", "tau", "inf", "nan", "sqrt", "log", "log10", "exp", "floor", "ceil", "fabs", "pow",
    "isfinite", "isnan", "tanh",
];

pub const VALUE_METHODS: [&str; 7] = [
    "get",
    "keys",
    "values",
    "append",
    "upper",
    "lower",
    "startswith",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Abs,
    Min,
    Max,
    Round,
    Int,
    Float,
    Str,
    Bool,
    List,
    Dict,
    Range,
    Print,
}

impl Builtin {
    pub const ALL: [Builtin; 13] = [
        Builtin::Len,
        Builtin::Abs,
        Builtin::Min,
        Builtin::Max,
        Builtin::Round,
        Builtin::Int,
        Builtin::Float,
        Builtin::Str,
        Builtin::Bool,
        Builtin::List,
        Builtin::Dict,
        Builtin::Range,
        Builtin::Print,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Builtin::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Round => "round",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Str => "str",
            Builtin::Bool => "bool",
            Builtin::List => "list",
            Builtin::Dict => "dict",
            Builtin::Range => "range",
            Builtin::Print => "print",
        }
    }

    /// Name the function is registered under in the engine.
    pub fn host_name(self) -> String {
        format!("rt_{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFn {
    Sqrt,
    Log,
    Log10,
    Exp,
    Floor,
    Ceil,
    Fabs,
    Pow,
    IsFinite,
    IsNan,
    Tanh,
}

impl MathFn {
    pub const ALL: [MathFn; 11] = [
        MathFn::Sqrt,
        MathFn::Log,
        MathFn::Log10,
        MathFn::Exp,
        MathFn::Floor,
        MathFn::Ceil,
        MathFn::Fabs,
        MathFn::Pow,
        MathFn::IsFinite,
        MathFn::IsNan,
        MathFn::Tanh,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        MathFn::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            MathFn::Sqrt => "sqrt",
            MathFn::Log => "log",
            MathFn::Log10 => "log10",
            MathFn::Exp => "exp",
            MathFn::Floor => "floor",
            MathFn::Ceil => "ceil",
            MathFn::Fabs => "fabs",
            MathFn::Pow => "pow",
            MathFn::IsFinite => "isfinite",
            MathFn::IsNan => "isnan",
            MathFn::Tanh => "tanh",
        }
    }

    pub fn host_name(self) -> String {
        format!("rt_math_{}", self.name())
    }
}

/// Constant members of `math`.
pub fn math_constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        "tau" => Some(std::f64::consts::TAU),
        "inf" => Some(f64::INFINITY),
        "nan" => Some(f64::NAN),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Keys,
    Values,
    Append,
    Upper,
    Lower,
    StartsWith,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Keys,
        Method::Values,
        Method::Append,
        Method::Upper,
        Method::Lower,
        Method::StartsWith,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Method::ALL.into_iter().find(|m| m.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Keys => "keys",
            Method::Values => "values",
            Method::Append => "append",
            Method::Upper => "upper",
            Method::Lower => "lower",
            Method::StartsWith => "startswith",
        }
    }

    pub fn host_name(self) -> String {
        format!("rt_{}", self.name())
    }
}

fn expect_arity(name: &str, args: &[&Dynamic], min: usize, max: usize) -> HostResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(type_error(format!(
            "{name}() takes {expected} argument(s) but {} were given",
            args.len()
        )));
    }
    Ok(())
}

fn expect_float(name: &str, value: &Dynamic) -> HostResult<f64> {
    as_number(value)
        .map(Number::to_f64)
        .ok_or_else(|| type_error(format!("{name}() expects a number, got {}", type_name(value))))
}

fn expect_int(name: &str, value: &Dynamic) -> HostResult<i64> {
    if let Ok(i) = value.as_int() {
        return Ok(i);
    }
    if let Ok(b) = value.as_bool() {
        return Ok(i64::from(b));
    }
    Err(type_error(format!(
        "{name}() expects an int, got {}",
        type_name(value)
    )))
}

/// `float -> int` conversion with range checking.
pub fn float_to_int(f: f64) -> HostResult<i64> {
    if !f.is_finite() {
        return Err(raise(
            ExceptionKind::OverflowError,
            format!("cannot convert {f} to int"),
        ));
    }
    let truncated = f.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(raise(
            ExceptionKind::OverflowError,
            "float too large to convert to int",
        ));
    }
    Ok(truncated as i64)
}

/// Items iterated by `for`, `list()`, `min()` and `max()`.
pub fn iterate(value: &Dynamic, limits: &Limits) -> HostResult<Array> {
    if let Some(items) = value.read_lock::<Array>() {
        return Ok(items.clone());
    }
    if let Some(entries) = value.read_lock::<Map>() {
        return Ok(entries.keys().map(|k| str_value(k.as_str())).collect());
    }
    if let Some(s) = as_str(value) {
        if s.chars().count() > limits.max_list_items {
            return Err(too_large("Size of list"));
        }
        return Ok(s.chars().map(|c| str_value(c.to_string())).collect());
    }
    Err(type_error(format!(
        "'{}' object is not iterable",
        type_name(value)
    )))
}

pub fn call_builtin(builtin: Builtin, args: &[&Dynamic], limits: &Limits) -> HostResult<Dynamic> {
    match builtin {
        Builtin::Len => {
            expect_arity("len", args, 1, 1)?;
            let value = args[0];
            let len = if let Some(s) = as_str(value) {
                s.chars().count()
            } else if let Some(items) = value.read_lock::<Array>() {
                items.len()
            } else if let Some(entries) = value.read_lock::<Map>() {
                entries.len()
            } else {
                return Err(type_error(format!(
                    "object of type '{}' has no len()",
                    type_name(value)
                )));
            };
            Ok(Dynamic::from_int(len as i64))
        }
        Builtin::Abs => {
            expect_arity("abs", args, 1, 1)?;
            match as_number(args[0]) {
                Some(Number::Int(i)) => i.checked_abs().map(Dynamic::from_int).ok_or_else(|| {
                    raise(ExceptionKind::OverflowError, "integer overflow in abs()")
                }),
                Some(Number::Float(f)) => Ok(Dynamic::from_float(f.abs())),
                Some(Number::Decimal(d)) => Ok(Dynamic::from(d.abs())),
                None => Err(type_error(format!(
                    "bad operand type for abs(): '{}'",
                    type_name(args[0])
                ))),
            }
        }
        Builtin::Min => extremum("min", args, Ordering::Less, limits),
        Builtin::Max => extremum("max", args, Ordering::Greater, limits),
        Builtin::Round => round(args),
        Builtin::Int => {
            expect_arity("int", args, 0, 1)?;
            let Some(value) = args.first() else {
                return Ok(Dynamic::from_int(0));
            };
            if let Some(s) = as_str(value) {
                return s
                    .trim()
                    .parse::<i64>()
                    .map(Dynamic::from_int)
                    .map_err(|_| value_error(format!("invalid literal for int(): '{s}'")));
            }
            match as_number(value) {
                Some(Number::Int(i)) => Ok(Dynamic::from_int(i)),
                Some(Number::Float(f)) => float_to_int(f).map(Dynamic::from_int),
                Some(Number::Decimal(d)) => {
                    d.trunc().to_i64().map(Dynamic::from_int).ok_or_else(|| {
                        raise(
                            ExceptionKind::OverflowError,
                            "Decimal too large to convert to int",
                        )
                    })
                }
                None => Err(type_error(format!(
                    "int() argument must be a string or a number, not '{}'",
                    type_name(value)
                ))),
            }
        }
        Builtin::Float => {
            expect_arity("float", args, 0, 1)?;
            let Some(value) = args.first() else {
                return Ok(Dynamic::from_float(0.0));
            };
            if let Some(s) = as_str(value) {
                return s
                    .trim()
                    .parse::<f64>()
                    .map(Dynamic::from_float)
                    .map_err(|_| value_error(format!("could not convert string to float: '{s}'")));
            }
            as_number(value)
                .map(|n| Dynamic::from_float(n.to_f64()))
                .ok_or_else(|| {
                    type_error(format!(
                        "float() argument must be a string or a number, not '{}'",
                        type_name(value)
                    ))
                })
        }
        Builtin::Str => {
            expect_arity("str", args, 0, 1)?;
            let Some(value) = args.first() else {
                return Ok(str_value(""));
            };
            render(value, limits.max_string_bytes)
                .map(str_value)
                .map_err(|_| too_large("Length of string"))
        }
        Builtin::Bool => {
            expect_arity("bool", args, 0, 1)?;
            Ok(Dynamic::from_bool(args.first().is_some_and(|v| truthy(v))))
        }
        Builtin::List => {
            expect_arity("list", args, 0, 1)?;
            match args.first() {
                None => Ok(list(Array::new())),
                Some(v) => iterate(v, limits).map(list),
            }
        }
        Builtin::Dict => {
            expect_arity("dict", args, 0, 1)?;
            let Some(value) = args.first() else {
                return Ok(Dynamic::from_map(Map::new()));
            };
            match value.read_lock::<Map>() {
                Some(entries) => Ok(Dynamic::from_map(entries.clone())),
                None => Err(type_error(format!(
                    "dict() argument must be a dict, not '{}'",
                    type_name(value)
                ))),
            }
        }
        Builtin::Range => range(args, limits),
        // Needs the console; registered by the engine.
        Builtin::Print => Err(type_error("print() is not callable here")),
    }
}

fn extremum(
    name: &str,
    args: &[&Dynamic],
    wanted: Ordering,
    limits: &Limits,
) -> HostResult<Dynamic> {
    let candidates: Array = match args.len() {
        0 => {
            return Err(type_error(format!(
                "{name} expected at least 1 argument, got 0"
            )))
        }
        1 => iterate(args[0], limits)?,
        _ => args.iter().map(|a| (*a).clone()).collect(),
    };
    let mut iter = candidates.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| value_error(format!("{name}() arg is an empty sequence")))?;
    for candidate in iter {
        let ordering = values_cmp(&candidate, &best).ok_or_else(|| {
            type_error(format!(
                "'{}' not supported between '{}' and '{}'",
                if wanted == Ordering::Less { "<" } else { ">" },
                type_name(&candidate),
                type_name(&best)
            ))
        })?;
        if ordering == wanted {
            best = candidate;
        }
    }
    Ok(best)
}

fn round(args: &[&Dynamic]) -> HostResult<Dynamic> {
    expect_arity("round", args, 1, 2)?;
    let digits = match args.get(1) {
        Some(v) if !v.is_unit() => Some(expect_int("round", v)?),
        _ => None,
    };
    match (as_number(args[0]), digits) {
        (Some(Number::Int(i)), _) => Ok(Dynamic::from_int(i)),
        (Some(Number::Float(f)), None) => float_to_int(f.round_ties_even()).map(Dynamic::from_int),
        (Some(Number::Float(f)), Some(n)) => {
            let n = n.clamp(-308, 308) as i32;
            let scale = 10f64.powi(n);
            let scaled = f * scale;
            if !scaled.is_finite() {
                return Ok(Dynamic::from_float(f));
            }
            Ok(Dynamic::from_float(scaled.round_ties_even() / scale))
        }
        (Some(Number::Decimal(d)), None) => d.round().to_i64().map(Dynamic::from_int).ok_or_else(|| {
            raise(ExceptionKind::OverflowError, "Decimal too large to round")
        }),
        (Some(Number::Decimal(d)), Some(n)) => {
            Ok(Dynamic::from(d.round_dp(n.clamp(0, 28) as u32)))
        }
        (None, _) => Err(type_error(format!(
            "type {} doesn't define __round__",
            type_name(args[0])
        ))),
    }
}

fn range(args: &[&Dynamic], limits: &Limits) -> HostResult<Dynamic> {
    expect_arity("range", args, 1, 3)?;
    let ints = args
        .iter()
        .map(|a| expect_int("range", a))
        .collect::<HostResult<Vec<_>>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step, ..] => (*start, *stop, *step),
        [] => (0, 0, 1),
    };
    if step == 0 {
        return Err(value_error("range() arg 3 must not be zero"));
    }
    let span = if step > 0 {
        (stop as i128 - start as i128).max(0)
    } else {
        (start as i128 - stop as i128).max(0)
    };
    let step_abs = (step as i128).abs();
    let count = (span + step_abs - 1) / step_abs;

    // Sized before materialising so huge ranges fail without allocating.
    if count > limits.max_list_items as i128 {
        return Err(too_large("Size of list"));
    }
    let items = (0..count)
        .map(|i| Dynamic::from_int((start as i128 + i * step as i128) as i64))
        .collect();
    Ok(list(items))
}

pub fn call_math(f: MathFn, args: &[&Dynamic]) -> HostResult<Dynamic> {
    let domain = || value_error("math domain error");
    match f {
        MathFn::Pow => {
            expect_arity("pow", args, 2, 2)?;
            let base = expect_float("pow", args[0])?;
            let exponent = expect_float("pow", args[1])?;
            Ok(Dynamic::from_float(base.powf(exponent)))
        }
        MathFn::Log if args.len() == 2 => {
            let x = expect_float("log", args[0])?;
            let base = expect_float("log", args[1])?;
            if x <= 0.0 || base <= 0.0 || base == 1.0 {
                return Err(domain());
            }
            Ok(Dynamic::from_float(x.ln() / base.ln()))
        }
        _ => {
            expect_arity(f.name(), args, 1, 1)?;
            let x = expect_float(f.name(), args[0])?;
            let value = match f {
                MathFn::Sqrt if x < 0.0 => return Err(domain()),
                MathFn::Sqrt => Dynamic::from_float(x.sqrt()),
                MathFn::Log | MathFn::Log10 if x <= 0.0 => return Err(domain()),
                MathFn::Log => Dynamic::from_float(x.ln()),
                MathFn::Log10 => Dynamic::from_float(x.log10()),
                MathFn::Exp => Dynamic::from_float(x.exp()),
                MathFn::Floor => Dynamic::from_int(float_to_int(x.floor())?),
                MathFn::Ceil => Dynamic::from_int(float_to_int(x.ceil())?),
                MathFn::Fabs => Dynamic::from_float(x.abs()),
                MathFn::IsFinite => Dynamic::from_bool(x.is_finite()),
                MathFn::IsNan => Dynamic::from_bool(x.is_nan()),
                MathFn::Tanh => Dynamic::from_float(x.tanh()),
                MathFn::Pow => Dynamic::from_float(x),
            };
            Ok(value)
        }
    }
}

pub fn make_decimal(args: &[&Dynamic]) -> HostResult<Dynamic> {
    expect_arity("Decimal", args, 0, 1)?;
    let Some(value) = args.first() else {
        return Ok(Dynamic::from(Decimal::ZERO));
    };
    if let Some(s) = as_str(value) {
        return Decimal::from_str(s.trim())
            .map(Dynamic::from)
            .map_err(|_| value_error(format!("invalid Decimal literal: '{s}'")));
    }
    let decimal = match as_number(value) {
        Some(Number::Decimal(d)) => d,
        Some(Number::Int(i)) => Decimal::from(i),
        Some(Number::Float(f)) => Decimal::try_from(f)
            .map_err(|_| value_error(format!("cannot convert {f} to Decimal")))?,
        None => {
            return Err(type_error(format!(
                "cannot convert '{}' to Decimal",
                type_name(value)
            )))
        }
    };
    Ok(Dynamic::from(decimal))
}

pub fn call_method(
    receiver: &mut Dynamic,
    method: Method,
    args: &[&Dynamic],
    limits: &Limits,
) -> HostResult<Dynamic> {
    let unsupported = |receiver: &Dynamic| {
        type_error(format!(
            "'{}' object has no attribute '{}'",
            type_name(receiver),
            method.name()
        ))
    };
    match method {
        Method::Get => {
            expect_arity("get", args, 1, 2)?;
            let entries = receiver.read_lock::<Map>().ok_or_else(|| unsupported(receiver))?;
            let found = as_str(args[0]).and_then(|key| entries.get(key.as_str()).cloned());
            Ok(found.unwrap_or_else(|| args.get(1).map_or(Dynamic::UNIT, |d| (*d).clone())))
        }
        Method::Keys | Method::Values => {
            expect_arity(method.name(), args, 0, 0)?;
            let entries = receiver.read_lock::<Map>().ok_or_else(|| unsupported(receiver))?;
            let items: Array = if method == Method::Keys {
                entries.keys().map(|k| str_value(k.as_str())).collect()
            } else {
                entries.values().cloned().collect()
            };
            Ok(list(items))
        }
        Method::Append => {
            expect_arity("append", args, 1, 1)?;
            let err = unsupported(receiver);
            let mut items = receiver.write_lock::<Array>().ok_or(err)?;
            if items.len() >= limits.max_list_items {
                return Err(too_large("Size of list"));
            }
            items.push(args[0].clone());
            Ok(Dynamic::UNIT)
        }
        Method::Upper | Method::Lower => {
            expect_arity(method.name(), args, 0, 0)?;
            let s = as_str(receiver).ok_or_else(|| unsupported(receiver))?;
            Ok(str_value(if method == Method::Upper {
                s.to_uppercase()
            } else {
                s.to_lowercase()
            }))
        }
        Method::StartsWith => {
            expect_arity("startswith", args, 1, 1)?;
            let s = as_str(receiver).ok_or_else(|| unsupported(receiver))?;
            match as_str(args[0]) {
                Some(prefix) => Ok(Dynamic::from_bool(s.starts_with(prefix.as_str()))),
                None => Err(type_error(format!(
                    "startswith arg must be str, not {}",
                    type_name(args[0])
                ))),
            }
        }
    }
}

/// Membership test for `in` / `not in`.
pub fn contains(container: &Dynamic, item: &Dynamic) -> HostResult<bool> {
    if let Some(haystack) = as_str(container) {
        return match as_str(item) {
            Some(needle) => Ok(haystack.contains(needle.as_str())),
            None => Err(type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                type_name(item)
            ))),
        };
    }
    if let Some(items) = container.read_lock::<Array>() {
        return Ok(items.iter().any(|v| values_equal(v, item)));
    }
    if let Some(entries) = container.read_lock::<Map>() {
        return Ok(as_str(item).is_some_and(|key| entries.contains_key(key.as_str())));
    }
    Err(type_error(format!(
        "argument of type '{}' is not iterable",
        type_name(container)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::error::Raised;
    use rhai::EvalAltResult;

    fn limits() -> Limits {
        Limits::for_memory(64 * 1024)
    }

    fn int(i: i64) -> Dynamic {
        Dynamic::from_int(i)
    }

    fn float(f: f64) -> Dynamic {
        Dynamic::from_float(f)
    }

    fn kind_of(err: &EvalAltResult) -> Option<ExceptionKind> {
        match err {
            EvalAltResult::ErrorRuntime(payload, _) => {
                payload.clone().try_cast::<Raised>().map(|r| r.kind)
            }
            _ => None,
        }
    }

    fn shown(value: &Dynamic) -> String {
        render(value, 4096).unwrap()
    }

    #[test]
    fn round_uses_ties_to_even() {
        let half = call_builtin(Builtin::Round, &[&float(2.5)], &limits()).unwrap();
        assert!(values_equal(&half, &int(2)));
        let two_dp = call_builtin(Builtin::Round, &[&float(0.123456), &int(2)], &limits()).unwrap();
        assert!(values_equal(&two_dp, &float(0.12)));
    }

    #[test]
    fn min_and_max_accept_iterables_or_varargs() {
        let items = list(vec![int(3), float(1.5), int(2)]);
        let min = call_builtin(Builtin::Min, &[&items], &limits()).unwrap();
        assert!(values_equal(&min, &float(1.5)));
        let max = call_builtin(Builtin::Max, &[&int(1), &int(9)], &limits()).unwrap();
        assert!(values_equal(&max, &int(9)));
        let err = call_builtin(Builtin::Max, &[&list(Array::new())], &limits()).unwrap_err();
        assert_eq!(kind_of(&err), Some(ExceptionKind::ValueError));
    }

    #[test]
    fn range_is_sized_before_allocation() {
        let err = call_builtin(Builtin::Range, &[&int(1_000_000_000)], &limits()).unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorDataTooLarge(..)));

        let r = call_builtin(Builtin::Range, &[&int(10), &int(0), &int(-3)], &limits()).unwrap();
        assert_eq!(shown(&r), "[10, 7, 4, 1]");
    }

    #[test]
    fn str_of_oversized_value_fails_without_building_it() {
        let tight = Limits::for_memory(1024);
        let wide = list(vec![int(123_456_789); 60]);
        let err = call_builtin(Builtin::Str, &[&wide], &tight).unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorDataTooLarge(..)));
    }

    #[test]
    fn math_domain_errors_are_value_errors() {
        let err = call_math(MathFn::Sqrt, &[&int(-1)]).unwrap_err();
        assert_eq!(kind_of(&err), Some(ExceptionKind::ValueError));
        let floor = call_math(MathFn::Floor, &[&float(-1.5)]).unwrap();
        assert!(values_equal(&floor, &int(-2)));
        let log2 = call_math(MathFn::Log, &[&int(8), &int(2)]).unwrap();
        assert!((log2.as_float().unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn decimal_constructor_parses_strings_exactly() {
        let d = make_decimal(&[&str_value("0.10")]).unwrap();
        assert_eq!(shown(&d), "0.10");
        assert!(make_decimal(&[&str_value("abc")]).is_err());
    }

    #[test]
    fn dict_methods_and_membership() {
        let mut entries = Map::new();
        entries.insert("b".into(), int(2));
        entries.insert("a".into(), int(1));
        let mut dict = Dynamic::from_map(entries);

        let keys = call_method(&mut dict, Method::Keys, &[], &limits()).unwrap();
        assert_eq!(shown(&keys), "['a', 'b']");
        let missing =
            call_method(&mut dict, Method::Get, &[&str_value("z"), &int(0)], &limits()).unwrap();
        assert!(values_equal(&missing, &int(0)));
        assert!(contains(&dict, &str_value("a")).unwrap());
        assert!(!contains(&dict, &int(1)).unwrap());

        let err = call_method(&mut dict, Method::Append, &[&int(1)], &limits()).unwrap_err();
        assert_eq!(kind_of(&err), Some(ExceptionKind::TypeError));
    }

    #[test]
    fn append_grows_the_receiver_up_to_the_list_ceiling() {
        let tight = Limits::for_memory(32);
        let mut items = list(vec![int(1)]);
        call_method(&mut items, Method::Append, &[&int(2)], &tight).unwrap();
        assert_eq!(shown(&items), "[1, 2]");
        let err = call_method(&mut items, Method::Append, &[&int(3)], &tight).unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorDataTooLarge(..)));
    }

    #[test]
    fn builtin_names_round_trip() {
        for builtin in Builtin::ALL {
            assert_eq!(Builtin::from_name(builtin.name()), Some(builtin));
            assert!(BUILTIN_FUNCTIONS.contains(&builtin.name()));
        }
        for method in Method::ALL {
            assert!(VALUE_METHODS.contains(&method.name()));
        }
        assert_eq!(MathFn::from_name("tanh"), Some(MathFn::Tanh));
        assert_eq!(math_constant("tau"), Some(std::f64::consts::TAU));
    }
}
