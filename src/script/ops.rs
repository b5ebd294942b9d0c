// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Operator semantics for script values.
//!
//! Lowered scripts never use the engine's native operators; every
//! arithmetic, comparison, subscript and container-building step calls one
//! of these functions so numeric rules and size checks stay on the host.

use rhai::{Array, Dynamic, Map};
use rust_decimal::Decimal;
use std::cmp::Ordering;

use crate::script::ast::{BinOp, CmpOp, UnaryOp};
use crate::script::builtins::contains;
use crate::script::error::{raise, too_large, type_error, value_error, ExceptionKind, HostResult};
use crate::script::value::{
    as_number, as_str, depth, list, numbers_cmp, render, str_value, truthy, type_name,
    values_cmp, values_equal, values_identical, Footprint, Limits, Number,
};
use crate::signal::RECORD_FIELDS;

fn zero_division(message: &str) -> Box<rhai::EvalAltResult> {
    raise(ExceptionKind::ZeroDivisionError, message)
}

fn overflow(message: &str) -> Box<rhai::EvalAltResult> {
    raise(ExceptionKind::OverflowError, message)
}

fn check(footprint: Footprint, limits: &Limits) -> HostResult<()> {
    match footprint.exceeds(limits) {
        Some(what) => Err(too_large(what)),
        None => Ok(()),
    }
}

fn repeat_count(value: &Dynamic) -> Option<usize> {
    let n = value
        .as_int()
        .ok()
        .or_else(|| value.as_bool().ok().map(i64::from))?;
    Some(usize::try_from(n).unwrap_or(0))
}

pub fn binary(op: BinOp, l: &Dynamic, r: &Dynamic, limits: &Limits) -> HostResult<Dynamic> {
    if op == BinOp::Add {
        if let (Some(a), Some(b)) = (as_str(l), as_str(r)) {
            if a.len().saturating_add(b.len()) > limits.max_string_bytes {
                return Err(too_large("Length of string"));
            }
            return Ok(str_value(format!("{a}{b}")));
        }
        if let (Some(a), Some(b)) = (l.read_lock::<Array>(), r.read_lock::<Array>()) {
            let total = Footprint::of(l).plus(Footprint::of(r));
            check(total, limits)?;
            let mut items = a.clone();
            items.extend(b.iter().cloned());
            return Ok(list(items));
        }
    }
    if op == BinOp::Mul {
        let repeated = match (repeat_count(l), repeat_count(r)) {
            (None, Some(n)) => Some((l, n)),
            (Some(n), None) => Some((r, n)),
            _ => None,
        };
        if let Some((seq, count)) = repeated {
            if let Some(s) = as_str(seq) {
                if s.len().saturating_mul(count) > limits.max_string_bytes {
                    return Err(too_large("Length of string"));
                }
                return Ok(str_value(s.repeat(count)));
            }
            if let Some(items) = seq.read_lock::<Array>() {
                // Sized before repeating so nested repetition cannot outrun
                // the ceiling.
                check(Footprint::of(seq).times(count), limits)?;
                let repeated: Array = (0..count).flat_map(|_| items.iter().cloned()).collect();
                return Ok(list(repeated));
            }
        }
    }
    match (as_number(l), as_number(r)) {
        (Some(a), Some(b)) => numeric(op, a, b),
        _ => Err(type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            type_name(l),
            type_name(r)
        ))),
    }
}

pub fn unary(op: UnaryOp, value: &Dynamic) -> HostResult<Dynamic> {
    if op == UnaryOp::Not {
        return Ok(Dynamic::from_bool(!truthy(value)));
    }
    match (op, as_number(value)) {
        (UnaryOp::Pos, Some(n)) => Ok(n.into_dynamic()),
        (_, Some(Number::Int(i))) => i
            .checked_neg()
            .map(Dynamic::from_int)
            .ok_or_else(|| overflow("integer overflow")),
        (_, Some(Number::Float(f))) => Ok(Dynamic::from_float(-f)),
        (_, Some(Number::Decimal(d))) => Ok(Dynamic::from(-d)),
        (_, None) => Err(type_error(format!(
            "bad operand type for unary operator: '{}'",
            type_name(value)
        ))),
    }
}

fn numeric(op: BinOp, a: Number, b: Number) -> HostResult<Dynamic> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => int_op(op, x, y),
        (Number::Decimal(_), Number::Float(_)) | (Number::Float(_), Number::Decimal(_)) => {
            Err(type_error(format!(
                "unsupported operand type(s) for {}: mixing 'Decimal' and 'float'",
                op.symbol()
            )))
        }
        (Number::Decimal(x), Number::Decimal(y)) => decimal_op(op, x, y, false),
        (Number::Decimal(x), Number::Int(y)) => decimal_op(op, x, Decimal::from(y), true),
        (Number::Int(x), Number::Decimal(y)) => decimal_op(op, Decimal::from(x), y, false),
        (x, y) => float_op(op, x.to_f64(), y.to_f64()),
    }
}

fn int_op(op: BinOp, a: i64, b: i64) -> HostResult<Dynamic> {
    let overflowed = || overflow("integer overflow");
    let value = match op {
        BinOp::Add => a.checked_add(b).ok_or_else(overflowed)?,
        BinOp::Sub => a.checked_sub(b).ok_or_else(overflowed)?,
        BinOp::Mul => a.checked_mul(b).ok_or_else(overflowed)?,
        BinOp::Div => {
            if b == 0 {
                return Err(zero_division("division by zero"));
            }
            return Ok(Dynamic::from_float(a as f64 / b as f64));
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            let q = a.checked_div(b).ok_or_else(overflowed)?;
            let adjust = a % b != 0 && ((a < 0) != (b < 0));
            if adjust {
                q - 1
            } else {
                q
            }
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            let r = a.checked_rem(b).ok_or_else(overflowed)?;
            if r != 0 && ((r < 0) != (b < 0)) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => {
            if b < 0 {
                return float_op(op, a as f64, b as f64);
            }
            let exp = u32::try_from(b).map_err(|_| overflowed())?;
            a.checked_pow(exp).ok_or_else(overflowed)?
        }
    };
    Ok(Dynamic::from_int(value))
}

fn float_op(op: BinOp, a: f64, b: f64) -> HostResult<Dynamic> {
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(zero_division("float division by zero"));
            }
            a / b
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(zero_division("float modulo"));
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(zero_division("0.0 cannot be raised to a negative power"));
            }
            if a < 0.0 && b.fract() != 0.0 {
                return Err(value_error(
                    "negative number cannot be raised to a fractional power",
                ));
            }
            let result = a.powf(b);
            if result.is_infinite() && a.is_finite() && b.is_finite() {
                return Err(overflow("numerical result out of range"));
            }
            result
        }
    };
    Ok(Dynamic::from_float(value))
}

fn decimal_op(op: BinOp, a: Decimal, b: Decimal, integral_exponent: bool) -> HostResult<Dynamic> {
    let overflowed = || overflow("Decimal overflow");
    let value = match op {
        BinOp::Add => a.checked_add(b).ok_or_else(overflowed)?,
        BinOp::Sub => a.checked_sub(b).ok_or_else(overflowed)?,
        BinOp::Mul => a.checked_mul(b).ok_or_else(overflowed)?,
        BinOp::Div | BinOp::FloorDiv | BinOp::Mod if b.is_zero() => {
            return Err(zero_division("decimal division by zero"));
        }
        BinOp::Div => a.checked_div(b).ok_or_else(overflowed)?,
        BinOp::FloorDiv => a.checked_div(b).ok_or_else(overflowed)?.trunc(),
        BinOp::Mod => a.checked_rem(b).ok_or_else(overflowed)?,
        BinOp::Pow => {
            if !integral_exponent {
                return Err(type_error("Decimal exponent must be an int"));
            }
            decimal_powi(a, b)?
        }
    };
    Ok(Dynamic::from(value))
}

fn decimal_powi(base: Decimal, exponent: Decimal) -> HostResult<Decimal> {
    let overflowed = || overflow("Decimal overflow");
    let exp: i64 = exponent.trunc().try_into().map_err(|_| overflowed())?;
    if exp.unsigned_abs() > 1_000 {
        return Err(overflowed());
    }
    let mut result = Decimal::ONE;
    for _ in 0..exp.unsigned_abs() {
        result = result.checked_mul(base).ok_or_else(overflowed)?;
    }
    if exp < 0 {
        if result.is_zero() {
            return Err(zero_division("decimal division by zero"));
        }
        result = Decimal::ONE.checked_div(result).ok_or_else(overflowed)?;
    }
    Ok(result)
}

pub fn compare(op: CmpOp, left: &Dynamic, right: &Dynamic) -> HostResult<bool> {
    let ordered = |wanted: fn(Ordering) -> bool| -> HostResult<bool> {
        if let (Some(a), Some(b)) = (as_number(left), as_number(right)) {
            // NaN compares false rather than raising.
            return Ok(numbers_cmp(a, b).is_some_and(wanted));
        }
        values_cmp(left, right).map(wanted).ok_or_else(|| {
            type_error(format!(
                "comparison not supported between '{}' and '{}'",
                type_name(left),
                type_name(right)
            ))
        })
    };
    match op {
        CmpOp::Eq => Ok(values_equal(left, right)),
        CmpOp::NotEq => Ok(!values_equal(left, right)),
        CmpOp::Lt => ordered(Ordering::is_lt),
        CmpOp::LtE => ordered(Ordering::is_le),
        CmpOp::Gt => ordered(Ordering::is_gt),
        CmpOp::GtE => ordered(Ordering::is_ge),
        CmpOp::In => contains(right, left),
        CmpOp::NotIn => contains(right, left).map(|found| !found),
        CmpOp::Is => Ok(values_identical(left, right)),
        CmpOp::IsNot => Ok(!values_identical(left, right)),
    }
}

fn list_index(index: &Dynamic, len: usize) -> HostResult<usize> {
    let i = match index.as_int() {
        Ok(i) => i,
        Err(_) => match index.as_bool() {
            Ok(b) => i64::from(b),
            Err(_) => {
                return Err(type_error(format!(
                    "indices must be integers, not {}",
                    type_name(index)
                )))
            }
        },
    };
    let len = len as i64;
    let resolved = if i < 0 { i + len } else { i };
    if resolved < 0 || resolved >= len {
        return Err(raise(ExceptionKind::IndexError, "index out of range"));
    }
    Ok(resolved as usize)
}

fn key_error(key: &Dynamic) -> Box<rhai::EvalAltResult> {
    let shown = match as_str(key) {
        Some(s) => format!("'{s}'"),
        None => render(key, 256).unwrap_or_else(|_| type_name(key).to_string()),
    };
    raise(ExceptionKind::KeyError, shown)
}

/// `base[index]`.
pub fn get_item(base: &Dynamic, index: &Dynamic) -> HostResult<Dynamic> {
    if let Some(items) = base.read_lock::<Array>() {
        let i = list_index(index, items.len())?;
        return Ok(items[i].clone());
    }
    if let Some(entries) = base.read_lock::<Map>() {
        let key = as_str(index).ok_or_else(|| key_error(index))?;
        return entries
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| key_error(index));
    }
    if let Some(s) = as_str(base) {
        let chars: Vec<char> = s.chars().collect();
        let i = list_index(index, chars.len())?;
        return Ok(str_value(chars[i].to_string()));
    }
    Err(type_error(format!(
        "'{}' object is not subscriptable",
        type_name(base)
    )))
}

/// `base[index] = value`.
pub fn set_item(
    base: &mut Dynamic,
    index: &Dynamic,
    value: Dynamic,
    limits: &Limits,
) -> HostResult<()> {
    if let Some(mut items) = base.write_lock::<Array>() {
        let len = items.len();
        let i = list_index(index, len).map_err(|_| {
            raise(ExceptionKind::IndexError, "list assignment index out of range")
        })?;
        items[i] = value;
        return Ok(());
    }
    if base.is_map() {
        let key = as_str(index).ok_or_else(|| {
            type_error(format!("dict keys must be str, not {}", type_name(index)))
        })?;
        return insert_key(base, key.as_str(), value, limits);
    }
    Err(type_error(format!(
        "'{}' object does not support item assignment",
        type_name(base)
    )))
}

/// Checked subscript of a container about to be mutated in place.
///
/// Returns the index the engine should follow: a non-negative position
/// for lists, the existing key for dicts.
pub fn slot(base: &Dynamic, index: &Dynamic) -> HostResult<Dynamic> {
    if let Some(items) = base.read_lock::<Array>() {
        let i = list_index(index, items.len())?;
        return Ok(Dynamic::from_int(i as i64));
    }
    if let Some(entries) = base.read_lock::<Map>() {
        let key = as_str(index).ok_or_else(|| key_error(index))?;
        if !entries.contains_key(key.as_str()) {
            return Err(key_error(index));
        }
        return Ok(str_value(key));
    }
    Err(type_error(format!(
        "'{}' object does not support item assignment",
        type_name(base)
    )))
}

/// Like [`slot`] for a record field reached through attribute syntax.
pub fn field_slot(base: &Dynamic, name: &str) -> HostResult<Dynamic> {
    field(base, name)?;
    Ok(str_value(name))
}

fn insert_key(base: &mut Dynamic, key: &str, value: Dynamic, limits: &Limits) -> HostResult<()> {
    let mut entries = base
        .write_lock::<Map>()
        .ok_or_else(|| type_error("dict expected"))?;
    if !entries.contains_key(key) && entries.len() >= limits.max_dict_entries {
        return Err(too_large("Size of dict"));
    }
    entries.insert(key.into(), value);
    Ok(())
}

/// `base.name` for anything other than the `math` module.
///
/// Record fields read as attributes of a dict; every other attribute is a
/// method and is only valid in call position.
pub fn field(base: &Dynamic, name: &str) -> HostResult<Dynamic> {
    if let Some(entries) = base.read_lock::<Map>() {
        if RECORD_FIELDS.contains(&name) {
            return entries
                .get(name)
                .cloned()
                .ok_or_else(|| raise(ExceptionKind::KeyError, format!("'{name}'")));
        }
    }
    Err(type_error(format!(
        "'{}' object has no attribute '{name}'",
        type_name(base)
    )))
}

/// `base.name = value`.
pub fn set_attr(base: &mut Dynamic, name: &str, value: Dynamic, limits: &Limits) -> HostResult<()> {
    if base.is_map() {
        return insert_key(base, name, value, limits);
    }
    Err(type_error(format!(
        "cannot set attribute '{name}' on '{}'",
        type_name(base)
    )))
}

fn check_depth(value: &Dynamic, limits: &Limits) -> HostResult<()> {
    if depth(value) > limits.max_depth {
        return Err(too_large("Nesting depth of containers"));
    }
    Ok(())
}

/// A list display, `[a, b, ...]`.
pub fn list_of(items: Array, limits: &Limits) -> HostResult<Dynamic> {
    let value = list(items);
    check_depth(&value, limits)?;
    check(Footprint::of(&value), limits)?;
    Ok(value)
}

/// A dict display, given as a flat `[key, value, key, value, ...]` array.
pub fn dict_of(flat: Array, limits: &Limits) -> HostResult<Dynamic> {
    let mut entries = Map::new();
    let mut iter = flat.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        let key = as_str(&key).ok_or_else(|| {
            type_error(format!("dict keys must be str, not {}", type_name(&key)))
        })?;
        entries.insert(key.as_str().into(), value);
    }
    let value = Dynamic::from_map(entries);
    check_depth(&value, limits)?;
    check(Footprint::of(&value), limits)?;
    Ok(value)
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

    fn kind_of(err: &EvalAltResult) -> Option<ExceptionKind> {
        match err {
            EvalAltResult::ErrorRuntime(payload, _) => {
                payload.clone().try_cast::<Raised>().map(|r| r.kind)
            }
            _ => None,
        }
    }

    #[test]
    fn floor_division_and_modulo_follow_the_divisor_sign() {
        let q = binary(BinOp::FloorDiv, &int(-7), &int(2), &limits()).unwrap();
        assert_eq!(q.as_int().unwrap(), -4);
        let r = binary(BinOp::Mod, &int(-7), &int(2), &limits()).unwrap();
        assert_eq!(r.as_int().unwrap(), 1);
        let err = binary(BinOp::Mod, &int(1), &int(0), &limits()).unwrap_err();
        assert_eq!(kind_of(&err), Some(ExceptionKind::ZeroDivisionError));
    }

    #[test]
    fn repetition_is_sized_before_it_runs() {
        let tight = Limits::for_memory(16 * 1000);
        let row = list(vec![int(0); 100]);
        let grid = binary(BinOp::Mul, &row, &int(9), &tight).unwrap();
        assert_eq!(grid.read_lock::<Array>().unwrap().len(), 900);

        let nested = list(vec![row; 5]);
        let err = binary(BinOp::Mul, &nested, &int(2), &tight).unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorDataTooLarge(..)));

        let err = binary(BinOp::Mul, &int(100_000), &str_value("ab"), &tight).unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorDataTooLarge(..)));
        let empty = binary(BinOp::Mul, &str_value("ab"), &int(-3), &tight).unwrap();
        assert_eq!(as_str(&empty).unwrap().as_str(), "");
    }

    #[test]
    fn subscripts_resolve_negative_indices_and_report_missing_keys() {
        let items = list(vec![int(1), int(2), int(3)]);
        assert_eq!(get_item(&items, &int(-1)).unwrap().as_int().unwrap(), 3);
        let err = get_item(&items, &int(3)).unwrap_err();
        assert_eq!(kind_of(&err), Some(ExceptionKind::IndexError));

        let mut dict = Dynamic::from_map(Map::new());
        set_item(&mut dict, &str_value("k"), int(1), &limits()).unwrap();
        assert_eq!(get_item(&dict, &str_value("k")).unwrap().as_int().unwrap(), 1);
        let err = get_item(&dict, &str_value("missing")).unwrap_err();
        assert_eq!(kind_of(&err), Some(ExceptionKind::KeyError));

        let err = get_item(&int(5), &int(0)).unwrap_err();
        assert_eq!(kind_of(&err), Some(ExceptionKind::TypeError));
    }

    #[test]
    fn slots_normalise_indices_and_require_existing_keys() {
        let items = list(vec![int(1), int(2), int(3)]);
        assert_eq!(slot(&items, &int(-1)).unwrap().as_int().unwrap(), 2);

        let mut dict = Dynamic::from_map(Map::new());
        set_item(&mut dict, &str_value("features"), Dynamic::from_map(Map::new()), &limits())
            .unwrap();
        assert!(slot(&dict, &str_value("features")).unwrap().is_string());
        let err = slot(&dict, &str_value("missing")).unwrap_err();
        assert_eq!(kind_of(&err), Some(ExceptionKind::KeyError));
        assert!(field_slot(&dict, "features").is_ok());

        let err = slot(&str_value("abc"), &int(0)).unwrap_err();
        assert_eq!(kind_of(&err), Some(ExceptionKind::TypeError));
    }

    #[test]
    fn record_fields_read_as_attributes_of_dicts() {
        let mut record = Dynamic::from_map(Map::new());
        set_attr(&mut record, "confidence_score", Dynamic::from_float(0.5), &limits()).unwrap();
        let value = field(&record, "confidence_score").unwrap();
        assert_eq!(value.as_float().unwrap(), 0.5);

        let err = field(&record, "ticker").unwrap_err();
        assert_eq!(kind_of(&err), Some(ExceptionKind::KeyError));
        let err = field(&record, "items").unwrap_err();
        assert_eq!(kind_of(&err), Some(ExceptionKind::TypeError));
        let err = set_attr(&mut int(1), "x", int(2), &limits()).unwrap_err();
        assert_eq!(kind_of(&err), Some(ExceptionKind::TypeError));
    }

    #[test]
    fn displays_cap_nesting_depth() {
        let deep = (0..limits().max_depth).fold(list(Array::new()), |inner, _| list(vec![inner]));
        let err = list_of(vec![deep], &limits()).unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorDataTooLarge(..)));

        let err = dict_of(vec![int(1), int(2)], &limits()).unwrap_err();
        assert_eq!(kind_of(&err), Some(ExceptionKind::TypeError));
    }

    #[test]
    fn ordering_rejects_unordered_types_but_nan_is_false() {
        assert!(!compare(CmpOp::Lt, &Dynamic::from_float(f64::NAN), &int(1)).unwrap());
        let err = compare(CmpOp::Lt, &str_value("a"), &int(1)).unwrap_err();
        assert_eq!(kind_of(&err), Some(ExceptionKind::TypeError));
        assert!(compare(CmpOp::In, &int(2), &list(vec![int(1), int(2)])).unwrap());
    }
}
