// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Runtime values of transformation scripts.
//!
//! Scripts execute on the embedded `rhai` engine, so every value is a
//! [`Dynamic`]. Script types map one to one onto engine types: `None` is
//! unit, `int`/`float` are `INT`/`FLOAT`, `Decimal` is
//! [`rust_decimal::Decimal`], `str` is an immutable string, `list` is an
//! [`Array`] and `dict` is a string-keyed [`Map`].
//!
//! Containers have value semantics. Binding a list to a second name copies
//! it, so every value is a finite tree whose depth is capped by
//! [`Limits::max_depth`]. Recursive helpers here rely on that cap.

use rhai::{Array, Dynamic, ImmutableString, Map};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt::Write as _;

/// Bytes of one engine value slot, the unit list sizes are charged in.
pub const SLOT_BYTES: usize = 16;
/// Bytes charged per dict entry, excluding key and value.
pub const DICT_ENTRY_BYTES: usize = 48;
/// Deepest container nesting a value may reach.
pub const MAX_VALUE_DEPTH: usize = 32;

/// Per-value allocation ceilings derived from a record's memory budget.
///
/// The engine checks them after every operation; host functions check
/// them before building large results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_string_bytes: usize,
    pub max_list_items: usize,
    pub max_dict_entries: usize,
    pub max_depth: usize,
}

impl Limits {
    pub fn for_memory(memory_bytes: usize) -> Self {
        Self {
            max_string_bytes: memory_bytes.max(1),
            max_list_items: (memory_bytes / SLOT_BYTES).max(1),
            max_dict_entries: (memory_bytes / DICT_ENTRY_BYTES).max(1),
            max_depth: MAX_VALUE_DEPTH,
        }
    }
}

/// Numeric view of a value, with `bool` promoted to int as arithmetic does.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
    Decimal(Decimal),
}

impl Number {
    pub fn to_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
            Number::Decimal(d) => d.to_f64().unwrap_or(f64::NAN),
        }
    }

    pub fn into_dynamic(self) -> Dynamic {
        match self {
            Number::Int(i) => Dynamic::from_int(i),
            Number::Float(f) => Dynamic::from_float(f),
            Number::Decimal(d) => Dynamic::from(d),
        }
    }
}

pub fn type_name(value: &Dynamic) -> &'static str {
    if value.is_unit() {
        "NoneType"
    } else if value.is_bool() {
        "bool"
    } else if value.is_int() {
        "int"
    } else if value.is_float() {
        "float"
    } else if value.is::<Decimal>() {
        "Decimal"
    } else if value.is_string() {
        "str"
    } else if value.is_array() {
        "list"
    } else if value.is_map() {
        "dict"
    } else {
        "object"
    }
}

pub fn as_number(value: &Dynamic) -> Option<Number> {
    if let Ok(b) = value.as_bool() {
        Some(Number::Int(i64::from(b)))
    } else if let Ok(i) = value.as_int() {
        Some(Number::Int(i))
    } else if let Ok(f) = value.as_float() {
        Some(Number::Float(f))
    } else {
        value.clone().try_cast::<Decimal>().map(Number::Decimal)
    }
}

pub fn as_str(value: &Dynamic) -> Option<ImmutableString> {
    if value.is_string() {
        value.clone().into_immutable_string().ok()
    } else {
        None
    }
}

pub fn truthy(value: &Dynamic) -> bool {
    if value.is_unit() {
        return false;
    }
    if let Some(n) = as_number(value) {
        return match n {
            Number::Int(i) => i != 0,
            Number::Float(f) => f != 0.0,
            Number::Decimal(d) => !d.is_zero(),
        };
    }
    if let Some(s) = as_str(value) {
        return !s.is_empty();
    }
    if let Some(items) = value.read_lock::<Array>() {
        return !items.is_empty();
    }
    if let Some(entries) = value.read_lock::<Map>() {
        return !entries.is_empty();
    }
    true
}

/// Container nesting of a value: 0 for scalars.
pub fn depth(value: &Dynamic) -> usize {
    if let Some(items) = value.read_lock::<Array>() {
        return 1 + items.iter().map(depth).max().unwrap_or(0);
    }
    if let Some(entries) = value.read_lock::<Map>() {
        return 1 + entries.values().map(depth).max().unwrap_or(0);
    }
    0
}

/// Total list items, dict entries and string bytes held by a value,
/// counted across nested containers the way the engine counts them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Footprint {
    pub list_items: usize,
    pub dict_entries: usize,
    pub string_bytes: usize,
}

impl Footprint {
    pub fn of(value: &Dynamic) -> Self {
        let mut total = Footprint::default();
        total.add(value);
        total
    }

    fn add(&mut self, value: &Dynamic) {
        if let Some(items) = value.read_lock::<Array>() {
            self.list_items += items.len();
            items.iter().for_each(|item| self.add(item));
        } else if let Some(entries) = value.read_lock::<Map>() {
            self.dict_entries += entries.len();
            entries.values().for_each(|entry| self.add(entry));
        } else if let Some(s) = as_str(value) {
            self.string_bytes += s.len();
        }
    }

    /// Bytes charged against the record's memory ceiling.
    pub fn bytes(&self) -> usize {
        self.list_items
            .saturating_mul(SLOT_BYTES)
            .saturating_add(self.dict_entries.saturating_mul(DICT_ENTRY_BYTES))
            .saturating_add(self.string_bytes)
    }

    pub fn plus(self, other: Self) -> Self {
        Self {
            list_items: self.list_items.saturating_add(other.list_items),
            dict_entries: self.dict_entries.saturating_add(other.dict_entries),
            string_bytes: self.string_bytes.saturating_add(other.string_bytes),
        }
    }

    pub fn times(self, count: usize) -> Self {
        Self {
            list_items: self.list_items.saturating_mul(count),
            dict_entries: self.dict_entries.saturating_mul(count),
            string_bytes: self.string_bytes.saturating_mul(count),
        }
    }

    /// Name of the first ceiling this footprint crosses, if any.
    pub fn exceeds(&self, limits: &Limits) -> Option<&'static str> {
        if self.list_items > limits.max_list_items {
            Some("Size of list")
        } else if self.dict_entries > limits.max_dict_entries {
            Some("Size of dict")
        } else if self.string_bytes > limits.max_string_bytes {
            Some("Length of string")
        } else {
            None
        }
    }
}

/// Equality across numeric types; containers compare element-wise.
pub fn values_equal(a: &Dynamic, b: &Dynamic) -> bool {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return numbers_cmp(x, y) == Some(Ordering::Equal);
    }
    if a.is_unit() || b.is_unit() {
        return a.is_unit() && b.is_unit();
    }
    if let (Some(x), Some(y)) = (as_str(a), as_str(b)) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.read_lock::<Array>(), b.read_lock::<Array>()) {
        return x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| values_equal(l, r));
    }
    if let (Some(x), Some(y)) = (a.read_lock::<Map>(), b.read_lock::<Map>()) {
        return x.len() == y.len()
            && x
                .iter()
                .zip(y.iter())
                .all(|((kl, vl), (kr, vr))| kl == kr && values_equal(vl, vr));
    }
    false
}

/// `is` on values: scalars must match in type and value, containers in
/// contents.
pub fn values_identical(a: &Dynamic, b: &Dynamic) -> bool {
    if type_name(a) != type_name(b) {
        return false;
    }
    match (as_number(a), as_number(b)) {
        (Some(Number::Float(x)), Some(Number::Float(y))) => x.to_bits() == y.to_bits(),
        (Some(Number::Decimal(x)), Some(Number::Decimal(y))) => x == y && x.scale() == y.scale(),
        _ => values_equal(a, b),
    }
}

pub fn numbers_cmp(a: Number, b: Number) -> Option<Ordering> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
        (Number::Decimal(x), Number::Decimal(y)) => Some(x.cmp(&y)),
        (Number::Decimal(x), Number::Int(y)) => Some(x.cmp(&Decimal::from(y))),
        (Number::Int(x), Number::Decimal(y)) => Some(Decimal::from(x).cmp(&y)),
        (x, y) => x.to_f64().partial_cmp(&y.to_f64()),
    }
}

/// Ordering for `<`, `min`, `max`; `None` when the types are unordered.
pub fn values_cmp(a: &Dynamic, b: &Dynamic) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return numbers_cmp(x, y);
    }
    if let (Some(x), Some(y)) = (as_str(a), as_str(b)) {
        return Some(x.as_str().cmp(y.as_str()));
    }
    let (x, y) = (a.read_lock::<Array>()?, b.read_lock::<Array>()?);
    for (l, r) in x.iter().zip(y.iter()) {
        match values_cmp(l, r)? {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    Some(x.len().cmp(&y.len()))
}

/// Rendering stopped because the text outgrew its byte budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOverflow;

/// Text used by `str()` and `print`, built under a byte budget.
///
/// Rendering stops as soon as the text would pass `max_bytes`, so the cost
/// is bounded by the budget rather than by the size of the value. Strings
/// and Decimals are quoted only when nested inside a container.
pub fn render(value: &Dynamic, max_bytes: usize) -> Result<String, RenderOverflow> {
    let mut out = Rendered {
        text: String::new(),
        max_bytes,
    };
    out.value(value, 0)?;
    Ok(out.text)
}

/// Like [`render`], but keeps whatever fit when the budget runs out.
/// The flag reports whether the text is complete.
pub fn render_prefix(value: &Dynamic, max_bytes: usize) -> (String, bool) {
    let mut out = Rendered {
        text: String::new(),
        max_bytes,
    };
    let complete = out.value(value, 0).is_ok();
    (out.text, complete)
}

struct Rendered {
    text: String,
    max_bytes: usize,
}

impl Rendered {
    fn push(&mut self, s: &str) -> Result<(), RenderOverflow> {
        let room = self.max_bytes.saturating_sub(self.text.len());
        if s.len() > room {
            let mut cut = room;
            while !s.is_char_boundary(cut) {
                cut -= 1;
            }
            self.text.push_str(&s[..cut]);
            return Err(RenderOverflow);
        }
        self.text.push_str(s);
        Ok(())
    }

    fn value(&mut self, value: &Dynamic, depth: usize) -> Result<(), RenderOverflow> {
        if value.is_unit() {
            return self.push("None");
        }
        if let Ok(b) = value.as_bool() {
            return self.push(if b { "True" } else { "False" });
        }
        if let Ok(i) = value.as_int() {
            return self.push(&i.to_string());
        }
        if let Ok(f) = value.as_float() {
            return self.push(&format_float(f));
        }
        if let Some(d) = value.clone().try_cast::<Decimal>() {
            let text = if depth == 0 {
                d.to_string()
            } else {
                format!("Decimal('{d}')")
            };
            return self.push(&text);
        }
        if let Some(s) = as_str(value) {
            if depth == 0 {
                return self.push(&s);
            }
            return self.quoted(&s);
        }
        if let Some(items) = value.read_lock::<Array>() {
            self.push("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    self.push(", ")?;
                }
                self.value(item, depth + 1)?;
            }
            return self.push("]");
        }
        if let Some(entries) = value.read_lock::<Map>() {
            self.push("{")?;
            for (i, (key, entry)) in entries.iter().enumerate() {
                if i > 0 {
                    self.push(", ")?;
                }
                self.quoted(key)?;
                self.push(": ")?;
                self.value(entry, depth + 1)?;
            }
            return self.push("}");
        }
        self.push("<object>")
    }

    fn quoted(&mut self, s: &str) -> Result<(), RenderOverflow> {
        let mut text = String::with_capacity(s.len() + 2);
        text.push('\'');
        for c in s.chars() {
            match c {
                '\\' => text.push_str("\\\\"),
                '\'' => text.push_str("\\'"),
                c => text.push(c),
            }
        }
        text.push('\'');
        self.push(&text)
    }
}

pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        let mut out = String::new();
        let _ = write!(out, "{f}");
        out
    }
}

pub fn list(items: Array) -> Dynamic {
    Dynamic::from_array(items)
}

pub fn str_value(s: impl Into<ImmutableString>) -> Dynamic {
    Dynamic::from(s.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn nested(levels: usize) -> Dynamic {
        (0..levels).fold(list(Array::new()), |inner, _| list(vec![inner]))
    }

    #[test]
    fn numeric_equality_crosses_types() {
        assert!(values_equal(&Dynamic::from_int(1), &Dynamic::from_float(1.0)));
        assert!(values_equal(&Dynamic::from_bool(true), &Dynamic::from_int(1)));
        assert!(!values_equal(
            &Dynamic::from(Decimal::from_str("2.50").unwrap()),
            &Dynamic::from_int(2)
        ));
        assert!(values_equal(
            &Dynamic::from(Decimal::from_str("2.0").unwrap()),
            &Dynamic::from_int(2)
        ));
        assert!(!values_equal(&str_value("1"), &Dynamic::from_int(1)));
        assert!(!values_equal(&Dynamic::UNIT, &Dynamic::from_int(0)));
    }

    #[test]
    fn repr_quotes_nested_strings_only() {
        let value = list(vec![str_value("a"), Dynamic::from_float(2.0), Dynamic::UNIT]);
        assert_eq!(render(&value, 1024).unwrap(), "['a', 2.0, None]");
        assert_eq!(render(&str_value("plain"), 1024).unwrap(), "plain");
        assert_eq!(render(&Dynamic::from_float(0.1), 64).unwrap(), "0.1");
        assert_eq!(render(&Dynamic::from_float(f64::INFINITY), 64).unwrap(), "inf");
    }

    #[test]
    fn render_stops_at_its_budget() {
        let wide = list(vec![Dynamic::from_int(123_456_789); 10_000]);
        assert_eq!(render(&wide, 1024), Err(RenderOverflow));
        assert_eq!(render(&list(vec![Dynamic::from_int(7)]), 3).unwrap(), "[7]");

        let (head, complete) = render_prefix(&wide, 16);
        assert!(!complete);
        assert_eq!(head, "[123456789, 1234");
    }

    #[test]
    fn equal_nested_trees_compare_equal() {
        assert!(values_equal(&nested(MAX_VALUE_DEPTH), &nested(MAX_VALUE_DEPTH)));
        assert!(!values_equal(&nested(3), &nested(4)));
        assert_eq!(depth(&nested(3)), 4);
    }

    #[test]
    fn footprint_counts_nested_items() {
        let inner = list(vec![Dynamic::from_int(0); 10]);
        let outer = list(vec![inner; 3]);
        let footprint = Footprint::of(&outer);
        assert_eq!(footprint.list_items, 33);
        let limits = Limits::for_memory(16 * 100);
        assert_eq!(footprint.times(3).exceeds(&limits), None);
        assert_eq!(footprint.times(4).exceeds(&limits), Some("Size of list"));
        assert_eq!(footprint.bytes(), 33 * SLOT_BYTES);
    }

    #[test]
    fn truthiness_follows_emptiness() {
        assert!(!truthy(&list(Array::new())));
        assert!(truthy(&str_value("x")));
        assert!(!truthy(&Dynamic::from(Decimal::ZERO)));
        assert!(!truthy(&Dynamic::UNIT));
        assert!(truthy(&Dynamic::from_map(Map::from([("k".into(), Dynamic::UNIT)]))));
    }
}
