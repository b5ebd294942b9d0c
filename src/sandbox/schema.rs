// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Conversion between [`SignalRecord`] and script values.
//!
//! A record enters a script as the dict bound to `signal`, plus one
//! pre-bound alias per field (`ratio`, `confidence`, ...). Aliases are
//! copies, like every other container binding. On the way out the output
//! dict is `result` if the script assigned it, otherwise the final
//! `signal`. Any alias whose value changed is written back over its field
//! before the dict is checked against the record schema.

use rhai::{Dynamic, Map, Scope};
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

use crate::script::compile::variable;
use crate::script::value::{as_number, as_str, type_name, values_identical, Number};
use crate::script::{INPUT_BINDING, OUTPUT_BINDING};
use crate::signal::{
    RecordInvariantError, SignalRecord, SignalStrength, SignalType, StrengthLabel, FIELD_ALIASES,
    RECORD_FIELDS,
};

/// Why a script's output was not accepted as a record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("output must be a dict, got {0}")]
    NotADict(&'static str),

    #[error("output is missing field '{0}'")]
    MissingField(String),

    #[error("output has unexpected field '{0}'")]
    UnexpectedField(String),

    #[error("field '{field}' must be {expected}, got {found}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("ticker cannot change (was '{before}', got '{after}')")]
    TickerChanged { before: String, after: String },

    #[error("{0}")]
    Invariant(#[from] RecordInvariantError),
}

pub fn record_to_value(record: &SignalRecord) -> Dynamic {
    let features: Map = record
        .features
        .iter()
        .map(|(name, value)| (name.as_str().into(), Dynamic::from_float(*value)))
        .collect();
    let strength = match record.signal_strength {
        SignalStrength::Label(label) => Dynamic::from(label.as_str().to_string()),
        SignalStrength::Score(score) => Dynamic::from_float(score),
    };

    let mut map = Map::new();
    map.insert("ticker".into(), Dynamic::from(record.ticker.clone()));
    map.insert(
        "signal_type".into(),
        Dynamic::from(record.signal_type.as_str().to_string()),
    );
    map.insert("signal_strength".into(), strength);
    map.insert(
        "confidence_score".into(),
        Dynamic::from_float(record.confidence_score),
    );
    map.insert(
        "politician_activity_count".into(),
        Dynamic::from_int(i64::try_from(record.politician_activity_count).unwrap_or(i64::MAX)),
    );
    map.insert("buy_sell_ratio".into(), Dynamic::from_float(record.buy_sell_ratio));
    map.insert(
        "total_transaction_volume".into(),
        Dynamic::from_float(record.total_transaction_volume),
    );
    map.insert("bipartisan".into(), Dynamic::from_bool(record.bipartisan));
    map.insert("features".into(), Dynamic::from_map(features));
    Dynamic::from_map(map)
}

/// Initial alias bindings, kept to detect which aliases a script changed.
pub struct AliasSnapshot(Vec<(&'static str, &'static str, Dynamic)>);

/// Pushes `signal` and the field aliases onto a fresh scope.
pub fn bind_record(scope: &mut Scope<'_>, record: &SignalRecord) -> AliasSnapshot {
    let signal = record_to_value(record);
    let mut snapshot = Vec::with_capacity(FIELD_ALIASES.len());
    if let Some(entries) = signal.read_lock::<Map>() {
        for (alias, field) in FIELD_ALIASES {
            if let Some(value) = entries.get(field) {
                scope.push_dynamic(variable(alias), value.clone());
                snapshot.push((alias, field, value.clone()));
            }
        }
    }
    scope.push_dynamic(variable(INPUT_BINDING), signal);
    AliasSnapshot(snapshot)
}

/// Reads the script's output from the scope and validates it.
pub fn extract_output(
    scope: &Scope<'_>,
    aliases: &AliasSnapshot,
    before: &SignalRecord,
) -> Result<SignalRecord, SchemaError> {
    let output = scope
        .get_value::<Dynamic>(&variable(OUTPUT_BINDING))
        .filter(|value| !value.is_unit())
        .or_else(|| scope.get_value::<Dynamic>(&variable(INPUT_BINDING)))
        .unwrap_or(Dynamic::UNIT);

    let mut fields: BTreeMap<String, Dynamic> = match output.read_lock::<Map>() {
        Some(entries) => entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect(),
        None => return Err(SchemaError::NotADict(type_name(&output))),
    };

    for (alias, field, initial) in &aliases.0 {
        if let Some(current) = scope.get_value::<Dynamic>(&variable(alias)) {
            if !values_identical(initial, &current) {
                fields.insert(field.to_string(), current);
            }
        }
    }

    value_to_record(fields, before)
}

fn value_to_record(
    mut fields: BTreeMap<String, Dynamic>,
    before: &SignalRecord,
) -> Result<SignalRecord, SchemaError> {
    if let Some(extra) = fields.keys().find(|k| !RECORD_FIELDS.contains(&k.as_str())) {
        return Err(SchemaError::UnexpectedField(extra.clone()));
    }
    let mut take = |field: &str| {
        fields
            .remove(field)
            .ok_or_else(|| SchemaError::MissingField(field.to_string()))
    };

    let ticker = expect_str("ticker", &take("ticker")?)?;
    if ticker != before.ticker {
        return Err(SchemaError::TickerChanged {
            before: before.ticker.clone(),
            after: ticker,
        });
    }
    let signal_type = SignalType::from_str(&expect_str("signal_type", &take("signal_type")?)?)?;
    let strength = take("signal_strength")?;
    let signal_strength = match as_str(&strength) {
        Some(label) => SignalStrength::Label(StrengthLabel::from_str(&label)?),
        None => SignalStrength::Score(expect_number("signal_strength", &strength)?),
    };
    let confidence_score = expect_number("confidence_score", &take("confidence_score")?)?;
    let politician_activity_count =
        expect_count("politician_activity_count", &take("politician_activity_count")?)?;
    let buy_sell_ratio = expect_number("buy_sell_ratio", &take("buy_sell_ratio")?)?;
    let total_transaction_volume =
        expect_number("total_transaction_volume", &take("total_transaction_volume")?)?;
    let bipartisan = take("bipartisan")?;
    let bipartisan = bipartisan
        .as_bool()
        .map_err(|_| wrong_type("bipartisan", "a bool", &bipartisan))?;
    let features = take("features")?;
    let features = match features.read_lock::<Map>() {
        Some(entries) => entries
            .iter()
            .map(|(name, value)| Ok((name.to_string(), expect_number("features", value)?)))
            .collect::<Result<BTreeMap<_, _>, SchemaError>>()?,
        None => return Err(wrong_type("features", "a dict", &features)),
    };

    let record = SignalRecord {
        ticker,
        signal_type,
        signal_strength,
        confidence_score,
        politician_activity_count,
        buy_sell_ratio,
        total_transaction_volume,
        bipartisan,
        features,
    };
    record.validate()?;
    Ok(record)
}

fn wrong_type(field: &str, expected: &'static str, found: &Dynamic) -> SchemaError {
    SchemaError::WrongType {
        field: field.to_string(),
        expected,
        found: type_name(found),
    }
}

fn expect_str(field: &str, value: &Dynamic) -> Result<String, SchemaError> {
    as_str(value)
        .map(|s| s.to_string())
        .ok_or_else(|| wrong_type(field, "a str", value))
}

/// Floats, ints and Decimals are accepted for float fields; bools are not.
fn expect_number(field: &str, value: &Dynamic) -> Result<f64, SchemaError> {
    if value.is_bool() {
        return Err(wrong_type(field, "a number", value));
    }
    match as_number(value) {
        Some(Number::Float(f)) => Ok(f),
        Some(Number::Int(i)) => Ok(i as f64),
        Some(Number::Decimal(d)) => d
            .to_f64()
            .ok_or_else(|| wrong_type(field, "a finite number", value)),
        None => Err(wrong_type(field, "a number", value)),
    }
}

fn expect_count(field: &str, value: &Dynamic) -> Result<u64, SchemaError> {
    let count = value
        .as_int()
        .map_err(|_| wrong_type(field, "an int", value))?;
    u64::try_from(count).map_err(|_| {
        SchemaError::Invariant(RecordInvariantError::NegativeOrNonFinite {
            field: "politician_activity_count",
            value: count as f64,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{ConsoleSink, Meter, ScriptRunner, ScriptValidator};
    use crate::signal::sample_record;
    use std::sync::Arc;

    struct Silent;

    impl ConsoleSink for Silent {
        fn write_line(&self, _line: &str) {}
    }

    fn transform(source: &str, record: &SignalRecord) -> Result<SignalRecord, SchemaError> {
        let script = ScriptValidator::new(4096, 32).validate(source).unwrap();
        let runner = ScriptRunner::new(Meter::new(10_000, 1 << 20), Arc::new(Silent));
        let mut scope = Scope::new();
        let aliases = bind_record(&mut scope, record);
        runner.run(script.compiled(), &mut scope).unwrap();
        extract_output(&scope, &aliases, record)
    }

    #[test]
    fn untouched_record_round_trips() {
        let record = sample_record("NVDA");
        assert_eq!(transform("pass", &record).unwrap(), record);
    }

    #[test]
    fn alias_rebinding_writes_back() {
        let record = sample_record("NVDA");
        let after = transform("if ratio > 3.0: confidence += 0.05", &record).unwrap();
        assert_eq!(after.confidence_score, 0.9);
        assert_eq!(after.signal_type, record.signal_type);
    }

    #[test]
    fn result_binding_takes_precedence() {
        let record = sample_record("NVDA");
        let source = "\
result = dict(signal)
result['signal_type'] = 'strong_buy'
signal['signal_type'] = 'sell'
";
        let after = transform(source, &record).unwrap();
        assert_eq!(after.signal_type, SignalType::StrongBuy);
    }

    #[test]
    fn result_set_to_none_falls_back_to_signal() {
        let record = sample_record("NVDA");
        let after = transform("result = None\nsignal['bipartisan'] = False", &record).unwrap();
        assert!(!after.bipartisan);
    }

    #[test]
    fn ints_and_decimals_are_accepted_for_float_fields() {
        let record = sample_record("NVDA");
        let after = transform(
            "signal['buy_sell_ratio'] = 4\nsignal['confidence_score'] = Decimal('0.5')",
            &record,
        )
        .unwrap();
        assert_eq!(after.buy_sell_ratio, 4.0);
        assert_eq!(after.confidence_score, 0.5);
    }

    #[test]
    fn schema_violations_are_reported() {
        let record = sample_record("NVDA");
        assert_eq!(
            transform("signal['confidence_score'] = 1.5", &record),
            Err(SchemaError::Invariant(RecordInvariantError::ConfidenceOutOfRange(1.5)))
        );
        assert!(matches!(
            transform("signal['signal_type'] = 'moon'", &record),
            Err(SchemaError::Invariant(RecordInvariantError::UnknownSignalType(_)))
        ));
        assert!(matches!(
            transform("signal['extra'] = 1", &record),
            Err(SchemaError::UnexpectedField(_))
        ));
        assert!(matches!(
            transform("ticker = 'MSFT'", &record),
            Err(SchemaError::TickerChanged { .. })
        ));
        assert!(matches!(
            transform("bipartisan = 1", &record),
            Err(SchemaError::WrongType { .. })
        ));
        assert_eq!(
            transform("result = 5", &record),
            Err(SchemaError::NotADict("int"))
        );
    }

    #[test]
    fn feature_mutation_through_alias_is_written_back() {
        let record = sample_record("NVDA");
        let after = transform("features['insider'] = 1", &record).unwrap();
        assert_eq!(after.features.get("insider"), Some(&1.0));
        assert_eq!(after.features.get("momentum"), Some(&0.4));
    }

    #[test]
    fn record_value_carries_every_field() {
        let value = record_to_value(&sample_record("NVDA"));
        let map = value.read_lock::<Map>().unwrap();
        assert_eq!(map.len(), RECORD_FIELDS.len());
        assert!(RECORD_FIELDS.iter().all(|field| map.contains_key(*field)));
    }
}
