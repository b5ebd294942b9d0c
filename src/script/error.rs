// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error types raised while lexing, parsing and evaluating scripts.

use rhai::{Dynamic, EvalAltResult, Position};
use std::fmt;
use thiserror::Error;

/// Lexing or parsing failure with the position it was detected at.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}, column {column}: {message}")]
pub struct ScriptSyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ScriptSyntaxError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Python-style exception category reported to script authors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    TypeError,
    NameError,
    KeyError,
    IndexError,
    ValueError,
    ZeroDivisionError,
    OverflowError,
    AssertionError,
    ScriptError,
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::NameError => "NameError",
            ExceptionKind::KeyError => "KeyError",
            ExceptionKind::IndexError => "IndexError",
            ExceptionKind::ValueError => "ValueError",
            ExceptionKind::ZeroDivisionError => "ZeroDivisionError",
            ExceptionKind::OverflowError => "OverflowError",
            ExceptionKind::AssertionError => "AssertionError",
            ExceptionKind::ScriptError => "ScriptError",
        };
        f.write_str(name)
    }
}

/// Result type of host functions registered with the engine.
pub type HostResult<T> = Result<T, Box<EvalAltResult>>;

/// Exception raised by a host function. It travels through the engine as
/// the payload of a runtime error and is unpacked when the run is
/// classified.
#[derive(Debug, Clone, PartialEq)]
pub struct Raised {
    pub kind: ExceptionKind,
    pub message: String,
}

pub fn raise(kind: ExceptionKind, message: impl Into<String>) -> Box<EvalAltResult> {
    let raised = Raised {
        kind,
        message: message.into(),
    };
    Box::new(EvalAltResult::ErrorRuntime(Dynamic::from(raised), Position::NONE))
}

pub fn type_error(message: impl Into<String>) -> Box<EvalAltResult> {
    raise(ExceptionKind::TypeError, message)
}

pub fn value_error(message: impl Into<String>) -> Box<EvalAltResult> {
    raise(ExceptionKind::ValueError, message)
}

/// A result would cross one of the per-value memory ceilings.
pub fn too_large(what: &str) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorDataTooLarge(what.to_string(), Position::NONE))
}

/// Failure while evaluating a validated program.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// The script raised (explicitly or through a failing operation).
    #[error("{kind} on line {line}: {message}")]
    Exception {
        kind: ExceptionKind,
        message: String,
        line: usize,
    },

    /// The host raised the interrupt flag or the wall-clock deadline passed.
    #[error("execution interrupted: wall-clock budget exceeded")]
    Interrupted,

    /// The operation budget ran out.
    #[error("fuel exhausted after {0} operations")]
    FuelExhausted(u64),

    /// Allocation accounting crossed the memory ceiling.
    #[error("memory limit of {limit} bytes exceeded")]
    MemoryExceeded { limit: usize },
}

impl EvalError {
    pub fn exception(kind: ExceptionKind, line: usize, message: impl Into<String>) -> Self {
        EvalError::Exception {
            kind,
            message: message.into(),
            line,
        }
    }

    /// Resource errors are budget violations rather than script faults.
    pub fn is_resource(&self) -> bool {
        !matches!(self, EvalError::Exception { .. })
    }
}
