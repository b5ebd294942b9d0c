// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The transformation-script language.
//!
//! Source text flows through [`lexer`] and [`parser`] into an [`ast`] and
//! is vetted by the [`validator`], which also [`compile`]s it for the
//! embedded `rhai` engine. The [`engine`] module runs the compiled script
//! against a fresh scope per record under fuel, memory and wall-clock
//! limits enforced by the engine itself.

pub mod ast;
pub mod builtins;
pub mod compile;
pub mod engine;
mod error;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod validator;
pub mod value;

pub use compile::CompiledScript;
pub use engine::{ConsoleSink, Meter, ScriptRunner};
pub use error::{EvalError, ExceptionKind, ScriptSyntaxError};
pub use validator::{ScriptValidator, ValidatedScript, INPUT_BINDING, OUTPUT_BINDING};
