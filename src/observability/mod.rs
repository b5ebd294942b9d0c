// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Message types live in [`messages`] and follow a struct-based pattern
//! with a `Display` implementation, so no log text is scattered through
//! the sandbox, batch and preview code.
//!
//! # Usage
//!
//! ```rust
//! use signal_sandbox::observability::messages::sandbox::RecordFailed;
//! use signal_sandbox::signal::RecordErrorKind;
//!
//! let msg = RecordFailed {
//!     ticker: "NVDA",
//!     kind: RecordErrorKind::Runtime,
//!     message: "KeyError on line 2: 'x'",
//! };
//!
//! tracing::warn!("{}", msg);
//! ```

pub mod messages;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the global `fmt` subscriber with an `EnvFilter` read from
/// `RUST_LOG`, writing to stderr. Later calls are no-ops.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}
