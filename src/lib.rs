// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // collaborator implementations
pub mod config;     // config + runtime wiring
pub mod engine;     // batch runner, trace, comparison
pub mod errors;     // error handling
pub mod observability;
pub mod sandbox;    // per-record execution under budgets
pub mod script;     // transformation script language
pub mod service;    // signal preview
pub mod signal;     // data model
pub mod traits;     // unified abstractions
pub mod utils;
