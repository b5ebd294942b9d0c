// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod preview;
mod sandbox;

pub use config::{ConfigError, ConfigValidationError};
pub use preview::{CollaboratorError, PreviewError};
pub use sandbox::{ResourceError, SandboxError, SecurityError};
