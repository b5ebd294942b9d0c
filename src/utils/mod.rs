// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod digest;

pub use digest::{sha256_base64, sha256_base64_parts};
