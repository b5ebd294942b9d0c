// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Request-level surface: the signal preview.

pub mod preview;


pub use preview::{
    lineage_event, Collaborators, PreviewRequest, PreviewResponse, PreviewService, SignalSummary,
};
