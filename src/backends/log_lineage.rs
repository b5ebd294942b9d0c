// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::errors::CollaboratorError;
use crate::observability::messages::preview::LineageRecorded;
use crate::observability::messages::StructuredLog;
use crate::traits::{LineageEvent, LineageRecorder};

/// Writes each lineage fact to the tracing stream and keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLineageRecorder;

#[async_trait]
impl LineageRecorder for LogLineageRecorder {
    async fn record(&self, event: LineageEvent) -> Result<(), CollaboratorError> {
        LineageRecorded {
            event_id: &event.id.to_string(),
            event_type: event.event_type.as_str(),
            reproducibility_hash: &event.reproducibility_hash,
            signal_count: event.record_snapshot.len(),
        }
        .log();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
