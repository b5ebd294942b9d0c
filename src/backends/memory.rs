// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-process collaborator implementations backed by tokio locks.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::{Mutex, RwLock};

use crate::errors::CollaboratorError;
use crate::traits::{LineageEvent, LineageRecorder, PresetStore, Weights};

/// Append-only lineage log held in memory.
#[derive(Debug, Default)]
pub struct InMemoryLineageRecorder {
    events: Mutex<Vec<LineageEvent>>,
}

impl InMemoryLineageRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event recorded so far, oldest first.
    pub async fn events(&self) -> Vec<LineageEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl LineageRecorder for InMemoryLineageRecorder {
    async fn record(&self, event: LineageEvent) -> Result<(), CollaboratorError> {
        self.events.lock().await.push(event);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPresetStore {
    presets: RwLock<BTreeMap<String, Weights>>,
}

impl InMemoryPresetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_presets(presets: BTreeMap<String, Weights>) -> Self {
        Self {
            presets: RwLock::new(presets),
        }
    }
}

#[async_trait]
impl PresetStore for InMemoryPresetStore {
    async fn get(&self, name: &str) -> Result<Option<Weights>, CollaboratorError> {
        Ok(self.presets.read().await.get(name).cloned())
    }

    async fn put(&self, name: &str, weights: Weights) -> Result<(), CollaboratorError> {
        if name.trim().is_empty() {
            return Err(CollaboratorError::Failed {
                collaborator: "preset store",
                reason: "preset name must not be empty".to_string(),
            });
        }
        self.presets.write().await.insert(name.to_string(), weights);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, CollaboratorError> {
        Ok(self.presets.write().await.remove(name).is_some())
    }

    async fn list(&self) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.presets.read().await.keys().cloned().collect())
    }
}
