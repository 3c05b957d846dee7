// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::errors::RepositoryError;
use crate::traits::{EventRepository, WorkflowEngineEvent};

/// Registered events by id. Storing an event under a taken id replaces it.
#[derive(Default)]
pub struct InMemoryEventRepository {
    events: RwLock<BTreeMap<String, Arc<dyn WorkflowEngineEvent>>>,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn store_event(&self, event: Arc<dyn WorkflowEngineEvent>) -> Result<(), RepositoryError> {
        self.events
            .write()
            .await
            .insert(event.event_id().to_string(), event);
        Ok(())
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<Arc<dyn WorkflowEngineEvent>>, RepositoryError> {
        Ok(self.events.read().await.get(event_id).cloned())
    }

    async fn event_ids(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(self.events.read().await.keys().cloned().collect())
    }
}
