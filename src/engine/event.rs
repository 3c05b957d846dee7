// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::engine::queue::PageFilter;
use crate::errors::{EngineError, EngineResult, GraphError};
use crate::metadata::Metadata;
use crate::page::PageInfo;
use crate::priority::Priority;
use crate::traits::{WorkflowEngine, WorkflowEngineEvent};

/// Starts a workflow of one model, with the trigger's metadata as input.
///
/// With `max_running` set, the event refuses to fire while that many
/// workflows of the model are still unfinished.
#[derive(Debug, Clone)]
pub struct StartWorkflowEvent {
    event_id: String,
    model_id: String,
    max_running: Option<usize>,
    priority: Option<Priority>,
}

impl StartWorkflowEvent {
    pub fn new(event_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            model_id: model_id.into(),
            max_running: None,
            priority: None,
        }
    }

    pub fn with_max_running(mut self, max_running: usize) -> Self {
        self.max_running = Some(max_running);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    async fn unfinished(&self, engine: &dyn WorkflowEngine) -> EngineResult<usize> {
        let filter = PageFilter::ModelId(self.model_id.clone());
        let mut page = engine.get_page(PageInfo::first(100), filter).await?;
        let mut count = 0;
        loop {
            count += page.stubs.iter().filter(|s| !s.state.is_done()).count();
            if page.info.is_last_page() {
                return Ok(count);
            }
            page = engine.get_next_page(&page).await?;
        }
    }
}

#[async_trait]
impl WorkflowEngineEvent for StartWorkflowEvent {
    fn event_id(&self) -> &str {
        &self.event_id
    }

    async fn passes_preconditions(&self, engine: &dyn WorkflowEngine) -> EngineResult<bool> {
        match engine.get_model(&self.model_id).await {
            Ok(_) => {}
            Err(EngineError::Graph(GraphError::UnknownModel(_))) => return Ok(false),
            Err(error) => return Err(error),
        }
        match self.max_running {
            Some(limit) => Ok(self.unfinished(engine).await? < limit),
            None => Ok(true),
        }
    }

    async fn perform_action(&self, engine: &dyn WorkflowEngine, metadata: Metadata) -> EngineResult<()> {
        engine
            .start_workflow(&self.model_id, metadata, self.priority)
            .await?;
        Ok(())
    }
}
