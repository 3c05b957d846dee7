// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::metadata::ControlMetadata;
use crate::traits::WorkflowEngine;

/// How a work unit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success(String),
    Failure(String),
    /// Cannot finish yet; the task is blocked and offered again later.
    Bail(String),
}

impl TaskOutcome {
    pub fn message(&self) -> &str {
        match self {
            TaskOutcome::Success(m) | TaskOutcome::Failure(m) | TaskOutcome::Bail(m) => m,
        }
    }
}

/// Who is running and how to reach the engine that dispatched it.
#[derive(Clone)]
pub struct TaskContext {
    pub instance_id: String,
    pub model_id: String,
    pub job_id: String,
    engine: Option<Arc<dyn WorkflowEngine>>,
    cancel: CancellationToken,
}

impl TaskContext {
    pub fn new(instance_id: impl Into<String>, model_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            model_id: model_id.into(),
            job_id: job_id.into(),
            engine: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn WorkflowEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn engine(&self) -> Option<&Arc<dyn WorkflowEngine>> {
        self.engine.as_ref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("instance_id", &self.instance_id)
            .field("model_id", &self.model_id)
            .field("job_id", &self.job_id)
            .field("has_engine", &self.engine.is_some())
            .finish()
    }
}

/// The executable body of a task leaf.
///
/// `metadata` starts with the task's static and dynamic metadata. Values the
/// unit writes to the local layer are visible to the engine only for keys it
/// marks as workflow keys; those become the task's dynamic metadata when the
/// unit returns.
///
/// Returning `Err` is treated like [`TaskOutcome::Failure`].
#[async_trait]
pub trait WorkUnit: Send + Sync {
    async fn execute(&self, metadata: &mut ControlMetadata, task: &TaskContext) -> anyhow::Result<TaskOutcome>;

    fn name(&self) -> &'static str;
}
