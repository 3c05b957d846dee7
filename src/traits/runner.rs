// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::EngineResult;
use crate::metadata::{keys, Metadata};
use crate::priority::Priority;
use crate::state::WorkflowState;
use crate::traits::WorkflowEngine;

/// A task handed from the queue manager to a runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDispatch {
    pub instance_id: String,
    pub model_id: String,
    pub job_id: String,
    pub work_unit: String,
    pub priority: Priority,
    pub static_metadata: Metadata,
    pub dynamic_metadata: Metadata,
}

impl TaskDispatch {
    /// The runner queue this task competes for, from its static metadata.
    pub fn queue_name(&self) -> Option<&str> {
        self.static_metadata.get(keys::QUEUE_NAME)
    }

    /// `instance:model`, the key executing tasks are tracked under.
    pub fn key(&self) -> String {
        task_key(&self.instance_id, &self.model_id)
    }
}

pub fn task_key(instance_id: &str, model_id: &str) -> String {
    format!("{instance_id}:{model_id}")
}

/// State and metadata a running task reports back to its engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub instance_id: String,
    pub model_id: String,
    pub job_id: String,
    pub state: WorkflowState,
    /// Becomes the task's dynamic metadata in its tree.
    pub metadata: Option<Metadata>,
    /// Stored in the instance repository under `job_id`.
    pub instance_metadata: Option<Metadata>,
}

impl TaskUpdate {
    pub fn state(task: &TaskDispatch, state: WorkflowState) -> Self {
        Self {
            instance_id: task.instance_id.clone(),
            model_id: task.model_id.clone(),
            job_id: task.job_id.clone(),
            state,
            metadata: None,
            instance_metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata, instance_metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self.instance_metadata = Some(instance_metadata);
        self
    }
}

/// Executes dispatched tasks out of line from the driver loop.
///
/// Every accepted task reports `Executing` when it starts and exactly one
/// terminal state when it ends, through `notify`.
#[async_trait]
pub trait EngineRunner: Send + Sync {
    /// Non-blocking capacity check.
    fn has_open_slots(&self, task: &TaskDispatch) -> bool;

    async fn execute(&self, task: TaskDispatch, notify: Arc<dyn WorkflowEngine>) -> EngineResult<()>;

    /// Stops accepting work, waits for in-flight work up to a grace period
    /// and cancels whatever is still running after it.
    async fn shutdown(&self);

    fn in_flight(&self) -> usize;
}
