// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for engine lifecycle and workflow operator actions.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Engine constructed and driver loop spawned.
///
/// # Log Level
/// `info!` - Important operational event
pub struct EngineStarted {
    pub max_concurrency: usize,
    pub poll_interval_ms: u64,
    pub model_count: usize,
}

impl Display for EngineStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Workflow engine started: {} models, max_concurrency={}, poll_interval={}ms",
            self.model_count, self.max_concurrency, self.poll_interval_ms
        )
    }
}

impl StructuredLog for EngineStarted {
    fn log(&self) {
        tracing::info!(
            max_concurrency = self.max_concurrency,
            poll_interval_ms = self.poll_interval_ms,
            model_count = self.model_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "engine",
            span_name = name,
            max_concurrency = self.max_concurrency,
            poll_interval_ms = self.poll_interval_ms,
        )
    }
}

/// Workflow models loaded or refreshed from the model repository.
pub struct ModelsLoaded {
    pub count: usize,
}

impl Display for ModelsLoaded {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Loaded {} workflow models", self.count)
    }
}

impl StructuredLog for ModelsLoaded {
    fn log(&self) {
        tracing::info!(count = self.count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("models_loaded", span_name = name, count = self.count)
    }
}

/// Workflow instance created and queued.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use wengine::observability::messages::engine::WorkflowStarted;
///
/// let msg = WorkflowStarted {
///     instance_id: "7d0c",
///     model_id: "ingest",
///     priority: 5.0,
/// };
///
/// assert_eq!(msg.to_string(), "Started workflow 'ingest' as instance 7d0c at priority 5");
/// ```
pub struct WorkflowStarted<'a> {
    pub instance_id: &'a str,
    pub model_id: &'a str,
    pub priority: f64,
}

impl Display for WorkflowStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Started workflow '{}' as instance {} at priority {}",
            self.model_id, self.instance_id, self.priority
        )
    }
}

impl StructuredLog for WorkflowStarted<'_> {
    fn log(&self) {
        tracing::info!(
            instance_id = self.instance_id,
            model_id = self.model_id,
            priority = self.priority,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "workflow",
            span_name = name,
            instance_id = self.instance_id,
            model_id = self.model_id,
        )
    }
}

/// An operator stopped, paused, resumed or deleted a workflow.
pub struct WorkflowOperatorAction<'a> {
    pub instance_id: &'a str,
    pub action: &'a str,
}

impl Display for WorkflowOperatorAction<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Workflow {} {}", self.instance_id, self.action)
    }
}

impl StructuredLog for WorkflowOperatorAction<'_> {
    fn log(&self) {
        tracing::info!(instance_id = self.instance_id, action = self.action, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "operator_action",
            span_name = name,
            instance_id = self.instance_id,
            action = self.action,
        )
    }
}

/// Registered engine event fired.
pub struct EventTriggered<'a> {
    pub event_id: &'a str,
}

impl Display for EventTriggered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Triggered event '{}'", self.event_id)
    }
}

impl StructuredLog for EventTriggered<'_> {
    fn log(&self) {
        tracing::info!(event_id = self.event_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("event", span_name = name, event_id = self.event_id)
    }
}

/// Dispatch to the runner failed; the task is failed in its tree.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct DispatchFailed<'a> {
    pub instance_id: &'a str,
    pub model_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for DispatchFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to dispatch task '{}' of workflow {}: {}",
            self.model_id, self.instance_id, self.error
        )
    }
}

impl StructuredLog for DispatchFailed<'_> {
    fn log(&self) {
        tracing::error!(
            instance_id = self.instance_id,
            model_id = self.model_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "dispatch_failed",
            span_name = name,
            instance_id = self.instance_id,
            model_id = self.model_id,
            error = %self.error,
        )
    }
}

/// The driver loop was paused or resumed.
pub struct RunnerPauseChanged {
    pub paused: bool,
}

impl Display for RunnerPauseChanged {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.paused {
            write!(f, "Dispatch paused")
        } else {
            write!(f, "Dispatch resumed")
        }
    }
}

impl StructuredLog for RunnerPauseChanged {
    fn log(&self) {
        tracing::info!(paused = self.paused, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("runner_pause", span_name = name, paused = self.paused)
    }
}

pub struct EngineShutdown {
    pub workflows: usize,
}

impl Display for EngineShutdown {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Workflow engine shutting down with {} workflows loaded", self.workflows)
    }
}

impl StructuredLog for EngineShutdown {
    fn log(&self) {
        tracing::info!(workflows = self.workflows, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("engine_shutdown", span_name = name, workflows = self.workflows)
    }
}
