// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the engine runner.
//!
//! This module contains message types for logging events related to:
//! * Work unit execution (start, finish, failure, panic)
//! * Runner shutdown and cancellation of in-flight work

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Work unit execution started.
///
/// # Log Level
/// `info!` - Important operational event
pub struct TaskStarted<'a> {
    pub instance_id: &'a str,
    pub model_id: &'a str,
    pub work_unit: &'a str,
    pub job_id: &'a str,
}

impl Display for TaskStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task '{}' of workflow {} started as job {} using '{}'",
            self.model_id, self.instance_id, self.job_id, self.work_unit
        )
    }
}

impl StructuredLog for TaskStarted<'_> {
    fn log(&self) {
        tracing::info!(
            instance_id = self.instance_id,
            model_id = self.model_id,
            work_unit = self.work_unit,
            job_id = self.job_id,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "task",
            span_name = name,
            instance_id = self.instance_id,
            model_id = self.model_id,
            job_id = self.job_id,
        )
    }
}

/// Work unit finished; `state` is what the runner reported.
///
/// # Log Level
/// `info!` - Important operational event
pub struct TaskFinished<'a> {
    pub instance_id: &'a str,
    pub model_id: &'a str,
    pub state: &'a str,
    pub duration: std::time::Duration,
}

impl Display for TaskFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task '{}' of workflow {} finished in {:?}: {}",
            self.model_id, self.instance_id, self.duration, self.state
        )
    }
}

impl StructuredLog for TaskFinished<'_> {
    fn log(&self) {
        tracing::info!(
            instance_id = self.instance_id,
            model_id = self.model_id,
            state = self.state,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "task_finished",
            span_name = name,
            instance_id = self.instance_id,
            model_id = self.model_id,
            duration = ?self.duration,
        )
    }
}

/// Work unit returned an error or panicked.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use wengine::observability::messages::runner::TaskFailed;
///
/// let msg = TaskFailed {
///     instance_id: "7d0c",
///     model_id: "archive",
///     error: "disk full",
/// };
///
/// assert_eq!(msg.to_string(), "Task 'archive' of workflow 7d0c failed: disk full");
/// ```
pub struct TaskFailed<'a> {
    pub instance_id: &'a str,
    pub model_id: &'a str,
    pub error: &'a str,
}

impl Display for TaskFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task '{}' of workflow {} failed: {}",
            self.model_id, self.instance_id, self.error
        )
    }
}

impl StructuredLog for TaskFailed<'_> {
    fn log(&self) {
        tracing::error!(
            instance_id = self.instance_id,
            model_id = self.model_id,
            error = self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "task_failed",
            span_name = name,
            instance_id = self.instance_id,
            model_id = self.model_id,
            error = self.error,
        )
    }
}

pub struct RunnerShutdownStarted {
    pub in_flight: usize,
    pub grace: std::time::Duration,
}

impl Display for RunnerShutdownStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Runner shutting down: waiting up to {:?} for {} tasks",
            self.grace, self.in_flight
        )
    }
}

impl StructuredLog for RunnerShutdownStarted {
    fn log(&self) {
        tracing::info!(
            in_flight = self.in_flight,
            grace_ms = self.grace.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("runner_shutdown", span_name = name, in_flight = self.in_flight)
    }
}

/// Grace period elapsed with work still running.
///
/// # Log Level
/// `warn!` - Work was interrupted
pub struct InFlightCancelled {
    pub remaining: usize,
}

impl Display for InFlightCancelled {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Cancelling {} tasks still running after grace period", self.remaining)
    }
}

impl StructuredLog for InFlightCancelled {
    fn log(&self) {
        tracing::warn!(remaining = self.remaining, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("in_flight_cancelled", span_name = name, remaining = self.remaining)
    }
}
