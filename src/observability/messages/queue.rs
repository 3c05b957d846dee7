// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the queue manager.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A runnable task entered the priority queue.
pub struct TaskQueuedForDispatch<'a> {
    pub instance_id: &'a str,
    pub model_id: &'a str,
    pub priority: f64,
}

impl Display for TaskQueuedForDispatch<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task '{}' of workflow {} queued for dispatch at priority {}",
            self.model_id, self.instance_id, self.priority
        )
    }
}

impl StructuredLog for TaskQueuedForDispatch<'_> {
    fn log(&self) {
        tracing::debug!(
            instance_id = self.instance_id,
            model_id = self.model_id,
            priority = self.priority,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "task_queued",
            span_name = name,
            instance_id = self.instance_id,
            model_id = self.model_id,
        )
    }
}

/// A state update arrived for a task that is no longer in flight.
///
/// # Log Level
/// `warn!` - Unexpected but handled
pub struct CallbackDiscarded<'a> {
    pub instance_id: &'a str,
    pub model_id: &'a str,
    pub reason: &'a str,
}

impl Display for CallbackDiscarded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Discarding update for task '{}' of workflow {}: {}",
            self.model_id, self.instance_id, self.reason
        )
    }
}

impl StructuredLog for CallbackDiscarded<'_> {
    fn log(&self) {
        tracing::warn!(
            instance_id = self.instance_id,
            model_id = self.model_id,
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "callback_discarded",
            span_name = name,
            instance_id = self.instance_id,
            model_id = self.model_id,
        )
    }
}

/// Writing or deleting a processor snapshot failed.
///
/// # Log Level
/// `warn!` - The in-memory tree stays authoritative
pub struct SnapshotWriteFailed<'a> {
    pub instance_id: &'a str,
    pub action: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for SnapshotWriteFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to {} processor snapshot for workflow {}: {}",
            self.action, self.instance_id, self.error
        )
    }
}

impl StructuredLog for SnapshotWriteFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            instance_id = self.instance_id,
            action = self.action,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "snapshot_write_failed",
            span_name = name,
            instance_id = self.instance_id,
            error = %self.error,
        )
    }
}

/// Stored processor snapshots reloaded at startup.
pub struct SnapshotsRestored {
    pub count: usize,
}

impl Display for SnapshotsRestored {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Restored {} workflow processors from storage", self.count)
    }
}

impl StructuredLog for SnapshotsRestored {
    fn log(&self) {
        tracing::info!(count = self.count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("snapshots_restored", span_name = name, count = self.count)
    }
}

/// A queued entry no longer matches its task and was dropped.
pub struct StaleRunnableDropped<'a> {
    pub instance_id: &'a str,
    pub model_id: &'a str,
    pub state: &'a str,
}

impl Display for StaleRunnableDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dropping queued task '{}' of workflow {}: it is now {}",
            self.model_id, self.instance_id, self.state
        )
    }
}

impl StructuredLog for StaleRunnableDropped<'_> {
    fn log(&self) {
        tracing::debug!(
            instance_id = self.instance_id,
            model_id = self.model_id,
            state = self.state,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "stale_runnable",
            span_name = name,
            instance_id = self.instance_id,
            model_id = self.model_id,
        )
    }
}

/// Priority changes are refused while a task executes.
///
/// # Log Level
/// `warn!` - Request ignored
pub struct PriorityChangeRefused<'a> {
    pub instance_id: &'a str,
    pub model_id: &'a str,
}

impl Display for PriorityChangeRefused<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Can't change the priority of executing task '{}' of workflow {}",
            self.model_id, self.instance_id
        )
    }
}

impl StructuredLog for PriorityChangeRefused<'_> {
    fn log(&self) {
        tracing::warn!(instance_id = self.instance_id, model_id = self.model_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "priority_refused",
            span_name = name,
            instance_id = self.instance_id,
            model_id = self.model_id,
        )
    }
}
