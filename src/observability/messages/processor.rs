// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for processor tree construction and state transitions.

use crate::observability::messages::StructuredLog;
use crate::state::WorkflowState;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Processor tree built from a model graph.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct TreeBuilt<'a> {
    pub instance_id: &'a str,
    pub model_id: &'a str,
    pub node_count: usize,
}

impl Display for TreeBuilt<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Built processor tree for '{}' (instance {}): {} nodes",
            self.model_id, self.instance_id, self.node_count
        )
    }
}

impl StructuredLog for TreeBuilt<'_> {
    fn log(&self) {
        tracing::debug!(
            instance_id = self.instance_id,
            model_id = self.model_id,
            node_count = self.node_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "tree_built",
            span_name = name,
            instance_id = self.instance_id,
            model_id = self.model_id,
        )
    }
}

/// A processor node entered a new state.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
///
/// # Example
/// ```
/// use wengine::observability::messages::processor::StateChanged;
/// use wengine::state::{StateKind, WorkflowState};
///
/// let state = WorkflowState::new(StateKind::Failure, "disk full");
/// let msg = StateChanged {
///     instance_id: "7d0c",
///     model_id: "archive",
///     state: &state,
/// };
///
/// assert_eq!(msg.to_string(), "Processor 'archive' of workflow 7d0c is now Failure : disk full");
/// ```
pub struct StateChanged<'a> {
    pub instance_id: &'a str,
    pub model_id: &'a str,
    pub state: &'a WorkflowState,
}

impl Display for StateChanged<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Processor '{}' of workflow {} is now {}",
            self.model_id, self.instance_id, self.state
        )
    }
}

impl StructuredLog for StateChanged<'_> {
    fn log(&self) {
        tracing::debug!(
            instance_id = self.instance_id,
            model_id = self.model_id,
            state = %self.state.kind(),
            category = %self.state.category(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "state_changed",
            span_name = name,
            instance_id = self.instance_id,
            model_id = self.model_id,
            state = %self.state.kind(),
        )
    }
}

/// A workflow's root reached a DONE state.
///
/// # Log Level
/// `info!` - Important operational event
pub struct WorkflowFinished<'a> {
    pub instance_id: &'a str,
    pub model_id: &'a str,
    pub state: &'a WorkflowState,
}

impl Display for WorkflowFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Workflow '{}' (instance {}) finished: {}",
            self.model_id, self.instance_id, self.state
        )
    }
}

impl StructuredLog for WorkflowFinished<'_> {
    fn log(&self) {
        tracing::info!(
            instance_id = self.instance_id,
            model_id = self.model_id,
            state = %self.state.kind(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "workflow_finished",
            span_name = name,
            instance_id = self.instance_id,
            model_id = self.model_id,
        )
    }
}
