// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Definitional errors raised while turning a model graph into a processor tree.
//!
//! These surface to whoever asked for the workflow to start. No tree is
//! created when one of them is returned.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Server does not understand ModelId = '{0}'")]
    UnknownModel(String),

    /// Tasks are leaves.
    #[error("Task '{0}' cannot have sub-processors")]
    TaskWithChildren(String),

    #[error("Task '{0}' does not name a work unit")]
    MissingWorkUnit(String),

    #[error("Workflow '{0}' has no sub-processors")]
    EmptyComposite(String),

    #[error("Workflow '{model_id}' requires {min_req} successful sub-processors but has {children}")]
    InvalidThreshold {
        model_id: String,
        min_req: i32,
        children: usize,
    },

    /// Callbacks and operator calls address nodes by model id.
    #[error("ModelId '{0}' appears more than once in the workflow")]
    DuplicateModelId(String),
}
