// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors surfaced by engine operations.
//!
//! Expected workflow outcomes (failed conditions, failed or blocked tasks) are
//! states, never errors. What remains here is contract violations such as an
//! unknown instance id, definitional errors from building a tree, collaborator
//! failures and remote-call failures.

use thiserror::Error;

use super::{ChannelError, GraphError, RepositoryError};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("No workflow instance with InstanceId = '{0}'")]
    UnknownInstance(String),

    #[error("Workflow '{instance_id}' has no processor with ModelId = '{model_id}'")]
    UnknownProcessor {
        instance_id: String,
        model_id: String,
    },

    #[error("Workflow instance '{0}' is already queued")]
    DuplicateInstance(String),

    #[error("Event {0} not registered with this server")]
    UnknownEvent(String),

    #[error("Event {0} did not pass its preconditions")]
    EventPreconditionFailed(String),

    #[error("No work unit registered as '{0}'")]
    UnknownWorkUnit(String),

    #[error("Runner has no open slot for task '{0}'")]
    NoOpenSlots(String),

    #[error("Runner is shut down")]
    RunnerShutdown,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Every failure of a remote call is reported through this one kind.
    #[error("Remote engine call failed: {0}")]
    Remote(#[from] ChannelError),

    #[error("Engine is shut down")]
    Shutdown,
}

pub type EngineResult<T> = Result<T, EngineError>;
