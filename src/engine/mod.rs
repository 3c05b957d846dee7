// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The workflow engine: queue manager, runner, driver loop and the remote
//! client that speaks to an engine over a [`crate::traits::CommunicationChannel`].

pub mod channel;
pub mod client;
pub mod event;
pub mod local;
pub mod queue;
pub mod runner;


pub use channel::{dispatch, EngineRequest, EngineResponse, LoopbackChannel};
pub use client::WorkflowEngineClient;
pub use event::StartWorkflowEvent;
pub use local::{EngineBuilder, LocalWorkflowEngine};
pub use queue::{PageFilter, QueueManager, QueuePage, RunnablesPage};
pub use runner::LocalEngineRunner;
