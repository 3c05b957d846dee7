// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod channel;
pub mod engine;
pub mod event;
pub mod repository;
pub mod runner;
pub mod work_unit;

pub use channel::CommunicationChannel;
pub use engine::WorkflowEngine;
pub use event::WorkflowEngineEvent;
pub use repository::{EventRepository, InstanceRepository, ModelRepository, ProcessorRepository};
pub use runner::{task_key, EngineRunner, TaskDispatch, TaskUpdate};
pub use work_unit::{TaskContext, TaskOutcome, WorkUnit};
