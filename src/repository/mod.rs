// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Storage collaborators of the engine: models, instance metadata, events
//! and processor snapshots. Each comes with an in-memory implementation;
//! models and snapshots also have a file-backed one.

mod event;
mod instance;
mod model;
mod processor;

pub use event::InMemoryEventRepository;
pub use instance::{InMemoryInstanceRepository, InstanceEntry, InstancePage, QueryExpression};
pub use model::{InMemoryModelRepository, YamlModelRepository};
pub use processor::{InMemoryProcessorRepository, JsonFileProcessorRepository};
