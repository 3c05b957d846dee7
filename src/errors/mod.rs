// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod channel;
mod config;
mod engine;
mod graph;
mod repository;

pub use channel::ChannelError;
pub use config::ConfigError;
pub use engine::{EngineError, EngineResult};
pub use graph::GraphError;
pub use repository::RepositoryError;
