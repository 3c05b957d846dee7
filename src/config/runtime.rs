// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::{EngineBuilder, LocalWorkflowEngine};
use crate::errors::EngineResult;
use crate::repository::{JsonFileProcessorRepository, YamlModelRepository};

/// Wires an engine from configuration.
///
/// `model_dir` selects a [`YamlModelRepository`] and `processor_store_dir` a
/// [`JsonFileProcessorRepository`]. Without them the engine keeps everything
/// in memory.
///
/// # Examples
///
/// ```
/// use wengine::config::{EngineConfig, RuntimeBuilder};
/// use wengine::traits::WorkflowEngine;
///
/// # #[tokio::main]
/// # async fn main() {
/// let engine = RuntimeBuilder::start(EngineConfig::default()).await.unwrap();
/// assert_eq!(engine.get_num_of_workflows().await.unwrap(), 0);
/// engine.shutdown().await.unwrap();
/// # }
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// An [`EngineBuilder`] with the configured repositories in place, for
    /// callers that still want to register work units or swap the runner.
    pub async fn from_config(cfg: EngineConfig) -> EngineResult<EngineBuilder> {
        let mut builder = EngineBuilder::new(cfg.clone());
        if let Some(dir) = &cfg.model_dir {
            builder = builder.with_model_repository(Arc::new(YamlModelRepository::new(dir)));
        }
        if let Some(dir) = &cfg.processor_store_dir {
            let store = JsonFileProcessorRepository::open(dir).await?;
            builder = builder.with_processor_repository(Arc::new(store));
        }
        Ok(builder)
    }

    pub async fn start(cfg: EngineConfig) -> EngineResult<LocalWorkflowEngine> {
        Self::from_config(cfg).await?.start().await
    }
}
