// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::RepositoryError;
use crate::metadata::Metadata;
use crate::model::{ExecutionType, WorkflowGraph};
use crate::page::PageInfo;
use crate::processor::ProcessorTree;
use crate::repository::{InstancePage, QueryExpression};
use crate::traits::WorkflowEngineEvent;

/// Source of workflow definitions.
#[async_trait]
pub trait ModelRepository: Send + Sync {
    /// Every graph whose node kinds are all in `supported`, keyed by model id.
    async fn load_graphs(&self, supported: &[ExecutionType]) -> Result<HashMap<String, WorkflowGraph>, RepositoryError>;
}

/// Per-execution metadata, keyed by job id.
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    async fn store_instance_metadata(&self, job_id: &str, metadata: Metadata) -> Result<(), RepositoryError>;

    async fn get_instance_metadata(&self, job_id: &str) -> Result<Option<Metadata>, RepositoryError>;

    /// Drops every entry recorded for one workflow instance. Returns how many.
    async fn remove_instance_metadatas(&self, instance_id: &str) -> Result<usize, RepositoryError>;

    async fn get_page(&self, page: PageInfo, query: Option<&QueryExpression>) -> Result<InstancePage, RepositoryError>;

    async fn get_next_page(&self, page: &InstancePage) -> Result<InstancePage, RepositoryError> {
        self.get_page(page.info.page_info().next(), page.query.as_ref()).await
    }
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn store_event(&self, event: Arc<dyn WorkflowEngineEvent>) -> Result<(), RepositoryError>;

    async fn get_event(&self, event_id: &str) -> Result<Option<Arc<dyn WorkflowEngineEvent>>, RepositoryError>;

    async fn event_ids(&self) -> Result<Vec<String>, RepositoryError>;
}

/// Snapshots of live processor trees, reloaded when an engine starts.
#[async_trait]
pub trait ProcessorRepository: Send + Sync {
    async fn store(&self, tree: &ProcessorTree) -> Result<(), RepositoryError>;

    async fn load_all(&self) -> Result<Vec<ProcessorTree>, RepositoryError>;

    async fn delete(&self, instance_id: &str) -> Result<(), RepositoryError>;
}
