// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::errors::RepositoryError;
use crate::model::{ExecutionType, WorkflowGraph};
use crate::traits::ModelRepository;

/// True when every node of `graph`, conditions included, is of a supported kind.
fn uses_only(graph: &WorkflowGraph, supported: &[ExecutionType]) -> bool {
    supported.contains(&graph.execution_type)
        && graph.children.iter().all(|c| uses_only(c, supported))
        && graph.pre_conditions.as_deref().map_or(true, |c| uses_only(c, supported))
        && graph.post_conditions.as_deref().map_or(true, |c| uses_only(c, supported))
}

fn supported_only(graphs: impl IntoIterator<Item = WorkflowGraph>, supported: &[ExecutionType]) -> HashMap<String, WorkflowGraph> {
    graphs
        .into_iter()
        .filter(|graph| uses_only(graph, supported))
        .map(|graph| (graph.id.clone(), graph))
        .collect()
}

/// Models held in memory, mostly for tests and embedding.
#[derive(Default)]
pub struct InMemoryModelRepository {
    graphs: RwLock<HashMap<String, WorkflowGraph>>,
}

impl InMemoryModelRepository {
    pub fn new(graphs: impl IntoIterator<Item = WorkflowGraph>) -> Self {
        Self {
            graphs: RwLock::new(graphs.into_iter().map(|g| (g.id.clone(), g)).collect()),
        }
    }

    /// Adds or replaces a model; engines see it after their next refresh.
    pub async fn insert(&self, graph: WorkflowGraph) {
        self.graphs.write().await.insert(graph.id.clone(), graph);
    }
}

#[async_trait]
impl ModelRepository for InMemoryModelRepository {
    async fn load_graphs(&self, supported: &[ExecutionType]) -> Result<HashMap<String, WorkflowGraph>, RepositoryError> {
        let graphs = self.graphs.read().await;
        Ok(supported_only(graphs.values().cloned(), supported))
    }
}

/// One model per `.yaml`/`.yml` file in a directory.
pub struct YamlModelRepository {
    dir: PathBuf,
}

impl YamlModelRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ModelRepository for YamlModelRepository {
    async fn load_graphs(&self, supported: &[ExecutionType]) -> Result<HashMap<String, WorkflowGraph>, RepositoryError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| RepositoryError::io(&self.dir, e))?;
        let mut graphs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RepositoryError::io(&self.dir, e))?
        {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yaml" || ext == "yml");
            if !is_yaml {
                continue;
            }
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| RepositoryError::io(&path, e))?;
            let graph: WorkflowGraph = serde_yaml::from_str(&content).map_err(|e| RepositoryError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;
            graphs.push(graph);
        }
        Ok(supported_only(graphs, supported))
    }
}
