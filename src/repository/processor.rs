// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::errors::RepositoryError;
use crate::processor::ProcessorTree;
use crate::traits::ProcessorRepository;

/// Snapshots kept in memory; they survive engine instances, not processes.
#[derive(Default)]
pub struct InMemoryProcessorRepository {
    trees: Mutex<BTreeMap<String, ProcessorTree>>,
}

impl InMemoryProcessorRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessorRepository for InMemoryProcessorRepository {
    async fn store(&self, tree: &ProcessorTree) -> Result<(), RepositoryError> {
        self.trees
            .lock()
            .await
            .insert(tree.instance_id().to_string(), tree.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<ProcessorTree>, RepositoryError> {
        Ok(self.trees.lock().await.values().cloned().collect())
    }

    async fn delete(&self, instance_id: &str) -> Result<(), RepositoryError> {
        self.trees.lock().await.remove(instance_id);
        Ok(())
    }
}

/// One JSON file per workflow instance, `<instance id>.json`.
///
/// Files are written beside their final name and renamed into place, so a
/// crash mid-write leaves the previous snapshot intact.
pub struct JsonFileProcessorRepository {
    dir: PathBuf,
}

impl JsonFileProcessorRepository {
    /// Creates `dir` if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RepositoryError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, instance_id: &str) -> PathBuf {
        self.dir.join(format!("{instance_id}.json"))
    }
}

#[async_trait]
impl ProcessorRepository for JsonFileProcessorRepository {
    async fn store(&self, tree: &ProcessorTree) -> Result<(), RepositoryError> {
        let path = self.path_for(tree.instance_id());
        let partial = path.with_extension("json.partial");
        let body = serde_json::to_vec_pretty(tree)?;
        tokio::fs::write(&partial, body)
            .await
            .map_err(|e| RepositoryError::io(&partial, e))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| RepositoryError::io(&path, e))
    }

    async fn load_all(&self) -> Result<Vec<ProcessorTree>, RepositoryError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| RepositoryError::io(&self.dir, e))?;
        let mut trees = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RepositoryError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let body = tokio::fs::read(&path)
                .await
                .map_err(|e| RepositoryError::io(&path, e))?;
            let tree: ProcessorTree = serde_json::from_slice(&body).map_err(|e| RepositoryError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;
            trees.push(tree);
        }
        trees.sort_by(|a, b| a.instance_id().cmp(b.instance_id()));
        Ok(trees)
    }

    async fn delete(&self, instance_id: &str) -> Result<(), RepositoryError> {
        let path = self.path_for(instance_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RepositoryError::io(&path, e)),
        }
    }
}
