// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::errors::RepositoryError;
use crate::metadata::{keys, Metadata};
use crate::page::{PageInfo, ProcessedPageInfo};
use crate::traits::InstanceRepository;

/// A small boolean query over instance metadata.
///
/// ```
/// use wengine::metadata::Metadata;
/// use wengine::repository::QueryExpression;
///
/// let failed_archives = QueryExpression::and(vec![
///     QueryExpression::term("ModelId", "archive"),
///     QueryExpression::not(QueryExpression::term("State", "Success")),
/// ]);
///
/// let metadata: Metadata = [("ModelId", "archive"), ("State", "Failure")].into_iter().collect();
/// assert!(failed_archives.matches(&metadata));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryExpression {
    /// `key` holds `value` among its values.
    Term { key: String, value: String },
    And(Vec<QueryExpression>),
    Or(Vec<QueryExpression>),
    Not(Box<QueryExpression>),
}

impl QueryExpression {
    pub fn term(key: impl Into<String>, value: impl Into<String>) -> Self {
        QueryExpression::Term {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn and(terms: Vec<QueryExpression>) -> Self {
        QueryExpression::And(terms)
    }

    pub fn or(terms: Vec<QueryExpression>) -> Self {
        QueryExpression::Or(terms)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: QueryExpression) -> Self {
        QueryExpression::Not(Box::new(inner))
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            QueryExpression::Term { key, value } => metadata.get_all(key).iter().any(|v| v == value),
            QueryExpression::And(terms) => terms.iter().all(|t| t.matches(metadata)),
            QueryExpression::Or(terms) => terms.iter().any(|t| t.matches(metadata)),
            QueryExpression::Not(inner) => !inner.matches(metadata),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceEntry {
    pub job_id: String,
    pub metadata: Metadata,
}

/// One page of instance metadata, carrying the query that produced it so the
/// next page can be asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstancePage {
    pub info: ProcessedPageInfo,
    pub entries: Vec<InstanceEntry>,
    pub query: Option<QueryExpression>,
}

/// Instance metadata in memory, listed in job id order.
#[derive(Default)]
pub struct InMemoryInstanceRepository {
    entries: RwLock<BTreeMap<String, Metadata>>,
}

impl InMemoryInstanceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstanceRepository for InMemoryInstanceRepository {
    async fn store_instance_metadata(&self, job_id: &str, metadata: Metadata) -> Result<(), RepositoryError> {
        self.entries.write().await.insert(job_id.to_string(), metadata);
        Ok(())
    }

    async fn get_instance_metadata(&self, job_id: &str) -> Result<Option<Metadata>, RepositoryError> {
        Ok(self.entries.read().await.get(job_id).cloned())
    }

    async fn remove_instance_metadatas(&self, instance_id: &str) -> Result<usize, RepositoryError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, metadata| metadata.get(keys::INSTANCE_ID) != Some(instance_id));
        Ok(before - entries.len())
    }

    async fn get_page(&self, page: PageInfo, query: Option<&QueryExpression>) -> Result<InstancePage, RepositoryError> {
        let entries = self.entries.read().await;
        let hits: Vec<InstanceEntry> = entries
            .iter()
            .filter(|(_, metadata)| query.map_or(true, |q| q.matches(metadata)))
            .map(|(job_id, metadata)| InstanceEntry {
                job_id: job_id.clone(),
                metadata: metadata.clone(),
            })
            .collect();
        Ok(InstancePage {
            info: ProcessedPageInfo::new(page, hits.len()),
            entries: page.slice(&hits),
            query: query.cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(instance_id: &str, model_id: &str, state: &str) -> Metadata {
        [
            (keys::INSTANCE_ID, instance_id),
            (keys::MODEL_ID, model_id),
            (keys::STATE, state),
        ]
        .into_iter()
        .collect()
    }

    async fn seeded() -> InMemoryInstanceRepository {
        let repository = InMemoryInstanceRepository::new();
        repository.store_instance_metadata("job-1", entry("i-1", "stage", "Success")).await.unwrap();
        repository.store_instance_metadata("job-2", entry("i-1", "archive", "Failure")).await.unwrap();
        repository.store_instance_metadata("job-3", entry("i-2", "stage", "Success")).await.unwrap();
        repository
    }

    #[test]
    fn test_query_expressions() {
        let metadata = entry("i-1", "stage", "Success");
        assert!(QueryExpression::term(keys::MODEL_ID, "stage").matches(&metadata));
        assert!(!QueryExpression::term(keys::MODEL_ID, "archive").matches(&metadata));
        assert!(QueryExpression::or(vec![
            QueryExpression::term(keys::MODEL_ID, "archive"),
            QueryExpression::term(keys::STATE, "Success"),
        ])
        .matches(&metadata));
        assert!(!QueryExpression::and(vec![
            QueryExpression::term(keys::MODEL_ID, "stage"),
            QueryExpression::not(QueryExpression::term(keys::STATE, "Success")),
        ])
        .matches(&metadata));
        // an empty conjunction matches everything
        assert!(QueryExpression::and(vec![]).matches(&Metadata::new()));
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let repository = seeded().await;
        let stored = repository.get_instance_metadata("job-2").await.unwrap().unwrap();
        assert_eq!(stored.get(keys::MODEL_ID), Some("archive"));
        assert!(repository.get_instance_metadata("job-9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_by_instance() {
        let repository = seeded().await;
        assert_eq!(repository.remove_instance_metadatas("i-1").await.unwrap(), 2);
        assert_eq!(repository.remove_instance_metadatas("i-1").await.unwrap(), 0);
        let page = repository.get_page(PageInfo::first(10), None).await.unwrap();
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].job_id, "job-3");
    }

    #[tokio::test]
    async fn test_query_pages_follow_the_cursor() {
        let repository = seeded().await;
        let query = QueryExpression::term(keys::STATE, "Success");
        let first = repository.get_page(PageInfo::first(1), Some(&query)).await.unwrap();
        assert_eq!(first.info.total_hits, 2);
        assert_eq!(first.entries[0].job_id, "job-1");

        let second = repository.get_next_page(&first).await.unwrap();
        assert_eq!(second.entries[0].job_id, "job-3");
        assert!(second.info.is_last_page());

        let past_end = repository.get_next_page(&second).await.unwrap();
        assert!(past_end.entries.is_empty());
    }
}
