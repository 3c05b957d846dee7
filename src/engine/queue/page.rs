// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::metadata::Metadata;
use crate::page::ProcessedPageInfo;
use crate::processor::ProcessorStub;
use crate::state::{StateCategory, StateKind};

/// Which workflows a queue page lists. Filters look at each workflow's root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum PageFilter {
    All,
    State(StateKind),
    Category(StateCategory),
    ModelId(String),
    /// A workflow matches when, for any listed key, the first value of that
    /// key is one of the allowed values. Dynamic metadata is consulted before
    /// static metadata.
    Metadata(BTreeMap<String, Vec<String>>),
}

impl PageFilter {
    pub fn accepts(&self, root: &ProcessorStub, dynamic: &Metadata, static_metadata: &Metadata) -> bool {
        match self {
            PageFilter::All => true,
            PageFilter::State(kind) => root.state.is(*kind),
            PageFilter::Category(category) => root.state.in_category(*category),
            PageFilter::ModelId(model_id) => &root.model_id == model_id,
            PageFilter::Metadata(wanted) => wanted.iter().any(|(key, allowed)| {
                let value = if dynamic.contains_key(key) {
                    dynamic.get(key)
                } else {
                    static_metadata.get(key)
                };
                value.is_some_and(|value| allowed.iter().any(|a| a == value))
            }),
        }
    }
}

impl Default for PageFilter {
    fn default() -> Self {
        PageFilter::All
    }
}

/// One page of workflow roots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuePage {
    pub info: ProcessedPageInfo,
    pub stubs: Vec<ProcessorStub>,
    pub filter: PageFilter,
}

/// One page of queued or executing tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnablesPage {
    pub info: ProcessedPageInfo,
    pub stubs: Vec<ProcessorStub>,
}
