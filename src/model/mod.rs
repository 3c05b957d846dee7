// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Workflow model definitions.
//!
//! A [`WorkflowGraph`] is the template a processor tree is built from, once per
//! workflow start. Graphs are plain data and deserialize from YAML:
//!
//! ```yaml
//! id: ingest
//! name: Ingest granule
//! execution_type: sequential
//! static_metadata:
//!   BlockTimeElapse: 1
//! pre_conditions:
//!   id: ingest-ready
//!   execution_type: condition
//!   children:
//!     - id: check-disk
//!       execution_type: task
//!       work_unit: noop
//! children:
//!   - id: stage
//!     execution_type: task
//!     work_unit: noop
//!   - id: archive
//!     execution_type: task
//!     work_unit: noop
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::metadata::Metadata;

/// How a node composes its sub-processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    Task,
    Sequential,
    Parallel,
    Condition,
}

impl ExecutionType {
    pub const ALL: [ExecutionType; 4] = [
        ExecutionType::Task,
        ExecutionType::Sequential,
        ExecutionType::Parallel,
        ExecutionType::Condition,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExecutionType::Task => "task",
            ExecutionType::Sequential => "sequential",
            ExecutionType::Parallel => "parallel",
            ExecutionType::Condition => "condition",
        }
    }
}

impl Display for ExecutionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn all_must_succeed() -> i32 {
    -1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    /// Model id of the node built from this graph.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub execution_type: ExecutionType,
    /// Work unit identifier, tasks only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_unit: Option<String>,
    #[serde(default)]
    pub static_metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<WorkflowGraph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_conditions: Option<Box<WorkflowGraph>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_conditions: Option<Box<WorkflowGraph>>,
    /// Child model ids whose failure does not fail this node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excused: Vec<String>,
    #[serde(default = "all_must_succeed")]
    pub min_req_successful: i32,
}

impl WorkflowGraph {
    pub fn task(id: impl Into<String>, work_unit: impl Into<String>) -> Self {
        Self {
            work_unit: Some(work_unit.into()),
            ..Self::composite(id, ExecutionType::Task, Vec::new())
        }
    }

    pub fn sequential(id: impl Into<String>, children: Vec<WorkflowGraph>) -> Self {
        Self::composite(id, ExecutionType::Sequential, children)
    }

    pub fn parallel(id: impl Into<String>, children: Vec<WorkflowGraph>) -> Self {
        Self::composite(id, ExecutionType::Parallel, children)
    }

    pub fn condition(id: impl Into<String>, children: Vec<WorkflowGraph>) -> Self {
        Self::composite(id, ExecutionType::Condition, children)
    }

    fn composite(id: impl Into<String>, execution_type: ExecutionType, children: Vec<WorkflowGraph>) -> Self {
        Self {
            id: id.into(),
            name: None,
            execution_type,
            work_unit: None,
            static_metadata: Metadata::new(),
            children,
            pre_conditions: None,
            post_conditions: None,
            excused: Vec::new(),
            min_req_successful: all_must_succeed(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_pre_conditions(mut self, conditions: WorkflowGraph) -> Self {
        self.pre_conditions = Some(Box::new(conditions));
        self
    }

    pub fn with_post_conditions(mut self, conditions: WorkflowGraph) -> Self {
        self.post_conditions = Some(Box::new(conditions));
        self
    }

    pub fn with_static(mut self, key: &str, value: impl Into<String>) -> Self {
        self.static_metadata.replace(key, value);
        self
    }

    pub fn with_excused(mut self, model_id: impl Into<String>) -> Self {
        self.excused.push(model_id.into());
        self
    }

    pub fn with_min_req_successful(mut self, min_req: i32) -> Self {
        self.min_req_successful = min_req;
        self
    }

    /// Display name, falling back to the model id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_yaml_model() {
        let yaml = r#"
id: ingest
execution_type: sequential
static_metadata:
  BlockTimeElapse: 1
pre_conditions:
  id: ready
  execution_type: condition
  children:
    - id: check
      execution_type: task
      work_unit: noop
children:
  - id: stage
    execution_type: task
    work_unit: noop
  - id: archive
    execution_type: task
    work_unit: noop
excused: [archive]
min_req_successful: 1
"#;
        let graph: WorkflowGraph = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(graph.execution_type, ExecutionType::Sequential);
        assert_eq!(graph.children.len(), 2);
        assert_eq!(graph.children[1].work_unit.as_deref(), Some("noop"));
        assert_eq!(graph.pre_conditions.as_ref().map(|p| p.execution_type), Some(ExecutionType::Condition));
        assert_eq!(graph.static_metadata.get("BlockTimeElapse"), Some("1"));
        assert_eq!(graph.excused, vec!["archive".to_string()]);
        assert_eq!(graph.min_req_successful, 1);
        assert_eq!(graph.display_name(), "ingest");
    }

    #[test]
    fn test_threshold_defaults_to_all() {
        let graph: WorkflowGraph = serde_yaml::from_str("id: t\nexecution_type: task\nwork_unit: noop\n").unwrap();
        assert_eq!(graph.min_req_successful, -1);
        assert_eq!(graph, WorkflowGraph::task("t", "noop"));
    }
}
