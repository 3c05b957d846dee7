// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use crate::metadata::{keys, Metadata};
use crate::model::ExecutionType;
use crate::priority::{Priority, TASK_PRIORITY_OFFSET};
use crate::state::WorkflowState;

/// Index of a node inside its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a node hangs off its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    PreCondition,
    SubProcessor,
    PostCondition,
}

/// What changed on a node. Only `State` drives the parent's transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    State,
    Priority,
    DynamicMetadata,
    StaticMetadata,
    ExcusedSubProcessors,
}

/// The work unit a task leaf is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBinding {
    pub work_unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Task(TaskBinding),
    /// One child at a time, in order.
    Sequential,
    /// Every unfinished child at once.
    Parallel,
}

impl NodeKind {
    pub fn is_task(&self) -> bool {
        matches!(self, NodeKind::Task(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorInfo {
    pub creation_date: DateTime<Utc>,
    pub ready_date: Option<DateTime<Utc>>,
    pub execution_date: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
}

impl ProcessorInfo {
    pub fn new() -> Self {
        Self {
            creation_date: Utc::now(),
            ready_date: None,
            execution_date: None,
            completion_date: None,
        }
    }
}

impl Default for ProcessorInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorNode {
    pub(crate) id: NodeId,
    pub(crate) model_id: String,
    pub(crate) model_name: String,
    pub(crate) execution_type: ExecutionType,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<(NodeId, Relation)>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) pre_conditions: Option<NodeId>,
    pub(crate) post_conditions: Option<NodeId>,
    pub(crate) state: WorkflowState,
    pub(crate) priority: Priority,
    pub(crate) static_metadata: Metadata,
    pub(crate) dynamic_metadata: Metadata,
    pub(crate) excused: BTreeSet<String>,
    pub(crate) min_req_successful: i32,
    pub(crate) is_condition: bool,
    pub(crate) times_blocked: u32,
    pub(crate) info: ProcessorInfo,
    pub(crate) job_id: Option<String>,
}

impl ProcessorNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn execution_type(&self) -> ExecutionType {
        self.execution_type
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_task(&self) -> bool {
        self.kind.is_task()
    }

    pub fn work_unit(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Task(binding) => Some(&binding.work_unit),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<(NodeId, Relation)> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn pre_conditions(&self) -> Option<NodeId> {
        self.pre_conditions
    }

    pub fn post_conditions(&self) -> Option<NodeId> {
        self.post_conditions
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Assigned priority.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Priority used for scheduling; tasks sit just above their assigned level.
    pub fn effective_priority(&self) -> Priority {
        if self.is_task() {
            self.priority.with_offset(TASK_PRIORITY_OFFSET)
        } else {
            self.priority
        }
    }

    pub fn static_metadata(&self) -> &Metadata {
        &self.static_metadata
    }

    pub fn dynamic_metadata(&self) -> &Metadata {
        &self.dynamic_metadata
    }

    /// Dynamic metadata without the node-local keys.
    pub fn pass_through_metadata(&self) -> Metadata {
        let mut pass_through = self.dynamic_metadata.clone();
        let listed: Vec<String> = self
            .dynamic_metadata
            .get_all(keys::LOCAL_KEYS)
            .iter()
            .chain(self.static_metadata.get_all(keys::LOCAL_KEYS))
            .cloned()
            .collect();
        for key in listed {
            pass_through.remove(&key);
        }
        pass_through.remove_group(keys::LOCAL_KEYS_GROUP);
        pass_through
    }

    pub fn excused(&self) -> &BTreeSet<String> {
        &self.excused
    }

    pub fn is_excused(&self, model_id: &str) -> bool {
        self.excused.contains(model_id)
    }

    pub fn min_req_successful(&self) -> i32 {
        self.min_req_successful
    }

    pub fn is_condition(&self) -> bool {
        self.is_condition
    }

    pub fn times_blocked(&self) -> u32 {
        self.times_blocked
    }

    pub fn info(&self) -> &ProcessorInfo {
        &self.info
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_node() -> ProcessorNode {
        ProcessorNode {
            id: NodeId(0),
            model_id: "t".into(),
            model_name: "t".into(),
            execution_type: ExecutionType::Task,
            kind: NodeKind::Task(TaskBinding { work_unit: "noop".into() }),
            parent: None,
            children: Vec::new(),
            pre_conditions: None,
            post_conditions: None,
            state: WorkflowState::default(),
            priority: Priority::MEDIUM,
            static_metadata: Metadata::new(),
            dynamic_metadata: Metadata::new(),
            excused: BTreeSet::new(),
            min_req_successful: -1,
            is_condition: false,
            times_blocked: 0,
            info: ProcessorInfo::new(),
            job_id: None,
        }
    }

    #[test]
    fn test_task_priority_carries_offset() {
        let node = task_node();
        assert_eq!(node.effective_priority(), Priority::new(5.0 + TASK_PRIORITY_OFFSET));
        assert_eq!(node.priority(), Priority::MEDIUM);
    }

    #[test]
    fn test_pass_through_drops_local_group_and_listed_keys() {
        let mut node = task_node();
        node.dynamic_metadata.replace("Keep", "1");
        node.dynamic_metadata.replace("Scratch", "2");
        node.dynamic_metadata.replace("WorkflowProcessor/Local/Temp", "3");
        node.dynamic_metadata.replace(keys::LOCAL_KEYS, "Scratch");

        let pass = node.pass_through_metadata();
        assert_eq!(pass.keys().collect::<Vec<_>>(), vec!["Keep"]);
    }
}
