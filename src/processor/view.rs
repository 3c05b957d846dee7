// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Read-only snapshots of processor nodes handed out by the engine.

use serde::{Deserialize, Serialize};

use crate::metadata::Metadata;
use crate::model::ExecutionType;
use crate::priority::Priority;
use crate::state::WorkflowState;

use super::node::{NodeId, ProcessorInfo};
use super::tree::ProcessorTree;

/// Flat summary of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorStub {
    pub instance_id: String,
    pub model_id: String,
    pub model_name: String,
    pub execution_type: ExecutionType,
    pub state: WorkflowState,
    pub priority: Priority,
    pub info: ProcessorInfo,
    pub job_id: Option<String>,
    pub times_blocked: u32,
}

/// A node with everything below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorSkeleton {
    pub stub: ProcessorStub,
    pub static_metadata: Metadata,
    pub dynamic_metadata: Metadata,
    pub excused: Vec<String>,
    pub min_req_successful: i32,
    pub is_condition: bool,
    pub pre_conditions: Option<Box<ProcessorSkeleton>>,
    pub post_conditions: Option<Box<ProcessorSkeleton>>,
    pub sub_processors: Vec<ProcessorSkeleton>,
}

impl ProcessorSkeleton {
    /// Depth-first search by model id, same order as tree lookup.
    pub fn find(&self, model_id: &str) -> Option<&ProcessorSkeleton> {
        if self.stub.model_id == model_id {
            return Some(self);
        }
        self.pre_conditions
            .as_deref()
            .and_then(|pre| pre.find(model_id))
            .or_else(|| self.sub_processors.iter().find_map(|s| s.find(model_id)))
            .or_else(|| self.post_conditions.as_deref().and_then(|post| post.find(model_id)))
    }
}

impl ProcessorTree {
    pub fn stub(&self, id: NodeId) -> ProcessorStub {
        let node = self.node(id);
        ProcessorStub {
            instance_id: self.instance_id().to_string(),
            model_id: node.model_id.clone(),
            model_name: node.model_name.clone(),
            execution_type: node.execution_type,
            state: node.state.clone(),
            priority: node.effective_priority(),
            info: node.info.clone(),
            job_id: node.job_id.clone(),
            times_blocked: node.times_blocked,
        }
    }

    pub fn skeleton(&self, id: NodeId) -> ProcessorSkeleton {
        let node = self.node(id);
        ProcessorSkeleton {
            stub: self.stub(id),
            static_metadata: node.static_metadata.clone(),
            dynamic_metadata: node.dynamic_metadata.clone(),
            excused: node.excused.iter().cloned().collect(),
            min_req_successful: node.min_req_successful,
            is_condition: node.is_condition,
            pre_conditions: node.pre_conditions.map(|pre| Box::new(self.skeleton(pre))),
            post_conditions: node.post_conditions.map(|post| Box::new(self.skeleton(post))),
            sub_processors: node.children.iter().map(|c| self.skeleton(*c)).collect(),
        }
    }

    /// Stubs for every node, in lookup order.
    pub fn stubs(&self) -> Vec<ProcessorStub> {
        self.pre_order(self.root())
            .into_iter()
            .map(|id| self.stub(id))
            .collect()
    }
}
