// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Processor trees: the recursive state machine behind every running workflow.
//!
//! A tree is built from a [`WorkflowGraph`](crate::model::WorkflowGraph) once
//! per workflow start. Its leaves are tasks bound to work units; its inner
//! nodes run their sub-processors one at a time (sequential) or all at once
//! (parallel), optionally gated by precondition and postcondition subtrees.
//! State flows bottom-up: a task's state change is queued as an event and the
//! parent's transition function decides what the parent does next.

mod builder;
mod node;
mod runnable;
mod transition;
mod tree;
mod view;

#[cfg(test)]
mod tests;

pub use builder::build_tree;
pub use node::{ChangeKind, NodeId, NodeKind, ProcessorInfo, ProcessorNode, Relation, TaskBinding};
pub use runnable::DEFAULT_BLOCK_TIME_ELAPSE_MINUTES;
pub use tree::{ChangeEvent, ProcessorTree, Verdict};
pub use view::{ProcessorSkeleton, ProcessorStub};
