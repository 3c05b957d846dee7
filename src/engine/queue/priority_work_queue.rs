// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Priority ordering over every task waiting for a runner slot.
//!
//! Tasks from all workflows share one heap. A task whose workflow is on hold
//! cannot be handed out, but it must not lose its place either, so it is
//! parked in a side table and returned to the heap once its workflow is
//! released. This keeps the common case (nothing on hold) a single heap pop.
//!
//! # Ordering
//!
//! 1. **Priority**: higher first. Task leaves already carry their fixed
//!    offset in the stub's effective priority.
//! 2. **Sequence**: earlier insertion first, so equal priorities are served
//!    in arrival order.
//!
//! # Examples
//!
//! ```rust
//! use std::collections::HashSet;
//! use wengine::engine::queue::{PrioritizedTask, PriorityWorkQueue};
//! use wengine::model::WorkflowGraph;
//! use wengine::priority::Priority;
//! use wengine::processor::build_tree;
//!
//! let tree = build_tree("i-1", &WorkflowGraph::task("ingest", "noop")).unwrap();
//! let stub = tree.stub(tree.root());
//!
//! let mut queue = PriorityWorkQueue::new();
//! queue.push(PrioritizedTask::new(stub.clone(), 0));
//! queue.push(PrioritizedTask::new(stub, 1).with_priority(Priority::HIGH));
//!
//! let held = HashSet::new();
//! let first = queue.pop_next_available(&held).unwrap();
//! assert_eq!(first.sequence, 1);
//! assert_eq!(queue.len(), 1);
//! ```

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::priority::Priority;
use crate::processor::ProcessorStub;

/// A task waiting in the runnable queue.
///
/// Identity is the `(instance id, model id)` pair; two entries for the same
/// task compare equal regardless of priority.
#[derive(Debug, Clone)]
pub struct PrioritizedTask {
    pub stub: ProcessorStub,
    pub priority: Priority,
    pub sequence: u64,
}

impl PrioritizedTask {
    pub fn new(stub: ProcessorStub, sequence: u64) -> Self {
        Self {
            priority: stub.priority,
            stub,
            sequence,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self.stub.priority = priority;
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.stub.instance_id
    }

    pub fn model_id(&self) -> &str {
        &self.stub.model_id
    }

    pub fn is(&self, instance_id: &str, model_id: &str) -> bool {
        self.instance_id() == instance_id && self.model_id() == model_id
    }
}

impl PartialEq for PrioritizedTask {
    fn eq(&self, other: &Self) -> bool {
        self.is(other.instance_id(), other.model_id())
    }
}

impl Eq for PrioritizedTask {}

impl PartialOrd for PrioritizedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PrioritizedTask {
    // Max-heap: higher priority pops first, then the lower sequence number.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Debug, Default)]
pub struct PriorityWorkQueue {
    heap: BinaryHeap<PrioritizedTask>,
    // Entries whose workflow was on hold when they reached the top.
    parked: HashMap<String, Vec<PrioritizedTask>>,
}

impl PriorityWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: PrioritizedTask) {
        self.heap.push(task);
    }

    pub fn extend<I>(&mut self, tasks: I)
    where
        I: IntoIterator<Item = PrioritizedTask>,
    {
        self.heap.extend(tasks);
    }

    /// Pops the best entry whose workflow is not in `held`.
    pub fn pop_next_available(&mut self, held: &HashSet<String>) -> Option<PrioritizedTask> {
        self.restore_released(held);

        while let Some(task) = self.heap.pop() {
            if !held.contains(task.instance_id()) {
                return Some(task);
            }
            self.parked
                .entry(task.instance_id().to_string())
                .or_default()
                .push(task);
        }
        None
    }

    fn restore_released(&mut self, held: &HashSet<String>) {
        let released: Vec<String> = self
            .parked
            .keys()
            .filter(|instance_id| !held.contains(*instance_id))
            .cloned()
            .collect();
        for instance_id in released {
            if let Some(tasks) = self.parked.remove(&instance_id) {
                self.heap.extend(tasks);
            }
        }
    }

    /// Changes the priority of a waiting entry. Returns `false` if the task is
    /// not queued.
    pub fn reprioritize(&mut self, instance_id: &str, model_id: &str, priority: Priority) -> bool {
        let mut found = false;
        if let Some(tasks) = self.parked.get_mut(instance_id) {
            for task in tasks.iter_mut().filter(|t| t.is(instance_id, model_id)) {
                *task = task.clone().with_priority(priority);
                found = true;
            }
        }
        if self.heap.iter().any(|t| t.is(instance_id, model_id)) {
            let entries = std::mem::take(&mut self.heap).into_vec();
            self.heap = entries
                .into_iter()
                .map(|t| {
                    if t.is(instance_id, model_id) {
                        t.with_priority(priority)
                    } else {
                        t
                    }
                })
                .collect();
            found = true;
        }
        found
    }

    /// Drops one entry. Returns `true` if it was queued.
    pub fn remove(&mut self, instance_id: &str, model_id: &str) -> bool {
        let before = self.len();
        if let Some(tasks) = self.parked.get_mut(instance_id) {
            tasks.retain(|t| !t.is(instance_id, model_id));
            if tasks.is_empty() {
                self.parked.remove(instance_id);
            }
        }
        self.heap.retain(|t| !t.is(instance_id, model_id));
        self.len() < before
    }

    /// Drops every entry of one workflow.
    pub fn remove_instance(&mut self, instance_id: &str) -> usize {
        let before = self.len();
        self.parked.remove(instance_id);
        self.heap.retain(|t| t.instance_id() != instance_id);
        before - self.len()
    }

    pub fn contains(&self, instance_id: &str, model_id: &str) -> bool {
        self.iter().any(|t| t.is(instance_id, model_id))
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty() && self.parked.is_empty()
    }

    pub fn peek(&self) -> Option<&PrioritizedTask> {
        self.heap.peek()
    }

    pub fn len(&self) -> usize {
        self.heap.len() + self.parked.values().map(Vec::len).sum::<usize>()
    }

    pub fn parked_len(&self) -> usize {
        self.parked.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &PrioritizedTask> + '_> {
        Box::new(self.heap.iter().chain(self.parked.values().flatten()))
    }

    /// Every entry in the order it would be handed out, parked entries last.
    pub fn ordered(&self) -> Vec<&PrioritizedTask> {
        let mut ready: Vec<&PrioritizedTask> = self.heap.iter().collect();
        ready.sort_by(|a, b| b.cmp(a));
        let mut parked: Vec<&PrioritizedTask> = self.parked.values().flatten().collect();
        parked.sort_by(|a, b| b.cmp(a));
        ready.extend(parked);
        ready
    }
}
