// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Arena-backed processor tree.
//!
//! Every node of one workflow instance lives in a single `Vec`, addressed by
//! [`NodeId`]. Parents point at children by id and children point back at
//! their parent by id, so the structure never holds a reference cycle.
//!
//! Mutations never call into other nodes directly. They append a
//! [`ChangeEvent`] to the tree's pending queue; [`ProcessorTree::drain`] then
//! feeds each state change to the parent's transition function, which may in
//! turn queue more events further up. Callers hold the tree's lock across a
//! mutation and the drain that follows it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

use crate::metadata::Metadata;
use crate::priority::Priority;
use crate::state::{StateCategory, StateKind, WorkflowState};

use super::node::{ChangeKind, NodeId, NodeKind, ProcessorNode};

/// A queued notification that `source` changed.
///
/// `state` is the source's state at the moment of the change, so that parents
/// react to the sequence of states their children went through even when
/// several changes land before a drain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub source: NodeId,
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<WorkflowState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorTree {
    instance_id: String,
    pub(crate) nodes: Vec<ProcessorNode>,
    root: NodeId,
    #[serde(skip)]
    pub(crate) pending: VecDeque<ChangeEvent>,
    /// State changes that reached a parent while it was on hold.
    #[serde(default)]
    pub(crate) deferred: Vec<ChangeEvent>,
}

impl ProcessorTree {
    pub(crate) fn from_parts(instance_id: String, nodes: Vec<ProcessorNode>, root: NodeId) -> Self {
        Self {
            instance_id,
            nodes,
            root,
            pending: VecDeque::new(),
            deferred: Vec::new(),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_node(&self) -> &ProcessorNode {
        self.node(self.root)
    }

    pub fn node(&self, id: NodeId) -> &ProcessorNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ProcessorNode {
        &mut self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ProcessorNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn state(&self, id: NodeId) -> &WorkflowState {
        &self.node(id).state
    }

    /// Pre-order lookup: the node, its preconditions, its sub-processors, then
    /// its postconditions. The first match wins.
    pub fn find(&self, model_id: &str) -> Option<NodeId> {
        self.pre_order(self.root)
            .into_iter()
            .find(|id| self.node(*id).model_id == model_id)
    }

    /// `id` followed by everything below it, in lookup order.
    pub fn pre_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            let node = self.node(current);
            if let Some(post) = node.post_conditions {
                stack.push(post);
            }
            stack.extend(node.children.iter().rev().copied());
            if let Some(pre) = node.pre_conditions {
                stack.push(pre);
            }
        }
        out
    }

    /// Sub-processors, preconditions and postconditions of `id`.
    pub(crate) fn subordinates(&self, id: NodeId) -> Vec<NodeId> {
        let node = self.node(id);
        node.children
            .iter()
            .copied()
            .chain(node.pre_conditions)
            .chain(node.post_conditions)
            .collect()
    }

    /// Ids of the nodes that are leaf tasks.
    pub fn tasks(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().filter(|n| n.is_task()).map(|n| n.id)
    }

    fn emit(&mut self, source: NodeId, kind: ChangeKind) {
        self.pending.push_back(ChangeEvent {
            source,
            kind,
            state: None,
        });
    }

    // ---- state ---------------------------------------------------------

    /// Replaces the node's state and notifies its parent.
    ///
    /// A revertable state given without a remembered state remembers the one
    /// it replaces.
    pub fn set_state(&mut self, id: NodeId, state: WorkflowState) {
        let state = self.remembering(id, state);
        self.apply_state(id, state, true);
    }

    /// Operator variant: `id` and every node below it take `state`. Only `id`
    /// itself notifies its parent; the descendants change silently.
    pub fn set_state_recur(&mut self, id: NodeId, state: WorkflowState) {
        let mut below = self.pre_order(id);
        below.reverse();
        below.pop();
        for node in below {
            let state = self.remembering(node, state.clone());
            self.apply_state(node, state, false);
        }
        self.set_state(id, state);
    }

    /// Restores the state remembered by a revertable state. Returns `false`
    /// when there is nothing to restore.
    pub fn revert_state(&mut self, id: NodeId) -> bool {
        let current = &self.node(id).state;
        if !current.kind().is_revertable() {
            return false;
        }
        let Some(previous) = current.resume_previous() else {
            return false;
        };
        self.apply_state(id, previous, true);
        self.replay_deferred();
        true
    }

    /// Reverts `id` and every node below it that holds a revertable state.
    pub fn revert_state_recur(&mut self, id: NodeId) -> bool {
        let mut reverted = false;
        for node in self.pre_order(id).into_iter().rev() {
            reverted |= self.revert_state(node);
        }
        reverted
    }

    fn remembering(&self, id: NodeId, state: WorkflowState) -> WorkflowState {
        if state.kind().is_revertable() && state.previous().is_none() {
            let current = self.node(id).state.clone();
            WorkflowState::with_previous(state.kind(), state.message().to_string(), current)
        } else {
            state
        }
    }

    pub(crate) fn apply_state(&mut self, id: NodeId, state: WorkflowState, notify: bool) {
        let mut state = state;
        if state.is(StateKind::ExecutionComplete) {
            if self.passed_post(id) {
                state = WorkflowState::new(
                    StateKind::Success,
                    reason("No postconditions left to evaluate", state.message()),
                );
            } else if let Some(post) = self.node(id).post_conditions {
                let dynamic = self.node(id).dynamic_metadata.clone();
                self.set_dynamic_metadata_recur(post, dynamic);
            }
        }

        let node = self.node_mut(id);
        if node.state.same_as(&state) {
            return;
        }
        if state.is(StateKind::Blocked) && !node.state.is(StateKind::Blocked) {
            node.times_blocked += 1;
        }
        let now = state.entered_at();
        match state.kind() {
            StateKind::WaitingOnResources
                if state.previous().is_some_and(|p| p.is(StateKind::Executing)) =>
            {
                node.info.ready_date = Some(now);
            }
            StateKind::Executing => node.info.execution_date = Some(now),
            kind if kind.category() == StateCategory::Done => node.info.completion_date = Some(now),
            _ => {}
        }
        node.state = state.clone();
        if notify {
            self.pending.push_back(ChangeEvent {
                source: id,
                kind: ChangeKind::State,
                state: Some(state),
            });
        }
    }

    // ---- priority ------------------------------------------------------

    pub fn set_priority(&mut self, id: NodeId, priority: Priority) {
        self.node_mut(id).priority = priority;
        self.emit(id, ChangeKind::Priority);
    }

    /// Every node below `id` first, then `id`.
    pub fn set_priority_recur(&mut self, id: NodeId, priority: Priority) {
        for node in self.subordinates(id) {
            self.set_priority_recur(node, priority);
        }
        self.set_priority(id, priority);
    }

    // ---- metadata ------------------------------------------------------

    pub fn set_dynamic_metadata(&mut self, id: NodeId, metadata: Metadata) {
        self.node_mut(id).dynamic_metadata = metadata;
        self.emit(id, ChangeKind::DynamicMetadata);
    }

    /// Sub-processors, preconditions and postconditions first, then `id`.
    pub fn set_dynamic_metadata_recur(&mut self, id: NodeId, metadata: Metadata) {
        for node in self.subordinates(id) {
            self.set_dynamic_metadata_recur(node, metadata.clone());
        }
        self.set_dynamic_metadata(id, metadata);
    }

    /// Like [`Self::set_dynamic_metadata_recur`] but leaves the preconditions alone.
    pub fn set_dynamic_metadata_recur_only_sub_processors(&mut self, id: NodeId, metadata: Metadata) {
        let node = self.node(id);
        let targets: Vec<NodeId> = node.children.iter().copied().chain(node.post_conditions).collect();
        for target in targets {
            self.set_dynamic_metadata_recur(target, metadata.clone());
        }
        self.set_dynamic_metadata(id, metadata);
    }

    pub fn set_static_metadata(&mut self, id: NodeId, metadata: Metadata) {
        self.node_mut(id).static_metadata = metadata;
        self.emit(id, ChangeKind::StaticMetadata);
    }

    pub fn set_static_metadata_recur(&mut self, id: NodeId, metadata: Metadata) {
        for node in self.subordinates(id) {
            self.set_static_metadata_recur(node, metadata.clone());
        }
        self.set_static_metadata(id, metadata);
    }

    pub fn set_excused(&mut self, id: NodeId, excused: BTreeSet<String>) {
        self.node_mut(id).excused = excused;
        self.emit(id, ChangeKind::ExcusedSubProcessors);
    }

    pub fn set_job_id(&mut self, id: NodeId, job_id: impl Into<String>) {
        self.node_mut(id).job_id = Some(job_id.into());
    }

    // ---- notification --------------------------------------------------

    /// Processes queued change events until none are left and returns them in
    /// the order they were handled.
    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        let mut handled = Vec::new();
        while let Some(event) = self.pending.pop_front() {
            if event.kind == ChangeKind::State {
                self.notify_parent(&event);
            }
            handled.push(event);
        }
        handled
    }

    /// True when events are waiting for [`Self::drain`].
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn notify_parent(&mut self, event: &ChangeEvent) {
        let Some((parent, relation)) = self.node(event.source).parent else {
            return;
        };
        let Some(source_state) = event.state.clone() else {
            return;
        };
        if self.node(parent).state.in_category(StateCategory::Holding) {
            self.deferred.retain(|d| d.source != event.source);
            self.deferred.push(event.clone());
            return;
        }
        if self.node(parent).is_condition {
            self.on_condition_child_changed(parent, event.source, relation, &source_state);
        } else {
            self.on_child_changed(parent, event.source, relation, &source_state);
        }
    }

    /// Re-delivers held events with the source's current state.
    fn replay_deferred(&mut self) {
        for event in std::mem::take(&mut self.deferred) {
            let state = self.node(event.source).state.clone();
            self.pending.push_back(ChangeEvent {
                state: Some(state),
                ..event
            });
        }
    }

    // ---- queries -------------------------------------------------------

    pub fn passed_pre(&self, id: NodeId) -> bool {
        self.node(id)
            .pre_conditions
            .map_or(true, |pre| self.node(pre).state.is(StateKind::Success))
    }

    pub fn passed_post(&self, id: NodeId) -> bool {
        self.node(id)
            .post_conditions
            .map_or(true, |post| self.node(post).state.is(StateKind::Success))
    }

    /// Work remains once the preconditions pass: a task body, sub-processors
    /// or postconditions not yet passed.
    pub fn has_further_work(&self, id: NodeId) -> bool {
        let node = self.node(id);
        node.is_task() || !node.children.is_empty() || !self.passed_post(id)
    }

    /// Some sub-processor is blocked and none is making progress.
    pub fn is_blocked(&self, id: NodeId) -> bool {
        let children = &self.node(id).children;
        children.iter().any(|c| self.node(*c).state.is(StateKind::Blocked))
            && children.iter().all(|c| {
                let state = &self.node(*c).state;
                state.is(StateKind::Blocked) || state.is(StateKind::Queued) || state.is_done()
            })
    }

    pub fn any_child_running(&self, id: NodeId) -> bool {
        self.node(id)
            .children
            .iter()
            .any(|c| self.node(*c).state.is_running())
    }

    pub(crate) fn first_unfinished_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .find(|c| !self.node(*c).state.is_done())
    }

    /// Completion verdict over the ordinary sub-processors of `id`.
    pub fn verdict(&self, id: NodeId) -> Verdict {
        let node = self.node(id);
        let children: Vec<&ProcessorNode> = node.children.iter().map(|c| self.node(*c)).collect();
        if !children.iter().any(|c| c.state.is_done()) {
            return Verdict::Inconclusive;
        }
        let failed = children
            .iter()
            .filter(|c| c.state.is(StateKind::Failure) && !node.is_excused(&c.model_id))
            .count();
        if node.min_req_successful != -1 {
            let allowed = children.len() as i64 - i64::from(node.min_req_successful);
            if failed as i64 > allowed {
                return Verdict::Failure;
            }
        } else if failed > 0 {
            return Verdict::Failure;
        }
        if children.iter().all(|c| c.state.is_done()) {
            Verdict::Success
        } else {
            Verdict::Inconclusive
        }
    }

    /// Folds a finished child's pass-through metadata into its parent.
    pub(crate) fn absorb_child_metadata(&mut self, parent: NodeId, child: NodeId) {
        let pass_through = self.node(child).pass_through_metadata();
        match self.node(parent).kind {
            NodeKind::Sequential => {
                self.set_dynamic_metadata(parent, pass_through);
                if let Some(next) = self.first_unfinished_child(parent) {
                    let handed_on = self.node(parent).dynamic_metadata.clone();
                    self.set_dynamic_metadata_recur(next, handed_on);
                }
            }
            NodeKind::Parallel => {
                let mut merged = self.node(parent).dynamic_metadata.clone();
                merged.merge(&pass_through);
                self.set_dynamic_metadata(parent, merged);
            }
            NodeKind::Task(_) => {}
        }
    }

    /// Current wall-clock convenience for [`Self::runnable_tasks_at`].
    pub fn runnable_tasks(&self) -> Vec<NodeId> {
        self.runnable_tasks_at(Utc::now())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failure,
    Inconclusive,
}

impl Verdict {
    pub fn is_conclusive(self) -> bool {
        self != Verdict::Inconclusive
    }
}

/// `"{prefix} : {detail}"`, or just the prefix when there is no detail.
pub(crate) fn reason(prefix: &str, detail: &str) -> String {
    if detail.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix} : {detail}")
    }
}
