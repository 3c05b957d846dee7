// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! How a node reacts when one of its subordinates changes state.
//!
//! The reaction depends on three things: the parent's current state, how the
//! source hangs off the parent (precondition, sub-processor, postcondition)
//! and the state the source just entered. Condition roots use a reduced
//! table for their checks. Pre and postconditions of a condition root go
//! through the full table like any other node's.

use crate::state::{StateCategory, StateKind, WorkflowState};

use super::node::{NodeId, Relation};
use super::tree::{reason, ProcessorTree, Verdict};

const EXECUTING_SUB_PROCESSORS: &str = "Executing sub-processors";
const WAITING_ON_RESOURCES: &str = "Waiting on resources";

fn phase_message(kind: StateKind) -> &'static str {
    match kind {
        StateKind::PreConditionEval => "Evaluating preconditions",
        StateKind::PostConditionEval => "Evaluating postconditions",
        _ => EXECUTING_SUB_PROCESSORS,
    }
}

fn phase(kind: StateKind) -> WorkflowState {
    WorkflowState::new(kind, phase_message(kind))
}

fn waiting_for(kind: StateKind) -> WorkflowState {
    WorkflowState::waiting_on_resources(WAITING_ON_RESOURCES, phase(kind))
}

/// `(evaluation phase, plural label)` for a condition relation.
fn condition_phase(relation: Relation) -> Option<(StateKind, &'static str)> {
    match relation {
        Relation::PreCondition => Some((StateKind::PreConditionEval, "preconditions")),
        Relation::PostCondition => Some((StateKind::PostConditionEval, "postconditions")),
        Relation::SubProcessor => None,
    }
}

fn capitalized(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl ProcessorTree {
    pub(super) fn on_child_changed(
        &mut self,
        parent: NodeId,
        source: NodeId,
        relation: Relation,
        src: &WorkflowState,
    ) {
        let current = self.node(parent).state.clone();
        match current.kind() {
            StateKind::Queued => match relation {
                Relation::SubProcessor => {
                    if self.passed_pre(parent) {
                        self.sub_started(parent, src);
                    }
                }
                _ => self.condition_started(parent, relation, src),
            },
            StateKind::PreConditionEval => {
                if relation == Relation::PreCondition {
                    self.precondition_settled(parent, src);
                }
            }
            StateKind::PreConditionSuccess => match relation {
                Relation::SubProcessor => self.sub_started(parent, src),
                Relation::PostCondition => self.condition_started(parent, relation, src),
                Relation::PreCondition => {}
            },
            StateKind::Executing => match relation {
                Relation::SubProcessor => self.sub_progressed(parent, source, src),
                Relation::PostCondition => self.condition_started(parent, relation, src),
                Relation::PreCondition => {}
            },
            StateKind::ExecutionComplete => {
                if self.passed_post(parent) {
                    self.apply_state(
                        parent,
                        WorkflowState::new(StateKind::Success, "Postconditions passed"),
                        true,
                    );
                } else if relation == Relation::PostCondition {
                    self.condition_started(parent, relation, src);
                }
            }
            StateKind::PostConditionEval => {
                if relation == Relation::PostCondition {
                    self.postcondition_settled(parent, src);
                }
            }
            StateKind::Blocked => self.blocked_child_changed(parent, source, relation, src),
            StateKind::WaitingOnResources => {
                self.waiting_child_changed(parent, source, relation, &current, src)
            }
            kind if kind.category() == StateCategory::Done => {
                self.reopen(parent, source, relation, src)
            }
            _ => {}
        }
    }

    pub(super) fn on_condition_child_changed(
        &mut self,
        parent: NodeId,
        source: NodeId,
        relation: Relation,
        src: &WorkflowState,
    ) {
        if relation != Relation::SubProcessor {
            self.on_child_changed(parent, source, relation, src);
            return;
        }
        if !self.passed_pre(parent) {
            return;
        }
        let current = self.node(parent).state.clone();
        match current.kind() {
            StateKind::Queued | StateKind::PreConditionSuccess => {
                if src.is_running() {
                    self.apply_state(parent, phase(StateKind::Executing), true);
                } else if src.is(StateKind::WaitingOnResources) {
                    self.apply_state(parent, waiting_for(StateKind::Executing), true);
                }
            }
            StateKind::Executing => {
                if src.is_done() {
                    self.condition_settled(parent, source, src);
                } else {
                    self.sub_progressed(parent, source, src);
                }
            }
            StateKind::ExecutionComplete => {
                if self.passed_post(parent) {
                    self.apply_state(
                        parent,
                        WorkflowState::new(StateKind::Success, "Conditions satisfied"),
                        true,
                    );
                }
            }
            StateKind::Blocked | StateKind::WaitingOnResources => {
                if src.is_running() {
                    self.apply_state(parent, phase(StateKind::Executing), true);
                } else if src.is_done() {
                    self.condition_settled(parent, source, src);
                } else if current.is(StateKind::Blocked) {
                    self.sub_waiting_or_blocked(parent, src);
                } else if src.is(StateKind::Blocked) && self.is_blocked(parent) {
                    self.block_on_sub_processors(parent, src);
                }
            }
            kind if kind.category() == StateCategory::Done => {
                if self.verdict(parent).is_conclusive() {
                    return;
                }
                if src.is_done() {
                    self.condition_settled(parent, source, src);
                } else {
                    self.sub_restarted(parent, src);
                }
            }
            _ => {}
        }
    }

    /// A precondition or postcondition tree reported while the parent was not
    /// yet evaluating it.
    fn condition_started(&mut self, parent: NodeId, relation: Relation, src: &WorkflowState) {
        let Some((eval, label)) = condition_phase(relation) else {
            return;
        };
        let next = match src.kind() {
            _ if src.is_running() => phase(eval),
            StateKind::WaitingOnResources => waiting_for(eval),
            StateKind::Failure => WorkflowState::new(
                StateKind::Failure,
                reason(&format!("Failed to pass {label}"), src.message()),
            ),
            StateKind::Blocked => WorkflowState::new(
                StateKind::Blocked,
                reason(&format!("{} are blocked", capitalized(label)), src.message()),
            ),
            _ => return,
        };
        self.apply_state(parent, next, true);
    }

    fn sub_started(&mut self, parent: NodeId, src: &WorkflowState) {
        match src.kind() {
            _ if src.is_running() => self.apply_state(parent, phase(StateKind::Executing), true),
            StateKind::PreConditionSuccess | StateKind::WaitingOnResources => {
                self.apply_state(parent, waiting_for(StateKind::Executing), true)
            }
            StateKind::Blocked if self.is_blocked(parent) => self.block_on_sub_processors(parent, src),
            _ => {}
        }
    }

    /// A sub-processor changed while the parent is executing.
    fn sub_progressed(&mut self, parent: NodeId, source: NodeId, src: &WorkflowState) {
        match src.kind() {
            _ if src.is_done() => self.sub_completed(parent, source, src),
            StateKind::PreConditionSuccess | StateKind::ExecutionComplete | StateKind::WaitingOnResources => {
                if !self.any_child_running(parent) {
                    self.apply_state(parent, waiting_for(StateKind::Executing), true);
                }
            }
            StateKind::Blocked if self.is_blocked(parent) => self.block_on_sub_processors(parent, src),
            _ => {}
        }
    }

    fn sub_completed(&mut self, parent: NodeId, source: NodeId, src: &WorkflowState) {
        self.absorb_child_metadata(parent, source);
        match self.verdict(parent) {
            Verdict::Failure => self.apply_state(
                parent,
                WorkflowState::new(StateKind::Failure, reason("Failed to complete", src.message())),
                true,
            ),
            Verdict::Success => self.apply_state(
                parent,
                WorkflowState::new(StateKind::ExecutionComplete, "Sub-processors complete"),
                true,
            ),
            Verdict::Inconclusive => {
                if !self.any_child_running(parent) {
                    self.apply_state(parent, waiting_for(StateKind::Executing), true);
                }
            }
        }
    }

    /// Completion of a condition root's checks. Its own postconditions, if any,
    /// still have to pass.
    fn condition_settled(&mut self, parent: NodeId, source: NodeId, src: &WorkflowState) {
        self.absorb_child_metadata(parent, source);
        match self.verdict(parent) {
            Verdict::Failure => self.apply_state(
                parent,
                WorkflowState::new(StateKind::Failure, reason("Failed to complete", src.message())),
                true,
            ),
            Verdict::Success if !self.passed_post(parent) => self.apply_state(
                parent,
                WorkflowState::new(StateKind::ExecutionComplete, "Checks complete"),
                true,
            ),
            Verdict::Success => self.apply_state(
                parent,
                WorkflowState::new(StateKind::Success, "Conditions satisfied"),
                true,
            ),
            Verdict::Inconclusive => {
                if !self.any_child_running(parent) {
                    self.apply_state(parent, waiting_for(StateKind::Executing), true);
                }
            }
        }
    }

    fn precondition_settled(&mut self, parent: NodeId, src: &WorkflowState) {
        let next = match src.kind() {
            StateKind::Failure => WorkflowState::new(
                StateKind::Failure,
                reason("Failed to pass preconditions", src.message()),
            ),
            StateKind::Success => {
                if let Some(pre) = self.node(parent).pre_conditions {
                    let passed_on = self.node(pre).pass_through_metadata();
                    self.set_dynamic_metadata_recur_only_sub_processors(parent, passed_on);
                }
                if self.has_further_work(parent) {
                    WorkflowState::new(StateKind::PreConditionSuccess, "Preconditions passed")
                } else {
                    WorkflowState::new(StateKind::Success, "Preconditions passed, nothing left to do")
                }
            }
            StateKind::Stopped => WorkflowState::new(
                StateKind::Unknown,
                reason("Preconditions stopped", src.message()),
            ),
            StateKind::Blocked => WorkflowState::new(
                StateKind::Blocked,
                reason("Preconditions are blocked", src.message()),
            ),
            StateKind::WaitingOnResources => waiting_for(StateKind::PreConditionEval),
            _ => return,
        };
        self.apply_state(parent, next, true);
    }

    fn postcondition_settled(&mut self, parent: NodeId, src: &WorkflowState) {
        let next = match src.kind() {
            StateKind::Failure => WorkflowState::new(
                StateKind::Failure,
                reason("Failed to pass postconditions", src.message()),
            ),
            StateKind::Success => {
                if let Some(post) = self.node(parent).post_conditions {
                    let passed_on = self.node(post).pass_through_metadata();
                    self.set_dynamic_metadata(parent, passed_on);
                }
                WorkflowState::new(StateKind::Success, "Postconditions passed")
            }
            StateKind::Stopped => WorkflowState::new(
                StateKind::Unknown,
                reason("Postconditions stopped", src.message()),
            ),
            StateKind::Blocked => WorkflowState::new(
                StateKind::Blocked,
                reason("Postconditions are blocked", src.message()),
            ),
            StateKind::WaitingOnResources => waiting_for(StateKind::PostConditionEval),
            _ => return,
        };
        self.apply_state(parent, next, true);
    }

    fn blocked_child_changed(&mut self, parent: NodeId, source: NodeId, relation: Relation, src: &WorkflowState) {
        match relation {
            Relation::PreCondition => {
                if src.is_running() {
                    self.apply_state(parent, phase(StateKind::PreConditionEval), true);
                } else {
                    self.precondition_settled(parent, src);
                }
            }
            Relation::PostCondition => {
                if src.is_running() {
                    self.apply_state(parent, phase(StateKind::PostConditionEval), true);
                } else {
                    self.postcondition_settled(parent, src);
                }
            }
            Relation::SubProcessor => {
                if src.is_running() {
                    self.apply_state(parent, phase(StateKind::Executing), true);
                } else if src.is_done() {
                    self.sub_completed(parent, source, src);
                } else {
                    self.sub_waiting_or_blocked(parent, src);
                }
            }
        }
    }

    fn sub_waiting_or_blocked(&mut self, parent: NodeId, src: &WorkflowState) {
        match src.kind() {
            StateKind::PreConditionSuccess | StateKind::WaitingOnResources => {
                self.apply_state(parent, waiting_for(StateKind::Executing), true)
            }
            StateKind::Blocked if self.is_blocked(parent) => self.block_on_sub_processors(parent, src),
            _ => {}
        }
    }

    fn waiting_child_changed(
        &mut self,
        parent: NodeId,
        source: NodeId,
        relation: Relation,
        current: &WorkflowState,
        src: &WorkflowState,
    ) {
        if src.is_running() {
            let resumed = current
                .resume_previous()
                .unwrap_or_else(|| phase(StateKind::Executing));
            self.apply_state(parent, resumed, true);
            return;
        }
        let waiting_on = current.previous().map(WorkflowState::kind);
        if src.is_done() {
            match (waiting_on, relation) {
                (Some(StateKind::PreConditionEval), Relation::PreCondition) => {
                    self.precondition_settled(parent, src)
                }
                (Some(StateKind::Executing), Relation::SubProcessor) => {
                    self.sub_completed(parent, source, src)
                }
                (Some(StateKind::PostConditionEval), Relation::PostCondition) => {
                    self.postcondition_settled(parent, src)
                }
                _ => {}
            }
        } else if src.is(StateKind::Blocked) {
            match relation {
                Relation::SubProcessor if self.is_blocked(parent) => self.block_on_sub_processors(parent, src),
                Relation::SubProcessor => {}
                _ => self.condition_started(parent, relation, src),
            }
        }
    }

    /// A late notification reached a finished node.
    fn reopen(&mut self, parent: NodeId, source: NodeId, relation: Relation, src: &WorkflowState) {
        if self.verdict(parent).is_conclusive() {
            return;
        }
        match relation {
            Relation::SubProcessor => {
                if !self.passed_pre(parent) {
                    return;
                }
                if src.is_done() {
                    self.sub_completed(parent, source, src);
                } else {
                    self.sub_restarted(parent, src);
                }
            }
            _ => self.condition_started(parent, relation, src),
        }
    }

    fn sub_restarted(&mut self, parent: NodeId, src: &WorkflowState) {
        match src.kind() {
            StateKind::Blocked if self.is_blocked(parent) => self.block_on_sub_processors(parent, src),
            StateKind::WaitingOnResources => {
                self.apply_state(parent, waiting_for(StateKind::Executing), true)
            }
            _ if src.is_running() => self.apply_state(parent, phase(StateKind::Executing), true),
            _ => {}
        }
    }

    fn block_on_sub_processors(&mut self, parent: NodeId, src: &WorkflowState) {
        self.apply_state(
            parent,
            WorkflowState::new(
                StateKind::Blocked,
                reason("Sub-processors are blocked", src.message()),
            ),
            true,
        );
    }
}
