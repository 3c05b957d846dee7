// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Duration, Utc};

use crate::metadata::keys;
use crate::state::{StateCategory, StateKind};

use super::node::{NodeId, NodeKind};
use super::tree::{ProcessorTree, Verdict};

/// Minutes a blocked task waits before it is offered again.
pub const DEFAULT_BLOCK_TIME_ELAPSE_MINUTES: f64 = 2.0;

impl ProcessorTree {
    /// Task leaves that may be handed to a runner as of `now`.
    pub fn runnable_tasks_at(&self, now: DateTime<Utc>) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_runnable(self.root(), now, &mut out);
        out
    }

    fn collect_runnable(&self, id: NodeId, now: DateTime<Utc>, out: &mut Vec<NodeId>) {
        let node = self.node(id);
        let state = &node.state;
        if state.in_category(StateCategory::Done) || state.in_category(StateCategory::Holding) {
            return;
        }
        if !self.passed_pre(id) {
            if let Some(pre) = node.pre_conditions {
                self.collect_runnable(pre, now, out);
            }
            return;
        }

        match &node.kind {
            NodeKind::Task(_) => match state.kind() {
                StateKind::Blocked => {
                    if now - state.entered_at() >= self.block_time_elapse(id) {
                        out.push(id);
                    }
                }
                StateKind::Queued | StateKind::PreConditionSuccess => out.push(id),
                _ => {
                    if self.postconditions_due(id) {
                        if let Some(post) = node.post_conditions {
                            self.collect_runnable(post, now, out);
                        }
                    }
                }
            },
            NodeKind::Sequential | NodeKind::Parallel => match self.verdict(id) {
                Verdict::Failure => {}
                Verdict::Success => {
                    if let Some(post) = node.post_conditions.filter(|_| !self.passed_post(id)) {
                        self.collect_runnable(post, now, out);
                    }
                }
                Verdict::Inconclusive => {
                    let mut unfinished = node
                        .children
                        .iter()
                        .copied()
                        .filter(|c| !self.node(*c).state.is_done());
                    if node.kind == NodeKind::Sequential {
                        if let Some(current) = unfinished.next() {
                            self.collect_runnable(current, now, out);
                        }
                    } else {
                        for child in unfinished {
                            self.collect_runnable(child, now, out);
                        }
                    }
                }
            },
        }
    }

    /// A task whose body finished and whose postconditions still need to run.
    fn postconditions_due(&self, id: NodeId) -> bool {
        let node = self.node(id);
        let Some(post) = node.post_conditions else {
            return false;
        };
        let body_done = matches!(
            node.state.kind(),
            StateKind::ExecutionComplete | StateKind::PostConditionEval
        );
        let post_started = !matches!(
            self.node(post).state.kind(),
            StateKind::Null | StateKind::Loaded | StateKind::Queued
        );
        (body_done || post_started) && !self.passed_post(id)
    }

    fn block_time_elapse(&self, id: NodeId) -> Duration {
        let minutes = self
            .node(id)
            .static_metadata
            .get(keys::BLOCK_TIME_ELAPSE)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|minutes| minutes.is_finite() && *minutes >= 0.0)
            .unwrap_or(DEFAULT_BLOCK_TIME_ELAPSE_MINUTES);
        Duration::milliseconds((minutes * 60_000.0).round() as i64)
    }
}
