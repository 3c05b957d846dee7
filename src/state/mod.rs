// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Lifecycle states for processor nodes.
//!
//! A [`WorkflowState`] is an immutable value: a [`StateKind`], a human readable
//! message, the instant it was entered and, for a few kinds, the state it
//! replaced. Processor nodes hold exactly one current state and swap it out
//! whole on every transition.
//!
//! # Categories
//!
//! Every kind belongs to one [`StateCategory`]:
//!
//! | Category   | Kinds                                                 |
//! |------------|-------------------------------------------------------|
//! | Initial    | `Null`, `Loaded`                                      |
//! | Waiting    | `Queued`, `Blocked`, `WaitingOnResources`             |
//! | Running    | `PreConditionEval`, `Executing`, `PostConditionEval`  |
//! | Transition | `PreConditionSuccess`, `ExecutionComplete`            |
//! | Holding    | `Paused`, `Unknown`                                   |
//! | Done       | `Success`, `Failure`, `Stopped`                       |
//!
//! # Examples
//!
//! ```rust
//! use wengine::state::{StateCategory, StateKind, WorkflowState};
//!
//! let executing = WorkflowState::new(StateKind::Executing, "Executing Sub-Processors");
//! let waiting = WorkflowState::waiting_on_resources("Added to runnable queue", executing);
//!
//! assert_eq!(waiting.category(), StateCategory::Waiting);
//! assert_eq!(waiting.previous().map(|p| p.kind()), Some(StateKind::Executing));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Coarse grouping of state kinds used by transitions, scheduling and paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateCategory {
    Initial,
    Waiting,
    Running,
    Transition,
    Holding,
    Done,
}

impl StateCategory {
    pub fn name(self) -> &'static str {
        match self {
            StateCategory::Initial => "INITIAL",
            StateCategory::Waiting => "WAITING",
            StateCategory::Running => "RUNNING",
            StateCategory::Transition => "TRANSITION",
            StateCategory::Holding => "HOLDING",
            StateCategory::Done => "DONE",
        }
    }
}

impl Display for StateCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    Null,
    Loaded,
    Queued,
    Blocked,
    WaitingOnResources,
    PreConditionEval,
    Executing,
    PostConditionEval,
    PreConditionSuccess,
    ExecutionComplete,
    Paused,
    Unknown,
    Success,
    Failure,
    Stopped,
}

impl StateKind {
    pub const ALL: [StateKind; 15] = [
        StateKind::Null,
        StateKind::Loaded,
        StateKind::Queued,
        StateKind::Blocked,
        StateKind::WaitingOnResources,
        StateKind::PreConditionEval,
        StateKind::Executing,
        StateKind::PostConditionEval,
        StateKind::PreConditionSuccess,
        StateKind::ExecutionComplete,
        StateKind::Paused,
        StateKind::Unknown,
        StateKind::Success,
        StateKind::Failure,
        StateKind::Stopped,
    ];

    pub fn category(self) -> StateCategory {
        match self {
            StateKind::Null | StateKind::Loaded => StateCategory::Initial,
            StateKind::Queued | StateKind::Blocked | StateKind::WaitingOnResources => {
                StateCategory::Waiting
            }
            StateKind::PreConditionEval | StateKind::Executing | StateKind::PostConditionEval => {
                StateCategory::Running
            }
            StateKind::PreConditionSuccess | StateKind::ExecutionComplete => {
                StateCategory::Transition
            }
            StateKind::Paused | StateKind::Unknown => StateCategory::Holding,
            StateKind::Success | StateKind::Failure | StateKind::Stopped => StateCategory::Done,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StateKind::Null => "Null",
            StateKind::Loaded => "Loaded",
            StateKind::Queued => "Queued",
            StateKind::Blocked => "Blocked",
            StateKind::WaitingOnResources => "WaitingOnResources",
            StateKind::PreConditionEval => "PreConditionEval",
            StateKind::Executing => "Executing",
            StateKind::PostConditionEval => "PostConditionEval",
            StateKind::PreConditionSuccess => "PreConditionSuccess",
            StateKind::ExecutionComplete => "ExecutionComplete",
            StateKind::Paused => "Paused",
            StateKind::Unknown => "Unknown",
            StateKind::Success => "Success",
            StateKind::Failure => "Failure",
            StateKind::Stopped => "Stopped",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StateKind::Null => "Not yet part of a workflow instance",
            StateKind::Loaded => "Built from a model and waiting to be queued",
            StateKind::Queued => "Waiting to be evaluated",
            StateKind::Blocked => "Unable to make progress until a subordinate unblocks",
            StateKind::WaitingOnResources => "Ready to run and waiting for execution capacity",
            StateKind::PreConditionEval => "Evaluating preconditions",
            StateKind::Executing => "Executing",
            StateKind::PostConditionEval => "Evaluating postconditions",
            StateKind::PreConditionSuccess => "Preconditions satisfied",
            StateKind::ExecutionComplete => "Execution finished, postconditions pending",
            StateKind::Paused => "Paused by an operator",
            StateKind::Unknown => "Outcome could not be determined",
            StateKind::Success => "Finished successfully",
            StateKind::Failure => "Finished with a failure",
            StateKind::Stopped => "Stopped by an operator",
        }
    }

    /// Revertable kinds remember the state they replaced so an operator can undo them.
    pub fn is_revertable(self) -> bool {
        matches!(self, StateKind::Paused)
    }

    /// Case-insensitive lookup by name.
    pub fn parse(name: &str) -> Option<StateKind> {
        StateKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl Display for StateKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    kind: StateKind,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous: Option<Box<WorkflowState>>,
    entered_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(kind: StateKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            previous: None,
            entered_at: Utc::now(),
        }
    }

    pub fn with_previous(kind: StateKind, message: impl Into<String>, previous: WorkflowState) -> Self {
        Self {
            previous: Some(Box::new(previous)),
            ..Self::new(kind, message)
        }
    }

    /// A `WaitingOnResources` state that resumes `previous` once work starts again.
    pub fn waiting_on_resources(message: impl Into<String>, previous: WorkflowState) -> Self {
        Self::with_previous(StateKind::WaitingOnResources, message, previous)
    }

    /// Overrides the entry instant. Used when replaying snapshots and in timing tests.
    pub fn entered_at_time(mut self, at: DateTime<Utc>) -> Self {
        self.entered_at = at;
        self
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn previous(&self) -> Option<&WorkflowState> {
        self.previous.as_deref()
    }

    pub fn entered_at(&self) -> DateTime<Utc> {
        self.entered_at
    }

    pub fn category(&self) -> StateCategory {
        self.kind.category()
    }

    pub fn is(&self, kind: StateKind) -> bool {
        self.kind == kind
    }

    pub fn in_category(&self, category: StateCategory) -> bool {
        self.kind.category() == category
    }

    pub fn is_done(&self) -> bool {
        self.in_category(StateCategory::Done)
    }

    pub fn is_running(&self) -> bool {
        self.in_category(StateCategory::Running)
    }

    /// The remembered state re-entered now, or `None` when nothing was remembered.
    pub fn resume_previous(&self) -> Option<WorkflowState> {
        self.previous().map(|previous| WorkflowState {
            entered_at: Utc::now(),
            ..previous.clone()
        })
    }

    /// Transition equality: kind, message and remembered kind. Entry time is ignored.
    pub fn same_as(&self, other: &WorkflowState) -> bool {
        self.kind == other.kind
            && self.message == other.message
            && self.previous().map(|p| p.kind) == other.previous().map(|p| p.kind)
    }
}

/// Full equality, entry time included. Use [`WorkflowState::same_as`] to compare transitions.
impl PartialEq for WorkflowState {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other) && self.entered_at == other.entered_at
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new(StateKind::Null, "")
    }
}

impl Display for WorkflowState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{} : {}", self.kind, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_one_category() {
        let done: Vec<_> = StateKind::ALL
            .iter()
            .filter(|k| k.category() == StateCategory::Done)
            .collect();
        assert_eq!(done, vec![&StateKind::Success, &StateKind::Failure, &StateKind::Stopped]);
        assert_eq!(StateKind::WaitingOnResources.category(), StateCategory::Waiting);
        assert_eq!(StateKind::PreConditionSuccess.category(), StateCategory::Transition);
        assert_eq!(StateKind::Paused.category(), StateCategory::Holding);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(StateKind::parse("executing"), Some(StateKind::Executing));
        assert_eq!(StateKind::parse(" WaitingOnResources "), Some(StateKind::WaitingOnResources));
        assert_eq!(StateKind::parse("Running"), None);
    }

    #[test]
    fn test_same_as_ignores_entry_time() {
        let earlier = WorkflowState::new(StateKind::Blocked, "waiting")
            .entered_at_time(Utc::now() - chrono::Duration::minutes(10));
        let now = WorkflowState::new(StateKind::Blocked, "waiting");
        assert!(earlier.same_as(&now));
        assert!(!now.same_as(&WorkflowState::new(StateKind::Blocked, "other")));
    }

    #[test]
    fn test_same_as_compares_remembered_kind() {
        let exec = WorkflowState::waiting_on_resources("", WorkflowState::new(StateKind::Executing, ""));
        let pre = WorkflowState::waiting_on_resources("", WorkflowState::new(StateKind::PreConditionEval, ""));
        assert!(!exec.same_as(&pre));
    }

    #[test]
    fn test_resume_previous_restores_kind_and_message() {
        let paused = WorkflowState::with_previous(
            StateKind::Paused,
            "",
            WorkflowState::new(StateKind::Executing, "Executing Sub-Processors"),
        );
        let resumed = paused.resume_previous().unwrap();
        assert_eq!(resumed.kind(), StateKind::Executing);
        assert_eq!(resumed.message(), "Executing Sub-Processors");
        assert!(WorkflowState::default().resume_previous().is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(WorkflowState::new(StateKind::Queued, "").to_string(), "Queued");
        assert_eq!(
            WorkflowState::new(StateKind::Failure, "boom").to_string(),
            "Failure : boom"
        );
    }

    #[test]
    fn test_round_trips_through_json() {
        let state = WorkflowState::waiting_on_resources("x", WorkflowState::new(StateKind::Executing, "y"));
        let json = serde_json::to_string(&state).unwrap();
        let back: WorkflowState = serde_json::from_str(&json).unwrap();
        assert!(back.same_as(&state));
        assert_eq!(back.entered_at(), state.entered_at());
    }
}
