// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{Duration, Utc};

use super::*;
use crate::metadata::Metadata;
use crate::model::WorkflowGraph;
use crate::priority::{Priority, TASK_PRIORITY_OFFSET};
use crate::state::{StateKind, WorkflowState};

fn task(id: &str) -> WorkflowGraph {
    WorkflowGraph::task(id, "noop")
}

fn start(graph: &WorkflowGraph) -> ProcessorTree {
    let mut tree = build_tree("instance", graph).unwrap();
    let root = tree.root();
    tree.set_state_recur(root, WorkflowState::new(StateKind::Queued, ""));
    tree.drain();
    tree
}

fn id(tree: &ProcessorTree, model_id: &str) -> NodeId {
    tree.find(model_id).unwrap()
}

fn runnable(tree: &ProcessorTree) -> Vec<String> {
    tree.runnable_tasks()
        .into_iter()
        .map(|id| tree.node(id).model_id().to_string())
        .collect()
}

fn kind_of(tree: &ProcessorTree, model_id: &str) -> StateKind {
    tree.state(id(tree, model_id)).kind()
}

/// What the queue manager and runner do to a task that is handed out.
fn dispatch(tree: &mut ProcessorTree, model_id: &str) {
    let node = id(tree, model_id);
    tree.set_state(
        node,
        WorkflowState::waiting_on_resources(
            "Added to runnable queue",
            WorkflowState::new(StateKind::Executing, ""),
        ),
    );
    tree.drain();
    tree.set_state(node, WorkflowState::new(StateKind::Executing, "Running"));
    tree.drain();
}

fn finish(tree: &mut ProcessorTree, model_id: &str, kind: StateKind, message: &str) {
    let node = id(tree, model_id);
    tree.set_state(node, WorkflowState::new(kind, message));
    tree.drain();
}

fn run(tree: &mut ProcessorTree, model_id: &str, kind: StateKind) {
    dispatch(tree, model_id);
    finish(tree, model_id, kind, "");
}

fn md(pairs: &[(&str, &str)]) -> Metadata {
    pairs.iter().map(|(k, v)| (*k, *v)).collect()
}

/// No node reports Success while anything below it is unfinished.
fn assert_no_success_with_unfinished_work(tree: &ProcessorTree) {
    for node in tree.nodes() {
        if node.state().is(StateKind::Success) {
            for below in tree.pre_order(node.id()).into_iter().skip(1) {
                let state = tree.state(below);
                assert!(
                    state.is_done(),
                    "{} is Success but {} is {}",
                    node.model_id(),
                    tree.node(below).model_id(),
                    state
                );
            }
        }
    }
}

#[test]
fn test_sequential_runs_children_in_order() {
    let graph = WorkflowGraph::sequential("seq", vec![task("a"), task("b"), task("c")]);
    let mut tree = start(&graph);

    for (step, model) in ["a", "b", "c"].iter().enumerate() {
        assert_eq!(runnable(&tree), vec![model.to_string()]);
        assert_ne!(kind_of(&tree, "seq"), StateKind::Success, "step {step}");
        run(&mut tree, model, StateKind::ExecutionComplete);
        assert_eq!(kind_of(&tree, model), StateKind::Success);
    }

    assert_eq!(kind_of(&tree, "seq"), StateKind::Success);
    assert!(runnable(&tree).is_empty());
    assert_no_success_with_unfinished_work(&tree);
}

#[test]
fn test_parent_tracks_child_activity() {
    let graph = WorkflowGraph::sequential("seq", vec![task("a"), task("b")]);
    let mut tree = start(&graph);

    let a = id(&tree, "a");
    tree.set_state(
        a,
        WorkflowState::waiting_on_resources("Added to runnable queue", WorkflowState::new(StateKind::Executing, "")),
    );
    tree.drain();
    assert_eq!(kind_of(&tree, "seq"), StateKind::WaitingOnResources);

    tree.set_state(a, WorkflowState::new(StateKind::Executing, ""));
    tree.drain();
    assert_eq!(kind_of(&tree, "seq"), StateKind::Executing);

    finish(&mut tree, "a", StateKind::ExecutionComplete, "");
    let seq = tree.state(id(&tree, "seq"));
    assert_eq!(seq.kind(), StateKind::WaitingOnResources);
    assert_eq!(seq.previous().map(WorkflowState::kind), Some(StateKind::Executing));
}

#[test]
fn test_failed_precondition_leaves_children_untouched() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a"), task("b")])
        .with_pre_conditions(WorkflowGraph::condition("ready", vec![task("check")]));
    let mut tree = start(&graph);

    assert_eq!(runnable(&tree), vec!["check".to_string()]);
    dispatch(&mut tree, "check");
    assert_eq!(kind_of(&tree, "wf"), StateKind::PreConditionEval);
    finish(&mut tree, "check", StateKind::Failure, "disk missing");

    assert_eq!(kind_of(&tree, "ready"), StateKind::Failure);
    let wf = tree.state(id(&tree, "wf"));
    assert_eq!(wf.kind(), StateKind::Failure);
    assert!(wf.message().starts_with("Failed to pass preconditions"));
    assert!(wf.message().contains("disk missing"));

    for child in ["a", "b"] {
        assert_eq!(kind_of(&tree, child), StateKind::Queued);
        assert!(tree.node(id(&tree, child)).info().execution_date.is_none());
    }
    assert!(runnable(&tree).is_empty());
}

#[test]
fn test_condition_with_failed_precondition_never_runs_its_checks() {
    let gate = WorkflowGraph::condition("gate", vec![task("check")])
        .with_pre_conditions(WorkflowGraph::condition("ready", vec![task("ping")]));
    let graph = WorkflowGraph::sequential("wf", vec![task("a")]).with_pre_conditions(gate);
    let mut tree = start(&graph);

    assert_eq!(runnable(&tree), vec!["ping".to_string()]);
    dispatch(&mut tree, "ping");
    assert_eq!(kind_of(&tree, "gate"), StateKind::PreConditionEval);
    finish(&mut tree, "ping", StateKind::Failure, "host unreachable");

    let gate = tree.state(id(&tree, "gate"));
    assert_eq!(gate.kind(), StateKind::Failure);
    assert!(gate.message().starts_with("Failed to pass preconditions"));
    assert_eq!(kind_of(&tree, "wf"), StateKind::Failure);
    for untouched in ["check", "a"] {
        assert_eq!(kind_of(&tree, untouched), StateKind::Queued);
    }
    assert!(runnable(&tree).is_empty());
}

#[test]
fn test_condition_with_passed_precondition_runs_its_checks() {
    let gate = WorkflowGraph::condition("gate", vec![task("check")])
        .with_pre_conditions(WorkflowGraph::condition("ready", vec![task("ping")]));
    let graph = WorkflowGraph::sequential("wf", vec![task("a")]).with_pre_conditions(gate);
    let mut tree = start(&graph);

    run(&mut tree, "ping", StateKind::ExecutionComplete);
    assert_eq!(kind_of(&tree, "ready"), StateKind::Success);
    assert_eq!(kind_of(&tree, "gate"), StateKind::PreConditionSuccess);
    assert_eq!(kind_of(&tree, "wf"), StateKind::PreConditionEval);
    assert_eq!(runnable(&tree), vec!["check".to_string()]);

    run(&mut tree, "check", StateKind::ExecutionComplete);
    assert_eq!(kind_of(&tree, "gate"), StateKind::Success);
    assert_eq!(kind_of(&tree, "wf"), StateKind::PreConditionSuccess);
    assert_eq!(runnable(&tree), vec!["a".to_string()]);

    run(&mut tree, "a", StateKind::ExecutionComplete);
    assert_eq!(kind_of(&tree, "wf"), StateKind::Success);
    assert_no_success_with_unfinished_work(&tree);
}

#[test]
fn test_condition_waits_for_its_own_postconditions() {
    let graph = WorkflowGraph::condition("gate", vec![task("check")])
        .with_post_conditions(WorkflowGraph::condition("after", vec![task("verify")]));
    let mut tree = start(&graph);

    run(&mut tree, "check", StateKind::ExecutionComplete);
    assert_eq!(kind_of(&tree, "gate"), StateKind::ExecutionComplete);
    assert_eq!(runnable(&tree), vec!["verify".to_string()]);

    dispatch(&mut tree, "verify");
    assert_eq!(kind_of(&tree, "gate"), StateKind::PostConditionEval);
    finish(&mut tree, "verify", StateKind::ExecutionComplete, "");
    assert_eq!(kind_of(&tree, "after"), StateKind::Success);
    assert_eq!(kind_of(&tree, "gate"), StateKind::Success);
}

#[test]
fn test_passed_precondition_hands_metadata_to_children() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a")])
        .with_pre_conditions(WorkflowGraph::condition("ready", vec![task("check")]));
    let mut tree = start(&graph);

    dispatch(&mut tree, "check");
    let check = id(&tree, "check");
    tree.set_dynamic_metadata(check, md(&[("Ready", "yes")]));
    finish(&mut tree, "check", StateKind::ExecutionComplete, "");

    assert_eq!(kind_of(&tree, "ready"), StateKind::Success);
    assert_eq!(kind_of(&tree, "wf"), StateKind::PreConditionSuccess);
    assert_eq!(tree.node(id(&tree, "a")).dynamic_metadata().get("Ready"), Some("yes"));
    assert_eq!(runnable(&tree), vec!["a".to_string()]);

    run(&mut tree, "a", StateKind::ExecutionComplete);
    assert_eq!(kind_of(&tree, "wf"), StateKind::Success);
    assert_no_success_with_unfinished_work(&tree);
}

#[test]
fn test_task_with_preconditions_runs_after_they_pass() {
    let graph = task("t").with_pre_conditions(WorkflowGraph::condition("ready", vec![task("check")]));
    let mut tree = start(&graph);

    assert_eq!(runnable(&tree), vec!["check".to_string()]);
    run(&mut tree, "check", StateKind::ExecutionComplete);
    assert_eq!(kind_of(&tree, "t"), StateKind::PreConditionSuccess);
    assert_eq!(runnable(&tree), vec!["t".to_string()]);

    run(&mut tree, "t", StateKind::ExecutionComplete);
    assert_eq!(kind_of(&tree, "t"), StateKind::Success);
}

#[test]
fn test_postconditions_run_after_body_and_feed_metadata_back() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a")])
        .with_post_conditions(WorkflowGraph::condition("verify", vec![task("check")]));
    let mut tree = start(&graph);

    let a = id(&tree, "a");
    dispatch(&mut tree, "a");
    tree.set_dynamic_metadata(a, md(&[("Output", "a.out")]));
    finish(&mut tree, "a", StateKind::ExecutionComplete, "");

    assert_eq!(kind_of(&tree, "wf"), StateKind::ExecutionComplete);
    assert_eq!(tree.node(id(&tree, "check")).dynamic_metadata().get("Output"), Some("a.out"));
    assert_eq!(runnable(&tree), vec!["check".to_string()]);

    dispatch(&mut tree, "check");
    assert_eq!(kind_of(&tree, "wf"), StateKind::PostConditionEval);
    let check = id(&tree, "check");
    let mut verified = tree.node(check).dynamic_metadata().clone();
    verified.replace("Verified", "yes");
    tree.set_dynamic_metadata(check, verified);
    finish(&mut tree, "check", StateKind::ExecutionComplete, "");

    assert_eq!(kind_of(&tree, "wf"), StateKind::Success);
    let wf = tree.node(id(&tree, "wf"));
    assert_eq!(wf.dynamic_metadata().get("Verified"), Some("yes"));
    assert_eq!(wf.dynamic_metadata().get("Output"), Some("a.out"));
    assert_no_success_with_unfinished_work(&tree);
}

#[test]
fn test_failed_postconditions_fail_the_node() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a")])
        .with_post_conditions(WorkflowGraph::condition("verify", vec![task("check")]));
    let mut tree = start(&graph);

    run(&mut tree, "a", StateKind::ExecutionComplete);
    run(&mut tree, "check", StateKind::Failure);
    let wf = tree.state(id(&tree, "wf"));
    assert_eq!(wf.kind(), StateKind::Failure);
    assert!(wf.message().starts_with("Failed to pass postconditions"));
}

#[test]
fn test_threshold_tolerates_one_failure_of_three() {
    let graph = WorkflowGraph::parallel("wf", vec![task("a"), task("b"), task("c")]).with_min_req_successful(2);
    let mut tree = start(&graph);

    assert_eq!(runnable(&tree).len(), 3);
    run(&mut tree, "a", StateKind::ExecutionComplete);
    run(&mut tree, "b", StateKind::Failure);
    assert_ne!(kind_of(&tree, "wf"), StateKind::Failure);
    run(&mut tree, "c", StateKind::ExecutionComplete);

    assert_eq!(kind_of(&tree, "wf"), StateKind::Success);
}

#[test]
fn test_threshold_fails_on_two_failures_of_three() {
    let graph = WorkflowGraph::parallel("wf", vec![task("a"), task("b"), task("c")]).with_min_req_successful(2);
    let mut tree = start(&graph);

    run(&mut tree, "a", StateKind::Failure);
    assert_ne!(kind_of(&tree, "wf"), StateKind::Failure);
    run(&mut tree, "b", StateKind::Failure);

    assert_eq!(kind_of(&tree, "wf"), StateKind::Failure);
    assert_eq!(runnable(&tree), Vec::<String>::new());
}

#[test]
fn test_threshold_verdict_matches_failure_count() {
    for failures in 0..=3usize {
        for min_req in 0..=3i32 {
            let graph = WorkflowGraph::parallel("wf", vec![task("a"), task("b"), task("c")])
                .with_min_req_successful(min_req);
            let mut tree = start(&graph);
            for (i, model) in ["a", "b", "c"].iter().enumerate() {
                let outcome = if i < failures { StateKind::Failure } else { StateKind::ExecutionComplete };
                run(&mut tree, model, outcome);
            }
            let expected = failures as i32 > 3 - min_req;
            assert_eq!(
                kind_of(&tree, "wf") == StateKind::Failure,
                expected,
                "failures={failures} min_req={min_req}"
            );
        }
    }
}

#[test]
fn test_any_failure_fails_without_threshold_unless_excused() {
    let graph = WorkflowGraph::parallel("wf", vec![task("a"), task("b")]);
    let mut tree = start(&graph);
    run(&mut tree, "b", StateKind::Failure);
    assert_eq!(kind_of(&tree, "wf"), StateKind::Failure);

    let excused = WorkflowGraph::parallel("wf", vec![task("a"), task("b")]).with_excused("b");
    let mut tree = start(&excused);
    run(&mut tree, "b", StateKind::Failure);
    assert_ne!(kind_of(&tree, "wf"), StateKind::Failure);
    run(&mut tree, "a", StateKind::ExecutionComplete);
    assert_eq!(kind_of(&tree, "wf"), StateKind::Success);
}

#[test]
fn test_excusing_a_sub_processor_at_runtime() {
    let graph = WorkflowGraph::parallel("wf", vec![task("a"), task("b")]);
    let mut tree = start(&graph);
    assert!(!tree.has_pending());

    let wf = tree.root();
    tree.set_excused(wf, ["b".to_string()].into_iter().collect());
    assert!(tree.has_pending());
    let events = tree.drain();
    assert!(!tree.has_pending());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, wf);
    assert_eq!(events[0].kind, ChangeKind::ExcusedSubProcessors);
    assert_eq!(kind_of(&tree, "wf"), StateKind::Queued);

    run(&mut tree, "b", StateKind::Failure);
    assert_ne!(kind_of(&tree, "wf"), StateKind::Failure);
    run(&mut tree, "a", StateKind::ExecutionComplete);
    assert_eq!(kind_of(&tree, "wf"), StateKind::Success);
}

#[test]
fn test_sequential_moves_past_excused_failure() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a"), task("b")]).with_excused("a");
    let mut tree = start(&graph);
    run(&mut tree, "a", StateKind::Failure);
    assert_eq!(runnable(&tree), vec!["b".to_string()]);
}

#[test]
fn test_priority_recur_offsets_tasks_only() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a"), WorkflowGraph::parallel("p", vec![task("b")])])
        .with_pre_conditions(WorkflowGraph::condition("pre", vec![task("check")]));
    let mut tree = build_tree("i", &graph).unwrap();
    let root = tree.root();
    tree.set_priority_recur(root, Priority::HIGH);

    for node in tree.nodes() {
        assert_eq!(node.priority(), Priority::HIGH);
        let expected = if node.is_task() {
            Priority::HIGH.with_offset(TASK_PRIORITY_OFFSET)
        } else {
            Priority::HIGH
        };
        assert_eq!(node.effective_priority(), expected, "{}", node.model_id());
    }
}

#[test]
fn test_dynamic_metadata_recur_reaches_every_node_immediately() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a"), WorkflowGraph::parallel("p", vec![task("b")])])
        .with_pre_conditions(WorkflowGraph::condition("pre", vec![task("check")]))
        .with_post_conditions(WorkflowGraph::condition("post", vec![task("verify")]));
    let mut tree = build_tree("i", &graph).unwrap();
    let root = tree.root();
    let input = md(&[("Granule", "g-1"), ("Files", "x.dat")]);
    tree.set_dynamic_metadata_recur(root, input.clone());

    for node in tree.nodes() {
        assert_eq!(node.dynamic_metadata(), &input, "{}", node.model_id());
    }
}

#[test]
fn test_sequential_hands_metadata_to_next_child() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a"), task("b")]);
    let mut tree = start(&graph);

    dispatch(&mut tree, "a");
    let a = id(&tree, "a");
    tree.set_dynamic_metadata(
        a,
        md(&[("Output", "a.out"), ("WorkflowProcessor/Local/Scratch", "tmp")]),
    );
    finish(&mut tree, "a", StateKind::ExecutionComplete, "");

    let b = tree.node(id(&tree, "b"));
    assert_eq!(b.dynamic_metadata().get("Output"), Some("a.out"));
    assert!(!b.dynamic_metadata().contains_key("WorkflowProcessor/Local/Scratch"));
    assert_eq!(tree.node(tree.root()).dynamic_metadata().get("Output"), Some("a.out"));
}

#[test]
fn test_parallel_merges_child_metadata() {
    let graph = WorkflowGraph::parallel("wf", vec![task("a"), task("b")]);
    let mut tree = start(&graph);

    for (model, file) in [("a", "a.out"), ("b", "b.out")] {
        dispatch(&mut tree, model);
        let node = id(&tree, model);
        tree.set_dynamic_metadata(node, md(&[("Files", file)]));
        finish(&mut tree, model, StateKind::ExecutionComplete, "");
    }

    let files = tree.node(tree.root()).dynamic_metadata().get_all("Files").to_vec();
    assert_eq!(files, vec!["a.out".to_string(), "b.out".to_string()]);
    assert_eq!(kind_of(&tree, "wf"), StateKind::Success);
}

#[test]
fn test_blocked_task_is_offered_again_exactly_at_threshold() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a").with_static("BlockTimeElapse", "1")]);
    let mut tree = start(&graph);
    dispatch(&mut tree, "a");

    let blocked_at = Utc::now() - Duration::hours(1);
    let a = id(&tree, "a");
    tree.set_state(
        a,
        WorkflowState::new(StateKind::Blocked, "no space").entered_at_time(blocked_at),
    );
    tree.drain();
    assert_eq!(kind_of(&tree, "wf"), StateKind::Blocked);
    assert_eq!(tree.node(a).times_blocked(), 1);

    let just_before = blocked_at + Duration::minutes(1) - Duration::milliseconds(1);
    assert!(tree.runnable_tasks_at(just_before).is_empty());
    assert_eq!(tree.runnable_tasks_at(blocked_at + Duration::minutes(1)), vec![a]);
    assert_eq!(tree.runnable_tasks_at(blocked_at + Duration::minutes(5)), vec![a]);
}

#[test]
fn test_block_time_defaults_to_two_minutes() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a")]);
    let mut tree = start(&graph);
    dispatch(&mut tree, "a");
    let at = Utc::now() - Duration::hours(1);
    let a = id(&tree, "a");
    tree.set_state(a, WorkflowState::new(StateKind::Blocked, "").entered_at_time(at));
    tree.drain();

    assert!(tree.runnable_tasks_at(at + Duration::seconds(119)).is_empty());
    assert_eq!(tree.runnable_tasks_at(at + Duration::seconds(120)), vec![a]);
}

#[test]
fn test_rerun_after_block_unblocks_parent() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a").with_static("BlockTimeElapse", "0")]);
    let mut tree = start(&graph);
    run(&mut tree, "a", StateKind::Blocked);
    assert_eq!(kind_of(&tree, "wf"), StateKind::Blocked);

    assert_eq!(runnable(&tree), vec!["a".to_string()]);
    run(&mut tree, "a", StateKind::ExecutionComplete);
    assert_eq!(kind_of(&tree, "wf"), StateKind::Success);
}

#[test]
fn test_waiting_tasks_are_not_runnable() {
    let graph = WorkflowGraph::parallel("wf", vec![task("a"), task("b")]);
    let mut tree = start(&graph);
    let a = id(&tree, "a");
    tree.set_state(
        a,
        WorkflowState::waiting_on_resources("Added to runnable queue", WorkflowState::new(StateKind::Executing, "")),
    );
    tree.drain();
    assert_eq!(runnable(&tree), vec!["b".to_string()]);
}

#[test]
fn test_late_done_after_conclusive_failure_is_discarded() {
    let graph = WorkflowGraph::parallel("wf", vec![task("a"), task("b"), task("c")]);
    let mut tree = start(&graph);

    dispatch(&mut tree, "a");
    finish(&mut tree, "a", StateKind::Blocked, "a blocked");
    assert_eq!(kind_of(&tree, "wf"), StateKind::Blocked);
    dispatch(&mut tree, "b");
    finish(&mut tree, "b", StateKind::Blocked, "b blocked");
    assert_eq!(kind_of(&tree, "wf"), StateKind::Blocked);

    let (a, b) = (id(&tree, "a"), id(&tree, "b"));
    tree.set_dynamic_metadata(b, md(&[("FromB", "1")]));
    tree.set_state(a, WorkflowState::new(StateKind::Failure, "a failed"));
    tree.set_state(b, WorkflowState::new(StateKind::Success, "b done"));
    tree.drain();

    let wf = tree.node(tree.root());
    assert_eq!(wf.state().kind(), StateKind::Failure);
    assert!(wf.state().message().contains("a failed"));
    assert!(!wf.dynamic_metadata().contains_key("FromB"));
}

#[test]
fn test_pause_defers_child_events_until_revert() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a"), task("b")]);
    let mut tree = start(&graph);
    dispatch(&mut tree, "a");

    let root = tree.root();
    tree.set_state(root, WorkflowState::new(StateKind::Paused, "operator"));
    tree.drain();
    assert_eq!(tree.state(root).previous().map(WorkflowState::kind), Some(StateKind::Executing));

    finish(&mut tree, "a", StateKind::ExecutionComplete, "");
    assert_eq!(kind_of(&tree, "wf"), StateKind::Paused);
    assert!(runnable(&tree).is_empty());

    assert!(tree.revert_state(root));
    tree.drain();
    assert_ne!(kind_of(&tree, "wf"), StateKind::Paused);
    assert_eq!(runnable(&tree), vec!["b".to_string()]);
    assert!(!tree.revert_state(root));
}

#[test]
fn test_stop_marks_every_node_quietly() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a"), task("b")])
        .with_pre_conditions(WorkflowGraph::condition("pre", vec![task("check")]));
    let mut tree = start(&graph);
    dispatch(&mut tree, "check");

    let root = tree.root();
    tree.set_state_recur(root, WorkflowState::new(StateKind::Stopped, "operator"));
    let events = tree.drain();

    assert!(tree.nodes().all(|n| n.state().is(StateKind::Stopped)));
    let state_events: Vec<_> = events.iter().filter(|e| e.kind == ChangeKind::State).collect();
    assert_eq!(state_events.len(), 1);
    assert_eq!(state_events[0].source, root);
    assert!(runnable(&tree).is_empty());
}

#[test]
fn test_unchanged_state_is_not_announced() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a")]);
    let mut tree = start(&graph);
    let a = id(&tree, "a");

    tree.set_state(a, WorkflowState::new(StateKind::Queued, ""));
    assert!(tree.drain().is_empty());

    tree.set_priority(a, Priority::LOW);
    let events = tree.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ChangeKind::Priority);
}

#[test]
fn test_timestamps_follow_lifecycle() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a")]);
    let mut tree = start(&graph);
    run(&mut tree, "a", StateKind::ExecutionComplete);

    let info = tree.node(id(&tree, "a")).info().clone();
    assert!(info.ready_date.is_some());
    assert!(info.execution_date.is_some());
    assert!(info.completion_date.is_some());
    assert!(info.ready_date <= info.execution_date);
}

#[test]
fn test_skeleton_mirrors_tree() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a"), task("b")])
        .with_post_conditions(WorkflowGraph::condition("post", vec![task("check")]));
    let tree = start(&graph);
    let skeleton = tree.skeleton(tree.root());

    assert_eq!(skeleton.sub_processors.len(), 2);
    assert_eq!(skeleton.post_conditions.as_ref().map(|p| p.is_condition), Some(true));
    assert_eq!(skeleton.find("check").map(|s| s.stub.priority), Some(Priority::MEDIUM.with_offset(TASK_PRIORITY_OFFSET)));
    assert_eq!(tree.stubs().len(), 5);
    assert!(tree.stubs().iter().all(|s| s.instance_id == "instance"));
}

#[test]
fn test_tree_survives_json_round_trip() {
    let graph = WorkflowGraph::sequential("wf", vec![task("a"), task("b")]);
    let mut tree = start(&graph);
    run(&mut tree, "a", StateKind::ExecutionComplete);

    let json = serde_json::to_string(&tree).unwrap();
    let restored: ProcessorTree = serde_json::from_str(&json).unwrap();
    assert_eq!(runnable(&restored), vec!["b".to_string()]);
    assert_eq!(restored.instance_id(), "instance");
}
