// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::{BTreeSet, HashSet};

use crate::errors::GraphError;
use crate::metadata::Metadata;
use crate::model::{ExecutionType, WorkflowGraph};
use crate::priority::Priority;
use crate::state::{StateKind, WorkflowState};

use super::node::{NodeId, NodeKind, ProcessorInfo, ProcessorNode, Relation, TaskBinding};
use super::tree::ProcessorTree;

/// Builds a fresh processor tree for one workflow instance.
///
/// Every node starts `Loaded` at medium priority. Static metadata is inherited
/// downward, with each node's own keys overriding its parent's. Model ids must
/// be unique across the whole graph, conditions included.
pub fn build_tree(instance_id: impl Into<String>, graph: &WorkflowGraph) -> Result<ProcessorTree, GraphError> {
    check_unique_ids(graph, &mut HashSet::new())?;
    let mut nodes = Vec::new();
    let root = add_node(&mut nodes, graph, None, &Metadata::new())?;
    Ok(ProcessorTree::from_parts(instance_id.into(), nodes, root))
}

fn add_node(
    nodes: &mut Vec<ProcessorNode>,
    graph: &WorkflowGraph,
    parent: Option<(NodeId, Relation)>,
    inherited: &Metadata,
) -> Result<NodeId, GraphError> {
    let kind = validate(graph)?;

    let mut static_metadata = inherited.clone();
    static_metadata.overlay(&graph.static_metadata);

    let id = NodeId(nodes.len());
    nodes.push(ProcessorNode {
        id,
        model_id: graph.id.clone(),
        model_name: graph.display_name().to_string(),
        execution_type: graph.execution_type,
        kind,
        parent,
        children: Vec::new(),
        pre_conditions: None,
        post_conditions: None,
        state: WorkflowState::new(StateKind::Loaded, ""),
        priority: Priority::default(),
        static_metadata: static_metadata.clone(),
        dynamic_metadata: Metadata::new(),
        excused: graph.excused.iter().cloned().collect::<BTreeSet<_>>(),
        min_req_successful: graph.min_req_successful,
        is_condition: graph.execution_type == ExecutionType::Condition,
        times_blocked: 0,
        info: ProcessorInfo::new(),
        job_id: None,
    });

    if let Some(pre) = &graph.pre_conditions {
        let pre = add_node(nodes, pre, Some((id, Relation::PreCondition)), &static_metadata)?;
        nodes[id.0].pre_conditions = Some(pre);
    }
    for child in &graph.children {
        let child = add_node(nodes, child, Some((id, Relation::SubProcessor)), &static_metadata)?;
        nodes[id.0].children.push(child);
    }
    if let Some(post) = &graph.post_conditions {
        let post = add_node(nodes, post, Some((id, Relation::PostCondition)), &static_metadata)?;
        nodes[id.0].post_conditions = Some(post);
    }
    Ok(id)
}

fn check_unique_ids<'a>(graph: &'a WorkflowGraph, seen: &mut HashSet<&'a str>) -> Result<(), GraphError> {
    if !seen.insert(graph.id.as_str()) {
        return Err(GraphError::DuplicateModelId(graph.id.clone()));
    }
    graph
        .pre_conditions
        .iter()
        .map(|pre| &**pre)
        .chain(graph.children.iter())
        .chain(graph.post_conditions.iter().map(|post| &**post))
        .try_for_each(|next| check_unique_ids(next, seen))
}

fn validate(graph: &WorkflowGraph) -> Result<NodeKind, GraphError> {
    let kind = match graph.execution_type {
        ExecutionType::Task => {
            if !graph.children.is_empty() {
                return Err(GraphError::TaskWithChildren(graph.id.clone()));
            }
            let work_unit = graph
                .work_unit
                .clone()
                .filter(|unit| !unit.trim().is_empty())
                .ok_or_else(|| GraphError::MissingWorkUnit(graph.id.clone()))?;
            return Ok(NodeKind::Task(TaskBinding { work_unit }));
        }
        ExecutionType::Sequential => NodeKind::Sequential,
        ExecutionType::Parallel => NodeKind::Parallel,
        ExecutionType::Condition => NodeKind::Parallel,
    };

    if graph.children.is_empty() {
        return Err(GraphError::EmptyComposite(graph.id.clone()));
    }
    let children = graph.children.len();
    let min_req = graph.min_req_successful;
    if min_req != -1 && !(0..=children as i64).contains(&i64::from(min_req)) {
        return Err(GraphError::InvalidThreshold {
            model_id: graph.id.clone(),
            min_req,
            children,
        });
    }
    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_arena_with_back_references() {
        let graph = WorkflowGraph::sequential(
            "root",
            vec![WorkflowGraph::task("a", "noop"), WorkflowGraph::task("b", "noop")],
        )
        .with_pre_conditions(WorkflowGraph::condition("pre", vec![WorkflowGraph::task("check", "noop")]));

        let tree = build_tree("instance-1", &graph).unwrap();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.instance_id(), "instance-1");

        let root = tree.root_node();
        assert_eq!(root.children().len(), 2);
        let pre = root.pre_conditions().unwrap();
        assert!(tree.node(pre).is_condition());
        assert_eq!(tree.node(pre).parent(), Some((tree.root(), Relation::PreCondition)));

        let b = tree.find("b").unwrap();
        assert_eq!(tree.node(b).work_unit(), Some("noop"));
        assert_eq!(tree.node(b).state().kind(), StateKind::Loaded);
    }

    #[test]
    fn test_rejects_repeated_model_ids() {
        let siblings = WorkflowGraph::sequential(
            "dup",
            vec![WorkflowGraph::task("step", "noop"), WorkflowGraph::task("step", "noop")],
        );
        assert_eq!(build_tree("i", &siblings).unwrap_err(), GraphError::DuplicateModelId("step".into()));

        let across_condition = WorkflowGraph::sequential("root", vec![WorkflowGraph::task("check", "child")])
            .with_pre_conditions(WorkflowGraph::condition("pre", vec![WorkflowGraph::task("check", "pre")]));
        assert_eq!(
            build_tree("i", &across_condition).unwrap_err(),
            GraphError::DuplicateModelId("check".into())
        );

        let root_reused = WorkflowGraph::parallel("root", vec![WorkflowGraph::task("root", "noop")]);
        assert_eq!(build_tree("i", &root_reused).unwrap_err(), GraphError::DuplicateModelId("root".into()));
    }

    #[test]
    fn test_static_metadata_is_inherited_and_overridden() {
        let graph = WorkflowGraph::sequential(
            "root",
            vec![
                WorkflowGraph::task("a", "noop"),
                WorkflowGraph::task("b", "noop").with_static("QueueName", "fast"),
            ],
        )
        .with_static("QueueName", "default")
        .with_static("Site", "jpl");

        let tree = build_tree("i", &graph).unwrap();
        let a = tree.node(tree.find("a").unwrap());
        let b = tree.node(tree.find("b").unwrap());
        assert_eq!(a.static_metadata().get("QueueName"), Some("default"));
        assert_eq!(b.static_metadata().get("QueueName"), Some("fast"));
        assert_eq!(b.static_metadata().get("Site"), Some("jpl"));
    }

    #[test]
    fn test_rejects_malformed_graphs() {
        let mut task = WorkflowGraph::task("t", "noop");
        task.children.push(WorkflowGraph::task("x", "noop"));
        assert_eq!(build_tree("i", &task).unwrap_err(), GraphError::TaskWithChildren("t".into()));

        let mut unbound = WorkflowGraph::task("t", "noop");
        unbound.work_unit = None;
        assert_eq!(build_tree("i", &unbound).unwrap_err(), GraphError::MissingWorkUnit("t".into()));

        let empty = WorkflowGraph::parallel("p", Vec::new());
        assert_eq!(build_tree("i", &empty).unwrap_err(), GraphError::EmptyComposite("p".into()));

        let threshold = WorkflowGraph::parallel("p", vec![WorkflowGraph::task("a", "noop")]).with_min_req_successful(3);
        assert!(matches!(
            build_tree("i", &threshold).unwrap_err(),
            GraphError::InvalidThreshold { min_req: 3, children: 1, .. }
        ));
    }

    #[test]
    fn test_conditions_may_carry_their_own_conditions() {
        let nested = WorkflowGraph::condition("c", vec![WorkflowGraph::task("a", "noop")])
            .with_pre_conditions(WorkflowGraph::condition("cc", vec![WorkflowGraph::task("b", "noop")]));
        let tree = build_tree("i", &nested).unwrap();
        let pre = tree.root_node().pre_conditions().unwrap();
        assert!(tree.root_node().is_condition());
        assert_eq!(tree.node(pre).parent(), Some((tree.root(), Relation::PreCondition)));
    }

    #[test]
    fn test_errors_inside_condition_trees_surface() {
        let graph = WorkflowGraph::sequential("root", vec![WorkflowGraph::task("a", "noop")])
            .with_post_conditions(WorkflowGraph::condition("post", Vec::new()));
        assert_eq!(build_tree("i", &graph).unwrap_err(), GraphError::EmptyComposite("post".into()));
    }
}
