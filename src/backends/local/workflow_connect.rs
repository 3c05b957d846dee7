// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Starts child workflows and waits for them.
//!
//! The first run starts `Connect/NumOfWorkflows` instances of
//! `Connect/ModelId` through the engine that dispatched the task, remembers
//! their instance ids and bails. Every later run looks at the children: any
//! that ended in something other than Success fails the task, all succeeding
//! joins their root metadata into the task's, and anything else bails again.

use anyhow::Context;
use async_trait::async_trait;

use crate::metadata::{keys, ControlMetadata, Metadata};
use crate::state::StateKind;
use crate::traits::{TaskContext, TaskOutcome, WorkUnit};

pub const CONNECT_MODEL_ID: &str = "Connect/ModelId";
pub const CONNECT_NUM_OF_WORKFLOWS: &str = "Connect/NumOfWorkflows";
/// When present, only these keys are joined from the children.
pub const CONNECT_JOIN_KEYS: &str = "Connect/JoinKeys";
/// Set on every child: the instance id of the workflow that started it.
pub const CONNECT_SPAWNED_BY: &str = "Connect/SpawnedBy";
/// Child instance ids, kept local to the connecting task.
pub const CONNECT_SPAWNED_WORKFLOWS: &str = "WorkflowProcessor/Local/Connect/SpawnedWorkflows";

pub struct WorkflowConnectUnit;

#[async_trait]
impl WorkUnit for WorkflowConnectUnit {
    async fn execute(&self, metadata: &mut ControlMetadata, task: &TaskContext) -> anyhow::Result<TaskOutcome> {
        let engine = task
            .engine()
            .context("workflow_connect needs an engine to start workflows")?;

        let spawned = metadata.get_all(CONNECT_SPAWNED_WORKFLOWS);
        if spawned.is_empty() {
            let model_id = metadata
                .get(CONNECT_MODEL_ID)
                .with_context(|| format!("{CONNECT_MODEL_ID} is not set"))?;
            let count: usize = match metadata.get(CONNECT_NUM_OF_WORKFLOWS) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{CONNECT_NUM_OF_WORKFLOWS} = '{raw}' is not a count"))?,
                None => 1,
            };

            let mut input = metadata.dynamic_metadata().without_group(keys::LOCAL_KEYS_GROUP);
            input.replace(CONNECT_SPAWNED_BY, task.instance_id.clone());
            let mut started = Vec::with_capacity(count);
            for _ in 0..count {
                started.push(engine.start_workflow(&model_id, input.clone(), None).await?);
            }
            metadata.replace_local(CONNECT_SPAWNED_WORKFLOWS, started);
            metadata.mark_workflow_key(CONNECT_SPAWNED_WORKFLOWS);
            return Ok(TaskOutcome::Bail(format!("Started {count} '{model_id}' workflows")));
        }

        let mut finished = 0;
        for instance_id in &spawned {
            let state = engine.get_workflow_state(instance_id).await?;
            if state.is_done() {
                if !state.is(StateKind::Success) {
                    return Ok(TaskOutcome::Failure(format!(
                        "Workflow {instance_id} ended in {}",
                        state.kind()
                    )));
                }
                finished += 1;
            }
        }
        if finished < spawned.len() {
            return Ok(TaskOutcome::Bail(format!(
                "{finished} of {} workflows finished",
                spawned.len()
            )));
        }

        let join_keys = metadata.get_all(CONNECT_JOIN_KEYS);
        let mut joined = Metadata::new();
        for instance_id in &spawned {
            let child = engine.get_workflow_metadata(instance_id, None).await?;
            joined.merge(&child.without_group(keys::LOCAL_KEYS_GROUP));
        }
        for (key, values) in joined.iter() {
            if key == CONNECT_SPAWNED_BY || (!join_keys.is_empty() && !join_keys.iter().any(|k| k == key)) {
                continue;
            }
            metadata.replace_local(key, values.to_vec());
            metadata.mark_workflow_key(key);
        }
        Ok(TaskOutcome::Success(format!("Joined {} workflows", spawned.len())))
    }

    fn name(&self) -> &'static str {
        "workflow_connect"
    }
}
