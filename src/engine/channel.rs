// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Wire messages between an engine client and an engine, and an in-process
//! channel that carries them.
//!
//! Every [`WorkflowEngine`] operation has one request variant. Requests and
//! responses are plain serde data; [`LoopbackChannel`] pushes both through
//! JSON so an in-process client exercises the same encoding a network
//! transport would.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::queue::{PageFilter, QueuePage, RunnablesPage};
use crate::errors::{ChannelError, EngineResult};
use crate::metadata::Metadata;
use crate::model::WorkflowGraph;
use crate::page::PageInfo;
use crate::priority::Priority;
use crate::processor::{ProcessorInfo, ProcessorSkeleton};
use crate::repository::{InstancePage, QueryExpression};
use crate::state::{StateKind, WorkflowState};
use crate::traits::{CommunicationChannel, TaskUpdate, WorkflowEngine};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EngineRequest {
    StartWorkflow {
        model_id: String,
        input: Metadata,
        priority: Option<Priority>,
    },
    StartWorkflowGraph {
        graph: WorkflowGraph,
        input: Metadata,
        priority: Option<Priority>,
    },
    StopWorkflow { instance_id: String },
    PauseWorkflow { instance_id: String },
    ResumeWorkflow { instance_id: String },
    DeleteWorkflow { instance_id: String },
    TriggerEvent { event_id: String, input: Metadata },
    GetRegisteredEvents,
    SetPriority {
        instance_id: String,
        model_id: Option<String>,
        priority: Priority,
    },
    SetState {
        instance_id: String,
        model_id: Option<String>,
        state: WorkflowState,
    },
    SetMetadata {
        instance_id: String,
        model_id: Option<String>,
        metadata: Metadata,
    },
    UpdateInstanceMetadata { job_id: String, metadata: Metadata },
    UpdateWorkflowAndInstance { update: TaskUpdate },
    GetSupportedStates,
    GetSupportedWorkUnits,
    GetNumOfWorkflows,
    GetWorkflow { instance_id: String },
    GetWorkflowState { instance_id: String },
    GetWorkflowMetadata {
        instance_id: String,
        model_id: Option<String>,
    },
    GetProcessorInfo {
        instance_id: String,
        model_id: Option<String>,
    },
    GetInstanceMetadata { job_id: String },
    GetModels,
    GetModel { model_id: String },
    RefreshModels,
    GetPage { page: PageInfo, filter: PageFilter },
    GetRunnablesPage { page: PageInfo },
    GetExecutingPage { page: PageInfo },
    GetInstancePage {
        page: PageInfo,
        query: Option<QueryExpression>,
    },
    PauseRunner,
    ResumeRunner,
    IsRunnerPaused,
    GetLaunchDate,
    Shutdown,
}

impl EngineRequest {
    /// Operation name, as it appears on the wire.
    pub fn op(&self) -> &'static str {
        match self {
            EngineRequest::StartWorkflow { .. } => "start_workflow",
            EngineRequest::StartWorkflowGraph { .. } => "start_workflow_graph",
            EngineRequest::StopWorkflow { .. } => "stop_workflow",
            EngineRequest::PauseWorkflow { .. } => "pause_workflow",
            EngineRequest::ResumeWorkflow { .. } => "resume_workflow",
            EngineRequest::DeleteWorkflow { .. } => "delete_workflow",
            EngineRequest::TriggerEvent { .. } => "trigger_event",
            EngineRequest::GetRegisteredEvents => "get_registered_events",
            EngineRequest::SetPriority { .. } => "set_priority",
            EngineRequest::SetState { .. } => "set_state",
            EngineRequest::SetMetadata { .. } => "set_metadata",
            EngineRequest::UpdateInstanceMetadata { .. } => "update_instance_metadata",
            EngineRequest::UpdateWorkflowAndInstance { .. } => "update_workflow_and_instance",
            EngineRequest::GetSupportedStates => "get_supported_states",
            EngineRequest::GetSupportedWorkUnits => "get_supported_work_units",
            EngineRequest::GetNumOfWorkflows => "get_num_of_workflows",
            EngineRequest::GetWorkflow { .. } => "get_workflow",
            EngineRequest::GetWorkflowState { .. } => "get_workflow_state",
            EngineRequest::GetWorkflowMetadata { .. } => "get_workflow_metadata",
            EngineRequest::GetProcessorInfo { .. } => "get_processor_info",
            EngineRequest::GetInstanceMetadata { .. } => "get_instance_metadata",
            EngineRequest::GetModels => "get_models",
            EngineRequest::GetModel { .. } => "get_model",
            EngineRequest::RefreshModels => "refresh_models",
            EngineRequest::GetPage { .. } => "get_page",
            EngineRequest::GetRunnablesPage { .. } => "get_runnables_page",
            EngineRequest::GetExecutingPage { .. } => "get_executing_page",
            EngineRequest::GetInstancePage { .. } => "get_instance_page",
            EngineRequest::PauseRunner => "pause_runner",
            EngineRequest::ResumeRunner => "resume_runner",
            EngineRequest::IsRunnerPaused => "is_runner_paused",
            EngineRequest::GetLaunchDate => "get_launch_date",
            EngineRequest::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EngineResponse {
    Done,
    InstanceId(String),
    Names(Vec<String>),
    States(Vec<StateKind>),
    Count(usize),
    Flag(bool),
    State(WorkflowState),
    Metadata(Metadata),
    MaybeMetadata(Option<Metadata>),
    Skeleton(ProcessorSkeleton),
    Info(ProcessorInfo),
    Models(Vec<WorkflowGraph>),
    Model(WorkflowGraph),
    QueuePage(QueuePage),
    RunnablesPage(RunnablesPage),
    InstancePage(InstancePage),
    Date(DateTime<Utc>),
}

/// Runs one request against `engine`.
pub async fn dispatch(engine: &dyn WorkflowEngine, request: EngineRequest) -> EngineResult<EngineResponse> {
    use EngineRequest as Rq;
    use EngineResponse as Rs;

    let response = match request {
        Rq::StartWorkflow {
            model_id,
            input,
            priority,
        } => Rs::InstanceId(engine.start_workflow(&model_id, input, priority).await?),
        Rq::StartWorkflowGraph { graph, input, priority } => {
            Rs::InstanceId(engine.start_workflow_graph(graph, input, priority).await?)
        }
        Rq::StopWorkflow { instance_id } => {
            engine.stop_workflow(&instance_id).await?;
            Rs::Done
        }
        Rq::PauseWorkflow { instance_id } => {
            engine.pause_workflow(&instance_id).await?;
            Rs::Done
        }
        Rq::ResumeWorkflow { instance_id } => {
            engine.resume_workflow(&instance_id).await?;
            Rs::Done
        }
        Rq::DeleteWorkflow { instance_id } => {
            engine.delete_workflow(&instance_id).await?;
            Rs::Done
        }
        Rq::TriggerEvent { event_id, input } => {
            engine.trigger_event(&event_id, input).await?;
            Rs::Done
        }
        Rq::GetRegisteredEvents => Rs::Names(engine.get_registered_events().await?),
        Rq::SetPriority {
            instance_id,
            model_id,
            priority,
        } => {
            engine
                .set_priority(&instance_id, model_id.as_deref(), priority)
                .await?;
            Rs::Done
        }
        Rq::SetState {
            instance_id,
            model_id,
            state,
        } => {
            engine.set_state(&instance_id, model_id.as_deref(), state).await?;
            Rs::Done
        }
        Rq::SetMetadata {
            instance_id,
            model_id,
            metadata,
        } => {
            engine
                .set_metadata(&instance_id, model_id.as_deref(), metadata)
                .await?;
            Rs::Done
        }
        Rq::UpdateInstanceMetadata { job_id, metadata } => {
            engine.update_instance_metadata(&job_id, metadata).await?;
            Rs::Done
        }
        Rq::UpdateWorkflowAndInstance { update } => {
            engine.update_workflow_and_instance(update).await?;
            Rs::Done
        }
        Rq::GetSupportedStates => Rs::States(engine.get_supported_states().await?),
        Rq::GetSupportedWorkUnits => Rs::Names(engine.get_supported_work_units().await?),
        Rq::GetNumOfWorkflows => Rs::Count(engine.get_num_of_workflows().await?),
        Rq::GetWorkflow { instance_id } => Rs::Skeleton(engine.get_workflow(&instance_id).await?),
        Rq::GetWorkflowState { instance_id } => Rs::State(engine.get_workflow_state(&instance_id).await?),
        Rq::GetWorkflowMetadata { instance_id, model_id } => Rs::Metadata(
            engine
                .get_workflow_metadata(&instance_id, model_id.as_deref())
                .await?,
        ),
        Rq::GetProcessorInfo { instance_id, model_id } => Rs::Info(
            engine
                .get_processor_info(&instance_id, model_id.as_deref())
                .await?,
        ),
        Rq::GetInstanceMetadata { job_id } => Rs::MaybeMetadata(engine.get_instance_metadata(&job_id).await?),
        Rq::GetModels => Rs::Models(engine.get_models().await?),
        Rq::GetModel { model_id } => Rs::Model(engine.get_model(&model_id).await?),
        Rq::RefreshModels => Rs::Count(engine.refresh_models().await?),
        Rq::GetPage { page, filter } => Rs::QueuePage(engine.get_page(page, filter).await?),
        Rq::GetRunnablesPage { page } => Rs::RunnablesPage(engine.get_runnables_page(page).await?),
        Rq::GetExecutingPage { page } => Rs::RunnablesPage(engine.get_executing_page(page).await?),
        Rq::GetInstancePage { page, query } => Rs::InstancePage(engine.get_instance_page(page, query).await?),
        Rq::PauseRunner => {
            engine.pause_runner().await?;
            Rs::Done
        }
        Rq::ResumeRunner => {
            engine.resume_runner().await?;
            Rs::Done
        }
        Rq::IsRunnerPaused => Rs::Flag(engine.is_runner_paused().await?),
        Rq::GetLaunchDate => Rs::Date(engine.get_launch_date().await?),
        Rq::Shutdown => {
            engine.shutdown().await?;
            Rs::Done
        }
    };
    Ok(response)
}

/// Delivers requests to an engine in the same process, through JSON.
///
/// Engine errors come back as [`ChannelError::Remote`] carrying the error's
/// message, the same way a remote engine would report them.
pub struct LoopbackChannel {
    engine: Arc<dyn WorkflowEngine>,
}

impl LoopbackChannel {
    pub fn new(engine: Arc<dyn WorkflowEngine>) -> Self {
        Self { engine }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, ChannelError> {
    serde_json::to_string(value).map_err(|e| ChannelError::Transport(e.to_string()))
}

fn decode<T: for<'de> Deserialize<'de>>(wire: &str) -> Result<T, ChannelError> {
    serde_json::from_str(wire).map_err(|e| ChannelError::Transport(e.to_string()))
}

#[async_trait]
impl CommunicationChannel for LoopbackChannel {
    async fn call(&self, request: EngineRequest) -> Result<EngineResponse, ChannelError> {
        let request: EngineRequest = decode(&encode(&request)?)?;
        let response = dispatch(self.engine.as_ref(), request)
            .await
            .map_err(|e| ChannelError::Remote(e.to_string()))?;
        decode(&encode(&response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_are_tagged_by_operation() {
        let request = EngineRequest::SetPriority {
            instance_id: "i-1".into(),
            model_id: None,
            priority: Priority::HIGH,
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["op"], request.op());
        assert_eq!(wire["priority"], 7.5);
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let result: Result<EngineRequest, _> = decode(r#"{"op":"format_disk"}"#);
        assert!(matches!(result, Err(ChannelError::Transport(_))));
    }
}
