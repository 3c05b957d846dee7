// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::engine::channel::{EngineRequest, EngineResponse};
use crate::engine::queue::{PageFilter, QueuePage, RunnablesPage};
use crate::errors::{ChannelError, EngineError, EngineResult};
use crate::metadata::Metadata;
use crate::model::WorkflowGraph;
use crate::page::PageInfo;
use crate::priority::Priority;
use crate::processor::{ProcessorInfo, ProcessorSkeleton};
use crate::repository::{InstancePage, QueryExpression};
use crate::state::{StateKind, WorkflowState};
use crate::traits::{CommunicationChannel, TaskUpdate, WorkflowEngine};

/// A [`WorkflowEngine`] on the far side of a [`CommunicationChannel`].
///
/// Every failure, whether the channel's or the remote engine's, surfaces as
/// [`EngineError::Remote`].
#[derive(Clone)]
pub struct WorkflowEngineClient {
    channel: Arc<dyn CommunicationChannel>,
}

/// Sends a request and unpacks the one response variant it may produce.
macro_rules! call {
    ($client:expr, $request:expr, $variant:ident($value:ident) => $out:expr) => {{
        let request = $request;
        let op = request.op();
        match $client.channel.call(request).await? {
            EngineResponse::$variant($value) => Ok($out),
            _ => Err(unexpected(op)),
        }
    }};
    ($client:expr, $request:expr) => {{
        let request = $request;
        let op = request.op();
        match $client.channel.call(request).await? {
            EngineResponse::Done => Ok(()),
            _ => Err(unexpected(op)),
        }
    }};
}

fn unexpected(op: &str) -> EngineError {
    EngineError::Remote(ChannelError::UnexpectedResponse(op.to_string()))
}

fn owned(model_id: Option<&str>) -> Option<String> {
    model_id.map(str::to_string)
}

impl WorkflowEngineClient {
    pub fn new(channel: Arc<dyn CommunicationChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl WorkflowEngine for WorkflowEngineClient {
    async fn start_workflow(&self, model_id: &str, input: Metadata, priority: Option<Priority>) -> EngineResult<String> {
        call!(self, EngineRequest::StartWorkflow {
            model_id: model_id.to_string(),
            input,
            priority,
        }, InstanceId(id) => id)
    }

    async fn start_workflow_graph(
        &self,
        graph: WorkflowGraph,
        input: Metadata,
        priority: Option<Priority>,
    ) -> EngineResult<String> {
        call!(self, EngineRequest::StartWorkflowGraph { graph, input, priority }, InstanceId(id) => id)
    }

    async fn stop_workflow(&self, instance_id: &str) -> EngineResult<()> {
        call!(self, EngineRequest::StopWorkflow {
            instance_id: instance_id.to_string(),
        })
    }

    async fn pause_workflow(&self, instance_id: &str) -> EngineResult<()> {
        call!(self, EngineRequest::PauseWorkflow {
            instance_id: instance_id.to_string(),
        })
    }

    async fn resume_workflow(&self, instance_id: &str) -> EngineResult<()> {
        call!(self, EngineRequest::ResumeWorkflow {
            instance_id: instance_id.to_string(),
        })
    }

    async fn delete_workflow(&self, instance_id: &str) -> EngineResult<()> {
        call!(self, EngineRequest::DeleteWorkflow {
            instance_id: instance_id.to_string(),
        })
    }

    async fn trigger_event(&self, event_id: &str, input: Metadata) -> EngineResult<()> {
        call!(self, EngineRequest::TriggerEvent {
            event_id: event_id.to_string(),
            input,
        })
    }

    async fn get_registered_events(&self) -> EngineResult<Vec<String>> {
        call!(self, EngineRequest::GetRegisteredEvents, Names(names) => names)
    }

    async fn set_priority(&self, instance_id: &str, model_id: Option<&str>, priority: Priority) -> EngineResult<()> {
        call!(self, EngineRequest::SetPriority {
            instance_id: instance_id.to_string(),
            model_id: owned(model_id),
            priority,
        })
    }

    async fn set_state(&self, instance_id: &str, model_id: Option<&str>, state: WorkflowState) -> EngineResult<()> {
        call!(self, EngineRequest::SetState {
            instance_id: instance_id.to_string(),
            model_id: owned(model_id),
            state,
        })
    }

    async fn set_metadata(&self, instance_id: &str, model_id: Option<&str>, metadata: Metadata) -> EngineResult<()> {
        call!(self, EngineRequest::SetMetadata {
            instance_id: instance_id.to_string(),
            model_id: owned(model_id),
            metadata,
        })
    }

    async fn update_instance_metadata(&self, job_id: &str, metadata: Metadata) -> EngineResult<()> {
        call!(self, EngineRequest::UpdateInstanceMetadata {
            job_id: job_id.to_string(),
            metadata,
        })
    }

    async fn update_workflow_and_instance(&self, update: TaskUpdate) -> EngineResult<()> {
        call!(self, EngineRequest::UpdateWorkflowAndInstance { update })
    }

    async fn get_supported_states(&self) -> EngineResult<Vec<StateKind>> {
        call!(self, EngineRequest::GetSupportedStates, States(states) => states)
    }

    async fn get_supported_work_units(&self) -> EngineResult<Vec<String>> {
        call!(self, EngineRequest::GetSupportedWorkUnits, Names(names) => names)
    }

    async fn get_num_of_workflows(&self) -> EngineResult<usize> {
        call!(self, EngineRequest::GetNumOfWorkflows, Count(count) => count)
    }

    async fn get_workflow(&self, instance_id: &str) -> EngineResult<ProcessorSkeleton> {
        call!(self, EngineRequest::GetWorkflow {
            instance_id: instance_id.to_string(),
        }, Skeleton(skeleton) => skeleton)
    }

    async fn get_workflow_state(&self, instance_id: &str) -> EngineResult<WorkflowState> {
        call!(self, EngineRequest::GetWorkflowState {
            instance_id: instance_id.to_string(),
        }, State(state) => state)
    }

    async fn get_workflow_metadata(&self, instance_id: &str, model_id: Option<&str>) -> EngineResult<Metadata> {
        call!(self, EngineRequest::GetWorkflowMetadata {
            instance_id: instance_id.to_string(),
            model_id: owned(model_id),
        }, Metadata(metadata) => metadata)
    }

    async fn get_processor_info(&self, instance_id: &str, model_id: Option<&str>) -> EngineResult<ProcessorInfo> {
        call!(self, EngineRequest::GetProcessorInfo {
            instance_id: instance_id.to_string(),
            model_id: owned(model_id),
        }, Info(info) => info)
    }

    async fn get_instance_metadata(&self, job_id: &str) -> EngineResult<Option<Metadata>> {
        call!(self, EngineRequest::GetInstanceMetadata {
            job_id: job_id.to_string(),
        }, MaybeMetadata(metadata) => metadata)
    }

    async fn get_models(&self) -> EngineResult<Vec<WorkflowGraph>> {
        call!(self, EngineRequest::GetModels, Models(models) => models)
    }

    async fn get_model(&self, model_id: &str) -> EngineResult<WorkflowGraph> {
        call!(self, EngineRequest::GetModel {
            model_id: model_id.to_string(),
        }, Model(model) => model)
    }

    async fn refresh_models(&self) -> EngineResult<usize> {
        call!(self, EngineRequest::RefreshModels, Count(count) => count)
    }

    async fn get_page(&self, page: PageInfo, filter: PageFilter) -> EngineResult<QueuePage> {
        call!(self, EngineRequest::GetPage { page, filter }, QueuePage(page) => page)
    }

    async fn get_runnables_page(&self, page: PageInfo) -> EngineResult<RunnablesPage> {
        call!(self, EngineRequest::GetRunnablesPage { page }, RunnablesPage(page) => page)
    }

    async fn get_executing_page(&self, page: PageInfo) -> EngineResult<RunnablesPage> {
        call!(self, EngineRequest::GetExecutingPage { page }, RunnablesPage(page) => page)
    }

    async fn get_instance_page(&self, page: PageInfo, query: Option<QueryExpression>) -> EngineResult<InstancePage> {
        call!(self, EngineRequest::GetInstancePage { page, query }, InstancePage(page) => page)
    }

    async fn pause_runner(&self) -> EngineResult<()> {
        call!(self, EngineRequest::PauseRunner)
    }

    async fn resume_runner(&self) -> EngineResult<()> {
        call!(self, EngineRequest::ResumeRunner)
    }

    async fn is_runner_paused(&self) -> EngineResult<bool> {
        call!(self, EngineRequest::IsRunnerPaused, Flag(paused) => paused)
    }

    async fn get_launch_date(&self) -> EngineResult<DateTime<Utc>> {
        call!(self, EngineRequest::GetLaunchDate, Date(date) => date)
    }

    async fn shutdown(&self) -> EngineResult<()> {
        call!(self, EngineRequest::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Answers every call with one canned response and records the requests.
    struct CannedChannel {
        response: Result<EngineResponse, ChannelError>,
        seen: Mutex<Vec<EngineRequest>>,
    }

    #[async_trait]
    impl CommunicationChannel for CannedChannel {
        async fn call(&self, request: EngineRequest) -> Result<EngineResponse, ChannelError> {
            self.seen.lock().unwrap().push(request);
            self.response.clone()
        }
    }

    fn client(response: Result<EngineResponse, ChannelError>) -> (WorkflowEngineClient, Arc<CannedChannel>) {
        let channel = Arc::new(CannedChannel {
            response,
            seen: Mutex::new(Vec::new()),
        });
        (WorkflowEngineClient::new(channel.clone()), channel)
    }

    #[tokio::test]
    async fn test_requests_carry_the_arguments() {
        let (client, channel) = client(Ok(EngineResponse::Done));
        client
            .set_priority("i-1", Some("stage"), Priority::LOW)
            .await
            .unwrap();
        assert_eq!(
            channel.seen.lock().unwrap()[0],
            EngineRequest::SetPriority {
                instance_id: "i-1".into(),
                model_id: Some("stage".into()),
                priority: Priority::LOW,
            }
        );
    }

    #[tokio::test]
    async fn test_channel_failures_become_remote_errors() {
        let (client, _) = client(Err(ChannelError::Closed));
        let result = client.get_num_of_workflows().await;
        assert!(matches!(result, Err(EngineError::Remote(ChannelError::Closed))));
    }

    #[tokio::test]
    async fn test_mismatched_response_is_rejected() {
        let (client, _) = client(Ok(EngineResponse::Flag(true)));
        match client.get_num_of_workflows().await {
            Err(EngineError::Remote(ChannelError::UnexpectedResponse(op))) => {
                assert_eq!(op, "get_num_of_workflows");
            }
            other => panic!("expected unexpected-response error, got {other:?}"),
        }
    }
}
