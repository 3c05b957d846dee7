// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::engine::queue::{PageFilter, QueuePage, RunnablesPage};
use crate::errors::EngineResult;
use crate::metadata::Metadata;
use crate::model::WorkflowGraph;
use crate::page::PageInfo;
use crate::priority::Priority;
use crate::processor::{ProcessorInfo, ProcessorSkeleton};
use crate::repository::{InstancePage, QueryExpression};
use crate::state::{StateKind, WorkflowState};
use crate::traits::TaskUpdate;

/// Every operation a workflow engine offers, local or remote.
///
/// Where an operation takes `model_id: Option<&str>`, `None` addresses the
/// root of the workflow instance.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    // ---- workflow lifecycle --------------------------------------------

    /// Builds a processor tree for a known model and queues it. Returns the
    /// new instance id.
    async fn start_workflow(&self, model_id: &str, input: Metadata, priority: Option<Priority>) -> EngineResult<String>;

    /// Same as [`Self::start_workflow`] for a graph the caller supplies.
    async fn start_workflow_graph(
        &self,
        graph: WorkflowGraph,
        input: Metadata,
        priority: Option<Priority>,
    ) -> EngineResult<String>;

    async fn stop_workflow(&self, instance_id: &str) -> EngineResult<()>;

    async fn pause_workflow(&self, instance_id: &str) -> EngineResult<()>;

    async fn resume_workflow(&self, instance_id: &str) -> EngineResult<()>;

    async fn delete_workflow(&self, instance_id: &str) -> EngineResult<()>;

    // ---- events --------------------------------------------------------

    async fn trigger_event(&self, event_id: &str, input: Metadata) -> EngineResult<()>;

    async fn get_registered_events(&self) -> EngineResult<Vec<String>>;

    // ---- mutators ------------------------------------------------------

    async fn set_priority(&self, instance_id: &str, model_id: Option<&str>, priority: Priority) -> EngineResult<()>;

    async fn set_state(&self, instance_id: &str, model_id: Option<&str>, state: WorkflowState) -> EngineResult<()>;

    async fn set_metadata(&self, instance_id: &str, model_id: Option<&str>, metadata: Metadata) -> EngineResult<()>;

    async fn update_workflow_metadata(
        &self,
        instance_id: &str,
        model_id: Option<&str>,
        metadata: Metadata,
    ) -> EngineResult<()> {
        self.set_metadata(instance_id, model_id, metadata).await
    }

    async fn update_instance_metadata(&self, job_id: &str, metadata: Metadata) -> EngineResult<()>;

    /// A running task's report: its metadata, its state and its instance
    /// metadata in one call. Reports for tasks that are no longer in flight
    /// are dropped.
    async fn update_workflow_and_instance(&self, update: TaskUpdate) -> EngineResult<()>;

    // ---- queries -------------------------------------------------------

    async fn get_supported_states(&self) -> EngineResult<Vec<StateKind>> {
        Ok(StateKind::ALL.to_vec())
    }

    async fn get_supported_work_units(&self) -> EngineResult<Vec<String>>;

    async fn get_num_of_workflows(&self) -> EngineResult<usize>;

    async fn get_workflow(&self, instance_id: &str) -> EngineResult<ProcessorSkeleton>;

    async fn get_workflow_state(&self, instance_id: &str) -> EngineResult<WorkflowState>;

    async fn get_workflow_metadata(&self, instance_id: &str, model_id: Option<&str>) -> EngineResult<Metadata>;

    async fn get_processor_info(&self, instance_id: &str, model_id: Option<&str>) -> EngineResult<ProcessorInfo>;

    async fn get_instance_metadata(&self, job_id: &str) -> EngineResult<Option<Metadata>>;

    // ---- models --------------------------------------------------------

    async fn get_models(&self) -> EngineResult<Vec<WorkflowGraph>>;

    async fn get_model(&self, model_id: &str) -> EngineResult<WorkflowGraph>;

    /// Reloads models from the repository; returns how many are known.
    async fn refresh_models(&self) -> EngineResult<usize>;

    // ---- pages ---------------------------------------------------------

    async fn get_page(&self, page: PageInfo, filter: PageFilter) -> EngineResult<QueuePage>;

    async fn get_next_page(&self, page: &QueuePage) -> EngineResult<QueuePage> {
        self.get_page(page.info.page_info().next(), page.filter.clone()).await
    }

    async fn get_runnables_page(&self, page: PageInfo) -> EngineResult<RunnablesPage>;

    async fn get_executing_page(&self, page: PageInfo) -> EngineResult<RunnablesPage>;

    async fn get_instance_page(&self, page: PageInfo, query: Option<QueryExpression>) -> EngineResult<InstancePage>;

    async fn get_next_instance_page(&self, page: &InstancePage) -> EngineResult<InstancePage> {
        self.get_instance_page(page.info.page_info().next(), page.query.clone())
            .await
    }

    // ---- runner --------------------------------------------------------

    async fn pause_runner(&self) -> EngineResult<()>;

    async fn resume_runner(&self) -> EngineResult<()>;

    async fn is_runner_paused(&self) -> EngineResult<bool>;

    async fn get_launch_date(&self) -> EngineResult<DateTime<Utc>>;

    async fn shutdown(&self) -> EngineResult<()>;
}
