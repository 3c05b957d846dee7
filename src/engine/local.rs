// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The in-process workflow engine and its driver loop.
//!
//! ## Driver loop
//!
//! One tokio task hands work from the queue manager to the runner:
//!
//! 1. While the runner is paused, wait for it to resume.
//! 2. Take the task held from the last round, or ask the queue manager for
//!    the next one.
//! 3. When the runner has no open slot for it, hold it and wait.
//! 4. Otherwise dispatch it. A dispatch error fails the task; the loop keeps
//!    going.
//!
//! Waiting ends on a work signal from the queue manager, a pause flag
//! change, shutdown, or after the poll interval, whichever comes first. The
//! poll interval is what wakes blocked tasks whose block time has elapsed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backends::local::WorkUnitRegistry;
use crate::config::EngineConfig;
use crate::engine::queue::{PageFilter, QueueManager, QueuePage, RunnablesPage};
use crate::engine::runner::LocalEngineRunner;
use crate::errors::{EngineError, EngineResult, GraphError};
use crate::metadata::{keys, Metadata};
use crate::model::{ExecutionType, WorkflowGraph};
use crate::observability::messages::engine::{
    DispatchFailed, EngineShutdown, EngineStarted, EventTriggered, ModelsLoaded, RunnerPauseChanged,
    WorkflowOperatorAction, WorkflowStarted,
};
use crate::observability::messages::processor::TreeBuilt;
use crate::observability::messages::StructuredLog;
use crate::page::PageInfo;
use crate::priority::Priority;
use crate::processor::{build_tree, ProcessorInfo, ProcessorSkeleton};
use crate::repository::{
    InMemoryEventRepository, InMemoryInstanceRepository, InMemoryModelRepository, InstancePage, QueryExpression,
};
use crate::state::{StateKind, WorkflowState};
use crate::traits::{
    EngineRunner, EventRepository, InstanceRepository, ModelRepository, ProcessorRepository, TaskDispatch, TaskUpdate,
    WorkflowEngine, WorkflowEngineEvent,
};

/// Collaborators and settings for a [`LocalWorkflowEngine`].
///
/// Anything not supplied falls back to an in-memory repository, the built-in
/// work units and a [`LocalEngineRunner`] sized from the config.
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    models: Option<Arc<dyn ModelRepository>>,
    instances: Option<Arc<dyn InstanceRepository>>,
    events: Option<Arc<dyn EventRepository>>,
    processors: Option<Arc<dyn ProcessorRepository>>,
    registry: Option<WorkUnitRegistry>,
    runner: Option<Arc<dyn EngineRunner>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn with_model_repository(mut self, models: Arc<dyn ModelRepository>) -> Self {
        self.models = Some(models);
        self
    }

    pub fn with_instance_repository(mut self, instances: Arc<dyn InstanceRepository>) -> Self {
        self.instances = Some(instances);
        self
    }

    pub fn with_event_repository(mut self, events: Arc<dyn EventRepository>) -> Self {
        self.events = Some(events);
        self
    }

    /// Keeps processor snapshots so workflows survive a restart.
    pub fn with_processor_repository(mut self, processors: Arc<dyn ProcessorRepository>) -> Self {
        self.processors = Some(processors);
        self
    }

    pub fn with_work_units(mut self, registry: WorkUnitRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replaces the local runner. The registry still decides which work
    /// units workflows may name.
    pub fn with_runner(mut self, runner: Arc<dyn EngineRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Loads models and stored snapshots, then starts the driver loop.
    pub async fn start(self) -> EngineResult<LocalWorkflowEngine> {
        let registry = Arc::new(self.registry.unwrap_or_else(WorkUnitRegistry::with_builtins));
        let runner = match self.runner {
            Some(runner) => runner,
            None => Arc::new(LocalEngineRunner::from_config(Arc::clone(&registry), &self.config)),
        };
        let queue = match self.processors {
            Some(processors) => QueueManager::with_repository(processors),
            None => QueueManager::new(),
        };
        queue.load_repository().await?;

        let (paused, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            queue,
            models: RwLock::new(HashMap::new()),
            model_repository: self
                .models
                .unwrap_or_else(|| Arc::new(InMemoryModelRepository::default())),
            instance_repository: self
                .instances
                .unwrap_or_else(|| Arc::new(InMemoryInstanceRepository::new())),
            event_repository: self
                .events
                .unwrap_or_else(|| Arc::new(InMemoryEventRepository::new())),
            runner,
            work_units: registry.names(),
            config: self.config,
            paused,
            shutdown: CancellationToken::new(),
            launched: Utc::now(),
            driver: Mutex::new(None),
        });
        let engine = LocalWorkflowEngine { shared };
        let model_count = engine.refresh_models().await?;
        EngineStarted {
            max_concurrency: engine.shared.config.get_max_concurrency(),
            poll_interval_ms: engine.shared.config.get_poll_interval().as_millis() as u64,
            model_count,
        }
        .log();

        let driver = tokio::spawn(drive(engine.clone()));
        *engine.shared.driver.lock().await = Some(driver);
        Ok(engine)
    }
}

struct Shared {
    queue: QueueManager,
    models: RwLock<HashMap<String, WorkflowGraph>>,
    model_repository: Arc<dyn ModelRepository>,
    instance_repository: Arc<dyn InstanceRepository>,
    event_repository: Arc<dyn EventRepository>,
    runner: Arc<dyn EngineRunner>,
    work_units: Vec<String>,
    config: EngineConfig,
    paused: watch::Sender<bool>,
    shutdown: CancellationToken,
    launched: DateTime<Utc>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

/// A workflow engine running in this process. Cheap to clone; clones share
/// one engine.
#[derive(Clone)]
pub struct LocalWorkflowEngine {
    shared: Arc<Shared>,
}

impl LocalWorkflowEngine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Makes an event available to [`WorkflowEngine::trigger_event`].
    pub async fn register_event(&self, event: Arc<dyn WorkflowEngineEvent>) -> EngineResult<()> {
        self.shared.event_repository.store_event(event).await?;
        Ok(())
    }

    pub fn queue(&self) -> &QueueManager {
        &self.shared.queue
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Rejects graphs naming work units nobody can run.
    fn check_work_units(&self, graph: &WorkflowGraph) -> EngineResult<()> {
        if let Some(work_unit) = &graph.work_unit {
            if !self.shared.work_units.contains(work_unit) {
                return Err(EngineError::UnknownWorkUnit(work_unit.clone()));
            }
        }
        graph
            .children
            .iter()
            .chain(graph.pre_conditions.as_deref())
            .chain(graph.post_conditions.as_deref())
            .try_for_each(|child| self.check_work_units(child))
    }

    fn ensure_running(&self) -> EngineResult<()> {
        if self.shared.shutdown.is_cancelled() {
            return Err(EngineError::Shutdown);
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowEngine for LocalWorkflowEngine {
    async fn start_workflow(&self, model_id: &str, input: Metadata, priority: Option<Priority>) -> EngineResult<String> {
        let graph = self.get_model(model_id).await?;
        self.start_workflow_graph(graph, input, priority).await
    }

    async fn start_workflow_graph(
        &self,
        graph: WorkflowGraph,
        input: Metadata,
        priority: Option<Priority>,
    ) -> EngineResult<String> {
        self.ensure_running()?;
        self.check_work_units(&graph)?;
        let instance_id = Uuid::new_v4().to_string();
        let mut tree = build_tree(instance_id.clone(), &graph)?;
        TreeBuilt {
            instance_id: &instance_id,
            model_id: &graph.id,
            node_count: tree.len(),
        }
        .log();

        let root = tree.root();
        let priority = priority.unwrap_or_else(|| self.shared.config.get_default_priority());
        tree.set_dynamic_metadata_recur(root, input);
        tree.set_priority_recur(root, priority);
        self.shared.queue.add_to_queue(tree).await?;
        WorkflowStarted {
            instance_id: &instance_id,
            model_id: &graph.id,
            priority: priority.value(),
        }
        .log();
        Ok(instance_id)
    }

    async fn stop_workflow(&self, instance_id: &str) -> EngineResult<()> {
        WorkflowOperatorAction {
            instance_id,
            action: "stop",
        }
        .log();
        self.shared
            .queue
            .set_state_recur(instance_id, None, WorkflowState::new(StateKind::Stopped, "Stopped by operator"))
            .await
    }

    async fn pause_workflow(&self, instance_id: &str) -> EngineResult<()> {
        WorkflowOperatorAction {
            instance_id,
            action: "pause",
        }
        .log();
        self.shared
            .queue
            .set_state_recur(instance_id, None, WorkflowState::new(StateKind::Paused, "Paused by operator"))
            .await
    }

    async fn resume_workflow(&self, instance_id: &str) -> EngineResult<()> {
        WorkflowOperatorAction {
            instance_id,
            action: "resume",
        }
        .log();
        self.shared.queue.revert_state_recur(instance_id, None).await?;
        Ok(())
    }

    async fn delete_workflow(&self, instance_id: &str) -> EngineResult<()> {
        WorkflowOperatorAction {
            instance_id,
            action: "delete",
        }
        .log();
        self.shared.queue.delete_workflow_processor(instance_id).await?;
        self.shared
            .instance_repository
            .remove_instance_metadatas(instance_id)
            .await?;
        Ok(())
    }

    async fn trigger_event(&self, event_id: &str, input: Metadata) -> EngineResult<()> {
        let event = self
            .shared
            .event_repository
            .get_event(event_id)
            .await?
            .ok_or_else(|| EngineError::UnknownEvent(event_id.to_string()))?;
        if !event.passes_preconditions(self).await? {
            return Err(EngineError::EventPreconditionFailed(event_id.to_string()));
        }
        EventTriggered { event_id }.log();
        event.perform_action(self, input).await
    }

    async fn get_registered_events(&self) -> EngineResult<Vec<String>> {
        Ok(self.shared.event_repository.event_ids().await?)
    }

    async fn set_priority(&self, instance_id: &str, model_id: Option<&str>, priority: Priority) -> EngineResult<()> {
        self.shared
            .queue
            .set_priority(instance_id, model_id, priority)
            .await?;
        Ok(())
    }

    async fn set_state(&self, instance_id: &str, model_id: Option<&str>, state: WorkflowState) -> EngineResult<()> {
        self.shared.queue.set_state(instance_id, model_id, state).await
    }

    async fn set_metadata(&self, instance_id: &str, model_id: Option<&str>, metadata: Metadata) -> EngineResult<()> {
        self.shared
            .queue
            .set_metadata(instance_id, model_id, metadata)
            .await
    }

    async fn update_instance_metadata(&self, job_id: &str, metadata: Metadata) -> EngineResult<()> {
        self.shared
            .instance_repository
            .store_instance_metadata(job_id, metadata)
            .await?;
        Ok(())
    }

    async fn update_workflow_and_instance(&self, update: TaskUpdate) -> EngineResult<()> {
        if !self.shared.queue.apply_task_update(&update).await? {
            return Ok(());
        }
        if let Some(mut instance) = update.instance_metadata {
            instance.replace(keys::INSTANCE_ID, update.instance_id.clone());
            instance.replace(keys::MODEL_ID, update.model_id.clone());
            instance.replace(keys::JOB_ID, update.job_id.clone());
            instance.replace(keys::STATE, update.state.kind().name());
            self.update_instance_metadata(&update.job_id, instance).await?;
        }
        Ok(())
    }

    async fn get_supported_work_units(&self) -> EngineResult<Vec<String>> {
        Ok(self.shared.work_units.clone())
    }

    async fn get_num_of_workflows(&self) -> EngineResult<usize> {
        Ok(self.shared.queue.num_of_workflows().await)
    }

    async fn get_workflow(&self, instance_id: &str) -> EngineResult<ProcessorSkeleton> {
        self.shared.queue.get_workflow_processor(instance_id).await
    }

    async fn get_workflow_state(&self, instance_id: &str) -> EngineResult<WorkflowState> {
        self.shared
            .queue
            .inspect(instance_id, |tree| tree.root_node().state().clone())
            .await
    }

    async fn get_workflow_metadata(&self, instance_id: &str, model_id: Option<&str>) -> EngineResult<Metadata> {
        self.shared.queue.get_metadata(instance_id, model_id).await
    }

    async fn get_processor_info(&self, instance_id: &str, model_id: Option<&str>) -> EngineResult<ProcessorInfo> {
        self.shared
            .queue
            .get_processor_info(instance_id, model_id)
            .await
    }

    async fn get_instance_metadata(&self, job_id: &str) -> EngineResult<Option<Metadata>> {
        Ok(self
            .shared
            .instance_repository
            .get_instance_metadata(job_id)
            .await?)
    }

    async fn get_models(&self) -> EngineResult<Vec<WorkflowGraph>> {
        let mut models: Vec<WorkflowGraph> = self.shared.models.read().await.values().cloned().collect();
        models.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(models)
    }

    async fn get_model(&self, model_id: &str) -> EngineResult<WorkflowGraph> {
        self.shared
            .models
            .read()
            .await
            .get(model_id)
            .cloned()
            .ok_or_else(|| GraphError::UnknownModel(model_id.to_string()).into())
    }

    async fn refresh_models(&self) -> EngineResult<usize> {
        let loaded = self
            .shared
            .model_repository
            .load_graphs(&ExecutionType::ALL)
            .await?;
        let count = loaded.len();
        *self.shared.models.write().await = loaded;
        ModelsLoaded { count }.log();
        Ok(count)
    }

    async fn get_page(&self, page: PageInfo, filter: PageFilter) -> EngineResult<QueuePage> {
        Ok(self.shared.queue.get_page(page, filter).await)
    }

    async fn get_runnables_page(&self, page: PageInfo) -> EngineResult<RunnablesPage> {
        Ok(self.shared.queue.get_runnables_page(page).await)
    }

    async fn get_executing_page(&self, page: PageInfo) -> EngineResult<RunnablesPage> {
        Ok(self.shared.queue.get_executing_page(page).await)
    }

    async fn get_instance_page(&self, page: PageInfo, query: Option<QueryExpression>) -> EngineResult<InstancePage> {
        Ok(self
            .shared
            .instance_repository
            .get_page(page, query.as_ref())
            .await?)
    }

    async fn pause_runner(&self) -> EngineResult<()> {
        if !self.shared.paused.send_replace(true) {
            RunnerPauseChanged { paused: true }.log();
        }
        Ok(())
    }

    async fn resume_runner(&self) -> EngineResult<()> {
        if self.shared.paused.send_replace(false) {
            RunnerPauseChanged { paused: false }.log();
        }
        Ok(())
    }

    async fn is_runner_paused(&self) -> EngineResult<bool> {
        Ok(*self.shared.paused.borrow())
    }

    async fn get_launch_date(&self) -> EngineResult<DateTime<Utc>> {
        Ok(self.shared.launched)
    }

    /// Stops the driver loop, then lets the runner wind down in-flight work.
    /// Calling it again does nothing.
    async fn shutdown(&self) -> EngineResult<()> {
        if self.shared.shutdown.is_cancelled() {
            return Ok(());
        }
        EngineShutdown {
            workflows: self.shared.queue.num_of_workflows().await,
        }
        .log();
        self.shared.shutdown.cancel();
        let driver = self.shared.driver.lock().await.take();
        if let Some(driver) = driver {
            // The driver only ends by observing the cancellation above.
            let _ = driver.await;
        }
        self.shared.runner.shutdown().await;
        Ok(())
    }
}

async fn drive(engine: LocalWorkflowEngine) {
    let shared = Arc::clone(&engine.shared);
    let notify: Arc<dyn WorkflowEngine> = Arc::new(engine);
    let work_ready = shared.queue.work_ready();
    let mut paused = shared.paused.subscribe();
    let poll = shared.config.get_poll_interval();
    let mut held: Option<TaskDispatch> = None;

    loop {
        if shared.shutdown.is_cancelled() {
            break;
        }
        let runner_paused = *paused.borrow_and_update();
        if !runner_paused {
            let next = match held.take() {
                Some(task) if shared.queue.confirm_dispatch(&task).await => Some(task),
                Some(_) => continue,
                None => shared.queue.get_next().await,
            };
            if let Some(task) = next {
                if shared.runner.has_open_slots(&task) {
                    dispatch(&shared, &notify, task).await;
                    continue;
                }
                held = Some(task);
            }
        }

        tokio::select! {
            _ = work_ready.notified() => {}
            _ = paused.changed() => {}
            _ = tokio::time::sleep(poll) => {}
            _ = shared.shutdown.cancelled() => {}
        }
    }
}

async fn dispatch(shared: &Shared, notify: &Arc<dyn WorkflowEngine>, task: TaskDispatch) {
    let Err(error) = shared.runner.execute(task.clone(), Arc::clone(notify)).await else {
        return;
    };
    DispatchFailed {
        instance_id: &task.instance_id,
        model_id: &task.model_id,
        error: &error,
    }
    .log();
    let failed = TaskUpdate::state(&task, WorkflowState::new(StateKind::Failure, error.to_string()));
    if let Err(error) = shared.queue.apply_task_update(&failed).await {
        DispatchFailed {
            instance_id: &task.instance_id,
            model_id: &task.model_id,
            error: &error,
        }
        .log();
    }
}
