// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Registry of live workflow trees and the runnable queue across them.
//!
//! Each tree sits behind its own mutex; the registry of trees sits behind a
//! read/write lock so paging never blocks another page. Locks are always
//! taken in the order registry, tree, executing table, runnable queue, and
//! the registry lock is released before a tree lock is awaited.
//!
//! A task moves through the manager like this:
//!
//! 1. [`QueueManager::get_next`] scans every tree that is neither finished nor
//!    on hold, marks each runnable task `WaitingOnResources("Added to runnable
//!    queue")` and pushes it onto the priority queue. The new state takes the
//!    task out of its tree's runnable set, so it cannot be queued twice.
//! 2. The best entry is popped, checked against its tree and recorded as
//!    executing under `instance:model`.
//! 3. Reports from the runner go through [`QueueManager::apply_task_update`];
//!    the first non-`Executing` report takes the task out of the executing
//!    table, and anything arriving after that is dropped.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify, RwLock};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult, RepositoryError};
use crate::metadata::Metadata;
use crate::observability::messages::processor::{StateChanged, WorkflowFinished};
use crate::observability::messages::queue::{
    CallbackDiscarded, PriorityChangeRefused, SnapshotWriteFailed, SnapshotsRestored, StaleRunnableDropped,
    TaskQueuedForDispatch,
};
use crate::observability::messages::StructuredLog;
use crate::page::{PageInfo, ProcessedPageInfo};
use crate::priority::Priority;
use crate::processor::{ChangeKind, NodeId, ProcessorInfo, ProcessorSkeleton, ProcessorStub, ProcessorTree};
use crate::state::{StateCategory, StateKind, WorkflowState};
use crate::traits::{task_key, ProcessorRepository, TaskDispatch, TaskUpdate};

use super::page::{PageFilter, QueuePage, RunnablesPage};
use super::priority_work_queue::{PrioritizedTask, PriorityWorkQueue};

pub const ADDED_TO_RUNNABLE_QUEUE: &str = "Added to runnable queue";
const REQUEUED_AFTER_RESTART: &str = "Requeued after restart";

type TreeHandle = Arc<Mutex<ProcessorTree>>;

#[derive(Default)]
struct Registry {
    trees: HashMap<String, TreeHandle>,
    // Insertion order; pages list workflows oldest first.
    order: Vec<String>,
}

pub struct QueueManager {
    registry: RwLock<Registry>,
    runnable: Mutex<PriorityWorkQueue>,
    executing: Mutex<BTreeMap<String, ProcessorStub>>,
    repository: Option<Arc<dyn ProcessorRepository>>,
    sequence: AtomicU64,
    work_ready: Arc<Notify>,
}

impl QueueManager {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            runnable: Mutex::new(PriorityWorkQueue::new()),
            executing: Mutex::new(BTreeMap::new()),
            repository: None,
            sequence: AtomicU64::new(0),
            work_ready: Arc::new(Notify::new()),
        }
    }

    pub fn with_repository(repository: Arc<dyn ProcessorRepository>) -> Self {
        Self {
            repository: Some(repository),
            ..Self::new()
        }
    }

    /// Signalled whenever a tree changes in a way that may create work.
    pub fn work_ready(&self) -> Arc<Notify> {
        Arc::clone(&self.work_ready)
    }

    /// Loads every stored snapshot. Tasks that were queued or running when
    /// the snapshot was written are queued again.
    pub async fn load_repository(&self) -> Result<usize, RepositoryError> {
        let Some(repository) = &self.repository else {
            return Ok(0);
        };
        let trees = repository.load_all().await?;
        let count = trees.len();
        let mut registry = self.registry.write().await;
        for mut tree in trees {
            requeue_interrupted(&mut tree);
            let instance_id = tree.instance_id().to_string();
            if registry
                .trees
                .insert(instance_id.clone(), Arc::new(Mutex::new(tree)))
                .is_none()
            {
                registry.order.push(instance_id);
            }
        }
        drop(registry);
        SnapshotsRestored { count }.log();
        self.work_ready.notify_one();
        Ok(count)
    }

    // ---- registry ------------------------------------------------------

    /// Queues every node of a freshly built tree and registers it.
    pub async fn add_to_queue(&self, mut tree: ProcessorTree) -> EngineResult<()> {
        let root = tree.root();
        tree.set_state_recur(root, WorkflowState::new(StateKind::Queued, ""));
        let snapshot = self.settle(&mut tree);
        let instance_id = tree.instance_id().to_string();
        {
            let mut registry = self.registry.write().await;
            if registry.trees.contains_key(&instance_id) {
                return Err(EngineError::DuplicateInstance(instance_id));
            }
            registry
                .trees
                .insert(instance_id.clone(), Arc::new(Mutex::new(tree)));
            registry.order.push(instance_id);
        }
        self.persist(snapshot).await;
        self.work_ready.notify_one();
        Ok(())
    }

    pub async fn contains_workflow(&self, instance_id: &str) -> bool {
        self.registry.read().await.trees.contains_key(instance_id)
    }

    pub async fn num_of_workflows(&self) -> usize {
        self.registry.read().await.trees.len()
    }

    pub async fn instance_ids(&self) -> Vec<String> {
        self.registry.read().await.order.clone()
    }

    /// Forgets a workflow: its tree, its queued entries, its executing
    /// entries and its stored snapshot.
    pub async fn delete_workflow_processor(&self, instance_id: &str) -> EngineResult<()> {
        {
            let mut registry = self.registry.write().await;
            if registry.trees.remove(instance_id).is_none() {
                return Err(EngineError::UnknownInstance(instance_id.to_string()));
            }
            registry.order.retain(|id| id != instance_id);
        }
        self.runnable.lock().await.remove_instance(instance_id);
        let prefix = task_key(instance_id, "");
        self.executing
            .lock()
            .await
            .retain(|key, _| !key.starts_with(&prefix));
        if let Some(repository) = &self.repository {
            if let Err(error) = repository.delete(instance_id).await {
                SnapshotWriteFailed {
                    instance_id,
                    action: "delete",
                    error: &error,
                }
                .log();
            }
        }
        Ok(())
    }

    /// Runs `f` against a workflow's tree under its lock.
    pub async fn inspect<R>(&self, instance_id: &str, f: impl FnOnce(&ProcessorTree) -> R) -> EngineResult<R> {
        let handle = self.tree(instance_id).await?;
        let tree = handle.lock().await;
        Ok(f(&tree))
    }

    pub async fn get_workflow_processor(&self, instance_id: &str) -> EngineResult<ProcessorSkeleton> {
        self.inspect(instance_id, |tree| tree.skeleton(tree.root())).await
    }

    pub async fn get_processor_info(&self, instance_id: &str, model_id: Option<&str>) -> EngineResult<ProcessorInfo> {
        let handle = self.tree(instance_id).await?;
        let tree = handle.lock().await;
        let id = resolve(&tree, model_id)?;
        Ok(tree.node(id).info().clone())
    }

    pub async fn get_metadata(&self, instance_id: &str, model_id: Option<&str>) -> EngineResult<Metadata> {
        let handle = self.tree(instance_id).await?;
        let tree = handle.lock().await;
        let id = resolve(&tree, model_id)?;
        Ok(tree.node(id).dynamic_metadata().clone())
    }

    // ---- dispatch ------------------------------------------------------

    /// Hands out the best runnable task, or `None` when nothing can run.
    ///
    /// Only the driver loop calls this.
    pub async fn get_next(&self) -> Option<TaskDispatch> {
        let mut held = self.refresh_runnables().await;
        let mut on_hold = Vec::new();
        let next = loop {
            let entry = self.runnable.lock().await.pop_next_available(&held);
            let Some(entry) = entry else {
                break None;
            };
            match self.claim(&entry).await {
                Claim::Dispatch(task) => break Some(task),
                Claim::OnHold => {
                    held.insert(entry.instance_id().to_string());
                    on_hold.push(entry);
                }
                Claim::Stale => {}
            }
        };
        if !on_hold.is_empty() {
            self.runnable.lock().await.extend(on_hold);
        }
        next
    }

    /// Queues every newly runnable task and returns the workflows on hold.
    async fn refresh_runnables(&self) -> HashSet<String> {
        let mut held = HashSet::new();
        for (instance_id, handle) in self.handles().await {
            let mut tree = handle.lock().await;
            let root_state = tree.root_node().state();
            if root_state.in_category(StateCategory::Holding) {
                held.insert(instance_id);
                continue;
            }
            if root_state.is_done() {
                continue;
            }
            let ready = tree.runnable_tasks();
            if ready.is_empty() {
                continue;
            }
            for id in &ready {
                tree.set_state(
                    *id,
                    WorkflowState::waiting_on_resources(
                        ADDED_TO_RUNNABLE_QUEUE,
                        WorkflowState::new(StateKind::Executing, ""),
                    ),
                );
            }
            let snapshot = self.settle(&mut tree);
            let stubs: Vec<ProcessorStub> = ready.iter().map(|id| tree.stub(*id)).collect();
            drop(tree);
            self.persist(snapshot).await;

            let mut queue = self.runnable.lock().await;
            for stub in stubs {
                if queue.contains(&stub.instance_id, &stub.model_id) {
                    continue;
                }
                TaskQueuedForDispatch {
                    instance_id: &stub.instance_id,
                    model_id: &stub.model_id,
                    priority: stub.priority.value(),
                }
                .log();
                let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
                queue.push(PrioritizedTask::new(stub, sequence));
            }
        }
        held
    }

    async fn claim(&self, entry: &PrioritizedTask) -> Claim {
        let Ok(handle) = self.tree(entry.instance_id()).await else {
            return Claim::Stale;
        };
        let mut tree = handle.lock().await;
        let Some(id) = tree.find(entry.model_id()) else {
            return Claim::Stale;
        };
        let node = tree.node(id);
        if node.state().in_category(StateCategory::Holding) {
            return Claim::OnHold;
        }
        let waiting = node.state().is(StateKind::WaitingOnResources)
            && node
                .state()
                .previous()
                .is_some_and(|p| p.is(StateKind::Executing));
        let Some(work_unit) = node.work_unit().filter(|_| waiting).map(str::to_string) else {
            StaleRunnableDropped {
                instance_id: entry.instance_id(),
                model_id: entry.model_id(),
                state: node.state().kind().name(),
            }
            .log();
            return Claim::Stale;
        };

        let job_id = node
            .job_id()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let task = TaskDispatch {
            instance_id: entry.instance_id().to_string(),
            model_id: entry.model_id().to_string(),
            job_id: job_id.clone(),
            work_unit,
            priority: node.effective_priority(),
            static_metadata: node.static_metadata().clone(),
            dynamic_metadata: node.dynamic_metadata().clone(),
        };
        tree.set_job_id(id, job_id);
        self.executing
            .lock()
            .await
            .insert(task.key(), tree.stub(id));
        let snapshot = self.snapshot(&tree);
        drop(tree);
        self.persist(snapshot).await;
        Claim::Dispatch(task)
    }

    /// Applies a running task's report. Returns `false` when the report was
    /// dropped because the task is no longer in flight.
    pub async fn apply_task_update(&self, update: &TaskUpdate) -> EngineResult<bool> {
        let discard = |reason: &str| {
            CallbackDiscarded {
                instance_id: &update.instance_id,
                model_id: &update.model_id,
                reason,
            }
            .log();
            Ok(false)
        };
        let Ok(handle) = self.tree(&update.instance_id).await else {
            return discard("workflow no longer exists");
        };
        let mut tree = handle.lock().await;
        let Some(id) = tree.find(&update.model_id) else {
            return discard("task no longer exists");
        };
        let key = task_key(&update.instance_id, &update.model_id);
        let mut executing = self.executing.lock().await;
        if !executing.contains_key(&key) {
            return discard("task is not in flight");
        }
        if tree.state(id).is_done() {
            executing.remove(&key);
            return discard("task already finished");
        }

        if let Some(metadata) = &update.metadata {
            tree.set_dynamic_metadata(id, metadata.clone());
        }
        let on_hold = tree.state(id).in_category(StateCategory::Holding);
        if !(on_hold && update.state.is_running()) {
            tree.set_state(id, update.state.clone());
        }
        if update.state.is(StateKind::Executing) {
            executing.insert(key, tree.stub(id));
        } else {
            executing.remove(&key);
        }
        drop(executing);

        let snapshot = self.settle(&mut tree);
        drop(tree);
        self.persist(snapshot).await;
        self.work_ready.notify_one();
        Ok(true)
    }

    /// Checks that a task handed out earlier may still be sent to a runner.
    ///
    /// A task whose workflow went on hold meanwhile goes back to the runnable
    /// queue, where it waits parked; one that was stopped or deleted is
    /// forgotten. Both return `false`.
    pub async fn confirm_dispatch(&self, task: &TaskDispatch) -> bool {
        let key = task.key();
        let Ok(handle) = self.tree(&task.instance_id).await else {
            self.executing.lock().await.remove(&key);
            return false;
        };
        let tree = handle.lock().await;
        let Some(id) = tree.find(&task.model_id) else {
            self.executing.lock().await.remove(&key);
            return false;
        };
        let mut executing = self.executing.lock().await;
        if !executing.contains_key(&key) {
            return false;
        }
        let state = tree.state(id);
        if state.is(StateKind::WaitingOnResources) {
            return true;
        }
        executing.remove(&key);
        if state.in_category(StateCategory::Holding) {
            let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
            self.runnable
                .lock()
                .await
                .push(PrioritizedTask::new(tree.stub(id), sequence));
        }
        false
    }

    pub async fn set_job_id(&self, instance_id: &str, model_id: &str, job_id: &str) -> EngineResult<()> {
        let handle = self.tree(instance_id).await?;
        let mut tree = handle.lock().await;
        let id = resolve(&tree, Some(model_id))?;
        tree.set_job_id(id, job_id);
        let snapshot = self.snapshot(&tree);
        drop(tree);
        self.persist(snapshot).await;
        Ok(())
    }

    pub async fn is_executing(&self, instance_id: &str, model_id: &str) -> bool {
        self.executing
            .lock()
            .await
            .contains_key(&task_key(instance_id, model_id))
    }

    // ---- mutators ------------------------------------------------------

    /// Sets one node's state. A revertable state remembers the one it
    /// replaces.
    pub async fn set_state(&self, instance_id: &str, model_id: Option<&str>, state: WorkflowState) -> EngineResult<()> {
        self.change_state(instance_id, model_id, state, false).await
    }

    /// Sets the state of a node and of everything below it. Only the
    /// addressed node notifies its parent.
    pub async fn set_state_recur(
        &self,
        instance_id: &str,
        model_id: Option<&str>,
        state: WorkflowState,
    ) -> EngineResult<()> {
        self.change_state(instance_id, model_id, state, true).await
    }

    async fn change_state(
        &self,
        instance_id: &str,
        model_id: Option<&str>,
        state: WorkflowState,
        recursive: bool,
    ) -> EngineResult<()> {
        let handle = self.tree(instance_id).await?;
        let mut tree = handle.lock().await;
        let id = resolve(&tree, model_id)?;
        if recursive {
            tree.set_state_recur(id, state);
        } else {
            tree.set_state(id, state);
        }
        let touched: Vec<ProcessorStub> = tree
            .pre_order(id)
            .into_iter()
            .filter(|node| tree.node(*node).is_task())
            .map(|node| tree.stub(node))
            .collect();
        self.track_tasks(&touched).await;
        let snapshot = self.settle(&mut tree);
        drop(tree);
        self.persist(snapshot).await;
        self.work_ready.notify_one();
        Ok(())
    }

    /// Keeps the executing table and the runnable queue in line with tasks
    /// whose state an operator changed.
    async fn track_tasks(&self, stubs: &[ProcessorStub]) {
        let mut executing = self.executing.lock().await;
        let mut runnable = self.runnable.lock().await;
        for stub in stubs {
            let key = task_key(&stub.instance_id, &stub.model_id);
            if executing.contains_key(&key) {
                if stub.state.is(StateKind::Executing) {
                    executing.insert(key, stub.clone());
                } else if !stub.state.in_category(StateCategory::Holding) {
                    executing.remove(&key);
                }
            } else if !stub.state.is(StateKind::WaitingOnResources)
                && !stub.state.in_category(StateCategory::Holding)
            {
                runnable.remove(&stub.instance_id, &stub.model_id);
            }
        }
    }

    /// Restores the state a revertable state remembered. Returns `false`
    /// when the node held no revertable state.
    pub async fn revert_state(&self, instance_id: &str, model_id: Option<&str>) -> EngineResult<bool> {
        self.change_revert(instance_id, model_id, false).await
    }

    /// [`Self::revert_state`] for a node and everything below it.
    pub async fn revert_state_recur(&self, instance_id: &str, model_id: Option<&str>) -> EngineResult<bool> {
        self.change_revert(instance_id, model_id, true).await
    }

    async fn change_revert(&self, instance_id: &str, model_id: Option<&str>, recursive: bool) -> EngineResult<bool> {
        let handle = self.tree(instance_id).await?;
        let mut tree = handle.lock().await;
        let id = resolve(&tree, model_id)?;
        let reverted = if recursive {
            tree.revert_state_recur(id)
        } else {
            tree.revert_state(id)
        };
        let snapshot = self.settle(&mut tree);
        drop(tree);
        self.persist(snapshot).await;
        self.work_ready.notify_one();
        Ok(reverted)
    }

    /// Sets the priority of a node and everything below it. Refused (returns
    /// `false`) while the addressed task is executing.
    pub async fn set_priority(&self, instance_id: &str, model_id: Option<&str>, priority: Priority) -> EngineResult<bool> {
        if let Some(model_id) = model_id {
            if self.is_executing(instance_id, model_id).await {
                PriorityChangeRefused { instance_id, model_id }.log();
                return Ok(false);
            }
        }
        let handle = self.tree(instance_id).await?;
        let mut tree = handle.lock().await;
        let id = resolve(&tree, model_id)?;
        tree.set_priority_recur(id, priority);
        let tasks: Vec<(String, Priority)> = tree
            .pre_order(id)
            .into_iter()
            .map(|node| tree.node(node))
            .filter(|node| node.is_task())
            .map(|node| (node.model_id().to_string(), node.effective_priority()))
            .collect();
        {
            let mut runnable = self.runnable.lock().await;
            for (model_id, effective) in tasks {
                runnable.reprioritize(instance_id, &model_id, effective);
            }
        }
        let snapshot = self.settle(&mut tree);
        drop(tree);
        self.persist(snapshot).await;
        Ok(true)
    }

    /// Replaces one node's dynamic metadata.
    pub async fn set_metadata(&self, instance_id: &str, model_id: Option<&str>, metadata: Metadata) -> EngineResult<()> {
        let handle = self.tree(instance_id).await?;
        let mut tree = handle.lock().await;
        let id = resolve(&tree, model_id)?;
        tree.set_dynamic_metadata(id, metadata);
        let snapshot = self.settle(&mut tree);
        drop(tree);
        self.persist(snapshot).await;
        Ok(())
    }

    // ---- pages ---------------------------------------------------------

    /// One page of workflow roots accepted by `filter`, oldest first.
    pub async fn get_page(&self, page: PageInfo, filter: PageFilter) -> QueuePage {
        let mut hits = Vec::new();
        for (_, handle) in self.handles().await {
            let tree = handle.lock().await;
            let root = tree.root_node();
            let stub = tree.stub(tree.root());
            if filter.accepts(&stub, root.dynamic_metadata(), root.static_metadata()) {
                hits.push(stub);
            }
        }
        QueuePage {
            info: ProcessedPageInfo::new(page, hits.len()),
            stubs: page.slice(&hits),
            filter,
        }
    }

    pub async fn get_next_page(&self, page: &QueuePage) -> QueuePage {
        self.get_page(page.info.page_info().next(), page.filter.clone())
            .await
    }

    /// Queued tasks in the order they would be handed out.
    pub async fn get_runnables_page(&self, page: PageInfo) -> RunnablesPage {
        let queued: Vec<ProcessorStub> = self
            .runnable
            .lock()
            .await
            .ordered()
            .into_iter()
            .map(|task| task.stub.clone())
            .collect();
        RunnablesPage {
            info: ProcessedPageInfo::new(page, queued.len()),
            stubs: page.slice(&queued),
        }
    }

    pub async fn get_executing_page(&self, page: PageInfo) -> RunnablesPage {
        let executing: Vec<ProcessorStub> = self.executing.lock().await.values().cloned().collect();
        RunnablesPage {
            info: ProcessedPageInfo::new(page, executing.len()),
            stubs: page.slice(&executing),
        }
    }

    // ---- helpers -------------------------------------------------------

    async fn tree(&self, instance_id: &str) -> EngineResult<TreeHandle> {
        self.registry
            .read()
            .await
            .trees
            .get(instance_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownInstance(instance_id.to_string()))
    }

    async fn handles(&self) -> Vec<(String, TreeHandle)> {
        let registry = self.registry.read().await;
        registry
            .order
            .iter()
            .filter_map(|id| registry.trees.get(id).map(|h| (id.clone(), Arc::clone(h))))
            .collect()
    }

    /// Drains the tree's pending notifications, logs the state changes and
    /// returns a snapshot to store once the lock is released.
    fn settle(&self, tree: &mut ProcessorTree) -> Option<ProcessorTree> {
        let root = tree.root();
        for event in tree.drain() {
            let Some(state) = event.state.as_ref().filter(|_| event.kind == ChangeKind::State) else {
                continue;
            };
            let node = tree.node(event.source);
            StateChanged {
                instance_id: tree.instance_id(),
                model_id: node.model_id(),
                state,
            }
            .log();
            if event.source == root && state.is_done() {
                WorkflowFinished {
                    instance_id: tree.instance_id(),
                    model_id: node.model_id(),
                    state,
                }
                .log();
            }
        }
        self.snapshot(tree)
    }

    fn snapshot(&self, tree: &ProcessorTree) -> Option<ProcessorTree> {
        self.repository.as_ref().map(|_| tree.clone())
    }

    async fn persist(&self, snapshot: Option<ProcessorTree>) {
        let (Some(repository), Some(tree)) = (&self.repository, snapshot) else {
            return;
        };
        if let Err(error) = repository.store(&tree).await {
            SnapshotWriteFailed {
                instance_id: tree.instance_id(),
                action: "store",
                error: &error,
            }
            .log();
        }
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new()
    }
}

enum Claim {
    Dispatch(TaskDispatch),
    OnHold,
    Stale,
}

fn resolve(tree: &ProcessorTree, model_id: Option<&str>) -> EngineResult<NodeId> {
    match model_id {
        None => Ok(tree.root()),
        Some(model_id) => tree.find(model_id).ok_or_else(|| EngineError::UnknownProcessor {
            instance_id: tree.instance_id().to_string(),
            model_id: model_id.to_string(),
        }),
    }
}

/// Tasks caught between queueing and completion by a restart go back to
/// Queued, quietly, so they are offered again.
fn requeue_interrupted(tree: &mut ProcessorTree) {
    let interrupted: Vec<NodeId> = tree
        .tasks()
        .filter(|id| {
            let state = tree.state(*id);
            state.is(StateKind::Executing)
                || (state.is(StateKind::WaitingOnResources)
                    && state.previous().is_some_and(|p| p.is(StateKind::Executing)))
        })
        .collect();
    for id in interrupted {
        tree.apply_state(id, WorkflowState::new(StateKind::Queued, REQUEUED_AFTER_RESTART), false);
    }
}
