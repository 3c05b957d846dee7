// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::backends::local::WorkUnitRegistry;
use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::metadata::ControlMetadata;
use crate::observability::messages::runner::{
    InFlightCancelled, RunnerShutdownStarted, TaskFailed, TaskFinished, TaskStarted,
};
use crate::observability::messages::StructuredLog;
use crate::state::{StateKind, WorkflowState};
use crate::traits::{EngineRunner, TaskContext, TaskDispatch, TaskOutcome, TaskUpdate, WorkUnit, WorkflowEngine};

/// Runs work units as tokio tasks inside this process.
///
/// Concurrency is bounded twice: by a total slot count and, for tasks whose
/// static metadata names a `QueueName` with a configured limit, by that
/// queue's slot count. Slots are taken when a task is accepted and returned
/// when its work unit ends.
///
/// ## Reporting
///
/// Each accepted task reports through the engine it was dispatched by:
/// `Executing` when the work unit starts and one terminal state when it ends.
/// Work unit outcomes map to states as follows:
/// - `Success` -> ExecutionComplete (Success when no postconditions remain)
/// - `Failure`, an `Err` or a panic -> Failure
/// - `Bail` -> Blocked
///
/// Tasks still running when [`EngineRunner::shutdown`]'s grace period runs
/// out are aborted without a terminal report; they stay `Executing` in their
/// tree and are queued again when a stored snapshot is restored.
pub struct LocalEngineRunner {
    registry: Arc<WorkUnitRegistry>,
    slots: Arc<Semaphore>,
    queue_slots: HashMap<String, Arc<Semaphore>>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    grace: Duration,
    closed: AtomicBool,
}

impl LocalEngineRunner {
    pub fn new(registry: Arc<WorkUnitRegistry>, max_concurrency: usize) -> Self {
        Self {
            registry,
            slots: Arc::new(Semaphore::new(max_concurrency)),
            queue_slots: HashMap::new(),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            grace: Duration::from_secs(crate::config::consts::DEFAULT_SHUTDOWN_GRACE_SECS),
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(registry: Arc<WorkUnitRegistry>, cfg: &EngineConfig) -> Self {
        let mut runner = Self::new(registry, cfg.get_max_concurrency()).with_grace(cfg.get_shutdown_grace());
        for (queue, slots) in &cfg.queue_limits {
            runner = runner.with_queue_limit(queue.clone(), *slots);
        }
        runner
    }

    /// Caps the tasks of one runner queue.
    pub fn with_queue_limit(mut self, queue: impl Into<String>, slots: usize) -> Self {
        self.queue_slots.insert(queue.into(), Arc::new(Semaphore::new(slots)));
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn registry(&self) -> &WorkUnitRegistry {
        &self.registry
    }

    fn queue_semaphore(&self, task: &TaskDispatch) -> Option<&Arc<Semaphore>> {
        task.queue_name().and_then(|queue| self.queue_slots.get(queue))
    }

    fn take_slots(&self, task: &TaskDispatch) -> Option<(OwnedSemaphorePermit, Option<OwnedSemaphorePermit>)> {
        let queue = match self.queue_semaphore(task) {
            Some(semaphore) => Some(Arc::clone(semaphore).try_acquire_owned().ok()?),
            None => None,
        };
        let total = Arc::clone(&self.slots).try_acquire_owned().ok()?;
        Some((total, queue))
    }
}

#[async_trait]
impl EngineRunner for LocalEngineRunner {
    fn has_open_slots(&self, task: &TaskDispatch) -> bool {
        !self.closed.load(Ordering::Acquire)
            && self.slots.available_permits() > 0
            && self
                .queue_semaphore(task)
                .map_or(true, |semaphore| semaphore.available_permits() > 0)
    }

    async fn execute(&self, task: TaskDispatch, notify: Arc<dyn WorkflowEngine>) -> EngineResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::RunnerShutdown);
        }
        let unit = self
            .registry
            .get(&task.work_unit)
            .ok_or_else(|| EngineError::UnknownWorkUnit(task.work_unit.clone()))?;
        let permits = self
            .take_slots(&task)
            .ok_or_else(|| EngineError::NoOpenSlots(task.key()))?;

        let cancel = self.cancel.child_token();
        self.tracker.spawn(async move {
            let _permits = permits;
            run_task(unit, task, notify, cancel).await;
        });
        Ok(())
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.tracker.close();
        RunnerShutdownStarted {
            in_flight: self.tracker.len(),
            grace: self.grace,
        }
        .log();
        if tokio::time::timeout(self.grace, self.tracker.wait()).await.is_err() {
            InFlightCancelled {
                remaining: self.tracker.len(),
            }
            .log();
            self.cancel.cancel();
            self.tracker.wait().await;
        }
    }

    fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}

async fn run_task(unit: Arc<dyn WorkUnit>, task: TaskDispatch, notify: Arc<dyn WorkflowEngine>, cancel: CancellationToken) {
    TaskStarted {
        instance_id: &task.instance_id,
        model_id: &task.model_id,
        work_unit: &task.work_unit,
        job_id: &task.job_id,
    }
    .log();
    let started = Instant::now();
    report(&notify, TaskUpdate::state(&task, WorkflowState::new(StateKind::Executing, ""))).await;

    let mut metadata = ControlMetadata::new(task.static_metadata.clone(), task.dynamic_metadata.clone());
    let context = TaskContext::new(&task.instance_id, &task.model_id, &task.job_id)
        .with_engine(Arc::clone(&notify))
        .with_cancellation(cancel.clone());

    // The unit runs in its own task so a panic surfaces as a JoinError.
    let mut body = tokio::spawn(async move {
        let outcome = unit.execute(&mut metadata, &context).await;
        (outcome, metadata)
    });
    let joined = tokio::select! {
        joined = &mut body => joined,
        _ = cancel.cancelled() => {
            body.abort();
            return;
        }
    };

    let update = match joined {
        Ok((Ok(outcome), mut metadata)) => {
            let state = match outcome {
                TaskOutcome::Success(message) => WorkflowState::new(StateKind::ExecutionComplete, message),
                TaskOutcome::Failure(message) => WorkflowState::new(StateKind::Failure, message),
                TaskOutcome::Bail(message) => WorkflowState::new(StateKind::Blocked, message),
            };
            metadata.commit_workflow_keys();
            TaskUpdate::state(&task, state).with_metadata(metadata.dynamic_metadata().clone(), metadata.as_metadata())
        }
        Ok((Err(error), _)) => {
            let error = format!("{error:#}");
            TaskFailed {
                instance_id: &task.instance_id,
                model_id: &task.model_id,
                error: &error,
            }
            .log();
            TaskUpdate::state(&task, WorkflowState::new(StateKind::Failure, error))
        }
        Err(join_error) => {
            let error = format!("Work unit panicked: {join_error}");
            TaskFailed {
                instance_id: &task.instance_id,
                model_id: &task.model_id,
                error: &error,
            }
            .log();
            TaskUpdate::state(&task, WorkflowState::new(StateKind::Failure, error))
        }
    };

    TaskFinished {
        instance_id: &task.instance_id,
        model_id: &task.model_id,
        state: update.state.kind().name(),
        duration: started.elapsed(),
    }
    .log();
    report(&notify, update).await;
}

async fn report(notify: &Arc<dyn WorkflowEngine>, update: TaskUpdate) {
    if let Err(error) = notify.update_workflow_and_instance(update.clone()).await {
        let error = format!("Could not report {}: {error}", update.state.kind());
        TaskFailed {
            instance_id: &update.instance_id,
            model_id: &update.model_id,
            error: &error,
        }
        .log();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{keys, Metadata};
    use crate::priority::Priority;

    fn dispatch(queue: Option<&str>) -> TaskDispatch {
        let mut static_metadata = Metadata::new();
        if let Some(queue) = queue {
            static_metadata.replace(keys::QUEUE_NAME, queue);
        }
        TaskDispatch {
            instance_id: "i-1".into(),
            model_id: "a".into(),
            job_id: "job-1".into(),
            work_unit: "noop".into(),
            priority: Priority::MEDIUM,
            static_metadata,
            dynamic_metadata: Metadata::new(),
        }
    }

    fn runner(max_concurrency: usize) -> LocalEngineRunner {
        LocalEngineRunner::new(Arc::new(WorkUnitRegistry::with_builtins()), max_concurrency)
    }

    #[test]
    fn test_open_slots_follow_total_capacity() {
        assert!(runner(1).has_open_slots(&dispatch(None)));
        assert!(!runner(0).has_open_slots(&dispatch(None)));
    }

    #[test]
    fn test_queue_limit_only_applies_to_its_queue() {
        let runner = runner(4).with_queue_limit("archive", 0);
        assert!(!runner.has_open_slots(&dispatch(Some("archive"))));
        assert!(runner.has_open_slots(&dispatch(Some("transfer"))));
        assert!(runner.has_open_slots(&dispatch(None)));
    }

    #[test]
    fn test_taking_slots_is_all_or_nothing() {
        let runner = runner(1).with_queue_limit("archive", 0);
        assert!(runner.take_slots(&dispatch(Some("archive"))).is_none());
        assert_eq!(runner.slots.available_permits(), 1);
        let held = runner.take_slots(&dispatch(None));
        assert!(held.is_some());
        assert!(!runner.has_open_slots(&dispatch(None)));
        drop(held);
        assert!(runner.has_open_slots(&dispatch(None)));
    }

    #[test]
    fn test_from_config_reads_limits() {
        let mut cfg = EngineConfig {
            max_concurrency: Some(2),
            ..EngineConfig::default()
        };
        cfg.queue_limits.insert("archive".into(), 1);
        let runner = LocalEngineRunner::from_config(Arc::new(WorkUnitRegistry::new()), &cfg);
        assert_eq!(runner.slots.available_permits(), 2);
        assert_eq!(runner.queue_slots["archive"].available_permits(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_with_nothing_running_returns_and_closes() {
        let runner = runner(2);
        runner.shutdown().await;
        assert!(!runner.has_open_slots(&dispatch(None)));
        assert_eq!(runner.in_flight(), 0);
    }
}
