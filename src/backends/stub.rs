// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Scripted work units for tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::metadata::ControlMetadata;
use crate::traits::{TaskContext, TaskOutcome, WorkUnit};

/// Returns scripted outcomes in order, then succeeds. Counts its runs and
/// optionally writes one workflow key on every run.
#[derive(Default)]
pub struct ScriptedUnit {
    script: Mutex<VecDeque<TaskOutcome>>,
    output: Option<(String, String)>,
    runs: AtomicUsize,
}

impl ScriptedUnit {
    pub fn new(script: impl IntoIterator<Item = TaskOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, key: &str, value: &str) -> Self {
        self.output = Some((key.to_string(), value.to_string()));
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkUnit for ScriptedUnit {
    async fn execute(&self, metadata: &mut ControlMetadata, _task: &TaskContext) -> anyhow::Result<TaskOutcome> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some((key, value)) = &self.output {
            metadata.replace_local_value(key, value.clone());
            metadata.mark_workflow_key(key.clone());
        }
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| TaskOutcome::Success("scripted".to_string())))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Returns an error instead of an outcome.
pub struct ErroringUnit;

#[async_trait]
impl WorkUnit for ErroringUnit {
    async fn execute(&self, _metadata: &mut ControlMetadata, _task: &TaskContext) -> anyhow::Result<TaskOutcome> {
        Err(anyhow::anyhow!("Simulated work unit error"))
    }

    fn name(&self) -> &'static str {
        "erroring"
    }
}

/// Panics while running.
pub struct PanickingUnit;

#[async_trait]
impl WorkUnit for PanickingUnit {
    async fn execute(&self, _metadata: &mut ControlMetadata, _task: &TaskContext) -> anyhow::Result<TaskOutcome> {
        panic!("Simulated work unit panic");
    }

    fn name(&self) -> &'static str {
        "panicking"
    }
}

/// Blocks every run until the test releases it, recording how many runs were
/// inside at once.
pub struct GateUnit {
    gate: Arc<Semaphore>,
    inside: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicUsize,
}

impl GateUnit {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            inside: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
        }
    }

    /// Lets `n` waiting or future runs finish.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

impl Default for GateUnit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkUnit for GateUnit {
    async fn execute(&self, _metadata: &mut ControlMetadata, _task: &TaskContext) -> anyhow::Result<TaskOutcome> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let permit = self.gate.acquire().await;
        self.inside.fetch_sub(1, Ordering::SeqCst);
        permit?.forget();
        Ok(TaskOutcome::Success("released".to_string()))
    }

    fn name(&self) -> &'static str {
        "gate"
    }
}
