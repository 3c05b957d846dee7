// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Small built-in work units, mostly useful for composing and testing models.

use async_trait::async_trait;
use std::time::Duration;

use crate::metadata::ControlMetadata;
use crate::traits::{TaskContext, TaskOutcome, WorkUnit};

/// Failure message used by [`FailUnit`].
pub const FAIL_MESSAGE: &str = "Fail/Message";
/// Milliseconds [`DelayUnit`] sleeps.
pub const DELAY_MILLIS: &str = "Delay/Millis";
/// Static keys below this group are copied into dynamic metadata by
/// [`SetMetadataUnit`], without the prefix.
pub const SET_GROUP: &str = "Set/";

/// Succeeds immediately.
pub struct NoopUnit;

#[async_trait]
impl WorkUnit for NoopUnit {
    async fn execute(&self, _metadata: &mut ControlMetadata, _task: &TaskContext) -> anyhow::Result<TaskOutcome> {
        Ok(TaskOutcome::Success(String::new()))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Fails with the message under `Fail/Message`.
pub struct FailUnit;

#[async_trait]
impl WorkUnit for FailUnit {
    async fn execute(&self, metadata: &mut ControlMetadata, _task: &TaskContext) -> anyhow::Result<TaskOutcome> {
        let message = metadata
            .get(FAIL_MESSAGE)
            .unwrap_or_else(|| "Failed on request".to_string());
        Ok(TaskOutcome::Failure(message))
    }

    fn name(&self) -> &'static str {
        "fail"
    }
}

/// Always bails; the task is blocked and offered again after its block time.
pub struct BailUnit;

#[async_trait]
impl WorkUnit for BailUnit {
    async fn execute(&self, _metadata: &mut ControlMetadata, _task: &TaskContext) -> anyhow::Result<TaskOutcome> {
        Ok(TaskOutcome::Bail("Not ready".to_string()))
    }

    fn name(&self) -> &'static str {
        "bail"
    }
}

/// Sleeps for `Delay/Millis` (default 0) then succeeds.
pub struct DelayUnit;

#[async_trait]
impl WorkUnit for DelayUnit {
    async fn execute(&self, metadata: &mut ControlMetadata, task: &TaskContext) -> anyhow::Result<TaskOutcome> {
        let millis: u64 = match metadata.get(DELAY_MILLIS) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{DELAY_MILLIS} = '{raw}' is not a number: {e}"))?,
            None => 0,
        };
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(millis)) => {
                Ok(TaskOutcome::Success(format!("Slept {millis} ms")))
            }
            _ = task.cancellation().cancelled() => {
                Ok(TaskOutcome::Failure("Cancelled while sleeping".to_string()))
            }
        }
    }

    fn name(&self) -> &'static str {
        "delay"
    }
}

/// Copies every static `Set/<key>` into the workflow's dynamic metadata as
/// `<key>`.
pub struct SetMetadataUnit;

#[async_trait]
impl WorkUnit for SetMetadataUnit {
    async fn execute(&self, metadata: &mut ControlMetadata, _task: &TaskContext) -> anyhow::Result<TaskOutcome> {
        let assignments: Vec<(String, Vec<String>)> = metadata
            .static_metadata()
            .iter()
            .filter_map(|(key, values)| {
                key.strip_prefix(SET_GROUP)
                    .filter(|target| !target.is_empty())
                    .map(|target| (target.to_string(), values.to_vec()))
            })
            .collect();
        let count = assignments.len();
        for (key, values) in assignments {
            metadata.replace_dynamic(key, values);
        }
        Ok(TaskOutcome::Success(format!("Set {count} keys")))
    }

    fn name(&self) -> &'static str {
        "set_metadata"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;

    fn context() -> TaskContext {
        TaskContext::new("i-1", "task", "job-1")
    }

    fn control(static_pairs: &[(&str, &str)]) -> ControlMetadata {
        ControlMetadata::new(static_pairs.iter().copied().collect(), Metadata::new())
    }

    #[tokio::test]
    async fn test_noop_succeeds() {
        let outcome = NoopUnit.execute(&mut control(&[]), &context()).await.unwrap();
        assert!(matches!(outcome, TaskOutcome::Success(_)));
    }

    #[tokio::test]
    async fn test_fail_uses_configured_message() {
        let mut metadata = control(&[(FAIL_MESSAGE, "disk full")]);
        let outcome = FailUnit.execute(&mut metadata, &context()).await.unwrap();
        assert_eq!(outcome, TaskOutcome::Failure("disk full".to_string()));
    }

    #[tokio::test]
    async fn test_bail_blocks() {
        let outcome = BailUnit.execute(&mut control(&[]), &context()).await.unwrap();
        assert!(matches!(outcome, TaskOutcome::Bail(_)));
    }

    #[tokio::test]
    async fn test_delay_rejects_bad_millis() {
        let mut metadata = control(&[(DELAY_MILLIS, "soon")]);
        assert!(DelayUnit.execute(&mut metadata, &context()).await.is_err());
    }

    #[tokio::test]
    async fn test_delay_stops_when_cancelled() {
        let mut metadata = control(&[(DELAY_MILLIS, "60000")]);
        let task = context();
        task.cancellation().cancel();
        let outcome = DelayUnit.execute(&mut metadata, &task).await.unwrap();
        assert!(matches!(outcome, TaskOutcome::Failure(_)));
    }

    #[tokio::test]
    async fn test_set_metadata_copies_prefixed_keys() {
        let mut metadata = control(&[("Set/Destination", "/archive"), ("Other", "x")]);
        SetMetadataUnit.execute(&mut metadata, &context()).await.unwrap();
        assert_eq!(metadata.dynamic_metadata().get("Destination"), Some("/archive"));
        assert!(!metadata.dynamic_metadata().contains_key("Other"));
    }
}
