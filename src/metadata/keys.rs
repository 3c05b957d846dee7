// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Well-known metadata keys.

/// Dynamic metadata in this group never leaves the node that set it.
pub const LOCAL_KEYS_GROUP: &str = "WorkflowProcessor/Local";
/// Extra keys, listed as values, that are kept local in addition to the group.
pub const LOCAL_KEYS: &str = "WorkflowProcessor/Local/Keys";

/// Minutes a blocked task waits before it is offered to the runner again.
pub const BLOCK_TIME_ELAPSE: &str = "BlockTimeElapse";
/// Runner queue a task is charged against.
pub const QUEUE_NAME: &str = "QueueName";

pub const JOB_ID: &str = "JobId";
pub const INSTANCE_ID: &str = "InstanceId";
pub const MODEL_ID: &str = "ModelId";
pub const STATE: &str = "State";
pub const HOST: &str = "Host";
pub const CREATION_DATE: &str = "CreationDate";
pub const READY_DATE: &str = "ReadyDate";
pub const EXECUTION_DATE: &str = "ExecutionDate";
pub const COMPLETION_DATE: &str = "CompletionDate";
