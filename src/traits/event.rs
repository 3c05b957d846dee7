// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::errors::EngineResult;
use crate::metadata::Metadata;
use crate::traits::WorkflowEngine;

/// A named action an operator can fire against a running engine.
#[async_trait]
pub trait WorkflowEngineEvent: Send + Sync {
    fn event_id(&self) -> &str;

    /// Checked against live engine state before every trigger.
    async fn passes_preconditions(&self, engine: &dyn WorkflowEngine) -> EngineResult<bool>;

    async fn perform_action(&self, engine: &dyn WorkflowEngine, metadata: Metadata) -> EngineResult<()>;
}
