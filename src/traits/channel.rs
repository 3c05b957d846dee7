// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::engine::channel::{EngineRequest, EngineResponse};
use crate::errors::ChannelError;

/// Carries engine calls to an engine and brings back the result. Failures on
/// the far side come back as [`ChannelError::Remote`].
#[async_trait]
pub trait CommunicationChannel: Send + Sync {
    async fn call(&self, request: EngineRequest) -> Result<EngineResponse, ChannelError>;
}
