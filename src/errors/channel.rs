// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Failures reported by a communication channel between an engine client and server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Channel is closed")]
    Closed,

    #[error("Transport failure: {0}")]
    Transport(String),

    /// The remote engine executed the call and reported an error.
    #[error("{0}")]
    Remote(String),

    #[error("Unexpected response to {0}")]
    UnexpectedResponse(String),
}
