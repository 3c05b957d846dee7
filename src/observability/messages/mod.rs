// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message is a small struct borrowing the values it reports. `Display`
//! renders the human readable line; [`StructuredLog::log`] emits it at the
//! message's level with every value attached as a tracing field.
//!
//! # Organization
//!
//! * `engine` - engine lifecycle, workflow operator actions, driver loop
//! * `queue` - runnable selection, stale callbacks, snapshot persistence
//! * `processor` - tree construction and state transitions
//! * `runner` - work unit execution and runner shutdown
//!
//! # Usage Pattern
//!
//! ```rust
//! use wengine::observability::messages::StructuredLog;
//! use wengine::observability::messages::engine::WorkflowStarted;
//!
//! let msg = WorkflowStarted {
//!     instance_id: "7d0c",
//!     model_id: "ingest",
//!     priority: 5.0,
//! };
//!
//! msg.log();
//! ```

use tracing::Span;

pub mod engine;
pub mod processor;
pub mod queue;
pub mod runner;

/// A log message that knows its own level and fields.
pub trait StructuredLog {
    /// Emits the message as a tracing event.
    fn log(&self);

    /// A span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
