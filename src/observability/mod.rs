// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structured logging for the workflow engine.
//!
//! Every diagnostic line the engine emits goes through a message type in
//! [`messages`]. Message types keep wording out of the engine code and attach
//! the reported values as tracing fields, so a JSON subscriber sees the same
//! data a human reads in the text line.
//!
//! # Usage
//!
//! ```rust
//! use wengine::observability::messages::StructuredLog;
//! use wengine::observability::messages::runner::TaskFailed;
//!
//! let msg = TaskFailed {
//!     instance_id: "7d0c",
//!     model_id: "archive",
//!     error: "disk full",
//! };
//!
//! let span = msg.span("archive");
//! let _guard = span.enter();
//! msg.log();
//! ```

pub mod messages;
