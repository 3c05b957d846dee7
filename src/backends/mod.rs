// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Work unit backends.
//!
//! A task leaf in a workflow model names a work unit id. The engine runner
//! resolves that id through a [`local::WorkUnitRegistry`] and runs the unit
//! in-process.
//!
//! # Available Backends
//!
//! ## Local Backend
//! Built-in units that need nothing but the engine:
//! - **noop / fail / bail**: fixed outcomes, handy for composing models
//! - **delay**: sleeps, honouring shutdown cancellation
//! - **set_metadata**: copies `Set/` static keys into the workflow
//! - **workflow_connect**: starts child workflows and joins their metadata
//!
//! ## Stub Backend (Test-Only)
//! Scripted units for engine tests, not available in production builds.
//!
//! # Example
//! ```rust
//! use wengine::backends::local::WorkUnitRegistry;
//!
//! let registry = WorkUnitRegistry::with_builtins();
//! assert!(registry.contains("workflow_connect"));
//! ```

pub mod local;
#[cfg(test)]
pub mod stub;
