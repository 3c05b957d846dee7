// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // work units
pub mod config;     // engine config + runtime wiring
pub mod engine;     // queue manager, runner, driver loop
pub mod errors;     // error handling
pub mod metadata;
pub mod model;      // workflow graphs
pub mod observability;
pub mod page;
pub mod priority;
pub mod processor;  // processor tree state machine
pub mod repository;
pub mod state;
pub mod traits;     // engine, runner and repository seams
