// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Engine runners execute dispatched tasks out of line from the driver loop.

mod local;

pub use local::LocalEngineRunner;
