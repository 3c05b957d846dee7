// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// How long the driver loop sleeps when nothing signals new work (2 seconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
/// How long shutdown waits for in-flight tasks before cancelling them
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;
/// Priority given to workflows started without one
pub const DEFAULT_PRIORITY: f64 = 5.0;
/// Page size used when a caller does not choose one
pub const DEFAULT_PAGE_SIZE: usize = 50;
/// Concurrency used when the host's parallelism cannot be determined
pub const FALLBACK_MAX_CONCURRENCY: usize = 4;
