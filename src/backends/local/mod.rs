// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod registry;
pub mod units;
pub mod workflow_connect;

pub use registry::WorkUnitRegistry;
pub use units::{BailUnit, DelayUnit, FailUnit, NoopUnit, SetMetadataUnit};
pub use workflow_connect::WorkflowConnectUnit;
