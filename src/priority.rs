// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Scheduling priority.
//!
//! Priorities are plain decimals with a total order. Higher runs first.
//! Task leaves report their assigned value plus [`TASK_PRIORITY_OFFSET`] so that
//! leaf work wins ties against container bookkeeping at the same nominal level.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

pub const TASK_PRIORITY_OFFSET: f64 = 0.1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(f64);

impl Priority {
    pub const LOWEST: Priority = Priority(0.0);
    pub const LOW: Priority = Priority(2.5);
    pub const MEDIUM: Priority = Priority(5.0);
    pub const HIGH: Priority = Priority(7.5);
    pub const HIGHEST: Priority = Priority(10.0);

    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn with_offset(self, offset: f64) -> Self {
        Self(self.0 + offset)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::MEDIUM
    }
}

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for Priority {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Priority::HIGH > Priority::MEDIUM);
        assert!(Priority::MEDIUM.with_offset(TASK_PRIORITY_OFFSET) > Priority::MEDIUM);
        assert_eq!(Priority::default(), Priority::new(5.0));
    }

    #[test]
    fn test_offset_does_not_reach_next_named_level() {
        assert!(Priority::LOW.with_offset(TASK_PRIORITY_OFFSET) < Priority::MEDIUM);
    }
}
