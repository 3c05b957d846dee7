// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The Queue Manager and the structures it schedules with.

mod manager;
mod page;
mod priority_work_queue;

pub use manager::{QueueManager, ADDED_TO_RUNNABLE_QUEUE};
pub use page::{PageFilter, QueuePage, RunnablesPage};
pub use priority_work_queue::{PrioritizedTask, PriorityWorkQueue};
