// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Task descriptors owned by the [`Scheduler`](super::Scheduler).

use std::rc::Rc;
use std::time::{Duration, Instant};

pub(super) type TaskFn = Box<dyn FnMut() -> anyhow::Result<()>>;

/// Repeat policy of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Run once, then retire.
    Once,
    /// Run again `interval` after each completed run.
    Every(Duration),
    /// Run again `n` logical ticks after each completed run.
    EveryTicks(u64),
}

impl Repeat {
    pub(super) fn is_zero(&self) -> bool {
        matches!(self, Repeat::Every(interval) if interval.is_zero())
            || matches!(self, Repeat::EveryTicks(0))
    }
}

/// When a task becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    /// At or after a monotonic instant.
    At(Instant),
    /// At or after a logical tick.
    Tick(u64),
}

impl Due {
    pub(super) fn is_reached(&self, now: Instant, tick: u64) -> bool {
        match *self {
            Due::At(at) => at <= now,
            Due::Tick(due_tick) => due_tick <= tick,
        }
    }
}

/// Cancellation handle returned by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    pub(super) id: u64,
}

impl TaskHandle {
    /// The scheduler-unique task id.
    pub fn id(&self) -> u64 {
        self.id
    }
}

pub(super) struct TaskEntry {
    pub id: u64,
    pub label: Rc<str>,
    pub due: Due,
    pub repeat: Repeat,
    pub cancelled: bool,
    pub retired: bool,
    /// `None` while the task is running.
    pub handler: Option<TaskFn>,
}

impl TaskEntry {
    pub fn is_live(&self) -> bool {
        !self.cancelled && !self.retired
    }

    /// Computes the next due time after a run that finished at `now`.
    ///
    /// Recurring tasks re-arm from `now`, never from their previous due time,
    /// so a stalled loop does not produce a burst of catch-up runs.
    pub fn rearm(&mut self, now: Instant, tick: u64) {
        match self.repeat {
            Repeat::Once => self.retired = true,
            Repeat::Every(interval) => match now.checked_add(interval) {
                Some(next) => self.due = Due::At(next),
                None => {
                    log::warn!(
                        "Scheduler: '{}' cannot be re-armed past the clock range",
                        self.label
                    );
                    self.retired = true;
                }
            },
            Repeat::EveryTicks(n) => self.due = Due::Tick(tick.saturating_add(n)),
        }
    }
}
