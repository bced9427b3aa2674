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

//! A cooperative scheduler for time- and tick-triggered work.
//!
//! The [`Scheduler`] never runs anything on its own: the owner calls
//! [`tick`](Scheduler::tick) from the main loop's maintenance pass, and every
//! task that is due at that moment runs once, in submission order, on the
//! calling thread.

mod task;

pub use self::task::{Due, Repeat, TaskHandle};

use self::task::{TaskEntry, TaskFn};
use crate::clock::{Clock, SystemClock};
use crate::error::ScheduleError;
use crate::isolate::{contained, FailureKind};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

struct SchedulerInner {
    clock: Rc<dyn Clock>,
    /// Submission order. Only appended to while a pass is running.
    tasks: RefCell<Vec<TaskEntry>>,
    next_id: Cell<u64>,
    current_tick: Cell<u64>,
    ticking: Cell<bool>,
    shut_down: Cell<bool>,
    stale: Cell<usize>,
    failures: Cell<u64>,
}

struct PassGuard<'a>(&'a Cell<bool>);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Holds pending tasks and runs the due ones on each [`tick`](Self::tick).
///
/// A cheap, clonable handle: tasks may schedule or cancel other tasks (or
/// themselves) while running.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    /// Creates a scheduler that reads submission time from `clock`.
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                clock,
                tasks: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                current_tick: Cell::new(0),
                ticking: Cell::new(false),
                shut_down: Cell::new(false),
                stale: Cell::new(0),
                failures: Cell::new(0),
            }),
        }
    }

    /// Schedules `task` to run `delay` from now.
    ///
    /// ## Arguments
    /// * `label` - Name used in logs and failure reports.
    /// * `delay` - Time from now until the first run.
    /// * `repeat` - What happens after each run.
    /// * `task` - The work itself.
    ///
    /// ## Returns
    /// A [`TaskHandle`] for [`cancel`](Self::cancel).
    ///
    /// # Errors
    ///
    /// * [`ScheduleError::ZeroInterval`] for a recurring task with a zero interval.
    /// * [`ScheduleError::DelayOverflow`] if the due time is not representable.
    /// * [`ScheduleError::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn schedule<F>(
        &self,
        label: &str,
        delay: Duration,
        repeat: Repeat,
        task: F,
    ) -> Result<TaskHandle, ScheduleError>
    where
        F: FnMut() -> anyhow::Result<()> + 'static,
    {
        self.check_accepts(repeat)?;
        let due = self
            .inner
            .clock
            .now()
            .checked_add(delay)
            .ok_or(ScheduleError::DelayOverflow)?;
        Ok(self.submit(label, Due::At(due), repeat, Box::new(task)))
    }

    /// Schedules `task` to run `ticks` logical ticks from the current one.
    ///
    /// # Errors
    ///
    /// Same as [`schedule`](Self::schedule), minus the overflow case.
    pub fn schedule_ticks<F>(
        &self,
        label: &str,
        ticks: u64,
        repeat: Repeat,
        task: F,
    ) -> Result<TaskHandle, ScheduleError>
    where
        F: FnMut() -> anyhow::Result<()> + 'static,
    {
        self.check_accepts(repeat)?;
        let due = self.inner.current_tick.get().saturating_add(ticks);
        Ok(self.submit(label, Due::Tick(due), repeat, Box::new(task)))
    }

    fn check_accepts(&self, repeat: Repeat) -> Result<(), ScheduleError> {
        if self.inner.shut_down.get() {
            return Err(ScheduleError::ShutDown);
        }
        if repeat.is_zero() {
            return Err(ScheduleError::ZeroInterval);
        }
        Ok(())
    }

    fn submit(&self, label: &str, due: Due, repeat: Repeat, handler: TaskFn) -> TaskHandle {
        let id = self.inner.next_id.get() + 1;
        self.inner.next_id.set(id);
        log::debug!("Scheduler: scheduled '{label}' (id={id}, due={due:?}, repeat={repeat:?})");

        self.inner.tasks.borrow_mut().push(TaskEntry {
            id,
            label: Rc::from(label),
            due,
            repeat,
            cancelled: false,
            retired: false,
            handler: Some(handler),
        });
        TaskHandle { id }
    }

    /// Cancels a task. A cancelled task never runs again, even if it is
    /// already due in the current pass.
    ///
    /// Returns `false` if the task had already finished or been cancelled.
    pub fn cancel(&self, handle: TaskHandle) -> bool {
        let cancelled = {
            let mut tasks = self.inner.tasks.borrow_mut();
            match tasks
                .iter_mut()
                .find(|task| task.id == handle.id && task.is_live())
            {
                Some(task) => {
                    task.cancelled = true;
                    log::debug!("Scheduler: cancelled '{}'", task.label);
                    true
                }
                None => false,
            }
        };

        if cancelled {
            self.inner.stale.set(self.inner.stale.get() + 1);
            if !self.inner.ticking.get() {
                self.compact();
            }
        }
        cancelled
    }

    /// Returns `true` while the task is pending or running.
    pub fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.inner
            .tasks
            .borrow()
            .iter()
            .any(|task| task.id == handle.id && task.is_live())
    }

    /// Tells the scheduler which logical tick the host is on.
    pub fn observe_tick(&self, tick: u64) {
        self.inner.current_tick.set(tick);
    }

    /// The last tick passed to [`observe_tick`](Self::observe_tick).
    pub fn current_tick(&self) -> u64 {
        self.inner.current_tick.get()
    }

    /// Runs every active task due at `now` and returns how many ran.
    ///
    /// Due tasks are selected in one scan over the tasks present when the pass
    /// starts; work scheduled by a running task waits for the next pass. A
    /// failing task is logged and then treated as if it had returned normally:
    /// one-shots retire, recurring tasks re-arm from `now`.
    pub fn tick(&self, now: Instant) -> usize {
        if self.inner.shut_down.get() {
            return 0;
        }
        if self.inner.ticking.replace(true) {
            log::warn!("Scheduler: nested tick ignored");
            return 0;
        }
        let _guard = PassGuard(&self.inner.ticking);

        let current_tick = self.inner.current_tick.get();
        let due: Vec<(usize, u64)> = self
            .inner
            .tasks
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, task)| {
                task.is_live() && task.handler.is_some() && task.due.is_reached(now, current_tick)
            })
            .map(|(index, task)| (index, task.id))
            .collect();

        let mut executed = 0;
        for (index, id) in due {
            let taken = {
                let mut tasks = self.inner.tasks.borrow_mut();
                match tasks.get_mut(index) {
                    Some(task) if task.id == id && task.is_live() => task
                        .handler
                        .take()
                        .map(|handler| (Rc::clone(&task.label), handler)),
                    _ => None,
                }
            };
            let Some((label, mut handler)) = taken else {
                continue;
            };

            executed += 1;
            log::trace!("Scheduler: running '{label}'");
            if contained(FailureKind::Task, &label, None, || handler()).is_some() {
                self.inner.failures.set(self.inner.failures.get() + 1);
            }

            // Dropped outside the borrow: a task's captures may call back in.
            let finished = self.finish_run(index, id, now, handler);
            drop(finished);
        }

        self.compact();
        executed
    }

    fn finish_run(&self, index: usize, id: u64, now: Instant, handler: TaskFn) -> Option<TaskFn> {
        let mut tasks = self.inner.tasks.borrow_mut();
        let Some(task) = tasks.get_mut(index).filter(|task| task.id == id) else {
            return Some(handler);
        };
        if task.cancelled {
            return Some(handler);
        }

        task.rearm(now, self.inner.current_tick.get());
        if task.retired {
            self.inner.stale.set(self.inner.stale.get() + 1);
            Some(handler)
        } else {
            task.handler = Some(handler);
            None
        }
    }

    /// Removes finished and cancelled tasks.
    fn compact(&self) {
        if self.inner.stale.get() == 0 {
            return;
        }
        let stale: Vec<TaskEntry> = {
            let mut tasks = self.inner.tasks.borrow_mut();
            let (live, stale) = std::mem::take(&mut *tasks)
                .into_iter()
                .partition(TaskEntry::is_live);
            *tasks = live;
            stale
        };
        self.inner.stale.set(0);
        drop(stale);
    }

    /// Cancels every task and rejects further scheduling.
    pub fn shutdown(&self) {
        if self.inner.shut_down.replace(true) {
            return;
        }
        let dropped = std::mem::take(&mut *self.inner.tasks.borrow_mut());
        log::info!("Scheduler: shut down, {} tasks cancelled", dropped.len());
        drop(dropped);
    }

    /// Returns `true` after [`shutdown`](Self::shutdown).
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.get()
    }

    /// Number of pending (or running) tasks.
    pub fn len(&self) -> usize {
        self.inner
            .tasks
            .borrow()
            .iter()
            .filter(|task| task.is_live())
            .count()
    }

    /// Returns `true` if no task is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total task failures contained since creation.
    pub fn failure_count(&self) -> u64 {
        self.inner.failures.get()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Rc::new(SystemClock))
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.len())
            .field("current_tick", &self.inner.current_tick.get())
            .field("shut_down", &self.inner.shut_down.get())
            .finish()
    }
}
