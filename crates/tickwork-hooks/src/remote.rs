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

//! Background hand-off into the dispatch thread.
//!
//! Background threads never touch dispatch state. They hold a [`RemoteHandle`]
//! that pushes commands onto a bounded channel; the dispatcher consumes them
//! once per frame, right after the render hook.

use crate::context::DispatchContext;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::collections::VecDeque;
use std::time::Duration;
use tickwork_core::{contained, Event, FailureKind, HandoffError, Repeat, SendEventEnvelope};

type RemoteTaskFn = Box<dyn FnMut() -> anyhow::Result<()> + Send>;
type InvokeFn = Box<dyn FnOnce(&DispatchContext) -> anyhow::Result<()> + Send>;
type InvokeUntilFn = Box<dyn FnMut(&DispatchContext) -> anyhow::Result<bool> + Send>;

pub(crate) enum RemoteCommand {
    PostDeferred(SendEventEnvelope),
    Schedule {
        label: String,
        delay: Duration,
        repeat: Repeat,
        task: RemoteTaskFn,
    },
    Invoke {
        label: String,
        task: InvokeFn,
    },
    InvokeUntil {
        label: String,
        task: InvokeUntilFn,
    },
}

/// Sending half of the hand-off queue. `Send + Sync`, cheap to clone.
///
/// Every method enqueues and returns immediately; nothing runs until the
/// dispatch thread drains the queue on its next frame.
#[derive(Clone, Debug)]
pub struct RemoteHandle {
    tx: Sender<RemoteCommand>,
}

impl RemoteHandle {
    pub(crate) fn new(tx: Sender<RemoteCommand>) -> Self {
        Self { tx }
    }

    /// Queues `event` for the deferred queue; it is delivered at the first
    /// logical tick after the frame that drains it.
    ///
    /// ## Arguments
    /// * `event` - The event, validated here on the calling thread.
    ///
    /// ## Returns
    /// `Ok` once the command is queued, or why it was not.
    pub fn post_deferred<E: Event + Send>(&self, event: E) -> Result<(), HandoffError> {
        let envelope = SendEventEnvelope::new(event)?;
        self.send(RemoteCommand::PostDeferred(envelope))
    }

    /// Asks the dispatch thread to schedule `task` on its scheduler.
    ///
    /// The delay counts from the frame that drains the request. Rejected
    /// schedules are logged on the dispatch thread.
    pub fn schedule<F>(
        &self,
        label: impl Into<String>,
        delay: Duration,
        repeat: Repeat,
        task: F,
    ) -> Result<(), HandoffError>
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        self.send(RemoteCommand::Schedule {
            label: label.into(),
            delay,
            repeat,
            task: Box::new(task),
        })
    }

    /// Runs `task` once on the dispatch thread.
    pub fn invoke<F>(&self, label: impl Into<String>, task: F) -> Result<(), HandoffError>
    where
        F: FnOnce(&DispatchContext) -> anyhow::Result<()> + Send + 'static,
    {
        self.send(RemoteCommand::Invoke {
            label: label.into(),
            task: Box::new(task),
        })
    }

    /// Runs `task` on the dispatch thread once per frame until it returns
    /// `true`. A failure ends the retries.
    pub fn invoke_until<F>(&self, label: impl Into<String>, task: F) -> Result<(), HandoffError>
    where
        F: FnMut(&DispatchContext) -> anyhow::Result<bool> + Send + 'static,
    {
        self.send(RemoteCommand::InvokeUntil {
            label: label.into(),
            task: Box::new(task),
        })
    }

    fn send(&self, command: RemoteCommand) -> Result<(), HandoffError> {
        self.tx.try_send(command).map_err(|err| match err {
            TrySendError::Full(_) => {
                log::warn!("RemoteHandle: hand-off queue full, command dropped");
                HandoffError::Full
            }
            TrySendError::Disconnected(_) => HandoffError::Disconnected,
        })
    }
}

struct PendingInvoke {
    label: String,
    task: InvokeUntilFn,
}

/// What one drain did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DrainReport {
    pub commands: usize,
    pub failures: u64,
}

/// Receiving half, owned by the dispatcher.
pub(crate) struct RemoteInbox {
    rx: Receiver<RemoteCommand>,
    /// Round-robin: unfinished invocations go to the back.
    retries: VecDeque<PendingInvoke>,
}

impl RemoteInbox {
    pub fn new(rx: Receiver<RemoteCommand>) -> Self {
        Self {
            rx,
            retries: VecDeque::new(),
        }
    }

    /// Runs at most `budget` callbacks: retries of unfinished invocations
    /// first, then new commands.
    ///
    /// Retries get the whole budget only while no new command is waiting;
    /// otherwise they are capped at half of it so the queue keeps moving.
    /// Retries that do not fit wait for the next drain, in order.
    pub fn drain(&mut self, ctx: &DispatchContext, budget: usize) -> DrainReport {
        let mut report = DrainReport::default();

        let retry_budget = if self.rx.is_empty() {
            budget
        } else {
            budget.div_ceil(2)
        };
        let retried = self.retries.len().min(retry_budget);
        for _ in 0..retried {
            if let Some(pending) = self.retries.pop_front() {
                self.run_until(ctx, pending, &mut report);
            }
        }

        let budget = budget - retried;
        let commands: Vec<RemoteCommand> = self.rx.try_iter().take(budget).collect();
        for command in commands {
            report.commands += 1;
            match command {
                RemoteCommand::PostDeferred(envelope) => {
                    ctx.deferred().post_envelope(envelope.into());
                }
                RemoteCommand::Schedule {
                    label,
                    delay,
                    repeat,
                    task,
                } => {
                    if let Err(err) = ctx.scheduler().schedule(&label, delay, repeat, task) {
                        log::warn!("RemoteInbox: could not schedule '{label}': {err}");
                    }
                }
                RemoteCommand::Invoke { label, task } => {
                    if contained(FailureKind::Invoke, &label, None, || task(ctx)).is_some() {
                        report.failures += 1;
                    }
                }
                RemoteCommand::InvokeUntil { label, task } => {
                    self.run_until(ctx, PendingInvoke { label, task }, &mut report);
                }
            }
        }

        if report.commands > 0 {
            log::trace!("RemoteInbox: consumed {} commands", report.commands);
        }
        report
    }

    fn run_until(&mut self, ctx: &DispatchContext, pending: PendingInvoke, report: &mut DrainReport) {
        let PendingInvoke { label, mut task } = pending;
        let mut done = true;
        let failure = contained(FailureKind::Invoke, &label, None, || {
            done = task(ctx)?;
            Ok(())
        });

        if failure.is_some() {
            report.failures += 1;
        } else if !done {
            self.retries.push_back(PendingInvoke { label, task });
        }
    }

    /// Invocations still waiting to report completion.
    pub fn retries(&self) -> usize {
        self.retries.len()
    }
}

/// Creates a connected handle and inbox.
pub(crate) fn channel(capacity: usize) -> (RemoteHandle, RemoteInbox) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (RemoteHandle::new(tx), RemoteInbox::new(rx))
}
