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

//! Failure containment for user-supplied callbacks.
//!
//! Every listener, scheduled task, maintenance callable and render hook runs
//! through [`contained`]. Whatever it does (return an error, panic) stays at
//! that call site: the failure is logged once and handed back as a value so
//! callers can count it, and execution continues with the next sibling.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Which kind of callback failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// An event listener.
    Listener,
    /// A scheduled task.
    Task,
    /// A maintenance collaborator.
    Maintenance,
    /// The render/overlay collaborator.
    Render,
    /// Work handed over from a background thread.
    Invoke,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Listener => "ListenerFailure",
            FailureKind::Task => "TaskFailure",
            FailureKind::Maintenance => "MaintenanceFailure",
            FailureKind::Render => "RenderFailure",
            FailureKind::Invoke => "InvokeFailure",
        };
        f.write_str(name)
    }
}

/// What went wrong inside the callback.
#[derive(Debug)]
pub enum FailureCause {
    /// The callback returned `Err`.
    Error(anyhow::Error),
    /// The callback panicked; holds the panic message when it was a string.
    Panic(String),
}

/// A contained callback failure.
#[derive(Debug)]
pub struct Failure {
    /// Category of the callback.
    pub kind: FailureKind,
    /// Label of the listener, task or collaborator.
    pub label: String,
    /// Extra context, e.g. the event type being dispatched.
    pub context: Option<&'static str>,
    /// The underlying error or panic.
    pub cause: FailureCause,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in '{}'", self.kind, self.label)?;
        if let Some(context) = self.context {
            write!(f, " while handling {context}")?;
        }
        match &self.cause {
            FailureCause::Error(err) => write!(f, ": {err:#}"),
            FailureCause::Panic(msg) => write!(f, ": panicked: {msg}"),
        }
    }
}

impl Failure {
    /// Returns `true` if the callback panicked rather than returning an error.
    pub fn is_panic(&self) -> bool {
        matches!(self.cause, FailureCause::Panic(_))
    }
}

/// Runs `f`, containing any error or panic it produces.
///
/// Returns `None` on success. On failure the [`Failure`] is logged at `error`
/// level and returned; it is never re-raised.
pub fn contained<F>(
    kind: FailureKind,
    label: &str,
    context: Option<&'static str>,
    f: F,
) -> Option<Failure>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    let cause = match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => return None,
        Ok(Err(err)) => FailureCause::Error(err),
        Err(payload) => FailureCause::Panic(panic_message(payload.as_ref())),
    };

    let failure = Failure {
        kind,
        label: label.to_owned(),
        context,
        cause,
    };
    log::error!("{failure}");
    Some(failure)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "<non-string panic payload>".to_owned()
    }
}
