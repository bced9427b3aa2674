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

//! Error types surfaced synchronously by the core call contracts.
//!
//! These cover programmer errors only (bad arguments, double registration).
//! Failures raised *inside* user callbacks never show up here; they are
//! contained where they happen, see [`crate::isolate`].

use thiserror::Error;

/// Returned by [`EventBus::register`](crate::event::EventBus::register).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The subscriber is already registered on this bus.
    #[error("subscriber '{subscriber}' is already registered")]
    Duplicate {
        /// Type name of the offending subscriber.
        subscriber: &'static str,
    },
}

/// A malformed event handed to `publish` or `post_deferred`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The unit value `()` carries no information and is never a valid event.
    #[error("cannot publish an empty `()` event")]
    Empty,
    /// A `Box<dyn Any>` was published instead of the value it contains.
    ///
    /// The runtime type of such a payload is the box itself, so it would never
    /// match a listener.
    #[error("event of type '{type_name}' is a boxed payload; publish the inner value")]
    DoubleBoxed {
        /// Type name of the wrapper that was published.
        type_name: &'static str,
    },
}

/// Returned by [`Scheduler::schedule`](crate::scheduler::Scheduler::schedule)
/// and its variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// A recurring task was given a zero interval.
    #[error("recurring task interval must be non-zero")]
    ZeroInterval,
    /// The due time cannot be represented by the clock.
    #[error("delay overflows the monotonic clock")]
    DelayOverflow,
    /// The scheduler has been shut down and accepts no more work.
    #[error("scheduler has been shut down")]
    ShutDown,
}

/// Returned when background work cannot be handed to the dispatch thread.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandoffError {
    /// The hand-off queue is at capacity; the item was dropped.
    #[error("hand-off queue is full")]
    Full,
    /// The dispatcher has been torn down.
    #[error("dispatcher is gone")]
    Disconnected,
    /// The event was rejected before it was queued.
    #[error(transparent)]
    Invalid(#[from] EventError),
}
