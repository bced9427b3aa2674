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

//! # Tickwork Core
//!
//! Dispatch primitives for a host loop that advances in frames and logical
//! ticks: a synchronous typed [`EventBus`], a [`DeferredEventBus`] replayed at
//! tick boundaries, and a cooperative [`Scheduler`].
//!
//! Everything here is single-threaded. Handles are `Rc`-based and meant to be
//! driven from the one thread that owns the main loop; see the
//! `tickwork-hooks` crate for the dispatcher and the background hand-off.

#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod event;
pub mod isolate;
pub mod scheduler;
pub mod tick;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EventError, HandoffError, RegistrationError, ScheduleError};
pub use event::{
    DeferredEventBus, Event, EventBus, EventEnvelope, ListenerHandle, ReplayOrder,
    SendEventEnvelope, Subscriber, SubscriberId, Subscriptions,
};
pub use isolate::{contained, Failure, FailureCause, FailureKind};
pub use scheduler::{Due, Repeat, Scheduler, TaskHandle};
pub use tick::TickCounter;
