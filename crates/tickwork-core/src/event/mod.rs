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

//! Synchronous publish/subscribe and deferred replay.
//!
//! The [`EventBus`] delivers an event to every listener registered for its
//! exact runtime type, in priority order, on the calling thread. The
//! [`DeferredEventBus`] holds events back and replays them through an
//! `EventBus` at a controlled point of the main loop.
//!
//! Both are cheap, clonable handles over shared single-threaded state; clones
//! observe the same listeners and the same queue.

mod bus;
mod deferred;
mod envelope;

pub use self::bus::{EventBus, ListenerHandle, Subscriber, SubscriberId, Subscriptions};
pub use self::deferred::{DeferredEventBus, ReplayOrder};
pub use self::envelope::{EventEnvelope, SendEventEnvelope};

use std::any::Any;

/// Marker for values that can travel through the bus.
///
/// Implemented for every `'static` type; events are identified by their
/// [`TypeId`](std::any::TypeId) at dispatch time.
pub trait Event: Any {}

impl<T: Any> Event for T {}
