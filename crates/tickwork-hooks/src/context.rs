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

//! Shared dispatch state handed to code running on the dispatch thread.

use tickwork_core::{DeferredEventBus, EventBus, Scheduler, TickCounter};

/// Clonable view over the dispatcher's bus, deferred queue, scheduler and
/// tick counter.
///
/// Background invocations receive one when they run, so they can act on the
/// dispatch-thread state without holding it across threads.
#[derive(Clone, Debug)]
pub struct DispatchContext {
    bus: EventBus,
    deferred: DeferredEventBus,
    scheduler: Scheduler,
    ticks: TickCounter,
}

impl DispatchContext {
    pub(crate) fn new(
        bus: EventBus,
        deferred: DeferredEventBus,
        scheduler: Scheduler,
        ticks: TickCounter,
    ) -> Self {
        Self {
            bus,
            deferred,
            scheduler,
            ticks,
        }
    }

    /// The synchronous event bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The deferred queue, replayed at each logical tick.
    pub fn deferred(&self) -> &DeferredEventBus {
        &self.deferred
    }

    /// The maintenance scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Current logical tick.
    pub fn tick(&self) -> u64 {
        self.ticks.get()
    }

    pub(crate) fn ticks(&self) -> &TickCounter {
        &self.ticks
    }
}
