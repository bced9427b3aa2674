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

use super::bus::EventBus;
use super::envelope::EventEnvelope;
use super::Event;
use crate::error::EventError;
use crate::tick::TickCounter;
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

/// How a replay orders the batch it drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayOrder {
    /// Strict enqueue order.
    #[default]
    Fifo,
    /// Ascending per-type replay priority, enqueue order within a priority.
    TypePriority,
}

struct DeferredEntry {
    seq: u64,
    tick: u64,
    envelope: EventEnvelope,
}

struct DeferredInner {
    bus: EventBus,
    ticks: TickCounter,
    queue: RefCell<VecDeque<DeferredEntry>>,
    next_seq: Cell<u64>,
    order: Cell<ReplayOrder>,
    priorities: RefCell<HashMap<TypeId, i32>>,
    replaying: Cell<bool>,
}

/// Resets the replay flag even if a delivery unwinds.
struct ReplayGuard<'a>(&'a Cell<bool>);

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Queues events and replays them through an [`EventBus`] on demand.
///
/// Posting never dispatches. [`replay`](Self::replay) delivers exactly the
/// entries that were queued when it was called; anything posted while it runs,
/// including by the listeners it invokes, waits for the next call.
#[derive(Clone)]
pub struct DeferredEventBus {
    inner: Rc<DeferredInner>,
}

impl DeferredEventBus {
    /// Creates a deferred queue that delivers through `bus` and stamps entries
    /// with the current value of `ticks`.
    pub fn new(bus: EventBus, ticks: TickCounter) -> Self {
        Self {
            inner: Rc::new(DeferredInner {
                bus,
                ticks,
                queue: RefCell::new(VecDeque::new()),
                next_seq: Cell::new(0),
                order: Cell::new(ReplayOrder::default()),
                priorities: RefCell::new(HashMap::new()),
                replaying: Cell::new(false),
            }),
        }
    }

    /// Appends `event` to the tail of the queue.
    ///
    /// ## Arguments
    /// * `event` - The event to deliver at the next [`replay`](Self::replay).
    ///
    /// # Errors
    ///
    /// [`EventError`] if `event` can never be a valid event; nothing is queued.
    pub fn post_deferred<E: Event>(&self, event: E) -> Result<(), EventError> {
        self.post_envelope(EventEnvelope::new(event)?);
        Ok(())
    }

    /// Appends an already-erased event to the tail of the queue.
    pub fn post_envelope(&self, envelope: EventEnvelope) {
        let seq = self.inner.next_seq.get();
        self.inner.next_seq.set(seq + 1);
        log::trace!("DeferredEventBus: queued {}", envelope.type_name());
        self.inner.queue.borrow_mut().push_back(DeferredEntry {
            seq,
            tick: self.inner.ticks.get(),
            envelope,
        });
    }

    /// Delivers every entry queued before this call, then returns how many
    /// were delivered.
    ///
    /// Each entry leaves the queue before its listeners run, so it can never
    /// be delivered twice. Calling `replay` from inside a replay is a no-op.
    pub fn replay(&self) -> usize {
        if self.inner.replaying.replace(true) {
            log::warn!("DeferredEventBus: nested replay ignored");
            return 0;
        }
        let _guard = ReplayGuard(&self.inner.replaying);

        let cutoff = self.inner.next_seq.get();
        let delivered = match self.inner.order.get() {
            ReplayOrder::Fifo => self.replay_fifo(cutoff),
            ReplayOrder::TypePriority => self.replay_by_priority(cutoff),
        };

        if delivered > 0 {
            log::trace!("DeferredEventBus: replayed {delivered} events");
        }
        delivered
    }

    fn replay_fifo(&self, cutoff: u64) -> usize {
        let mut delivered = 0;
        loop {
            let entry = {
                let mut queue = self.inner.queue.borrow_mut();
                match queue.front() {
                    Some(front) if front.seq < cutoff => queue.pop_front(),
                    _ => None,
                }
            };
            let Some(entry) = entry else {
                break;
            };
            self.deliver(&entry);
            delivered += 1;
        }
        delivered
    }

    /// Sorts the batch in place at the head of the queue, then pops it like
    /// FIFO, so [`clear`](Self::clear) during delivery behaves the same in
    /// both orders.
    fn replay_by_priority(&self, cutoff: u64) -> usize {
        {
            let mut queue = self.inner.queue.borrow_mut();
            let len = queue.iter().take_while(|entry| entry.seq < cutoff).count();
            let priorities = self.inner.priorities.borrow();
            queue.make_contiguous()[..len].sort_by_key(|entry| {
                priorities
                    .get(&entry.envelope.type_id())
                    .copied()
                    .unwrap_or(0)
            });
        }
        self.replay_fifo(cutoff)
    }

    fn deliver(&self, entry: &DeferredEntry) {
        log::trace!(
            "DeferredEventBus: delivering {} queued at tick {}",
            entry.envelope.type_name(),
            entry.tick
        );
        self.inner.bus.publish_envelope(&entry.envelope);
    }

    /// Selects how subsequent replays order their batch.
    pub fn set_replay_order(&self, order: ReplayOrder) {
        self.inner.order.set(order);
    }

    /// The current replay order.
    pub fn replay_order(&self) -> ReplayOrder {
        self.inner.order.get()
    }

    /// Sets the replay priority of `E` under [`ReplayOrder::TypePriority`].
    ///
    /// Lower values replay first; types without a priority use `0`.
    pub fn set_replay_priority<E: Event>(&self, priority: i32) {
        self.inner
            .priorities
            .borrow_mut()
            .insert(TypeId::of::<E>(), priority);
    }

    /// Number of queued entries.
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.queue.borrow().is_empty()
    }

    /// Tick at which the oldest queued entry was posted.
    pub fn oldest_tick(&self) -> Option<u64> {
        self.inner.queue.borrow().front().map(|entry| entry.tick)
    }

    /// Discards every queued entry and returns how many were dropped.
    pub fn clear(&self) -> usize {
        let dropped = std::mem::take(&mut *self.inner.queue.borrow_mut());
        dropped.len()
    }

    /// The bus replays are delivered through.
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }
}

impl fmt::Debug for DeferredEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredEventBus")
            .field("pending", &self.pending())
            .field("order", &self.inner.order.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq)]
    struct NpcSpawned(u32);

    #[derive(Debug, Clone, PartialEq)]
    struct NpcDespawned(u32);

    type Log = Rc<RefCell<Vec<String>>>;

    fn setup() -> (EventBus, DeferredEventBus, Log) {
        let bus = EventBus::new();
        let deferred = DeferredEventBus::new(bus.clone(), TickCounter::new());
        let log = Log::default();
        {
            let log = log.clone();
            bus.listen::<NpcSpawned, _>(0, "spawn", move |e| {
                log.borrow_mut().push(format!("spawn:{}", e.0));
                Ok(())
            });
        }
        {
            let log = log.clone();
            bus.listen::<NpcDespawned, _>(0, "despawn", move |e| {
                log.borrow_mut().push(format!("despawn:{}", e.0));
                Ok(())
            });
        }
        (bus, deferred, log)
    }

    #[test]
    fn test_post_never_dispatches() {
        let (_bus, deferred, log) = setup();
        deferred.post_deferred(NpcSpawned(1)).unwrap();

        assert!(log.borrow().is_empty());
        assert_eq!(deferred.pending(), 1);
    }

    #[test]
    fn test_replay_preserves_enqueue_order_and_delivers_once() {
        let (_bus, deferred, log) = setup();
        deferred.post_deferred(NpcSpawned(1)).unwrap();
        deferred.post_deferred(NpcDespawned(1)).unwrap();
        deferred.post_deferred(NpcSpawned(2)).unwrap();

        assert_eq!(deferred.replay(), 3);
        assert_eq!(deferred.replay(), 0);

        assert_eq!(*log.borrow(), vec!["spawn:1", "despawn:1", "spawn:2"]);
        assert!(deferred.is_empty());
    }

    #[test]
    fn test_posts_during_replay_wait_for_next_replay() {
        let (bus, deferred, log) = setup();
        {
            let deferred2 = deferred.clone();
            bus.listen::<NpcSpawned, _>(1, "chain", move |e| {
                if e.0 < 3 {
                    deferred2.post_deferred(NpcSpawned(e.0 + 1))?;
                }
                Ok(())
            });
        }

        deferred.post_deferred(NpcSpawned(1)).unwrap();
        assert_eq!(deferred.replay(), 1);
        assert_eq!(deferred.pending(), 1);
        assert_eq!(deferred.replay(), 1);
        assert_eq!(deferred.replay(), 1);
        assert_eq!(deferred.replay(), 0);

        assert_eq!(*log.borrow(), vec!["spawn:1", "spawn:2", "spawn:3"]);
    }

    #[test]
    fn test_nested_replay_is_ignored() {
        let (bus, deferred, log) = setup();
        {
            let deferred2 = deferred.clone();
            bus.listen::<NpcSpawned, _>(1, "nested", move |_| {
                assert_eq!(deferred2.replay(), 0);
                Ok(())
            });
        }

        deferred.post_deferred(NpcSpawned(1)).unwrap();
        deferred.post_deferred(NpcDespawned(1)).unwrap();
        assert_eq!(deferred.replay(), 2);
        assert_eq!(*log.borrow(), vec!["spawn:1", "despawn:1"]);
        assert_eq!(bus.failure_count(), 0);
    }

    #[test]
    fn test_clear_then_post_during_replay_defers_new_entry() {
        let (bus, deferred, log) = setup();
        {
            let deferred2 = deferred.clone();
            bus.listen::<NpcDespawned, _>(1, "reset", move |_| {
                deferred2.clear();
                deferred2.post_deferred(NpcSpawned(99))?;
                Ok(())
            });
        }

        deferred.post_deferred(NpcDespawned(1)).unwrap();
        deferred.post_deferred(NpcSpawned(2)).unwrap();
        assert_eq!(deferred.replay(), 1);
        assert_eq!(*log.borrow(), vec!["despawn:1"]);

        assert_eq!(deferred.replay(), 1);
        assert_eq!(*log.borrow(), vec!["despawn:1", "spawn:99"]);
    }

    #[test]
    fn test_clear_during_replay_stops_the_batch_in_both_orders() {
        for order in [ReplayOrder::Fifo, ReplayOrder::TypePriority] {
            let (bus, deferred, log) = setup();
            deferred.set_replay_order(order);
            {
                let deferred2 = deferred.clone();
                bus.listen::<NpcSpawned, _>(1, "reset-on-first", move |e| {
                    if e.0 == 1 {
                        deferred2.clear();
                    }
                    Ok(())
                });
            }

            for id in 1..=3 {
                deferred.post_deferred(NpcSpawned(id)).unwrap();
            }

            assert_eq!(deferred.replay(), 1, "{order:?}");
            assert_eq!(*log.borrow(), vec!["spawn:1"], "{order:?}");
            assert!(deferred.is_empty(), "{order:?}");
        }
    }

    #[test]
    fn test_type_priority_reorders_within_a_batch() {
        let (_bus, deferred, log) = setup();
        deferred.set_replay_order(ReplayOrder::TypePriority);
        deferred.set_replay_priority::<NpcSpawned>(-1);

        deferred.post_deferred(NpcDespawned(1)).unwrap();
        deferred.post_deferred(NpcSpawned(1)).unwrap();
        deferred.post_deferred(NpcDespawned(2)).unwrap();
        deferred.post_deferred(NpcSpawned(2)).unwrap();

        assert_eq!(deferred.replay(), 4);
        assert_eq!(
            *log.borrow(),
            vec!["spawn:1", "spawn:2", "despawn:1", "despawn:2"]
        );
    }

    #[test]
    fn test_entries_are_stamped_with_the_current_tick() {
        let bus = EventBus::new();
        let ticks = TickCounter::new();
        let deferred = DeferredEventBus::new(bus, ticks.clone());

        ticks.increment();
        ticks.increment();
        deferred.post_deferred(NpcSpawned(1)).unwrap();
        ticks.increment();
        deferred.post_deferred(NpcSpawned(2)).unwrap();

        assert_eq!(deferred.oldest_tick(), Some(2));
    }

    #[test]
    fn test_malformed_event_is_not_queued() {
        let (_bus, deferred, _log) = setup();
        assert_eq!(deferred.post_deferred(()).unwrap_err(), EventError::Empty);
        assert!(deferred.is_empty());
    }
}
