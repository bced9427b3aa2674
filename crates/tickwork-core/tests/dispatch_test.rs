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

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tickwork_core::{
    Clock, DeferredEventBus, EventBus, ManualClock, Repeat, Scheduler, Subscriber, Subscriptions,
    TickCounter,
};

// --- EVENTS USED BY THESE TESTS ---
#[derive(Debug, Clone, PartialEq)]
struct ChatMessage(&'static str);

#[derive(Debug)]
struct NpcDespawned(u32);

type Journal = Rc<RefCell<Vec<String>>>;

struct ChatLog {
    name: &'static str,
    journal: Journal,
}

impl Subscriber for ChatLog {
    fn subscribe(&self, subs: &mut Subscriptions<Self>) {
        subs.on::<ChatMessage, _>(0, |this, msg| {
            this.journal
                .borrow_mut()
                .push(format!("{}:{}", this.name, msg.0));
            Ok(())
        });
    }
}

#[test]
fn test_deferred_events_reach_subscribers_only_on_replay() {
    // --- 1. ARRANGE ---
    let bus = EventBus::new();
    let deferred = DeferredEventBus::new(bus.clone(), TickCounter::new());
    let journal = Journal::default();
    let log = Rc::new(ChatLog {
        name: "log",
        journal: journal.clone(),
    });
    bus.register(&log).unwrap();

    // --- 2. ACT ---
    deferred.post_deferred(ChatMessage("X")).unwrap();
    deferred.post_deferred(ChatMessage("Y")).unwrap();
    bus.publish(&ChatMessage("direct")).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(*journal.borrow(), vec!["log:direct"]);
    assert_eq!(deferred.replay(), 2);
    assert_eq!(*journal.borrow(), vec!["log:direct", "log:X", "log:Y"]);
    assert_eq!(deferred.replay(), 0, "Entries must never be delivered twice");
}

#[test]
fn test_dropped_subscriber_can_be_replaced() {
    let bus = EventBus::new();
    let journal = Journal::default();

    let first = Rc::new(ChatLog {
        name: "first",
        journal: journal.clone(),
    });
    bus.register(&first).unwrap();
    drop(first);

    bus.publish(&ChatMessage("gone")).unwrap();
    assert!(journal.borrow().is_empty(), "Dropped subscriber must stay silent");

    // A fresh allocation may reuse the old address; registration must still succeed.
    let second = Rc::new(ChatLog {
        name: "second",
        journal: journal.clone(),
    });
    bus.register(&second).expect("Replacement subscriber should register");
    bus.publish(&ChatMessage("back")).unwrap();

    assert_eq!(*journal.borrow(), vec!["second:back"]);
    assert_eq!(bus.subscriber_count(), 1);
}

#[test]
fn test_scheduled_task_posts_into_the_deferred_queue() {
    // --- 1. ARRANGE ---
    let clock = ManualClock::new();
    let bus = EventBus::new();
    let deferred = DeferredEventBus::new(bus.clone(), TickCounter::new());
    let scheduler = Scheduler::new(Rc::new(clock.clone()));

    let despawned = Rc::new(Cell::new(0));
    {
        let despawned = despawned.clone();
        bus.listen::<NpcDespawned, _>(0, "despawn-counter", move |event| {
            despawned.set(despawned.get() + event.0);
            Ok(())
        });
    }
    {
        let deferred = deferred.clone();
        scheduler
            .schedule(
                "despawn-sweep",
                Duration::from_millis(600),
                Repeat::Every(Duration::from_millis(600)),
                move || {
                    deferred.post_deferred(NpcDespawned(1))?;
                    Ok(())
                },
            )
            .unwrap();
    }

    // --- 2. ACT ---
    for _ in 0..3 {
        clock.advance(Duration::from_millis(600));
        scheduler.tick(clock.now());
    }

    // --- 3. ASSERT ---
    assert_eq!(despawned.get(), 0, "Posting must never dispatch synchronously");
    assert_eq!(deferred.pending(), 3);
    deferred.replay();
    assert_eq!(despawned.get(), 3);
}

#[test]
fn test_listener_failures_do_not_stop_delivery() {
    let bus = EventBus::new();
    let reached = Rc::new(Cell::new(false));

    bus.listen::<ChatMessage, _>(-10, "erroring", |_| anyhow::bail!("bad message"));
    bus.listen::<ChatMessage, _>(-5, "panicking", |_| panic!("listener blew up"));
    {
        let reached = reached.clone();
        bus.listen::<ChatMessage, _>(0, "survivor", move |_| {
            reached.set(true);
            Ok(())
        });
    }

    assert_eq!(bus.publish(&ChatMessage("hi")).unwrap(), 3);
    assert!(reached.get());
    assert_eq!(bus.failure_count(), 2);
}
