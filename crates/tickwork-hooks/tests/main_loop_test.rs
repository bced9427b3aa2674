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
use tickwork_core::{ManualClock, Repeat, Subscriber, Subscriptions};
use tickwork_hooks::{
    BeforeRender, GameTick, Hooks, HooksConfig, OverlayLayer, RenderHook, SurfaceHandle,
};

// --- EVENTS AND SUBSCRIBERS FOR THIS TEST ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Packet {
    Despawn(u32),
    Spawn(u32),
}

/// Host-side event raised while a logical tick is being decoded.
#[derive(Debug)]
struct PacketBurst(Vec<Packet>);

struct PacketDecoder {
    deferred: tickwork_core::DeferredEventBus,
}

impl Subscriber for PacketDecoder {
    fn subscribe(&self, subs: &mut Subscriptions<Self>) {
        subs.on::<PacketBurst, _>(0, |this, burst| {
            for packet in &burst.0 {
                this.deferred.post_deferred(*packet)?;
            }
            Ok(())
        });
    }
}

#[derive(Default)]
struct RecordingRenderer {
    frames: Rc<Cell<u32>>,
    layers: Rc<RefCell<Vec<OverlayLayer>>>,
}

impl RenderHook for RecordingRenderer {
    fn render_frame(&mut self, _surface: SurfaceHandle) -> anyhow::Result<()> {
        self.frames.set(self.frames.get() + 1);
        Ok(())
    }

    fn render_layer(&mut self, _surface: SurfaceHandle, layer: OverlayLayer) -> anyhow::Result<()> {
        self.layers.borrow_mut().push(layer);
        Ok(())
    }
}

struct PanickingRenderer;

impl RenderHook for PanickingRenderer {
    fn render_frame(&mut self, _surface: SurfaceHandle) -> anyhow::Result<()> {
        panic!("surface lost");
    }
}

fn manual_hooks() -> (Hooks, ManualClock) {
    let clock = ManualClock::new();
    let hooks = Hooks::builder()
        .with_clock(Rc::new(clock.clone()))
        .build()
        .expect("Default configuration should be valid");
    (hooks, clock)
}

#[test]
fn test_deferred_events_replay_in_enqueue_order_on_next_frame() {
    // --- 1. ARRANGE ---
    let (mut hooks, _clock) = manual_hooks();
    let decoder = Rc::new(PacketDecoder {
        deferred: hooks.deferred().clone(),
    });
    hooks.bus().register(&decoder).unwrap();

    let delivered = Rc::new(RefCell::new(Vec::new()));
    {
        let delivered = delivered.clone();
        hooks.bus().listen::<Packet, _>(0, "packet-log", move |packet| {
            delivered.borrow_mut().push(*packet);
            Ok(())
        });
    }

    // --- 2. ACT ---
    hooks.on_logical_tick();
    hooks
        .post(&PacketBurst(vec![
            Packet::Despawn(7),
            Packet::Spawn(7),
            Packet::Despawn(7),
        ]))
        .unwrap();
    assert!(delivered.borrow().is_empty(), "Nothing is delivered before the frame");
    hooks.on_frame();

    // --- 3. ASSERT ---
    assert_eq!(
        *delivered.borrow(),
        vec![Packet::Despawn(7), Packet::Spawn(7), Packet::Despawn(7)]
    );
    assert_eq!(hooks.stats().deferred_pending, 0);
}

#[test]
fn test_replay_precedes_the_tick_event() {
    let (mut hooks, _clock) = manual_hooks();
    let order = Rc::new(RefCell::new(Vec::new()));
    {
        let order = order.clone();
        hooks.bus().listen::<Packet, _>(0, "packets", move |_| {
            order.borrow_mut().push("packet");
            Ok(())
        });
    }
    {
        let order = order.clone();
        hooks.bus().listen::<GameTick, _>(0, "ticks", move |_| {
            order.borrow_mut().push("tick");
            Ok(())
        });
    }
    {
        let order = order.clone();
        hooks.bus().listen::<BeforeRender, _>(0, "frames", move |_| {
            order.borrow_mut().push("frame");
            Ok(())
        });
    }

    hooks.on_logical_tick();
    hooks.post_deferred(Packet::Spawn(1)).unwrap();
    hooks.on_frame();

    assert_eq!(*order.borrow(), vec!["packet", "tick", "frame"]);
}

#[test]
fn test_maintenance_is_rate_limited_to_one_tick() {
    // --- 1. ARRANGE ---
    let clock = ManualClock::new();
    let sweeps = Rc::new(Cell::new(0));
    let mut hooks = {
        let sweeps = sweeps.clone();
        Hooks::builder()
            .with_clock(Rc::new(clock.clone()))
            .with_maintenance("cache-sweep", move || {
                sweeps.set(sweeps.get() + 1);
                Ok(())
            })
            .build()
            .unwrap()
    };

    // --- 2. ACT ---
    // 60 fps for three seconds: 180 frames, five 600 ms windows.
    for _ in 0..180 {
        hooks.on_frame();
        clock.advance(Duration::from_micros(16_667));
    }

    // --- 3. ASSERT ---
    let stats = hooks.stats();
    assert_eq!(stats.frames, 180);
    assert_eq!(sweeps.get(), 5);
    assert_eq!(stats.maintenance_passes, 5);
}

#[test]
fn test_frame_survives_every_failing_collaborator() {
    // --- 1. ARRANGE ---
    let clock = ManualClock::new();
    let later_sweep = Rc::new(Cell::new(false));
    let mut hooks = {
        let later_sweep = later_sweep.clone();
        Hooks::builder()
            .with_clock(Rc::new(clock.clone()))
            .with_renderer(PanickingRenderer)
            .with_maintenance("broken-sweep", || panic!("sweep exploded"))
            .with_maintenance("healthy-sweep", move || {
                later_sweep.set(true);
                Ok(())
            })
            .build()
            .unwrap()
    };
    hooks.bind_surface(SurfaceHandle(1));
    hooks
        .bus()
        .listen::<BeforeRender, _>(0, "broken-listener", |_| anyhow::bail!("bad frame"));
    hooks
        .scheduler()
        .schedule("broken-task", Duration::ZERO, Repeat::Once, || {
            panic!("task exploded")
        })
        .unwrap();

    // --- 2. ACT ---
    hooks.on_frame();

    // --- 3. ASSERT ---
    let stats = hooks.stats();
    assert!(later_sweep.get(), "Siblings of a failing collaborator still run");
    assert_eq!(stats.listener_failures, 1);
    assert_eq!(stats.render_failures, 1);
    assert_eq!(stats.task_failures, 1);
    assert_eq!(stats.maintenance_failures, 1);

    // The loop keeps going.
    clock.advance(Duration::from_millis(600));
    hooks.on_frame();
    assert_eq!(hooks.stats().frames, 2);
    assert_eq!(hooks.stats().maintenance_failures, 2);
    assert_eq!(hooks.stats().task_failures, 1, "A failed one-shot is retired");
}

#[test]
fn test_renderer_only_runs_with_a_bound_surface() {
    let renderer = RecordingRenderer::default();
    let (frames, layers) = (renderer.frames.clone(), renderer.layers.clone());
    let mut hooks = Hooks::builder()
        .with_clock(Rc::new(ManualClock::new()))
        .with_renderer(renderer)
        .build()
        .unwrap();

    hooks.on_frame();
    hooks.draw_layer(OverlayLayer::AboveScene);
    assert_eq!(frames.get(), 0);

    hooks.bind_surface(SurfaceHandle(42));
    hooks.on_frame();
    hooks.draw_layer(OverlayLayer::UnderWidgets);
    hooks.draw_layer(OverlayLayer::AlwaysOnTop);

    hooks.unbind_surface();
    hooks.on_frame();

    assert_eq!(frames.get(), 1);
    assert_eq!(
        *layers.borrow(),
        vec![OverlayLayer::UnderWidgets, OverlayLayer::AlwaysOnTop]
    );
}

#[test]
fn test_replay_order_follows_configuration() {
    let config = HooksConfig {
        replay_order: tickwork_core::ReplayOrder::TypePriority,
        replay_on_logical_tick: false,
        ..HooksConfig::default()
    };
    let mut hooks = Hooks::builder()
        .with_config(config)
        .with_clock(Rc::new(ManualClock::new()))
        .build()
        .unwrap();
    hooks.deferred().set_replay_priority::<Packet>(-1);

    let order = Rc::new(RefCell::new(Vec::new()));
    {
        let order = order.clone();
        hooks.bus().listen::<Packet, _>(0, "packets", move |_| {
            order.borrow_mut().push("packet");
            Ok(())
        });
    }
    {
        let order = order.clone();
        hooks.bus().listen::<u32, _>(0, "numbers", move |_| {
            order.borrow_mut().push("number");
            Ok(())
        });
    }

    hooks.post_deferred(7u32).unwrap();
    hooks.post_deferred(Packet::Spawn(7)).unwrap();
    hooks.on_logical_tick();
    assert!(order.borrow().is_empty(), "Replay is deferred to the frame");
    hooks.on_frame();

    assert_eq!(*order.borrow(), vec!["packet", "number"]);
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let config = HooksConfig {
        max_remote_per_frame: 0,
        ..HooksConfig::default()
    };
    assert!(Hooks::builder().with_config(config).build().is_err());
}
