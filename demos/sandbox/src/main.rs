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

// Tickwork Sandbox
// Plays the host: frames at ~60 fps, a logical tick every 600 ms, and a
// background price feed running on a tokio runtime.

use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use tickwork_core::{HandoffError, Repeat, Subscriber, Subscriptions};
use tickwork_hooks::{
    GameTick, Hooks, HooksConfig, OverlayLayer, RemoteHandle, RenderHook, SurfaceHandle, GAME_TICK,
};

const FRAME: Duration = Duration::from_micros(16_667);
const RUN_FOR: Duration = Duration::from_secs(6);

#[derive(Debug, Clone)]
struct PriceUpdate {
    item: u32,
    price: u64,
}

struct PriceBoard {
    updates: Cell<u32>,
}

impl Subscriber for PriceBoard {
    fn subscribe(&self, subs: &mut Subscriptions<Self>) {
        subs.on::<PriceUpdate, _>(0, |this, update| {
            this.updates.set(this.updates.get() + 1);
            log::info!("PriceBoard: item {} now {} gp", update.item, update.price);
            Ok(())
        })
        .on::<GameTick, _>(10, |this, tick| {
            log::debug!("PriceBoard: tick {} ({} updates so far)", tick.tick, this.updates.get());
            Ok(())
        });
    }
}

struct LoggingOverlay;

impl RenderHook for LoggingOverlay {
    fn render_frame(&mut self, surface: SurfaceHandle) -> Result<()> {
        log::trace!("LoggingOverlay: frame on {surface:?}");
        Ok(())
    }

    fn render_layer(&mut self, _surface: SurfaceHandle, layer: OverlayLayer) -> Result<()> {
        log::trace!("LoggingOverlay: layer {layer}");
        Ok(())
    }
}

/// Pretends to poll a remote price service until the dispatcher goes away.
async fn fetch_prices(remote: RemoteHandle) {
    let mut interval = tokio::time::interval(Duration::from_millis(900));
    let mut item = 0u32;
    loop {
        interval.tick().await;
        item += 1;
        let update = PriceUpdate {
            item,
            price: 1_000 + u64::from(item) * 37,
        };
        match remote.post_deferred(update) {
            Ok(()) => {}
            Err(HandoffError::Disconnected) => {
                log::info!("PriceFeed: dispatcher gone, stopping");
                return;
            }
            Err(err) => log::warn!("PriceFeed: update dropped: {err}"),
        }
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_time()
        .build()?;

    let mut hooks = Hooks::builder()
        .with_config(HooksConfig::default())
        .with_renderer(LoggingOverlay)
        .with_maintenance("chat-flush", || {
            log::debug!("Maintenance: chat queue flushed");
            Ok(())
        })
        .build()?;
    hooks.bind_surface(SurfaceHandle(1));

    let board = Rc::new(PriceBoard {
        updates: Cell::new(0),
    });
    hooks.bus().register(&board)?;

    hooks
        .scheduler()
        .schedule("stats-report", GAME_TICK * 5, Repeat::Every(GAME_TICK * 5), {
            let deferred = hooks.deferred().clone();
            move || {
                log::info!("Scheduler: {} events waiting for the next tick", deferred.pending());
                Ok(())
            }
        })?;

    runtime.spawn(fetch_prices(hooks.remote()));

    let start = Instant::now();
    let mut next_tick = start + GAME_TICK;
    while start.elapsed() < RUN_FOR {
        let frame_start = Instant::now();
        if frame_start >= next_tick {
            hooks.on_logical_tick();
            next_tick += GAME_TICK;
        }

        hooks.on_frame();
        hooks.draw_layer(OverlayLayer::AboveScene);
        hooks.draw_layer(OverlayLayer::AlwaysOnTop);

        if let Some(rest) = FRAME.checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
    }

    log::info!("Sandbox: {:?}", hooks.stats());
    log::info!("Sandbox: board saw {} price updates", board.updates.get());
    hooks.shutdown();
    runtime.shutdown_timeout(Duration::from_secs(1));
    Ok(())
}
