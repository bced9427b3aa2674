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

//! The main-loop dispatcher.

use crate::config::{ConfigError, HooksConfig};
use crate::context::DispatchContext;
use crate::events::{BeforeRender, GameTick};
use crate::maintenance::MaintenanceRegistry;
use crate::remote::{self, RemoteHandle, RemoteInbox};
use crate::render::{OverlayLayer, RenderHook, SurfaceHandle};
use crate::stats::HooksStats;
use std::rc::Rc;
use std::time::Instant;
use tickwork_core::{
    contained, Clock, DeferredEventBus, Event, EventBus, EventError, FailureKind, Scheduler,
    SystemClock, TickCounter,
};

/// Builds a [`Hooks`] dispatcher.
pub struct HooksBuilder {
    config: HooksConfig,
    clock: Option<Rc<dyn Clock>>,
    renderer: Option<Box<dyn RenderHook>>,
    maintenance: MaintenanceRegistry,
}

impl HooksBuilder {
    /// Creates a builder with the default configuration and the system clock.
    pub fn new() -> Self {
        Self {
            config: HooksConfig::default(),
            clock: None,
            renderer: None,
            maintenance: MaintenanceRegistry::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: HooksConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `clock` for the maintenance rate limit and the scheduler.
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the render collaborator.
    pub fn with_renderer(mut self, renderer: impl RenderHook + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Appends a maintenance collaborator. Collaborators run in the order they
    /// were added, after the scheduler, on each maintenance pass.
    ///
    /// ## Arguments
    /// * `label` - Name used in failure logs.
    /// * `task` - Called at most once per maintenance pass.
    pub fn with_maintenance<F>(mut self, label: impl Into<String>, task: F) -> Self
    where
        F: FnMut() -> anyhow::Result<()> + 'static,
    {
        self.maintenance.register(label.into(), Box::new(task));
        self
    }

    /// Builds the dispatcher.
    ///
    /// ## Returns
    /// A [`Hooks`] with a fresh bus, deferred queue, scheduler and hand-off
    /// channel, none of them shared with any other dispatcher.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the configuration is unusable.
    pub fn build(self) -> Result<Hooks, ConfigError> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Rc::new(SystemClock));
        let bus = EventBus::new();
        let ticks = TickCounter::new();
        let deferred = DeferredEventBus::new(bus.clone(), ticks.clone());
        deferred.set_replay_order(self.config.replay_order);
        let scheduler = Scheduler::new(Rc::clone(&clock));
        let (remote, inbox) = remote::channel(self.config.remote_queue_capacity);

        log::info!(
            "Hooks: built (tick={:?}, replay={:?}, maintenance={}, renderer={})",
            self.config.tick_duration(),
            self.config.replay_order,
            self.maintenance.len(),
            self.renderer.is_some()
        );

        Ok(Hooks {
            config: self.config,
            clock,
            ctx: DispatchContext::new(bus, deferred, scheduler, ticks),
            renderer: self.renderer,
            surface: None,
            maintenance: self.maintenance,
            remote,
            inbox: Some(inbox),
            should_tick: false,
            suppress_next_tick: false,
            last_maintenance: None,
            frames: 0,
            maintenance_passes: 0,
            maintenance_failures: 0,
            render_failures: 0,
            invoke_failures: 0,
            remote_commands: 0,
        })
    }
}

impl Default for HooksBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the event bus, the deferred queue and the scheduler from the host's
/// per-frame and per-tick callbacks.
///
/// The host calls [`on_frame`](Self::on_frame) once per presented frame and
/// [`on_logical_tick`](Self::on_logical_tick) once per server tick, both from
/// the same thread. Neither ever returns an error or unwinds: every listener,
/// task and collaborator failure is contained and counted.
pub struct Hooks {
    config: HooksConfig,
    clock: Rc<dyn Clock>,
    ctx: DispatchContext,
    renderer: Option<Box<dyn RenderHook>>,
    surface: Option<SurfaceHandle>,
    maintenance: MaintenanceRegistry,
    remote: RemoteHandle,
    /// `None` once shut down; dropping it disconnects every [`RemoteHandle`].
    inbox: Option<RemoteInbox>,
    should_tick: bool,
    suppress_next_tick: bool,
    last_maintenance: Option<Instant>,
    frames: u64,
    maintenance_passes: u64,
    maintenance_failures: u64,
    render_failures: u64,
    invoke_failures: u64,
    remote_commands: u64,
}

impl Hooks {
    /// Starts building a dispatcher.
    pub fn builder() -> HooksBuilder {
        HooksBuilder::new()
    }

    /// Processes one frame.
    ///
    /// 1. On a pending tick boundary: replay deferred events, publish
    ///    [`GameTick`], advance the tick counter.
    /// 2. Publish [`BeforeRender`].
    /// 3. Run the render hook on the bound surface, then drain background
    ///    commands.
    /// 4. At most once per tick duration: run the scheduler, then every
    ///    maintenance collaborator.
    pub fn on_frame(&mut self) {
        if self.inbox.is_none() {
            return;
        }
        self.frames += 1;

        if std::mem::take(&mut self.should_tick) {
            self.process_tick();
        }

        self.publish_builtin(&BeforeRender { frame: self.frames });

        self.render_frame();
        self.drain_remote();

        let now = self.clock.now();
        if let Some(last) = self.last_maintenance {
            if now.saturating_duration_since(last) < self.config.tick_duration() {
                return;
            }
        }
        self.last_maintenance = Some(now);
        self.run_maintenance(now);
    }

    /// Host callback for a logical tick boundary.
    ///
    /// Replays the deferred queue when configured to, then flags the tick for
    /// the next frame unless [`suppress_next_tick`](Self::suppress_next_tick)
    /// was requested, in which case the request is consumed instead.
    pub fn on_logical_tick(&mut self) {
        if self.inbox.is_none() {
            return;
        }
        if self.config.replay_on_logical_tick {
            self.ctx.deferred().replay();
        }

        if std::mem::take(&mut self.suppress_next_tick) {
            log::debug!("Hooks: logical tick suppressed");
        } else {
            self.should_tick = true;
        }
    }

    /// Skips the next logical tick.
    ///
    /// Used after a login or world hop, when the host delivers a burst of
    /// out-of-band state that must not count as a tick.
    pub fn suppress_next_tick(&mut self) {
        self.suppress_next_tick = true;
    }

    /// Publishes `event` synchronously on the dispatch thread.
    pub fn post<E: Event>(&self, event: &E) -> Result<usize, EventError> {
        self.ctx.bus().publish(event)
    }

    /// Queues `event` for the next tick replay.
    pub fn post_deferred<E: Event>(&self, event: E) -> Result<(), EventError> {
        self.ctx.deferred().post_deferred(event)
    }

    /// Binds the surface handed to the render hook.
    pub fn bind_surface(&mut self, surface: SurfaceHandle) {
        log::debug!("Hooks: surface {surface:?} bound");
        self.surface = Some(surface);
    }

    /// Unbinds the surface; the render hook is skipped until a new one is bound.
    pub fn unbind_surface(&mut self) {
        if self.surface.take().is_some() {
            log::debug!("Hooks: surface unbound");
        }
    }

    /// Host callback for an overlay layer.
    pub fn draw_layer(&mut self, layer: OverlayLayer) {
        let (Some(renderer), Some(surface)) = (self.renderer.as_mut(), self.surface) else {
            return;
        };
        let label = format!("render_layer({layer})");
        if contained(FailureKind::Render, &label, None, || {
            renderer.render_layer(surface, layer)
        })
        .is_some()
        {
            self.render_failures += 1;
        }
    }

    /// A handle background threads use to reach the dispatch thread.
    pub fn remote(&self) -> RemoteHandle {
        self.remote.clone()
    }

    /// The shared dispatch state.
    pub fn context(&self) -> DispatchContext {
        self.ctx.clone()
    }

    /// The synchronous event bus.
    pub fn bus(&self) -> &EventBus {
        self.ctx.bus()
    }

    /// The deferred queue.
    pub fn deferred(&self) -> &DeferredEventBus {
        self.ctx.deferred()
    }

    /// The maintenance scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        self.ctx.scheduler()
    }

    /// The active configuration.
    pub fn config(&self) -> &HooksConfig {
        &self.config
    }

    /// A snapshot of the runtime counters.
    pub fn stats(&self) -> HooksStats {
        HooksStats {
            frames: self.frames,
            ticks: self.ctx.tick(),
            maintenance_passes: self.maintenance_passes,
            listener_failures: self.ctx.bus().failure_count(),
            task_failures: self.ctx.scheduler().failure_count(),
            maintenance_failures: self.maintenance_failures,
            render_failures: self.render_failures,
            invoke_failures: self.invoke_failures,
            deferred_pending: self.ctx.deferred().pending(),
            tasks_pending: self.ctx.scheduler().len(),
            remote_commands: self.remote_commands,
        }
    }

    /// Returns `true` after [`shutdown`](Self::shutdown).
    pub fn is_shut_down(&self) -> bool {
        self.inbox.is_none()
    }

    /// Tears the dispatcher down. Also happens on drop.
    ///
    /// Scheduled tasks are cancelled, undelivered deferred events are dropped
    /// and every [`RemoteHandle`] starts failing with
    /// [`HandoffError::Disconnected`](tickwork_core::HandoffError::Disconnected).
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        let Some(inbox) = self.inbox.take() else {
            return;
        };
        let abandoned = inbox.retries();
        drop(inbox);

        self.ctx.scheduler().shutdown();
        let dropped = self.ctx.deferred().clear();
        if dropped > 0 || abandoned > 0 {
            log::warn!(
                "Hooks: shutdown dropped {dropped} deferred events and {abandoned} pending invocations"
            );
        }
        log::info!("Hooks: shut down after {} frames", self.frames);
    }

    fn process_tick(&mut self) {
        self.ctx.deferred().replay();
        self.publish_builtin(&GameTick {
            tick: self.ctx.tick(),
        });
        let tick = self.ctx.ticks().increment();
        self.ctx.scheduler().observe_tick(tick);
        log::trace!("Hooks: tick {tick}");
    }

    fn publish_builtin<E: Event>(&self, event: &E) {
        if let Err(err) = self.ctx.bus().publish(event) {
            log::error!("Hooks: built-in event rejected: {err}");
        }
    }

    fn render_frame(&mut self) {
        let (Some(renderer), Some(surface)) = (self.renderer.as_mut(), self.surface) else {
            return;
        };
        if contained(FailureKind::Render, "render_frame", None, || {
            renderer.render_frame(surface)
        })
        .is_some()
        {
            self.render_failures += 1;
        }
    }

    fn drain_remote(&mut self) {
        let Some(inbox) = self.inbox.as_mut() else {
            return;
        };
        let report = inbox.drain(&self.ctx, self.config.max_remote_per_frame);
        self.remote_commands += report.commands as u64;
        self.invoke_failures += report.failures;
    }

    fn run_maintenance(&mut self, now: Instant) {
        self.maintenance_passes += 1;
        let ran = self.ctx.scheduler().tick(now);
        self.maintenance_failures += self.maintenance.run_all();
        log::trace!("Hooks: maintenance pass {} ran {ran} tasks", self.maintenance_passes);
    }
}

impl Drop for Hooks {
    fn drop(&mut self) {
        self.teardown();
    }
}
