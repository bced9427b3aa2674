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

//! # Tickwork Hooks
//!
//! The main-loop dispatcher. [`Hooks`] turns a host's per-frame and per-tick
//! callbacks into ordered phases over the `tickwork-core` primitives:
//! tick replay, frame events, rendering, background hand-off and rate-limited
//! maintenance.

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod events;
mod hooks;
mod maintenance;
pub mod remote;
pub mod render;
pub mod stats;

pub use config::{ConfigError, HooksConfig, GAME_TICK};
pub use context::DispatchContext;
pub use events::{BeforeRender, GameTick};
pub use hooks::{Hooks, HooksBuilder};
pub use remote::RemoteHandle;
pub use render::{OverlayLayer, RenderHook, SurfaceHandle};
pub use stats::HooksStats;
pub use tickwork_core;
