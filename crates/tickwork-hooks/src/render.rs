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

//! Render collaborator contract.
//!
//! The dispatcher does not draw anything itself. It hands the bound surface to
//! a [`RenderHook`] at the right point of each frame and at each overlay layer
//! callback the host raises.

use std::fmt;

/// Opaque handle to the host's drawing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// Overlay layers the host exposes callbacks for, bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayLayer {
    /// Drawn over the 3D scene, below every widget.
    AboveScene,
    /// Drawn under the interface widgets.
    UnderWidgets,
    /// Drawn over everything else.
    AlwaysOnTop,
}

impl fmt::Display for OverlayLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OverlayLayer::AboveScene => "AboveScene",
            OverlayLayer::UnderWidgets => "UnderWidgets",
            OverlayLayer::AlwaysOnTop => "AlwaysOnTop",
        };
        f.write_str(name)
    }
}

/// Draws onto the host surface on behalf of the dispatcher.
///
/// Errors and panics are contained by the dispatcher and counted as render
/// failures; the frame carries on.
pub trait RenderHook {
    /// Draws the per-frame overlay.
    fn render_frame(&mut self, surface: SurfaceHandle) -> anyhow::Result<()>;

    /// Draws one overlay layer. Does nothing unless overridden.
    fn render_layer(&mut self, surface: SurfaceHandle, layer: OverlayLayer) -> anyhow::Result<()> {
        let _ = (surface, layer);
        Ok(())
    }
}
