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

//! Events the dispatcher publishes on its own.

/// Published once per logical tick, after the deferred queue has been replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameTick {
    /// Tick counter value before this tick was counted (the first tick is 0).
    pub tick: u64,
}

/// Published on every frame, before the render hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeforeRender {
    /// Number of the frame being processed, starting at 1.
    pub frame: u64,
}
