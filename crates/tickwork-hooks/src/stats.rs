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

//! Runtime counters exposed by the dispatcher.

/// A snapshot of dispatcher activity since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HooksStats {
    /// Frames processed.
    pub frames: u64,
    /// Logical ticks processed (the tick counter value).
    pub ticks: u64,
    /// Maintenance passes run.
    pub maintenance_passes: u64,
    /// Contained listener failures.
    pub listener_failures: u64,
    /// Contained scheduled-task failures.
    pub task_failures: u64,
    /// Contained maintenance collaborator failures.
    pub maintenance_failures: u64,
    /// Contained render hook failures.
    pub render_failures: u64,
    /// Contained background invocation failures.
    pub invoke_failures: u64,
    /// Events waiting in the deferred queue.
    pub deferred_pending: usize,
    /// Tasks waiting in the scheduler.
    pub tasks_pending: usize,
    /// Background commands consumed.
    pub remote_commands: u64,
}
