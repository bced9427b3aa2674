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

//! Ordered registry of maintenance collaborators.

use tickwork_core::{contained, FailureKind};

type MaintenanceFn = Box<dyn FnMut() -> anyhow::Result<()>>;

struct MaintenanceEntry {
    label: String,
    task: MaintenanceFn,
}

/// Maintenance callables, run in registration order on each maintenance pass.
#[derive(Default)]
pub(crate) struct MaintenanceRegistry {
    entries: Vec<MaintenanceEntry>,
}

impl MaintenanceRegistry {
    pub fn register(&mut self, label: String, task: MaintenanceFn) {
        log::info!("MaintenanceRegistry: Registered '{label}'");
        self.entries.push(MaintenanceEntry { label, task });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Runs every collaborator and returns how many failed.
    pub fn run_all(&mut self) -> u64 {
        let mut failures = 0;
        for entry in &mut self.entries {
            let task = &mut entry.task;
            if contained(FailureKind::Maintenance, &entry.label, None, || task()).is_some() {
                failures += 1;
            }
        }
        failures
    }
}
