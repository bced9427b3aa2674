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

use std::cell::Cell;
use std::rc::Rc;

/// The logical game tick counter.
///
/// Shared by handle: every clone observes the same value. Only the dispatcher
/// advances it, exactly once per logical tick.
#[derive(Debug, Clone, Default)]
pub struct TickCounter {
    value: Rc<Cell<u64>>,
}

impl TickCounter {
    /// Creates a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current tick.
    pub fn get(&self) -> u64 {
        self.value.get()
    }

    /// Advances the counter by one and returns the new value.
    pub fn increment(&self) -> u64 {
        let next = self.value.get().wrapping_add(1);
        self.value.set(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_count() {
        let counter = TickCounter::new();
        let view = counter.clone();

        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(view.get(), 2);
    }
}
