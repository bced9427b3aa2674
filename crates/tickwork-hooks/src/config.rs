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

//! Dispatcher configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tickwork_core::ReplayOrder;

/// Length of one server tick, the default maintenance period.
pub const GAME_TICK: Duration = Duration::from_millis(600);

/// Configuration for [`Hooks`](crate::Hooks).
///
/// Every field has a default, so a host config only needs to name what it
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// Minimum time between two maintenance passes, in milliseconds.
    pub tick_duration_ms: u64,
    /// Order in which the deferred queue is replayed.
    pub replay_order: ReplayOrder,
    /// Replay the deferred queue from the logical tick callback, before the
    /// tick flag is raised.
    pub replay_on_logical_tick: bool,
    /// Capacity of the background hand-off queue.
    /// Sends beyond it fail with [`HandoffError::Full`](tickwork_core::HandoffError::Full).
    pub remote_queue_capacity: usize,
    /// Maximum background work handled per frame: new hand-off commands plus
    /// retries of unfinished invocations.
    pub max_remote_per_frame: usize,
}

impl HooksConfig {
    /// The maintenance period as a [`Duration`].
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_duration_ms)
    }

    /// Checks the values that would make the dispatcher unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_duration_ms == 0 {
            return Err(ConfigError::ZeroTickDuration);
        }
        if self.remote_queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.max_remote_per_frame == 0 {
            return Err(ConfigError::ZeroFrameBudget);
        }
        Ok(())
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            tick_duration_ms: GAME_TICK.as_millis() as u64,
            replay_order: ReplayOrder::Fifo,
            replay_on_logical_tick: true,
            remote_queue_capacity: 1024,
            max_remote_per_frame: 256,
        }
    }
}

/// A [`HooksConfig`] value the dispatcher cannot run with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Maintenance would run on every frame with no rate limit.
    #[error("tick_duration_ms must be greater than zero")]
    ZeroTickDuration,
    /// A zero-capacity queue rejects every background send.
    #[error("remote_queue_capacity must be greater than zero")]
    ZeroQueueCapacity,
    /// Background commands would never be consumed.
    #[error("max_remote_per_frame must be greater than zero")]
    ZeroFrameBudget,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_one_game_tick() {
        let config = HooksConfig::default();
        assert_eq!(config.tick_duration(), Duration::from_millis(600));
        assert_eq!(config.replay_order, ReplayOrder::Fifo);
        assert!(config.replay_on_logical_tick);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: HooksConfig =
            serde_json::from_str(r#"{ "tick_duration_ms": 20, "replay_order": "type_priority" }"#)
                .unwrap();

        assert_eq!(config.tick_duration(), Duration::from_millis(20));
        assert_eq!(config.replay_order, ReplayOrder::TypePriority);
        assert_eq!(config.remote_queue_capacity, 1024);
    }

    #[test]
    fn test_zero_values_are_rejected() {
        let mut config = HooksConfig::default();
        config.remote_queue_capacity = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroQueueCapacity));

        config = HooksConfig {
            tick_duration_ms: 0,
            ..HooksConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroTickDuration));
    }
}
