// 8.0.1: engine settings that sit outside the exchange economics.

use crate::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Audit log capacity. Oldest events are dropped past this.
    pub max_events: usize,
    /// Clock value stamped on events until the caller moves time.
    pub start_time: Timestamp,
}

impl EngineConfig {
    pub fn with_max_events(self, max_events: usize) -> Self {
        Self { max_events, ..self }
    }

    pub fn starting_at(self, start_time: Timestamp) -> Self {
        Self { start_time, ..self }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            start_time: Timestamp::from_millis(0),
        }
    }
}
