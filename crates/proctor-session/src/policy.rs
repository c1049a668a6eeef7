//! Tunable timings and the integrity threshold for a session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use proctor_core::ThresholdPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    /// Session clock tick period (default 1000).
    pub tick_ms: u64,
    /// Presence check period (default 5000).
    pub presence_interval_ms: u64,
    /// Quiet period before a code draft is persisted (default 1000).
    pub draft_debounce_ms: u64,
    /// Upper bound on one viva recording (default 40000).
    pub recording_limit_ms: u64,
    /// Auto-submit once this many warnings are recorded. `None` never auto-submits.
    pub warning_threshold: Option<u32>,
    /// Speak viva prompts through the synthesizer instead of only showing them.
    pub read_questions_aloud: bool,
    /// Run the periodic face-presence check.
    pub presence_check: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            presence_interval_ms: 5_000,
            draft_debounce_ms: 1_000,
            recording_limit_ms: 40_000,
            warning_threshold: None,
            read_questions_aloud: true,
            presence_check: true,
        }
    }
}

impl SessionPolicy {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn presence_interval(&self) -> Duration {
        Duration::from_millis(self.presence_interval_ms.max(1))
    }

    pub fn draft_debounce(&self) -> Duration {
        Duration::from_millis(self.draft_debounce_ms)
    }

    pub fn recording_limit(&self) -> Duration {
        Duration::from_millis(self.recording_limit_ms)
    }

    pub fn threshold(&self) -> ThresholdPolicy {
        match self.warning_threshold {
            Some(count) => ThresholdPolicy::after(count),
            None => ThresholdPolicy::disabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let p = SessionPolicy::default();
        assert_eq!(p.tick(), Duration::from_secs(1));
        assert_eq!(p.presence_interval(), Duration::from_secs(5));
        assert_eq!(p.draft_debounce(), Duration::from_secs(1));
        assert_eq!(p.recording_limit(), Duration::from_secs(40));
        assert_eq!(p.threshold(), ThresholdPolicy::disabled());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let p: SessionPolicy = serde_json::from_str(r#"{"warning_threshold": 3}"#).unwrap();
        assert_eq!(p.threshold(), ThresholdPolicy::after(3));
        assert_eq!(p.tick_ms, 1_000);
        assert!(p.presence_check);
    }
}
