//! Warning ledger, threshold policy, and the blocked-shortcut list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Warning, WarningKind};

// ─── Shortcuts ────────────────────────────────────────────────────

/// A key press with its modifier state, as reported by the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyChord {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    /// Command key on macOS.
    #[serde(default)]
    pub meta: bool,
}

impl KeyChord {
    pub fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
        }
    }

    pub fn ctrl(key: impl Into<String>) -> Self {
        Self {
            ctrl: true,
            ..Self::plain(key)
        }
    }

    pub fn ctrl_shift(key: impl Into<String>) -> Self {
        Self {
            ctrl: true,
            shift: true,
            ..Self::plain(key)
        }
    }
}

/// Devtools, view-source and save shortcuts. The page suppresses the
/// browser default for these and the monitor records a warning.
pub fn is_blocked_shortcut(chord: &KeyChord) -> bool {
    let key = chord.key.to_ascii_uppercase();
    if key == "F12" {
        return true;
    }
    let command = chord.ctrl || chord.meta;
    if !command {
        return false;
    }
    if chord.shift && matches!(key.as_str(), "I" | "J" | "C") {
        return true;
    }
    !chord.shift && matches!(key.as_str(), "U" | "S")
}

// ─── Threshold Policy ─────────────────────────────────────────────

/// When (if ever) accumulated warnings force an automatic submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    /// `None` disables auto-submit; warnings are still recorded and counted.
    pub auto_submit_after: Option<u32>,
}

impl ThresholdPolicy {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn after(count: u32) -> Self {
        Self {
            auto_submit_after: Some(count.max(1)),
        }
    }

    pub fn is_reached(&self, count: u32) -> bool {
        self.auto_submit_after.is_some_and(|limit| count >= limit)
    }
}

// ─── Ledger ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarningOutcome {
    /// Total warnings recorded, including this one.
    pub count: u32,
    /// The threshold was crossed by this warning or an earlier one.
    pub threshold_reached: bool,
}

/// Append-only record of integrity events for one attempt.
#[derive(Debug, Clone, Default)]
pub struct WarningLedger {
    warnings: Vec<Warning>,
    policy: ThresholdPolicy,
}

impl WarningLedger {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self {
            warnings: Vec::new(),
            policy,
        }
    }

    pub fn record(&mut self, kind: WarningKind, at: DateTime<Utc>) -> WarningOutcome {
        self.warnings.push(Warning {
            kind,
            timestamp: at,
        });
        let count = self.count();
        WarningOutcome {
            count,
            threshold_reached: self.policy.is_reached(count),
        }
    }

    pub fn count(&self) -> u32 {
        u32::try_from(self.warnings.len()).unwrap_or(u32::MAX)
    }

    pub fn count_of(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn policy(&self) -> ThresholdPolicy {
        self.policy
    }
}

/// Presence verdict for one sampled frame: exactly one face is compliant.
pub fn presence_violation(face_count: usize) -> Option<WarningKind> {
    (face_count != 1).then_some(WarningKind::PresenceViolation)
}
