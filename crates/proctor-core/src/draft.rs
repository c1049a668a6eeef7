//! Admin-side test definition before it is stored.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProctorError, Result};
use crate::types::TestRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDraft {
    pub title: String,
    pub role: String,
    pub topics: BTreeSet<String>,
    pub duration_minutes: u64,
    pub viva_enabled: bool,
}

impl TestDraft {
    /// Add a topic; blank and duplicate topics are ignored. Returns true when added.
    pub fn add_topic(&mut self, topic: &str) -> bool {
        let trimmed = topic.trim();
        !trimmed.is_empty() && self.topics.insert(trimmed.to_string())
    }

    pub fn remove_topic(&mut self, topic: &str) -> bool {
        self.topics.remove(topic.trim())
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ProctorError::InvalidInput("title is required".into()));
        }
        if self.role.trim().is_empty() {
            return Err(ProctorError::InvalidInput("role is required".into()));
        }
        if self.topics.is_empty() {
            return Err(ProctorError::InvalidInput(
                "at least one topic is required".into(),
            ));
        }
        if self.duration_minutes == 0 {
            return Err(ProctorError::InvalidInput(
                "duration must be at least one minute".into(),
            ));
        }
        Ok(())
    }

    /// Validate and turn into a storable record.
    pub fn into_record(self, id: String, created_at: DateTime<Utc>) -> Result<TestRecord> {
        self.validate()?;
        Ok(TestRecord {
            id,
            title: self.title.trim().to_string(),
            role: self.role.trim().to_string(),
            topics: self.topics,
            duration_minutes: self.duration_minutes,
            viva_enabled: self.viva_enabled,
            created_at,
        })
    }
}
