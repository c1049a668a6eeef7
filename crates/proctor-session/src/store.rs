//! In-memory layout of the four document collections, shared by every
//! `DocumentStore` that keeps the whole data set locally.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use proctor_core::{AssignmentRecord, SubmissionRecord, TestRecord, UserRecord, UserRole};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collections {
    #[serde(default)]
    pub users: BTreeMap<String, UserRecord>,
    #[serde(default)]
    pub tests: BTreeMap<String, TestRecord>,
    #[serde(default, rename = "testAssignments")]
    pub test_assignments: BTreeMap<String, AssignmentRecord>,
    #[serde(default)]
    pub submissions: BTreeMap<String, SubmissionRecord>,
}

impl Collections {
    pub fn users_with_role(&self, role: Option<UserRole>) -> Vec<UserRecord> {
        self.users
            .values()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .cloned()
            .collect()
    }

    /// Newest first.
    pub fn tests_by_recency(&self) -> Vec<TestRecord> {
        let mut tests: Vec<_> = self.tests.values().cloned().collect();
        tests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        tests
    }

    /// Oldest assignment first, optionally only one candidate's.
    pub fn assignments_for(&self, user_id: Option<&str>) -> Vec<AssignmentRecord> {
        let mut assignments: Vec<_> = self
            .test_assignments
            .values()
            .filter(|a| user_id.is_none_or(|uid| a.user_id == uid))
            .cloned()
            .collect();
        assignments.sort_by(|a, b| a.assigned_at.cmp(&b.assigned_at).then_with(|| a.id.cmp(&b.id)));
        assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use proctor_core::AssignmentStatus;

    fn assignment(id: &str, user: &str, minutes_ago: i64) -> AssignmentRecord {
        AssignmentRecord {
            id: id.into(),
            test_id: "t1".into(),
            user_id: user.into(),
            status: AssignmentStatus::Assigned,
            assigned_at: Utc::now() - Duration::minutes(minutes_ago),
            started_at: None,
            completed_at: None,
            code: String::new(),
            question: None,
        }
    }

    #[test]
    fn assignments_filter_and_order() {
        let mut c = Collections::default();
        for a in [assignment("a2", "u1", 5), assignment("a1", "u1", 10), assignment("a3", "u2", 1)] {
            c.test_assignments.insert(a.id.clone(), a);
        }
        let ids: Vec<_> = c.assignments_for(Some("u1")).into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
        assert_eq!(c.assignments_for(None).len(), 3);
    }

    #[test]
    fn collection_names_match_documents() {
        let json = serde_json::to_value(Collections::default()).unwrap();
        assert!(json.get("testAssignments").is_some());
        let parsed: Collections = serde_json::from_str("{}").unwrap();
        assert!(parsed.users.is_empty());
    }
}
