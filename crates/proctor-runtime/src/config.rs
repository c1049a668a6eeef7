//! Session policy loading: TOML file, then CLI overrides.

use std::path::Path;

use anyhow::Context;
use proctor_session::SessionPolicy;

use crate::cli::PolicyOverrides;

pub fn load_policy(path: Option<&Path>) -> anyhow::Result<SessionPolicy> {
    let Some(path) = path else {
        return Ok(SessionPolicy::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read policy file {}", path.display()))?;
    parse_policy(&content).with_context(|| format!("invalid policy file {}", path.display()))
}

pub fn parse_policy(content: &str) -> anyhow::Result<SessionPolicy> {
    Ok(toml::from_str(content)?)
}

pub fn to_toml(policy: &SessionPolicy) -> anyhow::Result<String> {
    Ok(toml::to_string_pretty(policy)?)
}

impl PolicyOverrides {
    pub fn apply(&self, policy: &mut SessionPolicy) {
        if let Some(threshold) = self.warning_threshold {
            policy.warning_threshold = Some(threshold);
        }
        if let Some(ms) = self.tick_ms {
            policy.tick_ms = ms;
        }
        if let Some(ms) = self.presence_interval_ms {
            policy.presence_interval_ms = ms;
        }
        if let Some(ms) = self.draft_debounce_ms {
            policy.draft_debounce_ms = ms;
        }
        if let Some(ms) = self.recording_limit_ms {
            policy.recording_limit_ms = ms;
        }
        if self.no_presence_check {
            policy.presence_check = false;
        }
        if self.text_only {
            policy.read_questions_aloud = false;
        }
    }
}

/// Policy file plus overrides.
pub fn effective_policy(
    path: Option<&Path>,
    overrides: &PolicyOverrides,
) -> anyhow::Result<SessionPolicy> {
    let mut policy = load_policy(path)?;
    overrides.apply(&mut policy);
    Ok(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let policy = parse_policy("warning_threshold = 5\npresence_check = false\n").expect("parse");
        assert_eq!(policy.warning_threshold, Some(5));
        assert!(!policy.presence_check);
        assert_eq!(policy.recording_limit_ms, 40_000);
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(parse_policy("tick_ms = \"fast\"").is_err());
    }

    #[test]
    fn overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tmp");
        writeln!(file, "tick_ms = 500\nwarning_threshold = 2").expect("write");
        let overrides = PolicyOverrides {
            warning_threshold: Some(4),
            text_only: true,
            ..PolicyOverrides::default()
        };
        let policy = effective_policy(Some(file.path()), &overrides).expect("policy");
        assert_eq!(policy.tick_ms, 500);
        assert_eq!(policy.warning_threshold, Some(4));
        assert!(!policy.read_questions_aloud);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_policy(Some(Path::new("/nonexistent/policy.toml"))).unwrap_err();
        assert!(err.to_string().contains("cannot read policy file"));
    }

    #[test]
    fn default_round_trips_through_toml() {
        let text = to_toml(&SessionPolicy::default()).expect("toml");
        assert!(text.contains("tick_ms = 1000"));
        assert_eq!(parse_policy(&text).expect("parse"), SessionPolicy::default());
    }
}
