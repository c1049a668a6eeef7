//! Swappable proctoring capabilities: how presence is checked and how viva
//! prompts are delivered.

use std::sync::Arc;

use async_trait::async_trait;

use proctor_core::error::{ProctorError, Result};
use proctor_core::integrity::presence_violation;
use proctor_core::WarningKind;

use crate::policy::SessionPolicy;
use crate::ports::{MediaStream, PresenceDetector, SpeechSynthesizer};

// ─── Presence ─────────────────────────────────────────────────────

#[async_trait]
pub trait PresenceStrategy: Send + Sync {
    /// Run one presence check against the held stream.
    ///
    /// `Ok(None)` is compliant, `Ok(Some(kind))` is a violation, and `Err`
    /// means the cycle could not be evaluated and must be skipped.
    async fn check(&self, stream: &dyn MediaStream) -> Result<Option<WarningKind>>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Exactly one visible face is compliant.
pub struct FaceCountPresence {
    detector: Arc<dyn PresenceDetector>,
}

impl FaceCountPresence {
    pub fn new(detector: Arc<dyn PresenceDetector>) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl PresenceStrategy for FaceCountPresence {
    async fn check(&self, stream: &dyn MediaStream) -> Result<Option<WarningKind>> {
        if !stream.has_video() {
            return Err(ProctorError::DetectorUnavailable(
                "stream has no video track".into(),
            ));
        }
        let faces = self.detector.count_faces(stream).await?;
        Ok(presence_violation(faces))
    }
}

pub struct NoPresenceCheck;

#[async_trait]
impl PresenceStrategy for NoPresenceCheck {
    async fn check(&self, _stream: &dyn MediaStream) -> Result<Option<WarningKind>> {
        Ok(None)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

// ─── Voice ────────────────────────────────────────────────────────

#[async_trait]
pub trait VoiceStrategy: Send + Sync {
    async fn present(&self, question: &str);
}

pub struct ReadAloud {
    synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl ReadAloud {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { synthesizer }
    }
}

#[async_trait]
impl VoiceStrategy for ReadAloud {
    async fn present(&self, question: &str) {
        self.synthesizer.speak(question).await;
    }
}

/// Prompts are only shown on screen.
pub struct TextOnly;

#[async_trait]
impl VoiceStrategy for TextOnly {
    async fn present(&self, _question: &str) {}
}

// ─── Strategy Set ─────────────────────────────────────────────────

#[derive(Clone)]
pub struct ProctoringStrategy {
    pub presence: Arc<dyn PresenceStrategy>,
    pub voice: Arc<dyn VoiceStrategy>,
}

impl ProctoringStrategy {
    pub fn new(presence: Arc<dyn PresenceStrategy>, voice: Arc<dyn VoiceStrategy>) -> Self {
        Self { presence, voice }
    }

    pub fn from_policy(
        policy: &SessionPolicy,
        detector: Arc<dyn PresenceDetector>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        let presence: Arc<dyn PresenceStrategy> = if policy.presence_check {
            Arc::new(FaceCountPresence::new(detector))
        } else {
            Arc::new(NoPresenceCheck)
        };
        let voice: Arc<dyn VoiceStrategy> = if policy.read_questions_aloud {
            Arc::new(ReadAloud::new(synthesizer))
        } else {
            Arc::new(TextOnly)
        };
        Self { presence, voice }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ScriptedDetector, SilentSynthesizer, SimStream};

    #[tokio::test]
    async fn face_count_flags_zero_and_many() {
        let detector = Arc::new(ScriptedDetector::new([Ok(0), Ok(1), Ok(2)]));
        let presence = FaceCountPresence::new(detector);
        let stream = SimStream::new("s1", true, true);
        assert_eq!(
            presence.check(&stream).await.expect("check"),
            Some(WarningKind::PresenceViolation)
        );
        assert_eq!(presence.check(&stream).await.expect("check"), None);
        assert_eq!(
            presence.check(&stream).await.expect("check"),
            Some(WarningKind::PresenceViolation)
        );
    }

    #[tokio::test]
    async fn missing_video_is_unavailable_not_a_violation() {
        let presence = FaceCountPresence::new(Arc::new(ScriptedDetector::new([Ok(0)])));
        let audio_only = SimStream::new("s1", false, true);
        let err = presence.check(&audio_only).await.unwrap_err();
        assert!(matches!(err, ProctorError::DetectorUnavailable(_)));
    }

    #[tokio::test]
    async fn policy_selects_strategies() {
        let synth = Arc::new(SilentSynthesizer::default());
        let policy = SessionPolicy {
            presence_check: false,
            read_questions_aloud: true,
            ..SessionPolicy::default()
        };
        let strategy = ProctoringStrategy::from_policy(
            &policy,
            Arc::new(ScriptedDetector::new([])),
            synth.clone(),
        );
        assert!(!strategy.presence.is_enabled());
        strategy.voice.present("Explain ownership.").await;
        assert_eq!(synth.spoken(), vec!["Explain ownership.".to_string()]);
    }
}
