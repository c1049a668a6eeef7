//! Bounded speech capture for viva answers. One recording at a time; a new
//! recording cancels the one in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use proctor_core::error::{ProctorError, Result};

use crate::lock;
use crate::ports::SpeechRecognizer;

pub struct VivaRecorder {
    recognizer: Arc<dyn SpeechRecognizer>,
    limit: Duration,
    current: Mutex<Option<(u64, CancellationToken)>>,
    next_id: AtomicU64,
}

impl VivaRecorder {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, limit: Duration) -> Self {
        Self {
            recognizer,
            limit,
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Capture one utterance, bounded by the recording limit.
    ///
    /// Returns `RecognitionError` on recognizer failure, on timeout, on an
    /// empty transcript, and when replaced by a newer recording.
    pub async fn record(&self) -> Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if let Some((_, previous)) = lock(&self.current).replace((id, token.clone())) {
            previous.cancel();
        }

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => Err(ProctorError::RecognitionError(
                "recording replaced".into(),
            )),
            captured = tokio::time::timeout(self.limit, self.recognizer.capture()) => {
                match captured {
                    Ok(result) => result,
                    Err(_) => Err(ProctorError::RecognitionError(format!(
                        "no speech within {}s",
                        self.limit.as_secs()
                    ))),
                }
            }
        };

        {
            let mut current = lock(&self.current);
            if current.as_ref().is_some_and(|(cur, _)| *cur == id) {
                *current = None;
            }
        }

        let text = outcome?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ProctorError::RecognitionError("empty transcript".into()));
        }
        Ok(text.to_string())
    }

    /// Stop any recording in flight.
    pub fn cancel(&self) {
        if let Some((_, token)) = lock(&self.current).take() {
            token.cancel();
        }
    }

    pub fn is_recording(&self) -> bool {
        lock(&self.current).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedRecognizer;

    #[tokio::test(start_paused = true)]
    async fn returns_trimmed_transcript() {
        let recognizer = Arc::new(ScriptedRecognizer::new([Ok("  borrow checker  ".to_string())]));
        let recorder = VivaRecorder::new(recognizer, Duration::from_secs(40));
        assert_eq!(recorder.record().await.expect("record"), "borrow checker");
        assert!(!recorder.is_recording());
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_at_limit() {
        let recognizer = Arc::new(ScriptedRecognizer::silent());
        let recorder = VivaRecorder::new(recognizer, Duration::from_secs(40));
        let err = recorder.record().await.unwrap_err();
        assert!(matches!(err, ProctorError::RecognitionError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn new_recording_replaces_in_flight_one() {
        let recognizer = Arc::new(ScriptedRecognizer::silent());
        let recorder = Arc::new(VivaRecorder::new(recognizer.clone(), Duration::from_secs(40)));

        let first = tokio::spawn({
            let recorder = Arc::clone(&recorder);
            async move { recorder.record().await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        recognizer.push(Ok("second answer".into()));
        let second = recorder.record().await;

        let first = first.await.expect("join");
        assert!(matches!(first, Err(ProctorError::RecognitionError(_))));
        assert_eq!(second.expect("second"), "second answer");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_transcript_is_an_error() {
        let recognizer = Arc::new(ScriptedRecognizer::new([Ok("   ".to_string())]));
        let recorder = VivaRecorder::new(recognizer, Duration::from_secs(40));
        assert!(recorder.record().await.is_err());
    }
}
