//! SessionController: one proctored attempt, from permission gate to report.
//!
//! Owns every timer, listener and media handle of the attempt. The clock
//! expiry path, the warning threshold path and the submit button all funnel
//! into [`SessionController::submit`], which the lifecycle guards so the
//! transition runs at most once. [`SessionController::teardown`] is the
//! single exit routine for abandoned attempts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use proctor_core::error::{ProctorError, Result};
use proctor_core::{
    AssignmentStatus, Clock, ExecutionOutput, Language, Lifecycle, SessionStatus, SubmitGate,
    TestConfig, VivaSheet, Warning, WarningKind, WarningLedger, format_countdown,
};
use proctor_core::content::{QuestionSection, parse_question_sections};

use crate::clock::SessionClock;
use crate::editor::DraftPersister;
use crate::generation::ContentService;
use crate::integrity::{IntegrityMonitor, ViolationSink};
use crate::lock;
use crate::permission::{PermissionGate, PermissionStatus};
use crate::policy::SessionPolicy;
use crate::ports::{
    CodeRunner, DocumentStore, Fullscreen, IdentityProvider, MediaDevices, MediaStream, Navigator,
    Notice, Notifier, PageEvents, PresenceDetector, Route, SpeechRecognizer, SpeechSynthesizer,
    TextModel,
};
use crate::strategy::ProctoringStrategy;
use crate::submission::{FinalArtifact, finalize};
use crate::viva::VivaRecorder;

const CAMERA_REQUIRED: &str = "Camera/microphone required";
const FULLSCREEN_REQUIRED: &str = "Fullscreen mode is required.";
const MIC_ERROR: &str = "Mic error. Try again.";
const SUBMITTED: &str = "Test submitted successfully!";

// ─── Services ─────────────────────────────────────────────────────

/// Every collaborator the session talks to.
#[derive(Clone)]
pub struct Services {
    pub media: Arc<dyn MediaDevices>,
    pub fullscreen: Arc<dyn Fullscreen>,
    pub detector: Arc<dyn PresenceDetector>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub page_events: Arc<dyn PageEvents>,
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub model: Arc<dyn TextModel>,
    pub runner: Arc<dyn CodeRunner>,
    pub navigator: Arc<dyn Navigator>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

// ─── Outcomes / Snapshot ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// This call ran the transition to completion.
    Submitted,
    /// Another caller is running the transition.
    InFlight,
    /// Already completed or stopped.
    AlreadyFinished,
}

/// Read-only view of the attempt for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub assignment_id: String,
    pub status: SessionStatus,
    pub remaining_seconds: u64,
    pub countdown: String,
    pub permissions: PermissionStatus,
    pub title: Option<String>,
    pub question: String,
    pub question_sections: Vec<QuestionSection>,
    pub code: String,
    pub viva_questions: Vec<String>,
    pub viva_transcripts: Vec<String>,
    pub current_question: usize,
    pub warnings: Vec<Warning>,
    pub active_warning: Option<WarningKind>,
    pub failed_submissions: u32,
    pub submission_id: Option<String>,
}

// ─── State ────────────────────────────────────────────────────────

struct SessionState {
    lifecycle: Lifecycle,
    ledger: WarningLedger,
    config: Option<TestConfig>,
    test_id: String,
    user_id: String,
    question: String,
    started_at: Option<DateTime<Utc>>,
    code: String,
    viva: VivaSheet,
    current_question: usize,
    active_warning: Option<WarningKind>,
    remaining: Option<watch::Receiver<u64>>,
    submission_id: Option<String>,
}

#[derive(Default)]
struct Monitors {
    clock: Option<SessionClock>,
    integrity: Option<IntegrityMonitor>,
}

pub struct SessionController {
    this: Weak<Self>,
    assignment_id: String,
    services: Services,
    policy: SessionPolicy,
    strategy: ProctoringStrategy,
    content: ContentService,
    gate: PermissionGate,
    recorder: VivaRecorder,
    drafts: DraftPersister,
    state: Mutex<SessionState>,
    monitors: tokio::sync::Mutex<Monitors>,
    cancel: CancellationToken,
    status: watch::Sender<SessionStatus>,
    starting: AtomicBool,
}

impl SessionController {
    pub fn new(
        assignment_id: impl Into<String>,
        services: Services,
        policy: SessionPolicy,
    ) -> Arc<Self> {
        let strategy = ProctoringStrategy::from_policy(
            &policy,
            Arc::clone(&services.detector),
            Arc::clone(&services.synthesizer),
        );
        Self::with_strategy(assignment_id, services, policy, strategy)
    }

    pub fn with_strategy(
        assignment_id: impl Into<String>,
        services: Services,
        policy: SessionPolicy,
        strategy: ProctoringStrategy,
    ) -> Arc<Self> {
        let assignment_id = assignment_id.into();
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            content: ContentService::new(Arc::clone(&services.model)),
            gate: PermissionGate::new(
                Arc::clone(&services.media),
                Arc::clone(&services.fullscreen),
            ),
            recorder: VivaRecorder::new(
                Arc::clone(&services.recognizer),
                policy.recording_limit(),
            ),
            drafts: DraftPersister::new(
                Arc::clone(&services.store),
                assignment_id.clone(),
                policy.draft_debounce(),
            ),
            state: Mutex::new(SessionState {
                lifecycle: Lifecycle::new(),
                ledger: WarningLedger::new(policy.threshold()),
                config: None,
                test_id: String::new(),
                user_id: String::new(),
                question: String::new(),
                started_at: None,
                code: String::new(),
                viva: VivaSheet::default(),
                current_question: 0,
                active_warning: None,
                remaining: None,
                submission_id: None,
            }),
            monitors: tokio::sync::Mutex::new(Monitors::default()),
            cancel: CancellationToken::new(),
            status: watch::channel(SessionStatus::NotStarted).0,
            starting: AtomicBool::new(false),
            assignment_id,
            services,
            policy,
            strategy,
        })
    }

    pub fn assignment_id(&self) -> &str {
        &self.assignment_id
    }

    pub fn status(&self) -> SessionStatus {
        lock(&self.state).lifecycle.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    // ─── Permission Gate ──────────────────────────────────────────

    /// Only valid before start: the presence check samples the granted
    /// stream for the rest of the attempt.
    pub async fn request_camera_and_mic(&self) -> Result<Arc<dyn MediaStream>> {
        let status = self.status();
        if status != SessionStatus::NotStarted || self.gate.is_locked() {
            return Err(ProctorError::InvalidTransition {
                from: status,
                to: SessionStatus::NotStarted,
            });
        }
        self.gate.request_camera_and_mic().await.inspect_err(|err| {
            if matches!(err, ProctorError::PermissionDenied { .. }) {
                tracing::warn!(assignment_id = %self.assignment_id, error = %err, "camera/microphone denied");
                self.services.notifier.notify(Notice::error(CAMERA_REQUIRED));
            }
        })
    }

    pub async fn request_fullscreen(&self) -> Result<()> {
        self.gate.request_fullscreen().await.inspect_err(|err| {
            tracing::warn!(assignment_id = %self.assignment_id, error = %err, "fullscreen denied");
            self.services.notifier.notify(Notice::error(FULLSCREEN_REQUIRED));
        })
    }

    pub fn permissions(&self) -> PermissionStatus {
        self.gate.status()
    }

    // ─── Start ────────────────────────────────────────────────────

    /// Load the assignment and test, then start the clock and monitors.
    ///
    /// An in-progress assignment resumes from its stored start time and
    /// practical question.
    pub async fn start(&self) -> Result<()> {
        if let Some(capability) = self.gate.missing() {
            return Err(ProctorError::PermissionDenied {
                capability,
                reason: "not granted yet".into(),
            });
        }
        let status = self.status();
        if status != SessionStatus::NotStarted || self.starting.swap(true, Ordering::SeqCst) {
            return Err(ProctorError::InvalidTransition {
                from: status,
                to: SessionStatus::Active,
            });
        }

        self.gate.lock_media();
        let result = self.start_inner().await;
        if result.is_err() {
            self.gate.unlock_media();
            self.starting.store(false, Ordering::SeqCst);
        }
        result
    }

    async fn start_inner(&self) -> Result<()> {
        let store = &self.services.store;
        let user = self
            .services
            .identity
            .current_user()
            .ok_or(ProctorError::NotAuthenticated)?;

        let mut assignment = store
            .get_assignment(&self.assignment_id)
            .await?
            .ok_or_else(|| ProctorError::not_found("testAssignments", &self.assignment_id))?;
        if assignment.user_id != user.uid {
            return Err(ProctorError::AccessDenied(format!(
                "assignment {} belongs to another user",
                self.assignment_id
            )));
        }
        if assignment.status == AssignmentStatus::Completed {
            return Err(ProctorError::InvalidTransition {
                from: SessionStatus::Completed,
                to: SessionStatus::Active,
            });
        }

        let test = store
            .get_test(&assignment.test_id)
            .await?
            .ok_or_else(|| ProctorError::not_found("tests", &assignment.test_id))?;
        let config = test.config();
        let topics = config.topic_list();

        let question = match assignment.question.clone() {
            Some(question) => question,
            None => {
                self.content
                    .practical_question(&topics, &config.role, config.duration_minutes())
                    .await
            }
        };
        let viva_questions = if config.viva_enabled {
            self.content.viva_questions(&topics, &config.role).await
        } else {
            Vec::new()
        };

        let started_at = assignment
            .started_at
            .unwrap_or_else(|| self.services.clock.now());
        let resumed = assignment.status == AssignmentStatus::InProgress;
        assignment.status = AssignmentStatus::InProgress;
        assignment.started_at = Some(started_at);
        assignment.question = Some(question.clone());
        let code = assignment.code.clone();
        let test_id = assignment.test_id.clone();
        store.put_assignment(assignment).await?;

        // Held until both monitors are installed so an immediate expiry
        // cannot race the installation.
        let mut monitors = self.monitors.lock().await;
        {
            let mut state = lock(&self.state);
            state.lifecycle.activate()?;
            state.test_id = test_id;
            state.user_id = user.uid.clone();
            state.question = question;
            state.started_at = Some(started_at);
            state.code = code;
            state.viva = VivaSheet::new(viva_questions);
            state.current_question = 0;
            state.config = Some(config.clone());
        }
        self.status.send_replace(SessionStatus::Active);

        let weak = self.this.clone();
        let clock = SessionClock::start(
            Arc::clone(&self.services.clock),
            started_at,
            config.duration_seconds,
            self.policy.tick(),
            self.cancel.child_token(),
            move || {
                if let Some(session) = weak.upgrade() {
                    tokio::spawn(async move {
                        tracing::info!(assignment_id = %session.assignment_id, "time is up");
                        let _ = session.submit().await;
                    });
                }
            },
        );
        lock(&self.state).remaining = Some(clock.subscribe());

        let integrity = IntegrityMonitor::start(
            Arc::clone(&self.strategy.presence),
            self.gate.stream(),
            self.services.page_events.as_ref(),
            Arc::new(SessionSink(self.this.clone())),
            self.policy.presence_interval(),
            self.cancel.child_token(),
        );
        monitors.clock = Some(clock);
        monitors.integrity = Some(integrity);
        drop(monitors);

        tracing::info!(
            assignment_id = %self.assignment_id,
            user = %user.uid,
            duration_seconds = config.duration_seconds,
            resumed,
            "session started"
        );

        if config.viva_enabled {
            let _ = self.present_question(0);
        }
        Ok(())
    }

    // ─── Active Operations ────────────────────────────────────────

    pub fn remaining_seconds(&self) -> u64 {
        let state = lock(&self.state);
        match (&state.remaining, &state.config) {
            (Some(rx), _) => *rx.borrow(),
            (None, Some(config)) => config.duration_seconds,
            (None, None) => 0,
        }
    }

    /// Update the code buffer now; persist it after the quiet period.
    pub fn on_code_change(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        {
            let mut state = lock(&self.state);
            if !state.lifecycle.accepts_warnings() {
                return Err(ProctorError::SessionNotActive(state.lifecycle.status()));
            }
            state.code.clone_from(&text);
            self.drafts.schedule(text);
        }
        Ok(())
    }

    /// Make `index` the current viva question and deliver it through the
    /// voice strategy without waiting for speech to finish.
    pub fn present_question(&self, index: usize) -> Result<String> {
        let question = {
            let mut state = lock(&self.state);
            if !state.lifecycle.accepts_warnings() {
                return Err(ProctorError::SessionNotActive(state.lifecycle.status()));
            }
            let question = state
                .viva
                .question(index)
                .map(str::to_string)
                .ok_or_else(|| {
                    ProctorError::InvalidInput(format!("no viva question at index {index}"))
                })?;
            state.current_question = index;
            question
        };
        let voice = Arc::clone(&self.strategy.voice);
        let spoken = question.clone();
        tokio::spawn(async move { voice.present(&spoken).await });
        Ok(question)
    }

    /// Record a spoken answer into slot `index`, replacing any previous one.
    /// A failed capture leaves the slot untouched.
    pub async fn record_answer(&self, index: usize) -> Result<String> {
        {
            let state = lock(&self.state);
            if !state.lifecycle.accepts_warnings() {
                return Err(ProctorError::SessionNotActive(state.lifecycle.status()));
            }
            if state.viva.question(index).is_none() {
                return Err(ProctorError::InvalidInput(format!(
                    "no viva question at index {index}"
                )));
            }
        }

        let transcript = match self.recorder.record().await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(assignment_id = %self.assignment_id, index, error = %err, "recording failed");
                if self.status() == SessionStatus::Active {
                    self.services.notifier.notify(Notice::error(MIC_ERROR));
                }
                return Err(err);
            }
        };

        let mut state = lock(&self.state);
        if !state.lifecycle.accepts_warnings() {
            return Err(ProctorError::SessionNotActive(state.lifecycle.status()));
        }
        state.viva.record(index, transcript.clone())?;
        tracing::debug!(assignment_id = %self.assignment_id, index, "answer recorded");
        Ok(transcript)
    }

    pub async fn run_code(&self, language: Language) -> Result<ExecutionOutput> {
        let code = {
            let state = lock(&self.state);
            if !state.lifecycle.accepts_warnings() {
                return Err(ProctorError::SessionNotActive(state.lifecycle.status()));
            }
            state.code.clone()
        };
        self.services.runner.run(&code, language).await
    }

    /// Hide the warning modal. The count is unaffected.
    pub fn dismiss_warning(&self) {
        lock(&self.state).active_warning = None;
    }

    fn raise_warning(&self, kind: WarningKind) {
        let outcome = {
            let mut state = lock(&self.state);
            if !state.lifecycle.accepts_warnings() {
                tracing::trace!(%kind, "warning ignored: session not active");
                return;
            }
            let outcome = state.ledger.record(kind, self.services.clock.now());
            state.active_warning = Some(kind);
            outcome
        };

        tracing::warn!(
            assignment_id = %self.assignment_id,
            %kind,
            count = outcome.count,
            "integrity violation"
        );
        self.services.notifier.notify(Notice::warning(kind.message()));

        if outcome.threshold_reached {
            tracing::warn!(assignment_id = %self.assignment_id, count = outcome.count, "warning threshold reached, submitting");
            if let Some(session) = self.this.upgrade() {
                tokio::spawn(async move {
                    let _ = session.submit().await;
                });
            }
        }
    }

    // ─── Submission Transition ────────────────────────────────────

    /// Run the Submission Transition. Safe to call repeatedly and
    /// concurrently: only one caller does the work.
    ///
    /// On `PersistenceFailure` or `NotAuthenticated` the session stays
    /// `Submitting` and a later call retries.
    pub async fn submit(&self) -> Result<SubmitOutcome> {
        let retry = {
            let mut state = lock(&self.state);
            match state.lifecycle.begin_submit() {
                SubmitGate::Proceed { retry } => retry,
                SubmitGate::InFlight => return Ok(SubmitOutcome::InFlight),
                SubmitGate::Finished => return Ok(SubmitOutcome::AlreadyFinished),
                SubmitGate::NotStarted => {
                    return Err(ProctorError::SessionNotActive(SessionStatus::NotStarted));
                }
            }
        };
        self.status.send_replace(SessionStatus::Submitting);
        tracing::info!(assignment_id = %self.assignment_id, retry, "submission started");

        self.stop_monitors().await;
        self.drafts.close();
        self.recorder.cancel();

        let persisted = match self.freeze() {
            Some(artifact) => match self.services.identity.current_user() {
                Some(_) => {
                    finalize(
                        &artifact,
                        &self.content,
                        self.services.store.as_ref(),
                        self.services.clock.now(),
                    )
                    .await
                }
                None => Err(ProctorError::NotAuthenticated),
            },
            None => Err(ProctorError::SessionNotActive(SessionStatus::Submitting)),
        };

        let submission_id = match persisted {
            Ok(id) => id,
            Err(err) => {
                lock(&self.state).lifecycle.fail_submit();
                tracing::error!(assignment_id = %self.assignment_id, error = %err, "submission failed");
                self.services
                    .notifier
                    .notify(Notice::error(format!("Submission failed: {err}. Please try again.")));
                if err == ProctorError::NotAuthenticated {
                    self.services.navigator.navigate(Route::Login);
                }
                return Err(err);
            }
        };

        self.gate.release_media();
        self.gate.exit_fullscreen().await;

        {
            let mut state = lock(&self.state);
            state.lifecycle.complete()?;
            state.active_warning = None;
            state.submission_id = Some(submission_id);
        }
        self.status.send_replace(SessionStatus::Completed);
        self.cancel.cancel();

        tracing::info!(assignment_id = %self.assignment_id, "session completed");
        self.services.navigator.navigate(Route::Report {
            assignment_id: self.assignment_id.clone(),
        });
        self.services.notifier.notify(Notice::success(SUBMITTED));
        Ok(SubmitOutcome::Submitted)
    }

    fn freeze(&self) -> Option<FinalArtifact> {
        let state = lock(&self.state);
        let config = state.config.clone()?;
        Some(FinalArtifact {
            assignment_id: self.assignment_id.clone(),
            test_id: state.test_id.clone(),
            user_id: state.user_id.clone(),
            config,
            question: state.question.clone(),
            code: state.code.clone(),
            viva: state.viva.paired(),
            warnings: state.ledger.warnings().to_vec(),
        })
    }

    async fn stop_monitors(&self) {
        let (clock, integrity) = {
            let mut monitors = self.monitors.lock().await;
            (monitors.clock.take(), monitors.integrity.take())
        };
        if let Some(clock) = clock {
            clock.stop().await;
        }
        if let Some(integrity) = integrity {
            integrity.stop().await;
        }
    }

    // ─── Teardown ─────────────────────────────────────────────────

    /// Leave the attempt: stop every timer and listener and release the
    /// camera. A submission already in flight still completes.
    pub async fn teardown(&self) {
        let stopped = lock(&self.state).lifecycle.stop();
        if stopped {
            self.status.send_replace(SessionStatus::Stopped);
            tracing::info!(assignment_id = %self.assignment_id, "session stopped");
        }
        self.stop_monitors().await;
        self.drafts.close();
        self.recorder.cancel();
        self.cancel.cancel();
        self.gate.release_media();
        self.gate.exit_fullscreen().await;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let remaining_seconds = self.remaining_seconds();
        let permissions = self.gate.status();
        let state = lock(&self.state);
        SessionSnapshot {
            assignment_id: self.assignment_id.clone(),
            status: state.lifecycle.status(),
            remaining_seconds,
            countdown: format_countdown(remaining_seconds),
            permissions,
            title: state.config.as_ref().map(|c| c.title.clone()),
            question: state.question.clone(),
            question_sections: parse_question_sections(&state.question),
            code: state.code.clone(),
            viva_questions: state.viva.questions().to_vec(),
            viva_transcripts: state.viva.transcripts().to_vec(),
            current_question: state.current_question,
            warnings: state.ledger.warnings().to_vec(),
            active_warning: state.active_warning,
            failed_submissions: state.lifecycle.failed_attempts(),
            submission_id: state.submission_id.clone(),
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.gate.release_media();
    }
}

/// Routes monitor violations to the session without keeping it alive.
struct SessionSink(Weak<SessionController>);

impl ViolationSink for SessionSink {
    fn raise(&self, kind: WarningKind) {
        if let Some(session) = self.0.upgrade() {
            session.raise_warning(kind);
        }
    }
}
