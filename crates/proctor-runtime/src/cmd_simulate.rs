//! `proctor simulate`: one proctored attempt against simulated devices.
//!
//! Camera, fullscreen, page events, speech and the text model are the
//! scripted collaborators from `proctor_session::sim`; a scenario file
//! drives them on a timeline measured from session start.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use proctor_core::{KeyChord, Language};
use proctor_session::ports::{DocumentStore, Notice, PageEvent};
use proctor_session::sim::SimEnvironment;
use proctor_session::{SessionController, SessionPolicy, SessionSnapshot, SubmitOutcome};

use crate::cli::SimulateOpts;
use crate::file_store::JsonFileStore;
use crate::identity::LocalIdentity;
use crate::runner::LocalRunner;

const DEMO_ASSIGNMENT: &str = "demo-assignment";
const DEMO_TEST: &str = "demo-test";
const DEMO_USER: &str = "demo-candidate";

// ─── Scenario ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Page { event: PageEvent },
    Code { text: String },
    RunCode { language: Language },
    /// Present viva question `index` and answer it with `text`.
    Answer { index: usize, text: String },
    /// Queue a face count for the next presence check.
    Faces { count: usize },
    Submit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedStep {
    /// Offset from session start.
    pub at_ms: u64,
    #[serde(flatten)]
    pub step: Step,
}

impl TimedStep {
    fn at(at_ms: u64, step: Step) -> Self {
        Self { at_ms, step }
    }
}

pub fn load_scenario(path: &Path) -> anyhow::Result<Vec<TimedStep>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read scenario {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid scenario {}", path.display()))
}

/// A short attempt: a tab switch, an edit, a blocked shortcut, one viva
/// answer and an empty camera frame.
pub fn default_scenario() -> Vec<TimedStep> {
    vec![
        TimedStep::at(2_000, Step::Page { event: PageEvent::VisibilityHidden }),
        TimedStep::at(2_500, Step::Page { event: PageEvent::VisibilityVisible }),
        TimedStep::at(
            3_000,
            Step::Code {
                text: "def solve(xs):\n    return sorted(set(xs))\n".into(),
            },
        ),
        TimedStep::at(
            5_000,
            Step::Page {
                event: PageEvent::KeyDown(KeyChord::ctrl_shift("I")),
            },
        ),
        TimedStep::at(
            6_000,
            Step::Answer {
                index: 0,
                text: "A set removes duplicates before sorting".into(),
            },
        ),
        TimedStep::at(8_000, Step::Faces { count: 0 }),
    ]
}

// ─── Report ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub snapshot: SessionSnapshot,
    pub routes: Vec<String>,
    pub notices: Vec<Notice>,
    pub executions: Vec<String>,
}

// ─── Driver ───────────────────────────────────────────────────────

/// Apply `steps` on their timeline, then submit after `submit_after` or
/// wait for the session to finish on its own.
pub async fn drive(
    session: &Arc<SessionController>,
    env: &SimEnvironment,
    mut steps: Vec<TimedStep>,
    submit_after: Option<Duration>,
) -> anyhow::Result<Vec<String>> {
    let origin = Instant::now();
    let mut executions = Vec::new();
    steps.sort_by_key(|s| s.at_ms);

    for TimedStep { at_ms, step } in steps {
        tokio::time::sleep_until(origin + Duration::from_millis(at_ms)).await;
        if session.status().is_terminal() {
            tracing::info!(at_ms, "session finished; remaining steps skipped");
            break;
        }
        tracing::debug!(at_ms, ?step, "scenario step");
        match step {
            Step::Page { event } => env.page.emit(event),
            Step::Code { text } => {
                if let Err(e) = session.on_code_change(text) {
                    tracing::warn!(at_ms, "edit ignored: {e}");
                }
            }
            Step::RunCode { language } => match session.run_code(language).await {
                Ok(output) => executions.push(output.render()),
                Err(e) => executions.push(e.to_string()),
            },
            Step::Answer { index, text } => {
                env.recognizer.push(Ok(text));
                if let Err(e) = session.present_question(index) {
                    tracing::warn!(at_ms, index, "cannot present question: {e}");
                    continue;
                }
                if let Err(e) = session.record_answer(index).await {
                    tracing::warn!(at_ms, index, "answer not recorded: {e}");
                }
            }
            Step::Faces { count } => env.detector.push(Ok(count)),
            Step::Submit => {
                session.submit().await?;
                return Ok(executions);
            }
        }
    }

    match submit_after {
        Some(after) => {
            tokio::time::sleep_until(origin + after).await;
            let outcome = session.submit().await?;
            if outcome != SubmitOutcome::Submitted {
                tracing::info!(?outcome, "manual submit had nothing to do");
            }
        }
        None => {
            let mut status = session.subscribe_status();
            status
                .wait_for(|s| s.is_terminal())
                .await
                .context("session dropped before finishing")?;
        }
    }
    Ok(executions)
}

/// Entry point for `proctor simulate`.
pub async fn cmd_simulate(
    store_path: &Path,
    policy: SessionPolicy,
    opts: &SimulateOpts,
) -> anyhow::Result<SimulationReport> {
    let env = SimEnvironment::new();
    let mut services = env.services();
    services.runner = Arc::new(LocalRunner::default());

    let assignment_id = match &opts.assignment {
        Some(id) => {
            let store: Arc<dyn DocumentStore> = Arc::new(JsonFileStore::open(store_path).await?);
            let assignment = store
                .get_assignment(id)
                .await?
                .with_context(|| format!("assignment {id} not found in {}", store_path.display()))?;
            let identity = Arc::new(LocalIdentity::new(Arc::clone(&store)));
            identity.act_as(&assignment.user_id).await?;
            services.store = store;
            services.identity = identity;
            id.clone()
        }
        None => {
            env.seed_assignment(DEMO_ASSIGNMENT, DEMO_TEST, DEMO_USER, opts.duration_minutes);
            env.sign_in_as(DEMO_USER);
            DEMO_ASSIGNMENT.to_string()
        }
    };

    let steps = match &opts.scenario {
        Some(path) => load_scenario(path)?,
        None => default_scenario(),
    };

    let session = SessionController::new(assignment_id, services, policy);
    session.request_camera_and_mic().await?;
    session.request_fullscreen().await?;
    session.start().await?;
    tracing::info!(
        assignment_id = %session.assignment_id(),
        remaining = session.remaining_seconds(),
        "attempt started"
    );

    let submit_after = opts.submit_after.map(Duration::from_secs);
    let executions = tokio::select! {
        result = drive(&session, &env, steps, submit_after) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted; tearing down without submitting");
            session.teardown().await;
            Vec::new()
        }
    };

    Ok(SimulationReport {
        snapshot: session.snapshot(),
        routes: env.routes.routes().iter().map(|r| r.path()).collect(),
        notices: env.notices.all(),
        executions,
    })
}
