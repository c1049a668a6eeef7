use std::sync::Arc;
use std::time::Duration;

use proctor_session::core::{AssignmentStatus, Clock, SessionStatus, WarningKind};
use proctor_session::ports::{PageEvent, Route};
use proctor_session::sim::SimEnvironment;
use proctor_session::{SessionController, SessionPolicy};

async fn start(env: &SimEnvironment, policy: SessionPolicy) -> Arc<SessionController> {
    let session = SessionController::new("a1", env.services(), policy);
    session.request_camera_and_mic().await.expect("camera");
    session.request_fullscreen().await.expect("fullscreen");
    session.start().await.expect("start");
    session
}

#[tokio::test(start_paused = true)]
async fn forty_five_minute_attempt_auto_submits_at_zero() {
    let env = SimEnvironment::with_assignment("a1", "t1", "u1", 45);
    let session = start(&env, SessionPolicy::default()).await;
    let mut status = session.subscribe_status();
    assert_eq!(session.remaining_seconds(), 45 * 60);
    assert_eq!(
        env.store.assignment("a1").map(|a| a.status),
        Some(AssignmentStatus::InProgress)
    );

    tokio::time::sleep(Duration::from_millis(20 * 60 * 1_000 + 500)).await;
    assert_eq!(session.remaining_seconds(), 25 * 60);
    assert_eq!(session.snapshot().countdown, "25:00");
    assert_eq!(*status.borrow_and_update(), SessionStatus::Active);

    tokio::time::sleep(Duration::from_secs(25 * 60)).await;
    assert_eq!(session.status(), SessionStatus::Completed);
    assert_eq!(session.remaining_seconds(), 0);

    let assignment = env.store.assignment("a1").expect("assignment");
    assert_eq!(assignment.status, AssignmentStatus::Completed);
    assert!(assignment.completed_at.is_some());
    assert!(env.store.submission("t1_u1").is_some());
    assert_eq!(env.model.summary_calls(), 1);
    assert_eq!(
        env.routes.last(),
        Some(Route::Report {
            assignment_id: "a1".into()
        })
    );
    assert_eq!(env.media.issued()[0].stop_count(), 1);
    assert_eq!(env.fullscreen.exit_count(), 1);
    // 45 minutes of compliant presence checks, nothing recorded
    assert!(env.detector.calls() >= 500);
    assert!(session.snapshot().warnings.is_empty());
}

#[tokio::test(start_paused = true)]
async fn resumed_attempt_with_one_second_left_expires_on_next_tick() {
    let env = SimEnvironment::with_assignment("a1", "t1", "u1", 1);
    env.store.update_assignment("a1", |a| {
        a.status = AssignmentStatus::InProgress;
        a.started_at = Some(env.clock.now() - chrono::Duration::seconds(59));
    });
    let session = start(&env, SessionPolicy::default()).await;
    assert_eq!(session.remaining_seconds(), 1);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(session.status(), SessionStatus::Active);

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(session.status(), SessionStatus::Completed);
    assert_eq!(env.model.summary_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn two_tab_switches_then_manual_submit() {
    let env = SimEnvironment::with_assignment("a1", "t1", "u1", 45);
    let session = start(&env, SessionPolicy::default()).await;

    env.page.emit(PageEvent::VisibilityHidden);
    tokio::time::sleep(Duration::from_secs(3)).await;
    env.page.emit(PageEvent::VisibilityVisible);
    env.page.emit(PageEvent::VisibilityHidden);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let warnings = session.snapshot().warnings;
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| w.kind == WarningKind::FocusViolation));
    assert!(warnings[0].timestamp < warnings[1].timestamp);
    assert_eq!(session.status(), SessionStatus::Active);

    assert_eq!(
        session.submit().await.expect("submit"),
        proctor_session::SubmitOutcome::Submitted
    );
    let submission = env.store.submission("t1_u1").expect("submission");
    assert_eq!(submission.warnings.len(), 2);

    env.page.emit(PageEvent::VisibilityHidden);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(session.snapshot().warnings.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn presence_violations_and_detector_gaps() {
    let env = SimEnvironment::with_assignment("a1", "t1", "u1", 45);
    env.detector.push(Ok(1));
    env.detector.push(Ok(0));
    env.detector.push(Err(proctor_session::core::ProctorError::DetectorUnavailable(
        "model loading".into(),
    )));
    env.detector.push(Ok(2));
    let session = start(&env, SessionPolicy::default()).await;

    tokio::time::sleep(Duration::from_secs(21)).await;
    let kinds: Vec<_> = session
        .snapshot()
        .warnings
        .iter()
        .map(|w| w.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![WarningKind::PresenceViolation, WarningKind::PresenceViolation]
    );
    session.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn debounced_edits_write_once_with_last_value() {
    let env = SimEnvironment::with_assignment("a1", "t1", "u1", 45);
    let session = start(&env, SessionPolicy::default()).await;

    for i in 0..10 {
        session
            .on_code_change(format!("fn main() {{ println!(\"{i}\"); }}"))
            .expect("edit");
        tokio::time::sleep(Duration::from_millis(80)).await;
    }
    tokio::time::sleep(Duration::from_millis(1_200)).await;

    let writes = env.store.draft_writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].1, "fn main() { println!(\"9\"); }");
    assert_eq!(
        env.store.assignment("a1").map(|a| a.code),
        Some(writes[0].1.clone())
    );
    session.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn recording_one_slot_leaves_the_others() {
    let env = SimEnvironment::with_assignment("a1", "t1", "u1", 45);
    let session = start(&env, SessionPolicy::default()).await;
    assert_eq!(session.snapshot().viva_questions.len(), 5);

    env.recognizer.push(Ok("Arc is atomically reference counted".into()));
    session.present_question(2).expect("present");
    let text = session.record_answer(2).await.expect("record");
    assert_eq!(text, "Arc is atomically reference counted");

    let transcripts = session.snapshot().viva_transcripts;
    assert_eq!(transcripts.len(), 5);
    assert_eq!(transcripts[2], text);
    for i in [0, 1, 3, 4] {
        assert_eq!(transcripts[i], "");
    }

    env.recognizer.push(Ok("Second take".into()));
    session.record_answer(2).await.expect("overwrite");
    assert_eq!(session.snapshot().viva_transcripts[2], "Second take");
    assert_eq!(session.snapshot().current_question, 2);

    // First prompt is read aloud at start, the second on request.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(env.synthesizer.spoken().len(), 2);
    session.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn recording_times_out_at_the_limit() {
    let env = SimEnvironment::with_assignment("a1", "t1", "u1", 45);
    let session = start(&env, SessionPolicy::default()).await;

    let begun = tokio::time::Instant::now();
    assert!(session.record_answer(0).await.is_err());
    let waited = begun.elapsed();
    assert!(waited >= Duration::from_secs(40) && waited < Duration::from_secs(41));
    assert_eq!(session.snapshot().viva_transcripts[0], "");
    session.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn teardown_removes_every_listener_and_timer() {
    let env = SimEnvironment::with_assignment("a1", "t1", "u1", 45);
    let session = start(&env, SessionPolicy::default()).await;
    assert_eq!(env.page.listener_count(), 1);

    session.teardown().await;
    assert_eq!(session.status(), SessionStatus::Stopped);
    assert_eq!(env.page.listener_count(), 0);

    let checks = env.detector.calls();
    tokio::time::sleep(Duration::from_secs(60 * 60)).await;
    assert_eq!(env.detector.calls(), checks);
    assert_eq!(env.model.summary_calls(), 0, "no stray expiry after teardown");
    assert_eq!(env.media.issued()[0].stop_count(), 1);
    assert_ne!(
        env.store.assignment("a1").map(|a| a.status),
        Some(AssignmentStatus::Completed)
    );
}

#[tokio::test(start_paused = true)]
async fn strategies_can_be_switched_off() {
    let env = SimEnvironment::with_assignment("a1", "t1", "u1", 45);
    let policy = SessionPolicy {
        presence_check: false,
        read_questions_aloud: false,
        ..SessionPolicy::default()
    };
    let session = start(&env, policy).await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(env.detector.calls(), 0);
    assert!(env.synthesizer.spoken().is_empty());
    session.teardown().await;
}
