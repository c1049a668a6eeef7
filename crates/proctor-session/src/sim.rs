//! In-process collaborators: a memory document store, scripted devices,
//! a page event bus and canned hosted services. Used by the tests and by
//! the `simulate` command.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, watch};

use proctor_core::error::{Capability, ProctorError, Result};
use proctor_core::{
    AssignmentRecord, AssignmentStatus, Clock, ExecutionOutput, Language, SubmissionRecord,
    TestRecord, UserRecord, UserRole,
};

use crate::clock::TokioClock;
use crate::controller::Services;
use crate::lock;
use crate::ports::{
    AuthUser, CodeRunner, DocumentStore, Fullscreen, IdentityProvider, MediaDevices, MediaStream,
    Navigator, Notice, Notifier, PageEvent, PageEvents, PresenceDetector, Route, SpeechRecognizer,
    SpeechSynthesizer, TextModel,
};
use crate::store::Collections;

// ─── Document Store ───────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Collections>,
    drafts: Mutex<Vec<(String, String)>>,
    fail_writes: AtomicBool,
    next_id: AtomicU64,
}

impl MemoryStore {
    /// Make every write fail with `PersistenceFailure` until cleared.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Draft writes in the order they reached the store.
    pub fn draft_writes(&self) -> Vec<(String, String)> {
        lock(&self.drafts).clone()
    }

    pub fn snapshot(&self) -> Collections {
        lock(&self.data).clone()
    }

    pub fn assignment(&self, id: &str) -> Option<AssignmentRecord> {
        lock(&self.data).test_assignments.get(id).cloned()
    }

    pub fn submission(&self, id: &str) -> Option<SubmissionRecord> {
        lock(&self.data).submissions.get(id).cloned()
    }

    pub fn insert_user(&self, user: UserRecord) {
        lock(&self.data).users.insert(user.uid.clone(), user);
    }

    pub fn insert_test(&self, test: TestRecord) {
        lock(&self.data).tests.insert(test.id.clone(), test);
    }

    pub fn insert_assignment(&self, assignment: AssignmentRecord) {
        lock(&self.data)
            .test_assignments
            .insert(assignment.id.clone(), assignment);
    }

    /// Insert an `Assigned` assignment with placeholder test and user ids.
    pub fn seed_blank_assignment(&self, id: &str) {
        self.insert_assignment(AssignmentRecord {
            id: id.to_string(),
            test_id: "test".into(),
            user_id: "user".into(),
            status: AssignmentStatus::Assigned,
            assigned_at: Utc::now(),
            started_at: None,
            completed_at: None,
            code: String::new(),
            question: None,
        });
    }

    pub fn update_assignment(&self, id: &str, update: impl FnOnce(&mut AssignmentRecord)) {
        if let Some(assignment) = lock(&self.data).test_assignments.get_mut(id) {
            update(assignment);
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ProctorError::PersistenceFailure(
                "simulated write failure".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn generate_id(&self) -> String {
        format!("doc-{:06}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    async fn get_user(&self, uid: &str) -> Result<Option<UserRecord>> {
        Ok(lock(&self.data).users.get(uid).cloned())
    }

    async fn put_user(&self, user: UserRecord) -> Result<()> {
        self.check_writable()?;
        self.insert_user(user);
        Ok(())
    }

    async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<UserRecord>> {
        Ok(lock(&self.data).users_with_role(role))
    }

    async fn get_test(&self, id: &str) -> Result<Option<TestRecord>> {
        Ok(lock(&self.data).tests.get(id).cloned())
    }

    async fn put_test(&self, test: TestRecord) -> Result<()> {
        self.check_writable()?;
        self.insert_test(test);
        Ok(())
    }

    async fn list_tests(&self) -> Result<Vec<TestRecord>> {
        Ok(lock(&self.data).tests_by_recency())
    }

    async fn get_assignment(&self, id: &str) -> Result<Option<AssignmentRecord>> {
        Ok(self.assignment(id))
    }

    async fn put_assignment(&self, assignment: AssignmentRecord) -> Result<()> {
        self.check_writable()?;
        self.insert_assignment(assignment);
        Ok(())
    }

    async fn list_assignments(&self, user_id: Option<&str>) -> Result<Vec<AssignmentRecord>> {
        Ok(lock(&self.data).assignments_for(user_id))
    }

    async fn get_submission(&self, id: &str) -> Result<Option<SubmissionRecord>> {
        Ok(self.submission(id))
    }

    async fn put_submission(&self, id: &str, submission: SubmissionRecord) -> Result<()> {
        self.check_writable()?;
        lock(&self.data)
            .submissions
            .insert(id.to_string(), submission);
        Ok(())
    }

    async fn save_draft(&self, assignment_id: &str, code: &str) -> Result<()> {
        self.check_writable()?;
        let mut data = lock(&self.data);
        let assignment = data
            .test_assignments
            .get_mut(assignment_id)
            .ok_or_else(|| ProctorError::not_found("testAssignments", assignment_id))?;
        assignment.code = code.to_string();
        lock(&self.drafts).push((assignment_id.to_string(), code.to_string()));
        Ok(())
    }
}

// ─── Media ────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SimStream {
    id: String,
    video: bool,
    audio: bool,
    stops: AtomicUsize,
}

impl SimStream {
    pub fn new(id: impl Into<String>, video: bool, audio: bool) -> Self {
        Self {
            id: id.into(),
            video,
            audio,
            stops: AtomicUsize::new(0),
        }
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl MediaStream for SimStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn has_video(&self) -> bool {
        self.video
    }

    fn has_audio(&self) -> bool {
        self.audio
    }

    fn stop_tracks(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct SimMedia {
    deny: AtomicBool,
    tracks: Mutex<(bool, bool)>,
    issued: Mutex<Vec<Arc<SimStream>>>,
}

impl Default for SimMedia {
    fn default() -> Self {
        Self {
            deny: AtomicBool::new(false),
            tracks: Mutex::new((true, true)),
            issued: Mutex::new(Vec::new()),
        }
    }
}

impl SimMedia {
    /// Refuse the next request as if the user clicked "Block".
    pub fn deny_next(&self) {
        self.deny.store(true, Ordering::SeqCst);
    }

    /// Tracks present on streams issued from now on.
    pub fn set_tracks(&self, video: bool, audio: bool) {
        *lock(&self.tracks) = (video, audio);
    }

    pub fn issued(&self) -> Vec<Arc<SimStream>> {
        lock(&self.issued).clone()
    }
}

#[async_trait]
impl MediaDevices for SimMedia {
    async fn request_camera_and_mic(&self) -> Result<Arc<dyn MediaStream>> {
        if self.deny.swap(false, Ordering::SeqCst) {
            return Err(ProctorError::PermissionDenied {
                capability: Capability::CameraAndMicrophone,
                reason: "NotAllowedError".into(),
            });
        }
        let (video, audio) = *lock(&self.tracks);
        let mut issued = lock(&self.issued);
        let stream = Arc::new(SimStream::new(
            format!("stream-{}", issued.len() + 1),
            video,
            audio,
        ));
        issued.push(Arc::clone(&stream));
        Ok(stream)
    }
}

#[derive(Default)]
pub struct SimFullscreen {
    deny: AtomicBool,
    active: AtomicBool,
    exits: AtomicUsize,
}

impl SimFullscreen {
    pub fn deny_next(&self) {
        self.deny.store(true, Ordering::SeqCst);
    }

    pub fn exit_count(&self) -> usize {
        self.exits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fullscreen for SimFullscreen {
    async fn request(&self) -> Result<()> {
        if self.deny.swap(false, Ordering::SeqCst) {
            return Err(ProctorError::PermissionDenied {
                capability: Capability::Fullscreen,
                reason: "request not allowed".into(),
            });
        }
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn exit(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.exits.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Replays scripted face counts, then repeats `fallback`.
pub struct ScriptedDetector {
    script: Mutex<VecDeque<Result<usize>>>,
    fallback: Result<usize>,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new(script: impl IntoIterator<Item = Result<usize>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: Ok(1),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn repeating(result: Result<usize>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: result,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, result: Result<usize>) {
        lock(&self.script).push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PresenceDetector for ScriptedDetector {
    async fn count_faces(&self, _stream: &dyn MediaStream) -> Result<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

// ─── Speech ───────────────────────────────────────────────────────

/// Returns queued utterances in order. With nothing queued, `capture`
/// listens forever.
#[derive(Default)]
pub struct ScriptedRecognizer {
    queue: Mutex<VecDeque<Result<String>>>,
}

impl ScriptedRecognizer {
    pub fn new(script: impl IntoIterator<Item = Result<String>>) -> Self {
        Self {
            queue: Mutex::new(script.into_iter().collect()),
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn push(&self, result: Result<String>) {
        lock(&self.queue).push_back(result);
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn capture(&self) -> Result<String> {
        let next = lock(&self.queue).pop_front();
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

#[derive(Default)]
pub struct SilentSynthesizer {
    spoken: Mutex<Vec<String>>,
}

impl SilentSynthesizer {
    pub fn spoken(&self) -> Vec<String> {
        lock(&self.spoken).clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for SilentSynthesizer {
    async fn speak(&self, text: &str) {
        lock(&self.spoken).push(text.to_string());
    }
}

// ─── Page Events ──────────────────────────────────────────────────

#[derive(Default)]
pub struct PageEventBus {
    listeners: Mutex<Vec<mpsc::UnboundedSender<PageEvent>>>,
}

impl PageEventBus {
    pub fn emit(&self, event: PageEvent) {
        lock(&self.listeners).retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Live listeners; closed ones are pruned first.
    pub fn listener_count(&self) -> usize {
        let mut listeners = lock(&self.listeners);
        listeners.retain(|tx| !tx.is_closed());
        listeners.len()
    }
}

impl PageEvents for PageEventBus {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<PageEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.listeners).push(tx);
        rx
    }
}

// ─── Identity ─────────────────────────────────────────────────────

pub struct MemoryIdentity {
    accounts: Mutex<BTreeMap<String, (String, AuthUser)>>,
    current: watch::Sender<Option<AuthUser>>,
    next_uid: AtomicU64,
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self {
            accounts: Mutex::new(BTreeMap::new()),
            current: watch::channel(None).0,
            next_uid: AtomicU64::new(0),
        }
    }
}

impl MemoryIdentity {
    /// Register an account without signing in.
    pub fn register(&self, email: &str, password: &str, user: AuthUser) {
        lock(&self.accounts).insert(email.to_ascii_lowercase(), (password.to_string(), user));
    }

    /// Set the current user directly, bypassing credentials.
    pub fn set_current(&self, user: Option<AuthUser>) {
        self.current.send_replace(user);
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser> {
        let user = {
            let accounts = lock(&self.accounts);
            match accounts.get(&email.to_ascii_lowercase()) {
                Some((stored, user)) if stored == password => user.clone(),
                _ => {
                    return Err(ProctorError::AccessDenied(
                        "invalid email or password".into(),
                    ));
                }
            }
        };
        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<()> {
        self.current.send_replace(None);
        Ok(())
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthUser> {
        let key = email.to_ascii_lowercase();
        let mut accounts = lock(&self.accounts);
        if accounts.contains_key(&key) {
            return Err(ProctorError::InvalidInput(format!(
                "email already in use: {email}"
            )));
        }
        let uid = format!("uid-{:04}", self.next_uid.fetch_add(1, Ordering::Relaxed) + 1);
        let user = AuthUser {
            uid,
            email: email.to_string(),
            display_name: display_name.to_string(),
        };
        accounts.insert(key, (password.to_string(), user.clone()));
        Ok(user)
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.current.borrow().clone()
    }

    fn watch_user(&self) -> watch::Receiver<Option<AuthUser>> {
        self.current.subscribe()
    }
}

// ─── View Layer ───────────────────────────────────────────────────

#[derive(Default)]
pub struct RouteLog {
    routes: Mutex<Vec<Route>>,
}

impl RouteLog {
    pub fn routes(&self) -> Vec<Route> {
        lock(&self.routes).clone()
    }

    pub fn last(&self) -> Option<Route> {
        lock(&self.routes).last().cloned()
    }
}

impl Navigator for RouteLog {
    fn navigate(&self, route: Route) {
        tracing::debug!(path = %route.path(), "navigate");
        lock(&self.routes).push(route);
    }
}

#[derive(Default)]
pub struct NoticeLog {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    pub fn all(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }

    pub fn messages(&self) -> Vec<String> {
        lock(&self.notices).iter().map(|n| n.message.clone()).collect()
    }
}

impl Notifier for NoticeLog {
    fn notify(&self, notice: Notice) {
        lock(&self.notices).push(notice);
    }
}

// ─── Hosted Services ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PromptKind {
    Question,
    Viva,
    Summary,
    Resume,
}

impl PromptKind {
    fn classify(prompt: &str) -> Self {
        if prompt.contains("(viva)") {
            Self::Viva
        } else if prompt.starts_with("Write an interview report") {
            Self::Summary
        } else if prompt.contains("ATS-compatible resume") {
            Self::Resume
        } else {
            Self::Question
        }
    }
}

/// Text model with one canned reply per prompt kind.
pub struct CannedModel {
    replies: Mutex<BTreeMap<PromptKind, String>>,
    calls: Mutex<BTreeMap<PromptKind, usize>>,
    failing: AtomicBool,
    latency: Mutex<Duration>,
}

impl Default for CannedModel {
    fn default() -> Self {
        let replies = BTreeMap::from([
            (
                PromptKind::Question,
                "Problem Statement: Implement an LRU cache with get and put.\n\
                 Requirements: Both operations run in O(1).\n\
                 Constraints: Capacity is at least 1."
                    .to_string(),
            ),
            (
                PromptKind::Viva,
                r#"["What is ownership in Rust?","How does async differ from threads?","When would you use Arc over Rc?","Describe a bug you are proud of fixing.","How do you handle disagreement in code review?"]"#
                    .to_string(),
            ),
            (
                PromptKind::Summary,
                "Technical skills: solid.\nBehavior: focused.\nOverall recommendation: Recommend"
                    .to_string(),
            ),
            (
                PromptKind::Resume,
                "PROFESSIONAL SUMMARY\nBackend engineer with systems experience.".to_string(),
            ),
        ]);
        Self {
            replies: Mutex::new(replies),
            calls: Mutex::new(BTreeMap::new()),
            failing: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
        }
    }
}

impl CannedModel {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every reply, to widen race windows.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    pub fn set_question_reply(&self, reply: &str) {
        lock(&self.replies).insert(PromptKind::Question, reply.to_string());
    }

    pub fn set_viva_reply(&self, reply: &str) {
        lock(&self.replies).insert(PromptKind::Viva, reply.to_string());
    }

    fn calls_of(&self, kind: PromptKind) -> usize {
        lock(&self.calls).get(&kind).copied().unwrap_or(0)
    }

    pub fn question_calls(&self) -> usize {
        self.calls_of(PromptKind::Question)
    }

    pub fn viva_calls(&self) -> usize {
        self.calls_of(PromptKind::Viva)
    }

    pub fn summary_calls(&self) -> usize {
        self.calls_of(PromptKind::Summary)
    }

    pub fn resume_calls(&self) -> usize {
        self.calls_of(PromptKind::Resume)
    }
}

#[async_trait]
impl TextModel for CannedModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let kind = PromptKind::classify(prompt);
        *lock(&self.calls).entry(kind).or_default() += 1;

        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProctorError::GenerationFailure("model unavailable".into()));
        }
        Ok(lock(&self.replies).get(&kind).cloned().unwrap_or_default())
    }
}

/// Echoes the source back as stdout.
#[derive(Default)]
pub struct CannedRunner;

#[async_trait]
impl CodeRunner for CannedRunner {
    async fn run(&self, source: &str, _language: Language) -> Result<ExecutionOutput> {
        Ok(ExecutionOutput {
            stdout: source.to_string(),
            stderr: String::new(),
        })
    }
}

// ─── Environment ──────────────────────────────────────────────────

/// One of each simulated collaborator, wired into [`Services`].
pub struct SimEnvironment {
    pub store: Arc<MemoryStore>,
    pub media: Arc<SimMedia>,
    pub fullscreen: Arc<SimFullscreen>,
    pub detector: Arc<ScriptedDetector>,
    pub recognizer: Arc<ScriptedRecognizer>,
    pub synthesizer: Arc<SilentSynthesizer>,
    pub page: Arc<PageEventBus>,
    pub identity: Arc<MemoryIdentity>,
    pub model: Arc<CannedModel>,
    pub runner: Arc<CannedRunner>,
    pub routes: Arc<RouteLog>,
    pub notices: Arc<NoticeLog>,
    pub clock: Arc<TokioClock>,
}

impl SimEnvironment {
    /// Must be called inside a tokio runtime: the clock anchors to tokio time.
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::default()),
            media: Arc::new(SimMedia::default()),
            fullscreen: Arc::new(SimFullscreen::default()),
            detector: Arc::new(ScriptedDetector::repeating(Ok(1))),
            recognizer: Arc::new(ScriptedRecognizer::silent()),
            synthesizer: Arc::new(SilentSynthesizer::default()),
            page: Arc::new(PageEventBus::default()),
            identity: Arc::new(MemoryIdentity::default()),
            model: Arc::new(CannedModel::default()),
            runner: Arc::new(CannedRunner),
            routes: Arc::new(RouteLog::default()),
            notices: Arc::new(NoticeLog::default()),
            clock: Arc::new(TokioClock::new()),
        }
    }

    /// A signed-in candidate with one assigned, viva-enabled test.
    pub fn with_assignment(
        assignment_id: &str,
        test_id: &str,
        user_id: &str,
        duration_minutes: u64,
    ) -> Self {
        let env = Self::new();
        env.seed_assignment(assignment_id, test_id, user_id, duration_minutes);
        env.sign_in_as(user_id);
        env
    }

    pub fn services(&self) -> Services {
        Services {
            media: self.media.clone(),
            fullscreen: self.fullscreen.clone(),
            detector: self.detector.clone(),
            recognizer: self.recognizer.clone(),
            synthesizer: self.synthesizer.clone(),
            page_events: self.page.clone(),
            store: self.store.clone(),
            identity: self.identity.clone(),
            model: self.model.clone(),
            runner: self.runner.clone(),
            navigator: self.routes.clone(),
            notifier: self.notices.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn seed_assignment(
        &self,
        assignment_id: &str,
        test_id: &str,
        user_id: &str,
        duration_minutes: u64,
    ) {
        let now = self.clock.now();
        self.store.insert_user(UserRecord {
            uid: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            display_name: user_id.to_string(),
            role: UserRole::User,
            created_at: now,
        });
        self.store.insert_test(TestRecord {
            id: test_id.to_string(),
            title: "Backend Engineer Assessment".into(),
            role: "Backend Engineer".into(),
            topics: BTreeSet::from(["rust".to_string(), "tokio".to_string()]),
            duration_minutes,
            viva_enabled: true,
            created_at: now,
        });
        self.store.insert_assignment(AssignmentRecord {
            id: assignment_id.to_string(),
            test_id: test_id.to_string(),
            user_id: user_id.to_string(),
            status: AssignmentStatus::Assigned,
            assigned_at: now,
            started_at: None,
            completed_at: None,
            code: String::new(),
            question: None,
        });
    }

    pub fn sign_in_as(&self, uid: &str) {
        self.identity.set_current(Some(AuthUser {
            uid: uid.to_string(),
            email: format!("{uid}@example.com"),
            display_name: uid.to_string(),
        }));
    }
}

impl Default for SimEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
