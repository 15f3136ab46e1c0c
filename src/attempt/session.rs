//! Session runtime: owns the engine behind a mutex, runs the one-second
//! countdown and the periodic autosave as cooperative tasks, and drives
//! submission through the attempt store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::{interval_at, Instant};
use uuid::Uuid;

use crate::attempt::engine::{
    initial_remaining_seconds, AttemptEngine, AttemptPhase, AttemptView, SubmissionGate, Tick,
};
use crate::attempt::AttemptError;
use crate::core::config::AttemptSettings;
use crate::core::time::primitive_now_utc;
use crate::db::models::{PersistedAttempt, Question, TestDefinition};
use crate::store::{AttemptDraft, AttemptStore, AttemptSubmission, TestStore};

#[derive(Debug)]
pub(crate) enum SubmitOutcome {
    Submitted(PersistedAttempt),
    /// Another submission is in flight; this call was a no-op.
    AlreadyInFlight,
    AlreadySubmitted,
    /// The write failed; the session is back in `Failed` and may retry.
    Failed(String),
}

pub(crate) struct AttemptSession {
    id: String,
    test: TestDefinition,
    questions: Arc<Vec<Question>>,
    user_id: String,
    engine: Mutex<AttemptEngine>,
    attempts: Arc<dyn AttemptStore>,
    view_tx: watch::Sender<AttemptView>,
    cancel_tx: watch::Sender<bool>,
    // Set when a submission write fails, cleared on retry; read by the
    // registry sweep to age out abandoned `Failed` sessions.
    failed_since: std::sync::Mutex<Option<Instant>>,
}

impl AttemptSession {
    /// Loads test metadata and the ordered question set, then starts the
    /// countdown and autosave schedules. Fails without side effects when the
    /// caller has no identity or the test is missing/empty.
    pub(crate) async fn start(
        test_id: &str,
        user_id: &str,
        tests: &Arc<dyn TestStore>,
        attempts: Arc<dyn AttemptStore>,
        settings: &AttemptSettings,
    ) -> Result<Arc<Self>, AttemptError> {
        if user_id.trim().is_empty() {
            return Err(AttemptError::NotAuthenticated);
        }

        let test = tests
            .fetch_test(test_id)
            .await
            .map_err(AttemptError::Load)?
            .ok_or_else(|| AttemptError::TestNotFound(test_id.to_string()))?;
        let questions = tests.fetch_questions(test_id).await.map_err(AttemptError::Load)?;
        if questions.is_empty() {
            return Err(AttemptError::TestNotFound(test_id.to_string()));
        }

        let questions = Arc::new(questions);
        let initial_seconds =
            initial_remaining_seconds(test.duration_minutes, settings.default_duration_minutes);
        let engine = AttemptEngine::new(Arc::clone(&questions), initial_seconds);

        let (view_tx, _) = watch::channel(engine.view());
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let session = Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            test,
            questions,
            user_id: user_id.to_string(),
            engine: Mutex::new(engine),
            attempts,
            view_tx,
            cancel_tx,
            failed_since: std::sync::Mutex::new(None),
        });

        tokio::spawn(countdown_loop(Arc::clone(&session), cancel_rx.clone()));
        tokio::spawn(autosave_loop(
            Arc::clone(&session),
            settings.autosave_interval_seconds,
            cancel_rx,
        ));

        tracing::info!(
            session_id = %session.id,
            test_id = %session.test.id,
            user_id = %session.user_id,
            remaining_seconds = initial_seconds,
            "attempt session started"
        );

        Ok(session)
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn test(&self) -> &TestDefinition {
        &self.test
    }

    pub(crate) fn questions(&self) -> &Arc<Vec<Question>> {
        &self.questions
    }

    pub(crate) fn user_id(&self) -> &str {
        &self.user_id
    }

    pub(crate) async fn phase(&self) -> AttemptPhase {
        self.engine.lock().await.phase()
    }

    pub(crate) async fn view(&self) -> AttemptView {
        self.engine.lock().await.view()
    }

    /// How long this session has been sitting in `Failed`, if it is.
    pub(crate) fn failed_for(&self) -> Option<Duration> {
        let since = match self.failed_since.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        since.map(|instant| instant.elapsed())
    }

    fn set_failed_since(&self, value: Option<Instant>) {
        let mut slot = match self.failed_since.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = value;
    }

    /// Observer channel; a fresh view is published after every transition.
    pub(crate) fn subscribe(&self) -> watch::Receiver<AttemptView> {
        self.view_tx.subscribe()
    }

    pub(crate) async fn select_answer(
        &self,
        question_id: &str,
        option: &str,
    ) -> Result<AttemptView, AttemptError> {
        let mut engine = self.engine.lock().await;
        engine.select_answer(question_id, option)?;
        let view = engine.view();
        drop(engine);
        self.view_tx.send_replace(view.clone());
        Ok(view)
    }

    pub(crate) async fn next(&self) -> AttemptView {
        let mut engine = self.engine.lock().await;
        engine.next();
        let view = engine.view();
        drop(engine);
        self.view_tx.send_replace(view.clone());
        view
    }

    pub(crate) async fn previous(&self) -> AttemptView {
        let mut engine = self.engine.lock().await;
        engine.previous();
        let view = engine.view();
        drop(engine);
        self.view_tx.send_replace(view.clone());
        view
    }

    pub(crate) async fn jump_to(&self, index: usize) -> Result<AttemptView, AttemptError> {
        let mut engine = self.engine.lock().await;
        engine.jump_to(index)?;
        let view = engine.view();
        drop(engine);
        self.view_tx.send_replace(view.clone());
        Ok(view)
    }

    /// Single submission path for both the user action and countdown expiry.
    /// The first caller through the gate stops the schedules and issues the
    /// upsert; later callers observe `Submitting`/`Submitted` and return.
    pub(crate) async fn submit(self: &Arc<Self>) -> SubmitOutcome {
        let answers = {
            let mut engine = self.engine.lock().await;
            match engine.begin_submission() {
                SubmissionGate::Proceed(answers) => {
                    self.view_tx.send_replace(engine.view());
                    answers
                }
                SubmissionGate::InFlight => return SubmitOutcome::AlreadyInFlight,
                SubmissionGate::AlreadySubmitted => return SubmitOutcome::AlreadySubmitted,
            }
        };

        self.cancel_schedules();
        self.set_failed_since(None);

        // The write runs on its own task: once issued it must run to
        // completion and its result must land in the session state, even if
        // the caller that awaited it has gone away.
        let session = Arc::clone(self);
        let write = tokio::spawn(async move {
            let submission = AttemptSubmission {
                test_id: &session.test.id,
                user_id: &session.user_id,
                answers: &answers,
                submitted_at: primitive_now_utc(),
            };
            let result = session.attempts.upsert_submission(submission).await;

            let mut engine = session.engine.lock().await;
            match result {
                Ok(record) => {
                    engine.complete_submission();
                    session.view_tx.send_replace(engine.view());
                    tracing::info!(
                        session_id = %session.id,
                        test_id = %session.test.id,
                        "attempt submitted"
                    );
                    SubmitOutcome::Submitted(record)
                }
                Err(err) => {
                    engine.fail_submission();
                    session.set_failed_since(Some(Instant::now()));
                    session.view_tx.send_replace(engine.view());
                    tracing::error!(
                        session_id = %session.id,
                        test_id = %session.test.id,
                        error = %err,
                        "attempt submission failed"
                    );
                    SubmitOutcome::Failed(err.to_string())
                }
            }
        });

        match write.await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(session_id = %self.id, error = %err, "submission task join failed");
                SubmitOutcome::Failed("submission task failed".to_string())
            }
        }
    }

    /// Teardown contract: both schedules are cancelled and no further
    /// callbacks fire. Safe to call from any state, any number of times.
    pub(crate) fn shutdown(&self) {
        self.cancel_schedules();
    }

    fn cancel_schedules(&self) {
        self.cancel_tx.send_replace(true);
    }
}

async fn countdown_loop(session: Arc<AttemptSession>, mut cancel: watch::Receiver<bool>) {
    let period = Duration::from_secs(1);
    let mut tick = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = cancel.changed() => break,
            _ = tick.tick() => {
                let outcome = {
                    let mut engine = session.engine.lock().await;
                    let outcome = engine.tick();
                    session.view_tx.send_replace(engine.view());
                    outcome
                };
                match outcome {
                    Tick::Running => {}
                    Tick::Idle => break,
                    Tick::Expired => {
                        tracing::info!(session_id = %session.id, "time expired; submitting attempt");
                        if let SubmitOutcome::Failed(err) = session.submit().await {
                            tracing::error!(
                                session_id = %session.id,
                                error = %err,
                                "expiry-triggered submission failed"
                            );
                        }
                        break;
                    }
                }
            }
        }
    }
}

async fn autosave_loop(
    session: Arc<AttemptSession>,
    interval_seconds: u64,
    mut cancel: watch::Receiver<bool>,
) {
    let period = Duration::from_secs(interval_seconds.max(1));
    let mut tick = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = cancel.changed() => break,
            _ = tick.tick() => {
                let snapshot = {
                    let engine = session.engine.lock().await;
                    if engine.phase() != AttemptPhase::Active {
                        break;
                    }
                    engine.answers_snapshot()
                };

                let draft = AttemptDraft {
                    test_id: &session.test.id,
                    user_id: &session.user_id,
                    answers: &snapshot,
                    saved_at: primitive_now_utc(),
                };
                if let Err(err) = session.attempts.save_draft(draft).await {
                    // Best effort: the next tick retries with the latest state.
                    tracing::warn!(
                        session_id = %session.id,
                        error = %err,
                        "draft autosave failed"
                    );
                }
            }
        }
    }
}
