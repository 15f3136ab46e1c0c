//! In-memory store double for tests: seedable test/question bank, recorded
//! draft and submission writes, and injectable failures/latency.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::types::Json;

use crate::db::models::{PersistedAttempt, Question, TestDefinition};
use crate::store::{AttemptDraft, AttemptStore, AttemptSubmission, StoreError, TestStore};

#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    tests: HashMap<String, TestDefinition>,
    questions: HashMap<String, Vec<Question>>,
    attempts: HashMap<(String, String), PersistedAttempt>,
    fail_drafts: bool,
    fail_submissions: bool,
    submit_delay: Option<Duration>,
    draft_calls: u32,
    submission_calls: u32,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_test(&self, test: TestDefinition, questions: Vec<Question>) {
        let mut inner = self.inner.lock().expect("memory store lock");
        inner.questions.insert(test.id.clone(), questions);
        inner.tests.insert(test.id.clone(), test);
    }

    pub(crate) fn set_fail_drafts(&self, fail: bool) {
        self.inner.lock().expect("memory store lock").fail_drafts = fail;
    }

    pub(crate) fn set_fail_submissions(&self, fail: bool) {
        self.inner.lock().expect("memory store lock").fail_submissions = fail;
    }

    pub(crate) fn set_submit_delay(&self, delay: Duration) {
        self.inner.lock().expect("memory store lock").submit_delay = Some(delay);
    }

    pub(crate) fn draft_calls(&self) -> u32 {
        self.inner.lock().expect("memory store lock").draft_calls
    }

    pub(crate) fn submission_calls(&self) -> u32 {
        self.inner.lock().expect("memory store lock").submission_calls
    }

    pub(crate) fn attempt(&self, test_id: &str, user_id: &str) -> Option<PersistedAttempt> {
        self.inner
            .lock()
            .expect("memory store lock")
            .attempts
            .get(&(test_id.to_string(), user_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl TestStore for MemoryStore {
    async fn fetch_test(&self, test_id: &str) -> Result<Option<TestDefinition>, StoreError> {
        Ok(self.inner.lock().expect("memory store lock").tests.get(test_id).cloned())
    }

    async fn fetch_questions(&self, test_id: &str) -> Result<Vec<Question>, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("memory store lock")
            .questions
            .get(test_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn save_draft(&self, draft: AttemptDraft<'_>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("memory store lock");
        inner.draft_calls += 1;
        if inner.fail_drafts {
            return Err(StoreError::Unavailable("draft channel down".to_string()));
        }

        let key = (draft.test_id.to_string(), draft.user_id.to_string());
        let answers: BTreeMap<String, String> = draft.answers.clone();
        let row = inner.attempts.entry(key).or_insert_with(|| PersistedAttempt {
            test_id: draft.test_id.to_string(),
            user_id: draft.user_id.to_string(),
            answers: Json(BTreeMap::new()),
            submitted_at: None,
            last_auto_save: None,
        });
        row.answers = Json(answers);
        row.last_auto_save = Some(draft.saved_at);
        Ok(())
    }

    async fn upsert_submission(
        &self,
        submission: AttemptSubmission<'_>,
    ) -> Result<PersistedAttempt, StoreError> {
        let delay = {
            let mut inner = self.inner.lock().expect("memory store lock");
            inner.submission_calls += 1;
            inner.submit_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().expect("memory store lock");
        if inner.fail_submissions {
            return Err(StoreError::Unavailable("submission backend down".to_string()));
        }

        let key = (submission.test_id.to_string(), submission.user_id.to_string());
        let row = PersistedAttempt {
            test_id: submission.test_id.to_string(),
            user_id: submission.user_id.to_string(),
            answers: Json(submission.answers.clone()),
            submitted_at: Some(submission.submitted_at),
            last_auto_save: inner.attempts.get(&key).and_then(|row| row.last_auto_save),
        };
        inner.attempts.insert(key, row.clone());
        Ok(row)
    }

    async fn find_submitted(
        &self,
        test_id: &str,
        user_id: &str,
    ) -> Result<Option<PersistedAttempt>, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("memory store lock")
            .attempts
            .get(&(test_id.to_string(), user_id.to_string()))
            .filter(|row| row.submitted_at.is_some())
            .cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
