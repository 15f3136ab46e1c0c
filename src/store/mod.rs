#[cfg(test)]
pub(crate) mod memory;
pub(crate) mod postgres;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{PersistedAttempt, Question, TestDefinition};

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Best-effort snapshot of in-progress answers. Each draft supersedes the
/// previous one; there is no draft backlog.
pub(crate) struct AttemptDraft<'a> {
    pub(crate) test_id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) answers: &'a BTreeMap<String, String>,
    pub(crate) saved_at: PrimitiveDateTime,
}

pub(crate) struct AttemptSubmission<'a> {
    pub(crate) test_id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) answers: &'a BTreeMap<String, String>,
    pub(crate) submitted_at: PrimitiveDateTime,
}

/// Read side of the test/question bank consumed by attempt sessions.
#[async_trait]
pub(crate) trait TestStore: Send + Sync {
    async fn fetch_test(&self, test_id: &str) -> Result<Option<TestDefinition>, StoreError>;

    /// Questions in their fixed presentation order.
    async fn fetch_questions(&self, test_id: &str) -> Result<Vec<Question>, StoreError>;
}

/// Persistence for drafts and final submissions. Uniqueness on
/// `(test_id, user_id)` is enforced here, not by callers: the upsert is what
/// makes retried or concurrent submissions collapse to one effective record.
#[async_trait]
pub(crate) trait AttemptStore: Send + Sync {
    async fn save_draft(&self, draft: AttemptDraft<'_>) -> Result<(), StoreError>;

    async fn upsert_submission(
        &self,
        submission: AttemptSubmission<'_>,
    ) -> Result<PersistedAttempt, StoreError>;

    async fn find_submitted(
        &self,
        test_id: &str,
        user_id: &str,
    ) -> Result<Option<PersistedAttempt>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
