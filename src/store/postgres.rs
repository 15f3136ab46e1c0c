use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::{PersistedAttempt, Question, TestDefinition};
use crate::store::{AttemptDraft, AttemptStore, AttemptSubmission, StoreError, TestStore};

const ATTEMPT_COLUMNS: &str = "test_id, user_id, answers, submitted_at, last_auto_save";

pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TestStore for PgStore {
    async fn fetch_test(&self, test_id: &str) -> Result<Option<TestDefinition>, StoreError> {
        sqlx::query_as::<_, TestDefinition>(
            "SELECT id, title, duration_minutes FROM tests WHERE id = $1",
        )
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn fetch_questions(&self, test_id: &str) -> Result<Vec<Question>, StoreError> {
        sqlx::query_as::<_, Question>(
            "SELECT id, test_id, prompt, options FROM questions \
             WHERE test_id = $1 ORDER BY order_index, id",
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn save_draft(&self, draft: AttemptDraft<'_>) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO test_attempts \
                 (test_id, user_id, answers, last_auto_save, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4, $4) \
             ON CONFLICT (test_id, user_id) DO UPDATE SET \
                 answers = EXCLUDED.answers, \
                 last_auto_save = EXCLUDED.last_auto_save, \
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(draft.test_id)
        .bind(draft.user_id)
        .bind(Json(draft.answers))
        .bind(draft.saved_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_submission(
        &self,
        submission: AttemptSubmission<'_>,
    ) -> Result<PersistedAttempt, StoreError> {
        // Last write wins on the natural key; a retried or concurrent submit
        // overwrites rather than duplicates.
        sqlx::query_as::<_, PersistedAttempt>(&format!(
            "INSERT INTO test_attempts \
                 (test_id, user_id, answers, submitted_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4, $4) \
             ON CONFLICT (test_id, user_id) DO UPDATE SET \
                 answers = EXCLUDED.answers, \
                 submitted_at = EXCLUDED.submitted_at, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(submission.test_id)
        .bind(submission.user_id)
        .bind(Json(submission.answers))
        .bind(submission.submitted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn find_submitted(
        &self,
        test_id: &str,
        user_id: &str,
    ) -> Result<Option<PersistedAttempt>, StoreError> {
        sqlx::query_as::<_, PersistedAttempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM test_attempts \
             WHERE test_id = $1 AND user_id = $2 AND submitted_at IS NOT NULL"
        ))
        .bind(test_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
