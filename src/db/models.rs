use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

/// Test metadata as shown to a student entering an attempt. Immutable for the
/// lifetime of a session once the attempt has started.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub(crate) struct TestDefinition {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) duration_minutes: Option<i32>,
}

/// A single choice question. Grading fields never travel with this type; an
/// attempt only ever sees the prompt and the declared options.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) prompt: String,
    pub(crate) options: Json<Vec<String>>,
}

/// One row of `test_attempts`, keyed on `(test_id, user_id)`. A row with
/// `submitted_at` unset is an autosaved draft.
#[derive(Debug, Clone, FromRow, Serialize)]
pub(crate) struct PersistedAttempt {
    pub(crate) test_id: String,
    pub(crate) user_id: String,
    pub(crate) answers: Json<BTreeMap<String, String>>,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) last_auto_save: Option<PrimitiveDateTime>,
}
