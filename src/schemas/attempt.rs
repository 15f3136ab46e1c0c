use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::attempt::engine::{AttemptPhase, AttemptView};
use crate::attempt::session::AttemptSession;
use crate::core::time::format_primitive;
use crate::db::models::PersistedAttempt;

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) prompt: String,
    pub(crate) options: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptSessionResponse {
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) test_title: String,
    pub(crate) user_id: String,
    pub(crate) status: AttemptPhase,
    pub(crate) remaining_seconds: u64,
    pub(crate) current_question_index: usize,
    pub(crate) answers: BTreeMap<String, String>,
    pub(crate) questions: Vec<QuestionResponse>,
}

pub(crate) fn session_response(session: &AttemptSession, view: AttemptView) -> AttemptSessionResponse {
    AttemptSessionResponse {
        attempt_id: session.id().to_string(),
        test_id: session.test().id.clone(),
        test_title: session.test().title.clone(),
        user_id: session.user_id().to_string(),
        status: view.phase,
        remaining_seconds: view.remaining_seconds,
        current_question_index: view.current_question_index,
        answers: view.answers,
        questions: session
            .questions()
            .iter()
            .map(|question| QuestionResponse {
                id: question.id.clone(),
                prompt: question.prompt.clone(),
                options: question.options.0.clone(),
            })
            .collect(),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerSelect {
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[validate(length(min = 1, message = "option must not be empty"))]
    pub(crate) option: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JumpTo {
    pub(crate) index: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct PersistedAttemptResponse {
    pub(crate) test_id: String,
    pub(crate) user_id: String,
    pub(crate) answers: BTreeMap<String, String>,
    pub(crate) submitted_at: Option<String>,
    pub(crate) last_auto_save: Option<String>,
}

impl From<PersistedAttempt> for PersistedAttemptResponse {
    fn from(record: PersistedAttempt) -> Self {
        Self {
            test_id: record.test_id,
            user_id: record.user_id,
            answers: record.answers.0,
            submitted_at: record.submitted_at.map(format_primitive),
            last_auto_save: record.last_auto_save.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitResponse {
    pub(crate) status: AttemptPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) attempt: Option<PersistedAttemptResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) detail: Option<String>,
}
