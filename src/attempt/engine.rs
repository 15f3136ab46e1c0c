//! Pure state machine for one attempt: answers, cursor, countdown and the
//! submission gate. No I/O and no timers live here; the session runtime in
//! `session.rs` drives it, which keeps every transition directly testable.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::attempt::AttemptError;
use crate::db::models::Question;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum AttemptPhase {
    Active,
    Submitting,
    Submitted,
    Failed,
}

/// Outcome of one countdown second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tick {
    Running,
    /// The clock hit zero; the caller must submit through the normal path.
    Expired,
    /// The attempt is no longer active; the countdown should stop.
    Idle,
}

/// Outcome of asking to submit. `Proceed` hands out the answer snapshot that
/// must be written; everything else is a no-op for the caller.
#[derive(Debug)]
pub(crate) enum SubmissionGate {
    Proceed(BTreeMap<String, String>),
    InFlight,
    AlreadySubmitted,
}

/// Read-only projection published to observers after every transition.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AttemptView {
    pub(crate) phase: AttemptPhase,
    pub(crate) remaining_seconds: u64,
    pub(crate) current_question_index: usize,
    pub(crate) answers: BTreeMap<String, String>,
}

pub(crate) struct AttemptEngine {
    questions: Arc<Vec<Question>>,
    answers: BTreeMap<String, String>,
    current_index: usize,
    remaining_seconds: u64,
    phase: AttemptPhase,
}

/// Tests without a positive duration fall back to the configured default.
pub(crate) fn initial_remaining_seconds(duration_minutes: Option<i32>, default_minutes: u64) -> u64 {
    match duration_minutes {
        Some(minutes) if minutes > 0 => minutes as u64 * 60,
        _ => default_minutes * 60,
    }
}

impl AttemptEngine {
    pub(crate) fn new(questions: Arc<Vec<Question>>, initial_seconds: u64) -> Self {
        Self {
            questions,
            answers: BTreeMap::new(),
            current_index: 0,
            remaining_seconds: initial_seconds,
            phase: AttemptPhase::Active,
        }
    }

    pub(crate) fn phase(&self) -> AttemptPhase {
        self.phase
    }

    pub(crate) fn answers_snapshot(&self) -> BTreeMap<String, String> {
        self.answers.clone()
    }

    pub(crate) fn view(&self) -> AttemptView {
        AttemptView {
            phase: self.phase,
            remaining_seconds: self.remaining_seconds,
            current_question_index: self.current_index,
            answers: self.answers.clone(),
        }
    }

    /// Re-selecting overwrites; keys are never removed once set.
    pub(crate) fn select_answer(
        &mut self,
        question_id: &str,
        option: &str,
    ) -> Result<(), AttemptError> {
        if self.phase != AttemptPhase::Active {
            return Err(AttemptError::NotActive);
        }

        let question = self
            .questions
            .iter()
            .find(|question| question.id == question_id)
            .ok_or_else(|| AttemptError::UnknownQuestion(question_id.to_string()))?;

        if !question.options.0.iter().any(|declared| declared == option) {
            return Err(AttemptError::InvalidOption(question_id.to_string()));
        }

        self.answers.insert(question_id.to_string(), option.to_string());
        Ok(())
    }

    /// No-op at the last question.
    pub(crate) fn next(&mut self) {
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
        }
    }

    /// No-op at the first question.
    pub(crate) fn previous(&mut self) {
        self.current_index = self.current_index.saturating_sub(1);
    }

    pub(crate) fn jump_to(&mut self, index: usize) -> Result<(), AttemptError> {
        if index >= self.questions.len() {
            return Err(AttemptError::IndexOutOfRange {
                index: index as i64,
                count: self.questions.len(),
            });
        }
        self.current_index = index;
        Ok(())
    }

    pub(crate) fn tick(&mut self) -> Tick {
        if self.phase != AttemptPhase::Active {
            return Tick::Idle;
        }
        if self.remaining_seconds == 0 {
            return Tick::Expired;
        }

        self.remaining_seconds -= 1;
        if self.remaining_seconds == 0 {
            Tick::Expired
        } else {
            Tick::Running
        }
    }

    /// Mutual-exclusion guard for submission: whichever caller (user click or
    /// countdown expiry) arrives first proceeds; later callers observe the
    /// in-flight or terminal state. `Failed` re-enters for retry.
    pub(crate) fn begin_submission(&mut self) -> SubmissionGate {
        match self.phase {
            AttemptPhase::Active | AttemptPhase::Failed => {
                self.phase = AttemptPhase::Submitting;
                SubmissionGate::Proceed(self.answers.clone())
            }
            AttemptPhase::Submitting => SubmissionGate::InFlight,
            AttemptPhase::Submitted => SubmissionGate::AlreadySubmitted,
        }
    }

    pub(crate) fn complete_submission(&mut self) {
        self.phase = AttemptPhase::Submitted;
    }

    pub(crate) fn fail_submission(&mut self) {
        self.phase = AttemptPhase::Failed;
    }
}
