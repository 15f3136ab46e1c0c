pub(crate) mod engine;
pub(crate) mod registry;
pub(crate) mod session;


use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub(crate) enum AttemptError {
    #[error("user identity is required to start an attempt")]
    NotAuthenticated,
    #[error("test {0} not found or has no questions")]
    TestNotFound(String),
    #[error("question index {index} is outside 0..{count}")]
    IndexOutOfRange { index: i64, count: usize },
    #[error("question {0} is not part of this test")]
    UnknownQuestion(String),
    #[error("option is not one of the declared options for question {0}")]
    InvalidOption(String),
    #[error("attempt is not active")]
    NotActive,
    #[error("failed to load attempt data")]
    Load(#[source] StoreError),
}
