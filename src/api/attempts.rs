use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::attempt::engine::AttemptPhase;
use crate::attempt::session::{AttemptSession, SubmitOutcome};
use crate::attempt::AttemptError;
use crate::core::state::AppState;
use crate::schemas::attempt::{
    session_response, AnswerSelect, AttemptSessionResponse, JumpTo, PersistedAttemptResponse,
    SubmitResponse,
};


pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/tests/:test_id/attempt", post(start_attempt))
        .route("/tests/:test_id/result", get(get_result))
        .route("/attempts/:attempt_id", get(get_attempt).delete(close_attempt))
        .route("/attempts/:attempt_id/answer", post(select_answer))
        .route("/attempts/:attempt_id/next", post(next_question))
        .route("/attempts/:attempt_id/previous", post(previous_question))
        .route("/attempts/:attempt_id/jump", post(jump_to_question))
        .route("/attempts/:attempt_id/submit", post(submit_attempt))
}

async fn start_attempt(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> Result<(StatusCode, Json<AttemptSessionResponse>), ApiError> {
    let (session, created) = state
        .registry()
        .open(
            &test_id,
            &user.id,
            state.tests(),
            state.attempts(),
            state.settings().attempt(),
        )
        .await?;

    let view = session.view().await;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(session_response(&session, view))))
}

async fn get_attempt(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<Json<AttemptSessionResponse>, ApiError> {
    let session = owned_session(&state, &attempt_id, &user.id).await?;
    let view = session.view().await;
    Ok(Json(session_response(&session, view)))
}

async fn close_attempt(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    owned_session(&state, &attempt_id, &user.id).await?;
    state.registry().close(&attempt_id).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn select_answer(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
    Json(payload): Json<AnswerSelect>,
) -> Result<Json<AttemptSessionResponse>, ApiError> {
    payload
        .validate()
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let session = owned_session(&state, &attempt_id, &user.id).await?;
    let view = session.select_answer(&payload.question_id, &payload.option).await?;
    Ok(Json(session_response(&session, view)))
}

async fn next_question(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<Json<AttemptSessionResponse>, ApiError> {
    let session = owned_session(&state, &attempt_id, &user.id).await?;
    let view = session.next().await;
    Ok(Json(session_response(&session, view)))
}

async fn previous_question(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<Json<AttemptSessionResponse>, ApiError> {
    let session = owned_session(&state, &attempt_id, &user.id).await?;
    let view = session.previous().await;
    Ok(Json(session_response(&session, view)))
}

async fn jump_to_question(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
    Json(payload): Json<JumpTo>,
) -> Result<Json<AttemptSessionResponse>, ApiError> {
    let session = owned_session(&state, &attempt_id, &user.id).await?;

    if payload.index < 0 {
        return Err(AttemptError::IndexOutOfRange {
            index: payload.index,
            count: session.questions().len(),
        }
        .into());
    }
    let view = session.jump_to(payload.index as usize).await?;
    Ok(Json(session_response(&session, view)))
}

async fn submit_attempt(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let session = owned_session(&state, &attempt_id, &user.id).await?;

    match session.submit().await {
        SubmitOutcome::Submitted(record) => Ok((
            StatusCode::OK,
            Json(SubmitResponse {
                status: AttemptPhase::Submitted,
                attempt: Some(PersistedAttemptResponse::from(record)),
                detail: None,
            }),
        )),
        SubmitOutcome::AlreadyInFlight => Ok((
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                status: AttemptPhase::Submitting,
                attempt: None,
                detail: Some("Submission already in progress".to_string()),
            }),
        )),
        SubmitOutcome::AlreadySubmitted => {
            let record = state
                .attempts()
                .find_submitted(&session.test().id, session.user_id())
                .await
                .map_err(|err| ApiError::internal(err, "Failed to fetch submitted attempt"))?;
            Ok((
                StatusCode::OK,
                Json(SubmitResponse {
                    status: AttemptPhase::Submitted,
                    attempt: record.map(PersistedAttemptResponse::from),
                    detail: None,
                }),
            ))
        }
        SubmitOutcome::Failed(detail) => Err(ApiError::ServiceUnavailable(detail)),
    }
}

async fn get_result(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> Result<Json<PersistedAttemptResponse>, ApiError> {
    let record = state
        .attempts()
        .find_submitted(&test_id, &user.id)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to fetch submitted attempt"))?
        .ok_or_else(|| ApiError::NotFound(format!("No submitted attempt for test {test_id}")))?;

    Ok(Json(PersistedAttemptResponse::from(record)))
}

async fn owned_session(
    state: &AppState,
    attempt_id: &str,
    user_id: &str,
) -> Result<Arc<AttemptSession>, ApiError> {
    let session = state
        .registry()
        .get(attempt_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Attempt {attempt_id} not found")))?;

    if session.user_id() != user_id {
        return Err(ApiError::Forbidden("Access denied"));
    }

    Ok(session)
}
