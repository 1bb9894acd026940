use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use sc_api_types::{CurrentUserResponse, RegisterRequest, TxOutcome, UsernameAvailabilityResponse};
use serde::Deserialize;
use std::sync::Arc;

use crate::AppState;
use crate::error::{ApiResult, ErrorResponse, bad_request, session_error};

#[derive(Debug, Deserialize)]
pub(crate) struct UsernameQuery {
    username: String,
}

pub(crate) async fn username_available(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UsernameQuery>,
) -> ApiResult<UsernameAvailabilityResponse> {
    let available = state
        .session
        .is_username_available(&query.username)
        .await
        .map_err(session_error)?;

    Ok(Json(UsernameAvailabilityResponse {
        username: query.username,
        available,
    }))
}

pub(crate) async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<TxOutcome> {
    if request.username.trim().is_empty() {
        return Err(bad_request("username is required"));
    }

    let outcome = state
        .session
        .register(&request.username)
        .await
        .map_err(session_error)?;
    Ok(Json(outcome))
}

pub(crate) async fn current_user(State(state): State<Arc<AppState>>) -> ApiResult<CurrentUserResponse> {
    let username = state
        .session
        .current_username()
        .await
        .map_err(session_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "connected account is not registered".to_owned(),
                }),
            )
        })?;
    let account = state
        .session
        .account()
        .await
        .map(|account| account.to_string())
        .unwrap_or_default();

    Ok(Json(CurrentUserResponse { account, username }))
}
