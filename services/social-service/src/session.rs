use axum::{
    Json,
    extract::{Query, State},
};
use sc_api_types::{RouteDecisionResponse, SessionSnapshot};
use sc_session::route::{RouteDecision, guard_route};
use serde::Deserialize;
use std::sync::Arc;

use crate::AppState;
use crate::error::{ApiResult, bad_request, session_error};

#[derive(Debug, Deserialize)]
pub(crate) struct RouteQuery {
    path: String,
}

pub(crate) async fn session_snapshot(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot().await)
}

pub(crate) async fn session_connect(State(state): State<Arc<AppState>>) -> ApiResult<SessionSnapshot> {
    let snapshot = state.session.connect().await.map_err(session_error)?;
    Ok(Json(snapshot))
}

pub(crate) async fn session_restore(State(state): State<Arc<AppState>>) -> ApiResult<SessionSnapshot> {
    let snapshot = state.session.restore().await.map_err(session_error)?;
    Ok(Json(snapshot))
}

pub(crate) async fn session_disconnect(State(state): State<Arc<AppState>>) -> ApiResult<SessionSnapshot> {
    state.session.disconnect().await.map_err(session_error)?;
    Ok(Json(state.session.snapshot().await))
}

/// Where the UI should send a visitor for `path`, based on the connection marker.
pub(crate) async fn session_route(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RouteQuery>,
) -> ApiResult<RouteDecisionResponse> {
    if !query.path.starts_with('/') {
        return Err(bad_request("path must start with '/'"));
    }

    let has_marker = state
        .session
        .has_connection_marker()
        .await
        .map_err(session_error)?;
    let redirect_to = match guard_route(&query.path, has_marker) {
        RouteDecision::Allow => None,
        RouteDecision::Redirect(target) => Some(target.to_owned()),
    };

    Ok(Json(RouteDecisionResponse {
        path: query.path,
        allowed: redirect_to.is_none(),
        redirect_to,
    }))
}
