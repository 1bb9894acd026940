use axum::{Json, extract::State};
use sc_api_types::{PlatformStats, TipTotalResponse, TipsSummary, TxOutcome};
use sc_contract::units::{format_eth_amount, format_ether};
use std::sync::Arc;

use crate::AppState;
use crate::error::{ApiResult, session_error};

pub(crate) async fn available_tips(State(state): State<Arc<AppState>>) -> ApiResult<TipsSummary> {
    let summary = state
        .session
        .get_available_tips()
        .await
        .map_err(session_error)?;
    Ok(Json(summary))
}

pub(crate) async fn total_tips(State(state): State<Arc<AppState>>) -> ApiResult<TipTotalResponse> {
    let total = state.session.get_user_tips().await.map_err(session_error)?;
    let total = format_ether(total);

    Ok(Json(TipTotalResponse {
        formatted: format_eth_amount(&total),
        total,
    }))
}

pub(crate) async fn withdraw(State(state): State<Arc<AppState>>) -> ApiResult<TxOutcome> {
    let outcome = state.session.withdraw_tips().await.map_err(session_error)?;
    Ok(Json(outcome))
}

pub(crate) async fn platform_stats(State(state): State<Arc<AppState>>) -> ApiResult<PlatformStats> {
    let stats = state.session.platform_stats().await.map_err(session_error)?;
    Ok(Json(stats))
}
