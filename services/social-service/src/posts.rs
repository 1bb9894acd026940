use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sc_api_types::{
    CreateMediaPostRequest, CreatePostRequest, EditPostRequest, FeedPageResponse, MediaPostResponse, TipPostRequest,
    TipTotalResponse, TxOutcome,
};
use sc_contract::MediaAttachment;
use sc_contract::units::{format_eth_amount, format_ether};
use sc_pinning::media_ref;
use sc_session::{POSTS_PER_PAGE, paginate, validate_post_content};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::AppState;
use crate::error::{ApiResult, ErrorResponse, bad_request, session_error};

#[derive(Debug, Deserialize)]
pub(crate) struct FeedQuery {
    page: Option<usize>,
}

pub(crate) async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> ApiResult<FeedPageResponse> {
    let page = query.page.unwrap_or(1).max(1);
    let feed = state.session.load_feed().await.map_err(session_error)?;
    let (posts, total_pages) = paginate(&feed, page, POSTS_PER_PAGE);

    Ok(Json(FeedPageResponse {
        posts,
        page,
        total_pages,
    }))
}

pub(crate) async fn create_post(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePostRequest>,
) -> ApiResult<TxOutcome> {
    let media = request
        .media_hash
        .filter(|hash| !hash.trim().is_empty())
        .map(|hash| MediaAttachment {
            hash,
            media_type: request.media_type.unwrap_or_default(),
        });

    let outcome = state
        .session
        .create_post(&request.content, media)
        .await
        .map_err(session_error)?;
    Ok(Json(outcome))
}

/// Pin the uploaded file, then create a post that references it.
pub(crate) async fn create_media_post(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateMediaPostRequest>,
) -> ApiResult<MediaPostResponse> {
    validate_post_content(&request.content).map_err(|err| session_error(err.into()))?;
    if request.file_name.trim().is_empty() {
        return Err(bad_request("file_name is required"));
    }
    if !state.pinning.is_configured() {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "media uploads are disabled; PINATA_JWT is not set".to_owned(),
            }),
        ));
    }

    let bytes = STANDARD
        .decode(request.data.as_bytes())
        .map_err(|_| bad_request("data must be valid base64"))?;
    if bytes.is_empty() {
        return Err(bad_request("data cannot be empty"));
    }

    let pinned = state
        .pinning
        .pin_file(&request.file_name, &request.content_type, bytes)
        .await
        .map_err(|err| {
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: format!("{err:#}"),
                }),
            )
        })?;
    info!(cid = %pinned.cid, "media pinned");

    let attachment = MediaAttachment {
        hash: pinned.cid.clone(),
        media_type: request.content_type.clone(),
    };
    let transaction = state
        .session
        .create_post(&request.content, Some(attachment))
        .await
        .map_err(session_error)?;

    Ok(Json(MediaPostResponse {
        media: media_ref(state.pinning.gateway_url(), &pinned.cid, &request.content_type),
        transaction,
    }))
}

pub(crate) async fn edit_post(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
    Json(request): Json<EditPostRequest>,
) -> ApiResult<TxOutcome> {
    let outcome = state
        .session
        .edit_post(&post_id, &request.content)
        .await
        .map_err(session_error)?;
    Ok(Json(outcome))
}

pub(crate) async fn tip_post(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
    Json(request): Json<TipPostRequest>,
) -> ApiResult<TxOutcome> {
    let outcome = state
        .session
        .tip_post(&post_id, &request.amount)
        .await
        .map_err(session_error)?;
    Ok(Json(outcome))
}

pub(crate) async fn post_tips(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
) -> ApiResult<TipTotalResponse> {
    let total = state
        .session
        .get_post_tips(&post_id)
        .await
        .map_err(session_error)?;
    let total = format_ether(total);

    Ok(Json(TipTotalResponse {
        formatted: format_eth_amount(&total),
        total,
    }))
}
