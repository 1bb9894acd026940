use axum::{Json, http::StatusCode};
use sc_session::SessionError;
use sc_wallet::WalletError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

pub(crate) type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

pub(crate) fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

pub(crate) fn session_error(err: SessionError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        SessionError::NotConnected
        | SessionError::NotRegistered
        | SessionError::AlreadyRegistered
        | SessionError::UsernameTaken(_)
        | SessionError::Wallet(WalletError::ValidationError(_)) => StatusCode::BAD_REQUEST,
        SessionError::Wallet(WalletError::UserRejected) => StatusCode::FORBIDDEN,
        SessionError::Wallet(WalletError::WalletUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::Wallet(WalletError::CallReverted { .. }) => StatusCode::CONFLICT,
        SessionError::Wallet(WalletError::NetworkError(_)) => StatusCode::BAD_GATEWAY,
        SessionError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let status = |err: SessionError| session_error(err).0;
        assert_eq!(status(SessionError::NotRegistered), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(WalletError::validation("Post content cannot be empty").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(WalletError::UserRejected.into()), StatusCode::FORBIDDEN);
        assert_eq!(status(WalletError::WalletUnavailable.into()), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status(WalletError::reverted("Username already taken").into()), StatusCode::CONFLICT);
        assert_eq!(status(WalletError::network("connection refused").into()), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status(SessionError::Storage("disk full".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
