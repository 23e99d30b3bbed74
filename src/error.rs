// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::ledger::LedgerError;
use crate::storage::ChainStoreError;

/// User-facing message for both peer outcomes.
pub const PEER_VALIDATION_FAILED: &str = "Block validation failed";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    pub code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::ValidationInput(message) => Self::bad_request(message),
            LedgerError::NotFound(message) => Self::not_found(format!("{message} not found")),
            LedgerError::UnsupportedMediaType(media_type) => Self::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                format!("Unsupported media type {media_type}"),
            ),
            LedgerError::PeerRejected(reason) => {
                tracing::warn!(reason, "Returning peer rejection");
                Self::new(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "peer_rejected",
                    PEER_VALIDATION_FAILED,
                )
            }
            LedgerError::PeerUnreachable(reason) => {
                tracing::warn!(reason, "Returning peer failure");
                Self::new(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "peer_unreachable",
                    PEER_VALIDATION_FAILED,
                )
            }
            LedgerError::Storage(e) => {
                tracing::error!(error = %e, "Blob storage failure");
                Self::new(StatusCode::BAD_GATEWAY, "storage_error", "Blob storage failed")
            }
            LedgerError::Store(ChainStoreError::HeightConflict { chain, .. }) => Self::new(
                StatusCode::CONFLICT,
                "height_conflict",
                format!("Chain {chain} advanced concurrently, retry the request"),
            ),
            LedgerError::Store(e) => {
                tracing::error!(error = %e, "Chain store failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "store_error",
                    "Chain store failed",
                )
            }
            LedgerError::Crypto(e) => {
                tracing::error!(error = %e, "Crypto failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "crypto_error",
                    "Stored file could not be decrypted",
                )
            }
            LedgerError::Serialization(e) => {
                tracing::error!(error = %e, "Serialization failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "serialization_error",
                    "Internal error",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            success: false,
            message: self.message,
            code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::StorageError;
    use crate::crypto::CryptoError;
    use crate::models::ChainId;
    use axum::body::to_bytes;

    #[test]
    fn ledger_errors_map_to_statuses() {
        let cases = [
            (LedgerError::ValidationInput("x".into()), StatusCode::BAD_REQUEST),
            (LedgerError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                LedgerError::UnsupportedMediaType("image/png".into()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                LedgerError::Storage(StorageError::NotFound("x".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (LedgerError::Crypto(CryptoError::Decrypt), StatusCode::INTERNAL_SERVER_ERROR),
            (
                LedgerError::Store(ChainStoreError::HeightConflict {
                    chain: ChainId::BlockPdf,
                    height: 3,
                    head_height: 3,
                }),
                StatusCode::CONFLICT,
            ),
            (
                LedgerError::Store(ChainStoreError::Poisoned),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn peer_outcomes_share_message_but_not_code() {
        let rejected = ApiError::from(LedgerError::PeerRejected("stale".into()));
        let unreachable = ApiError::from(LedgerError::PeerUnreachable("timeout".into()));

        assert_eq!(rejected.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(unreachable.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(rejected.message, PEER_VALIDATION_FAILED);
        assert_eq!(unreachable.message, PEER_VALIDATION_FAILED);
        assert_ne!(rejected.code, unreachable.code);
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(
            body,
            r#"{"success":false,"message":"bad data","code":"invalid_input"}"#
        );
    }
}
