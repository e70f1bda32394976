// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP mapping of [`LecternError`].

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lectern_core::LecternError;
use serde::Serialize;

/// Error body. Quota denials carry the budget fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<String>,
}

/// An error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: message.into(),
                remaining: None,
                limit: None,
                reset_at: None,
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Another turn is already running on the chat.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<LecternError> for ApiError {
    fn from(err: LecternError) -> Self {
        match err {
            LecternError::QuotaExceeded {
                remaining,
                limit,
                reset_at,
            } => Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                body: ErrorResponse {
                    error: "daily quota exceeded".into(),
                    remaining: Some(remaining),
                    limit: Some(limit),
                    reset_at: Some(reset_at),
                },
            },
            LecternError::Auth(_) => Self::new(StatusCode::UNAUTHORIZED, err.to_string()),
            LecternError::Forbidden { .. } => Self::new(StatusCode::FORBIDDEN, err.to_string()),
            LecternError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            LecternError::BadRequest(_) => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            LecternError::Catalog { .. } | LecternError::Provider { .. } => {
                Self::new(StatusCode::BAD_GATEWAY, err.to_string())
            }
            LecternError::Timeout { .. } => Self::new(StatusCode::GATEWAY_TIMEOUT, err.to_string()),
            other => {
                tracing::error!(error = %other, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_denial_carries_budget() {
        let err = ApiError::from(LecternError::QuotaExceeded {
            remaining: 0,
            limit: 5,
            reset_at: "2026-03-02T00:00:00.000Z".into(),
        });
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        let json = serde_json::to_value(&err.body).unwrap();
        assert_eq!(json["remaining"], 0);
        assert_eq!(json["limit"], 5);
        assert_eq!(json["resetAt"], "2026-03-02T00:00:00.000Z");
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (LecternError::Auth("k".into()), StatusCode::UNAUTHORIZED),
            (
                LecternError::Forbidden { reason: "b".into() },
                StatusCode::FORBIDDEN,
            ),
            (LecternError::NotFound("c".into()), StatusCode::NOT_FOUND),
            (LecternError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (LecternError::catalog("down"), StatusCode::BAD_GATEWAY),
            (LecternError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let err = ApiError::from(LecternError::Internal("db path /var/x".into()));
        assert_eq!(err.body.error, "internal server error");
        let json = serde_json::to_value(&err.body).unwrap();
        assert!(json.get("remaining").is_none());
    }
}
