use std::sync::Arc;

use async_graphql::ErrorExtensions;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Message shown to clients in place of anything considered sensitive.
pub const GENERIC_MESSAGE: &str = "Something went wrong";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Upstream error: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Error shared by every caller of a batched load.
    #[error("{0}")]
    Batch(Arc<AppError>),
}

impl From<Arc<AppError>> for AppError {
    fn from(err: Arc<AppError>) -> Self {
        AppError::Batch(err)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Batch(inner) => inner.status(),
            AppError::Internal(_)
            | AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Token(_)
            | AppError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code used in GraphQL error extensions.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => "UNAUTHENTICATED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_USER_INPUT",
            AppError::Batch(inner) => inner.code(),
            _ => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Errors whose text describes server internals and must never reach a client.
    pub fn is_internal(&self) -> bool {
        match self {
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Token(_)
            | AppError::Json(_)
            | AppError::Upstream(_) => true,
            AppError::Batch(inner) => inner.is_internal(),
            _ => false,
        }
    }
}

/// Decides which error messages are safe to show to clients.
///
/// Internal error kinds are always masked. Any other message is masked when it
/// contains one of the configured patterns (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct ErrorMasking {
    patterns: Vec<String>,
}

impl ErrorMasking {
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_sensitive(&self, err: &AppError) -> bool {
        err.is_internal() || self.matches(&err.to_string())
    }

    pub fn matches(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.patterns.iter().any(|p| message.contains(p.as_str()))
    }

    pub fn body(&self, err: &AppError) -> ErrorBody {
        if self.is_sensitive(err) {
            ErrorBody::new(err.status(), GENERIC_MESSAGE)
        } else {
            ErrorBody::new(err.status(), err.to_string())
        }
    }

    /// Mask a raw message produced outside of `AppError` (rejections, fallbacks).
    pub fn message_body(&self, status: StatusCode, message: &str) -> ErrorBody {
        if self.matches(message) {
            ErrorBody::new(status, GENERIC_MESSAGE)
        } else {
            ErrorBody::new(status, message.trim())
        }
    }
}

/// JSON body of every non-GraphQL error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status_code: status.as_u16(),
            message: if message.is_empty() {
                GENERIC_MESSAGE.to_string()
            } else {
                message
            },
        }
    }

    pub fn generic() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_MESSAGE)
    }
}

impl IntoResponse for ErrorBody {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// The original error, carried on the response so the error middleware can
/// re-mask it with the configured rules.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub Arc<AppError>);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = ErrorMasking::default().body(&self).into_response();
        response
            .extensions_mut()
            .insert(ErrorDetail(Arc::new(self)));
        response
    }
}

impl ErrorExtensions for AppError {
    fn extend(&self) -> async_graphql::Error {
        let message = if self.is_internal() {
            tracing::error!(error = %self, "Resolver failed");
            GENERIC_MESSAGE.to_string()
        } else {
            self.to_string()
        };
        let code = self.code().to_string();
        async_graphql::Error::new(message).extend_with(move |_, e| e.set("code", code))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn response_body(response: Response) -> ErrorBody {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            AppError::Unauthenticated("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn batch_errors_delegate_to_inner() {
        let err = AppError::from(Arc::new(AppError::Forbidden("nope".into())));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "FORBIDDEN");
        assert_eq!(err.to_string(), "nope");

        let err = AppError::from(Arc::new(AppError::Database(
            rusqlite::Error::QueryReturnedNoRows,
        )));
        assert!(err.is_internal());
    }

    #[test]
    fn internal_kinds_are_masked() {
        let masking = ErrorMasking::default();
        let body = masking.body(&AppError::Database(rusqlite::Error::QueryReturnedNoRows));
        assert_eq!(body.status_code, 500);
        assert_eq!(body.message, GENERIC_MESSAGE);
    }

    #[test]
    fn unflagged_internal_message_passes_through() {
        let masking = ErrorMasking::default();
        let body = masking.body(&AppError::Internal("boom".into()));
        assert_eq!(body.status_code, 500);
        assert_eq!(body.message, "boom");
    }

    #[test]
    fn configured_patterns_mask_messages() {
        let masking = ErrorMasking::new(&["Password".to_string(), "  ".to_string()]);
        let body = masking.body(&AppError::Internal("bad password for db".into()));
        assert_eq!(body.message, GENERIC_MESSAGE);

        let body = masking.body(&AppError::BadRequest("missing field".into()));
        assert_eq!(body.message, "missing field");
    }

    #[test]
    fn empty_message_becomes_generic() {
        let body = ErrorBody::new(StatusCode::BAD_REQUEST, "");
        assert_eq!(body.message, GENERIC_MESSAGE);
    }

    #[tokio::test]
    async fn into_response_writes_status_code_and_message() {
        let response = AppError::NotFound("Post not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorDetail>().is_some());

        let body = response_body(response).await;
        assert_eq!(
            body,
            ErrorBody {
                status_code: 404,
                message: "Post not found".into()
            }
        );
    }

    #[test]
    fn graphql_extension_carries_code() {
        let err = AppError::Forbidden("Not allowed to do that".into()).extend();
        assert_eq!(err.message, "Not allowed to do that");
        let code = err
            .extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .cloned();
        assert_eq!(
            code,
            Some(async_graphql::Value::String("FORBIDDEN".to_string()))
        );
    }

    #[test]
    fn graphql_extension_masks_internal_errors() {
        let err = AppError::Database(rusqlite::Error::InvalidQuery).extend();
        assert_eq!(err.message, GENERIC_MESSAGE);
    }
}
