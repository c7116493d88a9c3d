use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;

use crate::error::{ErrorBody, ErrorDetail, ErrorMasking};

const MAX_BUFFERED_BODY_BYTES: usize = 64 * 1024;

/// Turns every failed request into a `{statusCode, message}` JSON body.
///
/// Handler errors are re-masked with the configured patterns, plain-text
/// rejections from extractors are wrapped, and panics become a generic 500.
/// Successful responses and JSON bodies pass through untouched.
pub async fn handle_errors(
    State(masking): State<ErrorMasking>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            tracing::error!(
                %method,
                %uri,
                panic = %panic_message(panic.as_ref()),
                "Handler panicked"
            );
            return ErrorBody::generic().into_response();
        }
    };

    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    if let Some(ErrorDetail(err)) = response.extensions().get::<ErrorDetail>().cloned() {
        let body = masking.body(&err);
        if status.is_server_error() {
            tracing::error!(%method, %uri, status = status.as_u16(), error = %err, "Request failed");
        } else {
            tracing::debug!(%method, %uri, status = status.as_u16(), error = %err, "Request rejected");
        }
        return body.into_response();
    }

    if is_json(response.headers()) {
        return response;
    }

    let body = match to_bytes(response.into_body(), MAX_BUFFERED_BODY_BYTES).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::warn!(error = %e, "Could not buffer error body");
            String::new()
        }
    };
    tracing::warn!(%method, %uri, status = status.as_u16(), message = %body, "Request rejected");
    masking.message_body(status, &body).into_response()
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
