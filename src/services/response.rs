//! HTTP response building helpers

use bytes::Bytes;
use http_body_util::Full;
use hyper::{header, Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::error::RecordsError;

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

/// Build a JSON response with 200 OK status
pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

/// Build a JSON response with 201 Created status
pub fn created<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::CREATED, body)
}

/// `{"message": ...}` with 200 OK
pub fn message(text: &str) -> Response<Full<Bytes>> {
    ok(&serde_json::json!({ "message": text }))
}

/// Build a 404 Not Found response with message
pub fn not_found(message: &str) -> Response<Full<Bytes>> {
    json_response(StatusCode::NOT_FOUND, &serde_json::json!({ "error": message }))
}

/// Convert a RecordsError to an HTTP response.
///
/// Client errors carry their message. Server errors carry a generic message
/// when `expose_details` is false (production).
pub fn error_response(error: RecordsError, expose_details: bool) -> Response<Full<Bytes>> {
    let status = match &error {
        RecordsError::InvalidInput(_) | RecordsError::Json(_) => StatusCode::BAD_REQUEST,
        RecordsError::Auth(_) => StatusCode::UNAUTHORIZED,
        RecordsError::Forbidden(_) => StatusCode::FORBIDDEN,
        RecordsError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = match error {
        RecordsError::InvalidInput(msg)
        | RecordsError::Auth(msg)
        | RecordsError::Forbidden(msg)
        | RecordsError::NotFound(msg) => serde_json::json!({ "error": msg }),
        RecordsError::Json(e) => serde_json::json!({ "error": format!("Invalid JSON body: {}", e) }),
        other => {
            error!(error = %other, "Request failed");
            let detail = if expose_details {
                other.to_string()
            } else {
                "An internal error occurred".to_string()
            };
            serde_json::json!({ "error": "Internal server error", "message": detail })
        }
    };

    json_response(status, &body)
}

/// Result type alias for handlers
pub type HandlerResult = Result<Response<Full<Bytes>>, RecordsError>;
