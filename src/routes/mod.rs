//! HTTP routes for Scriptorium
//!
//! Each module dispatches on method and path segments and calls into the
//! services. The role table is consulted here against the token's role;
//! the services check the stored role again.

pub mod bookmarks;
pub mod health;
pub mod participants;
pub mod reviews;
pub mod works;

pub use bookmarks::handle_bookmarks_request;
pub use health::{health_check, version_info};
pub use participants::handle_participants_request;
pub use reviews::handle_reviews_request;
pub use works::handle_works_request;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::{extract_token_from_header, Claims};
use crate::server::AppState;
use crate::types::{LibraryError, Result};

pub type FullBody = Full<Bytes>;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    match serde_json::to_string(body) {
        Ok(json) => Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(Full::new(Bytes::from(json)))
            .unwrap_or_else(|_| internal_error_response()),
        Err(e) => {
            warn!("Failed to serialize response: {}", e);
            internal_error_response()
        }
    }
}

fn internal_error_response() -> Response<FullBody> {
    let mut response = Response::new(Full::new(Bytes::from_static(
        br#"{"error":"Failed to build response","code":"INTERNAL_ERROR"}"#,
    )));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

pub(crate) fn error_response(status: StatusCode, error: &str, code: &'static str) -> Response<FullBody> {
    json_response(
        status,
        &ErrorResponse {
            error: error.to_string(),
            code,
        },
    )
}

/// Map a library error onto its HTTP status and JSON body
pub(crate) fn library_error_response(err: LibraryError) -> Response<FullBody> {
    let code = err.code();
    if err.is_upstream() {
        warn!("Request failed upstream: {}", err);
    } else {
        debug!("Request rejected: {}", err);
    }
    let (status, message) = err.into_status_code_and_body();
    error_response(status, &message, code)
}

/// Serialize a service result, mapping errors
pub(crate) fn respond<T: Serialize>(status: StatusCode, result: Result<T>) -> Response<FullBody> {
    match result {
        Ok(body) => json_response(status, &body),
        Err(err) => library_error_response(err),
    }
}

pub(crate) fn not_found_response(path: &str) -> Response<FullBody> {
    error_response(
        StatusCode::NOT_FOUND,
        &format!("No route for {path}"),
        "NOT_FOUND",
    )
}

/// Read and parse a JSON request body
pub(crate) async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T> {
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| LibraryError::BadRequest(format!("Invalid body: {e}")))?
        .to_bytes();
    Ok(serde_json::from_slice(&body)?)
}

/// Percent-decoded path segment
pub(crate) fn decode_segment(segment: &str) -> Result<String> {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .map_err(|e| LibraryError::BadRequest(format!("Invalid path segment: {e}")))
}

/// Path split into its non-empty segments
pub(crate) fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

// =============================================================================
// Auth Helpers
// =============================================================================

fn bearer_claims(req: &Request<Incoming>, state: &AppState) -> Option<Result<Claims>> {
    let header = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = extract_token_from_header(header)?;
    Some(state.jwt.verify_token(token).into_claims())
}

/// Caller of a gated operation. Fails with Unauthorized without a valid
/// token and Forbidden when the token's role is below the table's minimum.
pub(crate) fn require_caller(
    req: &Request<Incoming>,
    state: &AppState,
    operation: &str,
) -> Result<Claims> {
    let claims = bearer_claims(req, state)
        .unwrap_or_else(|| Err(LibraryError::Unauthorized("No token provided".into())))?;

    if !state.gate.is_allowed(operation, Some(claims.role)) {
        return Err(LibraryError::Forbidden(format!(
            "{} requires role {}",
            operation,
            state
                .gate
                .required_role(operation)
                .map(|r| r.to_string())
                .unwrap_or_default()
        )));
    }
    Ok(claims)
}

/// Caller of a public operation: None when anonymous. A token that is
/// present but invalid is still rejected.
pub(crate) fn optional_caller(req: &Request<Incoming>, state: &AppState) -> Result<Option<Claims>> {
    bearer_claims(req, state).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_segments_skip_empty_parts() {
        assert_eq!(segments("/works/search/a,b/"), vec!["works", "search", "a,b"]);
        assert!(segments("/").is_empty());
    }

    #[test]
    fn test_decode_segment() {
        assert_eq!(decode_segment("monofin%20drag").unwrap(), "monofin drag");
    }

    #[tokio::test]
    async fn test_library_error_maps_to_status_and_code() {
        let response = library_error_response(LibraryError::NoReviews("work w".into()));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "NO_REVIEWS");

        let response = library_error_response(LibraryError::InsufficientFunds("low".into()));
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }
}
