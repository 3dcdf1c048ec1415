//! Bearer-token authentication against the shared secret.

use crate::server::AppState;
use crate::translate::types::ErrorResponse;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingHeader,
    MalformedHeader,
    InvalidToken,
}

impl AuthFailure {
    pub fn message(self) -> &'static str {
        match self {
            Self::MissingHeader => "Missing Authorization header",
            Self::MalformedHeader => "Authorization header must be of the form 'Bearer <token>'",
            Self::InvalidToken => "Invalid API key",
        }
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::authentication(self.message())),
        )
            .into_response()
    }
}

/// Check `headers` for `Authorization: Bearer <secret>`.
pub fn check_bearer(headers: &HeaderMap, secret: &str) -> Result<(), AuthFailure> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthFailure::MissingHeader)?;
    let value = value.to_str().map_err(|_| AuthFailure::MalformedHeader)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthFailure::MalformedHeader)?;

    if token.as_bytes().ct_eq(secret.as_bytes()).into() {
        Ok(())
    } else {
        Err(AuthFailure::InvalidToken)
    }
}

/// Middleware guarding every route it wraps.
pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    match check_bearer(request.headers(), &state.config.secret) {
        Ok(()) => next.run(request).await,
        Err(failure) => {
            let path = request.uri().path().to_string();
            tracing::warn!(path = %path, reason = failure.message(), "rejected request");
            state
                .journal
                .warn("auth", format!("Rejected {}: {}", path, failure.message()));
            failure.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(v) = auth {
            map.insert(header::AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_matching_token_accepted() {
        assert_eq!(check_bearer(&headers(Some("Bearer s3cret")), "s3cret"), Ok(()));
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            check_bearer(&headers(None), "s3cret"),
            Err(AuthFailure::MissingHeader)
        );
    }

    #[test]
    fn test_malformed_header() {
        assert_eq!(
            check_bearer(&headers(Some("s3cret")), "s3cret"),
            Err(AuthFailure::MalformedHeader)
        );
        assert_eq!(
            check_bearer(&headers(Some("Basic s3cret")), "s3cret"),
            Err(AuthFailure::MalformedHeader)
        );
    }

    #[test]
    fn test_token_must_match_exactly() {
        for token in ["Bearer s3cre", "Bearer s3cret ", "Bearer S3CRET", "Bearer "] {
            assert_eq!(
                check_bearer(&headers(Some(token)), "s3cret"),
                Err(AuthFailure::InvalidToken),
                "{token}"
            );
        }
    }
}
