//! Bearer token authentication middleware
//!
//! Browsers cannot set headers on a WebSocket handshake, so upgrade requests may
//! carry the token as `?token=<token>` instead. Plain HTTP requests must use the
//! `Authorization: Bearer <token>` header.

use axum::{
    body::Body,
    extract::{Query, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Token presented by the client, if any
fn presented_token(request: &Request<Body>) -> Result<String, AuthError> {
    if let Some(value) = request.headers().get(header::AUTHORIZATION) {
        return value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)
            .ok_or(AuthError::InvalidFormat);
    }

    if is_websocket_upgrade(request.headers())
        && let Ok(Query(TokenQuery { token: Some(token) })) =
            Query::<TokenQuery>::try_from_uri(request.uri())
    {
        return Ok(token);
    }

    Err(AuthError::MissingToken)
}

/// Authentication middleware
pub async fn auth_middleware(
    State(expected_token): State<String>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = presented_token(&request)?;

    if token != expected_token {
        debug!("rejected request to {} with invalid token", request.uri().path());
        return Err(AuthError::InvalidToken);
    }

    Ok(next.run(request).await)
}

/// Authentication errors
#[derive(Debug, PartialEq)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "Missing Authorization header or ?token= on WebSocket upgrade",
            ),
            AuthError::InvalidFormat => (
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization format (expected: Bearer <token>)",
            ),
            AuthError::InvalidToken => (StatusCode::FORBIDDEN, "Invalid token"),
        };

        (status, message).into_response()
    }
}
