//! Caller extraction
//!
//! The session token is read from `Authorization: Bearer <token>`, or from a
//! `?token=` query parameter for EventSource clients that cannot set headers.
//! A missing or unknown token yields an anonymous caller; each operation
//! decides which role it requires.

use axum::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use serde::Deserialize;

use crate::engine::Caller;
use crate::error::Error;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
struct TokenQuery {
    #[serde(default)]
    token: Option<String>,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Session token carried by a request, if any
pub fn request_token(parts: &Parts) -> Option<String> {
    bearer_token(&parts.headers).or_else(|| {
        Query::<TokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.token)
            .filter(|t| !t.is_empty())
    })
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = request_token(parts);
        state.engine.authorize(token.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn test_bearer_header() {
        let p = parts(
            Request::builder()
                .uri("/queue")
                .header(AUTHORIZATION, "Bearer abc-123")
                .body(())
                .unwrap(),
        );
        assert_eq!(request_token(&p).as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_query_token() {
        let p = parts(Request::builder().uri("/events?token=xyz").body(()).unwrap());
        assert_eq!(request_token(&p).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_header_wins_over_query() {
        let p = parts(
            Request::builder()
                .uri("/events?token=from-query")
                .header(AUTHORIZATION, "Bearer from-header")
                .body(())
                .unwrap(),
        );
        assert_eq!(request_token(&p).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_no_token() {
        let p = parts(
            Request::builder()
                .uri("/queue?other=1")
                .header(AUTHORIZATION, "Basic Zm9vOmJhcg==")
                .body(())
                .unwrap(),
        );
        assert!(request_token(&p).is_none());
    }
}
