//! Authentication helpers for WebSocket upgrades and protected routes

use std::sync::Arc;
use warp::http::HeaderMap;
use warp::{Filter, Rejection};

use crate::auth::token::{extract_bearer_token, Claims, TokenManager};
use crate::error::{ChatHubError, Result};
use crate::storage::UserId;

const SUBPROTOCOL_PREFIX: &str = "bearer.";
const MAX_TOKEN_LENGTH: usize = 1000;

/// Where a WebSocket token was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    AuthorizationHeader,
    /// The full protocol entry, which must be echoed back in the upgrade response
    Subprotocol(String),
    CustomHeader,
}

/// Extract JWT token from WebSocket subprotocol header
///
/// Format: `bearer.{jwt_token}`, possibly among other offered protocols.
pub fn extract_token_from_subprotocol(headers: &HeaderMap) -> Option<(String, String)> {
    let protocol_str = headers.get("sec-websocket-protocol")?.to_str().ok()?;

    protocol_str
        .split(',')
        .map(str::trim)
        .find_map(|protocol| {
            protocol
                .strip_prefix(SUBPROTOCOL_PREFIX)
                .filter(|token| !token.is_empty())
                .map(|token| (token.to_string(), protocol.to_string()))
        })
}

/// Token extraction from headers only; tokens in URLs are never accepted
pub fn extract_token(headers: &HeaderMap) -> Option<(String, TokenSource)> {
    // Priority 1: Authorization header
    if let Some(token) = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
    {
        log::debug!("Token extracted from Authorization header");
        return Some((token, TokenSource::AuthorizationHeader));
    }

    // Priority 2: WebSocket subprotocol
    if let Some((token, protocol)) = extract_token_from_subprotocol(headers) {
        log::debug!("Token extracted from WebSocket subprotocol");
        return Some((token, TokenSource::Subprotocol(protocol)));
    }

    // Priority 3: custom header
    if let Some(token) = headers
        .get("x-auth-token")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
    {
        log::debug!("Token extracted from X-Auth-Token header");
        return Some((token.to_string(), TokenSource::CustomHeader));
    }

    log::debug!("No token found in any supported header");
    None
}

/// Authenticate a WebSocket upgrade request
///
/// Returns the user id and, when the token came from a subprotocol, the
/// protocol to accept.
pub async fn authenticate_connection(
    headers: &HeaderMap,
    tokens: &TokenManager,
) -> Result<(UserId, Option<String>)> {
    let (token, source) = extract_token(headers).ok_or_else(|| {
        log::warn!("WebSocket connection rejected: authentication required");
        ChatHubError::Unauthorized
    })?;

    if token.len() > MAX_TOKEN_LENGTH || token.chars().any(|c| c.is_control()) {
        return Err(ChatHubError::AuthError("Malformed token".to_string()));
    }

    let user_id = tokens.validate_and_get_user_id(&token).await?;

    let protocol = match source {
        TokenSource::Subprotocol(protocol) => Some(protocol),
        _ => None,
    };
    Ok((user_id, protocol))
}

/// Filter yielding the claims of a valid `Authorization: Bearer` token
pub fn with_claims(
    tokens: Arc<TokenManager>,
) -> impl Filter<Extract = (Claims,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let tokens = Arc::clone(&tokens);
        async move {
            let token = header
                .as_deref()
                .and_then(extract_bearer_token)
                .ok_or_else(|| warp::reject::custom(ChatHubError::Unauthorized))?;

            tokens
                .get_claims(&token)
                .await
                .map_err(warp::reject::custom)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::Claims;
    use std::time::Duration;
    use warp::http::HeaderValue;

    const SECRET: &str = "handler-test-secret-0123456789-abcdefgh";

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_authorization_header_wins() {
        let map = headers(&[
            ("authorization", "Bearer from-header"),
            ("sec-websocket-protocol", "bearer.from-protocol"),
            ("x-auth-token", "from-custom"),
        ]);
        assert_eq!(
            extract_token(&map),
            Some(("from-header".to_string(), TokenSource::AuthorizationHeader))
        );
    }

    #[test]
    fn test_subprotocol_among_others() {
        let map = headers(&[("sec-websocket-protocol", "chat, bearer.abc.def.ghi")]);
        assert_eq!(
            extract_token(&map),
            Some((
                "abc.def.ghi".to_string(),
                TokenSource::Subprotocol("bearer.abc.def.ghi".to_string())
            ))
        );
    }

    #[test]
    fn test_custom_header_fallback_and_missing() {
        let map = headers(&[("x-auth-token", "custom")]);
        assert_eq!(
            extract_token(&map),
            Some(("custom".to_string(), TokenSource::CustomHeader))
        );
        assert_eq!(extract_token(&HeaderMap::new()), None);
        assert_eq!(extract_token(&headers(&[("authorization", "Basic abc")])), None);
    }

    #[tokio::test]
    async fn test_authenticate_connection() {
        let tokens = TokenManager::new(SECRET);
        let claims = Claims::new(7, "alice".to_string(), Duration::from_secs(60));
        let token = tokens.generate_token(&claims).unwrap();

        let (user_id, protocol) = authenticate_connection(
            &headers(&[("sec-websocket-protocol", &format!("bearer.{}", token))]),
            &tokens,
        )
        .await
        .unwrap();
        assert_eq!(user_id, 7);
        assert_eq!(protocol, Some(format!("bearer.{}", token)));

        let missing = authenticate_connection(&HeaderMap::new(), &tokens).await;
        assert!(matches!(missing, Err(ChatHubError::Unauthorized)));

        let bogus = authenticate_connection(&headers(&[("x-auth-token", "nope")]), &tokens).await;
        assert!(matches!(bogus, Err(ChatHubError::AuthError(_))));
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected() {
        let tokens = TokenManager::new(SECRET);
        let claims = Claims::new(7, "alice".to_string(), Duration::from_secs(60));
        let token = tokens.generate_token(&claims).unwrap();
        tokens.revoke(&claims).await;

        let result =
            authenticate_connection(&headers(&[("x-auth-token", &token)]), &tokens).await;
        assert!(result.is_err());
    }
}
