use std::time::Duration;
use warp::http::{HeaderMap, HeaderValue};

use chat_hub::auth::token::{Claims, TokenManager};
use chat_hub::auth::{hash_password, verify_password};
use chat_hub::error::ChatHubError;
use chat_hub::handlers::auth::authenticate_connection;

const SECRET: &str = "integration-secret-4f8a-9c2d-7e1b-3a6f";

fn headers(name: &'static str, value: &str) -> HeaderMap {
    let mut map = HeaderMap::new();
    map.insert(name, HeaderValue::from_str(value).unwrap());
    map
}

#[test]
fn test_jwt_token_creation_and_validation() {
    let token_manager = TokenManager::new(SECRET);

    let claims = Claims::new(42, "testuser".to_string(), Duration::from_secs(3600));
    let token = token_manager.generate_token(&claims).unwrap();
    assert!(!token.is_empty());

    let validated = token_manager.validate_token(&token).unwrap();
    assert_eq!(validated.claims.sub, "42");
    assert_eq!(validated.claims.username, "testuser");
    assert_eq!(validated.claims.jti, claims.jti);
}

#[test]
fn test_invalid_token_validation() {
    let token_manager = TokenManager::new(SECRET);
    assert!(token_manager.validate_token("invalid.token.here").is_err());
}

#[test]
fn test_expired_token() {
    let token_manager = TokenManager::new(SECRET);

    let mut claims = Claims::new(42, "testuser".to_string(), Duration::from_secs(3600));
    claims.exp = claims.iat - 3600;
    claims.nbf = claims.exp - 3600;
    assert!(claims.is_expired());

    let token = token_manager.generate_token(&claims).unwrap();
    assert!(token_manager.validate_token(&token).is_err());
}

#[tokio::test]
async fn test_authenticate_connection_from_each_header() {
    let token_manager = TokenManager::new(SECRET);
    let claims = Claims::new(42, "testuser".to_string(), Duration::from_secs(3600));
    let token = token_manager.generate_token(&claims).unwrap();

    let bearer = headers("authorization", &format!("Bearer {}", token));
    assert_eq!(
        authenticate_connection(&bearer, &token_manager).await.unwrap(),
        (42, None)
    );

    let protocol = format!("bearer.{}", token);
    let subprotocol = headers("sec-websocket-protocol", &protocol);
    assert_eq!(
        authenticate_connection(&subprotocol, &token_manager).await.unwrap(),
        (42, Some(protocol))
    );

    let custom = headers("x-auth-token", &token);
    assert_eq!(
        authenticate_connection(&custom, &token_manager).await.unwrap(),
        (42, None)
    );
}

#[tokio::test]
async fn test_authenticate_connection_without_token() {
    let token_manager = TokenManager::new(SECRET);

    let result = authenticate_connection(&HeaderMap::new(), &token_manager).await;
    assert!(matches!(result, Err(ChatHubError::Unauthorized)));

    // Control characters never reach the JWT decoder
    let result = authenticate_connection(&headers("x-auth-token", "abc\tdef"), &token_manager).await;
    assert!(matches!(result, Err(ChatHubError::AuthError(_))));
}

#[test]
fn test_password_hashing() {
    let hash = hash_password("correct horse battery").unwrap();
    assert_ne!(hash, "correct horse battery");
    assert!(verify_password("correct horse battery", &hash));
    assert!(!verify_password("wrong", &hash));
}
