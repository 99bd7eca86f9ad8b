use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ChatHubError, Result};
use crate::storage::{TokenRevocationList, UserId};

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Username
    pub username: String,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Issued at (as UTC timestamp)
    pub iat: usize,
    /// Not before (as UTC timestamp)
    pub nbf: usize,
    /// Token id, used for revocation
    pub jti: String,
}

impl Claims {
    /// Creates claims for a user valid for `ttl`
    pub fn new(user_id: UserId, username: String, ttl: Duration) -> Self {
        let now = Utc::now().timestamp().max(0) as usize;

        Self {
            sub: user_id.to_string(),
            username,
            exp: now + ttl.as_secs() as usize,
            iat: now,
            nbf: now,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        let now = Utc::now().timestamp().max(0) as usize;
        now > self.exp
    }

    /// Numeric user id carried in `sub`
    pub fn user_id(&self) -> Result<UserId> {
        self.sub
            .parse()
            .map_err(|_| ChatHubError::AuthError("Invalid user ID in token".to_string()))
    }
}

/// Manages JWT token operations
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    revocations: Arc<TokenRevocationList>,
}

impl TokenManager {
    /// Creates a new token manager with a secret
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            revocations: Arc::new(TokenRevocationList::new()),
        }
    }

    pub fn revocation_list(&self) -> Arc<TokenRevocationList> {
        Arc::clone(&self.revocations)
    }

    /// Generates a JWT token for the given claims
    pub fn generate_token(&self, claims: &Claims) -> Result<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| ChatHubError::AuthError(format!("Failed to generate token: {}", e)))
    }

    /// Validates signature and expiry of a JWT token
    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| ChatHubError::AuthError(format!("Invalid token: {}", e)))
    }

    /// Extracts claims from a token string, rejecting revoked tokens
    pub async fn get_claims(&self, token: &str) -> Result<Claims> {
        let claims = self.validate_token(token)?.claims;

        if self.revocations.is_revoked(&claims.jti).await {
            return Err(ChatHubError::AuthError(
                "Token has been invalidated, please login again".to_string(),
            ));
        }

        Ok(claims)
    }

    /// Validates a token and returns the user ID if valid
    pub async fn validate_and_get_user_id(&self, token: &str) -> Result<UserId> {
        let claims = self.get_claims(token).await?;

        if claims.is_expired() {
            return Err(ChatHubError::AuthError("Token expired".to_string()));
        }

        claims.user_id()
    }

    /// Revoke a token until it would have expired on its own
    pub async fn revoke(&self, claims: &Claims) {
        let expires_at = Utc
            .timestamp_opt(claims.exp as i64, 0)
            .single()
            .unwrap_or_else(Utc::now);
        self.revocations.revoke(&claims.jti, expires_at).await;
    }
}

/// Extracts bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<String> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
