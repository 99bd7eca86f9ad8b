//! Account endpoints: registration, login, logout and profile

use serde::{Deserialize, Serialize};
use serde_json::json;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::Claims;
use crate::constants::{MAX_REQUEST_BODY_BYTES, MIN_PASSWORD_LENGTH};
use crate::core::server::SharedChatServer;
use crate::error::{ChatHubError, Result};
use crate::handlers::auth::with_claims;
use crate::handlers::with_server;
use crate::storage::{UserId, UserRecord};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Public view of an account
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

impl From<&UserRecord> for AccountView {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username.clone(),
            email: record.email.clone(),
        }
    }
}

/// `/auth/register`, `/auth/login`, `/api/logout` and `/api/profile`
pub fn routes(
    server: SharedChatServer,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let register_route = warp::path!("auth" / "register")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_REQUEST_BODY_BYTES))
        .and(warp::body::json::<RegisterRequest>())
        .and(with_server(server.clone()))
        .and_then(|request: RegisterRequest, server: SharedChatServer| async move {
            register(request, server).await.map_err(warp::reject::custom)
        });

    let login_route = warp::path!("auth" / "login")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_REQUEST_BODY_BYTES))
        .and(warp::body::json::<LoginRequest>())
        .and(with_server(server.clone()))
        .and_then(|request: LoginRequest, server: SharedChatServer| async move {
            login(request, server).await.map_err(warp::reject::custom)
        });

    let logout_route = warp::path!("api" / "logout")
        .and(warp::post())
        .and(with_claims(server.tokens().clone()))
        .and(with_server(server.clone()))
        .and_then(|claims: Claims, server: SharedChatServer| async move {
            logout(claims, server).await.map_err(warp::reject::custom)
        });

    let profile_route = warp::path!("api" / "profile")
        .and(warp::get())
        .and(with_claims(server.tokens().clone()))
        .and(with_server(server))
        .and_then(|claims: Claims, server: SharedChatServer| async move {
            profile(claims, server).await.map_err(warp::reject::custom)
        });

    register_route
        .or(login_route)
        .unify()
        .or(logout_route)
        .unify()
        .or(profile_route)
        .unify()
}

async fn register(request: RegisterRequest, server: SharedChatServer) -> Result<warp::reply::Response> {
    let username = request.username.trim().to_string();
    let email = request.email.trim().to_string();

    if username.is_empty() || email.is_empty() || request.password.is_empty() {
        return Err(ChatHubError::ValidationError(
            "Username, email and password are required".to_string(),
        ));
    }
    if request.password.len() < MIN_PASSWORD_LENGTH {
        return Err(ChatHubError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if server.users().find_by_username(&username).await.is_some() {
        return Err(ChatHubError::Conflict("Username already exists".to_string()));
    }

    // Argon2 runs on the blocking pool
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ChatHubError::SystemError(format!("Password hashing task failed: {}", e)))??;

    let record = server
        .users()
        .create_user(&username, &email, &password_hash)
        .await?;
    log::info!("Registered user {} ({})", record.username, record.id);

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({
            "message": "User created successfully",
            "user": AccountView::from(&record),
        })),
        StatusCode::CREATED,
    )
    .into_response())
}

async fn login(request: LoginRequest, server: SharedChatServer) -> Result<warp::reply::Response> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(ChatHubError::ValidationError(
            "Username and password are required".to_string(),
        ));
    }

    let record = server
        .users()
        .find_by_username(&request.username)
        .await
        .ok_or(ChatHubError::Unauthorized)?;

    let password = request.password;
    let hash = record.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ChatHubError::SystemError(format!("Password check task failed: {}", e)))?;
    if !valid {
        log::warn!("Failed login attempt for {}", record.username);
        return Err(ChatHubError::Unauthorized);
    }

    let claims = Claims::new(record.id, record.username.clone(), server.config().token_ttl);
    let token = server.tokens().generate_token(&claims)?;
    log::info!("User {} logged in", record.username);

    Ok(warp::reply::json(&json!({
        "message": "Login successful",
        "token": token,
        "user": AccountView::from(&record),
    }))
    .into_response())
}

async fn logout(claims: Claims, server: SharedChatServer) -> Result<warp::reply::Response> {
    server.tokens().revoke(&claims).await;
    log::info!("User {} logged out", claims.username);

    Ok(warp::reply::json(&json!({ "message": "Logged out successfully" })).into_response())
}

async fn profile(claims: Claims, server: SharedChatServer) -> Result<warp::reply::Response> {
    let record = server.users().get_user(claims.user_id()?).await?;

    Ok(warp::reply::json(&json!({
        "id": record.id,
        "username": record.username,
        "email": record.email,
        "status": record.status,
    }))
    .into_response())
}
