//! Request handlers for the HTTP and WebSocket endpoints

pub mod account;
pub mod auth;
pub mod websocket;

use serde::Serialize;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::core::server::SharedChatServer;
use crate::error::ChatHubError;

pub use websocket::handle_ws_client;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: u16,
}

/// Include the shared server state in a request
pub fn with_server(
    server: SharedChatServer,
) -> impl Filter<Extract = (SharedChatServer,), Error = Infallible> + Clone {
    warp::any().map(move || server.clone())
}

/// Every route served by the binary, with errors mapped to JSON bodies
pub fn routes(
    server: SharedChatServer,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health_route = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| "OK");

    let stats_route = warp::path("stats")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_server(server.clone()))
        .map(|server: SharedChatServer| warp::reply::json(&server.stats()));

    health_route
        .or(stats_route)
        .or(account::routes(server.clone()))
        .or(websocket::route(server))
        .recover(handle_rejection)
}

fn status_for(error: &ChatHubError) -> StatusCode {
    match error {
        ChatHubError::UserNotFound(_) => StatusCode::NOT_FOUND,
        ChatHubError::Unauthorized | ChatHubError::AuthError(_) => StatusCode::UNAUTHORIZED,
        ChatHubError::Conflict(_) => StatusCode::CONFLICT,
        ChatHubError::ValidationError(_)
        | ChatHubError::MessageParseError(_)
        | ChatHubError::MessageTooLarge(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert rejections into `{error, code}` JSON replies
pub async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(error) = rejection.find::<ChatHubError>() {
        let code = status_for(error);
        if code == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("Request failed: {}", error);
            (code, "Internal server error".to_string())
        } else {
            (code, error.to_string())
        }
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        log::warn!("Unhandled rejection: {:?}", rejection);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    let body = ErrorBody {
        error: message,
        code: code.as_u16(),
    };
    Ok(warp::reply::with_status(warp::reply::json(&body), code))
}
