use futures_util::stream::StreamExt;
use log::{info, warn};
use warp::http::HeaderMap;
use warp::ws::{WebSocket, Ws};
use warp::{Filter, Rejection, Reply};

use crate::constants::WS_PATH;
use crate::core::connection::{forward_outbound, Connection};
use crate::core::server::SharedChatServer;
use crate::handlers::auth::authenticate_connection;
use crate::handlers::with_server;
use crate::storage::UserId;

/// `GET /ws`: authenticated upgrade into a hub session
pub fn route(
    server: SharedChatServer,
) -> impl Filter<Extract = (Box<dyn Reply>,), Error = Rejection> + Clone {
    warp::path(WS_PATH)
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::header::headers_cloned())
        .and(with_server(server))
        .and_then(upgrade)
}

async fn upgrade(
    ws: Ws,
    headers: HeaderMap,
    server: SharedChatServer,
) -> Result<Box<dyn Reply>, Rejection> {
    let (user_id, protocol) = authenticate_connection(&headers, server.tokens())
        .await
        .map_err(|e| {
            warn!("WebSocket upgrade rejected: {}", e);
            warp::reject::custom(e)
        })?;

    info!("New websocket connection for user {}", user_id);
    let reply = ws.on_upgrade(move |socket| handle_ws_client(socket, user_id, server));

    // Browsers drop the connection unless the chosen subprotocol is echoed
    Ok(match protocol {
        Some(protocol) => Box::new(warp::reply::with_header(
            reply,
            "sec-websocket-protocol",
            protocol,
        )),
        None => Box::new(reply),
    })
}

/// Handle an upgraded WebSocket connection for an authenticated user
pub async fn handle_ws_client(ws: WebSocket, user_id: UserId, server: SharedChatServer) {
    let (ws_tx, ws_rx) = ws.split();

    let hub_config = &server.config().hub;
    let (connection, outbound) = Connection::channel(hub_config.outbound_queue_capacity);

    // Single writer per socket; ends once every handle to the connection is gone
    tokio::spawn(forward_outbound(ws_tx, outbound, hub_config.write_timeout));

    server.accept(connection, user_id).run(ws_rx).await;
}
