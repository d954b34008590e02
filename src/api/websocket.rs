use crate::auth::extract_connect_token;
use crate::client::Client;
use crate::config::{HubConfig, WebSocketConfig};
use crate::hub::Hub;
use crate::message::Message;
use crate::session::SessionRegistry;
use axum::{
    extract::{
        ws::{Message as WsFrame, WebSocket, WebSocketUpgrade},
        Extension, Query, Request, State,
    },
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Query parameters for WebSocket upgrade
#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// Identity resolved before the upgrade (0 = anonymous)
#[derive(Debug, Clone, Copy)]
struct ConnectIdentity {
    user_id: u64,
}

/// Shared application state for WebSocket handler
#[derive(Clone)]
pub struct WsAppState {
    pub hub: Hub,
    pub sessions: SessionRegistry,
    pub hub_config: HubConfig,
    pub websocket: WebSocketConfig,
    pub auth_enabled: bool,
}

/// Resolves the connecting identity before the upgrade extractor runs, so
/// 401 can be returned without a valid upgrade request.
async fn ws_auth(
    State(state): State<Arc<WsAppState>>,
    Query(params): Query<WsQuery>,
    headers: HeaderMap,
    mut req: Request,
    next: Next,
) -> Response {
    let identity = if state.auth_enabled {
        let token = match extract_connect_token(&headers, params.token.as_deref()) {
            Ok(token) => token,
            Err(e) => {
                debug!(error = %e, "Rejecting WebSocket connect");
                return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
            }
        };
        match state.sessions.lookup(&token) {
            Some(session) => ConnectIdentity {
                user_id: session.user_id,
            },
            None => return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
        }
    } else {
        ConnectIdentity { user_id: 0 }
    };

    req.extensions_mut().insert(identity);
    next.run(req).await
}

/// GET /ws - WebSocket upgrade handler (identity resolved by ws_auth middleware)
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsAppState>>,
    Extension(identity): Extension<ConnectIdentity>,
) -> Response {
    debug!(user_id = identity.user_id, "WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity.user_id))
}

/// Create WebSocket router with auth middleware applied
pub fn create_ws_router(state: Arc<WsAppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), ws_auth))
        .with_state(state)
}

/// Drive one connection: register, pump both directions, unregister once.
async fn handle_socket(socket: WebSocket, state: Arc<WsAppState>, user_id: u64) {
    let (client, mailbox) = Client::new(
        user_id,
        state.hub.clone(),
        state.hub_config.client_mailbox_capacity,
    );
    let client_id = client.id().to_string();
    state.hub.register(Arc::clone(&client)).await;
    info!(client_id = %client_id, user_id = user_id, "WebSocket connection established");

    let ping_interval = Duration::from_secs(state.websocket.ping_interval_seconds.max(1));
    let idle_timeout = Duration::from_secs(state.websocket.idle_timeout_seconds.max(1));

    let (sink, stream) = socket.split();
    let mut write_task = tokio::spawn(write_loop(
        sink,
        mailbox,
        ping_interval,
        client_id.clone(),
    ));
    let mut read_task = tokio::spawn(read_loop(stream, client, idle_timeout));

    // Whichever side finishes first ends the connection. The write loop
    // exits on its own once unregister closes the mailbox.
    tokio::select! {
        _ = &mut write_task => read_task.abort(),
        _ = &mut read_task => {}
    }

    state.hub.unregister(client_id.clone()).await;
    info!(client_id = %client_id, "WebSocket connection closed");
}

/// Decode inbound frames and hand them to the client actor.
async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    client: Arc<Client>,
    idle_timeout: Duration,
) {
    loop {
        let frame = match timeout(idle_timeout, stream.next()).await {
            Err(_) => {
                info!(client_id = %client.id(), "WebSocket idle timeout");
                return;
            }
            Ok(None) => return,
            Ok(Some(Err(e))) => {
                warn!(client_id = %client.id(), error = %e, "WebSocket error");
                return;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            WsFrame::Text(text) => match Message::decode_frame(&text) {
                Ok(msg) => client.handle_message(msg).await,
                Err(e) => {
                    debug!(client_id = %client.id(), error = %e, "Undecodable frame");
                    client.send(Message::error("invalid message frame"));
                }
            },
            WsFrame::Close(_) => {
                info!(client_id = %client.id(), "WebSocket client disconnected");
                return;
            }
            // Pongs are queued by the transport; binary frames are not part of the protocol
            WsFrame::Ping(_) | WsFrame::Pong(_) | WsFrame::Binary(_) => {}
        }
    }
}

/// Drain the client mailbox onto the socket and keep the connection alive.
async fn write_loop(
    mut sink: SplitSink<WebSocket, WsFrame>,
    mut mailbox: mpsc::Receiver<Message>,
    ping_interval: Duration,
    client_id: String,
) {
    let mut ticker = interval(ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            next = mailbox.recv() => {
                let Some(msg) = next else {
                    let _ = sink.send(WsFrame::Close(None)).await;
                    return;
                };
                let text = match msg.encode_frame() {
                    Ok(text) => text,
                    Err(e) => {
                        error!(
                            client_id = %client_id,
                            message_id = %msg.id,
                            error = %e,
                            "Failed to encode message"
                        );
                        continue;
                    }
                };
                if let Err(e) = sink.send(WsFrame::Text(text)).await {
                    warn!(client_id = %client_id, error = %e, "Failed to send message");
                    return;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = sink.send(WsFrame::Ping(Vec::new())).await {
                    warn!(client_id = %client_id, error = %e, "Failed to send ping");
                    return;
                }
            }
        }
    }
}
