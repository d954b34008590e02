// HTTP and WebSocket APIs

pub mod admin;
pub mod websocket;

pub use admin::{create_admin_router, AdminAppState};
pub use websocket::{create_ws_router, WsAppState};

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Full application router: WebSocket transport plus admin API.
pub fn create_app(ws_state: WsAppState, admin_state: AdminAppState) -> Router {
    create_ws_router(Arc::new(ws_state))
        .merge(create_admin_router(admin_state))
        .layer(CorsLayer::permissive())
}
