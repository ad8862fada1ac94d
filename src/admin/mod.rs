//! Admin API on a separate listener.
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::routing::get;
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::app::ServerCore;

use self::auth::admin_auth_middleware;
use self::handlers::{get_state, get_status};

pub fn setup_admin_router(core: Arc<ServerCore>) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/state", get(get_state))
        .layer(middleware::from_fn_with_state(Arc::clone(&core), admin_auth_middleware))
        .with_state(core)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    core: Arc<ServerCore>,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");
    axum::serve(listener, setup_admin_router(core))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
