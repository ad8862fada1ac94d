//! HTTP server setup and run loop.
//!
//! # Responsibilities
//! - Expose the front door as an Axum router with HTTP tracing
//! - Serve it with peer addresses and graceful shutdown
//! - Apply configuration updates while running
//! - Start the admin listener when enabled

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::app::{ServerCore, ServerError};
use crate::config::WebConfig;
use crate::http::front_door::FrontDoor;
use crate::observability::ServerState;
use crate::pool::ResourcePoolStats;

/// A built application, ready to serve.
pub struct HttpServer {
    core: Arc<ServerCore>,
    front_door: Arc<FrontDoor>,
}

impl HttpServer {
    pub(crate) fn new(core: Arc<ServerCore>, front_door: FrontDoor) -> Self {
        Self {
            core,
            front_door: Arc::new(front_door),
        }
    }

    /// The complete router. Usable in-process with `tower::ServiceExt::oneshot`.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(Arc::clone(&self.front_door))
            .layer(TraceLayer::new_for_http())
    }

    pub fn core(&self) -> Arc<ServerCore> {
        Arc::clone(&self.core)
    }

    pub fn state(&self) -> &Arc<ServerState> {
        self.core.state()
    }

    pub fn pool_stats(&self) -> ResourcePoolStats {
        self.core.pool().stats()
    }

    pub fn set_offline(&self, offline: bool) {
        self.core.set_offline(offline);
    }

    pub fn config(&self) -> Arc<WebConfig> {
        self.core.config()
    }

    /// Serve until `shutdown` fires.
    ///
    /// Configurations received on `config_updates` replace the running one;
    /// a configuration whose session store cannot be initialized is rejected.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<WebConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let core = Arc::clone(&self.core);
        let updates = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                match core.apply_config(config) {
                    Ok(()) => tracing::info!("Configuration applied"),
                    Err(err) => tracing::error!(error = %err, "Configuration rejected"),
                }
            }
        });

        let config = self.core.config();
        let admin = if config.admin.enabled {
            let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
            let core = Arc::clone(&self.core);
            let admin_shutdown = shutdown.resubscribe();
            Some(tokio::spawn(async move {
                if let Err(err) = admin::serve(admin_listener, core, admin_shutdown).await {
                    tracing::error!(error = %err, "Admin server failed");
                }
            }))
        } else {
            None
        };

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        updates.abort();
        if let Some(admin) = admin {
            if let Err(err) = admin.await {
                tracing::warn!(error = %err, "Admin task did not finish cleanly");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn dispatch(State(front_door): State<Arc<FrontDoor>>, request: Request) -> Response {
    front_door.dispatch(request).await
}
