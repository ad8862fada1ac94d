use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app::ServerCore;
use crate::observability::StateSnapshot;
use crate::pool::ResourcePoolStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct ServerStateReport {
    #[serde(flatten)]
    pub counters: StateSnapshot,
    pub offline: bool,
    pub pool: ResourcePoolStats,
}

pub async fn get_status(State(core): State<Arc<ServerCore>>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if core.is_offline() { "offline" } else { "operational" },
    })
}

pub async fn get_state(State(core): State<Arc<ServerCore>>) -> Json<ServerStateReport> {
    Json(ServerStateReport {
        counters: core.state().snapshot(),
        offline: core.is_offline(),
        pool: core.pool().stats(),
    })
}
