use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub backends_total: usize,
    pub backends_alive: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackendStatus {
    pub url: String,
    pub alive: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let backends = state.pool.backends();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        backends_total: backends.len(),
        backends_alive: backends.iter().filter(|b| b.is_alive()).count(),
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let statuses = state
        .pool
        .backends()
        .iter()
        .map(|b| BackendStatus {
            url: b.url().to_string(),
            alive: b.is_alive(),
        })
        .collect();
    Json(statuses)
}
