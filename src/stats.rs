use std::sync::Arc;

use axum::{Json, debug_handler, extract::State};
use serde::Serialize;

use crate::relay::Relay;

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    peers: usize,
    rooms: usize,
}

#[debug_handler(state = crate::AppState)]
pub async fn health(State(relay): State<Arc<Relay>>) -> Json<Health> {
    let stats = relay.stats();
    Json(Health {
        status: "ok",
        peers: stats.peers,
        rooms: stats.rooms,
    })
}
