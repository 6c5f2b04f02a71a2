use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use image_toggle_common::mode::{Mode, ModeAck, ModeState};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Body of `POST /toggle_grayscale`: `true` selects grayscale.
#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub data: bool,
}

#[derive(Debug, Serialize)]
pub struct ModeResponse {
    pub mode: Mode,
    pub grayscale: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /toggle_grayscale: always succeeds.
async fn toggle_grayscale(
    State(state): State<Arc<ModeState>>,
    Json(req): Json<ToggleRequest>,
) -> Json<ModeAck> {
    let ack = state.set(Mode::from_grayscale(req.data));
    info!("{}", ack.message);
    Json(ack)
}

/// GET /mode
async fn current_mode(State(state): State<Arc<ModeState>>) -> Json<ModeResponse> {
    let mode = state.get();
    Json(ModeResponse {
        mode,
        grayscale: mode.is_grayscale(),
    })
}

pub fn router(state: Arc<ModeState>) -> Router {
    Router::new()
        .route("/toggle_grayscale", post(toggle_grayscale))
        .route("/mode", get(current_mode))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: Arc<ModeState>) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}
