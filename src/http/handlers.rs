use super::state::AppState;
use crate::error::RelayError;
use crate::relay::RelayStatus;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

const INDEX_PAGE: &str = include_str!("index.html");

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MuteRequest {
    pub muted: bool,
}

#[derive(Debug, Serialize)]
pub struct MuteResponse {
    pub muted: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub relay: RelayStatus,
    /// Remote audio currently audible (capture muted)
    pub echo_gate: bool,
    pub muted: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_status(err: &anyhow::Error) -> StatusCode {
    match err.downcast_ref::<RelayError>() {
        Some(RelayError::EmptyOffer) => StatusCode::BAD_REQUEST,
        Some(RelayError::OfferTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
        Some(RelayError::HandshakeTimeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        Some(RelayError::Transport(_)) | Some(RelayError::Signaling(_)) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

/// POST /connect
/// Accept an SDP offer and reply with our answer
pub async fn connect(State(state): State<AppState>, offer: String) -> Response {
    if !state.accept_offers {
        warn!("Rejected offer: relay is negotiating as a client");
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "relay is in client signaling mode and does not accept offers".to_string(),
            }),
        )
            .into_response();
    }

    info!("Received {} byte offer", offer.len());

    match state.handshake.answer_offer(&offer).await {
        Ok(answer) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            answer,
        )
            .into_response(),
        Err(e) => {
            let status = error_status(&e);
            if status.is_server_error() {
                error!("Handshake failed: {:#}", e);
            } else {
                warn!("Rejected offer: {:#}", e);
            }
            (
                status,
                Json(ErrorResponse {
                    error: format!("{:#}", e),
                }),
            )
                .into_response()
        }
    }
}

/// POST /mute
pub async fn set_mute(State(state): State<AppState>, Json(req): Json<MuteRequest>) -> impl IntoResponse {
    state.mute.set(req.muted);
    (
        StatusCode::OK,
        Json(MuteResponse {
            muted: state.mute.is_muted(),
        }),
    )
}

/// GET /status
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let relay = state.handshake.manager().status();
    (
        StatusCode::OK,
        Json(StatusResponse {
            relay,
            echo_gate: state.gate.is_playing(),
            muted: state.mute.is_muted(),
        }),
    )
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
