//! HTTP signaling and control surface
//!
//! - GET / - Control page that runs the browser side of the handshake
//! - POST /connect - Offer SDP in, answer SDP out
//! - POST /mute - Speaker mute switch
//! - GET /status - Session and audio state
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{MuteRequest, StatusResponse};
pub use routes::create_router;
pub use state::AppState;
