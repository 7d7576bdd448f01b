use crate::audio::{EchoGate, MuteSwitch};
use crate::relay::SignalingHandshake;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Server-initiated negotiation (and through it, the session manager)
    pub handshake: Arc<SignalingHandshake>,
    pub mute: MuteSwitch,
    pub gate: EchoGate,
    /// False when the relay negotiates outbound and must not accept browser offers
    pub accept_offers: bool,
}

impl AppState {
    pub fn new(handshake: Arc<SignalingHandshake>, mute: MuteSwitch, gate: EchoGate) -> Self {
        Self {
            handshake,
            mute,
            gate,
            accept_offers: true,
        }
    }

    /// Refuse `/connect` so an inbound offer cannot replace the outbound session.
    pub fn without_offers(mut self) -> Self {
        self.accept_offers = false;
        self
    }
}
