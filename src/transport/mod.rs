//! Peer-connection collaborator interface
//!
//! The ICE/DTLS/SRTP engine is consumed through these traits so the relay
//! core can be driven by any implementation, including the fakes used in
//! tests:
//! - `PeerConnector` creates handles (one per negotiation)
//! - `PeerConnection` exposes offer/answer, the periodic `poll` loop, media
//!   and data-channel send, and callback registration
//!
//! Callbacks fire from inside `poll` (or `close`) on the transport thread.

mod loopback;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

pub use loopback::{LoopbackConnector, LoopbackPeer};

/// Label of the data channel the voice agent talks on
pub const DATA_CHANNEL_LABEL: &str = "oai-events";

/// ICE connection state reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl IceConnectionState {
    /// States that end the session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IceConnectionState::Disconnected | IceConnectionState::Failed | IceConnectionState::Closed
        )
    }
}

impl fmt::Display for IceConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IceConnectionState::New => "new",
            IceConnectionState::Checking => "checking",
            IceConnectionState::Connected => "connected",
            IceConnectionState::Completed => "completed",
            IceConnectionState::Disconnected => "disconnected",
            IceConnectionState::Failed => "failed",
            IceConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

/// Parameters for creating a peer connection
#[derive(Debug, Clone, Default)]
pub struct PeerConfig {
    /// STUN/TURN URLs; empty on the LAN
    pub ice_servers: Vec<String>,
    /// Label for the data channel opened towards the voice agent
    pub data_channel_label: String,
}

impl PeerConfig {
    pub fn new() -> Self {
        Self {
            ice_servers: Vec::new(),
            data_channel_label: DATA_CHANNEL_LABEL.to_string(),
        }
    }
}

pub type StateCallback = Box<dyn Fn(IceConnectionState) + Send + Sync>;
pub type AudioCallback = Box<dyn Fn(&[u8]) + Send + Sync>;
pub type CandidateCallback = Box<dyn Fn(&str) + Send + Sync>;
pub type MessageCallback = Box<dyn Fn(&str) + Send + Sync>;
pub type OpenCallback = Box<dyn Fn() + Send + Sync>;

/// One transport session handle
///
/// Implementations are internally synchronised: `send_audio` is called from
/// the capture thread while `poll` runs on the transport thread.
pub trait PeerConnection: Send + Sync {
    /// Create the local offer SDP
    fn create_offer(&self) -> Result<String>;

    /// Begin network-path (candidate) discovery
    fn start_gathering(&self) -> Result<()>;

    /// Whether candidate discovery has finished
    fn gathering_complete(&self) -> bool;

    /// Current local description including gathered candidates
    fn local_description(&self) -> Option<String>;

    fn set_remote_description(&self, sdp: &str, kind: SdpType) -> Result<()>;

    /// Drive protocol timers and deliver inbound media; call periodically
    fn poll(&self);

    /// Send one compressed audio frame
    fn send_audio(&self, packet: &[u8]) -> Result<()>;

    /// Send a text message on the data channel
    fn send_data(&self, text: &str) -> Result<()>;

    fn on_ice_connection_state_change(&self, callback: StateCallback);

    /// Called with each decoded inbound audio frame (compressed bytes)
    fn on_audio_track(&self, callback: AudioCallback);

    /// Called per local candidate with the updated local description
    fn on_ice_candidate(&self, callback: CandidateCallback);

    fn on_data_channel(&self, on_message: MessageCallback, on_open: OpenCallback);

    /// Release the handle; further calls are no-ops
    fn close(&self);
}

/// Application logic attached to a session's data channel
pub trait DataChannelHandler: Send + Sync {
    /// Channel is open; `peer` can be used to send
    fn on_open(&self, peer: &dyn PeerConnection);

    fn on_message(&self, peer: &dyn PeerConnection, text: &str);
}

/// Creates peer connections
pub trait PeerConnector: Send + Sync {
    fn connect(&self, config: &PeerConfig) -> Result<Arc<dyn PeerConnection>>;

    /// Connector name for logging
    fn name(&self) -> &str;
}
