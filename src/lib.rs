pub mod agent;
pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod lights;
pub mod relay;
pub mod signaling;
pub mod transport;

pub use agent::LightAgent;
pub use audio::{
    AudioCapturePipeline, AudioDecoder, AudioDeviceFactory, AudioEncoder, AudioFrame, AudioInput,
    AudioOutput, AudioPlaybackSink, CodecProfile, EchoGate, MuteSwitch, OpusDecoder, OpusEncoder,
};
pub use config::{Config, SignalingMode};
pub use error::RelayError;
pub use http::{create_router, AppState};
pub use lights::{LanLightClient, LightCommand, LightSink};
pub use relay::{
    CaptureSupervisor, HandshakeConfig, RelayConfig, SessionManager, SessionState,
    SignalingHandshake, TickScheduler,
};
pub use signaling::{HttpSignalingClient, SignalingClient};
pub use transport::{LoopbackConnector, PeerConfig, PeerConnection, PeerConnector};
