pub mod capture_task;
pub mod handshake;
pub mod manager;
pub mod state;
pub mod tick;

pub use capture_task::{CaptureSupervisor, CaptureTaskConfig, DEFAULT_CAPTURE_STACK_BYTES};
pub use handshake::{HandshakeConfig, HandshakeExchange, SignalingHandshake, DEFAULT_MAX_SDP_BYTES};
pub use manager::{RelayConfig, RelayStatus, SessionHandle, SessionManager};
pub use state::SessionState;
pub use tick::{lock_within, poll_until, TickScheduler, DEFAULT_TICK};
