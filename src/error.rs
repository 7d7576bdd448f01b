use thiserror::Error;

/// Failures a caller has to branch on (HTTP status mapping, retry decisions).
///
/// Everything else travels as `anyhow::Error` with context attached.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("offer is empty")]
    EmptyOffer,

    #[error("offer is {len} bytes, limit is {max}")]
    OfferTooLarge { len: usize, max: usize },

    #[error("handshake timed out while {0}")]
    HandshakeTimeout(&'static str),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("signaling error: {0}")]
    Signaling(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("unsupported sample rate {0} Hz (expected 8000, 16000 or 24000)")]
    UnsupportedProfile(u32),
}
