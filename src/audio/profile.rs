use std::time::Duration;

use crate::error::RelayError;

/// Largest compressed frame the codec may produce for the profiles in use.
pub const MAX_PACKET_BYTES: usize = 1276;

/// Sample rates the relay is built for.
pub const SUPPORTED_SAMPLE_RATES: [u32; 3] = [8000, 16000, 24000];

/// Immutable per-process audio parameters.
///
/// Built once from configuration at startup; every buffer, codec instance
/// and device is sized from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecProfile {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Always 1 (mono)
    pub channels: u16,
    /// Duration of one codec frame in milliseconds
    pub frame_duration_ms: u32,
    /// Encoder target bitrate in bits per second
    pub bitrate: i32,
    /// Encoder complexity (0 = cheapest)
    pub complexity: u8,
}

impl CodecProfile {
    pub const FRAME_DURATION_MS: u32 = 20;
    pub const DEFAULT_BITRATE: i32 = 30_000;
    pub const DEFAULT_COMPLEXITY: u8 = 0;

    /// Mono 20ms profile at `sample_rate`, rejecting rates the relay is not built for.
    pub fn new(sample_rate: u32) -> Result<Self, RelayError> {
        Self::with_encoder(sample_rate, Self::DEFAULT_BITRATE, Self::DEFAULT_COMPLEXITY)
    }

    pub fn with_encoder(
        sample_rate: u32,
        bitrate: i32,
        complexity: u8,
    ) -> Result<Self, RelayError> {
        if !SUPPORTED_SAMPLE_RATES.contains(&sample_rate) {
            return Err(RelayError::UnsupportedProfile(sample_rate));
        }

        Ok(Self {
            sample_rate,
            channels: 1,
            frame_duration_ms: Self::FRAME_DURATION_MS,
            bitrate,
            complexity,
        })
    }

    /// Samples in one frame (160 / 320 / 480 for 8k / 16k / 24k)
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate as usize * self.frame_duration_ms as usize / 1000)
            * self.channels as usize
    }

    /// Bytes of 16-bit PCM in one frame (320 / 640 / 960 for 8k / 16k / 24k)
    pub fn frame_bytes(&self) -> usize {
        self.frame_samples() * std::mem::size_of::<i16>()
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.frame_duration_ms as u64)
    }
}

impl Default for CodecProfile {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frame_duration_ms: Self::FRAME_DURATION_MS,
            bitrate: Self::DEFAULT_BITRATE,
            complexity: Self::DEFAULT_COMPLEXITY,
        }
    }
}
