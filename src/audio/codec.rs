use std::convert::TryFrom;

use anyhow::{Context, Result};
use audiopus::coder::{Decoder, Encoder};
use audiopus::packet::Packet;
use audiopus::{Application, Bitrate, Channels, MutSignals, SampleRate, Signal};
use tracing::info;

use super::profile::CodecProfile;
use crate::error::RelayError;

/// PCM → compressed frame encoder
pub trait AudioEncoder: Send {
    /// Encode one frame of PCM into `out`, returning the bytes written.
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize>;
}

/// Compressed frame → PCM decoder
pub trait AudioDecoder: Send {
    /// Decode `packet` into `pcm`, returning the samples written.
    ///
    /// `Ok(0)` and `Err(_)` both mean the frame is lost or corrupt.
    fn decode(&mut self, packet: &[u8], pcm: &mut [i16]) -> Result<usize>;
}

fn opus_params(profile: &CodecProfile) -> Result<(SampleRate, Channels), RelayError> {
    let sample_rate = SampleRate::try_from(profile.sample_rate as i32)
        .map_err(|e| RelayError::Codec(format!("sample rate {}: {}", profile.sample_rate, e)))?;

    let channels = match profile.channels {
        1 => Channels::Mono,
        other => {
            return Err(RelayError::Codec(format!(
                "{} channels requested, only mono is supported",
                other
            )))
        }
    };

    Ok((sample_rate, channels))
}

/// Opus encoder configured for voice at the profile's bitrate and complexity
pub struct OpusEncoder {
    encoder: Encoder,
}

impl OpusEncoder {
    pub fn new(profile: &CodecProfile) -> Result<Self> {
        let (sample_rate, channels) = opus_params(profile)?;

        let mut encoder = Encoder::new(sample_rate, channels, Application::Voip)
            .map_err(|e| RelayError::Codec(format!("failed to create Opus encoder: {}", e)))?;

        encoder
            .set_bitrate(Bitrate::BitsPerSecond(profile.bitrate))
            .map_err(|e| RelayError::Codec(format!("failed to set bitrate: {}", e)))?;

        encoder
            .set_complexity(profile.complexity)
            .map_err(|e| {
                RelayError::Codec(format!("failed to set complexity {}: {}", profile.complexity, e))
            })?;

        encoder
            .set_signal(Signal::Voice)
            .map_err(|e| RelayError::Codec(format!("failed to set voice signal: {}", e)))?;

        info!(
            "Opus encoder ready ({}Hz mono, {} bps, complexity {})",
            profile.sample_rate, profile.bitrate, profile.complexity
        );

        Ok(Self { encoder })
    }
}

impl AudioEncoder for OpusEncoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize> {
        self.encoder
            .encode(pcm, out)
            .map_err(|e| RelayError::Codec(format!("Opus encode failed: {}", e)))
            .context("Failed to encode frame")
    }
}

/// Opus decoder writing into a caller-provided fixed buffer
pub struct OpusDecoder {
    decoder: Decoder,
}

impl OpusDecoder {
    pub fn new(profile: &CodecProfile) -> Result<Self> {
        let (sample_rate, channels) = opus_params(profile)?;

        let decoder = Decoder::new(sample_rate, channels)
            .map_err(|e| RelayError::Codec(format!("failed to create Opus decoder: {}", e)))?;

        info!("Opus decoder ready ({}Hz mono)", profile.sample_rate);

        Ok(Self { decoder })
    }
}

impl AudioDecoder for OpusDecoder {
    fn decode(&mut self, packet: &[u8], pcm: &mut [i16]) -> Result<usize> {
        let packet = Packet::try_from(packet)
            .map_err(|e| RelayError::Codec(format!("invalid Opus packet: {}", e)))?;
        let signals = MutSignals::try_from(pcm)
            .map_err(|e| RelayError::Codec(format!("invalid output buffer: {}", e)))?;

        let decoded = self
            .decoder
            .decode(Some(packet), signals, false)
            .map_err(|e| RelayError::Codec(format!("Opus decode failed: {}", e)))?;

        Ok(decoded)
    }
}
