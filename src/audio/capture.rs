use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::codec::AudioEncoder;
use super::device::AudioInput;
use super::echo::EchoGate;
use super::frame::AudioFrame;
use super::gain::apply_gain;
use super::profile::CodecProfile;
use crate::transport::PeerConnection;

/// Microphone → encoder → transport, one frame per tick.
///
/// Owns its input device, encoder and fixed frame buffers for the life of
/// the process; the capture task borrows it for the duration of a session
/// and hands it back when stopped.
pub struct AudioCapturePipeline {
    profile: CodecProfile,
    input: Box<dyn AudioInput>,
    encoder: Box<dyn AudioEncoder>,
    frame: AudioFrame,
    gate: EchoGate,
    gain: f32,
    frames_sent: u64,
    frames_dropped: u64,
}

impl AudioCapturePipeline {
    pub fn new(
        profile: CodecProfile,
        input: Box<dyn AudioInput>,
        encoder: Box<dyn AudioEncoder>,
        gate: EchoGate,
        gain: f32,
    ) -> Self {
        Self {
            frame: AudioFrame::new(&profile),
            profile,
            input,
            encoder,
            gate,
            gain,
            frames_sent: 0,
            frames_dropped: 0,
        }
    }

    /// Capture, encode and send one frame. Returns the encoded size.
    ///
    /// While the echo gate reports remote playback the microphone is not
    /// read at all and an encoded silence frame is sent instead.
    pub fn capture_frame(&mut self, transport: &dyn PeerConnection) -> Result<usize> {
        if self.gate.is_playing() {
            self.frame.silence();
        } else {
            self.input
                .read(self.frame.pcm_mut())
                .context("Microphone read failed")?;
        }

        apply_gain(self.frame.pcm_mut(), self.gain);

        let (pcm, packet) = self.frame.encode_buffers();
        let encoded = self.encoder.encode(pcm, packet)?;
        self.frame.set_packet_len(encoded)?;

        transport
            .send_audio(self.frame.packet())
            .context("Failed to send audio frame")?;

        self.frames_sent += 1;
        Ok(encoded)
    }

    /// `capture_frame` with the drop-and-continue policy applied.
    pub fn tick(&mut self, transport: &dyn PeerConnection) {
        if let Err(e) = self.capture_frame(transport) {
            self.frames_dropped += 1;
            if self.frames_dropped == 1 || self.frames_dropped % 100 == 0 {
                warn!(
                    "Dropped capture frame ({} so far): {:#}",
                    self.frames_dropped, e
                );
            } else {
                debug!("Dropped capture frame: {:#}", e);
            }
        }
    }

    pub fn profile(&self) -> &CodecProfile {
        &self.profile
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }
}
