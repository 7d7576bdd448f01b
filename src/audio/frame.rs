use anyhow::{bail, Result};

use super::profile::{CodecProfile, MAX_PACKET_BYTES};

/// Fixed-capacity PCM + compressed buffers for one codec frame.
///
/// Allocated once per pipeline at init and never resized. The compressed
/// length is always checked against capacity before it is exposed.
#[derive(Debug)]
pub struct AudioFrame {
    pcm: Box<[i16]>,
    packet: Box<[u8]>,
    packet_len: usize,
}

impl AudioFrame {
    pub fn new(profile: &CodecProfile) -> Self {
        Self {
            pcm: vec![0i16; profile.frame_samples()].into_boxed_slice(),
            packet: vec![0u8; MAX_PACKET_BYTES].into_boxed_slice(),
            packet_len: 0,
        }
    }

    pub fn pcm(&self) -> &[i16] {
        &self.pcm
    }

    pub fn pcm_mut(&mut self) -> &mut [i16] {
        &mut self.pcm
    }

    /// Zero the PCM buffer (silence substitution)
    pub fn silence(&mut self) {
        self.pcm.fill(0);
    }

    /// Split borrow used by the encode step: PCM in, packet buffer out.
    pub fn encode_buffers(&mut self) -> (&[i16], &mut [u8]) {
        (&self.pcm, &mut self.packet)
    }

    /// Record how many bytes the encoder wrote.
    pub fn set_packet_len(&mut self, len: usize) -> Result<()> {
        if len > self.packet.len() {
            self.packet_len = 0;
            bail!(
                "encoded frame is {} bytes, capacity is {}",
                len,
                self.packet.len()
            );
        }
        self.packet_len = len;
        Ok(())
    }

    /// The last encoded packet
    pub fn packet(&self) -> &[u8] {
        &self.packet[..self.packet_len]
    }

    pub fn packet_capacity(&self) -> usize {
        self.packet.len()
    }
}
