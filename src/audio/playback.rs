use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::codec::AudioDecoder;
use super::device::AudioOutput;
use super::echo::{is_audible, EchoGate, PlaybackClassifier};
use super::gain::apply_gain;
use super::profile::CodecProfile;

/// Speaker mute shared with the control surface
#[derive(Debug, Clone, Default)]
pub struct MuteSwitch {
    muted: Arc<AtomicBool>,
}

impl MuteSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, muted: bool) {
        if self.muted.swap(muted, Ordering::Relaxed) != muted {
            info!("Speaker {}", if muted { "muted" } else { "unmuted" });
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }
}

struct PlaybackDevice {
    decoder: Box<dyn AudioDecoder>,
    output: Box<dyn AudioOutput>,
    pcm: Box<[i16]>,
}

/// Inbound audio handler, called inline from the transport's receive path.
///
/// Decodes into a fixed buffer, updates the echo gate, applies gain and
/// writes exactly one frame to the speaker. Its lock is only ever taken
/// from the transport thread, never shared with capture.
pub struct AudioPlaybackSink {
    device: Mutex<PlaybackDevice>,
    gate: EchoGate,
    classifier: PlaybackClassifier,
    gain: f32,
    mute: MuteSwitch,
    frames_played: AtomicU64,
    frames_dropped: AtomicU64,
}

impl AudioPlaybackSink {
    pub fn new(
        profile: &CodecProfile,
        decoder: Box<dyn AudioDecoder>,
        output: Box<dyn AudioOutput>,
        gate: EchoGate,
        gain: f32,
    ) -> Self {
        Self {
            device: Mutex::new(PlaybackDevice {
                decoder,
                output,
                pcm: vec![0i16; profile.frame_samples()].into_boxed_slice(),
            }),
            gate,
            classifier: is_audible,
            gain,
            mute: MuteSwitch::new(),
            frames_played: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }

    /// Replace the "remote is audible" heuristic.
    pub fn with_classifier(mut self, classifier: PlaybackClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_mute(mut self, mute: MuteSwitch) -> Self {
        self.mute = mute;
        self
    }

    /// Handle one compressed inbound frame. Returns true if it was played.
    pub fn handle_packet(&self, packet: &[u8]) -> bool {
        let mut guard = match self.device.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let device = &mut *guard;

        let decoded = match device.decoder.decode(packet, &mut device.pcm[..]) {
            Ok(n) if n > 0 => n,
            Ok(_) => {
                self.frames_dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Dropped empty inbound frame ({} bytes)", packet.len());
                return false;
            }
            Err(e) => {
                self.frames_dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Dropped undecodable inbound frame: {:#}", e);
                return false;
            }
        };

        // Short decode: the rest of the frame must not replay the previous one
        let frame_len = device.pcm.len();
        device.pcm[decoded.min(frame_len)..].fill(0);

        if self.mute.is_muted() {
            device.pcm.fill(0);
        }

        self.gate.set_playing((self.classifier)(&device.pcm[..]));

        apply_gain(&mut device.pcm[..], self.gain);

        if let Err(e) = device.output.write(&device.pcm[..]) {
            self.frames_dropped.fetch_add(1, Ordering::Relaxed);
            warn!("Speaker write failed, frame dropped: {:#}", e);
            return false;
        }

        self.frames_played.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn mute(&self) -> &MuteSwitch {
        &self.mute
    }

    pub fn frames_played(&self) -> u64 {
        self.frames_played.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }
}
