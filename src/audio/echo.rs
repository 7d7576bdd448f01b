// Coarse feedback suppression: while the remote side is audible on the
// speaker, the capture path sends silence instead of the microphone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Pure classifier deciding whether a decoded buffer counts as audible.
pub type PlaybackClassifier = fn(&[i16]) -> bool;

/// Default classifier: audible if any sample lies outside {-1, 0, 1}.
pub fn is_audible(pcm: &[i16]) -> bool {
    pcm.iter().any(|&s| !(-1..=1).contains(&s))
}

/// Shared "remote audio is playing" flag.
///
/// Written by the playback path, read by the capture path. Relaxed ordering:
/// a read that is one tick stale is expected.
#[derive(Debug, Clone, Default)]
pub struct EchoGate {
    playing: Arc<AtomicBool>,
}

impl EchoGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }
}
