// Diagnostic transport: every audio packet sent is delivered back as
// inbound audio on the next poll. Exercises the whole relay path on a host
// without an ICE engine or a remote peer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Result};
use tracing::{debug, info};

use super::{
    AudioCallback, CandidateCallback, IceConnectionState, MessageCallback, OpenCallback,
    PeerConfig, PeerConnection, PeerConnector, SdpType, StateCallback,
};

/// Inbound frames kept before the oldest is dropped (~1s of 20ms frames)
const MAX_QUEUED_FRAMES: usize = 50;

#[derive(Default)]
struct LoopbackState {
    offer: Option<String>,
    remote: Option<SdpType>,
    gathering_started: bool,
    connected_reported: bool,
    closed: bool,
    inbound: VecDeque<Vec<u8>>,
}

#[derive(Default)]
struct Callbacks {
    state: Mutex<Option<Arc<dyn Fn(IceConnectionState) + Send + Sync>>>,
    audio: Mutex<Option<Arc<dyn Fn(&[u8]) + Send + Sync>>>,
    candidate: Mutex<Option<Arc<dyn Fn(&str) + Send + Sync>>>,
    open: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
}

fn get<T: ?Sized>(slot: &Mutex<Option<Arc<T>>>) -> Option<Arc<T>> {
    match slot.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn set<T: ?Sized>(slot: &Mutex<Option<Arc<T>>>, value: Arc<T>) {
    match slot.lock() {
        Ok(mut guard) => *guard = Some(value),
        Err(poisoned) => *poisoned.into_inner() = Some(value),
    }
}

pub struct LoopbackPeer {
    id: String,
    state: Mutex<LoopbackState>,
    callbacks: Callbacks,
}

impl LoopbackPeer {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            state: Mutex::new(LoopbackState::default()),
            callbacks: Callbacks::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, LoopbackState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn describe(&self, role: &str) -> String {
        format!(
            "v=0\r\no=- {} 2 IN IP4 127.0.0.1\r\ns=loopback-{}\r\nt=0 0\r\n\
             m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=rtpmap:111 opus/48000/2\r\n\
             a=candidate:1 1 UDP 2130706431 127.0.0.1 9 typ host\r\n",
            self.id, role
        )
    }
}

impl Default for LoopbackPeer {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerConnection for LoopbackPeer {
    fn create_offer(&self) -> Result<String> {
        let offer = self.describe("offer");
        let mut state = self.state();
        if state.closed {
            bail!("peer connection is closed");
        }
        state.offer = Some(offer.clone());
        Ok(offer)
    }

    fn start_gathering(&self) -> Result<()> {
        {
            let mut state = self.state();
            if state.closed {
                bail!("peer connection is closed");
            }
            state.gathering_started = true;
        }
        let description = self.local_description();

        // Single host candidate, gathered synchronously
        if let (Some(callback), Some(sdp)) = (get(&self.callbacks.candidate), description) {
            callback(&sdp);
        }
        Ok(())
    }

    fn gathering_complete(&self) -> bool {
        self.state().gathering_started
    }

    fn local_description(&self) -> Option<String> {
        let state = self.state();
        match state.remote {
            Some(SdpType::Offer) => Some(self.describe("answer")),
            _ => state.offer.clone(),
        }
    }

    fn set_remote_description(&self, sdp: &str, kind: SdpType) -> Result<()> {
        if sdp.trim().is_empty() {
            bail!("empty remote description");
        }
        let mut state = self.state();
        if state.closed {
            bail!("peer connection is closed");
        }
        state.remote = Some(kind);
        debug!("Loopback {} applied remote {:?}", self.id, kind);
        Ok(())
    }

    fn poll(&self) {
        let (report_connected, frames) = {
            let mut state = self.state();
            if state.closed {
                return;
            }
            let report = state.remote.is_some() && !state.connected_reported;
            if report {
                state.connected_reported = true;
            }
            (report, state.inbound.drain(..).collect::<Vec<_>>())
        };

        if report_connected {
            info!("Loopback {} connected", self.id);
            if let Some(callback) = get(&self.callbacks.state) {
                callback(IceConnectionState::Connected);
            }
            if let Some(callback) = get(&self.callbacks.open) {
                callback();
            }
        }

        if let Some(callback) = get(&self.callbacks.audio) {
            for frame in &frames {
                callback(frame.as_slice());
            }
        }
    }

    fn send_audio(&self, packet: &[u8]) -> Result<()> {
        let mut state = self.state();
        if state.closed {
            bail!("peer connection is closed");
        }
        if state.inbound.len() >= MAX_QUEUED_FRAMES {
            state.inbound.pop_front();
        }
        state.inbound.push_back(packet.to_vec());
        Ok(())
    }

    fn send_data(&self, text: &str) -> Result<()> {
        if self.state().closed {
            bail!("peer connection is closed");
        }
        debug!("Loopback {} data channel out: {} bytes", self.id, text.len());
        Ok(())
    }

    fn on_ice_connection_state_change(&self, callback: StateCallback) {
        set(&self.callbacks.state, Arc::from(callback));
    }

    fn on_audio_track(&self, callback: AudioCallback) {
        set(&self.callbacks.audio, Arc::from(callback));
    }

    fn on_ice_candidate(&self, callback: CandidateCallback) {
        set(&self.callbacks.candidate, Arc::from(callback));
    }

    fn on_data_channel(&self, on_message: MessageCallback, on_open: OpenCallback) {
        // Nothing ever arrives on a loopback data channel
        drop(on_message);
        set(&self.callbacks.open, Arc::from(on_open));
    }

    fn close(&self) {
        {
            let mut state = self.state();
            if state.closed {
                return;
            }
            state.closed = true;
            state.inbound.clear();
        }

        info!("Loopback {} closed", self.id);
        if let Some(callback) = get(&self.callbacks.state) {
            callback(IceConnectionState::Closed);
        }
    }
}

/// Connector producing `LoopbackPeer`s
#[derive(Debug, Default)]
pub struct LoopbackConnector;

impl PeerConnector for LoopbackConnector {
    fn connect(&self, _config: &PeerConfig) -> Result<Arc<dyn PeerConnection>> {
        Ok(Arc::new(LoopbackPeer::new()))
    }

    fn name(&self) -> &str {
        "loopback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_sent_audio_comes_back_on_poll() {
        let peer = LoopbackPeer::new();
        let received = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&received);
        peer.on_audio_track(Box::new(move |packet| {
            assert_eq!(packet, &[1, 2, 3]);
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        peer.send_audio(&[1, 2, 3]).unwrap();
        peer.send_audio(&[1, 2, 3]).unwrap();
        assert_eq!(received.load(Ordering::SeqCst), 0);

        peer.poll();
        assert_eq!(received.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_connected_reported_once_after_answer() {
        let peer = LoopbackPeer::new();
        let connected = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connected);
        peer.on_ice_connection_state_change(Box::new(move |state| {
            if state == IceConnectionState::Connected {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        peer.create_offer().unwrap();
        peer.poll();
        assert_eq!(connected.load(Ordering::SeqCst), 0);

        peer.set_remote_description("ANSWER", SdpType::Answer).unwrap();
        peer.poll();
        peer.poll();
        assert_eq!(connected.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_offer_produces_answer_via_candidate_callback() {
        let peer = LoopbackPeer::new();
        let answer = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&answer);
        peer.on_ice_candidate(Box::new(move |sdp| sink.lock().unwrap().push_str(sdp)));

        peer.set_remote_description("v=0 OFFER", SdpType::Offer).unwrap();
        peer.start_gathering().unwrap();

        assert!(answer.lock().unwrap().contains("loopback-answer"));
    }

    #[test]
    fn test_close_is_idempotent_and_rejects_sends() {
        let peer = LoopbackPeer::new();
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closed);
        peer.on_ice_connection_state_change(Box::new(move |state| {
            if state == IceConnectionState::Closed {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        peer.close();
        peer.close();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(peer.send_audio(&[0]).is_err());
    }
}
