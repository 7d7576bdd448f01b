// Fake collaborators shared by the integration tests.
//
// Every fake records what it was asked to do so tests can assert on call
// counts directly.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use reflect_relay::audio::{
    AudioCapturePipeline, AudioDecoder, AudioEncoder, AudioInput, AudioOutput, AudioPlaybackSink,
    CodecProfile, EchoGate,
};
use reflect_relay::lights::{LightCommand, LightSink};
use reflect_relay::relay::{CaptureSupervisor, CaptureTaskConfig, RelayConfig, SessionManager};
use reflect_relay::signaling::SignalingClient;
use reflect_relay::transport::{
    AudioCallback, CandidateCallback, DataChannelHandler, IceConnectionState, MessageCallback, OpenCallback,
    PeerConfig, PeerConnection, PeerConnector, SdpType, StateCallback,
};

fn get<T: ?Sized>(slot: &Mutex<Option<Arc<T>>>) -> Option<Arc<T>> {
    slot.lock().unwrap().clone()
}

// ============================================================================
// Transport
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct PeerScript {
    /// Candidate gathering never finishes
    pub stall_gathering: bool,
    /// The candidate callback is never invoked
    pub silent_candidates: bool,
    /// Remote description is rejected
    pub reject_remote: bool,
}

pub struct FakePeer {
    pub id: usize,
    script: PeerScript,
    gathering_started: AtomicBool,
    remote: Mutex<Option<(String, SdpType)>>,
    connected_reported: AtomicBool,
    closed: AtomicBool,
    pub close_calls: AtomicUsize,
    pub polls: AtomicUsize,
    pub sent_audio: Mutex<Vec<Vec<u8>>>,
    pub sent_data: Mutex<Vec<String>>,
    state_cb: Mutex<Option<Arc<dyn Fn(IceConnectionState) + Send + Sync>>>,
    audio_cb: Mutex<Option<Arc<dyn Fn(&[u8]) + Send + Sync>>>,
    candidate_cb: Mutex<Option<Arc<dyn Fn(&str) + Send + Sync>>>,
    message_cb: Mutex<Option<Arc<dyn Fn(&str) + Send + Sync>>>,
    open_cb: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
}

impl FakePeer {
    pub fn new(id: usize, script: PeerScript) -> Self {
        Self {
            id,
            script,
            gathering_started: AtomicBool::new(false),
            remote: Mutex::new(None),
            connected_reported: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            sent_audio: Mutex::new(Vec::new()),
            sent_data: Mutex::new(Vec::new()),
            state_cb: Mutex::new(None),
            audio_cb: Mutex::new(None),
            candidate_cb: Mutex::new(None),
            message_cb: Mutex::new(None),
            open_cb: Mutex::new(None),
        }
    }

    pub fn closes(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn remote(&self) -> Option<(String, SdpType)> {
        self.remote.lock().unwrap().clone()
    }

    pub fn audio_sent(&self) -> usize {
        self.sent_audio.lock().unwrap().len()
    }

    pub fn data_sent(&self) -> Vec<String> {
        self.sent_data.lock().unwrap().clone()
    }

    /// Report an ICE state as the engine would from inside poll
    pub fn fire_state(&self, state: IceConnectionState) {
        if let Some(cb) = get(&self.state_cb) {
            cb(state);
        }
    }

    pub fn deliver_audio(&self, packet: &[u8]) {
        if let Some(cb) = get(&self.audio_cb) {
            cb(packet);
        }
    }

    pub fn deliver_message(&self, text: &str) {
        if let Some(cb) = get(&self.message_cb) {
            cb(text);
        }
    }

    pub fn open_channel(&self) {
        if let Some(cb) = get(&self.open_cb) {
            cb();
        }
    }
}

impl PeerConnection for FakePeer {
    fn create_offer(&self) -> Result<String> {
        Ok("OFFER".to_string())
    }

    fn start_gathering(&self) -> Result<()> {
        self.gathering_started.store(true, Ordering::SeqCst);
        let is_offer = matches!(self.remote(), Some((_, SdpType::Offer)));
        if is_offer && !self.script.silent_candidates {
            if let Some(cb) = get(&self.candidate_cb) {
                cb("ANSWER");
            }
        }
        Ok(())
    }

    fn gathering_complete(&self) -> bool {
        !self.script.stall_gathering && self.gathering_started.load(Ordering::SeqCst)
    }

    fn local_description(&self) -> Option<String> {
        match self.remote() {
            Some((_, SdpType::Offer)) => Some("ANSWER".to_string()),
            _ => Some("OFFER".to_string()),
        }
    }

    fn set_remote_description(&self, sdp: &str, kind: SdpType) -> Result<()> {
        if self.script.reject_remote {
            bail!("remote description rejected");
        }
        *self.remote.lock().unwrap() = Some((sdp.to_string(), kind));
        Ok(())
    }

    fn poll(&self) {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if self.remote().is_some() && !self.connected_reported.swap(true, Ordering::SeqCst) {
            self.fire_state(IceConnectionState::Connected);
        }
    }

    fn send_audio(&self, packet: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            bail!("closed");
        }
        self.sent_audio.lock().unwrap().push(packet.to_vec());
        Ok(())
    }

    fn send_data(&self, text: &str) -> Result<()> {
        self.sent_data.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn on_ice_connection_state_change(&self, callback: StateCallback) {
        *self.state_cb.lock().unwrap() = Some(Arc::from(callback));
    }

    fn on_audio_track(&self, callback: AudioCallback) {
        *self.audio_cb.lock().unwrap() = Some(Arc::from(callback));
    }

    fn on_ice_candidate(&self, callback: CandidateCallback) {
        *self.candidate_cb.lock().unwrap() = Some(Arc::from(callback));
    }

    fn on_data_channel(&self, on_message: MessageCallback, on_open: OpenCallback) {
        *self.message_cb.lock().unwrap() = Some(Arc::from(on_message));
        *self.open_cb.lock().unwrap() = Some(Arc::from(on_open));
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.fire_state(IceConnectionState::Closed);
        }
    }
}

#[derive(Default)]
pub struct FakeConnector {
    pub script: PeerScript,
    pub peers: Mutex<Vec<Arc<FakePeer>>>,
}

impl FakeConnector {
    pub fn new(script: PeerScript) -> Self {
        Self {
            script,
            peers: Mutex::new(Vec::new()),
        }
    }

    pub fn peer(&self, index: usize) -> Arc<FakePeer> {
        Arc::clone(&self.peers.lock().unwrap()[index])
    }

    pub fn created(&self) -> usize {
        self.peers.lock().unwrap().len()
    }
}

impl PeerConnector for FakeConnector {
    fn connect(&self, _config: &PeerConfig) -> Result<Arc<dyn PeerConnection>> {
        let mut peers = self.peers.lock().unwrap();
        let peer = Arc::new(FakePeer::new(peers.len(), self.script));
        peers.push(Arc::clone(&peer));
        Ok(peer)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

// ============================================================================
// Audio
// ============================================================================

/// Encoder that records every PCM frame it sees
#[derive(Clone, Default)]
pub struct FakeEncoder {
    pub frames: Arc<Mutex<Vec<Vec<i16>>>>,
}

impl FakeEncoder {
    pub fn encoded(&self) -> Vec<Vec<i16>> {
        self.frames.lock().unwrap().clone()
    }
}

impl AudioEncoder for FakeEncoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize> {
        self.frames.lock().unwrap().push(pcm.to_vec());
        let len = (pcm.len() / 4).clamp(1, out.len());
        out[..len].fill(0xAB);
        Ok(len)
    }
}

#[derive(Debug, Clone)]
pub enum DecodeStep {
    Samples(Vec<i16>),
    Empty,
    Fail,
}

/// Decoder that replays a script, one step per packet
#[derive(Clone, Default)]
pub struct FakeDecoder {
    pub steps: Arc<Mutex<VecDeque<DecodeStep>>>,
}

impl FakeDecoder {
    pub fn push(&self, step: DecodeStep) {
        self.steps.lock().unwrap().push_back(step);
    }
}

impl AudioDecoder for FakeDecoder {
    fn decode(&mut self, _packet: &[u8], pcm: &mut [i16]) -> Result<usize> {
        match self.steps.lock().unwrap().pop_front() {
            Some(DecodeStep::Samples(samples)) => {
                let n = samples.len().min(pcm.len());
                pcm[..n].copy_from_slice(&samples[..n]);
                Ok(n)
            }
            Some(DecodeStep::Empty) => Ok(0),
            Some(DecodeStep::Fail) | None => bail!("corrupt frame"),
        }
    }
}

/// Microphone producing a constant value and counting reads
#[derive(Clone)]
pub struct CountingInput {
    pub value: i16,
    pub reads: Arc<AtomicUsize>,
    pub read_sizes: Arc<Mutex<Vec<usize>>>,
}

impl CountingInput {
    pub fn new(value: i16) -> Self {
        Self {
            value,
            reads: Arc::new(AtomicUsize::new(0)),
            read_sizes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl AudioInput for CountingInput {
    fn read(&mut self, buf: &mut [i16]) -> Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.read_sizes.lock().unwrap().push(buf.len());
        buf.fill(self.value);
        Ok(())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Speaker recording every frame written
#[derive(Clone, Default)]
pub struct RecordingOutput {
    pub frames: Arc<Mutex<Vec<Vec<i16>>>>,
}

impl RecordingOutput {
    pub fn written(&self) -> Vec<Vec<i16>> {
        self.frames.lock().unwrap().clone()
    }
}

impl AudioOutput for RecordingOutput {
    fn write(&mut self, buf: &[i16]) -> Result<()> {
        self.frames.lock().unwrap().push(buf.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

// ============================================================================
// Signaling and lights
// ============================================================================

/// Signaling endpoint answering after a fixed delay
pub struct FakeSignaling {
    pub answer: String,
    pub delay: Duration,
    pub offers: Mutex<Vec<String>>,
}

impl FakeSignaling {
    pub fn new(answer: &str, delay: Duration) -> Self {
        Self {
            answer: answer.to_string(),
            delay,
            offers: Mutex::new(Vec::new()),
        }
    }

    pub fn offers(&self) -> Vec<String> {
        self.offers.lock().unwrap().clone()
    }
}

#[async_trait]
impl SignalingClient for FakeSignaling {
    async fn exchange(&self, offer: &str) -> Result<String> {
        self.offers.lock().unwrap().push(offer.to_string());
        tokio::time::sleep(self.delay).await;
        Ok(self.answer.clone())
    }
}

#[derive(Default)]
pub struct RecordingLights {
    pub commands: Mutex<Vec<LightCommand>>,
}

impl RecordingLights {
    pub fn sent(&self) -> Vec<LightCommand> {
        self.commands.lock().unwrap().clone()
    }
}

impl LightSink for RecordingLights {
    fn send(&self, command: &LightCommand) -> Result<()> {
        self.commands.lock().unwrap().push(command.clone());
        Ok(())
    }
}

// ============================================================================
// Assembled relay
// ============================================================================

pub struct Harness {
    pub connector: Arc<FakeConnector>,
    pub manager: Arc<SessionManager>,
    pub gate: EchoGate,
    pub input: CountingInput,
    pub encoder: FakeEncoder,
    pub decoder: FakeDecoder,
    pub output: RecordingOutput,
}

impl Harness {
    pub fn new(script: PeerScript) -> Self {
        Self::build(script, None)
    }

    pub fn with_data_channel(script: PeerScript, handler: Arc<dyn DataChannelHandler>) -> Self {
        Self::build(script, Some(handler))
    }

    fn build(script: PeerScript, handler: Option<Arc<dyn DataChannelHandler>>) -> Self {
        let profile = CodecProfile::default();
        let gate = EchoGate::new();
        let input = CountingInput::new(100);
        let encoder = FakeEncoder::default();
        let decoder = FakeDecoder::default();
        let output = RecordingOutput::default();

        let pipeline = AudioCapturePipeline::new(
            profile,
            Box::new(input.clone()),
            Box::new(encoder.clone()),
            gate.clone(),
            1.0,
        );
        let capture = CaptureSupervisor::new(
            pipeline,
            CaptureTaskConfig {
                tick: Duration::from_millis(5),
                ..CaptureTaskConfig::default()
            },
        );
        let playback = Arc::new(AudioPlaybackSink::new(
            &profile,
            Box::new(decoder.clone()),
            Box::new(output.clone()),
            gate.clone(),
            1.0,
        ));

        let connector = Arc::new(FakeConnector::new(script));
        let mut manager = SessionManager::new(
            Arc::clone(&connector) as Arc<dyn PeerConnector>,
            PeerConfig::new(),
            RelayConfig::default(),
            capture,
            playback,
        );
        if let Some(handler) = handler {
            manager = manager.with_data_channel(handler);
        }
        let manager = Arc::new(manager);

        Self {
            connector,
            manager,
            gate,
            input,
            encoder,
            decoder,
            output,
        }
    }
}
