use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::capture_task::CaptureSupervisor;
use super::state::SessionState;
use super::tick::lock_within;
use crate::audio::AudioPlaybackSink;
use crate::transport::{
    DataChannelHandler, IceConnectionState, PeerConfig, PeerConnection, PeerConnector,
};

/// Transport loop timing
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Sleep between transport loop iterations
    pub loop_tick: Duration,
    /// How long the transport loop waits for the session lock before skipping
    pub lock_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            loop_tick: Duration::from_millis(1),
            lock_timeout: Duration::from_millis(5),
        }
    }
}

/// A freshly created session as seen by the handshake
#[derive(Clone)]
pub struct SessionHandle {
    pub id: String,
    pub generation: u64,
    pub peer: Arc<dyn PeerConnection>,
}

/// Identity of the installed session, readable without the session lock
#[derive(Debug, Clone)]
struct SessionSummary {
    id: String,
    created_at: DateTime<Utc>,
}

struct Session {
    id: String,
    generation: u64,
    peer: Arc<dyn PeerConnection>,
    created_at: DateTime<Utc>,
}

/// Snapshot for the control surface
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatus {
    pub state: SessionState,
    pub session_id: Option<String>,
    pub generation: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub capture_running: bool,
    pub capture_tasks_spawned: u64,
    pub frames_played: u64,
    pub frames_dropped: u64,
    pub skipped_loop_iterations: u64,
}

/// Owns the single active transport handle.
///
/// Creation, replacement and teardown happen under `slot`. The transport
/// loop takes the same lock with a bounded wait and skips the iteration if
/// a replacement is in progress.
pub struct SessionManager {
    connector: Arc<dyn PeerConnector>,
    peer_config: PeerConfig,
    config: RelayConfig,
    slot: Mutex<Option<Session>>,
    capture: Arc<CaptureSupervisor>,
    playback: Arc<AudioPlaybackSink>,
    data_handler: Option<Arc<dyn DataChannelHandler>>,
    state_tx: Arc<watch::Sender<SessionState>>,
    summary: watch::Sender<Option<SessionSummary>>,
    generation: Arc<AtomicU64>,
    teardown: Arc<AtomicBool>,
    shutdown: AtomicBool,
    skipped: AtomicU64,
}

impl SessionManager {
    pub fn new(
        connector: Arc<dyn PeerConnector>,
        peer_config: PeerConfig,
        config: RelayConfig,
        capture: CaptureSupervisor,
        playback: Arc<AudioPlaybackSink>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Closed);
        let (summary, _) = watch::channel(None);

        Self {
            connector,
            peer_config,
            config,
            slot: Mutex::new(None),
            capture: Arc::new(capture),
            playback,
            data_handler: None,
            state_tx: Arc::new(state_tx),
            summary,
            generation: Arc::new(AtomicU64::new(0)),
            teardown: Arc::new(AtomicBool::new(false)),
            shutdown: AtomicBool::new(false),
            skipped: AtomicU64::new(0),
        }
    }

    /// Attach application logic to every future session's data channel.
    pub fn with_data_channel(mut self, handler: Arc<dyn DataChannelHandler>) -> Self {
        self.data_handler = Some(handler);
        self
    }

    fn slot(&self) -> MutexGuard<'_, Option<Session>> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replace any existing session with a new transport handle.
    ///
    /// The previous handle is closed, and its capture task joined, before
    /// the new one is created.
    pub fn create(&self) -> Result<SessionHandle> {
        let mut slot = self.slot();

        if let Some(previous) = slot.take() {
            info!("Replacing session {}", previous.id);
            self.close_session(previous);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("session-{}", uuid::Uuid::new_v4());

        let peer = self
            .connector
            .connect(&self.peer_config)
            .with_context(|| format!("Failed to create peer connection via {}", self.connector.name()))?;

        self.register_callbacks(&id, generation, &peer);

        self.teardown.store(false, Ordering::SeqCst);
        let created_at = Utc::now();
        *slot = Some(Session {
            id: id.clone(),
            generation,
            peer: Arc::clone(&peer),
            created_at,
        });
        self.summary.send_replace(Some(SessionSummary {
            id: id.clone(),
            created_at,
        }));
        self.state_tx.send_replace(SessionState::Unconnected);

        info!("Created {} (generation {})", id, generation);

        Ok(SessionHandle {
            id,
            generation,
            peer,
        })
    }

    fn register_callbacks(&self, id: &str, generation: u64, peer: &Arc<dyn PeerConnection>) {
        let sink = Arc::clone(&self.playback);
        peer.on_audio_track(Box::new(move |packet| {
            sink.handle_packet(packet);
        }));

        let weak: Weak<dyn PeerConnection> = Arc::downgrade(peer);
        let capture = Arc::clone(&self.capture);
        let state_tx = Arc::clone(&self.state_tx);
        let current = Arc::clone(&self.generation);
        let teardown = Arc::clone(&self.teardown);
        let session_id = id.to_string();

        peer.on_ice_connection_state_change(Box::new(move |ice| {
            if current.load(Ordering::SeqCst) != generation {
                debug!("Ignoring ICE state {} from replaced {}", ice, session_id);
                return;
            }
            info!("{} ICE state: {}", session_id, ice);

            match SessionState::from_ice(ice) {
                Some(SessionState::Connected) => {
                    if let Some(peer) = weak.upgrade() {
                        match capture.spawn(peer) {
                            Ok(true) => info!("Capture task spawned for {}", session_id),
                            Ok(false) => {}
                            Err(e) => error!("Failed to start capture: {:#}", e),
                        }
                    }
                    state_tx.send_replace(SessionState::Connected);
                }
                Some(SessionState::Closed) => {
                    capture.stop();
                    if ice != IceConnectionState::Closed {
                        teardown.store(true, Ordering::SeqCst);
                    }
                    state_tx.send_replace(SessionState::Closed);
                }
                _ => {}
            }
        }));

        if let Some(handler) = &self.data_handler {
            let on_message = {
                let handler = Arc::clone(handler);
                let weak = Arc::downgrade(peer);
                Box::new(move |text: &str| {
                    if let Some(peer) = weak.upgrade() {
                        handler.on_message(peer.as_ref(), text);
                    }
                })
            };
            let on_open = {
                let handler = Arc::clone(handler);
                let weak = Arc::downgrade(peer);
                Box::new(move || {
                    if let Some(peer) = weak.upgrade() {
                        handler.on_open(peer.as_ref());
                    }
                })
            };
            peer.on_data_channel(on_message, on_open);
        }
    }

    fn close_session(&self, session: Session) {
        // Reports from the closed handle, including the one close() fires, are stale from here on
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.capture.stop();
        session.peer.close();
        self.summary.send_replace(None);
        self.state_tx.send_replace(SessionState::Closed);
        info!("Closed {} (generation {})", session.id, session.generation);
    }

    /// Close the active session, if any.
    pub fn close(&self) {
        if let Some(session) = self.slot().take() {
            self.close_session(session);
        }
    }

    /// Close the session only if it is still the one created as `generation`.
    ///
    /// Used to abandon a failed negotiation without touching a newer session.
    pub fn close_generation(&self, generation: u64) -> bool {
        let mut slot = self.slot();
        match slot.as_ref() {
            Some(session) if session.generation == generation => {
                if let Some(session) = slot.take() {
                    self.close_session(session);
                }
                true
            }
            _ => false,
        }
    }

    pub fn mark_negotiating(&self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) == generation {
            self.state_tx.send_replace(SessionState::Negotiating);
        }
    }

    /// One transport loop iteration. Returns false if it was skipped.
    pub fn poll_once(&self) -> bool {
        let Some(mut slot) = lock_within(&self.slot, self.config.lock_timeout) else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            debug!("Session lock busy, skipping transport iteration");
            return false;
        };

        if let Some(session) = slot.as_ref() {
            session.peer.poll();
        }

        // A disconnect reported from inside poll cannot take the lock itself
        if self.teardown.swap(false, Ordering::SeqCst) {
            if let Some(session) = slot.take() {
                warn!("Transport disconnected, tearing down {}", session.id);
                self.close_session(session);
            }
        }
        true
    }

    /// Run the transport loop on its own thread until `shutdown`.
    pub fn spawn_transport_loop(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        let manager = Arc::clone(self);
        thread::Builder::new()
            .name("peer_connection_loop".to_string())
            .spawn(move || {
                info!("Transport loop started");
                while !manager.shutdown.load(Ordering::Acquire) {
                    manager.poll_once();
                    thread::sleep(manager.config.loop_tick);
                }
                info!("Transport loop stopped");
            })
            .context("Failed to spawn transport loop thread")
    }

    /// Stop the transport loop and close the active session.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.close();
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Watch session state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn capture(&self) -> &CaptureSupervisor {
        &self.capture
    }

    pub fn playback(&self) -> &AudioPlaybackSink {
        &self.playback
    }

    /// Never waits on the session lock, so it is safe to call from async handlers.
    pub fn status(&self) -> RelayStatus {
        let (session_id, created_at) = match self.summary.borrow().as_ref() {
            Some(summary) => (Some(summary.id.clone()), Some(summary.created_at)),
            None => (None, None),
        };

        RelayStatus {
            state: self.state(),
            session_id,
            generation: self.generation.load(Ordering::SeqCst),
            created_at,
            capture_running: self.capture.is_running(),
            capture_tasks_spawned: self.capture.spawn_count(),
            frames_played: self.playback.frames_played(),
            frames_dropped: self.playback.frames_dropped(),
            skipped_loop_iterations: self.skipped.load(Ordering::Relaxed),
        }
    }
}
