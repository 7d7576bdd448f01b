use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::manager::{SessionHandle, SessionManager};
use super::state::SessionState;
use super::tick::poll_until;
use crate::error::RelayError;
use crate::signaling::SignalingClient;
use crate::transport::{CandidateCallback, SdpType};

/// Largest SDP accepted from a caller
pub const DEFAULT_MAX_SDP_BYTES: usize = 5000;

#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Sleep between checks while waiting on gathering or an answer
    pub poll_tick: Duration,
    /// Ceiling for candidate gathering
    pub gather_timeout: Duration,
    /// Ceiling for obtaining the remote (or local) answer
    pub answer_timeout: Duration,
    pub max_sdp_bytes: usize,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            poll_tick: Duration::from_millis(100),
            gather_timeout: Duration::from_secs(10),
            answer_timeout: Duration::from_secs(15),
            max_sdp_bytes: DEFAULT_MAX_SDP_BYTES,
        }
    }
}

/// Offer plus the answer buffer filled by the transport's candidate callback
pub struct HandshakeExchange {
    offer: String,
    answer: Arc<Mutex<String>>,
}

impl HandshakeExchange {
    pub fn new(offer: impl Into<String>) -> Self {
        Self {
            offer: offer.into(),
            answer: Arc::new(Mutex::new(String::new())),
        }
    }

    fn buffer(answer: &Mutex<String>) -> MutexGuard<'_, String> {
        match answer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn offer(&self) -> &str {
        &self.offer
    }

    /// Candidate callback writing into the answer buffer.
    ///
    /// Each candidate carries the full updated local description, so the
    /// buffer always holds the latest one.
    pub fn recorder(&self) -> CandidateCallback {
        let answer = Arc::clone(&self.answer);
        Box::new(move |sdp: &str| {
            let mut buffer = Self::buffer(&answer);
            buffer.clear();
            buffer.push_str(sdp);
        })
    }

    pub fn is_ready(&self) -> bool {
        !Self::buffer(&self.answer).is_empty()
    }

    pub fn answer(&self) -> String {
        Self::buffer(&self.answer).clone()
    }
}

/// Offer/answer negotiation on top of the session manager.
///
/// Every wait is a bounded poll with a fixed tick. A failed attempt closes
/// only the session it created.
pub struct SignalingHandshake {
    manager: Arc<SessionManager>,
    config: HandshakeConfig,
}

impl SignalingHandshake {
    pub fn new(manager: Arc<SessionManager>, config: HandshakeConfig) -> Self {
        Self { manager, config }
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    fn validate_offer(&self, offer: &str) -> Result<(), RelayError> {
        if offer.trim().is_empty() {
            return Err(RelayError::EmptyOffer);
        }
        if offer.len() > self.config.max_sdp_bytes {
            return Err(RelayError::OfferTooLarge {
                len: offer.len(),
                max: self.config.max_sdp_bytes,
            });
        }
        Ok(())
    }

    async fn create_session(&self) -> Result<SessionHandle> {
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || manager.create())
            .await
            .context("Session creation task failed")?
    }

    async fn abandon(&self, session: &SessionHandle) {
        let manager = Arc::clone(&self.manager);
        let generation = session.generation;
        if let Err(e) = tokio::task::spawn_blocking(move || manager.close_generation(generation)).await {
            warn!("Failed to abandon session {}: {}", generation, e);
        }
    }

    /// Client-initiated negotiation: send our offer through `signaling` and
    /// apply the answer it returns.
    pub async fn negotiate(&self, signaling: &dyn SignalingClient) -> Result<SessionHandle> {
        let session = self.create_session().await?;

        match self.offer_and_apply(&session, signaling).await {
            Ok(()) => Ok(session),
            Err(e) => {
                warn!("Handshake for {} failed: {:#}", session.id, e);
                self.abandon(&session).await;
                Err(e)
            }
        }
    }

    async fn offer_and_apply(&self, session: &SessionHandle, signaling: &dyn SignalingClient) -> Result<()> {
        let peer = &session.peer;
        self.manager.mark_negotiating(session.generation);

        let offer = peer.create_offer().context("Failed to create local offer")?;
        peer.start_gathering().context("Failed to start candidate gathering")?;

        let ticks = poll_until(self.config.poll_tick, self.config.gather_timeout, || {
            peer.gathering_complete()
        })
        .await
        .ok_or(RelayError::HandshakeTimeout("gathering candidates"))?;
        info!("Candidate gathering finished after {} ticks", ticks);

        let local = peer.local_description().unwrap_or(offer);

        let answer = tokio::time::timeout(self.config.answer_timeout, signaling.exchange(&local))
            .await
            .map_err(|_| RelayError::HandshakeTimeout("waiting for the answer"))?
            .context("Signaling exchange failed")?;

        if answer.trim().is_empty() {
            return Err(RelayError::Signaling("empty answer".to_string()).into());
        }

        peer.set_remote_description(&answer, SdpType::Answer)
            .context("Failed to apply remote answer")?;

        info!("Applied {} byte answer to {}", answer.len(), session.id);
        Ok(())
    }

    /// Server-initiated negotiation: accept a remote offer and produce the
    /// answer once our candidates are known.
    pub async fn answer_offer(&self, offer: &str) -> Result<String> {
        self.validate_offer(offer)?;

        let session = self.create_session().await?;
        let exchange = HandshakeExchange::new(offer);

        match self.produce_answer(&session, &exchange).await {
            Ok(answer) => Ok(answer),
            Err(e) => {
                warn!("Handshake for {} failed: {:#}", session.id, e);
                self.abandon(&session).await;
                Err(e)
            }
        }
    }

    async fn produce_answer(&self, session: &SessionHandle, exchange: &HandshakeExchange) -> Result<String> {
        let peer = &session.peer;
        peer.on_ice_candidate(exchange.recorder());
        self.manager.mark_negotiating(session.generation);

        peer.set_remote_description(exchange.offer(), SdpType::Offer)
            .context("Failed to apply remote offer")?;
        peer.start_gathering().context("Failed to start candidate gathering")?;

        let ticks = poll_until(self.config.poll_tick, self.config.answer_timeout, || {
            exchange.is_ready()
        })
        .await
        .ok_or(RelayError::HandshakeTimeout("waiting for the local answer"))?;

        let answer = exchange.answer();
        info!(
            "Answer for {} ready after {} ticks ({} bytes)",
            session.id,
            ticks,
            answer.len()
        );
        Ok(answer)
    }

    /// Keep a client-mode session alive: negotiate, wait for it to close,
    /// then renegotiate after `retry_delay`. Runs until the task is dropped.
    pub async fn maintain(&self, signaling: &dyn SignalingClient, retry_delay: Duration) {
        let mut states = self.manager.subscribe();

        loop {
            match self.negotiate(signaling).await {
                Ok(session) => {
                    info!("Negotiated {}, waiting for it to close", session.id);
                    let closed = states
                        .wait_for(|state| *state == SessionState::Closed)
                        .await
                        .is_ok();
                    if !closed {
                        warn!("Session state channel closed, stopping reconnect loop");
                        return;
                    }
                    info!("Session {} closed, reconnecting", session.id);
                }
                Err(e) => warn!("Negotiation failed: {:#}", e),
            }

            tokio::time::sleep(retry_delay).await;
        }
    }
}
