//! Voice-agent conversation over the data channel
//!
//! On open the agent is told how to behave and which light tools exist.
//! Completed tool calls become light commands, and the result is reported
//! back so the agent can answer the user.

pub mod events;
pub mod tools;

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::lights::LightSink;
use crate::transport::{DataChannelHandler, PeerConnection};

pub use events::{ServerEvent, SessionUpdate, ToolDefinition};
pub use tools::{light_tools, parse_tool_call};

pub const DEFAULT_INSTRUCTIONS: &str = "\
You control a single color bulb on the local network. Turn what the user says, \
including moods and vague wishes, into concrete hue, saturation, brightness and \
kelvin values, and always call a light tool before confirming. Keep spoken \
confirmations to one short sentence. Never strobe: waveform periods stay at or \
above 1200 ms. Prefer gentle transitions of about 1500 ms unless asked otherwise.";

/// Data-channel handler bridging the voice agent to the lights
pub struct LightAgent {
    lights: Arc<dyn LightSink>,
    instructions: String,
}

impl LightAgent {
    pub fn new(lights: Arc<dyn LightSink>) -> Self {
        Self {
            lights,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Serialized `session.update` sent when the channel opens
    pub fn session_update(&self) -> Result<String> {
        let update = SessionUpdate::new(self.instructions.clone(), light_tools());
        Ok(serde_json::to_string(&update)?)
    }

    /// Handle one inbound event, returning the messages to send back.
    pub fn handle_event(&self, text: &str) -> Vec<String> {
        let event: ServerEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                debug!("Ignoring unparseable data channel message: {}", e);
                return Vec::new();
            }
        };

        let ServerEvent::FunctionCallDone {
            call_id,
            name,
            arguments,
        } = event
        else {
            return Vec::new();
        };

        info!("Tool call {} ({})", name, call_id);

        let output = match parse_tool_call(&name, &arguments)
            .and_then(|command| self.lights.send(&command).map(|_| command))
        {
            Ok(command) => {
                info!("Applied {:?}", command);
                json!({ "ok": true })
            }
            Err(e) => {
                warn!("Tool call {} failed: {:#}", name, e);
                json!({ "ok": false, "error": format!("{:#}", e) })
            }
        };

        vec![
            events::function_call_output(&call_id, &output).to_string(),
            events::response_create().to_string(),
        ]
    }
}

impl DataChannelHandler for LightAgent {
    fn on_open(&self, peer: &dyn PeerConnection) {
        info!("Data channel open, sending session update");
        let sent = self.session_update().and_then(|update| peer.send_data(&update));
        if let Err(e) = sent {
            error!("Failed to send session update: {:#}", e);
        }
    }

    fn on_message(&self, peer: &dyn PeerConnection, text: &str) {
        for reply in self.handle_event(text) {
            if let Err(e) = peer.send_data(&reply) {
                warn!("Failed to send tool result: {:#}", e);
                return;
            }
        }
    }
}
