use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::{CodecProfile, DeviceSpec, DEFAULT_GAIN};
use crate::lights::DEFAULT_LIGHT_PORT;
use crate::relay::{CaptureTaskConfig, HandshakeConfig, RelayConfig, DEFAULT_MAX_SDP_BYTES};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub relay: RelaySettings,
    pub handshake: HandshakeSettings,
    pub signaling: SignalingConfig,
    pub lights: LightsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "reflect-relay".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub bitrate: i32,
    pub complexity: u8,
    pub capture_gain: f32,
    pub playback_gain: f32,
    /// "silence" or a WAV path
    pub input: String,
    /// "null" or a WAV path
    pub output: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            bitrate: CodecProfile::DEFAULT_BITRATE,
            complexity: CodecProfile::DEFAULT_COMPLEXITY,
            capture_gain: DEFAULT_GAIN,
            playback_gain: DEFAULT_GAIN,
            input: "silence".to_string(),
            output: "null".to_string(),
        }
    }
}

impl AudioConfig {
    pub fn profile(&self) -> Result<CodecProfile> {
        Ok(CodecProfile::with_encoder(
            self.sample_rate,
            self.bitrate,
            self.complexity,
        )?)
    }

    pub fn input_device(&self) -> DeviceSpec {
        DeviceSpec::parse(&self.input)
    }

    pub fn output_device(&self) -> DeviceSpec {
        DeviceSpec::parse(&self.output)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub tick_ms: u64,
    pub loop_tick_ms: u64,
    pub lock_timeout_ms: u64,
    pub capture_stack_kib: usize,
    pub capture_priority: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            tick_ms: 15,
            loop_tick_ms: 1,
            lock_timeout_ms: 5,
            capture_stack_kib: 256,
            capture_priority: true,
        }
    }
}

impl RelaySettings {
    pub fn relay(&self) -> RelayConfig {
        RelayConfig {
            loop_tick: Duration::from_millis(self.loop_tick_ms),
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
        }
    }

    pub fn capture_task(&self) -> CaptureTaskConfig {
        CaptureTaskConfig {
            tick: Duration::from_millis(self.tick_ms),
            stack_size: self.capture_stack_kib * 1024,
            elevate_priority: self.capture_priority,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HandshakeSettings {
    pub poll_tick_ms: u64,
    pub gather_timeout_ms: u64,
    pub answer_timeout_ms: u64,
    pub max_sdp_bytes: usize,
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        Self {
            poll_tick_ms: 100,
            gather_timeout_ms: 10_000,
            answer_timeout_ms: 15_000,
            max_sdp_bytes: DEFAULT_MAX_SDP_BYTES,
        }
    }
}

impl HandshakeSettings {
    pub fn handshake(&self) -> HandshakeConfig {
        HandshakeConfig {
            poll_tick: Duration::from_millis(self.poll_tick_ms),
            gather_timeout: Duration::from_millis(self.gather_timeout_ms),
            answer_timeout: Duration::from_millis(self.answer_timeout_ms),
            max_sdp_bytes: self.max_sdp_bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SignalingMode {
    /// Wait for offers on POST /connect
    Server,
    /// Send our own offer to `signaling.url`
    Client,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    pub mode: SignalingMode,
    pub url: String,
    /// Bearer token for the signaling endpoint
    pub api_key: Option<String>,
    pub reconnect_delay_ms: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            mode: SignalingMode::Server,
            url: "https://api.openai.com/v1/realtime/calls".to_string(),
            api_key: None,
            reconnect_delay_ms: 3000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LightsConfig {
    pub enabled: bool,
    pub broadcast: Ipv4Addr,
    pub port: u16,
}

impl Default for LightsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            broadcast: Ipv4Addr::BROADCAST,
            port: DEFAULT_LIGHT_PORT,
        }
    }
}

impl Config {
    /// Load `path` (any format the config crate knows, optional) and then
    /// `REFLECT__*` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("REFLECT").separator("__"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}
