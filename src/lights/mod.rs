//! LAN light control
//!
//! Commands arrive from the voice agent's tool calls and leave as fixed
//! little-endian broadcast datagrams.

pub mod lan;
pub mod packet;

use anyhow::Result;
use serde::Deserialize;

pub use lan::{LanLightClient, DEFAULT_LIGHT_PORT};
pub use packet::{encode, HEADER_LEN, PROTOCOL, SOURCE_ID};

/// Waveform shapes understood by the bulb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Waveform {
    Saw,
    Sine,
    HalfSine,
    Triangle,
    Pulse,
}

impl Waveform {
    pub fn code(self) -> u8 {
        match self {
            Waveform::Saw => 0,
            Waveform::Sine => 1,
            Waveform::HalfSine => 2,
            Waveform::Triangle => 3,
            Waveform::Pulse => 4,
        }
    }
}

/// HSBK color in protocol units (hue, saturation and brightness over 0..=65535)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsbk {
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub kelvin: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LightCommand {
    SetPower {
        on: bool,
        duration_ms: u32,
    },
    SetColor {
        color: Hsbk,
        duration_ms: u32,
    },
    SetWaveform {
        transient: bool,
        color: Hsbk,
        period_ms: u32,
        cycles: f32,
        skew_ratio: i16,
        waveform: Waveform,
    },
}

impl LightCommand {
    pub fn message_type(&self) -> u16 {
        match self {
            LightCommand::SetPower { .. } => 21,
            LightCommand::SetColor { .. } => 102,
            LightCommand::SetWaveform { .. } => 103,
        }
    }
}

/// Receives light commands
pub trait LightSink: Send + Sync {
    fn send(&self, command: &LightCommand) -> Result<()>;
}
