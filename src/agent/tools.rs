use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::json;

use super::events::ToolDefinition;
use crate::lights::{Hsbk, LightCommand, Waveform};

const DEFAULT_DURATION_MS: u32 = 1500;
const DEFAULT_KELVIN: u16 = 3500;
const MIN_KELVIN: u16 = 1500;
const MAX_KELVIN: u16 = 9000;

fn default_duration() -> u32 {
    DEFAULT_DURATION_MS
}

fn default_kelvin() -> u16 {
    DEFAULT_KELVIN
}

fn default_period() -> u32 {
    5000
}

fn default_cycles() -> f32 {
    1.0
}

fn default_skew() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct PowerArgs {
    on: bool,
    #[serde(default = "default_duration")]
    duration_ms: u32,
}

#[derive(Debug, Deserialize)]
struct ColorArgs {
    /// Degrees
    #[serde(default)]
    hue: f64,
    #[serde(default)]
    saturation: f64,
    brightness: f64,
    #[serde(default = "default_kelvin")]
    kelvin: u16,
    #[serde(default = "default_duration")]
    duration_ms: u32,
}

#[derive(Debug, Deserialize)]
struct WaveformArgs {
    waveform: Waveform,
    #[serde(default)]
    hue: f64,
    #[serde(default)]
    saturation: f64,
    brightness: f64,
    #[serde(default = "default_kelvin")]
    kelvin: u16,
    #[serde(default = "default_period")]
    period_ms: u32,
    #[serde(default = "default_cycles")]
    cycles: f32,
    #[serde(default = "default_skew")]
    skew_ratio: f64,
    #[serde(default = "default_true")]
    transient: bool,
}

/// 0.0..=1.0 to protocol units
fn fraction(value: f64) -> u16 {
    (value.clamp(0.0, 1.0) * f64::from(u16::MAX)).round() as u16
}

fn hue(degrees: f64) -> u16 {
    (degrees.rem_euclid(360.0) / 360.0 * f64::from(u16::MAX)).round() as u16
}

fn hsbk(h: f64, s: f64, b: f64, kelvin: u16) -> Hsbk {
    Hsbk {
        hue: hue(h),
        saturation: fraction(s),
        brightness: fraction(b),
        kelvin: kelvin.clamp(MIN_KELVIN, MAX_KELVIN),
    }
}

/// Decode one tool call into a light command
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<LightCommand> {
    let command = match name {
        "set_power" => {
            let args: PowerArgs = serde_json::from_str(arguments).context("Invalid set_power arguments")?;
            LightCommand::SetPower {
                on: args.on,
                duration_ms: args.duration_ms,
            }
        }
        "set_color" => {
            let args: ColorArgs = serde_json::from_str(arguments).context("Invalid set_color arguments")?;
            LightCommand::SetColor {
                color: hsbk(args.hue, args.saturation, args.brightness, args.kelvin),
                duration_ms: args.duration_ms,
            }
        }
        "set_waveform" => {
            let args: WaveformArgs =
                serde_json::from_str(arguments).context("Invalid set_waveform arguments")?;
            // Skew maps 0.0..=1.0 onto the full signed range, 0.5 is symmetric
            let skew = ((args.skew_ratio.clamp(0.0, 1.0) - 0.5) * f64::from(u16::MAX)).round();
            LightCommand::SetWaveform {
                transient: args.transient,
                color: hsbk(args.hue, args.saturation, args.brightness, args.kelvin),
                period_ms: args.period_ms,
                cycles: args.cycles,
                skew_ratio: skew as i16,
                waveform: args.waveform,
            }
        }
        other => bail!("Unknown tool {}", other),
    };
    Ok(command)
}

/// Tools advertised in the session update
pub fn light_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            kind: "function",
            name: "set_power",
            description: "Turn the light on or off.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "on": { "type": "boolean" },
                    "duration_ms": { "type": "integer", "minimum": 0 }
                },
                "required": ["on"]
            }),
        },
        ToolDefinition {
            kind: "function",
            name: "set_color",
            description: "Fade the light to a steady color.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "hue": { "type": "number", "description": "Degrees, 0-360" },
                    "saturation": { "type": "number", "minimum": 0, "maximum": 1 },
                    "brightness": { "type": "number", "minimum": 0, "maximum": 1 },
                    "kelvin": { "type": "integer", "minimum": MIN_KELVIN, "maximum": MAX_KELVIN },
                    "duration_ms": { "type": "integer", "minimum": 0 }
                },
                "required": ["brightness"]
            }),
        },
        ToolDefinition {
            kind: "function",
            name: "set_waveform",
            description: "Run a repeating effect such as a slow breathe or a single pulse.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "waveform": { "type": "string", "enum": ["SAW", "SINE", "HALF_SINE", "TRIANGLE", "PULSE"] },
                    "hue": { "type": "number" },
                    "saturation": { "type": "number", "minimum": 0, "maximum": 1 },
                    "brightness": { "type": "number", "minimum": 0, "maximum": 1 },
                    "kelvin": { "type": "integer", "minimum": MIN_KELVIN, "maximum": MAX_KELVIN },
                    "period_ms": { "type": "integer", "minimum": 1200 },
                    "cycles": { "type": "number" },
                    "skew_ratio": { "type": "number", "minimum": 0, "maximum": 1 },
                    "transient": { "type": "boolean" }
                },
                "required": ["waveform", "brightness"]
            }),
        },
    ]
}
