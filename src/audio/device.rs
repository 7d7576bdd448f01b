use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;

use super::file::{WavInput, WavOutput};
use super::profile::CodecProfile;

/// Microphone side of the hardware audio collaborator
///
/// `read` blocks until exactly `buf.len()` samples are available.
pub trait AudioInput: Send {
    fn read(&mut self, buf: &mut [i16]) -> Result<()>;

    /// Device name for logging
    fn name(&self) -> &str;
}

/// Speaker side of the hardware audio collaborator
///
/// `write` blocks until the whole buffer has been accepted.
pub trait AudioOutput: Send {
    fn write(&mut self, buf: &[i16]) -> Result<()>;

    /// Device name for logging
    fn name(&self) -> &str;
}

/// Which device backs an input or output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSpec {
    /// Input: endless silence. Output: discard.
    Null,
    /// 16-bit mono WAV file
    Wav(PathBuf),
}

impl DeviceSpec {
    /// `"silence"`, `"null"` or `""` select the null device, anything else is a WAV path.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "null" | "silence" | "none" => DeviceSpec::Null,
            path => DeviceSpec::Wav(PathBuf::from(path)),
        }
    }
}

/// Audio device factory
pub struct AudioDeviceFactory;

impl AudioDeviceFactory {
    pub fn open_input(spec: &DeviceSpec, profile: &CodecProfile) -> Result<Box<dyn AudioInput>> {
        let input: Box<dyn AudioInput> = match spec {
            DeviceSpec::Null => Box::new(SilenceInput::new(profile)),
            DeviceSpec::Wav(path) => Box::new(
                WavInput::open(path, profile)
                    .with_context(|| format!("Failed to open input {}", path.display()))?,
            ),
        };

        info!("Audio input: {}", input.name());
        Ok(input)
    }

    pub fn open_output(
        spec: &DeviceSpec,
        profile: &CodecProfile,
    ) -> Result<Box<dyn AudioOutput>> {
        let output: Box<dyn AudioOutput> = match spec {
            DeviceSpec::Null => Box::new(NullOutput),
            DeviceSpec::Wav(path) => Box::new(
                WavOutput::create(path, profile)
                    .with_context(|| format!("Failed to create output {}", path.display()))?,
            ),
        };

        info!("Audio output: {}", output.name());
        Ok(output)
    }
}

/// Blocks reads to the frame clock, the way a codec chip's DMA would.
#[derive(Debug)]
pub(crate) struct FramePacer {
    period: Duration,
    next: Option<Instant>,
}

impl FramePacer {
    pub(crate) fn new(profile: &CodecProfile) -> Self {
        Self {
            period: profile.frame_duration(),
            next: None,
        }
    }

    pub(crate) fn wait(&mut self) {
        let now = Instant::now();
        let deadline = match self.next {
            // Fell behind by more than a frame: resynchronise instead of bursting
            Some(deadline) if deadline + self.period < now => now,
            Some(deadline) => deadline,
            None => now,
        };

        if deadline > now {
            thread::sleep(deadline - now);
        }
        self.next = Some(deadline + self.period);
    }
}

/// Input that yields silence at the frame rate
pub struct SilenceInput {
    pacer: FramePacer,
}

impl SilenceInput {
    pub fn new(profile: &CodecProfile) -> Self {
        Self {
            pacer: FramePacer::new(profile),
        }
    }
}

impl AudioInput for SilenceInput {
    fn read(&mut self, buf: &mut [i16]) -> Result<()> {
        self.pacer.wait();
        buf.fill(0);
        Ok(())
    }

    fn name(&self) -> &str {
        "silence"
    }
}

/// Output that discards everything
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn write(&mut self, _buf: &[i16]) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}
