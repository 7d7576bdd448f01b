use anyhow::{bail, Context, Result};
use hound::{WavReader, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{info, warn};

use super::device::{AudioInput, AudioOutput, FramePacer};
use super::profile::CodecProfile;

/// Microphone stand-in that loops a 16-bit mono WAV file at the frame rate
pub struct WavInput {
    name: String,
    samples: Vec<i16>,
    position: usize,
    pacer: FramePacer,
}

impl WavInput {
    pub fn open(path: impl AsRef<Path>, profile: &CodecProfile) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening input WAV: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.sample_rate != profile.sample_rate
            || spec.channels != profile.channels
            || spec.bits_per_sample != 16
        {
            bail!(
                "WAV must be {}Hz mono 16-bit, got {}Hz {}ch {}-bit",
                profile.sample_rate,
                spec.sample_rate,
                spec.channels,
                spec.bits_per_sample
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        if samples.is_empty() {
            bail!("WAV file {} has no samples", path.display());
        }

        info!(
            "Input WAV loaded: {:.1}s, {} samples",
            samples.len() as f64 / spec.sample_rate as f64,
            samples.len()
        );

        Ok(Self {
            name: format!("wav:{}", path.display()),
            samples,
            position: 0,
            pacer: FramePacer::new(profile),
        })
    }
}

impl AudioInput for WavInput {
    fn read(&mut self, buf: &mut [i16]) -> Result<()> {
        self.pacer.wait();

        for slot in buf.iter_mut() {
            *slot = self.samples[self.position];
            self.position = (self.position + 1) % self.samples.len();
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Speaker stand-in that records every written frame to a WAV file
pub struct WavOutput {
    name: String,
    writer: Option<WavWriter<BufWriter<File>>>,
}

impl WavOutput {
    pub fn create(path: impl AsRef<Path>, profile: &CodecProfile) -> Result<Self> {
        let path = path.as_ref();

        let spec = hound::WavSpec {
            channels: profile.channels,
            sample_rate: profile.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

        info!("Recording speaker output to {}", path.display());

        Ok(Self {
            name: format!("wav:{}", path.display()),
            writer: Some(writer),
        })
    }

    /// Flush the header and close the file.
    pub fn finish(mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize WAV file")?;
        }
        Ok(())
    }
}

impl AudioOutput for WavOutput {
    fn write(&mut self, buf: &[i16]) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for &sample in buf {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for WavOutput {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
