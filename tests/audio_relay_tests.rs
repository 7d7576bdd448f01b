// Integration tests for the capture and playback halves of the relay
//
// Capture and playback share one echo gate; these tests drive both sides
// with fake devices and codecs and check what reaches the transport and the
// speaker.

mod common;

use anyhow::{bail, Result};
use common::{
    CountingInput, DecodeStep, FakeDecoder, FakeEncoder, FakePeer, PeerScript, RecordingOutput,
};
use reflect_relay::audio::{
    AudioCapturePipeline, AudioInput, AudioPlaybackSink, CodecProfile, EchoGate, MuteSwitch,
    OpusDecoder, OpusEncoder, MAX_PACKET_BYTES, SUPPORTED_SAMPLE_RATES,
};

struct Relay {
    gate: EchoGate,
    input: CountingInput,
    encoder: FakeEncoder,
    decoder: FakeDecoder,
    output: RecordingOutput,
    capture: AudioCapturePipeline,
    playback: AudioPlaybackSink,
    peer: FakePeer,
}

fn relay(gain: f32) -> Result<Relay> {
    let profile = CodecProfile::new(16000)?;
    let gate = EchoGate::new();
    let input = CountingInput::new(300);
    let encoder = FakeEncoder::default();
    let decoder = FakeDecoder::default();
    let output = RecordingOutput::default();

    let capture = AudioCapturePipeline::new(
        profile,
        Box::new(input.clone()),
        Box::new(encoder.clone()),
        gate.clone(),
        gain,
    );
    let playback = AudioPlaybackSink::new(
        &profile,
        Box::new(decoder.clone()),
        Box::new(output.clone()),
        gate.clone(),
        gain,
    );

    Ok(Relay {
        gate,
        input,
        encoder,
        decoder,
        output,
        capture,
        playback,
        peer: FakePeer::new(0, PeerScript::default()),
    })
}

#[test]
fn test_capture_frame_size_per_profile() -> Result<()> {
    for rate in SUPPORTED_SAMPLE_RATES {
        let profile = CodecProfile::new(rate)?;
        let input = CountingInput::new(1200);
        let peer = FakePeer::new(0, PeerScript::default());

        let mut capture = AudioCapturePipeline::new(
            profile,
            Box::new(input.clone()),
            Box::new(OpusEncoder::new(&profile)?),
            EchoGate::new(),
            5.0,
        );

        let encoded = capture.capture_frame(&peer)?;

        assert_eq!(input.reads(), 1);
        assert_eq!(
            input.read_sizes.lock().unwrap().as_slice(),
            &[profile.frame_samples()],
            "{} Hz should read one {}-sample frame",
            rate,
            profile.frame_samples()
        );
        assert!(encoded > 0 && encoded <= MAX_PACKET_BYTES);
        assert_eq!(peer.sent_audio.lock().unwrap()[0].len(), encoded);
    }

    Ok(())
}

/// 440 Hz tone at a quarter of full scale
struct SineInput {
    sample_rate: f32,
    position: u64,
}

impl SineInput {
    fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            position: 0,
        }
    }
}

impl AudioInput for SineInput {
    fn read(&mut self, buf: &mut [i16]) -> Result<()> {
        for sample in buf.iter_mut() {
            let t = self.position as f32 / self.sample_rate;
            *sample = (8000.0 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()) as i16;
            self.position += 1;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "sine"
    }
}

#[test]
fn test_opus_frames_survive_the_full_path() -> Result<()> {
    let profile = CodecProfile::new(24000)?;
    let gate = EchoGate::new();
    let output = RecordingOutput::default();
    let peer = FakePeer::new(0, PeerScript::default());

    let mut capture = AudioCapturePipeline::new(
        profile,
        Box::new(SineInput::new(profile.sample_rate)),
        Box::new(OpusEncoder::new(&profile)?),
        gate.clone(),
        1.0,
    );
    let playback = AudioPlaybackSink::new(
        &profile,
        Box::new(OpusDecoder::new(&profile)?),
        Box::new(output.clone()),
        gate.clone(),
        1.0,
    );

    for _ in 0..5 {
        capture.capture_frame(&peer)?;
    }
    for packet in peer.sent_audio.lock().unwrap().iter() {
        assert!(playback.handle_packet(packet));
    }

    let written = output.written();
    assert_eq!(written.len(), 5);
    assert!(written.iter().all(|frame| frame.len() == profile.frame_samples()));
    // A loud tone decodes to something well above the gate threshold
    assert!(gate.is_playing());

    Ok(())
}

#[test]
fn test_gate_playing_skips_microphone_and_sends_silence() -> Result<()> {
    let mut r = relay(5.0)?;
    r.gate.set_playing(true);

    r.capture.capture_frame(&r.peer)?;

    assert_eq!(r.input.reads(), 0, "microphone must not be read");
    let encoded = r.encoder.encoded();
    assert_eq!(encoded.len(), 1);
    assert!(encoded[0].iter().all(|&s| s == 0));
    assert_eq!(r.peer.audio_sent(), 1);

    Ok(())
}

#[test]
fn test_capture_applies_gain_before_encoding() -> Result<()> {
    let mut r = relay(5.0)?;

    r.capture.capture_frame(&r.peer)?;

    let encoded = r.encoder.encoded();
    assert!(encoded[0].iter().all(|&s| s == 1500));
    Ok(())
}

#[test]
fn test_silent_remote_frame_reopens_microphone() -> Result<()> {
    let mut r = relay(1.0)?;
    r.gate.set_playing(true);

    r.decoder.push(DecodeStep::Samples(vec![0; 320]));
    assert!(r.playback.handle_packet(&[1, 2, 3]));
    assert!(!r.gate.is_playing());

    r.capture.capture_frame(&r.peer)?;
    assert_eq!(r.input.reads(), 1);

    Ok(())
}

#[test]
fn test_audible_remote_frame_mutes_microphone() -> Result<()> {
    let mut r = relay(1.0)?;

    let mut samples = vec![0i16; 320];
    samples[0] = 1200;
    r.decoder.push(DecodeStep::Samples(samples));
    assert!(r.playback.handle_packet(&[1, 2, 3]));
    assert!(r.gate.is_playing());

    r.capture.capture_frame(&r.peer)?;
    assert_eq!(r.input.reads(), 0);
    assert!(r.encoder.encoded()[0].iter().all(|&s| s == 0));
    assert_eq!(r.peer.audio_sent(), 1);

    Ok(())
}

#[test]
fn test_low_level_noise_does_not_arm_gate() -> Result<()> {
    let r = relay(1.0)?;

    r.decoder.push(DecodeStep::Samples(vec![1, -1, 0, 1]));
    assert!(r.playback.handle_packet(&[9]));
    assert!(!r.gate.is_playing());

    Ok(())
}

#[test]
fn test_failed_decode_writes_nothing_and_recovers() -> Result<()> {
    let r = relay(1.0)?;
    r.gate.set_playing(true);

    r.decoder.push(DecodeStep::Fail);
    r.decoder.push(DecodeStep::Empty);
    r.decoder.push(DecodeStep::Samples(vec![7; 320]));

    assert!(!r.playback.handle_packet(&[0xFF]));
    assert!(!r.playback.handle_packet(&[0xFF]));
    assert!(r.output.written().is_empty());
    // A lost frame leaves the gate where it was
    assert!(r.gate.is_playing());

    assert!(r.playback.handle_packet(&[1]));
    assert_eq!(r.output.written().len(), 1);
    assert_eq!(r.playback.frames_dropped(), 2);
    assert_eq!(r.playback.frames_played(), 1);

    Ok(())
}

#[test]
fn test_short_decode_is_padded_to_a_full_frame() -> Result<()> {
    let r = relay(1.0)?;

    r.decoder.push(DecodeStep::Samples(vec![9; 320]));
    r.decoder.push(DecodeStep::Samples(vec![5; 100]));
    r.playback.handle_packet(&[1]);
    r.playback.handle_packet(&[1]);

    let written = r.output.written();
    assert_eq!(written[1].len(), 320);
    assert!(written[1][..100].iter().all(|&s| s == 5));
    assert!(written[1][100..].iter().all(|&s| s == 0));

    Ok(())
}

#[test]
fn test_playback_gain_is_clamped() -> Result<()> {
    let r = relay(5.0)?;

    let mut samples = vec![1000i16; 320];
    samples[1] = i16::MAX;
    samples[2] = i16::MIN;
    r.decoder.push(DecodeStep::Samples(samples));
    r.playback.handle_packet(&[1]);

    let frame = &r.output.written()[0];
    assert_eq!(frame[0], 5000);
    assert_eq!(frame[1], i16::MAX);
    assert_eq!(frame[2], i16::MIN);

    Ok(())
}

#[test]
fn test_muted_speaker_writes_silence_and_keeps_gate_open() -> Result<()> {
    let profile = CodecProfile::new(16000)?;
    let gate = EchoGate::new();
    let mute = MuteSwitch::new();
    let decoder = FakeDecoder::default();
    let output = RecordingOutput::default();

    let playback = AudioPlaybackSink::new(
        &profile,
        Box::new(decoder.clone()),
        Box::new(output.clone()),
        gate.clone(),
        5.0,
    )
    .with_mute(mute.clone());

    mute.set(true);
    decoder.push(DecodeStep::Samples(vec![2000; 320]));
    assert!(playback.handle_packet(&[1]));

    assert!(!gate.is_playing());
    assert!(output.written()[0].iter().all(|&s| s == 0));

    Ok(())
}

struct FailingInput;

impl AudioInput for FailingInput {
    fn read(&mut self, _buf: &mut [i16]) -> Result<()> {
        bail!("i2s read timeout")
    }

    fn name(&self) -> &str {
        "failing"
    }
}

#[test]
fn test_capture_drops_frame_on_read_error() -> Result<()> {
    let profile = CodecProfile::new(8000)?;
    let peer = FakePeer::new(0, PeerScript::default());
    let mut capture = AudioCapturePipeline::new(
        profile,
        Box::new(FailingInput),
        Box::new(FakeEncoder::default()),
        EchoGate::new(),
        1.0,
    );

    assert!(capture.capture_frame(&peer).is_err());
    capture.tick(&peer);
    capture.tick(&peer);

    assert_eq!(capture.frames_dropped(), 2);
    assert_eq!(capture.frames_sent(), 0);
    assert_eq!(peer.audio_sent(), 0);

    Ok(())
}
