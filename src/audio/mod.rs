pub mod capture;
pub mod codec;
pub mod device;
pub mod echo;
pub mod file;
pub mod frame;
pub mod gain;
pub mod playback;
pub mod profile;

pub use capture::AudioCapturePipeline;
pub use codec::{AudioDecoder, AudioEncoder, OpusDecoder, OpusEncoder};
pub use device::{AudioDeviceFactory, AudioInput, AudioOutput, DeviceSpec, NullOutput, SilenceInput};
pub use echo::{is_audible, EchoGate, PlaybackClassifier};
pub use file::{WavInput, WavOutput};
pub use frame::AudioFrame;
pub use gain::{apply_gain, DEFAULT_GAIN};
pub use playback::{AudioPlaybackSink, MuteSwitch};
pub use profile::{CodecProfile, MAX_PACKET_BYTES, SUPPORTED_SAMPLE_RATES};
