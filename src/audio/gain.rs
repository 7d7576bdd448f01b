/// Reference gain applied to capture and playback.
pub const DEFAULT_GAIN: f32 = 5.0;

/// Scale every sample by `gain`, clamp to the i16 range and truncate.
///
/// Uniform: no dithering, no dynamic-range compression.
pub fn apply_gain(samples: &mut [i16], gain: f32) {
    for sample in samples.iter_mut() {
        let scaled = (*sample as f32 * gain).clamp(i16::MIN as f32, i16::MAX as f32);
        *sample = scaled as i16;
    }
}
