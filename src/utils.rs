use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{FeatureError, FeatureResult};

/// Resample mono samples from `input_sample_rate` to `output_sample_rate`.
/// # Arguments:
/// - `samples`: Input audio samples, any scale.
/// - `input_sample_rate`: Sample rate of the input audio.
/// - `output_sample_rate`: Desired sample rate for the output audio.
/// # Returns:
/// - `Ok(Vec<f32>)`: Resampled audio at the same scale as the input,
///   `round(len * output_sample_rate / input_sample_rate)` samples long.
/// - `Err(FeatureError)`: If the resampler cannot be built or fails.
pub fn resample(
    samples: &[f32],
    input_sample_rate: u32,
    output_sample_rate: u32,
) -> FeatureResult<Vec<f32>> {
    if input_sample_rate == output_sample_rate {
        return Ok(samples.to_vec());
    }
    if samples.is_empty() {
        return Err(FeatureError::EmptyAudioData);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        output_sample_rate as f64 / input_sample_rate as f64,
        2.0, // max_relative_ratio
        params,
        samples.len(),
        1, // channels
    )?;

    let expected = (samples.len() as f64 * output_sample_rate as f64 / input_sample_rate as f64)
        .round() as usize;

    // Output starts aligned with the input; the sinc tail is held back until flushed.
    let mut output = resampler.process(&[samples], None)?.swap_remove(0);
    while output.len() < expected {
        let tail = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
        if tail[0].is_empty() {
            break;
        }
        output.extend_from_slice(&tail[0]);
    }
    output.resize(expected, 0.0);

    log::debug!(
        "resampled {} samples at {} Hz to {} samples at {} Hz",
        samples.len(),
        input_sample_rate,
        output.len(),
        output_sample_rate
    );
    Ok(output)
}

/// Convert interleaved multi-channel samples to mono by averaging the channels.
/// A trailing partial frame is averaged over the channels it has.
pub fn downmix_to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        data.to_vec()
    } else {
        data.chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }
}

/// Round to the nearest integer and saturate to `±32767`.
pub fn to_pcm16(x: f32) -> i16 {
    (0.5 + x).floor().clamp(-32767.0, 32767.0) as i16
}
