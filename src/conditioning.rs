//! Per-sample conditioning chain applied to every frame before analysis.
//!
//! Stages, in order: fixed DC-blocking highpass, randomized tilt biquad,
//! preemphasis, linear gain ramp, dither.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ExtractorConfig;
use crate::state::FilterMemories;
use crate::PREEMPHASIS;

/// Scale of the uniform draw for tilt coefficients.
const TILT_SPREAD: f64 = 0.75;

/// Two-pole/two-zero section with unity leading coefficients.
///
/// `y = (1 + b0 z^-1 + b1 z^-2) / (1 + a0 z^-1 + a1 z^-2) x`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f32; 2],
    pub a: [f32; 2],
}

impl Biquad {
    /// Highpass with a double zero at DC, tuned for 16 kHz.
    pub const HIGHPASS: Biquad = Biquad {
        b: [-2.0, 1.0],
        a: [-1.99599, 0.99600],
    };

    /// Pass-through section.
    pub const IDENTITY: Biquad = Biquad {
        b: [0.0, 0.0],
        a: [0.0, 0.0],
    };

    /// Draw a random spectral tilt emulating varied recording equipment.
    pub fn random_tilt<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut draw = || (TILT_SPREAD * (rng.r#gen::<f64>() - 0.5)) as f32;
        let a = [draw(), draw()];
        let b = [draw(), draw()];
        Biquad { b, a }
    }

    /// Filter `samples` in place, carrying `mem` across calls.
    ///
    /// Accumulates in double precision and stores in single precision.
    pub fn filter(&self, mem: &mut [f32; 2], samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let xi = *sample as f64;
            let yi = *sample + mem[0];
            let yd = yi as f64;
            mem[0] = (mem[1] as f64 + (self.b[0] as f64 * xi - self.a[0] as f64 * yd)) as f32;
            mem[1] = (self.b[1] as f64 * xi - self.a[1] as f64 * yd) as f32;
            *sample = yi;
        }
    }
}

/// First-order high-frequency boost: `y[i] = x[i] + mem; mem = -coef * x[i]`.
pub fn preemphasis(mem: &mut f32, samples: &mut [f32], coef: f32) {
    for sample in samples.iter_mut() {
        let xi = *sample;
        *sample = xi + *mem;
        *mem = -coef * xi;
    }
}

/// Conditioning stage owning the tilt coefficients, gain ramp and random generator.
#[derive(Debug)]
pub struct SignalConditioner {
    tilt: Biquad,
    rng: StdRng,
    dither: bool,
    gain: f32,
    prev_gain: f32,
}

impl SignalConditioner {
    /// Build a conditioner. Tilt coefficients are drawn here, once per run.
    pub fn new(config: &ExtractorConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let tilt = if config.random_tilt {
            Biquad::random_tilt(&mut rng)
        } else {
            Biquad::IDENTITY
        };
        log::debug!("tilt filter: b={:?} a={:?}", tilt.b, tilt.a);

        Self {
            tilt,
            rng,
            dither: config.dither,
            gain: config.speech_gain,
            prev_gain: config.speech_gain,
        }
    }

    /// Tilt coefficients drawn for this run.
    pub fn tilt(&self) -> &Biquad {
        &self.tilt
    }

    /// Change the gain target; the next frame ramps from the current gain to this one.
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    /// Condition one frame in place.
    pub fn process(&mut self, mem: &mut FilterMemories, frame: &mut [f32]) {
        Biquad::HIGHPASS.filter(&mut mem.highpass, frame);
        self.tilt.filter(&mut mem.tilt, frame);
        preemphasis(&mut mem.preemphasis, frame, PREEMPHASIS);

        let len = frame.len() as f32;
        for (i, sample) in frame.iter_mut().enumerate() {
            let f = i as f32 / len;
            *sample *= f * self.gain + (1.0 - f) * self.prev_gain;
        }

        if self.dither {
            for sample in frame.iter_mut() {
                *sample += self.rng.r#gen::<f32>() - 0.5;
            }
        }
        self.prev_gain = self.gain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FRAME_SIZE;

    fn quiet_config() -> ExtractorConfig {
        ExtractorConfig::default()
            .with_seed(1)
            .with_random_tilt(false)
            .with_dither(false)
    }

    #[test]
    fn test_highpass_removes_dc() {
        let mut mem = [0.0f32; 2];
        let mut last = 0.0;
        for _ in 0..200 {
            let mut frame = vec![1000.0f32; FRAME_SIZE];
            Biquad::HIGHPASS.filter(&mut mem, &mut frame);
            last = frame[FRAME_SIZE - 1];
        }
        assert!(last.abs() < 1.0, "DC should decay, got {last}");
    }

    #[test]
    fn test_identity_biquad_passes_through() {
        let mut mem = [0.0f32; 2];
        let mut frame: Vec<f32> = (0..FRAME_SIZE).map(|i| i as f32).collect();
        let expected = frame.clone();
        Biquad::IDENTITY.filter(&mut mem, &mut frame);
        assert_eq!(frame, expected);
        assert_eq!(mem, [0.0, 0.0]);
    }

    #[test]
    fn test_random_tilt_within_spread() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let tilt = Biquad::random_tilt(&mut rng);
            for c in tilt.a.iter().chain(tilt.b.iter()) {
                assert!(c.abs() <= 0.375 + 1e-6);
            }
        }
    }

    #[test]
    fn test_preemphasis_carries_memory() {
        let mut mem = 0.0;
        let mut first = vec![1.0f32, 2.0];
        preemphasis(&mut mem, &mut first, 0.5);
        assert_eq!(first, vec![1.0, 1.5]);
        assert_eq!(mem, -1.0);

        let mut second = vec![4.0f32];
        preemphasis(&mut mem, &mut second, 0.5);
        assert_eq!(second, vec![3.0]);
    }

    #[test]
    fn test_gain_ramp_is_linear() {
        let mut conditioner = SignalConditioner::new(&quiet_config());
        conditioner.set_gain(3.0);

        // The filters are linear, so a unity-gain run isolates the ramp.
        let mut reference = SignalConditioner::new(&quiet_config());
        let input: Vec<f32> = (0..FRAME_SIZE).map(|i| ((i % 7) as f32) - 3.0).collect();

        let mut ramped = input.clone();
        let mut flat = input.clone();
        conditioner.process(&mut FilterMemories::default(), &mut ramped);
        reference.process(&mut FilterMemories::default(), &mut flat);

        for i in 0..FRAME_SIZE {
            let f = i as f32 / FRAME_SIZE as f32;
            let expected = flat[i] * (f * 3.0 + (1.0 - f));
            assert!((ramped[i] - expected).abs() < 1e-3);
        }

        // The next frame holds the new gain throughout.
        let mut ramped2 = input.clone();
        let mut flat2 = input;
        let mut mem_a = FilterMemories::default();
        let mut mem_b = FilterMemories::default();
        conditioner.process(&mut mem_a, &mut ramped2);
        reference.process(&mut mem_b, &mut flat2);
        for i in 0..FRAME_SIZE {
            assert!((ramped2[i] - 3.0 * flat2[i]).abs() < 1e-3);
        }
    }

    #[test]
    fn test_dither_is_bounded_and_seeded() {
        let config = ExtractorConfig::default().with_seed(9).with_random_tilt(false);
        let mut a = SignalConditioner::new(&config);
        let mut b = SignalConditioner::new(&config);

        let mut frame_a = vec![0.0f32; FRAME_SIZE];
        let mut frame_b = vec![0.0f32; FRAME_SIZE];
        a.process(&mut FilterMemories::default(), &mut frame_a);
        b.process(&mut FilterMemories::default(), &mut frame_b);

        assert_eq!(frame_a, frame_b);
        assert!(frame_a.iter().all(|&v| (-0.5..0.5).contains(&v)));
        assert!(frame_a.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_same_seed_same_tilt() {
        let config = ExtractorConfig::default().with_seed(11);
        let a = SignalConditioner::new(&config);
        let b = SignalConditioner::new(&config);
        assert_eq!(a.tilt(), b.tilt());
        assert_ne!(a.tilt(), &Biquad::IDENTITY);
    }
}
