//! Autocorrelation pitch estimator with octave (doubling) resolution.
//!
//! Periods are reported in half-sample units: a period of `P` samples is `2P`.

use crate::lpc;
use crate::state::StreamState;
use crate::{FRAME_SIZE, PITCH_BUF_SIZE, PITCH_FRAME_SIZE, PITCH_MAX_PERIOD, PITCH_MIN_PERIOD};

/// Period (half-sample units) that maps to a normalized feature of 0.
pub const PITCH_REFERENCE_OFFSET: i32 = 200;

/// Companion lag tested alongside `T0/k`.
const SECOND_CHECK: [i32; 16] = [0, 0, 3, 2, 3, 2, 5, 2, 3, 2, 3, 2, 5, 2, 3, 2];

/// Accepted pitch for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Period in half-sample units.
    pub period: i32,
    /// Voicing confidence in [0, 1].
    pub gain: f32,
}

impl PitchEstimate {
    /// `0.01 * (period - 200)`, the value stored in the feature vector.
    pub fn normalized_period(&self) -> f32 {
        normalize_period(self.period)
    }
}

/// Map a half-sample period onto the feature scale.
pub fn normalize_period(period: i32) -> f32 {
    0.01 * (period - PITCH_REFERENCE_OFFSET) as f32
}

/// Stateful pitch tracker. History and continuity live in [`StreamState`].
#[derive(Debug, Clone)]
pub struct PitchEstimator {
    scratch: Vec<f32>,
}

impl PitchEstimator {
    pub fn new() -> Self {
        Self {
            scratch: vec![0.0; PITCH_BUF_SIZE],
        }
    }

    /// Push `frame` into the history and estimate the pitch of the newest window.
    pub fn estimate(&mut self, state: &mut StreamState, frame: &[f32]) -> PitchEstimate {
        debug_assert_eq!(frame.len(), FRAME_SIZE);
        state.pitch_buf.copy_within(FRAME_SIZE.., 0);
        state.pitch_buf[PITCH_BUF_SIZE - FRAME_SIZE..].copy_from_slice(frame);

        self.scratch.copy_from_slice(&state.pitch_buf);
        whiten(&mut self.scratch);

        let index = pitch_search(
            &self.scratch[PITCH_MAX_PERIOD..],
            &self.scratch,
            PITCH_FRAME_SIZE << 1,
            (PITCH_MAX_PERIOD - 3 * PITCH_MIN_PERIOD) << 1,
        );
        let mut period = 2 * PITCH_MAX_PERIOD as i32 - index;
        let gain = remove_doubling(
            &self.scratch,
            2 * PITCH_MAX_PERIOD,
            2 * PITCH_MIN_PERIOD,
            2 * PITCH_FRAME_SIZE,
            &mut period,
            state.last_period,
            state.last_gain,
        );
        state.last_period = period;
        state.last_gain = gain;

        PitchEstimate { period, gain }
    }
}

impl Default for PitchEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten the spectral envelope of `x` in place with a bandwidth-expanded
/// order-4 LPC inverse filter plus a zero at 0.8.
pub(crate) fn whiten(x: &mut [f32]) {
    let mut ac = [0.0f32; 5];
    lpc::autocorrelation(x, &mut ac);

    // Noise floor -40 dB
    ac[0] *= 1.0001;
    for (i, v) in ac.iter_mut().enumerate().skip(1) {
        let w = 0.008 * i as f32;
        *v -= *v * w * w;
    }

    let mut a = [0.0f32; 4];
    lpc::levinson(&mut a, &ac);
    let mut tmp = 1.0f32;
    for v in a.iter_mut() {
        tmp *= 0.9;
        *v *= tmp;
    }

    let c1 = 0.8f32;
    let num = [
        a[0] + c1,
        a[1] + c1 * a[0],
        a[2] + c1 * a[1],
        a[3] + c1 * a[2],
        c1 * a[3],
    ];
    lpc::fir5(x, &num);
}

fn inner_prod(x: &[f32], y: &[f32]) -> f32 {
    x.iter().zip(y.iter()).map(|(a, b)| a * b).sum()
}

/// `xcorr[i] = sum_j x[j] y[i + j]` for every `i` in `xcorr`.
fn pitch_xcorr(x: &[f32], y: &[f32], xcorr: &mut [f32]) {
    let len = x.len();
    for (i, out) in xcorr.iter_mut().enumerate() {
        *out = inner_prod(x, &y[i..i + len]);
    }
}

/// Two best lags by normalized correlation `xcorr^2 / Syy`.
fn find_best_pitch(xcorr: &[f32], y: &[f32], len: usize) -> [usize; 2] {
    let mut syy: f64 = 1.0;
    for &v in &y[..len] {
        syy += v as f64 * v as f64;
    }

    let mut best_num = [-1.0f64; 2];
    let mut best_den = [0.0f64; 2];
    let mut best_pitch = [0usize, 1];

    for (i, &xc) in xcorr.iter().enumerate() {
        if xc > 0.0 {
            let xc = xc as f64;
            let num = xc * xc;
            if num * best_den[1] > best_num[1] * syy {
                if num * best_den[0] > best_num[0] * syy {
                    best_num[1] = best_num[0];
                    best_den[1] = best_den[0];
                    best_pitch[1] = best_pitch[0];
                    best_num[0] = num;
                    best_den[0] = syy;
                    best_pitch[0] = i;
                } else {
                    best_num[1] = num;
                    best_den[1] = syy;
                    best_pitch[1] = i;
                }
            }
        }
        let enter = y[i + len] as f64;
        let leave = y[i] as f64;
        syy = (syy + enter * enter - leave * leave).max(1.0);
    }
    best_pitch
}

/// Parabolic-style refinement: `+1`, `-1` or `0` toward the stronger neighbour.
fn interp_offset(a: f32, b: f32, c: f32) -> i32 {
    if (c - a) > 0.7 * (b - a) {
        1
    } else if (a - c) > 0.7 * (b - c) {
        -1
    } else {
        0
    }
}

/// Coarse-to-fine correlation search.
///
/// `x_lp` is the newest `len/2` samples, `y` the history starting `max_pitch/2`
/// samples earlier. Returns the best lag offset in half-sample units, counted
/// from the start of `y`.
pub(crate) fn pitch_search(x_lp: &[f32], y: &[f32], len: usize, max_pitch: usize) -> i32 {
    let lag = len + max_pitch;

    let x_lp4: Vec<f32> = (0..len >> 2).map(|j| x_lp[2 * j]).collect();
    let y_lp4: Vec<f32> = (0..lag >> 2).map(|j| y[2 * j]).collect();

    let mut xcorr = vec![0.0f32; max_pitch >> 1];
    pitch_xcorr(&x_lp4, &y_lp4, &mut xcorr[..max_pitch >> 2]);
    let best = find_best_pitch(&xcorr[..max_pitch >> 2], &y_lp4, len >> 2);

    let half = len >> 1;
    for (i, out) in xcorr.iter_mut().enumerate() {
        *out = 0.0;
        let i_ = i as i64;
        if (i_ - 2 * best[0] as i64).abs() > 2 && (i_ - 2 * best[1] as i64).abs() > 2 {
            continue;
        }
        *out = inner_prod(&x_lp[..half], &y[i..i + half]).max(-1.0);
    }
    let best = find_best_pitch(&xcorr, y, half);

    let offset = if best[0] > 0 && best[0] < (max_pitch >> 1) - 1 {
        interp_offset(xcorr[best[0] - 1], xcorr[best[0]], xcorr[best[0] + 1])
    } else {
        0
    };
    2 * best[0] as i32 - offset
}

fn compute_pitch_gain(xy: f32, xx: f32, yy: f32) -> f32 {
    (xy as f64 / (1.0 + xx as f64 * yy as f64).sqrt()) as f32
}

/// Replace a coarse period with a sub-multiple when the sub-multiple correlates
/// comparably well, favouring periods close to `prev_period`.
///
/// All period arguments are in half-sample units; `x` holds `maxperiod/2`
/// samples of lag history followed by the `n/2`-sample analysis window.
/// Updates `t0` to the accepted period and returns the pitch gain.
pub(crate) fn remove_doubling(
    x: &[f32],
    maxperiod: usize,
    minperiod: usize,
    n: usize,
    t0: &mut i32,
    prev_period: i32,
    prev_gain: f32,
) -> f32 {
    let minperiod0 = minperiod as i32;
    let maxperiod = maxperiod / 2;
    let minperiod = (minperiod / 2) as i32;
    let n = n / 2;
    let prev_period = prev_period / 2;
    let mut base_t0 = *t0 / 2;
    if base_t0 >= maxperiod as i32 {
        base_t0 = maxperiod as i32 - 1;
    }
    let t0_ = base_t0 as usize;

    let base = maxperiod;
    let cur = &x[base..base + n];
    let lagged = |t: usize| &x[base - t..base - t + n];

    let xx = inner_prod(cur, cur);
    let mut xy = inner_prod(cur, lagged(t0_));

    let mut yy_lookup = vec![0.0f32; maxperiod + 1];
    yy_lookup[0] = xx;
    let mut yy = xx;
    for i in 1..=maxperiod {
        let enter = x[base - i];
        let leave = x[base + n - i];
        yy += enter * enter - leave * leave;
        yy_lookup[i] = yy.max(0.0);
    }
    yy = yy_lookup[t0_];
    let mut best_xy = xy;
    let mut best_yy = yy;
    let g0 = compute_pitch_gain(xy, xx, yy);
    let mut g = g0;
    let mut t = base_t0;

    // Look for a strong correlation at T0/k
    for k in 2..=15i32 {
        let t1 = (2 * base_t0 + k) / (2 * k);
        if t1 < minperiod {
            break;
        }
        let t1b = if k == 2 {
            if t1 + base_t0 > maxperiod as i32 {
                base_t0
            } else {
                base_t0 + t1
            }
        } else {
            (2 * SECOND_CHECK[k as usize] * base_t0 + k) / (2 * k)
        };

        let xy1 = inner_prod(cur, lagged(t1 as usize));
        let xy2 = inner_prod(cur, lagged(t1b as usize));
        xy = 0.5 * (xy1 + xy2);
        yy = 0.5 * (yy_lookup[t1 as usize] + yy_lookup[t1b as usize]);
        let g1 = compute_pitch_gain(xy, xx, yy);

        let cont = if (t1 - prev_period).abs() <= 1 {
            prev_gain
        } else if (t1 - prev_period).abs() <= 2 && 5 * k * k < base_t0 {
            0.5 * prev_gain
        } else {
            0.0
        };
        // Short periods need a stronger correlation to beat short-term structure.
        let thresh = if t1 < 3 * minperiod {
            (0.85 * g0 - cont).max(0.4)
        } else {
            (0.7 * g0 - cont).max(0.3)
        };
        if g1 > thresh {
            best_xy = xy;
            best_yy = yy;
            t = t1;
            g = g1;
        }
    }

    let best_xy = best_xy.max(0.0);
    let mut pg = if best_yy <= best_xy {
        1.0
    } else {
        best_xy / (best_yy + 1.0)
    };

    let mut xcorr = [0.0f32; 3];
    for (k, out) in xcorr.iter_mut().enumerate() {
        *out = inner_prod(cur, lagged((t + k as i32 - 1) as usize));
    }
    let offset = interp_offset(xcorr[0], xcorr[1], xcorr[2]);
    if pg > g {
        pg = g;
    }

    *t0 = (2 * t + offset).max(minperiod0);
    // Anti-correlated windows report no voicing.
    pg.max(0.0)
}
