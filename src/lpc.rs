//! Autocorrelation and Levinson-Durbin helpers.

/// `ac[k] = sum x[i] x[i-k]` for `k` in `0..ac.len()`.
pub fn autocorrelation(x: &[f32], ac: &mut [f32]) {
    for (k, out) in ac.iter_mut().enumerate() {
        *out = x[k..].iter().zip(x.iter()).map(|(a, b)| a * b).sum();
    }
}

/// Levinson-Durbin recursion for `lpc.len()` coefficients from `ac` (`lpc.len() + 1` lags).
///
/// Stops early once the prediction error drops 30 dB below `ac[0]`.
/// Returns the residual prediction error. An all-zero `ac` yields zero coefficients.
pub fn levinson(lpc: &mut [f32], ac: &[f32]) -> f32 {
    let p = lpc.len();
    debug_assert!(ac.len() > p);
    lpc.fill(0.0);

    let mut error = ac[0];
    if ac[0] == 0.0 {
        return error;
    }

    for i in 0..p {
        let mut rr = 0.0f32;
        for j in 0..i {
            rr += lpc[j] * ac[i - j];
        }
        rr += ac[i + 1];
        let r = -rr / error;
        lpc[i] = r;
        for j in 0..(i + 1) >> 1 {
            let tmp1 = lpc[j];
            let tmp2 = lpc[i - 1 - j];
            lpc[j] = tmp1 + r * tmp2;
            lpc[i - 1 - j] = tmp2 + r * tmp1;
        }
        error -= r * r * error;
        if error < 0.001 * ac[0] {
            break;
        }
    }
    error
}

/// In-place 5-tap FIR `y[i] = x[i] + sum num[k] x[i-1-k]` starting from zero memory.
pub fn fir5(x: &mut [f32], num: &[f32; 5]) {
    let mut mem = [0.0f32; 5];
    for sample in x.iter_mut() {
        let xi = *sample;
        let mut sum = xi;
        for (n, m) in num.iter().zip(mem.iter()) {
            sum += n * m;
        }
        mem.copy_within(0..4, 1);
        mem[0] = xi;
        *sample = sum;
    }
}
