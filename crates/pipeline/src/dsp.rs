//! Small DSP helpers shared by the conditioning stages
//!
//! Convolution follows the usual full/same/valid conventions: `same` returns
//! the centered `max(n, m)` values of the full convolution, `valid` the
//! `max(n, m) - min(n, m) + 1` values where the signals fully overlap.

/// Full linear convolution, length `a.len() + v.len() - 1`
pub fn convolve_full(a: &[f32], v: &[f32]) -> Vec<f32> {
    if a.is_empty() || v.is_empty() {
        return Vec::new();
    }

    let mut out = vec![0.0f32; a.len() + v.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (j, &y) in v.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Same-mode convolution: centered slice of length `max(a.len(), v.len())`
pub fn convolve_same(a: &[f32], v: &[f32]) -> Vec<f32> {
    if a.is_empty() || v.is_empty() {
        return Vec::new();
    }

    let full = convolve_full(a, v);
    let out_len = a.len().max(v.len());
    let start = (a.len().min(v.len()) - 1) / 2;
    full[start..start + out_len].to_vec()
}

/// Valid-mode convolution: only positions where the signals fully overlap
pub fn convolve_valid(a: &[f32], v: &[f32]) -> Vec<f32> {
    if a.is_empty() || v.is_empty() {
        return Vec::new();
    }

    let full = convolve_full(a, v);
    let min = a.len().min(v.len());
    let max = a.len().max(v.len());
    full[min - 1..max].to_vec()
}

/// Moving average over a centered window (same-mode)
pub fn moving_average(signal: &[f32], window: usize) -> Vec<f32> {
    if signal.is_empty() || window == 0 {
        return signal.to_vec();
    }

    let kernel = vec![1.0 / window as f32; window];
    convolve_same(signal, &kernel)
}

/// Root-mean-square of a signal, 0 for empty input
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = signal.iter().map(|s| s * s).sum();
    (sum_squares / signal.len() as f32).sqrt()
}

/// Percentile of a signal with linear interpolation, `p` in [0, 100]
pub fn percentile(signal: &[f32], p: f32) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }

    let mut sorted: Vec<f32> = signal.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f32;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convolve_full() {
        let out = convolve_full(&[1.0, 2.0, 3.0], &[0.0, 1.0, 0.5]);
        assert_eq!(out, vec![0.0, 1.0, 2.5, 4.0, 1.5]);
    }

    #[test]
    fn test_convolve_same_length() {
        let signal = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let out = convolve_same(&signal, &[0.25, 0.5, 0.25]);
        assert_eq!(out.len(), signal.len());
    }

    #[test]
    fn test_convolve_valid_equal_lengths() {
        // Equal-length inputs overlap fully at exactly one position.
        let out = convolve_valid(&[1.0, 2.0, 3.0], &[1.0, 1.0, 1.0]);
        assert_eq!(out.len(), 1);
        assert!((out[0] - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_convolve_valid_is_symmetric_in_length() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let v = vec![1.0, 1.0];
        assert_eq!(convolve_valid(&a, &v).len(), 3);
        assert_eq!(convolve_valid(&v, &a).len(), 3);
    }

    #[test]
    fn test_moving_average_preserves_length() {
        let signal = vec![1.0; 100];
        let out = moving_average(&signal, 8);
        assert_eq!(out.len(), signal.len());
        // Interior samples see the full window of ones.
        assert!((out[50] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_percentile() {
        let signal = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&signal, 0.0) - 0.0).abs() < 1e-6);
        assert!((percentile(&signal, 50.0) - 2.0).abs() < 1e-6);
        assert!((percentile(&signal, 100.0) - 4.0).abs() < 1e-6);
        assert!((percentile(&signal, 25.0) - 1.0).abs() < 1e-6);
    }
}
