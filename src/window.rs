//! Conditioning of the vowel segment before LPC
//!
//! Both steps are off in the default analysis, which fits the raw decimated
//! segment. Pre-emphasis flattens the spectral tilt of voiced speech so that
//! the upper formants are not starved of poles; a cosine window tapers the
//! segment ends.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Window shape applied to the vowel segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowShape {
    /// No tapering
    #[default]
    Rectangular,
    /// Hanning window (raised cosine)
    Hanning,
    /// Hamming window
    Hamming,
}

impl WindowShape {
    /// Window value at sample `n` of `size`
    ///
    /// Periodic form: `a - (1 - a) * cos(2*pi*n/size)` with `a` 0.5 (Hanning)
    /// or 0.54 (Hamming).
    pub fn value_at(self, n: usize, size: usize) -> f64 {
        let phase = 2.0 * PI * n as f64 / size.max(1) as f64;
        match self {
            WindowShape::Rectangular => 1.0,
            WindowShape::Hanning => 0.5 - 0.5 * phase.cos(),
            WindowShape::Hamming => 0.54 - 0.46 * phase.cos(),
        }
    }

    /// Generate the window coefficients
    pub fn generate(self, size: usize) -> Vec<f64> {
        (0..size).map(|n| self.value_at(n, size)).collect()
    }

    /// Multiply `samples` by the window in place
    pub fn apply(self, samples: &mut [f64]) {
        if self == WindowShape::Rectangular {
            return;
        }
        let size = samples.len();
        for (n, sample) in samples.iter_mut().enumerate() {
            *sample *= self.value_at(n, size);
        }
    }
}

/// First-order pre-emphasis `y[n] = x[n] - alpha * x[n-1]`
///
/// `alpha = exp(-2*pi*from_frequency/sample_rate)`; the first sample is kept.
/// A non-positive `from_frequency` leaves the samples unchanged.
pub fn pre_emphasis(samples: &mut [f64], from_frequency: f64, sample_rate: f64) {
    if from_frequency <= 0.0 || samples.is_empty() {
        return;
    }
    let alpha = (-2.0 * PI * from_frequency / sample_rate).exp();

    // Walk backwards so every step still sees the unfiltered predecessor
    for n in (1..samples.len()).rev() {
        samples[n] -= alpha * samples[n - 1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rectangular_window() {
        let window = WindowShape::Rectangular.generate(64);
        assert!(window.iter().all(|&w| w == 1.0));

        let mut samples = vec![3.0, -2.0, 5.0];
        WindowShape::Rectangular.apply(&mut samples);
        assert_eq!(samples, vec![3.0, -2.0, 5.0]);
    }

    #[test]
    fn test_cosine_window_values() {
        let hann = WindowShape::Hanning.generate(100);
        assert_relative_eq!(hann[0], 0.0);
        assert_relative_eq!(hann[50], 1.0);
        assert_relative_eq!(hann[25], 0.5, epsilon = 1e-12);

        let hamming = WindowShape::Hamming.generate(100);
        assert_relative_eq!(hamming[0], 0.08, epsilon = 1e-12);
        assert_relative_eq!(hamming[50], 1.0, epsilon = 1e-12);
        // Periodic: w[n] == w[size - n]
        for n in 1..50 {
            assert_relative_eq!(hamming[n], hamming[100 - n], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_apply_matches_generate() {
        let mut samples = vec![2.0; 40];
        WindowShape::Hamming.apply(&mut samples);
        for (s, w) in samples.iter().zip(WindowShape::Hamming.generate(40)) {
            assert_relative_eq!(*s, 2.0 * w);
        }
    }

    #[test]
    fn test_pre_emphasis() {
        let fs = 11025.0;
        let alpha = (-2.0 * PI * 50.0 / fs).exp();
        let mut samples = vec![1.0, 2.0, 4.0, 4.0];
        pre_emphasis(&mut samples, 50.0, fs);

        assert_eq!(samples[0], 1.0);
        assert_relative_eq!(samples[1], 2.0 - alpha);
        assert_relative_eq!(samples[2], 4.0 - 2.0 * alpha);
        assert_relative_eq!(samples[3], 4.0 - 4.0 * alpha);
    }

    #[test]
    fn test_pre_emphasis_removes_dc() {
        let mut samples = vec![1000.0; 256];
        pre_emphasis(&mut samples, 50.0, 11025.0);
        // A constant is reduced to (1 - alpha) of itself after the first sample
        assert!(samples[1..].iter().all(|&s| s < 30.0));
    }

    #[test]
    fn test_pre_emphasis_disabled() {
        let mut samples = vec![1.0, 2.0, 3.0];
        pre_emphasis(&mut samples, 0.0, 11025.0);
        assert_eq!(samples, vec![1.0, 2.0, 3.0]);
        pre_emphasis(&mut [], 50.0, 11025.0);
    }
}
