//! Frequency response of the LPC synthesis filter
//!
//! The curve is only used for plotting the spectral envelope next to the
//! formants; no formant decision depends on it.

use std::f64::consts::PI;

use num_complex::Complex64;
use serde::Serialize;

use crate::utils::lpc::LpcCoefficients;
use crate::{AnalysisError, Result};

/// Spacing of the response curve in Hz
pub const RESPONSE_STEP_HZ: f64 = 5.0;

/// One point of the response curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResponsePoint {
    /// Frequency in Hz
    pub frequency: f64,
    /// Amplitude normalized to the curve's maximum
    pub amplitude: f64,
}

/// Normalized `|1 / A(e^jw)|` from 0 Hz to Nyquist
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrequencyResponseCurve {
    points: Vec<ResponsePoint>,
}

impl FrequencyResponseCurve {
    pub fn points(&self) -> &[ResponsePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Amplitudes in dB relative to the maximum (0 dB at the peak)
    pub fn to_decibels(&self) -> Vec<f64> {
        self.points
            .iter()
            .map(|p| 20.0 * p.amplitude.log10())
            .collect()
    }

    /// Frequency of the highest point
    pub fn peak_frequency(&self) -> Option<f64> {
        self.points
            .iter()
            .max_by(|a, b| a.amplitude.total_cmp(&b.amplitude))
            .map(|p| p.frequency)
    }
}

/// Evaluate the all-pole filter every `step_hz` from 0 Hz to Nyquist
///
/// # Errors
/// * `InvalidParameter` for a non-positive step or sample rate
/// * `Analysis` if the filter has a pole on the unit circle
pub fn synthesize_response(
    lpc: &LpcCoefficients,
    sample_rate: f64,
    step_hz: f64,
) -> Result<FrequencyResponseCurve> {
    if !(step_hz > 0.0) || !(sample_rate > 0.0) {
        return Err(AnalysisError::InvalidParameter(format!(
            "response step {} Hz at {} Hz sample rate",
            step_hz, sample_rate
        )));
    }

    let taps = lpc.inverse_filter();
    let num_points = (sample_rate / 2.0 / step_hz).floor() as usize + 1;

    let mut points = Vec::with_capacity(num_points);
    for k in 0..num_points {
        let frequency = k as f64 * step_hz;
        let omega = 2.0 * PI * frequency / sample_rate;

        // A(e^jw) = sum taps[n] * e^(-jwn)
        let a: Complex64 = taps
            .iter()
            .enumerate()
            .map(|(n, &tap)| Complex64::from_polar(tap, -omega * n as f64))
            .sum();

        let amplitude = 1.0 / a.norm();
        if !amplitude.is_finite() {
            return Err(AnalysisError::Analysis(format!(
                "LPC filter response is unbounded at {} Hz",
                frequency
            )));
        }
        points.push(ResponsePoint {
            frequency,
            amplitude,
        });
    }

    let max = points.iter().map(|p| p.amplitude).fold(0.0, f64::max);
    for point in &mut points {
        point.amplitude /= max;
    }

    Ok(FrequencyResponseCurve { points })
}
