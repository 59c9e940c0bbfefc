//! Formant extraction from LPC poles
//!
//! Every pole `r * e^(i*theta)` of the LPC synthesis filter is a candidate
//! resonance at `theta * fs / (2*pi)` Hz with bandwidth `-ln(r) * fs / pi` Hz.
//! Poles in the lower half-plane mirror those in the upper one, so only
//! `theta > 0` is kept. Poles far inside the unit circle are broad, non-resonant
//! shaping poles and are discarded. The survivors are sorted and the lowest
//! four reported as F1..F4.

use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AnalysisError, Result, NUM_FORMANTS};

/// Smallest pole radius accepted as a resonance (bandwidth below ~530 Hz at 11025 Hz)
pub const MIN_POLE_MAGNITUDE: f64 = 0.85;

/// Lowest plausible formant in Hz
pub const MIN_FORMANT_HZ: f64 = 50.0;

/// Highest plausible formant in Hz
pub const MAX_FORMANT_HZ: f64 = 5000.0;

/// Candidates closer than this (Hz) are merged into one
pub const MIN_FORMANT_SEPARATION_HZ: f64 = 10.0;

/// Validity limits for formant candidates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormantFilter {
    pub min_pole_magnitude: f64,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub min_separation: f64,
}

impl Default for FormantFilter {
    fn default() -> Self {
        Self {
            min_pole_magnitude: MIN_POLE_MAGNITUDE,
            min_frequency: MIN_FORMANT_HZ,
            max_frequency: MAX_FORMANT_HZ,
            min_separation: MIN_FORMANT_SEPARATION_HZ,
        }
    }
}

/// A single formant (frequency and bandwidth in Hz)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Formant {
    pub frequency: f64,
    pub bandwidth: f64,
}

impl Formant {
    /// The resonance described by an upper half-plane pole, `None` otherwise
    pub fn from_pole(pole: Complex64, sample_rate: f64) -> Option<Formant> {
        let theta = pole.arg();
        if theta <= 0.0 {
            return None;
        }
        let magnitude = pole.norm();
        let bandwidth = if magnitude > 0.0 {
            -magnitude.ln() * sample_rate / PI
        } else {
            sample_rate / 2.0
        };
        Some(Formant {
            frequency: theta * sample_rate / (2.0 * PI),
            bandwidth,
        })
    }
}

/// Up to four formants in ascending frequency
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormantList {
    formants: Vec<Formant>,
}

impl FormantList {
    /// Get a specific formant (1-indexed: F1, F2, F3, F4)
    pub fn get(&self, formant_number: usize) -> Option<&Formant> {
        if formant_number == 0 {
            return None;
        }
        self.formants.get(formant_number - 1)
    }

    /// Formant frequencies in Hz
    pub fn frequencies(&self) -> Vec<f64> {
        self.formants.iter().map(|f| f.frequency).collect()
    }

    pub fn formants(&self) -> &[Formant] {
        &self.formants
    }

    pub fn len(&self) -> usize {
        self.formants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formants.is_empty()
    }

    /// True when all of F1..F4 were found
    pub fn is_complete(&self) -> bool {
        self.formants.len() == NUM_FORMANTS
    }
}

/// Map roots of the LPC polynomial to F1..F4
///
/// # Arguments
/// * `roots` - Poles of the synthesis filter, in any order
/// * `sample_rate` - Rate of the analysed (decimated) signal in Hz
/// * `filter` - Validity limits for candidates
///
/// # Errors
/// `InsufficientFormants` with the surviving frequencies if fewer than four remain.
pub fn extract_formants(
    roots: &[Complex64],
    sample_rate: f64,
    filter: &FormantFilter,
) -> Result<FormantList> {
    let nyquist = sample_rate / 2.0;

    let mut candidates: Vec<Formant> = roots
        .iter()
        .filter(|root| root.norm() >= filter.min_pole_magnitude)
        .filter_map(|&root| Formant::from_pole(root, sample_rate))
        .filter(|f| {
            f.frequency <= nyquist
                && f.frequency >= filter.min_frequency
                && f.frequency <= filter.max_frequency
        })
        .collect();

    candidates.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
    merge_close_candidates(&mut candidates, filter.min_separation);
    candidates.truncate(NUM_FORMANTS);

    debug!(
        roots = roots.len(),
        formants = candidates.len(),
        "formant candidates {:?}",
        candidates.iter().map(|f| f.frequency).collect::<Vec<_>>()
    );

    if candidates.len() < NUM_FORMANTS {
        return Err(AnalysisError::InsufficientFormants {
            found: candidates.iter().map(|f| f.frequency).collect(),
        });
    }

    Ok(FormantList {
        formants: candidates,
    })
}

/// Replace neighbours closer than `min_separation` by their mean until none remain
fn merge_close_candidates(candidates: &mut Vec<Formant>, min_separation: f64) {
    loop {
        let close = candidates
            .windows(2)
            .position(|pair| (pair[1].frequency - pair[0].frequency).abs() < min_separation);

        let Some(index) = close else {
            break;
        };

        let next = candidates.remove(index + 1);
        let merged = &mut candidates[index];
        merged.frequency = (merged.frequency + next.frequency) / 2.0;
        merged.bandwidth = (merged.bandwidth + next.bandwidth) / 2.0;
        candidates.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FS: f64 = 11025.0;

    fn pole_pair(frequency: f64, radius: f64) -> [Complex64; 2] {
        let pole = Complex64::from_polar(radius, 2.0 * PI * frequency / FS);
        [pole, pole.conj()]
    }

    fn poles(pairs: &[(f64, f64)]) -> Vec<Complex64> {
        pairs.iter().flat_map(|&(f, r)| pole_pair(f, r)).collect()
    }

    #[test]
    fn test_four_formants_from_poles() {
        let mut roots = poles(&[(3500.0, 0.95), (500.0, 0.97), (2500.0, 0.96), (1500.0, 0.97)]);
        // A real pole, a broad pole and one above the formant range
        roots.push(Complex64::new(0.6, 0.0));
        roots.extend(pole_pair(4000.0, 0.5));
        roots.extend(pole_pair(5300.0, 0.97));

        let formants = extract_formants(&roots, FS, &FormantFilter::default()).unwrap();
        assert!(formants.is_complete());
        let expected = [500.0, 1500.0, 2500.0, 3500.0];
        for (found, want) in formants.frequencies().iter().zip(expected) {
            assert_relative_eq!(*found, want, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_bandwidth_from_radius() {
        let [pole, _] = pole_pair(1000.0, 0.95);
        let formant = Formant::from_pole(pole, FS).unwrap();
        assert_relative_eq!(formant.frequency, 1000.0, epsilon = 1e-9);
        assert_relative_eq!(formant.bandwidth, -(0.95f64.ln()) * FS / PI, epsilon = 1e-9);
        assert!(Formant::from_pole(pole.conj(), FS).is_none());
        assert!(Formant::from_pole(Complex64::new(0.9, 0.0), FS).is_none());
    }

    #[test]
    fn test_insufficient_formants_keeps_partial_list() {
        let roots = poles(&[(700.0, 0.97), (1200.0, 0.97)]);
        match extract_formants(&roots, FS, &FormantFilter::default()) {
            Err(AnalysisError::InsufficientFormants { found }) => {
                assert_eq!(found.len(), 2);
                assert_relative_eq!(found[0], 700.0, epsilon = 1e-9);
                assert_relative_eq!(found[1], 1200.0, epsilon = 1e-9);
            }
            other => panic!("expected InsufficientFormants, got {:?}", other),
        }
    }

    #[test]
    fn test_close_candidates_are_merged() {
        let roots = poles(&[
            (1000.0, 0.97),
            (1005.0, 0.97),
            (2000.0, 0.97),
            (3000.0, 0.97),
            (4000.0, 0.97),
        ]);
        let formants = extract_formants(&roots, FS, &FormantFilter::default()).unwrap();
        assert_relative_eq!(formants.get(1).unwrap().frequency, 1002.5, epsilon = 1e-9);
        assert_relative_eq!(formants.get(2).unwrap().frequency, 2000.0, epsilon = 1e-9);
        assert!(formants.get(0).is_none());
        assert!(formants.get(5).is_none());
    }

    #[test]
    fn test_output_is_bounded_and_ascending() {
        let roots = poles(&[
            (4500.0, 0.9),
            (300.0, 0.99),
            (3300.0, 0.9),
            (800.0, 0.95),
            (2100.0, 0.92),
            (1200.0, 0.97),
        ]);
        let formants = extract_formants(&roots, FS, &FormantFilter::default()).unwrap();
        let frequencies = formants.frequencies();
        assert!(frequencies.len() <= NUM_FORMANTS);
        assert!(frequencies.iter().all(|&f| f >= 0.0));
        assert!(frequencies.windows(2).all(|pair| pair[0] < pair[1]));
        assert_relative_eq!(frequencies[0], 300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_roots() {
        let result = extract_formants(&[], FS, &FormantFilter::default());
        assert!(matches!(
            result,
            Err(AnalysisError::InsufficientFormants { ref found }) if found.is_empty()
        ));
    }
}
