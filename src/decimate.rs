//! Sample-rate reduction by plain decimation
//!
//! Formants of interest lie below 5 kHz, so the 44.1 kHz capture is reduced
//! by keeping every 4th sample (11.025 kHz, Nyquist 5512.5 Hz). No
//! anti-aliasing filter is applied: energy above the new Nyquist folds back
//! into the analysed band.

use crate::{AnalysisError, Result};

/// Default decimation factor
pub const DECIMATION_FACTOR: usize = 4;

/// Keep the first of every `factor` samples
///
/// The output has exactly `floor(samples.len() / factor)` samples; a trailing
/// partial group is dropped.
///
/// # Errors
/// Returns `InvalidParameter` if `factor` is zero.
pub fn decimate(samples: &[i16], factor: usize) -> Result<Vec<i16>> {
    if factor == 0 {
        return Err(AnalysisError::InvalidParameter(
            "decimation factor must be positive".to_string(),
        ));
    }

    Ok(samples
        .chunks_exact(factor)
        .map(|group| group[0])
        .collect())
}

/// Sample rate after decimating by `factor`
pub fn decimated_rate(sample_rate: u32, factor: usize) -> f64 {
    sample_rate as f64 / factor.max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimate_length_is_floor() {
        let samples: Vec<i16> = (0..64).collect();
        for len in 4..samples.len() {
            let out = decimate(&samples[..len], DECIMATION_FACTOR).unwrap();
            assert_eq!(out.len(), len / DECIMATION_FACTOR);
        }
    }

    #[test]
    fn test_decimate_keeps_every_fourth() {
        let samples: Vec<i16> = (0..10).collect();
        assert_eq!(decimate(&samples, 4).unwrap(), vec![0, 4]);
        assert_eq!(decimate(&samples, 1).unwrap(), samples);
        assert!(decimate(&samples[..3], 4).unwrap().is_empty());
    }

    #[test]
    fn test_decimate_zero_factor() {
        assert!(matches!(
            decimate(&[1, 2, 3], 0),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_decimated_rate() {
        assert_eq!(decimated_rate(44100, DECIMATION_FACTOR), 11025.0);
    }
}
