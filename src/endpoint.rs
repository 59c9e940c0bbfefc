//! Endpoint detection: locating the vowel inside a recording
//!
//! A recording of a single spoken word contains silence, a consonant onset,
//! the vowel and a decay. The detector finds the strong-energy part of the
//! signal from windowed sums of squares, and [`SampleRange::truncated_tails`]
//! then drops the onset and offset transients so that only the steady vowel
//! reaches LPC analysis.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AnalysisError, Result};

/// Window length for absolute energy detection, one capture block
pub const ENERGY_WINDOW: usize = 1024;

/// Portion of the strong range dropped from each end
pub const TRUNCATION_PORTION: f64 = 0.15;

/// Half-open range of sample indices `start..end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SampleRange {
    start: usize,
    end: usize,
}

impl SampleRange {
    /// Create a range; `start` is clamped so that `start <= end` always holds
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start.min(end),
            end,
        }
    }

    /// First index in the range
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last index in the range
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of samples covered
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True if the range covers no samples
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Shrink the range by `portion` of its length on each side
    ///
    /// Offsets are rounded to the nearest sample, so a range of 14278 samples
    /// loses 2142 samples at the front and keeps 9994.
    ///
    /// # Arguments
    /// * `portion` - Fraction to remove from each end, clamped to `0.0..=0.5`
    pub fn truncated_tails(&self, portion: f64) -> SampleRange {
        let portion = portion.clamp(0.0, 0.5);
        let len = self.len() as f64;
        let start = self.start + (portion * len).round() as usize;
        let end = self.start + ((1.0 - portion) * len).round() as usize;
        SampleRange::new(start, end)
    }

    /// Index range of this segment after decimation by `factor`
    ///
    /// The decimated segment starts at index 0 and ends at `floor(len / factor)`.
    /// A zero factor gives an empty range.
    pub fn decimated(&self, factor: usize) -> SampleRange {
        let end = if factor == 0 { 0 } else { self.len() / factor };
        SampleRange::new(0, end)
    }
}

/// How the strong part of a signal is recognised
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyThreshold {
    /// Fixed sum-of-squares level per window, as set on the capture side
    Absolute { min_energy: u64, window: usize },
    /// Fraction of the loudest chunk's energy, the signal cut into `chunks` equal chunks
    Relative { chunks: usize, sensitivity: f64 },
}

impl EnergyThreshold {
    /// Absolute threshold over [`ENERGY_WINDOW`]-sample windows
    pub fn absolute(min_energy: u64) -> Self {
        EnergyThreshold::Absolute {
            min_energy,
            window: ENERGY_WINDOW,
        }
    }
}

impl Default for EnergyThreshold {
    fn default() -> Self {
        EnergyThreshold::Relative {
            chunks: 300,
            sensitivity: 0.1,
        }
    }
}

/// Sum of squares of each consecutive `window`-sample block
///
/// A trailing partial block is included.
pub fn window_energies(samples: &[i16], window: usize) -> Vec<u64> {
    if window == 0 {
        return Vec::new();
    }
    samples.chunks(window).map(block_energy).collect()
}

fn block_energy(block: &[i16]) -> u64 {
    block
        .iter()
        .map(|&s| {
            let s = i64::from(s);
            (s * s) as u64
        })
        .sum()
}

/// Find the part of `samples` that carries a strong signal
///
/// # Errors
/// * `NoSignal` if no window exceeds the threshold (silent or empty input)
/// * `InvalidParameter` for a zero window or chunk count
pub fn strong_signal_range(samples: &[i16], threshold: &EnergyThreshold) -> Result<SampleRange> {
    let range = match *threshold {
        EnergyThreshold::Absolute { min_energy, window } => {
            absolute_range(samples, min_energy, window)?
        }
        EnergyThreshold::Relative {
            chunks,
            sensitivity,
        } => relative_range(samples, chunks, sensitivity)?,
    };

    debug!(
        start = range.start(),
        end = range.end(),
        total = samples.len(),
        "strong signal range"
    );
    Ok(range)
}

/// First contiguous run of windows above `min_energy`
fn absolute_range(samples: &[i16], min_energy: u64, window: usize) -> Result<SampleRange> {
    if window == 0 {
        return Err(AnalysisError::InvalidParameter(
            "energy window must be at least one sample".to_string(),
        ));
    }

    let energies = window_energies(samples, window);
    let first = energies
        .iter()
        .position(|&e| e > min_energy)
        .ok_or(AnalysisError::NoSignal)?;
    let run = energies[first..]
        .iter()
        .take_while(|&&e| e > min_energy)
        .count();

    let start = first * window;
    let end = ((first + run) * window).min(samples.len());
    Ok(SampleRange::new(start, end))
}

/// First through last chunk above `sensitivity` times the loudest chunk
fn relative_range(samples: &[i16], chunks: usize, sensitivity: f64) -> Result<SampleRange> {
    if chunks == 0 {
        return Err(AnalysisError::InvalidParameter(
            "chunk count must be positive".to_string(),
        ));
    }
    if samples.is_empty() {
        return Err(AnalysisError::NoSignal);
    }

    // Only whole chunks take part; the remainder after the last one is ignored
    let chunk_size = (samples.len() / chunks).max(1);
    let energies: Vec<u64> = samples.chunks_exact(chunk_size).map(block_energy).collect();

    let max_energy = energies.iter().copied().max().unwrap_or(0);
    if max_energy == 0 {
        return Err(AnalysisError::NoSignal);
    }

    let level = max_energy as f64 * sensitivity;
    let is_strong = |e: &u64| *e as f64 > level;
    let first = energies
        .iter()
        .position(is_strong)
        .ok_or(AnalysisError::NoSignal)?;
    let last = energies
        .iter()
        .rposition(is_strong)
        .ok_or(AnalysisError::NoSignal)?;

    let start = first * chunk_size;
    let end = ((last + 1) * chunk_size).min(samples.len());
    Ok(SampleRange::new(start, end))
}
