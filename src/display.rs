//! Waveform reduction for plotting

use serde::{Deserialize, Serialize};

/// How a chunk of samples is represented on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownsampleMode {
    /// Largest sample of each chunk, keeps the positive envelope visible
    #[default]
    ChunkMax,
    /// First sample of each chunk
    Stride,
}

/// Reduce `samples` to `target` representative values
///
/// The input is cut into `target` chunks of `len / target` samples, the last
/// chunk taking the remainder. Inputs that already fit are returned as they are.
pub fn downsample(samples: &[i16], target: usize, mode: DownsampleMode) -> Vec<i16> {
    if target == 0 {
        return Vec::new();
    }
    if samples.len() <= target {
        return samples.to_vec();
    }

    let chunk_size = samples.len() / target;
    (0..target)
        .map(|i| {
            let start = i * chunk_size;
            let end = if i + 1 == target {
                samples.len()
            } else {
                start + chunk_size
            };
            match mode {
                DownsampleMode::ChunkMax => samples[start..end].iter().copied().max().unwrap_or(0),
                DownsampleMode::Stride => samples[start],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_max() {
        let samples = [1, 5, -3, 2, 0, -7, 4, 4, 9, 1];
        assert_eq!(downsample(&samples, 3, DownsampleMode::ChunkMax), vec![5, 2, 9]);
    }

    #[test]
    fn test_stride() {
        let samples: Vec<i16> = (0..12).collect();
        assert_eq!(downsample(&samples, 4, DownsampleMode::Stride), vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_exact_target_length() {
        let samples: Vec<i16> = (0..1000).map(|i| (i % 17) as i16).collect();
        for target in [1, 7, 100, 333, 999] {
            assert_eq!(downsample(&samples, target, DownsampleMode::ChunkMax).len(), target);
        }
    }

    #[test]
    fn test_short_and_empty() {
        assert_eq!(downsample(&[1, 2, 3], 10, DownsampleMode::ChunkMax), vec![1, 2, 3]);
        assert!(downsample(&[1, 2, 3], 0, DownsampleMode::ChunkMax).is_empty());
        assert!(downsample(&[], 5, DownsampleMode::Stride).is_empty());
    }
}
