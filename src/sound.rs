//! Sample buffer type for captured speech
//!
//! A [`SampleBuffer`] is the immutable snapshot a capture hands to the
//! analysis: mono 16-bit PCM at a fixed sample rate. It can be built from
//! samples in memory, from little-endian raw PCM (the format of the bundled
//! vowel recordings) or from a mono 16-bit WAV file.

use std::f64::consts::PI;
use std::fs;
use std::path::Path;

use crate::endpoint::SampleRange;
use crate::formant::Formant;
use crate::{AnalysisError, Result, SAMPLE_RATE};

/// Mono 16-bit PCM samples with their sample rate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    /// Signed 16-bit samples
    samples: Vec<i16>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl SampleBuffer {
    /// Create a buffer from samples (will be cloned)
    ///
    /// # Example
    /// ```
    /// use formant_analyzer::SampleBuffer;
    ///
    /// let buffer = SampleBuffer::from_samples(&[0, 120, -120, 0], 44100);
    /// assert_eq!(buffer.num_samples(), 4);
    /// ```
    pub fn from_samples(samples: &[i16], sample_rate: u32) -> Self {
        Self {
            samples: samples.to_vec(),
            sample_rate,
        }
    }

    /// Create a buffer from owned samples (avoids cloning)
    pub fn from_samples_owned(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Interpret little-endian bytes as 16-bit PCM
    ///
    /// # Errors
    /// Returns `InvalidParameter` if the byte count is odd.
    pub fn from_pcm_bytes(bytes: &[u8], sample_rate: u32) -> Result<Self> {
        if bytes.len() % 2 != 0 {
            return Err(AnalysisError::InvalidParameter(format!(
                "raw PCM data has odd length {}",
                bytes.len()
            )));
        }

        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(Self::from_samples_owned(samples, sample_rate))
    }

    /// Load a headerless little-endian 16-bit PCM file
    pub fn from_raw_file<P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_pcm_bytes(&bytes, sample_rate)
    }

    /// Load a mono 16-bit integer WAV file using hound
    ///
    /// # Errors
    /// Multi-channel files and any format other than 16-bit integer PCM are
    /// rejected with `InvalidParameter`.
    pub fn from_wav_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();

        if spec.channels != 1 {
            return Err(AnalysisError::InvalidParameter(format!(
                "expected a mono recording, got {} channels",
                spec.channels
            )));
        }
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(AnalysisError::InvalidParameter(format!(
                "expected 16-bit integer PCM, got {} bits ({:?})",
                spec.bits_per_sample, spec.sample_format
            )));
        }

        let samples = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<i16>, hound::Error>>()?;

        Ok(Self::from_samples_owned(samples, spec.sample_rate))
    }

    /// Load a recording, choosing the decoder from the file extension
    ///
    /// `.wav` files go through [`SampleBuffer::from_wav_file`]; anything else is
    /// treated as raw PCM captured at [`SAMPLE_RATE`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let is_wav = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("wav"))
            .unwrap_or(false);

        if is_wav {
            Self::from_wav_file(path)
        } else {
            Self::from_raw_file(path, SAMPLE_RATE)
        }
    }

    /// Create a pure tone
    ///
    /// # Arguments
    /// * `frequency` - Tone frequency in Hz
    /// * `num_samples` - Length in samples
    /// * `sample_rate` - Sample rate in Hz
    /// * `amplitude` - Peak amplitude in PCM units
    pub fn create_tone(frequency: f64, num_samples: usize, sample_rate: u32, amplitude: f64) -> Self {
        let amplitude = amplitude.clamp(0.0, i16::MAX as f64);
        let samples = (0..num_samples)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                (amplitude * (2.0 * PI * frequency * t).sin()).round() as i16
            })
            .collect();

        Self::from_samples_owned(samples, sample_rate)
    }

    /// Synthesize a steady vowel
    ///
    /// An impulse train at `f0` drives a cascade of two-pole resonators, one per
    /// formant, so the result is an all-pole signal with known resonances. The
    /// output is scaled to a peak of `amplitude`. An `f0` of zero gives a single
    /// impulse response.
    pub fn synthesize_vowel(
        formants: &[Formant],
        f0: f64,
        num_samples: usize,
        sample_rate: u32,
        amplitude: f64,
    ) -> Self {
        let fs = sample_rate as f64;
        let period = if f0 > 0.0 {
            (fs / f0).round().max(1.0) as usize
        } else {
            usize::MAX
        };

        let mut signal: Vec<f64> = (0..num_samples)
            .map(|n| if n % period == 0 { 1.0 } else { 0.0 })
            .collect();

        for formant in formants {
            let radius = (-PI * formant.bandwidth / fs).exp();
            let theta = 2.0 * PI * formant.frequency / fs;
            let a1 = 2.0 * radius * theta.cos();
            let a2 = -radius * radius;
            let (mut y1, mut y2) = (0.0, 0.0);
            for x in signal.iter_mut() {
                let y = *x + a1 * y1 + a2 * y2;
                y2 = y1;
                y1 = y;
                *x = y;
            }
        }

        let peak = signal.iter().fold(0.0f64, |m, x| m.max(x.abs()));
        let scale = if peak > 0.0 {
            amplitude.clamp(0.0, i16::MAX as f64) / peak
        } else {
            0.0
        };
        let samples = signal
            .into_iter()
            .map(|x| (x * scale).round() as i16)
            .collect();

        Self::from_samples_owned(samples, sample_rate)
    }

    /// Create a buffer of zeros
    pub fn create_silence(num_samples: usize, sample_rate: u32) -> Self {
        Self::from_samples_owned(vec![0; num_samples], sample_rate)
    }

    /// Get the sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get a reference to the samples
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Get the number of samples
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// True if the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Half the sample rate
    pub fn nyquist(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }

    /// The range covering every sample
    pub fn full_range(&self) -> SampleRange {
        SampleRange::new(0, self.samples.len())
    }

    /// Borrow the samples inside `range`
    ///
    /// # Errors
    /// Returns `InvalidParameter` if the range reaches past the end of the buffer.
    pub fn slice(&self, range: SampleRange) -> Result<&[i16]> {
        self.samples.get(range.start()..range.end()).ok_or_else(|| {
            AnalysisError::InvalidParameter(format!(
                "range {}..{} exceeds buffer of {} samples",
                range.start(),
                range.end(),
                self.samples.len()
            ))
        })
    }

    /// Mean of the squared samples, 0 for an empty buffer
    pub fn mean_energy(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: f64 = self.samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
        total / self.samples.len() as f64
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> u16 {
        self.samples
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_samples() {
        let buffer = SampleBuffer::from_samples(&[1, -2, 3, -4], 44100);
        assert_eq!(buffer.num_samples(), 4);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.peak(), 4);
        assert_eq!(buffer.nyquist(), 22050.0);
        assert_eq!(buffer.mean_energy(), 7.5);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_mean_energy() {
        assert_eq!(SampleBuffer::create_silence(100, 44100).mean_energy(), 0.0);
        assert_eq!(SampleBuffer::from_samples(&[], 44100).mean_energy(), 0.0);

        // A sine of amplitude A has mean energy A^2 / 2
        let tone = SampleBuffer::create_tone(441.0, 44100, 44100, 10000.0);
        assert!((tone.mean_energy() / 5.0e7 - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_pcm_bytes_little_endian() {
        let bytes = [0x01, 0x00, 0xff, 0xff, 0x00, 0x80];
        let buffer = SampleBuffer::from_pcm_bytes(&bytes, 44100).unwrap();
        assert_eq!(buffer.samples(), &[1, -1, i16::MIN]);
    }

    #[test]
    fn test_pcm_bytes_odd_length() {
        let result = SampleBuffer::from_pcm_bytes(&[0x01, 0x00, 0x02], 44100);
        assert!(matches!(result, Err(AnalysisError::InvalidParameter(_))));
    }

    #[test]
    fn test_slice_bounds() {
        let buffer = SampleBuffer::from_samples(&[10, 20, 30, 40, 50], 44100);
        assert_eq!(buffer.slice(SampleRange::new(1, 3)).unwrap(), &[20, 30]);
        assert!(buffer.slice(SampleRange::new(2, 6)).is_err());
        assert_eq!(buffer.slice(buffer.full_range()).unwrap().len(), 5);
    }

    #[test]
    fn test_pure_tone() {
        let buffer = SampleBuffer::create_tone(441.0, 4410, 44100, 10000.0);
        assert_eq!(buffer.num_samples(), 4410);
        assert!(buffer.peak() >= 9990);
        assert!((buffer.duration() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_synthesized_vowel_is_periodic() {
        let formants = [
            Formant { frequency: 700.0, bandwidth: 80.0 },
            Formant { frequency: 1200.0, bandwidth: 90.0 },
        ];
        let buffer = SampleBuffer::synthesize_vowel(&formants, 100.0, 44100, 44100, 20000.0);
        assert_eq!(buffer.num_samples(), 44100);
        assert_eq!(buffer.peak(), 20000);

        // One impulse every 441 samples: later periods repeat the earlier ones
        let s = buffer.samples();
        let diff: i32 = (0..441)
            .map(|i| (s[20 * 441 + i] as i32 - s[21 * 441 + i] as i32).abs())
            .max()
            .unwrap();
        assert!(diff <= 2);
    }

    #[test]
    fn test_wav_roundtrip() {
        let path = std::env::temp_dir().join("formant_analyzer_sound_roundtrip.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in [0i16, 1000, -1000, 32767, -32768] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = SampleBuffer::from_file(&path).unwrap();
        assert_eq!(buffer.samples(), &[0, 1000, -1000, 32767, -32768]);
        assert_eq!(buffer.sample_rate(), 44100);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_wav_rejects_stereo() {
        let path = std::env::temp_dir().join("formant_analyzer_sound_stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in [0i16, 0, 100, 100] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let result = SampleBuffer::from_wav_file(&path);
        assert!(matches!(result, Err(AnalysisError::InvalidParameter(_))));

        let _ = std::fs::remove_file(&path);
    }
}
