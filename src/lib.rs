//! formant-analyzer: vowel formant extraction from short speech recordings
//!
//! The library turns a captured 16-bit PCM buffer into the first few vowel
//! formants, the LPC envelope of the vowel and a reduced waveform for plotting.
//!
//! # Pipeline
//!
//! 1. [`endpoint`] - find the strong-energy part of the recording and trim its tails
//! 2. [`decimate`] - keep every 4th sample (44.1 kHz -> 11.025 kHz), then
//!    optional pre-emphasis and tapering ([`window`])
//! 3. [`utils::lpc`] - 20th order linear prediction (autocorrelation + Levinson-Durbin)
//! 4. [`utils::roots`] - all poles of the LPC filter via Laguerre's method with deflation
//! 5. [`formant`] - poles to F1..F4
//! 6. [`response`] - LPC frequency response for plotting
//!
//! [`display`] reduces the waveform for plotting and [`worker`] runs the
//! whole thing on a background thread.
//!
//! # Core Types
//!
//! - [`SampleBuffer`] - Immutable mono PCM capture
//! - [`Analyzer`] - Runs the pipeline for one [`AnalysisConfig`]
//! - [`AnalysisReport`] - Formants, response curve and waveform of one run
//! - [`FormantList`] - Up to four formants, ascending

pub mod sound;
pub mod config;
pub mod endpoint;
pub mod decimate;
pub mod formant;
pub mod response;
pub mod display;
pub mod window;
pub mod analysis;
pub mod worker;

pub mod utils;

// Re-export main types at crate root
pub use sound::SampleBuffer;
pub use config::AnalysisConfig;
pub use endpoint::{EnergyThreshold, SampleRange};
pub use formant::{Formant, FormantList};
pub use response::FrequencyResponseCurve;
pub use display::DownsampleMode;
pub use window::WindowShape;
pub use analysis::{AnalysisReport, Analyzer};
pub use worker::{AnalysisHandle, AnalysisWorker};
pub use utils::lpc::{LpcCoefficients, LpcMethod};
pub use utils::roots::{ComplexPolynomial, RootFinder, RootMethod};

use thiserror::Error;

/// Sample rate of the capture hardware in Hz
pub const SAMPLE_RATE: u32 = 44_100;

/// LPC model order (number of poles)
pub const ORDER: usize = 20;

/// Number of formants reported (F1..F4)
pub const NUM_FORMANTS: usize = 4;

/// Errors that can occur during formant analysis
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV decoding error: {0}")]
    WavDecode(#[from] hound::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("No window of the signal exceeds the energy threshold")]
    NoSignal,

    #[error("Segment has {available} samples, LPC needs more than {needed}")]
    InsufficientSamples { needed: usize, available: usize },

    #[error("Laguerre iteration did not converge within {iterations} iterations (degree {degree})")]
    RootFindingFailed { degree: usize, iterations: usize },

    #[error("Only {} of {} formants survived filtering", .found.len(), NUM_FORMANTS)]
    InsufficientFormants { found: Vec<f64> },

    #[error("Analysis was cancelled")]
    Cancelled,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Analysis error: {0}")]
    Analysis(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AnalysisError::InsufficientFormants {
            found: vec![500.0, 1500.0],
        };
        assert_eq!(err.to_string(), "Only 2 of 4 formants survived filtering");

        let err = AnalysisError::InsufficientSamples {
            needed: 20,
            available: 7,
        };
        assert!(err.to_string().contains("7 samples"));
    }
}
