//! The analysis pipeline
//!
//! ```text
//! SampleBuffer -> strong range -> vowel range -> decimate -> [pre-emphasis, window] -> LPC -+-> roots -> formants
//!                                                                                           +-> frequency response
//! SampleBuffer -> display waveform
//! ```
//!
//! Each stage is also available on its own through [`Analyzer`], so a
//! presentation layer can recompute any single result from the same buffer.
//! A failed stage stops everything downstream of it and its error is kept in
//! the [`AnalysisReport`]; nothing numeric is substituted.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::config::{AnalysisConfig, DisplayRegion};
use crate::decimate::{decimate, decimated_rate};
use crate::display::downsample;
use crate::endpoint::{strong_signal_range, SampleRange};
use crate::formant::{extract_formants, FormantList};
use crate::response::{synthesize_response, FrequencyResponseCurve};
use crate::utils::lpc::{estimate, LpcCoefficients};
use crate::utils::roots::RootFinder;
use crate::window::pre_emphasis;
use crate::{AnalysisError, Result, SampleBuffer};

/// Runs the pipeline with one configuration
///
/// `Analyzer::default()` endpoints with the relative threshold; pass a config
/// built with [`AnalysisConfig::with_energy_threshold`] to honour a fixed
/// capture-side threshold instead.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    /// Create an analyzer after validating `config`
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Sample rate of the signal that reaches LPC analysis
    pub fn analysis_rate(&self, buffer: &SampleBuffer) -> f64 {
        decimated_rate(buffer.sample_rate(), self.config.decimation_factor)
    }

    /// The part of the recording carrying a strong signal
    pub fn strong_range(&self, buffer: &SampleBuffer) -> Result<SampleRange> {
        strong_signal_range(buffer.samples(), &self.config.threshold)
    }

    /// The strong range without its onset and offset transients
    pub fn vowel_range(&self, buffer: &SampleBuffer) -> Result<SampleRange> {
        Ok(self
            .strong_range(buffer)?
            .truncated_tails(self.config.truncation_portion))
    }

    /// Decimated vowel samples as floating point, conditioned for LPC
    ///
    /// Pre-emphasis and the window are applied when configured.
    pub fn vowel_samples(&self, buffer: &SampleBuffer) -> Result<Vec<f64>> {
        let range = self.vowel_range(buffer)?;
        let factor = self.config.decimation_factor;
        let decimated = decimate(buffer.slice(range)?, factor)?;
        debug_assert_eq!(decimated.len(), range.decimated(factor).len());

        let mut samples: Vec<f64> = decimated.into_iter().map(f64::from).collect();
        pre_emphasis(
            &mut samples,
            self.config.pre_emphasis_from,
            self.analysis_rate(buffer),
        );
        self.config.window.apply(&mut samples);
        Ok(samples)
    }

    /// LPC coefficients of the vowel
    pub fn lpc(&self, buffer: &SampleBuffer) -> Result<LpcCoefficients> {
        let samples = self.vowel_samples(buffer)?;
        let lpc = estimate(&samples, self.config.lpc_order, self.config.lpc_method)?;
        debug!(
            samples = samples.len(),
            order = lpc.order(),
            error = lpc.prediction_error(),
            "LPC estimated"
        );
        Ok(lpc)
    }

    /// F1..F4 of the recording
    pub fn formants(&self, buffer: &SampleBuffer) -> Result<FormantList> {
        let lpc = self.lpc(buffer)?;
        self.formants_from_lpc(&lpc, self.analysis_rate(buffer), &AtomicBool::new(false))
    }

    /// F1..F4 from already estimated coefficients
    ///
    /// `cancel` is checked between root extractions.
    pub fn formants_from_lpc(
        &self,
        lpc: &LpcCoefficients,
        sample_rate: f64,
        cancel: &AtomicBool,
    ) -> Result<FormantList> {
        let finder = RootFinder::new()
            .with_method(self.config.root_method)
            .with_polish(self.config.polish_roots);
        let roots = finder.find_roots_cancellable(&lpc.characteristic_polynomial(), cancel)?;
        extract_formants(&roots, sample_rate, &self.config.formant_filter)
    }

    /// Normalized LPC frequency response of the recording
    pub fn response(&self, buffer: &SampleBuffer) -> Result<FrequencyResponseCurve> {
        let lpc = self.lpc(buffer)?;
        self.response_from_lpc(&lpc, self.analysis_rate(buffer))
    }

    /// Normalized frequency response from already estimated coefficients
    pub fn response_from_lpc(
        &self,
        lpc: &LpcCoefficients,
        sample_rate: f64,
    ) -> Result<FrequencyResponseCurve> {
        synthesize_response(lpc, sample_rate, self.config.response_step_hz)
    }

    /// Reduced waveform for plotting
    ///
    /// Falls back to the whole recording when the configured region cannot be found.
    pub fn waveform(&self, buffer: &SampleBuffer) -> Vec<i16> {
        let range = match self.config.display_region {
            DisplayRegion::Full => None,
            DisplayRegion::StrongSignal => self.strong_range(buffer).ok(),
            DisplayRegion::Vowel => self.vowel_range(buffer).ok(),
        }
        .unwrap_or_else(|| buffer.full_range());

        let samples = buffer.slice(range).unwrap_or(buffer.samples());
        downsample(samples, self.config.display_samples, self.config.display_mode)
    }

    /// Run every stage
    pub fn run(&self, buffer: &SampleBuffer) -> AnalysisReport {
        self.run_cancellable(buffer, &AtomicBool::new(false))
    }

    /// Run every stage, giving up with `Cancelled` once `cancel` is set
    pub fn run_cancellable(&self, buffer: &SampleBuffer, cancel: &AtomicBool) -> AnalysisReport {
        debug!(
            samples = buffer.num_samples(),
            mean_energy = buffer.mean_energy(),
            "analysis started"
        );
        let strong_range = self.strong_range(buffer).ok();
        let vowel_range = strong_range.map(|r| r.truncated_tails(self.config.truncation_portion));
        let waveform = self.waveform(buffer);

        let outcome = self.spectral_stages(buffer, cancel);
        if let Err(e) = &outcome {
            warn!("analysis of {} samples failed: {}", buffer.num_samples(), e);
        }

        AnalysisReport {
            strong_range,
            vowel_range,
            waveform,
            outcome,
        }
    }

    fn spectral_stages(&self, buffer: &SampleBuffer, cancel: &AtomicBool) -> Result<SpectralResult> {
        let lpc = self.lpc(buffer)?;
        if cancel.load(Ordering::Relaxed) {
            return Err(AnalysisError::Cancelled);
        }

        let rate = self.analysis_rate(buffer);
        let formants = self.formants_from_lpc(&lpc, rate, cancel);
        if matches!(formants, Err(AnalysisError::Cancelled)) {
            return Err(AnalysisError::Cancelled);
        }
        let response = self.response_from_lpc(&lpc, rate);

        Ok(SpectralResult {
            lpc,
            formants,
            response,
        })
    }
}

/// Results that need the LPC model
#[derive(Debug)]
struct SpectralResult {
    lpc: LpcCoefficients,
    formants: Result<FormantList>,
    response: Result<FrequencyResponseCurve>,
}

/// Everything one analysis run produced
///
/// Ranges and the waveform are always present (ranges are `None` without a
/// strong signal). Formants and response carry the condition that stopped
/// them: a failure before LPC is reported by both.
#[derive(Debug)]
pub struct AnalysisReport {
    strong_range: Option<SampleRange>,
    vowel_range: Option<SampleRange>,
    waveform: Vec<i16>,
    outcome: Result<SpectralResult>,
}

impl AnalysisReport {
    /// Strong-signal range of the recording
    pub fn strong_range(&self) -> Option<SampleRange> {
        self.strong_range
    }

    /// Trimmed vowel range of the recording
    pub fn vowel_range(&self) -> Option<SampleRange> {
        self.vowel_range
    }

    /// Display waveform
    pub fn waveform(&self) -> &[i16] {
        &self.waveform
    }

    /// LPC coefficients, or the error of the stages before LPC
    pub fn lpc(&self) -> std::result::Result<&LpcCoefficients, &AnalysisError> {
        self.outcome.as_ref().map(|s| &s.lpc)
    }

    /// F1..F4, or the first error on the way to them
    pub fn formants(&self) -> std::result::Result<&FormantList, &AnalysisError> {
        self.outcome.as_ref().and_then(|s| s.formants.as_ref())
    }

    /// Frequency response, or the first error on the way to it
    pub fn response(&self) -> std::result::Result<&FrequencyResponseCurve, &AnalysisError> {
        self.outcome.as_ref().and_then(|s| s.response.as_ref())
    }

    /// Formant frequencies in Hz; empty unless all four were found
    pub fn formant_frequencies(&self) -> Vec<f64> {
        self.formants().map(|f| f.frequencies()).unwrap_or_default()
    }

    /// The first failure of the run, if any
    pub fn failure(&self) -> Option<&AnalysisError> {
        self.formants().err().or_else(|| self.response().err())
    }

    /// True if every stage succeeded
    pub fn is_success(&self) -> bool {
        self.failure().is_none()
    }
}

impl SampleBuffer {
    /// Analyze this buffer with the given configuration
    ///
    /// # Errors
    /// `InvalidParameter` if the configuration does not validate; analysis
    /// failures are reported inside the returned report.
    pub fn analyze(&self, config: &AnalysisConfig) -> Result<AnalysisReport> {
        Ok(Analyzer::new(config.clone())?.run(self))
    }
}
