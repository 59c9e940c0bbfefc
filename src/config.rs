//! Analysis settings
//!
//! Every knob of the pipeline lives in [`AnalysisConfig`]. The defaults
//! reproduce the reference analysis; a JSON document may override any subset
//! of the fields.
//!
//! The default energy threshold is relative to the loudest part of the
//! recording, so any non-silent capture yields a strong range, however faint.
//! A capture-side integer threshold (sum of squares per 1024-sample window)
//! only takes effect through [`AnalysisConfig::with_energy_threshold`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decimate::DECIMATION_FACTOR;
use crate::display::DownsampleMode;
use crate::endpoint::{EnergyThreshold, TRUNCATION_PORTION};
use crate::formant::FormantFilter;
use crate::response::RESPONSE_STEP_HZ;
use crate::utils::lpc::LpcMethod;
use crate::utils::roots::RootMethod;
use crate::window::WindowShape;
use crate::{AnalysisError, Result, ORDER};

/// Default number of points in the display waveform
pub const DISPLAY_SAMPLES: usize = 600;

/// Which part of the recording the display waveform shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayRegion {
    /// The whole recording
    Full,
    /// The strong-signal range, or the whole recording if there is none
    #[default]
    StrongSignal,
    /// The trimmed vowel range, or the whole recording if there is none
    Vowel,
}

/// Settings for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub threshold: EnergyThreshold,
    pub truncation_portion: f64,
    pub decimation_factor: usize,
    pub lpc_order: usize,
    pub lpc_method: LpcMethod,
    /// Pre-emphasis corner in Hz; 0 disables it
    pub pre_emphasis_from: f64,
    pub window: WindowShape,
    pub root_method: RootMethod,
    pub polish_roots: bool,
    pub formant_filter: FormantFilter,
    pub response_step_hz: f64,
    pub display_samples: usize,
    pub display_mode: DownsampleMode,
    pub display_region: DisplayRegion,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold: EnergyThreshold::default(),
            truncation_portion: TRUNCATION_PORTION,
            decimation_factor: DECIMATION_FACTOR,
            lpc_order: ORDER,
            lpc_method: LpcMethod::default(),
            pre_emphasis_from: 0.0,
            window: WindowShape::default(),
            root_method: RootMethod::default(),
            polish_roots: false,
            formant_filter: FormantFilter::default(),
            response_step_hz: RESPONSE_STEP_HZ,
            display_samples: DISPLAY_SAMPLES,
            display_mode: DownsampleMode::default(),
            display_region: DisplayRegion::default(),
        }
    }
}

impl AnalysisConfig {
    /// Parse and validate a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Analysis with an absolute energy threshold over 1024-sample windows
    ///
    /// Without this the relative default applies and `min_energy` from the
    /// capture side is ignored.
    pub fn with_energy_threshold(mut self, min_energy: u64) -> Self {
        self.threshold = EnergyThreshold::absolute(min_energy);
        self
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<()> {
        match self.threshold {
            EnergyThreshold::Absolute { window, .. } if window == 0 => {
                return Err(invalid("energy window must be positive"));
            }
            EnergyThreshold::Relative {
                chunks,
                sensitivity,
            } => {
                if chunks == 0 {
                    return Err(invalid("chunk count must be positive"));
                }
                if !(sensitivity > 0.0 && sensitivity < 1.0) {
                    return Err(invalid("sensitivity must lie strictly between 0 and 1"));
                }
            }
            _ => {}
        }

        if !(0.0..0.5).contains(&self.truncation_portion) {
            return Err(invalid("truncation portion must lie in [0, 0.5)"));
        }
        if self.decimation_factor == 0 {
            return Err(invalid("decimation factor must be positive"));
        }
        if self.lpc_order == 0 {
            return Err(invalid("LPC order must be positive"));
        }
        if !(self.pre_emphasis_from >= 0.0 && self.pre_emphasis_from.is_finite()) {
            return Err(invalid("pre-emphasis frequency must be finite and not negative"));
        }
        if !(self.response_step_hz > 0.0) {
            return Err(invalid("response step must be positive"));
        }

        let filter = &self.formant_filter;
        if !(filter.min_frequency < filter.max_frequency) {
            return Err(invalid("formant frequency range is empty"));
        }
        if !(0.0..=1.0).contains(&filter.min_pole_magnitude) {
            return Err(invalid("minimum pole magnitude must lie in [0, 1]"));
        }
        if filter.min_separation < 0.0 {
            return Err(invalid("formant separation must not be negative"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> AnalysisError {
    AnalysisError::InvalidParameter(message.to_string())
}
