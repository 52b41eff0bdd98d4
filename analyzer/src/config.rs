use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tunable constants for [`crate::Analyzer`].
///
/// `moderate_volatility` and `high_volatility` are upper bounds on the
/// standard deviation of fractional daily returns (0.015 == 1.5%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub short_window: usize,
    pub long_window: usize,
    /// Percent change (in percent units) inside which the trend is flat.
    pub flat_band_percent: f64,
    pub moderate_volatility: f64,
    pub high_volatility: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            short_window: 5,
            long_window: 20,
            flat_band_percent: 0.5,
            moderate_volatility: 0.015,
            high_volatility: 0.03,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisConfigError {
    #[error("moving-average windows must be at least 1")]
    ZeroWindow,
    #[error("short window ({short}) must be smaller than long window ({long})")]
    WindowOrder { short: usize, long: usize },
    #[error("flat band must be a non-negative number, got {0}")]
    InvalidFlatBand(f64),
    #[error("volatility thresholds must satisfy 0 <= moderate ({moderate}) < high ({high})")]
    VolatilityThresholds { moderate: f64, high: f64 },
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), AnalysisConfigError> {
        if self.short_window == 0 || self.long_window == 0 {
            return Err(AnalysisConfigError::ZeroWindow);
        }
        if self.short_window >= self.long_window {
            return Err(AnalysisConfigError::WindowOrder {
                short: self.short_window,
                long: self.long_window,
            });
        }
        if !self.flat_band_percent.is_finite() || self.flat_band_percent < 0.0 {
            return Err(AnalysisConfigError::InvalidFlatBand(self.flat_band_percent));
        }
        let thresholds_ok = self.moderate_volatility.is_finite()
            && self.high_volatility.is_finite()
            && self.moderate_volatility >= 0.0
            && self.moderate_volatility < self.high_volatility;
        if !thresholds_ok {
            return Err(AnalysisConfigError::VolatilityThresholds {
                moderate: self.moderate_volatility,
                high: self.high_volatility,
            });
        }
        Ok(())
    }
}
