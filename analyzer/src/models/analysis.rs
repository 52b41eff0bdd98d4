use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Upward,
    Downward,
    Flat,
}

impl Trend {
    pub const ALL: [Trend; 3] = [Trend::Upward, Trend::Flat, Trend::Downward];

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Upward => "upward",
            Trend::Downward => "downward",
            Trend::Flat => "flat",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Volatility {
    Low,
    Moderate,
    High,
}

impl Volatility {
    pub const ALL: [Volatility; 3] = [Volatility::Low, Volatility::Moderate, Volatility::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Volatility::Low => "low",
            Volatility::Moderate => "moderate",
            Volatility::High => "high",
        }
    }
}

impl fmt::Display for Volatility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First and last dates covered by an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Trailing simple moving averages. A value is `None` when the series is
/// shorter than its window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingAverages {
    pub short_window: usize,
    pub short: Option<f64>,
    pub long_window: usize,
    pub long: Option<f64>,
}

/// Summary of one series. Built once per request, serialized, dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub symbol: String,
    pub date_range: DateSpan,
    pub observations: usize,
    pub latest_close: f64,
    pub percent_change: f64,
    pub trend_direction: Trend,
    pub volatility_profile: Volatility,
    pub volatility: f64,
    pub average_daily_return: f64,
    pub average_volume: Option<u64>,
    pub momentum_slope: f64,
    pub moving_averages: MovingAverages,
    pub recommendation: String,
}
