//! Price series summary: percent change, moving averages, trend, volatility
//! and the recommendation lookup.

use crate::config::AnalysisConfig;
use crate::models::{
    AnalysisResult, DateSpan, MovingAverages, Series, Trend, Volatility,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("insufficient data: at least one observation is required to analyze {symbol}")]
pub struct InsufficientDataError {
    pub symbol: String,
}

/// Stateless analyzer holding only its configuration. Cheap to clone and
/// safe to share between request handlers.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Summarizes `series`. `symbol` is carried into the result and never
    /// used for computation.
    pub fn summarize(
        &self,
        series: &Series,
        symbol: &str,
    ) -> Result<AnalysisResult, InsufficientDataError> {
        let (first, last) = match (series.first(), series.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(InsufficientDataError {
                    symbol: symbol.to_string(),
                })
            }
        };

        let closes: Vec<f64> = series.closes().collect();

        // A single observation has no span; first == last yields 0.
        let change = (last.close - first.close) / first.close * 100.0;
        let trend = self.classify_trend(change);

        let returns = daily_returns(&closes);
        let volatility = sample_std_dev(&returns);
        let volatility_profile = self.classify_volatility(volatility);

        let moving_averages = MovingAverages {
            short_window: self.config.short_window,
            short: trailing_mean(&closes, self.config.short_window).map(|v| round_to(v, 4)),
            long_window: self.config.long_window,
            long: trailing_mean(&closes, self.config.long_window).map(|v| round_to(v, 4)),
        };

        debug!(
            symbol,
            observations = closes.len(),
            percent_change = change,
            volatility,
            %trend,
            %volatility_profile,
            "Summarized price series"
        );

        Ok(AnalysisResult {
            symbol: symbol.to_string(),
            date_range: DateSpan {
                start: first.date,
                end: last.date,
            },
            observations: closes.len(),
            latest_close: last.close,
            percent_change: round_to(change, 2),
            trend_direction: trend,
            volatility_profile,
            volatility: round_to(volatility, 4),
            average_daily_return: round_to(mean(&returns).unwrap_or(0.0), 4),
            average_volume: average_volume(series),
            momentum_slope: round_to(momentum_slope(series), 6),
            moving_averages,
            recommendation: recommendation(trend, volatility_profile).to_string(),
        })
    }

    pub fn classify_trend(&self, percent_change: f64) -> Trend {
        if percent_change.abs() < self.config.flat_band_percent {
            Trend::Flat
        } else if percent_change > 0.0 {
            Trend::Upward
        } else {
            Trend::Downward
        }
    }

    /// A NaN deviation comes from returns that overflowed and is treated as
    /// the highest band.
    pub fn classify_volatility(&self, std_dev: f64) -> Volatility {
        if std_dev.is_nan() || std_dev > self.config.high_volatility {
            Volatility::High
        } else if std_dev > self.config.moderate_volatility {
            Volatility::Moderate
        } else {
            Volatility::Low
        }
    }
}

/// Summarizes with the default [`AnalysisConfig`].
pub fn summarize(series: &Series, symbol: &str) -> Result<AnalysisResult, InsufficientDataError> {
    Analyzer::default().summarize(series, symbol)
}

/// Advisory string for every (trend, volatility) pair.
pub fn recommendation(trend: Trend, volatility: Volatility) -> &'static str {
    match (trend, volatility) {
        (Trend::Upward, Volatility::Low) => {
            "Steady uptrend with low volatility; consider accumulating."
        }
        (Trend::Upward, Volatility::Moderate) => {
            "Bullish momentum; consider accumulation with risk controls."
        }
        (Trend::Upward, Volatility::High) => {
            "Uptrend with high volatility; scale in cautiously with tight stops."
        }
        (Trend::Flat, Volatility::Low) => {
            "Range-bound with low volatility; hold and watch for a breakout."
        }
        (Trend::Flat, Volatility::Moderate) => "Neutral momentum; continue observing.",
        (Trend::Flat, Volatility::High) => {
            "Choppy sideways action; reduce exposure until a direction emerges."
        }
        (Trend::Downward, Volatility::Low) => "Gradual decline; prefer a defensive posture.",
        (Trend::Downward, Volatility::Moderate) => {
            "Bearish momentum; tighten stops and avoid new positions."
        }
        (Trend::Downward, Volatility::High) => {
            "Sharp sell-off with high volatility; stay defensive and cut risk."
        }
    }
}

fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1). Zero for fewer than two values.
fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

fn trailing_mean(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window {
        return None;
    }
    mean(&closes[closes.len() - window..])
}

fn average_volume(series: &Series) -> Option<u64> {
    let volumes: Vec<u64> = series.observations().iter().filter_map(|o| o.volume).collect();
    if volumes.is_empty() {
        return None;
    }
    let total: u128 = volumes.iter().map(|&v| v as u128).sum();
    Some((total / volumes.len() as u128) as u64)
}

/// Least-squares slope of close against days elapsed since the first
/// observation, in price units per calendar day.
fn momentum_slope(series: &Series) -> f64 {
    let Some(first) = series.first() else {
        return 0.0;
    };
    if series.len() < 2 {
        return 0.0;
    }

    let points: Vec<(f64, f64)> = series
        .observations()
        .iter()
        .map(|o| ((o.date - first.date).num_days() as f64, o.close))
        .collect();
    let n = points.len() as f64;
    let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in &points {
        num += (x - x_mean) * (y - y_mean);
        den += (x - x_mean).powi(2);
    }
    if den.abs() < 1e-12 {
        return 0.0;
    }
    num / den
}

/// Rounds for reporting. Values too large to scale are returned unchanged and
/// non-finite values saturate so every reported figure stays a JSON number.
fn round_to(value: f64, places: i32) -> f64 {
    if value.is_nan() {
        return f64::MAX;
    }
    let factor = 10f64.powi(places);
    let scaled = value * factor;
    let rounded = if scaled.is_finite() {
        scaled.round() / factor
    } else {
        value
    };
    rounded.clamp(f64::MIN, f64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Observation;
    use chrono::{Duration, NaiveDate};
    use std::collections::HashSet;

    fn series_from(closes: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let observations = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Observation::new(start + Duration::days(i as i64), c))
            .collect();
        Series::new(observations).unwrap()
    }

    #[test]
    fn test_empty_series_is_insufficient() {
        let err = summarize(&Series::default(), "AAPL").unwrap_err();
        assert_eq!(err.symbol, "AAPL");
    }

    #[test]
    fn test_single_observation() {
        let result = summarize(&series_from(&[42.0]), "MSFT").unwrap();
        assert_eq!(result.percent_change, 0.0);
        assert_eq!(result.trend_direction, Trend::Flat);
        assert_eq!(result.volatility_profile, Volatility::Low);
        assert_eq!(result.moving_averages.short, None);
        assert_eq!(result.moving_averages.long, None);
        assert_eq!(result.momentum_slope, 0.0);
        assert_eq!(result.latest_close, 42.0);
        assert_eq!(result.date_range.start, result.date_range.end);
    }

    #[test]
    fn test_two_point_upward_change() {
        let result = summarize(&series_from(&[100.0, 110.0]), "AAPL").unwrap();
        assert_eq!(result.percent_change, 10.0);
        assert_eq!(result.trend_direction, Trend::Upward);
        assert_eq!(result.observations, 2);
    }

    #[test]
    fn test_strictly_increasing_series() {
        let closes: Vec<f64> = (0..25).map(|i| 100.0 + i as f64).collect();
        let result = summarize(&series_from(&closes), "UP").unwrap();
        assert_eq!(result.trend_direction, Trend::Upward);
        let long = result.moving_averages.long.unwrap();
        assert!(long <= result.latest_close);
        assert!(result.momentum_slope > 0.0);
    }

    #[test]
    fn test_constant_series() {
        let result = summarize(&series_from(&[50.0; 30]), "FLAT").unwrap();
        assert_eq!(result.volatility_profile, Volatility::Low);
        assert_eq!(result.volatility, 0.0);
        assert_eq!(result.percent_change, 0.0);
        assert_eq!(result.trend_direction, Trend::Flat);
        assert_eq!(result.moving_averages.short, Some(50.0));
        assert_eq!(result.moving_averages.long, Some(50.0));
    }

    #[test]
    fn test_downward_series() {
        let closes: Vec<f64> = (0..10).map(|i| 200.0 - 3.0 * i as f64).collect();
        let result = summarize(&series_from(&closes), "DOWN").unwrap();
        assert_eq!(result.trend_direction, Trend::Downward);
        assert!(result.percent_change < 0.0);
    }

    #[test]
    fn test_moving_averages_use_exact_trailing_window() {
        let closes: Vec<f64> = (1..=25).map(|i| i as f64).collect();
        let result = summarize(&series_from(&closes), "MA").unwrap();
        assert_eq!(result.moving_averages.short, Some(23.0));
        assert_eq!(result.moving_averages.long, Some(15.5));
    }

    #[test]
    fn test_long_average_omitted_below_window() {
        let closes: Vec<f64> = (1..=19).map(|i| i as f64).collect();
        let result = summarize(&series_from(&closes), "MA").unwrap();
        assert!(result.moving_averages.short.is_some());
        assert_eq!(result.moving_averages.long, None);
    }

    #[test]
    fn test_small_change_within_flat_band() {
        let result = summarize(&series_from(&[100.0, 100.2, 100.3]), "BAND").unwrap();
        assert_eq!(result.trend_direction, Trend::Flat);
    }

    #[test]
    fn test_alternating_swings_are_high_volatility() {
        let closes: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 100.0 } else { 110.0 }).collect();
        let result = summarize(&series_from(&closes), "SWING").unwrap();
        assert_eq!(result.volatility_profile, Volatility::High);
    }

    #[test]
    fn test_overflowing_returns_are_high_volatility() {
        let result = summarize(&series_from(&[1e-300, 1e300, 1e-300]), "WILD").unwrap();
        assert_eq!(result.volatility_profile, Volatility::High);
        assert!(result.volatility.is_finite());
        assert!(result.average_daily_return.is_finite());
        assert_eq!(
            result.recommendation,
            recommendation(result.trend_direction, Volatility::High)
        );

        let json = serde_json::to_value(&result).unwrap();
        assert!(json["volatility"].is_number());
        assert!(json["average_daily_return"].is_number());
        assert!(json["percent_change"].is_number());
    }

    #[test]
    fn test_nan_deviation_is_high_band() {
        assert_eq!(Analyzer::default().classify_volatility(f64::NAN), Volatility::High);
    }

    #[test]
    fn test_two_percent_swings_are_moderate_volatility() {
        let mut closes = vec![100.0];
        for i in 0..20 {
            let prev = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { prev * 1.02 } else { prev * 0.98 });
        }
        let result = summarize(&series_from(&closes), "MOD").unwrap();
        assert_eq!(result.volatility_profile, Volatility::Moderate);
    }

    #[test]
    fn test_momentum_slope_of_linear_series() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + 2.0 * i as f64).collect();
        let result = summarize(&series_from(&closes), "LIN").unwrap();
        assert_eq!(result.momentum_slope, 2.0);
    }

    #[test]
    fn test_average_volume_ignores_missing_values() {
        let day = |d| NaiveDate::from_ymd_opt(2025, 3, d).unwrap();
        let series = Series::new(vec![
            Observation::new(day(3), 10.0).with_volume(100),
            Observation::new(day(4), 10.5),
            Observation::new(day(5), 11.0).with_volume(200),
        ])
        .unwrap();
        let result = summarize(&series, "VOL").unwrap();
        assert_eq!(result.average_volume, Some(150));

        let without = summarize(&series_from(&[1.0, 2.0]), "VOL").unwrap();
        assert_eq!(without.average_volume, None);
    }

    #[test]
    fn test_custom_config_windows() {
        let analyzer = Analyzer::new(AnalysisConfig {
            short_window: 2,
            long_window: 3,
            ..AnalysisConfig::default()
        });
        let result = analyzer.summarize(&series_from(&[1.0, 2.0, 3.0]), "CFG").unwrap();
        assert_eq!(result.moving_averages.short_window, 2);
        assert_eq!(result.moving_averages.short, Some(2.5));
        assert_eq!(result.moving_averages.long, Some(2.0));
    }

    #[test]
    fn test_recommendation_is_total() {
        let mut seen = HashSet::new();
        for trend in Trend::ALL {
            for volatility in Volatility::ALL {
                let text = recommendation(trend, volatility);
                assert!(!text.is_empty());
                seen.insert(text);
            }
        }
        assert_eq!(seen.len(), 9);
    }

    #[test]
    fn test_result_serializes_labels_in_lowercase() {
        let result = summarize(&series_from(&[100.0, 110.0]), "AAPL").unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["trend_direction"], "upward");
        assert_eq!(json["volatility_profile"], "low");
        assert!(json["moving_averages"]["long"].is_null());
        assert_eq!(json["date_range"]["start"], "2025-01-01");
    }
}
