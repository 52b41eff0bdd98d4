use crate::config::HistoryDefaults;
use crate::error::{ApiError, ApiResult};
use crate::utils::{build_date_range, parse_iso_date};
use chrono::{DateTime, NaiveDate, Utc};
use price_analyzer::{AnalysisResult, Observation, Series, SeriesError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

// --- Provider-facing types ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "2m")]
    TwoMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "60m")]
    SixtyMinutes,
    #[serde(rename = "90m")]
    NinetyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1wk")]
    OneWeek,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
}

impl Interval {
    pub const ALL: [Interval; 13] = [
        Interval::OneMinute,
        Interval::TwoMinutes,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::SixtyMinutes,
        Interval::NinetyMinutes,
        Interval::OneHour,
        Interval::OneDay,
        Interval::FiveDays,
        Interval::OneWeek,
        Interval::OneMonth,
        Interval::ThreeMonths,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::TwoMinutes => "2m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::SixtyMinutes => "60m",
            Interval::NinetyMinutes => "90m",
            Interval::OneHour => "1h",
            Interval::OneDay => "1d",
            Interval::FiveDays => "5d",
            Interval::OneWeek => "1wk",
            Interval::OneMonth => "1mo",
            Interval::ThreeMonths => "3mo",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .iter()
            .copied()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| format!("Unsupported interval: {}", s))
    }
}

/// Inclusive calendar range, `start <= end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl HistoricalBar {
    pub fn to_observation(&self) -> Observation {
        Observation::new(self.date, self.close).with_volume(self.volume)
    }
}

/// Daily series from provider bars. Intraday intervals produce several bars
/// per date; the last one of each date is kept.
pub fn series_from_bars(bars: &[HistoricalBar]) -> Result<Series, SeriesError> {
    let mut observations: Vec<Observation> = Vec::with_capacity(bars.len());
    let mut sorted: Vec<&HistoricalBar> = bars.iter().collect();
    sorted.sort_by_key(|b| b.date);
    for bar in sorted {
        match observations.last_mut() {
            Some(last) if last.date == bar.date => *last = bar.to_observation(),
            _ => observations.push(bar.to_observation()),
        }
    }
    Series::new(observations)
}

/// Resolves an interval string, falling back to `default` when absent.
pub fn resolve_interval(raw: Option<&str>, default: Interval) -> ApiResult<Interval> {
    match raw {
        Some(raw) => raw.trim().parse().map_err(ApiError::BadRequest),
        None => Ok(default),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfficerInfo {
    pub name: Option<String>,
    pub title: Option<String>,
    pub firm: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: String,
    pub full_name: Option<String>,
    pub summary: Option<String>,
    pub industry: Option<String>,
    pub sector: Option<String>,
    pub country: Option<String>,
    pub website: Option<String>,
    pub employees: Option<u64>,
    pub key_officers: Vec<OfficerInfo>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DayRange {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub market_state: Option<String>,
    pub current_price: Option<f64>,
    pub price_change: Option<f64>,
    pub percent_change: Option<f64>,
    pub previous_close: Option<f64>,
    pub open: Option<f64>,
    pub day_range: DayRange,
    pub volume: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

// --- Request payloads ---

#[derive(Debug, Deserialize)]
pub struct SymbolQuery {
    pub symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryRequest {
    pub symbol: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub interval: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub symbol: String,
    pub interval: Interval,
    pub count: usize,
    pub data: Vec<HistoricalBar>,
}

/// Raw analysis body. Decoded into [`AnalysisSource`] before anything else
/// looks at it.
#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub symbol: Option<String>,
    pub historical_data: Option<Vec<Map<String, Value>>>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub interval: Option<String>,
}

impl AnalysisRequest {
    /// Validates the body into a series or fetch parameters. Any
    /// `historical_data` key, even an empty array, selects the inline variant.
    pub fn into_source(self, defaults: &HistoryDefaults, today: NaiveDate) -> ApiResult<AnalysisSource> {
        match self.historical_data {
            Some(records) => Ok(AnalysisSource::Inline(series_from_records(&records)?)),
            None => {
                let range = build_date_range(
                    self.start.as_deref(),
                    self.end.as_deref(),
                    defaults.default_days,
                    today,
                )?;
                let interval = resolve_interval(self.interval.as_deref(), defaults.default_interval)?;
                Ok(AnalysisSource::Fetch { range, interval })
            }
        }
    }
}

/// Where the analyzed series comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisSource {
    /// Observations supplied in the request body.
    Inline(Series),
    /// Parameters for fetching the series from the provider.
    Fetch { range: DateRange, interval: Interval },
}

impl AnalysisSource {
    pub fn data_source(&self) -> DataSource {
        match self {
            AnalysisSource::Inline(_) => DataSource::Payload,
            AnalysisSource::Fetch { .. } => DataSource::Fetched,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Payload,
    Fetched,
}

#[derive(Debug, Serialize)]
pub struct Insights {
    #[serde(flatten)]
    pub analysis: AnalysisResult,
    pub data_source: DataSource,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub symbol: String,
    pub insights: Insights,
}

/// Builds a [`Series`] from loosely shaped JSON records. Keys are matched
/// case-insensitively; `date` and `close` are required, `volume`/`vol` is
/// optional. Records may arrive in any order.
pub fn series_from_records(records: &[Map<String, Value>]) -> ApiResult<Series> {
    if records.is_empty() {
        return Err(ApiError::bad_request("Historical payload is empty."));
    }

    let mut observations = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let mut date = None;
        let mut close = None;
        let mut volume = None;
        for (key, value) in record {
            match key.trim().to_ascii_lowercase().as_str() {
                "date" => date = Some(value),
                "close" => close = Some(value),
                "volume" | "vol" => volume = Some(value),
                _ => {}
            }
        }

        let (Some(date), Some(close)) = (date, close) else {
            return Err(ApiError::bad_request(
                "Historical payload must include at least 'date' and 'close' fields.",
            ));
        };

        let date = match date.as_str() {
            Some(raw) => parse_iso_date(raw)?,
            None => return Err(ApiError::bad_request(format!("Invalid ISO date: {}", date))),
        };
        let close = numeric(close).ok_or_else(|| {
            ApiError::bad_request(format!("Record {} has a non-numeric close: {}", index, close))
        })?;

        let mut observation = Observation::new(date, close);
        if let Some(volume) = volume.and_then(numeric) {
            observation = observation.with_volume(volume.max(0.0) as u64);
        }
        observations.push(observation);
    }

    Ok(Series::from_unsorted(observations)?)
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
