//! # price-analyzer
//!
//! Descriptive statistics over a daily closing-price series:
//! - percent change across the series span
//! - short and long simple moving averages
//! - trend direction with a configurable dead band
//! - volatility of day-over-day returns, bucketed into bands
//! - a fixed recommendation per (trend, volatility) pair
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use price_analyzer::prelude::*;
//!
//! let series = Series::new(vec![
//!     Observation::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), 100.0),
//!     Observation::new(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(), 110.0),
//! ])
//! .unwrap();
//!
//! let result = summarize(&series, "AAPL").unwrap();
//! assert_eq!(result.percent_change, 10.0);
//! assert_eq!(result.trend_direction, Trend::Upward);
//! ```

pub mod analyzer;
pub mod config;
pub mod models;
pub mod utils;

pub use analyzer::{recommendation, summarize, Analyzer, InsufficientDataError};
pub use config::{AnalysisConfig, AnalysisConfigError};
pub use models::*;

pub mod prelude {
    //! Commonly used types and functions:
    //! ```rust
    //! use price_analyzer::prelude::*;
    //! ```

    pub use crate::analyzer::{summarize, Analyzer, InsufficientDataError};
    pub use crate::config::AnalysisConfig;
    pub use crate::models::{
        AnalysisResult, DateSpan, MovingAverages, Observation, Series, SeriesError, Trend,
        Volatility,
    };
}
