use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single closing price on a calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
}

impl Observation {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            volume: None,
        }
    }

    pub fn with_volume(mut self, volume: u64) -> Self {
        self.volume = Some(volume);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("close price on {date} must be a positive number, got {close}")]
    InvalidClose { date: NaiveDate, close: f64 },
    #[error("duplicate observation for {0}")]
    DuplicateDate(NaiveDate),
    #[error("observations must be in ascending date order ({previous} is followed by {next})")]
    OutOfOrder { previous: NaiveDate, next: NaiveDate },
}

/// Observations in strictly ascending date order with positive closes.
///
/// The only way to obtain a `Series` is through [`Series::new`] or
/// [`Series::from_unsorted`], so every instance upholds the ordering
/// invariant. An empty series is representable; analysis rejects it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Series {
    observations: Vec<Observation>,
}

impl Series {
    /// Validates `observations` as given. Dates must already be ascending.
    pub fn new(observations: Vec<Observation>) -> Result<Self, SeriesError> {
        for obs in &observations {
            if !obs.close.is_finite() || obs.close <= 0.0 {
                return Err(SeriesError::InvalidClose {
                    date: obs.date,
                    close: obs.close,
                });
            }
        }

        for pair in observations.windows(2) {
            let (previous, next) = (pair[0].date, pair[1].date);
            if previous == next {
                return Err(SeriesError::DuplicateDate(next));
            }
            if previous > next {
                return Err(SeriesError::OutOfOrder { previous, next });
            }
        }

        Ok(Self { observations })
    }

    /// Sorts by date first, then validates. Duplicate dates are still rejected.
    pub fn from_unsorted(mut observations: Vec<Observation>) -> Result<Self, SeriesError> {
        observations.sort_by_key(|o| o.date);
        Self::new(observations)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first(&self) -> Option<&Observation> {
        self.observations.first()
    }

    pub fn last(&self) -> Option<&Observation> {
        self.observations.last()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.observations.iter().map(|o| o.close)
    }
}
