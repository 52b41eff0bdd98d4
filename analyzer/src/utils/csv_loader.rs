use crate::models::{Observation, Series};
use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use std::{fs::File, io::Read, path::Path};

/// Load a series from a CSV file with at least `date` and `close` columns.
pub fn load_series_from_path(path: &Path) -> anyhow::Result<Series> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    load_series_from_reader(file)
}

/// Header names are matched case-insensitively; `volume` (or `vol`) is
/// optional and any other column is ignored. Rows may be in any order.
pub fn load_series_from_reader<R: Read>(reader: R) -> anyhow::Result<Series> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let position = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.contains(&h.to_ascii_lowercase().as_str()))
    };

    let date_idx = position(&["date", "time"]).ok_or_else(|| anyhow!("CSV must include a 'date' column"))?;
    let close_idx = position(&["close"]).ok_or_else(|| anyhow!("CSV must include a 'close' column"))?;
    let volume_idx = position(&["volume", "vol"]);

    let mut observations = Vec::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        let line = row + 2;

        let raw_date = record.get(date_idx).unwrap_or_default();
        let date = parse_date(raw_date)
            .ok_or_else(|| anyhow!("line {}: invalid date '{}'", line, raw_date))?;

        let raw_close = record.get(close_idx).unwrap_or_default();
        let close: f64 = raw_close
            .parse()
            .with_context(|| format!("line {}: invalid close '{}'", line, raw_close))?;

        let mut observation = Observation::new(date, close);
        if let Some(volume) = volume_idx
            .and_then(|idx| record.get(idx))
            .filter(|v| !v.is_empty())
        {
            let volume: f64 = volume
                .parse()
                .with_context(|| format!("line {}: invalid volume '{}'", line, volume))?;
            observation = observation.with_volume(volume.max(0.0) as u64);
        }
        observations.push(observation);
    }

    Ok(Series::from_unsorted(observations)?)
}

/// Accepts `YYYY-MM-DD` or any value whose first ten characters are one,
/// such as an ISO datetime.
fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| value.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}
