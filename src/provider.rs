use crate::data_structures::{CompanyProfile, DateRange, HistoricalBar, Interval, MarketSnapshot};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decode provider response: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("provider responded with status {0}")]
    Status(u16),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("symbol {0} not found")]
    NotFound(String),
    #[error("no data returned")]
    NoData,
    #[error("max retries exceeded")]
    RetriesExhausted,
}

/// External market-data collaborator. Handlers receive it through the
/// router state; there is no process-wide client.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn company_profile(&self, symbol: &str) -> Result<CompanyProfile, ProviderError>;

    async fn quote(&self, symbol: &str) -> Result<MarketSnapshot, ProviderError>;

    /// Bars for `range` (inclusive) in ascending date order.
    async fn history(
        &self,
        symbol: &str,
        range: &DateRange,
        interval: Interval,
    ) -> Result<Vec<HistoricalBar>, ProviderError>;
}
