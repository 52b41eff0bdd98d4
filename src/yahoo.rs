use crate::config::ProviderConfig;
use crate::data_structures::{
    CompanyProfile, DateRange, DayRange, HistoricalBar, Interval, MarketSnapshot, OfficerInfo,
};
use crate::provider::{MarketDataProvider, ProviderError};
use async_trait::async_trait;
use chrono::{DateTime, Days, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const MAX_BACKOFF: StdDuration = StdDuration::from_secs(30);
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Yahoo Finance client. Holds a cookie jar and a cached crumb; both are
/// refreshed when Yahoo answers 401/403.
pub struct YahooClient {
    client: Client,
    base_url: String,
    cookie_url: String,
    max_retries: u32,
    retry_base: StdDuration,
    crumb: RwLock<Option<String>>,
}

impl YahooClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(YahooClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cookie_url: config.cookie_url.clone(),
            max_retries: config.max_retries,
            retry_base: StdDuration::from_millis(config.retry_base_ms),
            crumb: RwLock::new(None),
        })
    }

    async fn crumb(&self) -> Result<String, ProviderError> {
        if let Some(crumb) = self.crumb.read().await.as_ref() {
            return Ok(crumb.clone());
        }

        let mut guard = self.crumb.write().await;
        if let Some(crumb) = guard.as_ref() {
            return Ok(crumb.clone());
        }

        // The cookie endpoint usually answers 404; only the Set-Cookie matters.
        if let Err(e) = self.client.get(&self.cookie_url).send().await {
            debug!(error = %e, "Cookie request failed, trying crumb anyway");
        }

        let url = format!("{}/v1/test/getcrumb", self.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        let crumb = body.trim();

        if !status.is_success() || crumb.is_empty() || crumb.contains(' ') || crumb.contains('<') {
            warn!(%status, "Failed to obtain crumb");
            return Err(ProviderError::InvalidResponse(format!(
                "failed to obtain crumb (status {})",
                status
            )));
        }

        debug!("Obtained new crumb");
        *guard = Some(crumb.to_string());
        Ok(crumb.to_string())
    }

    async fn invalidate_crumb(&self) {
        *self.crumb.write().await = None;
    }

    fn backoff(&self, attempt: u32) -> StdDuration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        let factor = 2f64.powi(exponent as i32) * (1.0 + rand::random::<f64>());
        StdDuration::try_from_secs_f64(self.retry_base.as_secs_f64() * factor)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }

    /// GET with crumb, retrying transport errors, 401/403 (after a crumb
    /// refresh), 429 and 5xx. A 404 means the symbol is unknown.
    async fn make_request(
        &self,
        url: &str,
        query: &[(&str, String)],
        symbol: &str,
    ) -> Result<Value, ProviderError> {
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying provider request");
                sleep(delay).await;
            }

            let crumb = match self.crumb().await {
                Ok(crumb) => crumb,
                Err(e) => {
                    warn!(attempt, error = %e, "Crumb unavailable");
                    continue;
                }
            };

            let response = self
                .client
                .get(url)
                .query(query)
                .query(&[("crumb", crumb.as_str())])
                .header("Accept", "application/json, text/plain, */*")
                .header("Referer", "https://finance.yahoo.com/")
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        match resp.json::<Value>().await {
                            Ok(data) => return Ok(data),
                            Err(e) => {
                                warn!(attempt, error = %e, "Undecodable provider response");
                                continue;
                            }
                        }
                    }

                    match status {
                        StatusCode::NOT_FOUND => {
                            return Err(ProviderError::NotFound(symbol.to_string()));
                        }
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            warn!(attempt, %status, "Provider rejected crumb");
                            self.invalidate_crumb().await;
                        }
                        StatusCode::TOO_MANY_REQUESTS => {
                            warn!(attempt, "Provider rate limited the request");
                        }
                        s if s.is_server_error() => {
                            warn!(attempt, %status, "Provider server error");
                        }
                        s => return Err(ProviderError::Status(s.as_u16())),
                    }
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Provider transport error");
                }
            }
        }

        Err(ProviderError::RetriesExhausted)
    }

    #[instrument(skip(self))]
    pub async fn get_history(
        &self,
        symbol: &str,
        range: &DateRange,
        interval: Interval,
    ) -> Result<Vec<HistoricalBar>, ProviderError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, urlencoding::encode(symbol));
        // period2 is exclusive, so ask for the day after `end`.
        let period1 = range.start.and_hms_opt(0, 0, 0).map(|d| d.and_utc().timestamp());
        let period2 = range
            .end
            .checked_add_days(Days::new(1))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc().timestamp());
        let (Some(period1), Some(period2)) = (period1, period2) else {
            return Err(ProviderError::InvalidResponse("unrepresentable date range".to_string()));
        };

        let query = [
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", interval.as_str().to_string()),
            ("includePrePost", "false".to_string()),
            ("events", "".to_string()),
        ];

        let response_data = self.make_request(&url, &query, symbol).await?;
        let chart: ChartResponse = serde_json::from_value(response_data)?;

        if let Some(error) = chart.chart.error.as_ref().filter(|e| !e.is_null()) {
            if error.get("code").and_then(Value::as_str) == Some("Not Found") {
                return Err(ProviderError::NotFound(symbol.to_string()));
            }
            return Err(ProviderError::InvalidResponse(error.to_string()));
        }

        let Some(result) = chart.chart.result.and_then(|r| r.into_iter().next()) else {
            return Err(ProviderError::NoData);
        };
        let timestamps = result.timestamp.unwrap_or_default();
        let Some(quote) = result.indicators.quote.into_iter().next() else {
            return Err(ProviderError::NoData);
        };

        let value_at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let Some(close) = value_at(&quote.close, i) else {
                continue;
            };
            let time = DateTime::<Utc>::from_timestamp(ts, 0).ok_or_else(|| {
                ProviderError::InvalidResponse(format!("invalid timestamp {} at index {}", ts, i))
            })?;
            let date = time.date_naive();
            if date < range.start || date > range.end {
                continue;
            }

            bars.push(HistoricalBar {
                date,
                open: round4(value_at(&quote.open, i).unwrap_or(0.0)),
                high: round4(value_at(&quote.high, i).unwrap_or(0.0)),
                low: round4(value_at(&quote.low, i).unwrap_or(0.0)),
                close: round4(close),
                volume: quote
                    .volume
                    .get(i)
                    .copied()
                    .flatten()
                    .map(|v| v.max(0.0) as u64)
                    .unwrap_or(0),
            });
        }

        if bars.is_empty() {
            return Err(ProviderError::NoData);
        }

        bars.sort_by_key(|b| b.date);
        debug!(bars = bars.len(), "Fetched history");
        Ok(bars)
    }

    #[instrument(skip(self))]
    pub async fn get_quote(&self, symbol: &str) -> Result<MarketSnapshot, ProviderError> {
        let url = format!("{}/v7/finance/quote", self.base_url);
        let query = [("symbols", symbol.to_string())];

        let response_data = self.make_request(&url, &query, symbol).await?;
        let quote: QuoteResponse = serde_json::from_value(response_data)?;

        let data = quote
            .quote_response
            .result
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NotFound(symbol.to_string()))?;

        Ok(MarketSnapshot {
            symbol: data.symbol.unwrap_or_else(|| symbol.to_string()),
            market_state: data.market_state,
            current_price: data.regular_market_price.or(data.regular_market_previous_close),
            price_change: data.regular_market_change,
            percent_change: data.regular_market_change_percent,
            previous_close: data.regular_market_previous_close,
            open: data.regular_market_open,
            day_range: DayRange {
                low: data.regular_market_day_low,
                high: data.regular_market_day_high,
            },
            volume: data.regular_market_volume.map(|v| v.max(0.0) as u64),
            timestamp: Utc::now(),
        })
    }

    #[instrument(skip(self))]
    pub async fn company_info(&self, symbol: &str) -> Result<CompanyProfile, ProviderError> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}",
            self.base_url,
            urlencoding::encode(symbol)
        );
        let query = [("modules", "assetProfile,price".to_string())];

        let response_data = self.make_request(&url, &query, symbol).await?;
        let summary: QuoteSummaryResponse = serde_json::from_value(response_data)?;

        let result = summary
            .quote_summary
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| ProviderError::NotFound(symbol.to_string()))?;

        if result.asset_profile.is_none() && result.price.is_none() {
            return Err(ProviderError::NotFound(symbol.to_string()));
        }

        let profile = result.asset_profile.unwrap_or_default();
        let key_officers = profile
            .company_officers
            .into_iter()
            .filter(|o| o.name.is_some() || o.title.is_some())
            .map(|o| OfficerInfo {
                name: o.name,
                title: o.title,
                firm: o.firm,
            })
            .collect();

        Ok(CompanyProfile {
            symbol: symbol.to_string(),
            full_name: result.price.and_then(|p| p.long_name.or(p.short_name)),
            summary: profile.long_business_summary,
            industry: profile.industry,
            sector: profile.sector,
            country: profile.country,
            website: profile.website,
            employees: profile.full_time_employees,
            key_officers,
            last_updated: Utc::now(),
        })
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn company_profile(&self, symbol: &str) -> Result<CompanyProfile, ProviderError> {
        self.company_info(symbol).await
    }

    async fn quote(&self, symbol: &str) -> Result<MarketSnapshot, ProviderError> {
        self.get_quote(symbol).await
    }

    async fn history(
        &self,
        symbol: &str,
        range: &DateRange,
        interval: Interval,
    ) -> Result<Vec<HistoricalBar>, ProviderError> {
        self.get_history(symbol, range, interval).await
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

// --- Yahoo response shapes ---

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChartQuote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(rename = "quoteResponse")]
    quote_response: QuoteResponseData,
}

#[derive(Debug, Deserialize)]
struct QuoteResponseData {
    #[serde(default)]
    result: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteData {
    symbol: Option<String>,
    market_state: Option<String>,
    regular_market_price: Option<f64>,
    regular_market_change: Option<f64>,
    regular_market_change_percent: Option<f64>,
    regular_market_previous_close: Option<f64>,
    regular_market_open: Option<f64>,
    regular_market_day_low: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryData,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryData {
    result: Option<Vec<QuoteSummaryResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    asset_profile: Option<AssetProfile>,
    price: Option<PriceModule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AssetProfile {
    long_business_summary: Option<String>,
    industry: Option<String>,
    sector: Option<String>,
    country: Option<String>,
    website: Option<String>,
    full_time_employees: Option<u64>,
    company_officers: Vec<CompanyOfficer>,
}

#[derive(Debug, Deserialize)]
struct CompanyOfficer {
    name: Option<String>,
    title: Option<String>,
    firm: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use httpmock::prelude::*;
    use serde_json::json;

    async fn client_for(server: &MockServer, max_retries: u32) -> YahooClient {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/test/getcrumb");
                then.status(200).body("abc123");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cookie");
                then.status(404);
            })
            .await;

        let config = ProviderConfig {
            base_url: server.base_url(),
            cookie_url: server.url("/cookie"),
            timeout_secs: 5,
            max_retries,
            retry_base_ms: 0,
        };
        YahooClient::new(&config).unwrap()
    }

    fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateRange {
        DateRange {
            start: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            end: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_client_creation() {
        assert!(YahooClient::new(&ProviderConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_backoff_is_capped_for_large_attempts() {
        for retry_base_ms in [0, 500, u64::MAX] {
            let client = YahooClient::new(&ProviderConfig {
                retry_base_ms,
                max_retries: 200,
                ..ProviderConfig::default()
            })
            .unwrap();
            for attempt in [1, 2, 66, 200, u32::MAX] {
                assert!(client.backoff(attempt) <= MAX_BACKOFF);
            }
        }
    }

    #[tokio::test]
    async fn test_history_with_unrepresentable_end_is_rejected() {
        let client = YahooClient::new(&ProviderConfig::default()).unwrap();
        let range = DateRange {
            start: NaiveDate::MAX,
            end: NaiveDate::MAX,
        };
        let err = client
            .get_history("AAPL", &range, Interval::OneDay)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_history_parses_chart_and_skips_null_closes() {
        let server = MockServer::start_async().await;
        let client = client_for(&server, 0).await;

        // 2025-01-02, 2025-01-03, 2025-01-06 at 14:30 UTC
        let chart = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v8/finance/chart/AAPL")
                    .query_param("interval", "1d")
                    .query_param("crumb", "abc123");
                then.status(200).json_body(json!({
                    "chart": {
                        "result": [{
                            "timestamp": [1735828200, 1735914600, 1736173800],
                            "indicators": {"quote": [{
                                "open":   [100.123456, 101.0, 102.0],
                                "high":   [101.0, 102.0, 103.0],
                                "low":    [99.0, null, 101.0],
                                "close":  [100.5, null, 102.5],
                                "volume": [1000, 2000, null]
                            }]}
                        }],
                        "error": null
                    }
                }));
            })
            .await;

        let bars = client
            .get_history("AAPL", &range((2025, 1, 1), (2025, 1, 31)), Interval::OneDay)
            .await
            .unwrap();

        chart.assert_async().await;
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        assert_eq!(bars[0].open, 100.1235);
        assert_eq!(bars[0].volume, 1000);
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
        assert_eq!(bars[1].close, 102.5);
        assert_eq!(bars[1].volume, 0);
    }

    #[tokio::test]
    async fn test_history_without_rows_is_no_data() {
        let server = MockServer::start_async().await;
        let client = client_for(&server, 0).await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/v8/finance/chart/AAPL");
                then.status(200).json_body(json!({
                    "chart": {"result": [{"indicators": {"quote": [{}]}}], "error": null}
                }));
            })
            .await;

        let err = client
            .get_history("AAPL", &range((2025, 1, 1), (2025, 1, 31)), Interval::OneDay)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NoData));
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_not_found() {
        let server = MockServer::start_async().await;
        let client = client_for(&server, 2).await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/v8/finance/chart/NOPE");
                then.status(404).json_body(json!({
                    "chart": {"result": null, "error": {"code": "Not Found", "description": "No data found"}}
                }));
            })
            .await;

        let err = client
            .get_history("NOPE", &range((2025, 1, 1), (2025, 1, 31)), Interval::OneDay)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(ref s) if s == "NOPE"));
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_retries() {
        let server = MockServer::start_async().await;
        let client = client_for(&server, 1).await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/v7/finance/quote");
                then.status(503);
            })
            .await;

        let err = client.get_quote("AAPL").await.unwrap_err();
        assert!(matches!(err, ProviderError::RetriesExhausted));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start_async().await;
        let client = client_for(&server, 3).await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/v7/finance/quote");
                then.status(400);
            })
            .await;

        let err = client.get_quote("AAPL").await.unwrap_err();
        assert!(matches!(err, ProviderError::Status(400)));
    }

    #[tokio::test]
    async fn test_quote_snapshot_falls_back_to_previous_close() {
        let server = MockServer::start_async().await;
        let client = client_for(&server, 0).await;

        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v7/finance/quote")
                    .query_param("symbols", "MSFT");
                then.status(200).json_body(json!({
                    "quoteResponse": {"result": [{
                        "symbol": "MSFT",
                        "marketState": "CLOSED",
                        "regularMarketChange": -1.25,
                        "regularMarketChangePercent": -0.31,
                        "regularMarketPreviousClose": 402.5,
                        "regularMarketOpen": 401.0,
                        "regularMarketDayLow": 399.1,
                        "regularMarketDayHigh": 404.9,
                        "regularMarketVolume": 18250000
                    }], "error": null}
                }));
            })
            .await;

        let snapshot = client.get_quote("MSFT").await.unwrap();
        assert_eq!(snapshot.market_state.as_deref(), Some("CLOSED"));
        assert_eq!(snapshot.current_price, Some(402.5));
        assert_eq!(snapshot.day_range.high, Some(404.9));
        assert_eq!(snapshot.volume, Some(18_250_000));
    }

    #[tokio::test]
    async fn test_empty_quote_result_is_not_found() {
        let server = MockServer::start_async().await;
        let client = client_for(&server, 0).await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/v7/finance/quote");
                then.status(200)
                    .json_body(json!({"quoteResponse": {"result": [], "error": null}}));
            })
            .await;

        let err = client.get_quote("ZZZZ").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_company_info_drops_anonymous_officers() {
        let server = MockServer::start_async().await;
        let client = client_for(&server, 0).await;

        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v10/finance/quoteSummary/AAPL")
                    .query_param("modules", "assetProfile,price");
                then.status(200).json_body(json!({
                    "quoteSummary": {"result": [{
                        "assetProfile": {
                            "longBusinessSummary": "Designs phones.",
                            "industry": "Consumer Electronics",
                            "sector": "Technology",
                            "country": "United States",
                            "website": "https://www.apple.com",
                            "fullTimeEmployees": 164000,
                            "companyOfficers": [
                                {"name": "Tim Cook", "title": "CEO"},
                                {"age": 60}
                            ]
                        },
                        "price": {"longName": "Apple Inc."}
                    }], "error": null}
                }));
            })
            .await;

        let profile = client.company_info("AAPL").await.unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Apple Inc."));
        assert_eq!(profile.employees, Some(164_000));
        assert_eq!(profile.key_officers.len(), 1);
        assert_eq!(profile.key_officers[0].title.as_deref(), Some("CEO"));
    }

    #[tokio::test]
    async fn test_company_info_without_result_is_not_found() {
        let server = MockServer::start_async().await;
        let client = client_for(&server, 0).await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/v10/finance/quoteSummary/ZZZZ");
                then.status(200)
                    .json_body(json!({"quoteSummary": {"result": null, "error": null}}));
            })
            .await;

        let err = client.company_info("ZZZZ").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
