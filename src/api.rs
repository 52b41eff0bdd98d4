use crate::data_structures::{
    AnalysisRequest, AnalysisResponse, AnalysisSource, CompanyProfile, HistoryRequest,
    HistoryResponse, Insights, MarketSnapshot, SymbolQuery, resolve_interval, series_from_bars,
};
use crate::error::{ApiError, ApiResult};
use crate::provider::ProviderError;
use crate::utils::{build_date_range, normalize_symbol};
use crate::{SharedConfig, SharedProvider};
use axum::{
    body::Bytes,
    extract::{Json, Query, State},
};
use chrono::Utc;
use price_analyzer::Analyzer;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{Span, debug, field, info, instrument, warn};

pub async fn health_handler() -> &'static str {
    "OK"
}

#[instrument(skip_all, fields(symbol = ?query.symbol))]
pub async fn company_info_handler(
    State(provider): State<SharedProvider>,
    Query(query): Query<SymbolQuery>,
) -> ApiResult<Json<CompanyProfile>> {
    let symbol = normalize_symbol(query.symbol.as_deref())?;
    debug!(%symbol, "Received company info request");

    let profile = provider
        .company_profile(&symbol)
        .await
        .map_err(|e| lookup_failed(&symbol, e))?;

    info!(%symbol, officers = profile.key_officers.len(), "Returning company info");
    Ok(Json(profile))
}

#[instrument(skip_all, fields(symbol = ?query.symbol))]
pub async fn market_data_handler(
    State(provider): State<SharedProvider>,
    Query(query): Query<SymbolQuery>,
) -> ApiResult<Json<MarketSnapshot>> {
    let symbol = normalize_symbol(query.symbol.as_deref())?;
    debug!(%symbol, "Received market snapshot request");

    let snapshot = provider
        .quote(&symbol)
        .await
        .map_err(|e| lookup_failed(&symbol, e))?;

    info!(%symbol, current_price = ?snapshot.current_price, "Returning market snapshot");
    Ok(Json(snapshot))
}

#[instrument(skip_all, fields(symbol = field::Empty))]
pub async fn historical_data_handler(
    State(provider): State<SharedProvider>,
    State(config): State<SharedConfig>,
    body: Bytes,
) -> ApiResult<Json<HistoryResponse>> {
    let request: HistoryRequest = parse_payload(&body, "Payload is required.")?;
    let symbol = normalize_symbol(request.symbol.as_deref())?;
    Span::current().record("symbol", symbol.as_str());

    let range = build_date_range(
        request.start.as_deref(),
        request.end.as_deref(),
        config.history.default_days,
        Utc::now().date_naive(),
    )?;
    let interval = resolve_interval(request.interval.as_deref(), config.history.default_interval)?;
    debug!(%symbol, start = %range.start, end = %range.end, %interval, "Fetching history");

    let data = provider
        .history(&symbol, &range, interval)
        .await
        .map_err(|e| lookup_failed(&symbol, e))?;

    info!(%symbol, count = data.len(), "Returning historical data");
    Ok(Json(HistoryResponse {
        symbol,
        interval,
        count: data.len(),
        data,
    }))
}

#[instrument(skip_all, fields(symbol = field::Empty))]
pub async fn analysis_handler(
    State(provider): State<SharedProvider>,
    State(config): State<SharedConfig>,
    State(analyzer): State<Analyzer>,
    body: Bytes,
) -> ApiResult<Json<AnalysisResponse>> {
    let request: AnalysisRequest = parse_payload(&body, "Payload is required for analysis.")?;
    let symbol = normalize_symbol(request.symbol.as_deref())?;
    Span::current().record("symbol", symbol.as_str());

    let source = request.into_source(&config.history, Utc::now().date_naive())?;
    let data_source = source.data_source();

    let series = match source {
        AnalysisSource::Inline(series) => series,
        AnalysisSource::Fetch { range, interval } => {
            debug!(%symbol, start = %range.start, end = %range.end, %interval, "Fetching series for analysis");
            let bars = provider
                .history(&symbol, &range, interval)
                .await
                .map_err(|e| lookup_failed(&symbol, e))?;
            series_from_bars(&bars).map_err(|e| {
                warn!(%symbol, error = %e, "Provider returned an unusable series");
                ApiError::Upstream(format!(
                    "The market data provider returned an unusable series: {}",
                    e
                ))
            })?
        }
    };

    let analysis = analyzer.summarize(&series, &symbol)?;
    info!(
        %symbol,
        observations = analysis.observations,
        trend = %analysis.trend_direction,
        volatility = %analysis.volatility_profile,
        ?data_source,
        "Returning analysis"
    );

    Ok(Json(AnalysisResponse {
        symbol,
        insights: Insights {
            analysis,
            data_source,
        },
    }))
}

/// Decodes a JSON body regardless of content type. An absent, `null` or
/// empty-object body yields `missing_message`.
fn parse_payload<T: DeserializeOwned>(body: &Bytes, missing_message: &str) -> ApiResult<T> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Request body is not JSON");
            return Err(ApiError::bad_request(missing_message));
        }
    };

    let is_empty = match &value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if is_empty {
        return Err(ApiError::bad_request(missing_message));
    }

    serde_json::from_value(value)
        .map_err(|e| ApiError::bad_request(format!("Invalid payload: {}", e)))
}

fn lookup_failed(symbol: &str, error: ProviderError) -> ApiError {
    warn!(symbol, error = %error, "Market data lookup failed");
    error.into()
}
