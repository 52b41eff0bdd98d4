use crate::provider::ProviderError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use price_analyzer::{InsufficientDataError, SeriesError};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced to HTTP clients as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Upstream(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<InsufficientDataError> for ApiError {
    fn from(error: InsufficientDataError) -> Self {
        ApiError::BadRequest(error.to_string())
    }
}

impl From<SeriesError> for ApiError {
    fn from(error: SeriesError) -> Self {
        ApiError::BadRequest(format!("Invalid historical payload: {}", error))
    }
}

impl From<ProviderError> for ApiError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::NotFound(symbol) => {
                ApiError::NotFound(format!("Symbol {} could not be resolved.", symbol))
            }
            ProviderError::NoData => ApiError::BadRequest(
                "No historical data found for the requested range and symbol.".to_string(),
            ),
            other => ApiError::Upstream(format!("Unable to reach the market data provider: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Upstream("x".into()).status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_provider_error_mapping() {
        let not_found: ApiError = ProviderError::NotFound("ZZZZ".into()).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_string(), "Symbol ZZZZ could not be resolved.");

        let no_data: ApiError = ProviderError::NoData.into();
        assert_eq!(no_data.status(), StatusCode::BAD_REQUEST);

        let upstream: ApiError = ProviderError::RetriesExhausted.into();
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_insufficient_data_is_client_error() {
        let err: ApiError = InsufficientDataError { symbol: "AAPL".into() }.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
