use crate::error::{ApiError, ApiResult};

/// Trims and upper-cases a ticker symbol. Missing or blank input is a
/// client error.
pub fn normalize_symbol(symbol: Option<&str>) -> ApiResult<String> {
    match symbol.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_uppercase()),
        _ => Err(ApiError::bad_request("A symbol must be provided.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(Some("  aapl ")).unwrap(), "AAPL");
        assert_eq!(normalize_symbol(Some("brk-b")).unwrap(), "BRK-B");
    }

    #[test]
    fn test_missing_symbol() {
        assert!(normalize_symbol(None).is_err());
        assert!(normalize_symbol(Some("   ")).is_err());
    }
}
