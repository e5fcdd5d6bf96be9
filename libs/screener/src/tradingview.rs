use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    error::FetchError,
    fields::FIELDS,
    interval::Interval,
    row::Row,
    source::IndicatorFetcher,
};

pub const TRADINGVIEW_SCAN_URL: &str = "https://scanner.tradingview.com";

#[derive(Clone)]
pub struct TradingViewClient {
    client: Client,
    base_api: String,
    exchange: String,
}

impl TradingViewClient {
    pub fn new(base_api: String, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_api,
            exchange: "BINANCE".to_string(),
        })
    }

    fn columns(interval: Interval) -> Vec<String> {
        let code = interval.granularity_code();
        FIELDS
            .iter()
            .map(|f| {
                if code.is_empty() {
                    f.column.to_string()
                } else {
                    format!("{}|{}", f.column, code)
                }
            })
            .collect()
    }
}

#[async_trait]
impl IndicatorFetcher for TradingViewClient {
    async fn fetch(&self, symbol: &str, interval: Interval) -> Result<Row, FetchError> {
        let url = format!("{}/crypto/scan", self.base_api.trim_end_matches('/'));
        let ticker = format!("{}:{}", self.exchange, symbol);

        let body = ScanRequest {
            symbols: ScanSymbols {
                tickers: vec![ticker],
                query: ScanQuery { types: vec![] },
            },
            columns: Self::columns(interval),
        };

        let res: ScanResponse = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let item = res
            .data
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::NoData(symbol.to_string()))?;

        trace!(symbol, ticker = %item.s, values = item.d.len(), "scan response");
        row_from_values(symbol, &item.d)
    }
}

/// Zip provider values with the field catalog.
///
/// Optional fields with no value are left out of the row; any other gap fails
/// the whole symbol.
pub fn row_from_values(symbol: &str, values: &[Option<f64>]) -> Result<Row, FetchError> {
    let mut row = Row::new(symbol);

    for (i, field) in FIELDS.iter().enumerate() {
        match values.get(i).copied().flatten() {
            Some(v) if v.is_finite() => {
                row.values.insert(field.name.to_string(), v);
            }
            _ if field.optional => {}
            _ => {
                return Err(FetchError::MissingField {
                    symbol: symbol.to_string(),
                    field: field.name,
                });
            }
        }
    }

    Ok(row)
}

//
// Request/response shapes of the scanner `/crypto/scan` endpoint.
//
#[derive(Debug, Serialize)]
struct ScanRequest {
    symbols: ScanSymbols,
    columns: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ScanSymbols {
    tickers: Vec<String>,
    query: ScanQuery,
}

#[derive(Debug, Serialize)]
struct ScanQuery {
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ScanResponse {
    #[serde(default)]
    data: Vec<ScanItem>,
}

#[derive(Debug, Deserialize)]
struct ScanItem {
    s: String,
    d: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_values() -> Vec<Option<f64>> {
        (0..FIELDS.len()).map(|i| Some(i as f64)).collect()
    }

    #[test]
    fn columns_carry_interval_suffix() {
        let cols = TradingViewClient::columns(Interval::Hour4);
        assert_eq!(cols.len(), FIELDS.len());
        assert!(cols.contains(&"RSI|240".to_string()));

        let daily = TradingViewClient::columns(Interval::Day1);
        assert!(daily.contains(&"RSI".to_string()));
    }

    #[test]
    fn missing_optional_value_is_left_out() {
        let mut values = full_values();
        let idx = FIELDS.iter().position(|f| f.name == "ema200").unwrap();
        values[idx] = None;

        let row = row_from_values("BTCUSDT", &values).unwrap();
        assert_eq!(row.values.len(), FIELDS.len() - 1);
        assert_eq!(row.number("ema200"), None);
    }

    #[test]
    fn missing_required_value_fails_the_symbol() {
        let mut values = full_values();
        let idx = FIELDS.iter().position(|f| f.name == "rsi").unwrap();
        values[idx] = None;

        let err = row_from_values("BTCUSDT", &values).unwrap_err();
        assert!(matches!(err, FetchError::MissingField { field: "rsi", .. }));
    }

    #[test]
    fn short_response_fails_the_symbol() {
        let values = vec![Some(1.0); 3];
        assert!(row_from_values("BTCUSDT", &values).is_err());
    }

    #[test]
    fn response_with_nulls_deserializes() {
        let json = r#"{"totalCount":1,"data":[{"s":"BINANCE:BTCUSDT","d":[1.5,null,3]}]}"#;
        let res: ScanResponse = serde_json::from_str(json).unwrap();
        assert_eq!(res.data[0].d, vec![Some(1.5), None, Some(3.0)]);
    }
}
