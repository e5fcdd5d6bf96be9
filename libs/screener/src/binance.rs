use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{error::UniverseError, source::SymbolSource};

pub const BINANCE_FAPI_URL: &str = "https://fapi.binance.com";

/// Symbol universe backed by the Binance USDⓈ-M futures 24h ticker.
#[derive(Clone)]
pub struct BinanceUniverse {
    client: Client,
    base_api: String,
}

impl BinanceUniverse {
    pub fn new(base_api: String, timeout: Duration) -> Result<Self, UniverseError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_api })
    }
}

#[async_trait]
impl SymbolSource for BinanceUniverse {
    async fn list_symbols(&self) -> Result<Vec<String>, UniverseError> {
        let url = format!("{}/fapi/v1/ticker/24hr", self.base_api.trim_end_matches('/'));

        let tickers: Vec<Ticker> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if tickers.is_empty() {
            return Err(UniverseError::Empty);
        }

        Ok(tickers.into_iter().map(|t| t.symbol).collect())
    }
}

#[derive(Debug, Deserialize)]
struct Ticker {
    symbol: String,
}
