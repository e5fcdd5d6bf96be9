use async_trait::async_trait;

use crate::{
    error::{FetchError, UniverseError},
    interval::Interval,
    row::Row,
};

/// Produces one row of indicator values for a symbol at a given granularity.
///
/// Implementations talk to slow, unreliable services; callers must be ready to
/// skip a symbol when this fails.
#[async_trait]
pub trait IndicatorFetcher: Send + Sync {
    async fn fetch(&self, symbol: &str, interval: Interval) -> Result<Row, FetchError>;
}

/// Lists the instruments a refresh cycle should cover, in a stable order.
#[async_trait]
pub trait SymbolSource: Send + Sync {
    async fn list_symbols(&self) -> Result<Vec<String>, UniverseError>;
}
