mod binance;
mod error;
mod interval;
mod paginator;
mod persist;
mod refresher;
mod row;
mod scheduler;
mod snapshot_store;
mod source;
mod tradingview;

pub mod fields;
pub mod query;

#[cfg(test)]
mod testing;

pub use binance::{BINANCE_FAPI_URL, BinanceUniverse};
pub use error::{
    Disposition, FetchError, PageError, QueryError, RefreshError, StoreError, UniverseError,
};
pub use interval::{Interval, IntervalConfig, ParseIntervalError};
pub use paginator::{PageView, Paginator, PaginatorSettings, SessionId, total_pages};
pub use persist::{BlobStore, FsBlobStore, RedisBlobStore};
pub use query::{Filter, Signal};
pub use refresher::{IntervalRefresher, RefreshEvent, RefreshSettings};
pub use row::{Row, Snapshot, Value};
pub use scheduler::RefreshScheduler;
pub use snapshot_store::{SnapshotStatus, SnapshotStore};
pub use source::{IndicatorFetcher, SymbolSource};
pub use tradingview::{TRADINGVIEW_SCAN_URL, TradingViewClient, row_from_values};
