use thiserror::Error;

use crate::interval::Interval;

/// A single symbol could not be fetched. The refresher skips the symbol.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("indicator source returned no data for {0}")]
    NoData(String),

    #[error("required field `{field}` missing for {symbol}")]
    MissingField { symbol: String, field: &'static str },

    #[error("fetch timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// The symbol universe could not be listed. The whole cycle is skipped.
#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("symbol universe is empty")]
    Empty,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no snapshot stored for {0} yet")]
    NotFound(Interval),

    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] fred::error::Error),
}

/// What the refresher loop does after a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Sleep the regular period and try again.
    NextPeriod,
    /// Sleep the configured backoff, then resume the loop.
    Backoff,
    /// Leave the loop.
    Exit,
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("symbol universe unavailable: {0}")]
    Universe(#[from] UniverseError),

    #[error("snapshot could not be persisted: {0}")]
    Store(#[from] StoreError),

    #[error("refresh cancelled")]
    Cancelled,

    #[error("{0} is not a scheduled interval")]
    Unscheduled(Interval),
}

impl RefreshError {
    pub fn disposition(&self) -> Disposition {
        match self {
            RefreshError::Universe(_) => Disposition::NextPeriod,
            RefreshError::Store(_) => Disposition::Backoff,
            RefreshError::Cancelled | RefreshError::Unscheduled(_) => Disposition::Exit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("empty expression")]
    Empty,

    #[error("unknown field `{name}` at {offset}")]
    UnknownField { name: String, offset: usize },

    #[error("unexpected character `{ch}` at {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated string starting at {0}")]
    UnterminatedString(usize),

    #[error("invalid number `{text}` at {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("expected {expected} at {offset}")]
    Expected { expected: &'static str, offset: usize },

    #[error("unexpected trailing input at {0}")]
    Trailing(usize),

    #[error("expression nested too deeply at {offset}")]
    TooDeep { offset: usize },
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("no active session, start a new query")]
    NoSuchSession,

    #[error("page {requested} is out of range (total pages: {total})")]
    OutOfRange { requested: isize, total: usize },

    #[error("this result was replaced by a newer query")]
    Superseded,

    #[error("no {0} data yet, run a refresh first")]
    SnapshotMissing(Interval),

    #[error("query error: {0}")]
    Query(#[from] QueryError),
}
