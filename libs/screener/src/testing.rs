//! In-memory collaborators shared by the unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;

use crate::{
    error::{FetchError, StoreError, UniverseError},
    interval::Interval,
    persist::BlobStore,
    row::{Row, Snapshot},
    source::{IndicatorFetcher, SymbolSource},
};

pub fn snapshot_of(interval: Interval, rows: Vec<Row>) -> Snapshot {
    let now = Utc::now();
    Snapshot {
        interval,
        started_at: now,
        completed_at: now,
        attempted: rows.len(),
        rows,
    }
}

pub fn rsi_rows(values: &[f64]) -> Vec<Row> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| Row::new(format!("SYM{i}")).with("rsi", *v))
        .collect()
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, String>>,
    fail_saves: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn saved(&self, key: &str) -> Option<String> {
        self.blobs.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn save(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("disk full").into());
        }
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), blob.to_string());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.saved(key))
    }
}

/// Universe that records when each cycle asked for symbols.
pub struct FakeUniverse {
    symbols: Vec<String>,
    fail: AtomicBool,
    panic_on_call: Mutex<HashSet<usize>>,
    calls: AtomicUsize,
    started: Mutex<Vec<Instant>>,
}

impl FakeUniverse {
    pub fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            symbols: (0..count).map(|i| format!("SYM{i}")).collect(),
            fail: AtomicBool::new(false),
            panic_on_call: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
        })
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Panic on the given (zero-based) call.
    pub fn panic_on(&self, call: usize) {
        self.panic_on_call.lock().unwrap().insert(call);
    }

    pub fn starts(&self) -> Vec<Instant> {
        self.started.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SymbolSource for FakeUniverse {
    async fn list_symbols(&self) -> Result<Vec<String>, UniverseError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.lock().unwrap().push(Instant::now());

        if self.panic_on_call.lock().unwrap().contains(&call) {
            panic!("universe exploded on call {call}");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(UniverseError::Empty);
        }
        Ok(self.symbols.clone())
    }
}

/// Fetcher returning `rsi = <symbol index>` after a fixed delay.
pub struct FakeFetcher {
    delay: Duration,
    failing: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    fetched: Mutex<Vec<(Interval, String)>>,
}

impl FakeFetcher {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            failing: Mutex::new(HashSet::new()),
            hanging: Mutex::new(HashSet::new()),
            fetched: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_symbol(&self, symbol: &str) {
        self.failing.lock().unwrap().insert(symbol.to_string());
    }

    /// The symbol never answers; only a timeout gets the refresher past it.
    pub fn hang_symbol(&self, symbol: &str) {
        self.hanging.lock().unwrap().insert(symbol.to_string());
    }

    pub fn fetched(&self) -> Vec<(Interval, String)> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl IndicatorFetcher for FakeFetcher {
    async fn fetch(&self, symbol: &str, interval: Interval) -> Result<Row, FetchError> {
        self.fetched
            .lock()
            .unwrap()
            .push((interval, symbol.to_string()));

        let hangs = self.hanging.lock().unwrap().contains(symbol);
        if hangs {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.delay).await;

        if self.failing.lock().unwrap().contains(symbol) {
            return Err(FetchError::NoData(symbol.to_string()));
        }

        let idx: f64 = symbol
            .trim_start_matches("SYM")
            .parse()
            .unwrap_or_default();
        Ok(Row::new(symbol).with("rsi", idx).with("close", 1.0 + idx))
    }
}
