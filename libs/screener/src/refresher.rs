use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{Mutex, broadcast, watch},
    time::{Instant, timeout},
};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    error::{Disposition, FetchError, RefreshError},
    interval::{Interval, IntervalConfig},
    row::Snapshot,
    snapshot_store::SnapshotStore,
    source::{IndicatorFetcher, SymbolSource},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSettings {
    /// Upper bound for a single symbol fetch.
    pub fetch_timeout: Duration,
    /// Scan only the first N symbols of the universe.
    pub universe_limit: Option<usize>,
    /// Pause after a crashed or unpersisted cycle.
    pub backoff: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(15),
            universe_limit: None,
            backoff: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshEvent {
    Started {
        interval: Interval,
        at: DateTime<Utc>,
    },
    Completed {
        interval: Interval,
        at: DateTime<Utc>,
        rows: usize,
        skipped: usize,
        duration: Duration,
    },
    Failed {
        interval: Interval,
        at: DateTime<Utc>,
        reason: String,
    },
}

impl RefreshEvent {
    pub fn interval(&self) -> Interval {
        match self {
            RefreshEvent::Started { interval, .. }
            | RefreshEvent::Completed { interval, .. }
            | RefreshEvent::Failed { interval, .. } => *interval,
        }
    }
}

/// Drives fetch-all-symbols-then-store for one interval.
pub struct IntervalRefresher {
    config: IntervalConfig,
    symbols: Arc<dyn SymbolSource>,
    fetcher: Arc<dyn IndicatorFetcher>,
    store: Arc<SnapshotStore>,
    settings: RefreshSettings,
    events: broadcast::Sender<RefreshEvent>,
    // held for a whole cycle so timer and on-demand refreshes never interleave
    cycle: Mutex<()>,
}

impl IntervalRefresher {
    pub fn new(
        config: IntervalConfig,
        symbols: Arc<dyn SymbolSource>,
        fetcher: Arc<dyn IndicatorFetcher>,
        store: Arc<SnapshotStore>,
        settings: RefreshSettings,
        events: broadcast::Sender<RefreshEvent>,
    ) -> Self {
        Self {
            config,
            symbols,
            fetcher,
            store,
            settings,
            events,
            cycle: Mutex::new(()),
        }
    }

    pub fn interval(&self) -> Interval {
        self.config.interval
    }

    pub fn period(&self) -> Duration {
        self.config.period
    }

    /// Run cycles until `stop` flips, sleeping `period` after each one.
    pub async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        let interval = self.config.interval;
        info!(%interval, period_secs = self.config.period.as_secs(), "refresher started");

        loop {
            if *stop.borrow() {
                break;
            }

            let pause = match self.refresh(&stop).await {
                Ok(_) => self.config.period,
                Err(e) => match e.disposition() {
                    Disposition::NextPeriod => {
                        warn!(%interval, error = %e, "refresh cycle skipped");
                        self.config.period
                    }
                    Disposition::Backoff => {
                        error!(%interval, error = %e, backoff_secs = self.settings.backoff.as_secs(), "refresh cycle failed");
                        self.settings.backoff
                    }
                    Disposition::Exit => break,
                },
            };

            if !sleep_or_stop(pause, &mut stop).await {
                break;
            }
        }

        info!(%interval, "refresher stopped");
    }

    /// One full cycle: list symbols, fetch each in turn, replace the snapshot.
    ///
    /// Symbols that fail or time out are left out. If `stop` flips mid-cycle the
    /// partial table is discarded and the stored snapshot stays as it was.
    #[instrument(name = "refresh_cycle", skip_all, fields(interval = %self.config.interval))]
    pub async fn refresh(&self, stop: &watch::Receiver<bool>) -> Result<Arc<Snapshot>, RefreshError> {
        let _cycle = self.cycle.lock().await;

        let interval = self.config.interval;
        let started_at = Utc::now();
        let clock = Instant::now();
        self.emit(RefreshEvent::Started {
            interval,
            at: started_at,
        });
        info!(started_at = %started_at, "refresh started");

        let mut symbols = match self.symbols.list_symbols().await {
            Ok(s) => s,
            Err(e) => return Err(self.fail(e.into())),
        };
        if let Some(limit) = self.settings.universe_limit {
            symbols.truncate(limit);
        }
        info!(total_symbols = symbols.len(), "loaded symbols");

        let mut rows = Vec::with_capacity(symbols.len());
        let mut failures: usize = 0;

        for symbol in &symbols {
            if *stop.borrow() {
                info!(fetched = rows.len(), "stop requested, abandoning cycle");
                return Err(self.fail(RefreshError::Cancelled));
            }

            let fetched = timeout(self.settings.fetch_timeout, self.fetcher.fetch(symbol, interval))
                .await
                .unwrap_or(Err(FetchError::Timeout(self.settings.fetch_timeout)));
            match fetched {
                Ok(row) => rows.push(row),
                Err(e) => {
                    failures += 1;
                    debug!(%symbol, error = %e, "fetch failed, skipping symbol");
                }
            }
        }

        let snapshot = Snapshot {
            interval,
            started_at,
            completed_at: Utc::now(),
            attempted: symbols.len(),
            rows,
        };
        let row_count = snapshot.len();

        let stored = match self.store.put(snapshot).await {
            Ok(s) => s,
            Err(e) => return Err(self.fail(e.into())),
        };

        let duration = clock.elapsed();
        info!(
            rows = row_count,
            skipped = failures,
            duration_ms = duration.as_millis() as u64,
            "refresh completed"
        );
        self.emit(RefreshEvent::Completed {
            interval,
            at: stored.completed_at,
            rows: row_count,
            skipped: failures,
            duration,
        });

        Ok(stored)
    }

    fn fail(&self, error: RefreshError) -> RefreshError {
        self.emit(RefreshEvent::Failed {
            interval: self.config.interval,
            at: Utc::now(),
            reason: error.to_string(),
        });
        error
    }

    fn emit(&self, event: RefreshEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Sleep for `pause`, waking early on stop. Returns false if stopped.
pub(crate) async fn sleep_or_stop(pause: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    if *stop.borrow() {
        return false;
    }

    tokio::select! {
        _ = tokio::time::sleep(pause) => true,
        _ = stopped(stop) => false,
    }
}

/// Resolves once a stop is requested or the scheduler side is gone.
pub(crate) async fn stopped(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::StoreError,
        testing::{FakeFetcher, FakeUniverse, MemoryBlobStore},
    };

    struct Harness {
        universe: Arc<FakeUniverse>,
        fetcher: Arc<FakeFetcher>,
        blobs: Arc<MemoryBlobStore>,
        store: Arc<SnapshotStore>,
        events: broadcast::Receiver<RefreshEvent>,
        refresher: Arc<IntervalRefresher>,
    }

    fn harness(symbols: usize, settings: RefreshSettings) -> Harness {
        let universe = FakeUniverse::new(symbols);
        let fetcher = FakeFetcher::new(Duration::from_millis(100));
        let blobs = MemoryBlobStore::new();
        let store = SnapshotStore::new(blobs.clone());
        let (tx, events) = broadcast::channel(64);
        let refresher = Arc::new(IntervalRefresher::new(
            IntervalConfig::new(Interval::Minute15),
            universe.clone(),
            fetcher.clone(),
            Arc::clone(&store),
            settings,
            tx,
        ));
        Harness {
            universe,
            fetcher,
            blobs,
            store,
            events,
            refresher,
        }
    }

    fn never_stop() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        std::mem::forget(tx);
        rx
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_symbol_is_skipped() {
        let mut h = harness(50, RefreshSettings::default());
        h.fetcher.fail_symbol("SYM17");

        let snap = h.refresher.refresh(&never_stop()).await.unwrap();

        assert_eq!(snap.len(), 49);
        assert_eq!(snap.attempted, 50);
        assert!(snap.rows.iter().all(|r| r.symbol != "SYM17"));
        // symbols are fetched in universe order
        assert_eq!(snap.rows[17].symbol, "SYM18");

        assert!(matches!(h.events.recv().await.unwrap(), RefreshEvent::Started { .. }));
        match h.events.recv().await.unwrap() {
            RefreshEvent::Completed { rows, skipped, .. } => {
                assert_eq!(rows, 49);
                assert_eq!(skipped, 1);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
        assert!(h.blobs.saved("15m").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn all_symbols_failing_still_stores_an_empty_snapshot() {
        let h = harness(3, RefreshSettings::default());
        for s in ["SYM0", "SYM1", "SYM2"] {
            h.fetcher.fail_symbol(s);
        }

        h.refresher.refresh(&never_stop()).await.unwrap();

        let snap = h.store.get(Interval::Minute15).unwrap();
        assert!(snap.is_empty());
        assert_eq!(snap.skipped(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn universe_failure_skips_the_cycle() {
        let h = harness(5, RefreshSettings::default());
        h.universe.fail(true);

        let err = h.refresher.refresh(&never_stop()).await.unwrap_err();

        assert_eq!(err.disposition(), Disposition::NextPeriod);
        assert!(matches!(
            h.store.get(Interval::Minute15),
            Err(StoreError::NotFound(_))
        ));
        assert!(h.fetcher.fetched().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_fetch_times_out() {
        let settings = RefreshSettings {
            fetch_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let h = harness(3, settings);
        h.fetcher.hang_symbol("SYM1");

        let snap = h.refresher.refresh(&never_stop()).await.unwrap();

        let symbols: Vec<_> = snap.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, ["SYM0", "SYM2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn universe_limit_caps_the_scan() {
        let settings = RefreshSettings {
            universe_limit: Some(4),
            ..Default::default()
        };
        let h = harness(10, settings);

        let snap = h.refresher.refresh(&never_stop()).await.unwrap();

        assert_eq!(snap.len(), 4);
        assert_eq!(h.fetcher.fetched().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn persist_failure_backs_off_but_serves_data() {
        let h = harness(2, RefreshSettings::default());
        h.blobs.fail_saves(true);

        let err = h.refresher.refresh(&never_stop()).await.unwrap_err();

        assert_eq!(err.disposition(), Disposition::Backoff);
        assert_eq!(h.store.get(Interval::Minute15).unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_starts_are_at_least_one_period_apart() {
        // 5 symbols * 3s = 15s per cycle, period 60s
        let universe = FakeUniverse::new(5);
        let fetcher = FakeFetcher::new(Duration::from_secs(3));
        let store = SnapshotStore::new(MemoryBlobStore::new());
        let (tx, _rx) = broadcast::channel(64);
        let refresher = Arc::new(IntervalRefresher::new(
            IntervalConfig::new(Interval::Minute1),
            universe.clone(),
            fetcher,
            store,
            RefreshSettings::default(),
            tx,
        ));

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(Arc::clone(&refresher).run(stop_rx));

        tokio::time::sleep(Duration::from_secs(400)).await;
        stop_tx.send(true).unwrap();
        task.await.unwrap();

        let starts = universe.starts();
        assert!(starts.len() >= 4, "only {} cycles", starts.len());
        for pair in starts.windows(2) {
            let gap = pair[1] - pair[0];
            // period is a minimum gap added after the cycle, never overlapping it
            assert!(gap >= Duration::from_secs(75), "gap {gap:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_mid_cycle_keeps_previous_snapshot() {
        let h = harness(20, RefreshSettings::default());
        h.refresher.refresh(&never_stop()).await.unwrap();
        let before = h.store.get(Interval::Minute15).unwrap();

        let (stop_tx, stop_rx) = watch::channel(false);
        let refresher = Arc::clone(&h.refresher);
        let cycle = tokio::spawn(async move { refresher.refresh(&stop_rx).await });

        // 20 symbols * 100ms; stop half way
        tokio::time::sleep(Duration::from_millis(1050)).await;
        stop_tx.send(true).unwrap();

        let err = cycle.await.unwrap().unwrap_err();
        assert!(matches!(err, RefreshError::Cancelled));
        assert!(Arc::ptr_eq(&before, &h.store.get(Interval::Minute15).unwrap()));
        // in-flight fetch finished, nothing after it started
        assert!(h.fetcher.fetched().len() < 40);
    }

    #[tokio::test(start_paused = true)]
    async fn run_exits_promptly_when_stopped_while_sleeping() {
        let h = harness(1, RefreshSettings::default());
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(Arc::clone(&h.refresher).run(stop_rx));

        tokio::time::sleep(Duration::from_secs(5)).await;
        let before = Instant::now();
        stop_tx.send(true).unwrap();
        task.await.unwrap();

        assert!(before.elapsed() < Duration::from_secs(1));
        assert_eq!(h.universe.calls(), 1);
    }
}
