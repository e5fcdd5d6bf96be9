use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tracing::{error, info, info_span, warn};
use tracing_futures::Instrument;

use crate::{
    error::RefreshError,
    interval::{Interval, IntervalConfig},
    refresher::{IntervalRefresher, RefreshEvent, RefreshSettings, sleep_or_stop},
    row::Snapshot,
    snapshot_store::SnapshotStore,
    source::{IndicatorFetcher, SymbolSource},
};

const EVENT_CAPACITY: usize = 256;

/// Owns one [`IntervalRefresher`] per configured interval and keeps each of
/// them running on its own task.
pub struct RefreshScheduler {
    symbols: Arc<dyn SymbolSource>,
    fetcher: Arc<dyn IndicatorFetcher>,
    store: Arc<SnapshotStore>,
    settings: RefreshSettings,
    events: broadcast::Sender<RefreshEvent>,
    stop_tx: watch::Sender<bool>,
    refreshers: BTreeMap<Interval, Arc<IntervalRefresher>>,
    tasks: Vec<JoinHandle<()>>,
}

impl RefreshScheduler {
    pub fn new(
        symbols: Arc<dyn SymbolSource>,
        fetcher: Arc<dyn IndicatorFetcher>,
        store: Arc<SnapshotStore>,
        settings: RefreshSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (stop_tx, _) = watch::channel(false);

        Self {
            symbols,
            fetcher,
            store,
            settings,
            events,
            stop_tx,
            refreshers: BTreeMap::new(),
            tasks: Vec::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn intervals(&self) -> Vec<Interval> {
        self.refreshers.keys().copied().collect()
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Launch a supervised refresher for every interval. Intervals that are
    /// already running are left alone.
    pub fn start(&mut self, intervals: &[IntervalConfig]) {
        self.stop_tx.send_replace(false);

        for config in intervals {
            if self.refreshers.contains_key(&config.interval) {
                warn!(interval = %config.interval, "interval already scheduled");
                continue;
            }

            let refresher = Arc::new(IntervalRefresher::new(
                *config,
                Arc::clone(&self.symbols),
                Arc::clone(&self.fetcher),
                Arc::clone(&self.store),
                self.settings,
                self.events.clone(),
            ));

            let span = info_span!("refresher", interval = %config.interval);
            let task = tokio::spawn(
                supervise(
                    Arc::clone(&refresher),
                    self.stop_tx.subscribe(),
                    self.settings.backoff,
                    self.events.clone(),
                )
                .instrument(span),
            );

            self.refreshers.insert(config.interval, refresher);
            self.tasks.push(task);
        }

        info!(
            intervals = ?self.intervals(),
            backoff_secs = self.settings.backoff.as_secs(),
            "refresh scheduler started"
        );
    }

    /// Signal every refresher, and any `refresh_now` in progress, to exit
    /// without waiting for them.
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Ask every refresher to exit and wait for them. A fetch already in
    /// flight is allowed to finish.
    pub async fn stop(&mut self) {
        self.request_stop();

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "refresher task ended abnormally");
            }
        }
        self.refreshers.clear();

        info!("refresh scheduler stopped");
    }

    /// Run one cycle for `interval` right now, on the caller's task.
    ///
    /// Shares the interval's cycle lock with its timer loop, so this waits for
    /// an in-flight scheduled cycle rather than racing it.
    pub async fn refresh_now(&self, interval: Interval) -> Result<Arc<Snapshot>, RefreshError> {
        let refresher = self
            .refreshers
            .get(&interval)
            .ok_or(RefreshError::Unscheduled(interval))?;

        refresher.refresh(&self.stop_tx.subscribe()).await
    }
}

/// Keep a refresher loop alive: a panicking cycle is logged, followed by a
/// backoff sleep and a fresh loop. Returns once stop is requested.
async fn supervise(
    refresher: Arc<IntervalRefresher>,
    mut stop: watch::Receiver<bool>,
    backoff: Duration,
    events: broadcast::Sender<RefreshEvent>,
) {
    let interval = refresher.interval();

    loop {
        let task = tokio::spawn(Arc::clone(&refresher).run(stop.clone()).in_current_span());

        match task.await {
            Ok(()) => break,
            Err(e) if e.is_panic() => {
                error!(%interval, backoff_secs = backoff.as_secs(), "refresher crashed, resuming after backoff");
                let _ = events.send(RefreshEvent::Failed {
                    interval,
                    at: Utc::now(),
                    reason: "refresher crashed".to_string(),
                });
            }
            Err(e) => {
                warn!(%interval, error = %e, "refresher task cancelled");
                break;
            }
        }

        if !sleep_or_stop(backoff, &mut stop).await {
            break;
        }
    }
}
