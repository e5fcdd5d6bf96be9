use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::{error::StoreError, interval::Interval, persist::BlobStore, row::Snapshot};

/// Latest snapshot per interval, mirrored to a [`BlobStore`].
///
/// Readers get an `Arc<Snapshot>`: replacing an entry swaps the pointer, so a
/// reader holds either the whole previous table or the whole new one.
pub struct SnapshotStore {
    current: DashMap<Interval, Arc<Snapshot>>,
    persistence: Arc<dyn BlobStore>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotStatus {
    pub interval: Interval,
    pub completed_at: DateTime<Utc>,
    pub rows: usize,
    pub skipped: usize,
}

impl SnapshotStore {
    pub fn new(persistence: Arc<dyn BlobStore>) -> Arc<Self> {
        Arc::new(Self {
            current: DashMap::new(),
            persistence,
        })
    }

    /// Replace the snapshot for `snapshot.interval`.
    ///
    /// The in-memory table is swapped even if persisting fails, so readers get
    /// the fresh data; the persistence error is still returned to the caller.
    pub async fn put(&self, snapshot: Snapshot) -> Result<Arc<Snapshot>, StoreError> {
        let interval = snapshot.interval;
        let saved = match serde_json::to_string(&snapshot) {
            Ok(blob) => self.persistence.save(interval.as_str(), &blob).await,
            Err(e) => Err(e.into()),
        };

        let snapshot = Arc::new(snapshot);
        self.current.insert(interval, Arc::clone(&snapshot));
        debug!(%interval, rows = snapshot.len(), "snapshot replaced");

        saved.map(|_| snapshot)
    }

    pub fn get(&self, interval: Interval) -> Result<Arc<Snapshot>, StoreError> {
        self.current
            .get(&interval)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(StoreError::NotFound(interval))
    }

    /// Load persisted snapshots for `intervals`. Returns how many were restored.
    ///
    /// Missing and unreadable blobs are skipped; an interval that already has a
    /// snapshot in memory keeps it.
    pub async fn restore(&self, intervals: &[Interval]) -> usize {
        let mut restored = 0;

        for &interval in intervals {
            let blob = match self.persistence.load(interval.as_str()).await {
                Ok(Some(blob)) => blob,
                Ok(None) => {
                    debug!(%interval, "no persisted snapshot");
                    continue;
                }
                Err(e) => {
                    warn!(%interval, error = %e, "loading persisted snapshot failed");
                    continue;
                }
            };

            let snapshot: Snapshot = match serde_json::from_str(&blob) {
                Ok(s) => s,
                Err(e) => {
                    warn!(%interval, error = %e, "persisted snapshot is corrupt, ignoring");
                    continue;
                }
            };

            if snapshot.interval != interval {
                warn!(%interval, found = %snapshot.interval, "persisted snapshot has the wrong interval");
                continue;
            }

            info!(
                %interval,
                rows = snapshot.len(),
                completed_at = %snapshot.completed_at,
                "restored snapshot"
            );
            self.current.entry(interval).or_insert_with(|| Arc::new(snapshot));
            restored += 1;
        }

        restored
    }

    pub fn status(&self) -> Vec<SnapshotStatus> {
        let mut status: Vec<SnapshotStatus> = self
            .current
            .iter()
            .map(|entry| {
                let s = entry.value();
                SnapshotStatus {
                    interval: s.interval,
                    completed_at: s.completed_at,
                    rows: s.len(),
                    skipped: s.skipped(),
                }
            })
            .collect();
        status.sort_by_key(|s| s.interval);
        status
    }
}
