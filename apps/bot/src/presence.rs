use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serenity::all::{ActivityData, Context as SerenityContext};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};

use screener::{Interval, RefreshEvent, SnapshotStore};

const ROTATE_EVERY: Duration = Duration::from_secs(30);

/// Status lines shown in the bot's presence, one per refreshed interval plus
/// the version.
pub struct Board {
    version: String,
    tz: Tz,
    lines: BTreeMap<Interval, String>,
    cursor: usize,
}

impl Board {
    pub fn new(version: &str, tz: Tz) -> Self {
        let version = if version.starts_with('v') {
            version.to_string()
        } else {
            format!("Version - {version}")
        };

        Self {
            version,
            tz,
            lines: BTreeMap::new(),
            cursor: 0,
        }
    }

    pub fn seed(&mut self, store: &SnapshotStore) {
        for status in store.status() {
            self.set(status.interval, status.rows, status.completed_at);
        }
    }

    pub fn apply(&mut self, event: &RefreshEvent) {
        match event {
            RefreshEvent::Completed {
                interval, at, rows, ..
            } => self.set(*interval, *rows, *at),
            RefreshEvent::Started { interval, .. } => {
                self.lines
                    .insert(*interval, format!("{interval} · refreshing"));
            }
            RefreshEvent::Failed { interval, .. } => {
                self.lines
                    .insert(*interval, format!("{interval} · refresh failed"));
            }
        }
    }

    /// Next text in the rotation: the version, then each interval in order.
    pub fn next_text(&mut self) -> String {
        let slots = self.lines.len() + 1;
        let slot = self.cursor % slots;
        self.cursor = (self.cursor + 1) % slots;

        match slot {
            0 => self.version.clone(),
            n => self
                .lines
                .values()
                .nth(n - 1)
                .cloned()
                .unwrap_or_else(|| self.version.clone()),
        }
    }

    fn set(&mut self, interval: Interval, rows: usize, at: DateTime<Utc>) {
        let local = at.with_timezone(&self.tz);
        self.lines.insert(
            interval,
            format!("{interval} · {rows} rows · {}", local.format("%H:%M")),
        );
    }
}

/// Rotate the presence text and fold refresh events into it until the event
/// channel closes.
pub async fn run(
    ctx: SerenityContext,
    store: Arc<SnapshotStore>,
    mut events: broadcast::Receiver<RefreshEvent>,
    version: String,
    tz: Tz,
) {
    let board = Arc::new(Mutex::new(Board::new(&version, tz)));
    board.lock().await.seed(&store);

    let rotating = {
        let board = Arc::clone(&board);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(ROTATE_EVERY);
            loop {
                tick.tick().await;
                let text = board.lock().await.next_text();
                ctx.set_activity(Some(ActivityData::custom(text)));
            }
        })
    };

    loop {
        match events.recv().await {
            Ok(event) => {
                debug!(interval = %event.interval(), "presence update");
                board.lock().await.apply(&event);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "presence fell behind refresh events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    rotating.abort();
}
