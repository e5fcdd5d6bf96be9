use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::{
    error::PageError,
    interval::Interval,
    query::{Filter, Signal},
    row::Row,
    snapshot_store::SnapshotStore,
};

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginatorSettings {
    pub page_size: usize,
    pub default_interval: Interval,
    pub idle_ttl: Duration,
}

impl Default for PaginatorSettings {
    fn default() -> Self {
        Self {
            page_size: 10,
            default_interval: Interval::Minute15,
            idle_ttl: Duration::from_secs(30 * 60),
        }
    }
}

/// One page of a session's result set.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub rows: Vec<Row>,
    pub page: usize,
    pub total_pages: usize,
    pub total_rows: usize,
    pub interval: Interval,
    pub expression: String,
    /// When the snapshot behind this result finished refreshing.
    pub as_of: DateTime<Utc>,
    /// Identifies the result set; a new query in the same session gets a new one.
    pub result_id: u64,
}

impl PageView {
    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages
    }
}

/// `max(1, ceil(rows / page_size))`
pub fn total_pages(rows: usize, page_size: usize) -> usize {
    rows.div_ceil(page_size.max(1)).max(1)
}

struct ResultSet {
    id: u64,
    interval: Interval,
    expression: String,
    as_of: DateTime<Utc>,
    rows: Vec<Row>,
    page: usize,
}

struct Session {
    interval: Interval,
    results: Option<ResultSet>,
    last_seen: Instant,
}

/// Per-caller interval selection and result cursors.
///
/// Sessions sit in a sharded map. Entry locks are only held while a page is
/// copied out, and result sets are computed before the entry is touched, so
/// callers never wait on a refresh, and only briefly on each other when two
/// ids share a shard.
pub struct Paginator {
    sessions: DashMap<SessionId, Session>,
    next_result: AtomicU64,
    store: Arc<SnapshotStore>,
    settings: PaginatorSettings,
}

impl Paginator {
    pub fn new(store: Arc<SnapshotStore>, settings: PaginatorSettings) -> Self {
        Self {
            sessions: DashMap::new(),
            next_result: AtomicU64::new(1),
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &PaginatorSettings {
        &self.settings
    }

    pub fn select_interval(&self, id: SessionId, interval: Interval) {
        self.drop_if_stale(id);
        let mut session = self.sessions.entry(id).or_insert_with(|| self.fresh_session());
        session.interval = interval;
        session.last_seen = Instant::now();
    }

    pub fn selected_interval(&self, id: SessionId) -> Interval {
        self.drop_if_stale(id);
        self.sessions
            .get(&id)
            .map(|s| s.interval)
            .unwrap_or(self.settings.default_interval)
    }

    /// Run `expression` against the latest snapshot and start at page 0.
    ///
    /// `interval = None` uses the session's selected interval. On error the
    /// previous result set, if any, is kept.
    pub fn new_query(
        &self,
        id: SessionId,
        interval: Option<Interval>,
        expression: &str,
    ) -> Result<PageView, PageError> {
        let filter = Filter::parse(expression)?;
        self.run(id, interval, filter)
    }

    pub fn signal(
        &self,
        id: SessionId,
        interval: Option<Interval>,
        signal: Signal,
    ) -> Result<PageView, PageError> {
        self.run(id, interval, signal.filter())
    }

    pub fn current(&self, id: SessionId) -> Result<PageView, PageError> {
        self.navigate(id, None, |page| page as isize)
    }

    pub fn next(&self, id: SessionId) -> Result<PageView, PageError> {
        self.navigate(id, None, |page| page as isize + 1)
    }

    pub fn prev(&self, id: SessionId) -> Result<PageView, PageError> {
        self.navigate(id, None, |page| page as isize - 1)
    }

    pub fn goto(&self, id: SessionId, page: usize) -> Result<PageView, PageError> {
        self.navigate(id, None, |_| page as isize)
    }

    /// Like [`goto`](Self::goto), but only within the result set `result_id`.
    /// Fails with `Superseded` once a newer query replaced it.
    pub fn goto_result(
        &self,
        id: SessionId,
        result_id: u64,
        page: usize,
    ) -> Result<PageView, PageError> {
        self.navigate(id, Some(result_id), |_| page as isize)
    }

    /// Drop sessions idle for longer than the TTL. Returns how many went.
    pub fn evict_idle(&self) -> usize {
        let before = self.sessions.len();
        let ttl = self.settings.idle_ttl;
        self.sessions.retain(|_, s| s.last_seen.elapsed() <= ttl);
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.sessions.len(), "evicted idle sessions");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn run(
        &self,
        id: SessionId,
        interval: Option<Interval>,
        filter: Filter,
    ) -> Result<PageView, PageError> {
        let interval = interval.unwrap_or_else(|| self.selected_interval(id));

        let snapshot = self
            .store
            .get(interval)
            .map_err(|_| PageError::SnapshotMissing(interval))?;
        let rows = filter.apply(&snapshot);
        debug!(
            session = id,
            %interval,
            expression = filter.source(),
            matched = rows.len(),
            "query executed"
        );

        let results = ResultSet {
            id: self.next_result.fetch_add(1, Ordering::Relaxed),
            interval,
            expression: filter.source().to_string(),
            as_of: snapshot.completed_at,
            rows,
            page: 0,
        };
        let view = self.view(&results);

        let mut session = self.sessions.entry(id).or_insert_with(|| self.fresh_session());
        session.results = Some(results);
        session.last_seen = Instant::now();

        Ok(view)
    }

    fn navigate(
        &self,
        id: SessionId,
        result_id: Option<u64>,
        target: impl FnOnce(usize) -> isize,
    ) -> Result<PageView, PageError> {
        self.drop_if_stale(id);

        let mut session = self.sessions.get_mut(&id).ok_or(PageError::NoSuchSession)?;
        session.last_seen = Instant::now();
        let page_size = self.settings.page_size;
        let results = session.results.as_mut().ok_or(PageError::NoSuchSession)?;
        if result_id.is_some_and(|wanted| wanted != results.id) {
            return Err(PageError::Superseded);
        }

        let total = total_pages(results.rows.len(), page_size);
        let requested = target(results.page);
        if requested < 0 || requested as usize >= total {
            return Err(PageError::OutOfRange { requested, total });
        }

        results.page = requested as usize;
        Ok(self.view(results))
    }

    fn view(&self, results: &ResultSet) -> PageView {
        let page_size = self.settings.page_size.max(1);
        let start = (results.page * page_size).min(results.rows.len());
        let end = (start + page_size).min(results.rows.len());

        PageView {
            rows: results.rows[start..end].to_vec(),
            page: results.page,
            total_pages: total_pages(results.rows.len(), page_size),
            total_rows: results.rows.len(),
            interval: results.interval,
            expression: results.expression.clone(),
            as_of: results.as_of,
            result_id: results.id,
        }
    }

    fn fresh_session(&self) -> Session {
        Session {
            interval: self.settings.default_interval,
            results: None,
            last_seen: Instant::now(),
        }
    }

    fn drop_if_stale(&self, id: SessionId) {
        let ttl = self.settings.idle_ttl;
        if self
            .sessions
            .remove_if(&id, |_, s| s.last_seen.elapsed() > ttl)
            .is_some()
        {
            debug!(session = id, "session expired");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::QueryError,
        testing::{MemoryBlobStore, rsi_rows, snapshot_of},
    };

    async fn paginator_with(rows: usize) -> Paginator {
        let store = SnapshotStore::new(MemoryBlobStore::new());
        let values: Vec<f64> = (0..rows).map(|i| i as f64).collect();
        store
            .put(snapshot_of(Interval::Minute15, rsi_rows(&values)))
            .await
            .unwrap();
        Paginator::new(store, PaginatorSettings::default())
    }

    fn symbols(view: &PageView) -> Vec<&str> {
        view.rows.iter().map(|r| r.symbol.as_str()).collect()
    }

    #[test]
    fn total_pages_formula() {
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(23, 10), 3);
    }

    #[tokio::test]
    async fn twenty_three_rows_make_three_pages() {
        let p = paginator_with(23).await;

        let first = p.new_query(1, None, "rsi >= 0").unwrap();
        assert_eq!(first.page, 0);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.total_rows, 23);
        assert_eq!(first.rows.len(), 10);
        assert_eq!(first.expression, "rsi >= 0");
        assert_eq!(first.interval, Interval::Minute15);
        assert!(!first.has_prev());

        let second = p.next(1).unwrap();
        assert_eq!(second.page, 1);
        assert_eq!(symbols(&second)[0], "SYM10");

        let third = p.next(1).unwrap();
        assert_eq!(third.rows.len(), 3);
        assert_eq!(symbols(&third), ["SYM20", "SYM21", "SYM22"]);
        assert!(!third.has_next());

        assert!(matches!(
            p.next(1),
            Err(PageError::OutOfRange {
                requested: 3,
                total: 3
            })
        ));
        // cursor unchanged after the failed move
        assert_eq!(p.current(1).unwrap().page, 2);
        assert_eq!(p.prev(1).unwrap().page, 1);
    }

    #[tokio::test]
    async fn prev_on_first_page_is_out_of_range() {
        let p = paginator_with(5).await;
        p.new_query(1, None, "rsi < 100").unwrap();
        assert!(matches!(
            p.prev(1),
            Err(PageError::OutOfRange {
                requested: -1,
                total: 1
            })
        ));
    }

    #[tokio::test]
    async fn goto_accepts_every_valid_index_only() {
        let p = paginator_with(23).await;
        p.new_query(9, None, "rsi >= 0").unwrap();

        for page in 0..3 {
            assert_eq!(p.goto(9, page).unwrap().page, page);
        }
        assert!(matches!(p.goto(9, 3), Err(PageError::OutOfRange { .. })));
        assert!(matches!(p.goto(9, 100), Err(PageError::OutOfRange { .. })));
    }

    #[tokio::test]
    async fn no_matches_is_a_single_empty_page() {
        let p = paginator_with(23).await;
        let view = p.new_query(1, None, "rsi > 1000").unwrap();

        assert_eq!(view.total_pages, 1);
        assert_eq!(view.total_rows, 0);
        assert!(view.rows.is_empty());
        assert_eq!(p.goto(1, 0).unwrap().page, 0);
    }

    #[tokio::test]
    async fn navigation_without_query_is_no_such_session() {
        let p = paginator_with(3).await;
        assert!(matches!(p.next(42), Err(PageError::NoSuchSession)));

        // an interval selection alone does not give a cursor
        p.select_interval(42, Interval::Minute15);
        assert!(matches!(p.goto(42, 0), Err(PageError::NoSuchSession)));
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let p = paginator_with(23).await;
        p.new_query(1, None, "rsi >= 0").unwrap();
        p.new_query(2, None, "rsi < 5").unwrap();

        p.next(1).unwrap();
        assert_eq!(p.current(1).unwrap().page, 1);
        assert_eq!(p.current(2).unwrap().page, 0);
        assert_eq!(p.current(2).unwrap().total_rows, 5);
    }

    #[tokio::test]
    async fn new_query_resets_cursor() {
        let p = paginator_with(23).await;
        p.new_query(1, None, "rsi >= 0").unwrap();
        p.goto(1, 2).unwrap();

        let view = p.new_query(1, None, "rsi >= 10").unwrap();
        assert_eq!(view.page, 0);
        assert_eq!(view.total_rows, 13);
    }

    #[tokio::test]
    async fn errors_keep_previous_results() {
        let p = paginator_with(23).await;
        p.new_query(1, None, "rsi >= 0").unwrap();
        p.next(1).unwrap();

        assert!(matches!(
            p.new_query(1, None, "rsi >="),
            Err(PageError::Query(QueryError::Expected { .. }))
        ));
        assert!(matches!(
            p.new_query(1, Some(Interval::Day1), "rsi > 1"),
            Err(PageError::SnapshotMissing(Interval::Day1))
        ));
        assert_eq!(p.current(1).unwrap().page, 1);
    }

    #[tokio::test]
    async fn selected_interval_is_used_by_default() {
        let p = paginator_with(3).await;
        assert_eq!(p.selected_interval(5), Interval::Minute15);

        p.select_interval(5, Interval::Hour4);
        assert_eq!(p.selected_interval(5), Interval::Hour4);
        assert!(matches!(
            p.new_query(5, None, "rsi > 1"),
            Err(PageError::SnapshotMissing(Interval::Hour4))
        ));
        // explicit interval wins
        assert!(p.new_query(5, Some(Interval::Minute15), "rsi > 1").is_ok());
    }

    #[tokio::test]
    async fn signal_runs_through_the_same_cursor() {
        let p = paginator_with(40).await;
        let view = p.signal(3, None, Signal::Oversold).unwrap();
        assert_eq!(view.total_rows, 31);
        assert_eq!(view.total_pages, 4);
        assert_eq!(view.expression, "rsi <= 30");
        assert_eq!(p.next(3).unwrap().page, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_expire() {
        let p = paginator_with(23).await;
        p.new_query(1, None, "rsi >= 0").unwrap();
        p.new_query(2, None, "rsi >= 0").unwrap();

        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        p.next(2).unwrap();
        tokio::time::advance(Duration::from_secs(15 * 60)).await;

        // session 1 idle 35 min, session 2 idle 15 min
        assert!(matches!(p.next(1), Err(PageError::NoSuchSession)));
        assert_eq!(p.evict_idle(), 0);
        assert_eq!(p.len(), 1);

        tokio::time::advance(Duration::from_secs(31 * 60)).await;
        assert_eq!(p.evict_idle(), 1);
        assert!(p.is_empty());
    }

    #[tokio::test]
    async fn old_result_ids_are_superseded() {
        let p = paginator_with(23).await;
        let first = p.new_query(1, None, "rsi >= 0").unwrap();
        assert_eq!(p.goto_result(1, first.result_id, 1).unwrap().page, 1);

        let second = p.new_query(1, None, "rsi >= 10").unwrap();
        assert_ne!(first.result_id, second.result_id);

        assert!(matches!(
            p.goto_result(1, first.result_id, 2),
            Err(PageError::Superseded)
        ));
        // the newer result set is untouched by the refused click
        assert_eq!(p.current(1).unwrap().page, 0);
        assert_eq!(p.goto_result(1, second.result_id, 1).unwrap().total_rows, 13);
    }

    #[tokio::test]
    async fn result_ids_are_unique_across_sessions() {
        let p = paginator_with(3).await;
        let a = p.new_query(1, None, "rsi >= 0").unwrap();
        let b = p.new_query(2, None, "rsi >= 0").unwrap();
        assert_ne!(a.result_id, b.result_id);
        assert!(matches!(
            p.goto_result(2, a.result_id, 0),
            Err(PageError::Superseded)
        ));
    }
}
