//! Background loading of the four windows adjacent to the one on display.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::{RequestCoordinator, SessionOutcome};
use crate::session::Session;
use crate::window::{Offsets, PREFETCH_ORDER, SearchContext};

/// The search on display and the primary generation that loaded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPosition {
    /// Generation of the primary session for this position.
    pub generation: u64,
    /// Route and base dates.
    pub search: SearchContext,
    /// Current window offsets.
    pub offsets: Offsets,
}

/// Shared, always-current view of the active search.
///
/// Prefetch steps read it when they start, not when they were scheduled.
#[derive(Debug, Clone, Default)]
pub struct SearchCursor {
    inner: Arc<RwLock<Option<SearchPosition>>>,
}

impl SearchCursor {
    /// Create a cursor with no active search.
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the cursor at a search.
    pub fn set(&self, position: SearchPosition) {
        *self.inner.write() = Some(position);
    }

    /// Forget the active search.
    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    /// The active search, if any.
    pub fn get(&self) -> Option<SearchPosition> {
        self.inner.read().clone()
    }
}

/// What one prefetch run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    /// Steps started.
    pub attempted: usize,
    /// Steps whose windows were already cached.
    pub skipped: usize,
    /// Steps that streamed prices.
    pub fetched: usize,
    /// Steps that failed; the failure was logged and the sequence continued.
    pub failed: usize,
    /// Whether the run was cut short by cancellation.
    pub cancelled: bool,
}

/// Runs the neighbor windows one after another through the coordinator.
pub struct PrefetchScheduler {
    coordinator: Arc<RequestCoordinator>,
    settle_delay: Duration,
}

impl PrefetchScheduler {
    /// Create a scheduler.
    pub fn new(coordinator: Arc<RequestCoordinator>, settle_delay: Duration) -> Self {
        Self {
            coordinator,
            settle_delay,
        }
    }

    /// Wait the settle delay, then load right, left, down and up in turn.
    ///
    /// All steps share `cancel`; cancelling it abandons the current step and
    /// every step not yet started. Errors never escape a prefetch run.
    pub async fn run(&self, cursor: &SearchCursor, cancel: CancellationToken) -> PrefetchReport {
        let mut report = PrefetchReport::default();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.cancelled = true;
                return report;
            }
            _ = tokio::time::sleep(self.settle_delay) => {}
        }

        for (d_out, d_in) in PREFETCH_ORDER {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let Some(position) = cursor.get() else {
                debug!("Search cleared, stopping prefetch");
                break;
            };

            let offsets = position.offsets.shifted(d_out, d_in);
            let (outbound, inbound) = position.search.windows(offsets);
            let route = &position.search.route;
            let session = Session::prefetch(position.generation, cancel.child_token());

            report.attempted += 1;
            match self
                .coordinator
                .run_session(route, &outbound, &inbound, &session, None)
                .await
            {
                Ok(SessionOutcome::Skipped) => report.skipped += 1,
                Ok(SessionOutcome::Completed { .. }) => report.fetched += 1,
                Ok(SessionOutcome::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!(
                        route = %route,
                        generation = position.generation,
                        outbound_offset = offsets.outbound,
                        inbound_offset = offsets.inbound,
                        error = %e,
                        "Prefetch step failed"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            attempted = report.attempted,
            skipped = report.skipped,
            fetched = report.fetched,
            failed = report.failed,
            cancelled = report.cancelled,
            "Prefetch finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::config::MatrixConfig;
    use crate::keys::RouteKey;
    use crate::pending::PendingSet;
    use crate::source::{MockReply, MockSource, MockStep};
    use crate::store::PriceCacheStore;

    fn position() -> SearchPosition {
        SearchPosition {
            generation: 1,
            search: SearchContext::new(
                RouteKey::new("FRA", "BCN").unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 17),
            ),
            offsets: Offsets::default(),
        }
    }

    fn scheduler(source: Arc<MockSource>, settle: Duration) -> PrefetchScheduler {
        let coordinator = RequestCoordinator::new(
            PriceCacheStore::new(),
            source,
            PendingSet::new(),
            MatrixConfig::new(),
        );
        PrefetchScheduler::new(Arc::new(coordinator), settle)
    }

    fn first_dates(source: &MockSource) -> Vec<(String, String)> {
        source
            .requests()
            .iter()
            .map(|r| (r.outbound_dates[0].clone(), r.inbound_dates[0].clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_runs_neighbors_in_order() {
        let source = Arc::new(MockSource::flat("88.00"));
        let scheduler = scheduler(source.clone(), Duration::ZERO);
        let cursor = SearchCursor::new();
        cursor.set(position());

        let report = scheduler.run(&cursor, CancellationToken::new()).await;

        assert_eq!(
            report,
            PrefetchReport {
                attempted: 4,
                fetched: 4,
                ..PrefetchReport::default()
            }
        );
        assert_eq!(
            first_dates(&source),
            vec![
                ("2025-06-08".to_string(), "2025-06-14".to_string()),
                ("2025-06-06".to_string(), "2025-06-14".to_string()),
                ("2025-06-07".to_string(), "2025-06-15".to_string()),
                ("2025-06-07".to_string(), "2025-06-13".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_cached_neighbors_are_skipped() {
        let source = Arc::new(MockSource::flat("88.00"));
        let scheduler = scheduler(source.clone(), Duration::ZERO);
        let cursor = SearchCursor::new();
        cursor.set(position());

        scheduler.run(&cursor, CancellationToken::new()).await;
        let report = scheduler.run(&cursor, CancellationToken::new()).await;

        assert_eq!(report.attempted, 4);
        assert_eq!(report.skipped, 4);
        assert_eq!(source.request_count(), 4);
    }

    #[tokio::test]
    async fn test_failed_step_does_not_stop_sequence() {
        let source = Arc::new(MockSource::flat("88.00").reply(MockReply::Reject(500)));
        let scheduler = scheduler(source.clone(), Duration::ZERO);
        let cursor = SearchCursor::new();
        cursor.set(position());

        let report = scheduler.run(&cursor, CancellationToken::new()).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.fetched, 3);
        assert_eq!(source.request_count(), 4);
    }

    #[tokio::test]
    async fn test_cancel_during_settle_delay() {
        let source = Arc::new(MockSource::flat("88.00"));
        let scheduler = scheduler(source.clone(), Duration::from_secs(30));
        let cursor = SearchCursor::new();
        cursor.set(position());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let report = scheduler.run(&cursor, cancel).await;

        assert!(report.cancelled);
        assert_eq!(report.attempted, 0);
        assert_eq!(source.request_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_abandons_remaining_steps() {
        let source = Arc::new(
            MockSource::flat("88.00").reply(MockReply::Script(vec![MockStep::Hang])),
        );
        let scheduler = Arc::new(scheduler(source.clone(), Duration::ZERO));
        let cursor = SearchCursor::new();
        cursor.set(position());
        let cancel = CancellationToken::new();

        let task = {
            let scheduler = scheduler.clone();
            let cursor = cursor.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(&cursor, cancel).await })
        };

        while source.request_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        let report = task.await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.attempted, 1);
        assert_eq!(source.request_count(), 1);
    }

    #[tokio::test]
    async fn test_steps_read_current_offsets() {
        let source = Arc::new(MockSource::flat("88.00"));
        let scheduler = scheduler(source.clone(), Duration::ZERO);
        let cursor = SearchCursor::new();
        let mut moved = position();
        moved.offsets = Offsets::new(7, 0);
        cursor.set(moved);

        scheduler.run(&cursor, CancellationToken::new()).await;

        // Right of offset 7 is offset 8: 2025-06-15..2025-06-21
        assert_eq!(source.requests()[0].outbound_dates[0], "2025-06-15");
    }

    #[tokio::test]
    async fn test_no_search_means_no_steps() {
        let source = Arc::new(MockSource::flat("88.00"));
        let scheduler = scheduler(source.clone(), Duration::ZERO);

        let report = scheduler
            .run(&SearchCursor::new(), CancellationToken::new())
            .await;

        assert_eq!(report, PrefetchReport::default());
        assert_eq!(source.request_count(), 0);
    }
}
