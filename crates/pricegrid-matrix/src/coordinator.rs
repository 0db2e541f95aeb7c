//! Diffs a window pair against the cache and fetches exactly what is missing.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::oneshot;
use tracing::{debug, info, trace};

use pricegrid_client::MatrixEvent;

use crate::config::MatrixConfig;
use crate::error::Result;
use crate::keys::{DatePairKey, PriceEntry, RouteKey};
use crate::pending::PendingSet;
use crate::session::Session;
use crate::source::PriceSource;
use crate::store::PriceCacheStore;
use crate::window::{Window, valid_pairs};

/// How a session ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every pair was cached; no request was made.
    Skipped,
    /// The stream finished.
    Completed {
        /// Pairs that were missing from the cache.
        requested: usize,
        /// Requested pairs a result was merged for.
        answered: usize,
        /// Requested pairs the stream never answered.
        unanswered: usize,
    },
    /// The session was cancelled; nothing further was written.
    Cancelled,
}

/// Fires once when the primary pending set first becomes empty.
pub type DrainedSignal = oneshot::Sender<()>;

/// Runs fetch sessions against the shared cache.
pub struct RequestCoordinator {
    store: PriceCacheStore,
    source: Arc<dyn PriceSource>,
    pending: PendingSet,
    config: MatrixConfig,
}

impl RequestCoordinator {
    /// Create a coordinator.
    pub fn new(
        store: PriceCacheStore,
        source: Arc<dyn PriceSource>,
        pending: PendingSet,
        config: MatrixConfig,
    ) -> Self {
        Self {
            store,
            source,
            pending,
            config,
        }
    }

    /// The shared cache.
    pub fn store(&self) -> &PriceCacheStore {
        &self.store
    }

    /// The primary pending set.
    pub fn pending(&self) -> &PendingSet {
        &self.pending
    }

    /// Fetch every valid pair of the two windows that the cache lacks.
    ///
    /// Primary sessions publish the missing pairs to the pending set and
    /// fire `drained` once it empties; prefetch sessions leave it alone.
    /// Nothing is written after the session is cancelled. Transport failures
    /// are returned; cancellation is reported as [`SessionOutcome::Cancelled`].
    pub async fn run_session(
        &self,
        route: &RouteKey,
        outbound: &Window,
        inbound: &Window,
        session: &Session,
        mut drained: Option<DrainedSignal>,
    ) -> Result<SessionOutcome> {
        let generation = session.generation();
        let primary = !session.is_prefetch();

        if !session.is_active() {
            return Ok(SessionOutcome::Cancelled);
        }

        let pairs = valid_pairs(outbound, inbound);
        let needed = self.store.missing(route, &pairs);

        if needed.is_empty() {
            debug!(
                route = %route,
                generation,
                kind = %session.kind(),
                pairs = pairs.len(),
                "All pairs cached, no request needed"
            );
            if primary && !self.publish_pending(session, []) {
                return Ok(SessionOutcome::Cancelled);
            }
            signal(&mut drained);
            return Ok(SessionOutcome::Skipped);
        }

        if primary && !self.publish_pending(session, needed.iter().copied()) {
            return Ok(SessionOutcome::Cancelled);
        }

        info!(
            route = %route,
            generation,
            kind = %session.kind(),
            needed = needed.len(),
            cached = pairs.len() - needed.len(),
            outbound = %outbound.first(),
            inbound = %inbound.first(),
            "Starting price session"
        );

        let request = self.config.request(route, outbound, inbound);
        let mut stream = match self.source.open(&request, session.token().clone()).await {
            Ok(stream) => stream,
            Err(e) if e.is_cancelled() => {
                self.release(session);
                return Ok(SessionOutcome::Cancelled);
            }
            Err(e) => {
                self.release(session);
                return Err(e.into());
            }
        };

        let mut answered: HashSet<DatePairKey> = HashSet::with_capacity(needed.len());

        loop {
            let next = tokio::select! {
                biased;
                _ = session.token().cancelled() => None,
                item = stream.next() => item,
            };

            let Some(item) = next else {
                break;
            };

            // A cancelled session must not write, even if the transport
            // delivered one more event.
            if !session.is_active() {
                break;
            }

            match item {
                Ok(MatrixEvent::Price(update)) => {
                    let Some(key) = DatePairKey::parse(&update.outbound_date, &update.inbound_date)
                    else {
                        debug!(
                            outbound = %update.outbound_date,
                            inbound = %update.inbound_date,
                            "Ignoring price event for an invalid pair"
                        );
                        continue;
                    };

                    if !needed.contains(&key) {
                        trace!(pair = %key, "Ignoring price event for a pair not requested");
                        continue;
                    }

                    self.store
                        .merge(route, key, PriceEntry::from_wire(update.price()));
                    answered.insert(key);

                    if primary && self.pending.resolve(generation, &key) == Some(0) {
                        signal(&mut drained);
                    }
                }
                Ok(MatrixEvent::Progress { current, total }) => {
                    debug!(route = %route, generation, current, total, "Price session progress");
                }
                Ok(MatrixEvent::Complete { total, successful, failed }) => {
                    debug!(
                        route = %route,
                        generation,
                        total,
                        successful,
                        failed,
                        "Server reported completion"
                    );
                    break;
                }
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    self.release(session);
                    return Err(e.into());
                }
            }
        }

        drop(stream);

        if !session.is_active() {
            self.release(session);
            debug!(route = %route, generation, kind = %session.kind(), "Price session cancelled");
            return Ok(SessionOutcome::Cancelled);
        }

        let unanswered: Vec<DatePairKey> = needed.difference(&answered).copied().collect();
        if self.config.mark_unanswered_absent {
            for key in &unanswered {
                self.store.merge(route, *key, PriceEntry::Absent);
            }
        }

        if primary {
            if let Some(cleared) = self.pending.clear(generation)
                && cleared > 0
            {
                debug!(route = %route, generation, cleared, "Cleared unanswered pending pairs");
            }
            signal(&mut drained);
        }

        info!(
            route = %route,
            generation,
            kind = %session.kind(),
            answered = answered.len(),
            unanswered = unanswered.len(),
            "Price session complete"
        );

        Ok(SessionOutcome::Completed {
            requested: needed.len(),
            answered: answered.len(),
            unanswered: unanswered.len(),
        })
    }

    /// Hand the pending set to a primary session.
    ///
    /// Fails if the session was cancelled or a newer session already owns
    /// the set; the caller must then stop without side effects.
    fn publish_pending(
        &self,
        session: &Session,
        keys: impl IntoIterator<Item = DatePairKey>,
    ) -> bool {
        if !session.is_active() || !self.pending.reset(session.generation(), keys) {
            debug!(generation = session.generation(), "Session replaced before it started");
            return false;
        }
        true
    }

    /// Give up a primary session's pending pairs.
    fn release(&self, session: &Session) {
        if !session.is_prefetch() {
            self.pending.abandon(session.generation());
        }
    }
}

fn signal(drained: &mut Option<DrainedSignal>) {
    if let Some(tx) = drained.take() {
        let _ = tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::error::Error;
    use crate::source::{MockReply, MockSource, MockStep};
    use crate::window::compute_window;

    fn route() -> RouteKey {
        RouteKey::new("FRA", "BCN").unwrap()
    }

    /// Two identical windows around 2025-06-10: 21 valid pairs.
    fn windows() -> (Window, Window) {
        let base = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        (compute_window(base, 0), compute_window(base, 0))
    }

    fn coordinator(source: Arc<MockSource>, config: MatrixConfig) -> RequestCoordinator {
        RequestCoordinator::new(PriceCacheStore::new(), source, PendingSet::new(), config)
    }

    fn price(s: &str) -> PriceEntry {
        PriceEntry::Price(s.parse::<Decimal>().unwrap())
    }

    #[tokio::test]
    async fn test_fetches_all_pairs_once() {
        let source = Arc::new(MockSource::flat("120.00"));
        let coordinator = coordinator(source.clone(), MatrixConfig::new());
        let (outbound, inbound) = windows();

        let outcome = coordinator
            .run_session(&route(), &outbound, &inbound, &Session::primary(1), None)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SessionOutcome::Completed {
                requested: 21,
                answered: 21,
                unanswered: 0
            }
        );
        assert_eq!(source.request_count(), 1);
        assert_eq!(coordinator.store().len(&route()), 21);
        assert!(coordinator.pending().is_empty());

        let request = &source.requests()[0];
        assert_eq!(request.origin, "FRA");
        assert_eq!(request.outbound_dates.len(), 7);
        assert_eq!(request.inbound_dates.len(), 7);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let source = Arc::new(MockSource::flat("120.00"));
        let coordinator = coordinator(source.clone(), MatrixConfig::new());
        let (outbound, inbound) = windows();

        coordinator
            .run_session(&route(), &outbound, &inbound, &Session::primary(1), None)
            .await
            .unwrap();
        let (tx, rx) = oneshot::channel();
        let outcome = coordinator
            .run_session(&route(), &outbound, &inbound, &Session::primary(2), Some(tx))
            .await
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Skipped);
        assert_eq!(source.request_count(), 1);
        // An empty window still counts as drained
        assert!(rx.await.is_ok());
    }

    #[tokio::test]
    async fn test_fetches_only_uncached_pairs() {
        let source = Arc::new(MockSource::flat("50.00"));
        let coordinator = coordinator(source.clone(), MatrixConfig::new());
        let (outbound, inbound) = windows();
        let pairs = valid_pairs(&outbound, &inbound);

        // 10 of 21 cached, some as absent
        for (i, key) in pairs.iter().take(10).enumerate() {
            let entry = if i % 3 == 0 {
                PriceEntry::Absent
            } else {
                price("80.00")
            };
            coordinator.store().merge(&route(), *key, entry);
        }

        let outcome = coordinator
            .run_session(&route(), &outbound, &inbound, &Session::primary(1), None)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SessionOutcome::Completed {
                requested: 11,
                answered: 11,
                unanswered: 0
            }
        );
        // The server answered all 21 pairs; cached ones kept their values
        assert_eq!(coordinator.store().entry(&route(), &pairs[0]), Some(PriceEntry::Absent));
        assert_eq!(coordinator.store().entry(&route(), &pairs[1]), Some(price("80.00")));
        assert_eq!(coordinator.store().entry(&route(), &pairs[10]), Some(price("50.00")));
    }

    #[tokio::test]
    async fn test_absent_sentinel_is_never_refetched() {
        let source = Arc::new(MockSource::answering(|out, _| {
            (out != "2025-06-07").then(|| "99.00".to_string())
        }));
        let coordinator = coordinator(source.clone(), MatrixConfig::new());
        let (outbound, inbound) = windows();

        coordinator
            .run_session(&route(), &outbound, &inbound, &Session::primary(1), None)
            .await
            .unwrap();

        let key = DatePairKey::parse("2025-06-07", "2025-06-08").unwrap();
        assert_eq!(coordinator.store().entry(&route(), &key), Some(PriceEntry::Absent));

        let outcome = coordinator
            .run_session(&route(), &outbound, &inbound, &Session::primary(2), None)
            .await
            .unwrap();
        assert_eq!(outcome, SessionOutcome::Skipped);
        assert_eq!(source.request_count(), 1);
    }

    #[tokio::test]
    async fn test_complete_leaves_unanswered_pairs_uncached() {
        let source = Arc::new(MockSource::new().reply(MockReply::Script(vec![
            MockStep::price("2025-06-10", "2025-06-12", Some("245.00")),
            // Invalid pair, never requested
            MockStep::price("2025-06-08", "2025-06-08", None),
            MockStep::complete(),
        ])));
        let coordinator = coordinator(source.clone(), MatrixConfig::new());
        let (outbound, inbound) = windows();

        let outcome = coordinator
            .run_session(&route(), &outbound, &inbound, &Session::primary(1), None)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SessionOutcome::Completed {
                requested: 21,
                answered: 1,
                unanswered: 20
            }
        );
        assert!(coordinator.pending().is_empty());
        assert_eq!(coordinator.store().len(&route()), 1);
        assert_eq!(
            coordinator.store().entry(&route(), &DatePairKey::parse("2025-06-10", "2025-06-12").unwrap()),
            Some(price("245.00"))
        );

        // Unanswered pairs are retried by the next session
        let outcome = coordinator
            .run_session(&route(), &outbound, &inbound, &Session::primary(2), None)
            .await
            .unwrap();
        assert!(matches!(outcome, SessionOutcome::Completed { requested: 20, .. }));
    }

    #[tokio::test]
    async fn test_complete_can_mark_unanswered_absent() {
        let source = Arc::new(MockSource::new().reply(MockReply::Script(vec![
            MockStep::price("2025-06-10", "2025-06-12", Some("245.00")),
            MockStep::complete(),
        ])));
        let coordinator = coordinator(
            source.clone(),
            MatrixConfig::new().with_mark_unanswered_absent(true),
        );
        let (outbound, inbound) = windows();

        coordinator
            .run_session(&route(), &outbound, &inbound, &Session::primary(1), None)
            .await
            .unwrap();

        let stats = coordinator.store().stats();
        assert_eq!(stats.priced, 1);
        assert_eq!(stats.absent, 20);
    }

    #[tokio::test]
    async fn test_prefetch_leaves_pending_untouched() {
        let source = Arc::new(MockSource::flat("10.00"));
        let coordinator = coordinator(source.clone(), MatrixConfig::new());
        let (outbound, inbound) = windows();
        let marker = DatePairKey::parse("2025-01-01", "2025-01-02").unwrap();
        coordinator.pending().reset(99, [marker]);

        let session = Session::prefetch(100, CancellationToken::new());
        coordinator
            .run_session(&route(), &outbound, &inbound, &session, None)
            .await
            .unwrap();

        assert_eq!(coordinator.pending().owner(), 99);
        assert!(coordinator.pending().contains(&marker));
        assert_eq!(coordinator.store().len(&route()), 21);
    }

    #[tokio::test]
    async fn test_rejected_request_is_a_transport_error() {
        let source = Arc::new(MockSource::new().reply(MockReply::Reject(503)));
        let coordinator = coordinator(source.clone(), MatrixConfig::new());
        let (outbound, inbound) = windows();

        let result = coordinator
            .run_session(&route(), &outbound, &inbound, &Session::primary(1), None)
            .await;

        assert!(matches!(result, Err(Error::Transport(ref e)) if e.is_server_error()));
        assert!(coordinator.pending().is_empty());
    }

    #[tokio::test]
    async fn test_stream_failure_keeps_merged_results() {
        let source = Arc::new(MockSource::new().reply(MockReply::Script(vec![
            MockStep::price("2025-06-10", "2025-06-12", Some("245.00")),
            MockStep::Fail("connection reset".to_string()),
        ])));
        let coordinator = coordinator(source.clone(), MatrixConfig::new());
        let (outbound, inbound) = windows();

        let result = coordinator
            .run_session(&route(), &outbound, &inbound, &Session::primary(1), None)
            .await;

        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(coordinator.store().len(&route()), 1);
        assert!(coordinator.pending().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let source = Arc::new(MockSource::flat("10.00"));
        let coordinator = coordinator(source.clone(), MatrixConfig::new());
        let (outbound, inbound) = windows();
        let session = Session::primary(1);
        session.cancel();

        let outcome = coordinator
            .run_session(&route(), &outbound, &inbound, &session, None)
            .await
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert_eq!(source.request_count(), 0);
        assert!(coordinator.store().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_discards_late_events() {
        let source = Arc::new(MockSource::new().reply(MockReply::Leaky(vec![
            MockStep::price("2025-06-10", "2025-06-12", Some("245.00")),
            MockStep::Delay(Duration::from_millis(100)),
            MockStep::price("2025-06-10", "2025-06-13", Some("199.00")),
            MockStep::complete(),
        ])));
        let coordinator = Arc::new(coordinator(source.clone(), MatrixConfig::new()));
        let (outbound, inbound) = windows();
        let session = Session::primary(1);

        let mut pending = coordinator.pending().subscribe();
        let task = {
            let coordinator = coordinator.clone();
            let session = session.clone();
            tokio::spawn(async move {
                coordinator
                    .run_session(&route(), &outbound, &inbound, &session, None)
                    .await
            })
        };

        tokio::time::timeout(Duration::from_secs(5), pending.wait_for(|n| *n == 20))
            .await
            .unwrap()
            .unwrap();
        session.cancel();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, SessionOutcome::Cancelled);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(coordinator.store().len(&route()), 1);
        assert!(!coordinator.store().has(
            &route(),
            &DatePairKey::parse("2025-06-10", "2025-06-13").unwrap()
        ));
        // A cancelled session with no successor releases the pending pairs
        assert!(coordinator.pending().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_route_does_not_leak_into_next_route() {
        // First request streams slowly and ignores cancellation; later ones answer flat
        let source = Arc::new(MockSource::flat("60.00").reply(MockReply::Leaky(vec![
            MockStep::price("2025-06-10", "2025-06-12", Some("245.00")),
            MockStep::Delay(Duration::from_millis(100)),
            MockStep::price("2025-06-10", "2025-06-13", Some("199.00")),
            MockStep::price("2025-06-11", "2025-06-13", Some("188.00")),
            MockStep::complete(),
        ])));
        let coordinator = Arc::new(coordinator(source.clone(), MatrixConfig::new()));
        let (outbound, inbound) = windows();
        let first = route();
        let second = RouteKey::new("MAD", "LHR").unwrap();
        let session_a = Session::primary(1);

        let mut pending = coordinator.pending().subscribe();
        let task_a = {
            let coordinator = coordinator.clone();
            let session = session_a.clone();
            let route = first.clone();
            tokio::spawn(async move {
                coordinator
                    .run_session(&route, &outbound, &inbound, &session, None)
                    .await
            })
        };

        tokio::time::timeout(Duration::from_secs(5), pending.wait_for(|n| *n == 20))
            .await
            .unwrap()
            .unwrap();
        session_a.cancel();

        let outcome_b = coordinator
            .run_session(&second, &outbound, &inbound, &Session::primary(2), None)
            .await
            .unwrap();
        assert_eq!(
            outcome_b,
            SessionOutcome::Completed {
                requested: 21,
                answered: 21,
                unanswered: 0
            }
        );
        assert_eq!(task_a.await.unwrap().unwrap(), SessionOutcome::Cancelled);

        // Give the leaky transport time to deliver its tail
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(coordinator.store().len(&first), 1);
        assert!(!coordinator.store().has(
            &first,
            &DatePairKey::parse("2025-06-10", "2025-06-13").unwrap()
        ));
        assert_eq!(coordinator.store().len(&second), 21);
        assert!(
            coordinator
                .store()
                .get(&second)
                .values()
                .all(|entry| *entry == price("60.00"))
        );
        assert_eq!(coordinator.pending().owner(), 2);
        assert!(coordinator.pending().is_empty());
    }

    #[tokio::test]
    async fn test_replaced_session_leaves_pending_alone() {
        let source = Arc::new(MockSource::flat("10.00"));
        let coordinator = coordinator(source.clone(), MatrixConfig::new());
        let (outbound, inbound) = windows();
        let marker = DatePairKey::parse("2025-01-01", "2025-01-02").unwrap();

        // A newer primary already owns the pending set
        coordinator.pending().reset(2, [marker]);

        let outcome = coordinator
            .run_session(&route(), &outbound, &inbound, &Session::primary(1), None)
            .await
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert_eq!(source.request_count(), 0);
        assert_eq!(coordinator.pending().owner(), 2);
        assert!(coordinator.pending().contains(&marker));
        assert!(coordinator.store().is_empty());
    }

    #[tokio::test]
    async fn test_replaced_session_with_cached_window_does_not_drain() {
        let source = Arc::new(MockSource::flat("10.00"));
        let coordinator = coordinator(source.clone(), MatrixConfig::new());
        let (outbound, inbound) = windows();

        coordinator
            .run_session(&route(), &outbound, &inbound, &Session::primary(3), None)
            .await
            .unwrap();
        let marker = DatePairKey::parse("2025-01-01", "2025-01-02").unwrap();
        coordinator.pending().reset(4, [marker]);

        let (tx, rx) = oneshot::channel();
        let outcome = coordinator
            .run_session(&route(), &outbound, &inbound, &Session::primary(2), Some(tx))
            .await
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert!(coordinator.pending().contains(&marker));
        // The signal was dropped unsent
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_drained_fires_before_stream_ends() {
        let (outbound, inbound) = windows();
        let mut steps: Vec<MockStep> = valid_pairs(&outbound, &inbound)
            .iter()
            .map(|key| {
                MockStep::price(
                    &key.outbound().to_string(),
                    &key.inbound().to_string(),
                    Some("75.00"),
                )
            })
            .collect();
        steps.push(MockStep::Hang);

        let source = Arc::new(MockSource::new().reply(MockReply::Script(steps)));
        let coordinator = Arc::new(coordinator(source.clone(), MatrixConfig::new()));
        let session = Session::primary(1);
        let (tx, rx) = oneshot::channel();

        let task = {
            let coordinator = coordinator.clone();
            let session = session.clone();
            tokio::spawn(async move {
                coordinator
                    .run_session(&route(), &outbound, &inbound, &session, Some(tx))
                    .await
            })
        };

        tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .unwrap()
            .unwrap();
        assert!(coordinator.pending().is_empty());
        assert_eq!(coordinator.store().len(&route()), 21);

        session.cancel();
        assert_eq!(task.await.unwrap().unwrap(), SessionOutcome::Cancelled);
    }
}
