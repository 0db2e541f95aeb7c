//! Owns when sessions start and stop for the search on display.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MatrixConfig;
use crate::coordinator::{RequestCoordinator, SessionOutcome};
use crate::error::{Error, Result};
use crate::pending::PendingSet;
use crate::prefetch::{PrefetchReport, PrefetchScheduler, SearchCursor, SearchPosition};
use crate::session::{Generations, Session};
use crate::snapshot::MatrixSnapshot;
use crate::source::PriceSource;
use crate::store::PriceCacheStore;
use crate::window::{Offsets, SearchContext};

/// Drives the primary session and its prefetch run for one search context.
///
/// Every [`load`](Self::load) cancels the previous primary session and the
/// prefetch run, so at most one of each is in flight. Tasks are spawned on the
/// current tokio runtime.
///
/// # Example
///
/// ```rust,ignore
/// let controller = MatrixController::new(Arc::new(client), MatrixConfig::default());
/// controller.load(search, Offsets::default());
/// controller.wait_primary().await?;
/// let snapshot = controller.snapshot();
/// ```
#[derive(Clone)]
pub struct MatrixController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    coordinator: Arc<RequestCoordinator>,
    scheduler: Arc<PrefetchScheduler>,
    cursor: SearchCursor,
    generations: Generations,
    prefetch_enabled: bool,
    state: Mutex<ControllerState>,
}

#[derive(Default)]
struct ControllerState {
    generation: u64,
    primary: Option<PrimaryTask>,
    prefetch: Option<PrefetchTask>,
    error: Option<Arc<Error>>,
}

struct PrimaryTask {
    session: Session,
    handle: Option<JoinHandle<Option<SessionOutcome>>>,
}

struct PrefetchTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<Option<PrefetchReport>>>,
}

impl MatrixController {
    /// Create a controller with its own cache.
    pub fn new(source: Arc<dyn PriceSource>, config: MatrixConfig) -> Self {
        Self::with_store(PriceCacheStore::new(), source, config)
    }

    /// Create a controller over an existing cache.
    pub fn with_store(
        store: PriceCacheStore,
        source: Arc<dyn PriceSource>,
        config: MatrixConfig,
    ) -> Self {
        let settle_delay = config.settle_delay;
        let prefetch_enabled = config.prefetch_enabled;
        let coordinator = Arc::new(RequestCoordinator::new(
            store,
            source,
            PendingSet::new(),
            config,
        ));

        Self {
            inner: Arc::new(ControllerInner {
                scheduler: Arc::new(PrefetchScheduler::new(coordinator.clone(), settle_delay)),
                coordinator,
                cursor: SearchCursor::new(),
                generations: Generations::new(),
                prefetch_enabled,
                state: Mutex::new(ControllerState::default()),
            }),
        }
    }

    /// Show a search at the given offsets. Returns the new generation.
    pub fn load(&self, search: SearchContext, offsets: Offsets) -> u64 {
        let inner = &self.inner;
        let generation = inner.generations.next();
        let (outbound, inbound) = search.windows(offsets);
        let route = search.route.clone();

        let session = Session::primary(generation);
        let (drained_tx, drained_rx) = oneshot::channel();

        let mut state = inner.state.lock();
        stop(&mut state);
        state.generation = generation;
        state.error = None;
        inner.cursor.set(SearchPosition {
            generation,
            search,
            offsets,
        });

        info!(
            route = %route,
            generation,
            outbound_offset = offsets.outbound,
            inbound_offset = offsets.inbound,
            "Loading price matrix"
        );

        // Tasks hold a weak handle so dropping the controller stops them.
        let primary = {
            let coordinator = inner.coordinator.clone();
            let owner = Arc::downgrade(&self.inner);
            let session = session.clone();
            tokio::spawn(async move {
                let result = coordinator
                    .run_session(&route, &outbound, &inbound, &session, Some(drained_tx))
                    .await;
                match result {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        if let Some(inner) = owner.upgrade() {
                            inner.record_error(generation, e);
                        }
                        None
                    }
                }
            })
        };
        state.primary = Some(PrimaryTask {
            session,
            handle: Some(primary),
        });

        if inner.prefetch_enabled {
            let cancel = CancellationToken::new();
            let prefetch = {
                let scheduler = inner.scheduler.clone();
                let cursor = inner.cursor.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let drained = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => false,
                        drained = drained_rx => drained.is_ok(),
                    };
                    if !drained {
                        debug!(generation, "Primary session did not drain, no prefetch");
                        return None;
                    }
                    Some(scheduler.run(&cursor, cancel).await)
                })
            };
            state.prefetch = Some(PrefetchTask {
                cancel,
                handle: Some(prefetch),
            });
        }

        generation
    }

    /// Move the windows of the active search by the given days.
    pub fn shift(&self, d_out: i32, d_in: i32) -> Result<u64> {
        let position = self.inner.cursor.get().ok_or(Error::NoActiveSearch)?;
        Ok(self.load(position.search, position.offsets.shifted(d_out, d_in)))
    }

    /// Cancel everything and forget the active search. The cache is kept.
    pub fn teardown(&self) {
        let mut state = self.inner.state.lock();
        stop(&mut state);
        self.inner.pending().abandon(state.generation);
        state.error = None;
        self.inner.cursor.clear();
        debug!(generation = state.generation, "Search torn down");
    }

    /// The grid for the active search.
    pub fn snapshot(&self) -> Option<MatrixSnapshot> {
        let position = self.inner.cursor.get()?;
        let route = position.search.route.clone();
        let prices = self.store().get(&route);
        // Pairs of a replaced session are not shown as loading
        let pending = if self.pending().owner() == position.generation {
            self.pending().keys()
        } else {
            HashSet::new()
        };

        Some(MatrixSnapshot::build(
            position.generation,
            route,
            position.offsets,
            position.search.windows(position.offsets),
            &prices,
            &pending,
            self.error(),
        ))
    }

    /// Wait for the current primary session.
    ///
    /// Returns `None` if there is none, it was already awaited, or it failed;
    /// a failure is available from [`error`](Self::error).
    pub async fn wait_primary(&self) -> Result<Option<SessionOutcome>> {
        let handle = self
            .inner
            .state
            .lock()
            .primary
            .as_mut()
            .and_then(|task| task.handle.take());
        match handle {
            Some(handle) => handle.await.map_err(|e| Error::TaskFailed(e.to_string())),
            None => Ok(None),
        }
    }

    /// Wait for the current prefetch run.
    ///
    /// Returns `None` if prefetch is disabled, was already awaited, or never
    /// started because the primary session did not drain.
    pub async fn wait_prefetch(&self) -> Result<Option<PrefetchReport>> {
        let handle = self
            .inner
            .state
            .lock()
            .prefetch
            .as_mut()
            .and_then(|task| task.handle.take());
        match handle {
            Some(handle) => handle.await.map_err(|e| Error::TaskFailed(e.to_string())),
            None => Ok(None),
        }
    }

    /// Route-level error of the current primary session.
    pub fn error(&self) -> Option<Arc<Error>> {
        self.inner.state.lock().error.clone()
    }

    /// Generation of the most recent load.
    pub fn generation(&self) -> u64 {
        self.inner.state.lock().generation
    }

    /// The active search.
    pub fn position(&self) -> Option<SearchPosition> {
        self.inner.cursor.get()
    }

    /// The shared cache.
    pub fn store(&self) -> &PriceCacheStore {
        self.inner.coordinator.store()
    }

    /// The primary pending set.
    pub fn pending(&self) -> &PendingSet {
        self.inner.pending()
    }
}

impl ControllerInner {
    fn pending(&self) -> &PendingSet {
        self.coordinator.pending()
    }

    /// Keep a primary failure unless a newer load has replaced the session.
    fn record_error(&self, generation: u64, error: Error) {
        let mut state = self.state.lock();
        if state.generation != generation {
            debug!(generation, error = %error, "Dropping error from a replaced session");
            return;
        }
        warn!(generation, error = %error, "Primary price session failed");
        state.error = Some(Arc::new(error));
    }
}

/// Cancel the running primary session and prefetch run.
fn stop(state: &mut ControllerState) {
    if let Some(primary) = state.primary.take() {
        primary.session.cancel();
    }
    if let Some(prefetch) = state.prefetch.take() {
        prefetch.cancel.cancel();
    }
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        stop(self.state.get_mut());
    }
}
