//! Progressive price-matrix loading.
//!
//! This crate turns a route and a pair of base dates into a 7x7 grid of
//! prices that fills in as results stream from the pricing service:
//! - Window arithmetic around the base dates, with day offsets for navigation
//! - A shared per-route cache with a confirmed-absent sentinel, so no pair is
//!   ever requested twice
//! - A request coordinator that fetches only the pairs the cache lacks
//! - Background prefetch of the four neighboring windows once the primary
//!   window has loaded
//!
//! # Example
//!
//! ```rust,ignore
//! use pricegrid_matrix::{MatrixController, MatrixConfig, Offsets, RouteKey, SearchContext};
//!
//! let route = RouteKey::new("FRA", "BCN")?;
//! let search = SearchContext::new(route, depart, Some(return_date));
//!
//! let controller = MatrixController::new(Arc::new(client), MatrixConfig::default());
//! controller.load(search, Offsets::default());
//! controller.wait_primary().await?;
//!
//! if let Some(cell) = controller.snapshot().and_then(|s| s.cheapest().copied()) {
//!     println!("{} -> {}: {:?}", cell.outbound, cell.inbound, cell.state);
//! }
//! ```

mod config;
mod controller;
mod coordinator;
mod error;
mod keys;
mod pending;
mod prefetch;
mod session;
mod snapshot;
mod source;
mod store;
mod window;

pub use config::{DEFAULT_SETTLE_DELAY, MatrixConfig};
pub use controller::MatrixController;
pub use coordinator::{DrainedSignal, RequestCoordinator, SessionOutcome};
pub use error::{Error, Result};
pub use keys::{DATE_FORMAT, DatePairKey, PriceEntry, RouteKey};
pub use pending::PendingSet;
pub use prefetch::{PrefetchReport, PrefetchScheduler, SearchCursor, SearchPosition};
pub use session::{Generations, Session, SessionKind};
pub use snapshot::{CellState, MatrixCell, MatrixSnapshot};
pub use source::PriceSource;
pub use store::{CacheStats, PriceCacheStore, PriceMap};
pub use window::{
    DEFAULT_TRIP_DAYS, Offsets, PREFETCH_ORDER, SearchContext, WINDOW_LEN, WINDOW_SPAN, Window,
    compute_window, valid_pairs,
};

#[cfg(any(test, feature = "testing"))]
pub use source::{MockReply, MockSource, MockStep};
