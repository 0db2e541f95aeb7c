//! Configuration for price-matrix sessions.

use std::time::Duration;

use pricegrid_client::{DEFAULT_CURRENCY, MatrixRequest};

use crate::keys::RouteKey;
use crate::window::Window;

/// Default pause between the primary window draining and the first prefetch.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Configuration for the request coordinator and prefetch scheduler.
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    /// Adult passengers sent with every request.
    pub adults: u32,

    /// Child passengers sent with every request.
    pub children: u32,

    /// Infant passengers sent with every request.
    pub infants: u32,

    /// Currency sent with every request.
    pub currency: String,

    /// Whether neighboring windows are loaded in the background.
    pub prefetch_enabled: bool,

    /// Pause before prefetch starts, so the primary stream's tail
    /// traffic is not contended.
    pub settle_delay: Duration,

    /// Cache pairs a completed stream never answered as absent.
    /// When false they stay uncached and are requested again next time.
    pub mark_unanswered_absent: bool,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            infants: 0,
            currency: DEFAULT_CURRENCY.to_string(),
            prefetch_enabled: true,
            settle_delay: DEFAULT_SETTLE_DELAY,
            mark_unanswered_absent: false,
        }
    }
}

impl MatrixConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set passenger counts.
    pub fn with_passengers(mut self, adults: u32, children: u32, infants: u32) -> Self {
        self.adults = adults;
        self.children = children;
        self.infants = infants;
        self
    }

    /// Set the currency.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Enable or disable background prefetch.
    pub fn with_prefetch(mut self, enabled: bool) -> Self {
        self.prefetch_enabled = enabled;
        self
    }

    /// Set the settle delay before prefetch.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Choose how unanswered pairs are treated when a stream completes.
    pub fn with_mark_unanswered_absent(mut self, enabled: bool) -> Self {
        self.mark_unanswered_absent = enabled;
        self
    }

    /// The request body for a window pair. Always lists the full windows.
    pub fn request(&self, route: &RouteKey, outbound: &Window, inbound: &Window) -> MatrixRequest {
        MatrixRequest::new(
            route.origin(),
            route.destination(),
            outbound.to_strings(),
            inbound.to_strings(),
        )
        .with_passengers(self.adults, self.children, self.infants)
        .with_currency(self.currency.clone())
    }
}
