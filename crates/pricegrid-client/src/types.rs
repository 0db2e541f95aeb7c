//! Request and response types for the pricing stream service.
//!
//! These types mirror the server's wire contract. Dates travel as
//! `YYYY-MM-DD` strings and prices as decimal strings; interpretation
//! happens in the caller.

use serde::{Deserialize, Serialize};

/// Default currency when none is configured.
pub const DEFAULT_CURRENCY: &str = "EUR";

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for both the streaming and the one-shot matrix endpoints.
///
/// The server recomputes the valid (outbound, inbound) combinations from the
/// two date lists, so callers always send complete windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRequest {
    /// Origin location code.
    pub origin: String,
    /// Destination location code.
    pub destination: String,
    /// Outbound dates (`YYYY-MM-DD`).
    pub outbound_dates: Vec<String>,
    /// Inbound dates (`YYYY-MM-DD`).
    pub inbound_dates: Vec<String>,
    /// Adult passengers.
    pub adults: u32,
    /// Child passengers.
    #[serde(default)]
    pub children: u32,
    /// Infant passengers.
    #[serde(default)]
    pub infants: u32,
    /// Currency code for returned prices.
    pub currency: String,
}

impl MatrixRequest {
    /// Create a request for one adult in the default currency.
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        outbound_dates: Vec<String>,
        inbound_dates: Vec<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            outbound_dates,
            inbound_dates,
            adults: 1,
            children: 0,
            infants: 0,
            currency: DEFAULT_CURRENCY.to_string(),
        }
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

    /// Number of (outbound, inbound) combinations the server will price.
    pub fn combination_count(&self) -> usize {
        self.outbound_dates
            .iter()
            .map(|out| self.inbound_dates.iter().filter(|inb| *inb > out).count())
            .sum()
    }
}

/// Query-string mirror of [`MatrixRequest`].
///
/// Date lists are comma-joined since form encoding has no sequence type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MatrixQuery<'a> {
    pub origin: &'a str,
    pub destination: &'a str,
    pub outbound_dates: String,
    pub inbound_dates: String,
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
    pub currency: &'a str,
}

impl<'a> From<&'a MatrixRequest> for MatrixQuery<'a> {
    fn from(request: &'a MatrixRequest) -> Self {
        Self {
            origin: &request.origin,
            destination: &request.destination,
            outbound_dates: request.outbound_dates.join(","),
            inbound_dates: request.inbound_dates.join(","),
            adults: request.adults,
            children: request.children,
            infants: request.infants,
            currency: &request.currency,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream events
// ─────────────────────────────────────────────────────────────────────────────

/// A decoded event from the price-matrix stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatrixEvent {
    /// Result for one date combination.
    Price(PriceUpdate),
    /// Informational progress counters.
    Progress {
        /// Combinations processed so far.
        current: usize,
        /// Total combinations in this stream.
        total: usize,
    },
    /// Explicit end-of-stream marker.
    Complete {
        /// Total combinations processed.
        #[serde(default)]
        total: usize,
        /// Combinations that produced a result.
        #[serde(default)]
        successful: usize,
        /// Combinations that failed upstream.
        #[serde(default)]
        failed: usize,
    },
}

/// Price result for one (outbound, inbound) combination.
///
/// Field names are accepted in both snake_case and camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    /// Outbound date (`YYYY-MM-DD`).
    #[serde(alias = "outboundDate")]
    pub outbound_date: String,
    /// Inbound date (`YYYY-MM-DD`).
    #[serde(alias = "inboundDate")]
    pub inbound_date: String,
    /// Cheapest total as a decimal string, absent when no offer exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    /// Currency of `price`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl PriceUpdate {
    /// The price string, treating an empty value as missing.
    pub fn price(&self) -> Option<&str> {
        self.price
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// One-shot matrix
// ─────────────────────────────────────────────────────────────────────────────

/// Response of the non-streaming matrix endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixResponse {
    /// One entry per valid combination.
    pub prices: Vec<MatrixEntry>,
}

/// One cell of a one-shot matrix response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixEntry {
    /// Outbound date (`YYYY-MM-DD`).
    #[serde(alias = "outbound_date")]
    pub outbound_date: String,
    /// Inbound date (`YYYY-MM-DD`).
    #[serde(alias = "inbound_date")]
    pub inbound_date: String,
    /// Cheapest total, absent when no offer exists.
    #[serde(default)]
    pub price: Option<String>,
    /// Currency of `price`.
    #[serde(default)]
    pub currency: Option<String>,
}

impl From<MatrixEntry> for PriceUpdate {
    fn from(entry: MatrixEntry) -> Self {
        Self {
            outbound_date: entry.outbound_date,
            inbound_date: entry.inbound_date,
            price: entry.price,
            currency: entry.currency,
        }
    }
}
