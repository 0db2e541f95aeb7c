//! Cache keys and cached values.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::warn;

use crate::error::{Error, Result};

/// Wire format of calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ─────────────────────────────────────────────────────────────────────────────
// Route
// ─────────────────────────────────────────────────────────────────────────────

/// An (origin, destination) pair; one cache partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    origin: String,
    destination: String,
}

impl RouteKey {
    /// Create a route from two three-letter location codes.
    ///
    /// Codes are normalized to upper case.
    pub fn new(origin: &str, destination: &str) -> Result<Self> {
        Ok(Self {
            origin: location_code(origin)?,
            destination: location_code(destination)?,
        })
    }

    /// Origin location code.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Destination location code.
    pub fn destination(&self) -> &str {
        &self.destination
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.origin, self.destination)
    }
}

fn location_code(code: &str) -> Result<String> {
    let code = code.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(Error::InvalidLocation(code.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Date pair
// ─────────────────────────────────────────────────────────────────────────────

/// An (outbound, inbound) date combination.
///
/// Only constructible when the inbound date is strictly after the outbound
/// date, so an invalid pair can never reach the cache or the pending set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatePairKey {
    outbound: NaiveDate,
    inbound: NaiveDate,
}

impl DatePairKey {
    /// Create a pair, or `None` if `inbound` is not after `outbound`.
    pub fn new(outbound: NaiveDate, inbound: NaiveDate) -> Option<Self> {
        (inbound > outbound).then_some(Self { outbound, inbound })
    }

    /// Parse a pair from two `YYYY-MM-DD` strings.
    pub fn parse(outbound: &str, inbound: &str) -> Option<Self> {
        let outbound = NaiveDate::parse_from_str(outbound.trim(), DATE_FORMAT).ok()?;
        let inbound = NaiveDate::parse_from_str(inbound.trim(), DATE_FORMAT).ok()?;
        Self::new(outbound, inbound)
    }

    /// Outbound date.
    pub fn outbound(&self) -> NaiveDate {
        self.outbound
    }

    /// Inbound date.
    pub fn inbound(&self) -> NaiveDate {
        self.inbound
    }
}

impl fmt::Display for DatePairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}",
            self.outbound.format(DATE_FORMAT),
            self.inbound.format(DATE_FORMAT)
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cached value
// ─────────────────────────────────────────────────────────────────────────────

/// A cached result for one date pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceEntry {
    /// Cheapest known price, always positive.
    Price(Decimal),
    /// Checked: no offer exists for this combination.
    Absent,
}

impl PriceEntry {
    /// Interpret a price field from the wire.
    ///
    /// Missing or empty means no offer. Values that are not a positive
    /// decimal cannot be displayed as a price and are also cached as absent.
    pub fn from_wire(price: Option<&str>) -> Self {
        let Some(raw) = price.map(str::trim).filter(|p| !p.is_empty()) else {
            return PriceEntry::Absent;
        };

        match Decimal::from_str(raw) {
            Ok(value) if value > Decimal::ZERO => PriceEntry::Price(value),
            Ok(value) => {
                warn!(price = %value, "Non-positive price treated as absent");
                PriceEntry::Absent
            }
            Err(e) => {
                warn!(price = %raw, error = %e, "Unparsable price treated as absent");
                PriceEntry::Absent
            }
        }
    }

    /// The price, if one exists.
    pub fn price(&self) -> Option<Decimal> {
        match self {
            PriceEntry::Price(value) => Some(*value),
            PriceEntry::Absent => None,
        }
    }

    /// Whether this is the absent sentinel.
    pub fn is_absent(&self) -> bool {
        matches!(self, PriceEntry::Absent)
    }
}

impl fmt::Display for PriceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceEntry::Price(value) => write!(f, "{}", value),
            PriceEntry::Absent => f.write_str("ABSENT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_route_normalizes_case() {
        let route = RouteKey::new("fra", " bcn ").unwrap();
        assert_eq!(route.origin(), "FRA");
        assert_eq!(route.destination(), "BCN");
        assert_eq!(route.to_string(), "FRA-BCN");
    }

    #[test]
    fn test_route_rejects_invalid_codes() {
        assert!(matches!(
            RouteKey::new("FRAN", "BCN"),
            Err(Error::InvalidLocation(_))
        ));
        assert!(RouteKey::new("FR", "BCN").is_err());
        assert!(RouteKey::new("FRA", "B1N").is_err());
        assert!(RouteKey::new("", "BCN").is_err());
    }

    #[test]
    fn test_date_pair_requires_inbound_after_outbound() {
        assert!(DatePairKey::new(date("2025-06-10"), date("2025-06-17")).is_some());
        assert!(DatePairKey::new(date("2025-06-10"), date("2025-06-10")).is_none());
        assert!(DatePairKey::new(date("2025-06-10"), date("2025-06-08")).is_none());
    }

    #[test]
    fn test_date_pair_parse_and_display() {
        let key = DatePairKey::parse("2025-06-10", "2025-06-17").unwrap();
        assert_eq!(key.to_string(), "2025-06-10_2025-06-17");
        assert_eq!(key.outbound(), date("2025-06-10"));

        assert!(DatePairKey::parse("2025-06-07", "2025-06-07").is_none());
        assert!(DatePairKey::parse("2025-13-01", "2025-06-07").is_none());
        assert!(DatePairKey::parse("garbage", "2025-06-07").is_none());
    }

    #[test]
    fn test_price_entry_from_wire() {
        assert_eq!(
            PriceEntry::from_wire(Some("245.00")),
            PriceEntry::Price(Decimal::new(24500, 2))
        );
        assert_eq!(PriceEntry::from_wire(None), PriceEntry::Absent);
        assert_eq!(PriceEntry::from_wire(Some("")), PriceEntry::Absent);
        assert_eq!(PriceEntry::from_wire(Some("  ")), PriceEntry::Absent);
        assert_eq!(PriceEntry::from_wire(Some("0.00")), PriceEntry::Absent);
        assert_eq!(PriceEntry::from_wire(Some("-12")), PriceEntry::Absent);
        assert_eq!(PriceEntry::from_wire(Some("N/A")), PriceEntry::Absent);
    }

    #[test]
    fn test_price_entry_accessors() {
        let entry = PriceEntry::from_wire(Some("99.5"));
        assert_eq!(entry.price(), Some(Decimal::new(995, 1)));
        assert!(!entry.is_absent());
        assert_eq!(entry.to_string(), "99.5");

        assert!(PriceEntry::Absent.is_absent());
        assert_eq!(PriceEntry::Absent.to_string(), "ABSENT");
    }
}
