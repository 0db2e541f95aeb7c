//! Date windows around a search's base dates.

use chrono::{Days, NaiveDate};

use crate::keys::{DATE_FORMAT, DatePairKey, RouteKey};

/// Days on each side of the base date.
pub const WINDOW_SPAN: i32 = 3;

/// Dates in one window.
pub const WINDOW_LEN: usize = (2 * WINDOW_SPAN + 1) as usize;

/// Default trip length when a search has no return date.
pub const DEFAULT_TRIP_DAYS: u64 = 7;

/// Neighbor windows in prefetch priority order, as (outbound, inbound) deltas.
pub const PREFETCH_ORDER: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Seven consecutive calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    dates: [NaiveDate; WINDOW_LEN],
}

impl Window {
    /// The dates in ascending order.
    pub fn dates(&self) -> &[NaiveDate; WINDOW_LEN] {
        &self.dates
    }

    /// First date.
    pub fn first(&self) -> NaiveDate {
        self.dates[0]
    }

    /// Last date.
    pub fn last(&self) -> NaiveDate {
        self.dates[WINDOW_LEN - 1]
    }

    /// Whether `date` falls in this window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    /// The dates as `YYYY-MM-DD` strings.
    pub fn to_strings(&self) -> Vec<String> {
        self.dates
            .iter()
            .map(|d| d.format(DATE_FORMAT).to_string())
            .collect()
    }
}

/// Compute the window of `base + offset + i` for `i` in `-3..=3`.
pub fn compute_window(base: NaiveDate, offset: i32) -> Window {
    let mut dates = [base; WINDOW_LEN];
    for (slot, i) in dates.iter_mut().zip(-WINDOW_SPAN..=WINDOW_SPAN) {
        *slot = shift_date(base, i64::from(i) + i64::from(offset));
    }
    Window { dates }
}

/// Shift a date by a signed number of days, saturating at the calendar bounds.
fn shift_date(date: NaiveDate, days: i64) -> NaiveDate {
    let magnitude = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    };
    shifted.unwrap_or(if days >= 0 {
        NaiveDate::MAX
    } else {
        NaiveDate::MIN
    })
}

/// Every valid (outbound, inbound) pair of two windows, row by row.
pub fn valid_pairs(outbound: &Window, inbound: &Window) -> Vec<DatePairKey> {
    outbound
        .dates()
        .iter()
        .flat_map(|out| {
            inbound
                .dates()
                .iter()
                .filter_map(move |inb| DatePairKey::new(*out, *inb))
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Search context
// ─────────────────────────────────────────────────────────────────────────────

/// Day offsets applied to the outbound and inbound windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Offsets {
    /// Outbound window offset in days.
    pub outbound: i32,
    /// Inbound window offset in days.
    pub inbound: i32,
}

impl Offsets {
    /// Create offsets.
    pub fn new(outbound: i32, inbound: i32) -> Self {
        Self { outbound, inbound }
    }

    /// Offsets moved by the given deltas.
    pub fn shifted(self, outbound: i32, inbound: i32) -> Self {
        Self {
            outbound: self.outbound.saturating_add(outbound),
            inbound: self.inbound.saturating_add(inbound),
        }
    }
}

/// What a search looks at: a route and its base dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchContext {
    /// Route being priced.
    pub route: RouteKey,
    /// Requested outbound date.
    pub outbound_base: NaiveDate,
    /// Requested return date, if any.
    pub inbound_base: Option<NaiveDate>,
}

impl SearchContext {
    /// Create a search context.
    pub fn new(route: RouteKey, outbound_base: NaiveDate, inbound_base: Option<NaiveDate>) -> Self {
        Self {
            route,
            outbound_base,
            inbound_base,
        }
    }

    /// Base of the inbound window; one week after departure without a return date.
    pub fn inbound_base(&self) -> NaiveDate {
        self.inbound_base.unwrap_or_else(|| {
            self.outbound_base
                .checked_add_days(Days::new(DEFAULT_TRIP_DAYS))
                .unwrap_or(NaiveDate::MAX)
        })
    }

    /// The outbound and inbound windows for the given offsets.
    pub fn windows(&self, offsets: Offsets) -> (Window, Window) {
        (
            compute_window(self.outbound_base, offsets.outbound),
            compute_window(self.inbound_base(), offsets.inbound),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn search() -> SearchContext {
        SearchContext::new(
            RouteKey::new("FRA", "BCN").unwrap(),
            date("2025-06-10"),
            Some(date("2025-06-17")),
        )
    }

    #[test]
    fn test_compute_window_centered() {
        let window = compute_window(date("2025-06-10"), 0);
        assert_eq!(
            window.to_strings(),
            vec![
                "2025-06-07",
                "2025-06-08",
                "2025-06-09",
                "2025-06-10",
                "2025-06-11",
                "2025-06-12",
                "2025-06-13"
            ]
        );
        assert!(window.contains(date("2025-06-13")));
        assert!(!window.contains(date("2025-06-14")));
    }

    #[test]
    fn test_compute_window_offset_crosses_month() {
        let window = compute_window(date("2025-06-29"), 2);
        assert_eq!(window.first(), date("2025-06-28"));
        assert_eq!(window.last(), date("2025-07-04"));

        let window = compute_window(date("2025-03-02"), -1);
        assert_eq!(window.first(), date("2025-02-26"));
    }

    #[test]
    fn test_compute_window_is_deterministic() {
        assert_eq!(
            compute_window(date("2024-02-27"), 1),
            compute_window(date("2024-02-27"), 1)
        );
        // Leap day included
        assert!(compute_window(date("2024-02-27"), 1).contains(date("2024-02-29")));
    }

    #[test]
    fn test_valid_pairs_for_adjacent_weeks() {
        let (outbound, inbound) = search().windows(Offsets::default());
        let pairs = valid_pairs(&outbound, &inbound);
        // Every inbound date of the following week is after every outbound date
        assert_eq!(pairs.len(), 49);
        assert!(pairs.iter().all(|p| p.inbound() > p.outbound()));
    }

    #[test]
    fn test_valid_pairs_excludes_same_or_earlier() {
        let outbound = compute_window(date("2025-06-10"), 0);
        let inbound = compute_window(date("2025-06-10"), 0);
        let pairs = valid_pairs(&outbound, &inbound);
        // Strict upper triangle of a 7x7 grid
        assert_eq!(pairs.len(), 21);
        assert!(!pairs.iter().any(|p| p.outbound() == p.inbound()));
    }

    #[test]
    fn test_inbound_base_defaults_to_one_week() {
        let search = SearchContext::new(
            RouteKey::new("FRA", "BCN").unwrap(),
            date("2025-06-10"),
            None,
        );
        assert_eq!(search.inbound_base(), date("2025-06-17"));

        let (_, inbound) = search.windows(Offsets::new(0, 1));
        assert_eq!(inbound.first(), date("2025-06-15"));
    }

    #[test]
    fn test_windows_apply_offsets_independently() {
        let (outbound, inbound) = search().windows(Offsets::new(-2, 3));
        assert_eq!(outbound.first(), date("2025-06-05"));
        assert_eq!(inbound.first(), date("2025-06-17"));
    }

    #[test]
    fn test_offsets_shifted() {
        let offsets = Offsets::new(1, -1).shifted(-1, 2);
        assert_eq!(offsets, Offsets::new(0, 1));
    }
}
