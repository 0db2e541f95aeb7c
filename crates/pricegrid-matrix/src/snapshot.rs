//! Read-only view of the matrix on display.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::Error;
use crate::keys::{DatePairKey, PriceEntry, RouteKey};
use crate::store::PriceMap;
use crate::window::{Offsets, WINDOW_LEN, Window};

/// What a grid cell shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// Return is not after departure; never requested.
    Invalid,
    /// Requested by the primary session, no result yet.
    Pending,
    /// Cheapest fare for the pair.
    Price(Decimal),
    /// The service confirmed there is no offer.
    Absent,
    /// Not cached and not being loaded.
    Unknown,
}

/// One cell of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixCell {
    /// Departure date (column).
    pub outbound: NaiveDate,
    /// Return date (row).
    pub inbound: NaiveDate,
    /// Cell contents.
    pub state: CellState,
}

/// The 7x7 grid for the active search.
#[derive(Debug, Clone)]
pub struct MatrixSnapshot {
    /// Primary generation the view belongs to.
    pub generation: u64,
    /// Route on display.
    pub route: RouteKey,
    /// Offsets on display.
    pub offsets: Offsets,
    /// Departure dates, one per column.
    pub outbound: Window,
    /// Return dates, one per row.
    pub inbound: Window,
    /// Row-major cells: one row per return date.
    pub cells: Vec<MatrixCell>,
    /// Route-level error of the primary session, if it failed.
    pub error: Option<Arc<Error>>,
}

impl MatrixSnapshot {
    pub(crate) fn build(
        generation: u64,
        route: RouteKey,
        offsets: Offsets,
        (outbound, inbound): (Window, Window),
        prices: &PriceMap,
        pending: &HashSet<DatePairKey>,
        error: Option<Arc<Error>>,
    ) -> Self {
        let mut cells = Vec::with_capacity(WINDOW_LEN * WINDOW_LEN);
        for &inb in inbound.dates() {
            for &out in outbound.dates() {
                let state = match DatePairKey::new(out, inb) {
                    None => CellState::Invalid,
                    Some(key) => match prices.get(&key) {
                        Some(PriceEntry::Price(price)) => CellState::Price(*price),
                        Some(PriceEntry::Absent) => CellState::Absent,
                        None if pending.contains(&key) => CellState::Pending,
                        None => CellState::Unknown,
                    },
                };
                cells.push(MatrixCell {
                    outbound: out,
                    inbound: inb,
                    state,
                });
            }
        }

        Self {
            generation,
            route,
            offsets,
            outbound,
            inbound,
            cells,
            error,
        }
    }

    /// Cells of one return row.
    pub fn row(&self, index: usize) -> &[MatrixCell] {
        let start = (index * WINDOW_LEN).min(self.cells.len());
        let end = (start + WINDOW_LEN).min(self.cells.len());
        &self.cells[start..end]
    }

    /// Rows in return date order.
    pub fn rows(&self) -> impl Iterator<Item = &[MatrixCell]> {
        self.cells.chunks(WINDOW_LEN)
    }

    /// Cell at (row, column).
    pub fn cell(&self, row: usize, column: usize) -> Option<&MatrixCell> {
        if column >= WINDOW_LEN {
            return None;
        }
        self.cells.get(row * WINDOW_LEN + column)
    }

    /// The cheapest priced cell. Ties go to the earliest return, then the
    /// earliest departure.
    pub fn cheapest(&self) -> Option<&MatrixCell> {
        self.cells
            .iter()
            .filter_map(|cell| match cell.state {
                CellState::Price(price) => Some((price, cell)),
                _ => None,
            })
            .min_by_key(|(price, _)| *price)
            .map(|(_, cell)| cell)
    }

    /// Cells still loading.
    pub fn pending_count(&self) -> usize {
        self.count(|state| matches!(state, CellState::Pending))
    }

    /// Cells holding a price.
    pub fn priced_count(&self) -> usize {
        self.count(|state| matches!(state, CellState::Price(_)))
    }

    /// Cells confirmed without an offer.
    pub fn absent_count(&self) -> usize {
        self.count(|state| matches!(state, CellState::Absent))
    }

    /// Whether any cell is still loading.
    pub fn is_loading(&self) -> bool {
        self.pending_count() > 0
    }

    fn count(&self, predicate: impl Fn(&CellState) -> bool) -> usize {
        self.cells.iter().filter(|cell| predicate(&cell.state)).count()
    }
}
