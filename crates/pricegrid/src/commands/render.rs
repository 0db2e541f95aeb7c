//! Terminal and JSON rendering of price matrices.

use anyhow::Result;
use console::{Style, style};
use serde::Serialize;

use pricegrid_matrix::{
    CacheStats, CellState, Error, MatrixCell, MatrixSnapshot, PrefetchReport, SessionOutcome,
};

const CELL_WIDTH: usize = 9;
const LABEL_WIDTH: usize = 12;
const DATE_LABEL: &str = "%a %d %b";

/// Print the grid: one row per return date, one column per departure date.
pub fn print_grid(snapshot: &MatrixSnapshot, currency: &str) {
    let dim = Style::new().dim();
    let cheapest = snapshot.cheapest().copied();

    println!();
    println!(
        "{}  {}",
        style(snapshot.route.to_string()).bold(),
        dim.apply_to(format!(
            "offsets {:+}/{:+}, prices in {}",
            snapshot.offsets.outbound, snapshot.offsets.inbound, currency
        ))
    );
    println!("{}", dim.apply_to("─".repeat(LABEL_WIDTH + 7 * (CELL_WIDTH + 1))));

    print!("{:LABEL_WIDTH$}", "return \\ dep");
    for date in snapshot.outbound.dates() {
        print!(" {}", dim.apply_to(format!("{:>CELL_WIDTH$}", date.format("%a %d").to_string())));
    }
    println!();

    for row in snapshot.rows() {
        let label = row[0].inbound.format(DATE_LABEL).to_string();
        print!("{}", dim.apply_to(format!("{:LABEL_WIDTH$}", label)));
        for cell in row {
            print!(" {}", format_cell(cell, cheapest.as_ref()));
        }
        println!();
    }

    if let Some(cell) = cheapest
        && let CellState::Price(price) = cell.state
    {
        println!();
        println!(
            "  {} {} {} ({} -> {})",
            dim.apply_to("Cheapest:"),
            style(price.round_dp(2)).green().bold(),
            currency,
            cell.outbound,
            cell.inbound
        );
    }
    println!();
}

fn format_cell(cell: &MatrixCell, cheapest: Option<&MatrixCell>) -> String {
    let dim = Style::new().dim();
    match cell.state {
        CellState::Price(price) => {
            let text = format!("{:>CELL_WIDTH$}", price.round_dp(2).to_string());
            if cheapest == Some(cell) {
                style(text).green().bold().to_string()
            } else {
                text
            }
        }
        CellState::Pending => dim.apply_to(format!("{:>CELL_WIDTH$}", "...")).to_string(),
        CellState::Absent => dim.apply_to(format!("{:>CELL_WIDTH$}", "n/a")).to_string(),
        CellState::Unknown => dim.apply_to(format!("{:>CELL_WIDTH$}", "?")).to_string(),
        CellState::Invalid => format!("{:>CELL_WIDTH$}", ""),
    }
}

/// One line describing how a primary session ended.
pub fn describe_outcome(outcome: Option<SessionOutcome>) -> String {
    match outcome {
        Some(SessionOutcome::Skipped) => "All prices served from cache".to_string(),
        Some(SessionOutcome::Completed {
            requested,
            answered,
            unanswered: 0,
        }) => format!("Fetched {} of {} pairs", answered, requested),
        Some(SessionOutcome::Completed {
            requested,
            answered,
            unanswered,
        }) => format!(
            "Fetched {} of {} pairs ({} left unanswered)",
            answered, requested, unanswered
        ),
        Some(SessionOutcome::Cancelled) => "Loading cancelled".to_string(),
        None => "Prices unavailable".to_string(),
    }
}

/// Message for a primary session that failed.
pub fn describe_error(error: &Error) -> String {
    if error.is_timeout() {
        format!(
            "Prices unavailable: {} (raise [server] stream_timeout_secs for slow routes)",
            error
        )
    } else {
        format!("Prices unavailable: {}", error)
    }
}

/// Print a prefetch summary.
pub fn print_prefetch(report: &PrefetchReport) {
    let dim = Style::new().dim();
    println!(
        "  {} {} fetched, {} cached, {} failed",
        dim.apply_to("Neighbors:"),
        report.fetched,
        report.skipped,
        report.failed
    );
}

/// Print cache statistics.
pub fn print_stats(stats: &CacheStats) {
    let dim = Style::new().dim();
    println!(
        "  {} {} entries ({} priced, {} absent) across {} route(s)",
        dim.apply_to("Cache:"),
        stats.entries(),
        stats.priced,
        stats.absent,
        stats.routes
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON output
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SnapshotOutput {
    route: String,
    currency: String,
    outbound_offset: i32,
    inbound_offset: i32,
    outbound_dates: Vec<String>,
    inbound_dates: Vec<String>,
    cells: Vec<CellOutput>,
    cheapest: Option<CellOutput>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct CellOutput {
    outbound_date: String,
    inbound_date: String,
    state: &'static str,
    price: Option<String>,
}

impl From<&MatrixCell> for CellOutput {
    fn from(cell: &MatrixCell) -> Self {
        let (state, price) = match cell.state {
            CellState::Invalid => ("invalid", None),
            CellState::Pending => ("pending", None),
            CellState::Price(price) => ("price", Some(price.round_dp(2).to_string())),
            CellState::Absent => ("absent", None),
            CellState::Unknown => ("unknown", None),
        };
        Self {
            outbound_date: cell.outbound.to_string(),
            inbound_date: cell.inbound.to_string(),
            state,
            price,
        }
    }
}

/// Print the snapshot as pretty JSON.
pub fn print_json(snapshot: &MatrixSnapshot, currency: &str) -> Result<()> {
    let output = SnapshotOutput {
        route: snapshot.route.to_string(),
        currency: currency.to_string(),
        outbound_offset: snapshot.offsets.outbound,
        inbound_offset: snapshot.offsets.inbound,
        outbound_dates: snapshot.outbound.to_strings(),
        inbound_dates: snapshot.inbound.to_strings(),
        cells: snapshot.cells.iter().map(CellOutput::from).collect(),
        cheapest: snapshot.cheapest().map(CellOutput::from),
        error: snapshot.error.as_ref().map(|e| e.to_string()),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
