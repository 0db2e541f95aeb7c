//! Batch command - fetches a whole matrix in one non-streaming request.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use tracing::debug;

use pricegrid_client::PriceUpdate;
use pricegrid_matrix::{DatePairKey, Offsets, PriceCacheStore, PriceEntry, valid_pairs};

use super::render::print_stats;
use super::{Context, SearchArgs};

/// Arguments for the batch command.
#[derive(Args, Debug)]
pub struct BatchArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    /// Shift the departure window by this many days
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub outbound_offset: i32,

    /// Shift the return window by this many days
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub inbound_offset: i32,

    /// Show only the cheapest N results
    #[arg(short, long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct BatchRow {
    outbound_date: String,
    inbound_date: String,
    price: Option<String>,
}

/// Run the batch command.
pub async fn run(args: BatchArgs, ctx: &Context) -> Result<()> {
    let search = args.search.search_context()?;
    let route = search.route.clone();
    let (outbound, inbound) =
        search.windows(Offsets::new(args.outbound_offset, args.inbound_offset));

    let request = ctx
        .matrix_config(&args.search)
        .request(&route, &outbound, &inbound);

    let store = PriceCacheStore::new();
    let response = ctx.client()?.matrix().fetch(&request).await?;
    for update in response.prices.into_iter().map(PriceUpdate::from) {
        let Some(key) = DatePairKey::parse(&update.outbound_date, &update.inbound_date) else {
            debug!(
                outbound = %update.outbound_date,
                inbound = %update.inbound_date,
                "Skipping invalid pair in batch response"
            );
            continue;
        };
        store.merge(&route, key, PriceEntry::from_wire(update.price()));
    }

    let prices = store.get(&route);
    let mut rows: Vec<(DatePairKey, PriceEntry)> = valid_pairs(&outbound, &inbound)
        .into_iter()
        .filter_map(|key| prices.get(&key).map(|entry| (key, *entry)))
        .collect();
    rows.sort_by_key(|(key, entry)| (entry.price().is_none(), entry.price(), *key));
    if let Some(limit) = args.limit {
        rows.truncate(limit);
    }

    if ctx.json_output {
        let output: Vec<BatchRow> = rows
            .iter()
            .map(|(key, entry)| BatchRow {
                outbound_date: key.outbound().to_string(),
                inbound_date: key.inbound().to_string(),
                price: entry.price().map(|p| p.round_dp(2).to_string()),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let currency = ctx.currency(&args.search);
    println!();
    println!("{}", style(format!("{} batch prices", route)).bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    for (key, entry) in &rows {
        let price = match entry.price() {
            Some(price) => format!("{} {}", price.round_dp(2), currency),
            None => dim.apply_to("no offer").to_string(),
        };
        println!("  {} -> {}  {}", key.outbound(), key.inbound(), price);
    }
    println!();
    print_stats(&store.stats());
    println!();

    Ok(())
}
