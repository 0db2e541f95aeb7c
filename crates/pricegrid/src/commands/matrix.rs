//! Matrix command - loads the 7x7 price grid around a pair of dates.

use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use console::Style;

use pricegrid_matrix::{MatrixController, Offsets};

use super::render::{
    describe_error, describe_outcome, print_grid, print_json, print_prefetch, print_stats,
};
use super::{Context, SearchArgs, wait_primary};

/// Arguments for the matrix command.
#[derive(Args, Debug)]
pub struct MatrixArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    /// Shift the departure window by this many days
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub outbound_offset: i32,

    /// Shift the return window by this many days
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub inbound_offset: i32,

    /// Don't load the neighboring windows afterwards
    #[arg(long)]
    pub no_prefetch: bool,
}

/// Run the matrix command.
pub async fn run(args: MatrixArgs, ctx: &Context) -> Result<()> {
    let search = args.search.search_context()?;
    let currency = ctx.currency(&args.search);
    let config = ctx.matrix_config(&args.search);
    let prefetch = config.prefetch_enabled && !args.no_prefetch;

    let controller = MatrixController::new(Arc::new(ctx.client()?), config.with_prefetch(prefetch));
    controller.load(search, Offsets::new(args.outbound_offset, args.inbound_offset));

    let outcome = wait_primary(&controller, ctx).await?;
    let snapshot = controller
        .snapshot()
        .context("search was cleared while loading")?;

    if ctx.json_output {
        print_json(&snapshot, &currency)?;
    } else {
        print_grid(&snapshot, &currency);
        println!("  {}", Style::new().dim().apply_to(describe_outcome(outcome)));
    }

    if let Some(error) = controller.error() {
        bail!(describe_error(&error));
    }

    if prefetch && let Some(report) = controller.wait_prefetch().await? {
        if !ctx.json_output {
            print_prefetch(&report);
        }
    }

    if !ctx.json_output {
        print_stats(&controller.store().stats());
        println!();
    }

    Ok(())
}
