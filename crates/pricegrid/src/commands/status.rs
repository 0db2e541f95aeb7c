//! Status command - checks whether the pricing service is reachable.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use super::Context;

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show client settings as well
    #[arg(short, long)]
    pub detailed: bool,
}

/// Status response for JSON output.
#[derive(Debug, Serialize)]
struct StatusOutput {
    running: bool,
    server_url: String,
    error: Option<String>,
}

/// Run the status command.
pub async fn run(args: StatusArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let result = client.health().check().await;

    if ctx.json_output {
        let output = StatusOutput {
            running: result.is_ok(),
            server_url: ctx.server_url.clone(),
            error: result.as_ref().err().map(|e| e.to_string()),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();

    println!();
    println!("{}", style("Pricing Service Status").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();

    match &result {
        Ok(()) => println!(
            "  {} {}",
            dim.apply_to("Status:"),
            Style::new().green().apply_to("● reachable")
        ),
        Err(_) => println!(
            "  {} {}",
            dim.apply_to("Status:"),
            Style::new().red().apply_to("● unreachable")
        ),
    }
    println!("  {} {}", dim.apply_to("Server:"), ctx.server_url);

    if args.detailed {
        let server = ctx.config.server();
        let search = ctx.config.search();
        println!(
            "  {} {}s (stream {}s)",
            dim.apply_to("Timeout:"),
            server.timeout_secs,
            server.stream_timeout_secs
        );
        println!(
            "  {} {} adult(s), {} child(ren), {} infant(s), {}",
            dim.apply_to("Search:"),
            search.adults,
            search.children,
            search.infants,
            search.currency
        );
    }

    if let Err(e) = &result
        && ctx.verbose
    {
        println!();
        println!("  {} {}", dim.apply_to("Error:"), e);
    }

    println!();
    Ok(())
}
