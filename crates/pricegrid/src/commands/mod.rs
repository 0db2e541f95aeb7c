//! CLI command handlers.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use pricegrid_client::PriceGridClient;
use pricegrid_config::PriceGridConfig;
use pricegrid_matrix::{MatrixConfig, MatrixController, RouteKey, SearchContext, SessionOutcome};

pub mod batch;
pub mod browse;
pub mod config;
pub mod matrix;
pub mod render;
pub mod status;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Pricing service URL.
    pub server_url: String,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Merged configuration files.
    pub config: PriceGridConfig,
    /// Explicit config directory, if given.
    pub config_dir: Option<PathBuf>,
}

impl Context {
    /// Build a client for the configured service.
    pub fn client(&self) -> Result<PriceGridClient> {
        let server = self.config.server();
        let mut builder = PriceGridClient::builder()
            .base_url(&self.server_url)
            .timeout(server.timeout())
            .stream_timeout(server.stream_timeout());
        if let Some(agent) = server.user_agent {
            builder = builder.user_agent(agent);
        }
        Ok(builder.build()?)
    }

    /// Matrix settings from the config files, overridden by search flags.
    pub fn matrix_config(&self, search: &SearchArgs) -> MatrixConfig {
        let defaults = self.config.search();
        let prefetch = self.config.prefetch();

        MatrixConfig::new()
            .with_passengers(
                search.adults.unwrap_or(defaults.adults),
                search.children.unwrap_or(defaults.children),
                search.infants.unwrap_or(defaults.infants),
            )
            .with_currency(search.currency.clone().unwrap_or(defaults.currency))
            .with_prefetch(prefetch.enabled)
            .with_settle_delay(prefetch.settle_delay())
            .with_mark_unanswered_absent(self.config.matrix().mark_unanswered_absent)
    }

    /// Currency prices are shown in.
    pub fn currency(&self, search: &SearchArgs) -> String {
        search
            .currency
            .clone()
            .unwrap_or_else(|| self.config.search().currency)
    }
}

/// Route, dates and passengers shared by the matrix commands.
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Origin airport code (e.g. FRA)
    pub origin: String,

    /// Destination airport code (e.g. BCN)
    pub destination: String,

    /// Departure date (YYYY-MM-DD)
    #[arg(short, long)]
    pub depart: NaiveDate,

    /// Return date (YYYY-MM-DD); defaults to a week after departure
    #[arg(short = 'r', long = "return")]
    pub return_date: Option<NaiveDate>,

    /// Adult passengers
    #[arg(long)]
    pub adults: Option<u32>,

    /// Child passengers
    #[arg(long)]
    pub children: Option<u32>,

    /// Infant passengers
    #[arg(long)]
    pub infants: Option<u32>,

    /// Currency code (e.g. EUR)
    #[arg(long)]
    pub currency: Option<String>,
}

impl SearchArgs {
    /// The search these arguments describe.
    pub fn search_context(&self) -> Result<SearchContext> {
        let route = RouteKey::new(&self.origin, &self.destination)?;
        Ok(SearchContext::new(route, self.depart, self.return_date))
    }
}

/// Wait for the primary session, showing a spinner with the pending count.
pub async fn wait_primary(
    controller: &MatrixController,
    ctx: &Context,
) -> Result<Option<SessionOutcome>> {
    if ctx.json_output {
        return Ok(controller.wait_primary().await?);
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Loading prices...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut pending = controller.pending().subscribe();
    let ticker = {
        let spinner = spinner.clone();
        tokio::spawn(async move {
            while pending.changed().await.is_ok() {
                let count = *pending.borrow_and_update();
                spinner.set_message(format!("{} pairs pending", count));
            }
        })
    };

    let outcome = controller.wait_primary().await;
    ticker.abort();
    spinner.finish_and_clear();
    Ok(outcome?)
}
