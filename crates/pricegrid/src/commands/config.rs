//! Config command - configuration inspection.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use console::Style;
use tracing::info;

use pricegrid_config::{PROJECT_CONFIG_FILE, USER_CONFIG_FILE};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration and where it came from
    Show,

    /// Write a config file filled with the current settings
    Init {
        /// Create project-local config (./pricegrid.toml) instead of user config
        #[arg(long)]
        local: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show configuration file paths
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Init { local, force } => cmd_init(ctx, local, force),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

fn user_config_path(ctx: &Context) -> Option<PathBuf> {
    match &ctx.config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => pricegrid_config::xdg_config_path(),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = pricegrid_config::load_config_with_options(None, ctx.config_dir.as_deref())?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&loaded.config)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("# pricegrid configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("{}\n", dim.apply_to("# No config files loaded (using defaults)"));
    } else {
        for path in sources {
            println!("{}", dim.apply_to(format!("# loaded: {}", path.display())));
        }
        println!();
    }
    for warning in &loaded.warnings {
        println!("{}", Style::new().yellow().apply_to(format!("# warning: {}", warning)));
    }

    // Print every section with its effective values
    print!("{}", loaded.config.resolved().to_toml()?);

    if ctx.server_url != loaded.config.server().base_url {
        println!();
        println!(
            "{}",
            dim.apply_to(format!("# server overridden on the command line: {}", ctx.server_url))
        );
    }

    Ok(())
}

fn cmd_init(ctx: &Context, local: bool, force: bool) -> Result<()> {
    let path = if local {
        PathBuf::from(PROJECT_CONFIG_FILE)
    } else {
        user_config_path(ctx).context("Could not determine config directory")?
    };

    if path.exists() && !force {
        println!("Config file already exists: {}", path.display());
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    // Start from the merged layers so existing settings carry over
    pricegrid_config::save_config(&ctx.config.resolved(), &path)?;
    info!(path = %path.display(), "Wrote config file");

    if ctx.json_output {
        println!("{}", serde_json::json!({ "created": path }));
    } else {
        println!("Created {}", path.display());
    }
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let user = user_config_path(ctx);
    let project = std::env::current_dir()
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|_| PathBuf::from(PROJECT_CONFIG_FILE));
    let logs = pricegrid_config::log_dir(ctx.config_dir.as_deref());

    if ctx.json_output {
        let output = serde_json::json!({
            "user": user,
            "project": project,
            "logs": logs,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    match user {
        Some(path) => println!("{} {}", dim.apply_to("user:   "), path.display()),
        None => println!("{} (no config directory)", dim.apply_to("user:   ")),
    }
    println!("{} {}", dim.apply_to("project:"), project.display());
    if let Some(logs) = logs {
        println!("{} {}", dim.apply_to("logs:   "), logs.display());
    }

    Ok(())
}
