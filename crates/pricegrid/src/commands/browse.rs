//! Browse command - interactive navigation of the price matrix.
//!
//! Every move reuses the same controller and cache, so revisiting a window
//! or stepping into a prefetched neighbor costs no request.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::{Style, Term, style};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};

use pricegrid_matrix::{MatrixController, Offsets};

use super::render::{describe_error, describe_outcome, print_grid, print_json, print_stats};
use super::{Context, SearchArgs, wait_primary};

/// Arguments for the browse command.
#[derive(Args, Debug)]
pub struct BrowseArgs {
    #[command(flatten)]
    pub search: SearchArgs,
}

/// Run the browse command.
pub async fn run(args: BrowseArgs, ctx: &Context) -> Result<()> {
    let search = args.search.search_context()?;
    let controller = MatrixController::new(
        Arc::new(ctx.client()?),
        ctx.matrix_config(&args.search),
    );

    let mut browser = Browser::new(controller, ctx.clone(), ctx.currency(&args.search))?;
    browser.controller.load(search, Offsets::default());
    browser.show_after_load().await?;
    browser.run().await
}

enum ControlFlow {
    Continue,
    Exit,
}

/// Interactive browser state.
struct Browser {
    controller: MatrixController,
    ctx: Context,
    currency: String,
    editor: Editor<(), DefaultHistory>,
    term: Term,
}

impl Browser {
    fn new(controller: MatrixController, ctx: Context, currency: String) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(true)
            .build();

        Ok(Self {
            controller,
            ctx,
            currency,
            editor: Editor::with_config(config)?,
            term: Term::stdout(),
        })
    }

    async fn run(&mut self) -> Result<()> {
        self.print_dim("Type help for commands, Ctrl+D to exit.");

        loop {
            match self.editor.readline("grid> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match self.handle_command(line).await {
                        Ok(ControlFlow::Continue) => continue,
                        Ok(ControlFlow::Exit) => break,
                        Err(e) => self.print_error(&format!("Error: {}", e)),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    self.print_dim("(Interrupted - type quit to exit)");
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(e) => {
                    self.print_error(&format!("Input error: {}", e));
                    break;
                }
            }
        }

        self.controller.teardown();
        Ok(())
    }

    async fn handle_command(&mut self, input: &str) -> Result<ControlFlow> {
        let (d_out, d_in) = match input {
            "quit" | "q" | "exit" => return Ok(ControlFlow::Exit),
            "help" | "h" | "?" => {
                self.print_help();
                return Ok(ControlFlow::Continue);
            }
            "clear" | "cls" => {
                self.term.clear_screen()?;
                return Ok(ControlFlow::Continue);
            }
            "show" | "s" => {
                self.show();
                return Ok(ControlFlow::Continue);
            }
            "stats" => {
                print_stats(&self.controller.store().stats());
                return Ok(ControlFlow::Continue);
            }
            "right" | "r" => (1, 0),
            "left" | "l" => (-1, 0),
            "down" | "d" => (0, 1),
            "up" | "u" => (0, -1),
            other => {
                self.print_error(&format!("Unknown command: {}", other));
                self.print_dim("Type help for available commands");
                return Ok(ControlFlow::Continue);
            }
        };

        self.controller.shift(d_out, d_in)?;
        self.show_after_load().await?;
        Ok(ControlFlow::Continue)
    }

    async fn show_after_load(&self) -> Result<()> {
        let outcome = wait_primary(&self.controller, &self.ctx).await?;
        self.show();
        if !self.ctx.json_output {
            match self.controller.error() {
                Some(error) => self.print_error(&describe_error(&error)),
                None => self.print_dim(&describe_outcome(outcome)),
            }
        }
        Ok(())
    }

    fn show(&self) {
        let Some(snapshot) = self.controller.snapshot() else {
            self.print_dim("No active search");
            return;
        };
        if self.ctx.json_output {
            if let Err(e) = print_json(&snapshot, &self.currency) {
                self.print_error(&e.to_string());
            }
        } else {
            print_grid(&snapshot, &self.currency);
        }
    }

    fn print_help(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Available Commands").bold());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("  {}  - Departure window one day later", style("right, r").cyan());
        println!("  {}   - Departure window one day earlier", style("left, l").cyan());
        println!("  {}   - Return window one day later", style("down, d").cyan());
        println!("  {}     - Return window one day earlier", style("up, u").cyan());
        println!("  {}   - Redraw the grid", style("show, s").cyan());
        println!("  {}     - Cache statistics", style("stats").cyan());
        println!("  {}  - Exit", style("quit, q").cyan());
        println!();
    }

    fn print_dim(&self, msg: &str) {
        println!("  {}", Style::new().dim().apply_to(msg));
    }

    fn print_error(&self, msg: &str) {
        eprintln!("  {}", Style::new().red().apply_to(msg));
    }
}
