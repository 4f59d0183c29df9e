mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::config::ConfigCommand;
use commands::loan::{LoanArgs, TaxArgs, TimelineArgs};
use commands::sweep::{CrossoverArgs, SweepArgs};

/// Home purchase cost and return projections
#[derive(Parser)]
#[command(
    name = "homeroi",
    version,
    about = "Home purchase cost and return projections",
    long_about = "A CLI for projecting the cost of buying a home and the return on it \
                  with decimal precision. Supports amortization schedules, property tax \
                  projections, PMI, annualized return timelines and parameter sweeps."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log engine diagnostics to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Month-by-month mortgage amortization schedule
    Schedule(TimelineArgs),
    /// Yearly property tax and appraisal projection
    Tax(TaxArgs),
    /// Month-by-month cost, equity and annualized return timeline
    Roi(TimelineArgs),
    /// Cumulative paid per category (principal, interest, tax, PMI, down payment)
    Totals(TimelineArgs),
    /// Amount paid per category in each month
    Payments(TimelineArgs),
    /// Headline figures for one scenario
    Summary(LoanArgs),
    /// Sweep one or two parameters and record a metric per scenario
    Sweep(SweepArgs),
    /// Month at which the annualized return first exceeds a threshold
    Crossover(CrossoverArgs),
    /// Create or inspect a persisted parameter file
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "homeroi_core=debug,homeroi=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Schedule(args) => commands::loan::run_schedule(args),
        Commands::Tax(args) => commands::loan::run_tax(args),
        Commands::Roi(args) => commands::loan::run_roi(args),
        Commands::Totals(args) => commands::loan::run_totals(args),
        Commands::Payments(args) => commands::loan::run_payments(args),
        Commands::Summary(args) => commands::loan::run_summary(args),
        Commands::Sweep(args) => commands::sweep::run_sweep(args),
        Commands::Crossover(args) => commands::sweep::run_crossover(args),
        Commands::Config(cmd) => commands::config::run_config(cmd),
        Commands::Version => {
            println!("homeroi {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
