mod commands;
mod input;
mod log;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::compare::CompareArgs;
use commands::loan::{AmortizeArgs, IrrArgs};
use commands::property::{SensitivityArgs, ValueArgs};

/// Leveraged real-estate investment analysis
#[derive(Parser)]
#[command(
    name = "reia",
    version,
    about = "Leveraged real-estate investment analysis",
    long_about = "A CLI for evaluating leveraged property purchases with decimal precision. \
                  Computes NOI, cap rate, DSCR, free cash flow, exit proceeds, IRR and \
                  equity multiple, sweeps IRR sensitivity and compares properties side by side."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log computation details to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Value a property: NOI, DSCR, FCF, exit, IRR, yearly projection
    Value(ValueArgs),
    /// IRR sensitivity to exit cap rate, vacancy and interest rate
    Sensitivity(SensitivityArgs),
    /// Compare 2-4 properties side by side
    Compare(CompareArgs),
    /// Solve the IRR of a cash-flow series
    Irr(IrrArgs),
    /// Fixed-rate loan amortisation schedule
    Amortize(AmortizeArgs),
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

fn main() {
    let cli = Cli::parse();
    log::init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Value(args) => commands::property::run_value(args),
        Commands::Sensitivity(args) => commands::property::run_sensitivity(args),
        Commands::Compare(args) => commands::compare::run_compare(args),
        Commands::Irr(args) => commands::loan::run_irr(args),
        Commands::Amortize(args) => commands::loan::run_amortize(args),
        Commands::Version => {
            println!("reia {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
