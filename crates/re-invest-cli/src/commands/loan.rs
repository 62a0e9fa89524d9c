use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use re_invest_core::amortization;
use re_invest_core::time_value::{self, DEFAULT_IRR_GUESS};

/// Arguments for a standalone IRR solve
#[derive(Args)]
pub struct IrrArgs {
    /// Periodic cash flows, period 0 first (comma-separated, e.g. "-100,30,30,130")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub cash_flows: Vec<Decimal>,

    /// Initial Newton-Raphson guess
    #[arg(long, allow_hyphen_values = true)]
    pub guess: Option<Decimal>,
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let solution = time_value::solve_irr(&args.cash_flows, args.guess.unwrap_or(DEFAULT_IRR_GUESS))?;
    let iterations = solution.iterations();
    let irr = solution.into_rate()?;
    let npv_at_irr = time_value::npv(irr, &args.cash_flows)?;

    Ok(json!({
        "irr": irr,
        "iterations": iterations,
        "npv_at_irr": npv_at_irr,
    }))
}

/// Arguments for a loan amortisation schedule
#[derive(Args)]
pub struct AmortizeArgs {
    /// Loan principal
    #[arg(long)]
    pub principal: Decimal,

    /// Annual interest rate as a decimal
    #[arg(long)]
    pub rate: Decimal,

    /// Loan term in years
    #[arg(long)]
    pub years: u32,

    /// Roll months up into yearly rows
    #[arg(long)]
    pub annual: bool,
}

pub fn run_amortize(args: AmortizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let monthly_payment = amortization::monthly_payment(args.principal, args.rate, args.years)?;
    let periods = amortization::schedule(args.principal, args.rate, args.years)?;
    let total_interest: Decimal = periods.iter().map(|p| p.interest).sum();

    let results = if args.annual {
        serde_json::to_value(amortization::annual_summary(&periods, args.years))?
    } else {
        serde_json::to_value(&periods)?
    };

    Ok(json!({
        "monthly_payment": monthly_payment,
        "total_interest": total_interest,
        "results": results,
    }))
}
