use clap::Args;
use serde_json::Value;

use re_invest_core::real_estate::comparison::{self, ComparisonInput};
use re_invest_core::real_estate::valuation::Assumptions;

use crate::input;

/// Arguments for a side-by-side property comparison
#[derive(Args)]
pub struct CompareArgs {
    /// Path to JSON/YAML file listing 2-4 named properties
    #[arg(long)]
    pub input: Option<String>,

    /// Path to JSON/YAML assumption set applied to every property
    #[arg(long)]
    pub assumptions: Option<String>,
}

pub fn run_compare(args: CompareArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut compare_input: ComparisonInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for comparison".into());
    };

    if let Some(ref path) = args.assumptions {
        let assumptions: Assumptions = input::file::read_input(path)?;
        compare_input.assumptions = assumptions;
    }

    let result = comparison::compare_properties(&compare_input)?;
    Ok(serde_json::to_value(result)?)
}
