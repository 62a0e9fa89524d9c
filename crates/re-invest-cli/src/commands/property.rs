use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use re_invest_core::real_estate::sensitivity::{self, SensitivityAxis, SensitivityPoint};
use re_invest_core::real_estate::valuation::{
    self, Assumptions, PropertyParameters, ValuationInput,
};

use crate::input;

/// Property inputs shared by `value` and `sensitivity`
#[derive(Args)]
pub struct PropertyArgs {
    /// Path to JSON/YAML input file with parameters and assumptions (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Path to JSON/YAML assumption set (overrides the one in --input)
    #[arg(long)]
    pub assumptions: Option<String>,

    /// Purchase price
    #[arg(long)]
    pub price: Option<Decimal>,

    /// Floor area in square metres
    #[arg(long)]
    pub area: Option<Decimal>,

    /// Monthly rent per square metre
    #[arg(long)]
    pub rent_per_sqm: Option<Decimal>,

    /// Vacancy rate as a decimal (0.05 = 5%)
    #[arg(long)]
    pub vacancy_rate: Option<Decimal>,

    /// Operating expenses as a share of effective rent
    #[arg(long)]
    pub opex_ratio: Option<Decimal>,

    /// Loan-to-value ratio
    #[arg(long)]
    pub ltv: Option<Decimal>,

    /// Annual loan interest rate
    #[arg(long)]
    pub interest_rate: Option<Decimal>,

    /// Loan term in years
    #[arg(long)]
    pub loan_years: Option<u32>,

    /// Holding period in years
    #[arg(long)]
    pub hold_years: Option<u32>,

    /// Capitalisation rate at exit
    #[arg(long)]
    pub exit_cap_rate: Option<Decimal>,
}

impl PropertyArgs {
    /// File, then piped stdin, then flags over the default property.
    fn resolve(&self) -> Result<ValuationInput, Box<dyn std::error::Error>> {
        let mut resolved: ValuationInput = if let Some(ref path) = self.input {
            input::file::read_input(path)?
        } else if let Some(data) = input::stdin::read_stdin()? {
            serde_json::from_value(data)?
        } else {
            ValuationInput {
                parameters: self.parameters_from_flags(),
                assumptions: Assumptions::default(),
            }
        };

        if let Some(ref path) = self.assumptions {
            resolved.assumptions = input::file::read_input(path)?;
        }
        Ok(resolved)
    }

    fn parameters_from_flags(&self) -> PropertyParameters {
        let d = PropertyParameters::default();
        PropertyParameters {
            price: self.price.unwrap_or(d.price),
            area: self.area.unwrap_or(d.area),
            rent_per_sqm: self.rent_per_sqm.unwrap_or(d.rent_per_sqm),
            vacancy_rate: self.vacancy_rate.unwrap_or(d.vacancy_rate),
            opex_ratio: self.opex_ratio.unwrap_or(d.opex_ratio),
            ltv: self.ltv.unwrap_or(d.ltv),
            interest_rate: self.interest_rate.unwrap_or(d.interest_rate),
            loan_years: self.loan_years.unwrap_or(d.loan_years),
            hold_years: self.hold_years.unwrap_or(d.hold_years),
            exit_cap_rate: self.exit_cap_rate.unwrap_or(d.exit_cap_rate),
        }
    }
}

/// Arguments for a full property valuation
#[derive(Args)]
pub struct ValueArgs {
    #[command(flatten)]
    pub property: PropertyArgs,
}

pub fn run_value(args: ValueArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let valuation_input = args.property.resolve()?;
    let result = valuation::value_property(&valuation_input)?;
    Ok(serde_json::to_value(result)?)
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AxisArg {
    ExitCap,
    Vacancy,
    InterestRate,
}

impl From<AxisArg> for SensitivityAxis {
    fn from(arg: AxisArg) -> Self {
        match arg {
            AxisArg::ExitCap => SensitivityAxis::ExitCapRate,
            AxisArg::Vacancy => SensitivityAxis::VacancyRate,
            AxisArg::InterestRate => SensitivityAxis::InterestRate,
        }
    }
}

/// Arguments for the one-way IRR sensitivity sweep
#[derive(Args)]
pub struct SensitivityArgs {
    #[command(flatten)]
    pub property: PropertyArgs,

    /// Sweep a single axis (default: all three)
    #[arg(long, value_enum)]
    pub axis: Option<AxisArg>,
}

#[derive(Debug, Serialize)]
struct SensitivityRow<'a> {
    axis: SensitivityAxis,
    value: Decimal,
    label: &'a str,
    irr_pct: Option<Decimal>,
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let resolved = args.property.resolve()?;
    let params = &resolved.parameters;
    let assumptions = &resolved.assumptions;

    let curves: Vec<(SensitivityAxis, Vec<SensitivityPoint>)> = match args.axis {
        Some(axis) => {
            let axis = SensitivityAxis::from(axis);
            vec![(axis, sensitivity::sweep(axis, params, assumptions)?)]
        }
        None => {
            let all = sensitivity::sensitivity_curves(params, assumptions)?;
            SensitivityAxis::ALL
                .iter()
                .map(|axis| (*axis, all.curve(*axis).to_vec()))
                .collect()
        }
    };

    // One flat row per point so table and CSV output stay rectangular
    let rows: Vec<SensitivityRow> = curves
        .iter()
        .flat_map(|(axis, points)| {
            points.iter().map(move |p| SensitivityRow {
                axis: *axis,
                value: p.value,
                label: &p.label,
                irr_pct: p.irr_pct,
            })
        })
        .collect();

    Ok(serde_json::json!({ "results": rows }))
}
