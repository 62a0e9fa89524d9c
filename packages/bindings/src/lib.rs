use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use re_invest_core::amortization;
use re_invest_core::real_estate::comparison::{self, ComparisonInput};
use re_invest_core::real_estate::sensitivity::{self, SensitivityAxis};
use re_invest_core::real_estate::valuation::{self, Assumptions, PropertyParameters, ValuationInput};
use re_invest_core::time_value::{self, DEFAULT_IRR_GUESS};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Property analysis
// ---------------------------------------------------------------------------

#[napi]
pub fn value_property(input_json: String) -> NapiResult<String> {
    let input: ValuationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = valuation::value_property(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct SensitivityRequest {
    parameters: PropertyParameters,
    #[serde(default)]
    assumptions: Assumptions,
    /// Single axis; all three curves when absent
    axis: Option<SensitivityAxis>,
}

#[napi]
pub fn property_sensitivity(input_json: String) -> NapiResult<String> {
    let req: SensitivityRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    match req.axis {
        Some(axis) => {
            let curve = sensitivity::sweep(axis, &req.parameters, &req.assumptions)
                .map_err(to_napi_error)?;
            serde_json::to_string(&curve).map_err(to_napi_error)
        }
        None => {
            let curves = sensitivity::sensitivity_curves(&req.parameters, &req.assumptions)
                .map_err(to_napi_error)?;
            serde_json::to_string(&curves).map_err(to_napi_error)
        }
    }
}

#[napi]
pub fn compare_properties(input_json: String) -> NapiResult<String> {
    let input: ComparisonInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = comparison::compare_properties(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Loan and return primitives
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct IrrRequest {
    cash_flows: Vec<Decimal>,
    guess: Option<Decimal>,
}

/// Returns the tagged solver outcome, so a non-converged solve is data, not an exception.
#[napi]
pub fn solve_irr(input_json: String) -> NapiResult<String> {
    let req: IrrRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let solution = time_value::solve_irr(&req.cash_flows, req.guess.unwrap_or(DEFAULT_IRR_GUESS))
        .map_err(to_napi_error)?;
    serde_json::to_string(&solution).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct AmortizationRequest {
    principal: Decimal,
    rate: Decimal,
    years: u32,
    #[serde(default)]
    annual: bool,
}

#[napi]
pub fn amortization_schedule(input_json: String) -> NapiResult<String> {
    let req: AmortizationRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let periods =
        amortization::schedule(req.principal, req.rate, req.years).map_err(to_napi_error)?;
    if req.annual {
        let years = amortization::annual_summary(&periods, req.years);
        serde_json::to_string(&years).map_err(to_napi_error)
    } else {
        serde_json::to_string(&periods).map_err(to_napi_error)
    }
}
