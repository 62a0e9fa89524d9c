use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::ReInvestError;
use crate::real_estate::valuation::{
    calculate_with, Assumptions, IrrGrade, PropertyParameters, ValuationResult,
};
use crate::types::{saturating_mul, with_metadata, ComputationOutput, Money, Multiple, Rate};
use crate::ReInvestResult;

pub const MIN_COMPARED_PROPERTIES: usize = 2;
pub const MAX_COMPARED_PROPERTIES: usize = 4;

/// IRR gap (in rate terms) above which property choice dominates returns.
const WIDE_IRR_SPREAD: Rate = dec!(0.02);
const CAUTION_DSCR: Decimal = dec!(1.2);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparedProperty {
    pub name: String,
    pub parameters: PropertyParameters,
}

/// Properties to compare under one shared assumption set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonInput {
    pub properties: Vec<ComparedProperty>,
    #[serde(default)]
    pub assumptions: Assumptions,
}

/// Rows of the side-by-side table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMetric {
    Price,
    Noi,
    CapRate,
    GrossYield,
    Irr,
    EquityMultiple,
    Dscr,
    Fcf,
    TotalEquity,
    ExitPrice,
}

impl ComparisonMetric {
    pub const ALL: [ComparisonMetric; 10] = [
        ComparisonMetric::Price,
        ComparisonMetric::Noi,
        ComparisonMetric::CapRate,
        ComparisonMetric::GrossYield,
        ComparisonMetric::Irr,
        ComparisonMetric::EquityMultiple,
        ComparisonMetric::Dscr,
        ComparisonMetric::Fcf,
        ComparisonMetric::TotalEquity,
        ComparisonMetric::ExitPrice,
    ];

    /// Cheaper entry and less cash in are better; everything else is more-is-better.
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, ComparisonMetric::Price | ComparisonMetric::TotalEquity)
    }

    fn value(&self, summary: &PropertySummary) -> Option<Decimal> {
        match self {
            ComparisonMetric::Price => Some(summary.price),
            ComparisonMetric::Noi => Some(summary.noi),
            ComparisonMetric::CapRate => Some(summary.cap_rate),
            ComparisonMetric::GrossYield => Some(summary.gross_yield),
            ComparisonMetric::Irr => summary.irr,
            ComparisonMetric::EquityMultiple => Some(summary.equity_multiple),
            ComparisonMetric::Dscr => summary.dscr,
            ComparisonMetric::Fcf => Some(summary.fcf),
            ComparisonMetric::TotalEquity => Some(summary.total_equity),
            ComparisonMetric::ExitPrice => Some(summary.exit_price),
        }
    }
}

/// Spokes of the radar chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadarMetric {
    #[serde(rename = "IRR")]
    Irr,
    #[serde(rename = "CapRate")]
    CapRate,
    #[serde(rename = "DSCR")]
    Dscr,
    #[serde(rename = "FCF")]
    Fcf,
    #[serde(rename = "EquityX")]
    EquityMultiple,
}

impl RadarMetric {
    pub const ALL: [RadarMetric; 5] = [
        RadarMetric::Irr,
        RadarMetric::CapRate,
        RadarMetric::Dscr,
        RadarMetric::Fcf,
        RadarMetric::EquityMultiple,
    ];

    /// Chart scale: percentages for rates, millions for FCF, floored at zero.
    fn plot_value(&self, summary: &PropertySummary) -> Decimal {
        let raw = match self {
            RadarMetric::Irr => summary
                .irr
                .map_or(Decimal::ZERO, |r| saturating_mul(r, dec!(100))),
            RadarMetric::CapRate => saturating_mul(summary.cap_rate, dec!(100)),
            RadarMetric::Dscr => summary.dscr.unwrap_or(Decimal::ZERO),
            RadarMetric::Fcf => summary.fcf / dec!(1000000),
            RadarMetric::EquityMultiple => summary.equity_multiple,
        };
        raw.max(Decimal::ZERO)
            .round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
    }
}

/// Headline figures for one property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySummary {
    pub name: String,
    pub price: Money,
    pub noi: Money,
    pub cap_rate: Rate,
    pub gross_yield: Rate,
    /// Converged IRR only
    pub irr: Option<Rate>,
    pub irr_grade: IrrGrade,
    pub equity_multiple: Multiple,
    pub dscr: Option<Decimal>,
    pub fcf: Money,
    pub total_equity: Money,
    pub exit_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRow {
    pub metric: ComparisonMetric,
    pub higher_is_better: bool,
    /// One value per property, in input order
    pub values: Vec<Option<Decimal>>,
    /// Index of the winning property; None when no property has a value
    pub best_index: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadarAxis {
    pub metric: RadarMetric,
    pub values: Vec<Decimal>,
}

/// IRR of every property at one exit cap rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayPoint {
    pub label: String,
    pub irr_pct: Vec<Option<Decimal>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonOutput {
    pub properties: Vec<PropertySummary>,
    pub rows: Vec<MetricRow>,
    pub best_irr_index: Option<usize>,
    pub best_equity_multiple_index: Option<usize>,
    /// Max minus min IRR across properties with a converged IRR
    pub irr_spread: Option<Rate>,
    pub irr_spread_is_wide: bool,
    pub radar: Vec<RadarAxis>,
    pub exit_cap_overlay: Vec<OverlayPoint>,
    pub cautions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Value each property and line the results up side by side.
pub fn compare_properties(
    input: &ComparisonInput,
) -> ReInvestResult<ComputationOutput<ComparisonOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;
    debug!(properties = input.properties.len(), "comparing properties");

    let results = input
        .properties
        .iter()
        .map(|p| {
            calculate_with(&p.parameters, &input.assumptions).map_err(|e| match e {
                ReInvestError::InvalidParameter { field, reason } => ReInvestError::InvalidParameter {
                    field: format!("{}.{field}", p.name),
                    reason,
                },
                other => other,
            })
        })
        .collect::<ReInvestResult<Vec<ValuationResult>>>()?;

    let summaries: Vec<PropertySummary> = input
        .properties
        .iter()
        .zip(&results)
        .map(|(p, r)| summarize(p, r))
        .collect();

    for s in summaries.iter().filter(|s| s.irr.is_none()) {
        warnings.push(format!("{}: no IRR converged; excluded from IRR ranking", s.name));
    }

    let rows: Vec<MetricRow> = ComparisonMetric::ALL
        .iter()
        .map(|metric| {
            let values: Vec<Option<Decimal>> =
                summaries.iter().map(|s| metric.value(s)).collect();
            MetricRow {
                metric: *metric,
                higher_is_better: metric.higher_is_better(),
                best_index: best_index(&values, metric.higher_is_better()),
                values,
            }
        })
        .collect();

    let irrs: Vec<Option<Rate>> = summaries.iter().map(|s| s.irr).collect();
    let multiples: Vec<Option<Decimal>> =
        summaries.iter().map(|s| Some(s.equity_multiple)).collect();

    let converged: Vec<Rate> = irrs.iter().flatten().copied().collect();
    let irr_spread = match (converged.iter().max(), converged.iter().min()) {
        (Some(max), Some(min)) => max.checked_sub(*min),
        _ => None,
    };

    let radar = RadarMetric::ALL
        .iter()
        .map(|metric| RadarAxis {
            metric: *metric,
            values: summaries.iter().map(|s| metric.plot_value(s)).collect(),
        })
        .collect();

    let output = ComparisonOutput {
        best_irr_index: best_index(&irrs, true),
        best_equity_multiple_index: best_index(&multiples, true),
        irr_spread,
        irr_spread_is_wide: irr_spread.is_some_and(|s| s > WIDE_IRR_SPREAD),
        radar,
        exit_cap_overlay: exit_cap_overlay(&results),
        cautions: cautions(&summaries),
        properties: summaries,
        rows,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Side-by-side Property Comparison",
        &input.assumptions,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_input(input: &ComparisonInput) -> ReInvestResult<()> {
    let n = input.properties.len();
    if !(MIN_COMPARED_PROPERTIES..=MAX_COMPARED_PROPERTIES).contains(&n) {
        return Err(ReInvestError::InvalidParameter {
            field: "properties".into(),
            reason: format!(
                "Comparison needs {MIN_COMPARED_PROPERTIES} to {MAX_COMPARED_PROPERTIES} properties, got {n}"
            ),
        });
    }
    if let Some(i) = input.properties.iter().position(|p| p.name.trim().is_empty()) {
        return Err(ReInvestError::InvalidParameter {
            field: format!("properties[{i}].name"),
            reason: "Property name cannot be blank".into(),
        });
    }
    Ok(())
}

fn summarize(property: &ComparedProperty, result: &ValuationResult) -> PropertySummary {
    PropertySummary {
        name: property.name.clone(),
        price: property.parameters.price,
        noi: result.noi,
        cap_rate: result.cap_rate,
        gross_yield: result.gross_yield,
        irr: result.irr.rate(),
        irr_grade: result.irr_grade,
        equity_multiple: result.equity_multiple,
        dscr: result.dscr,
        fcf: result.fcf,
        total_equity: result.total_equity,
        exit_price: result.exit_price,
    }
}

/// First index holding the best value; missing values never win.
fn best_index(values: &[Option<Decimal>], higher_is_better: bool) -> Option<usize> {
    let mut best: Option<(usize, Decimal)> = None;
    for (i, value) in values.iter().enumerate() {
        let Some(v) = value else { continue };
        let better = match best {
            None => true,
            Some((_, current)) if higher_is_better => *v > current,
            Some((_, current)) => *v < current,
        };
        if better {
            best = Some((i, *v));
        }
    }
    best.map(|(i, _)| i)
}

fn exit_cap_overlay(results: &[ValuationResult]) -> Vec<OverlayPoint> {
    let Some(first) = results.first() else {
        return Vec::new();
    };
    // All curves share the fixed sweep, so points align by index
    first
        .sensitivity
        .exit_cap_rate
        .iter()
        .enumerate()
        .map(|(i, point)| OverlayPoint {
            label: point.label.clone(),
            irr_pct: results
                .iter()
                .map(|r| r.sensitivity.exit_cap_rate.get(i).and_then(|p| p.irr_pct))
                .collect(),
        })
        .collect()
}

fn cautions(summaries: &[PropertySummary]) -> Vec<String> {
    summaries
        .iter()
        .filter_map(|s| match s.dscr {
            Some(dscr) if dscr < CAUTION_DSCR => Some(format!(
                "{}: DSCR {dscr:.2} leaves thin debt-service headroom",
                s.name
            )),
            _ if s.fcf < Decimal::ZERO => Some(format!(
                "{}: FCF is negative, so cash goes out every year",
                s.name
            )),
            _ => None,
        })
        .collect()
}
