use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::amortization;
use crate::error::ReInvestError;
use crate::real_estate::valuation::{
    checked, equity_cash_flows, exit_sale, operating_statement, validate_assumptions,
    validate_parameters, Assumptions, BaseCase, PropertyParameters,
};
use crate::time_value::{self, DEFAULT_IRR_GUESS};
use crate::types::{to_pct, Money, Rate, SensitivityVariable};
use crate::ReInvestResult;

/// Parameters swept by the one-way sensitivity analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityAxis {
    ExitCapRate,
    VacancyRate,
    InterestRate,
}

impl SensitivityAxis {
    pub const ALL: [SensitivityAxis; 3] = [
        SensitivityAxis::ExitCapRate,
        SensitivityAxis::VacancyRate,
        SensitivityAxis::InterestRate,
    ];

    /// Fixed sweep range. Bounds are constants, not derived from the inputs,
    /// so curves from different properties line up point for point.
    pub fn variable(&self) -> SensitivityVariable {
        let (name, min, max, step) = match self {
            SensitivityAxis::ExitCapRate => ("exit_cap_rate", dec!(0.025), dec!(0.100), dec!(0.005)),
            SensitivityAxis::VacancyRate => ("vacancy_rate", dec!(0.000), dec!(0.350), dec!(0.025)),
            SensitivityAxis::InterestRate => ("interest_rate", dec!(0.005), dec!(0.040), dec!(0.0025)),
        };
        SensitivityVariable {
            name: name.into(),
            min,
            max,
            step,
        }
    }

    /// Axis label for a swept value, e.g. "5.5%" or "1.25%".
    pub fn label(&self, value: Rate) -> String {
        // Quarter-point rate steps need two decimals to stay distinct
        let dp = match self {
            SensitivityAxis::InterestRate => 2,
            _ => 1,
        };
        format!("{:.*}%", dp as usize, to_pct(value, dp))
    }
}

/// One point on a sensitivity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    /// Swept value as a decimal rate
    pub value: Rate,
    pub label: String,
    /// IRR in percent, 2 dp; null when no IRR converged at this point
    pub irr_pct: Option<Decimal>,
}

/// The three independent one-way curves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityCurves {
    pub exit_cap_rate: Vec<SensitivityPoint>,
    pub vacancy_rate: Vec<SensitivityPoint>,
    pub interest_rate: Vec<SensitivityPoint>,
}

impl SensitivityCurves {
    pub fn curve(&self, axis: SensitivityAxis) -> &[SensitivityPoint] {
        match axis {
            SensitivityAxis::ExitCapRate => &self.exit_cap_rate,
            SensitivityAxis::VacancyRate => &self.vacancy_rate,
            SensitivityAxis::InterestRate => &self.interest_rate,
        }
    }

    pub fn unconverged_points(&self) -> usize {
        SensitivityAxis::ALL
            .iter()
            .flat_map(|axis| self.curve(*axis))
            .filter(|p| p.irr_pct.is_none())
            .count()
    }
}

/// Most points a single sweep may produce.
pub const MAX_SWEEP_POINTS: u32 = 1_000;

/// Grid points `min + i * step` for i = 0..=n, where `max - min` is exactly
/// `n` steps. Each point is computed from `min` so no rounding accumulates.
pub fn sweep_values(var: &SensitivityVariable) -> ReInvestResult<Vec<Decimal>> {
    let field = format!("variable:{}", var.name);
    if var.step <= Decimal::ZERO {
        return Err(ReInvestError::invalid(&field, "Step must be positive"));
    }
    if var.min > var.max {
        return Err(ReInvestError::invalid(&field, "Min must be <= max"));
    }

    let steps = (var.max - var.min)
        .checked_div(var.step)
        .ok_or_else(|| ReInvestError::invalid(&field, "Step is too small for the range"))?;
    if !steps.fract().is_zero() {
        return Err(ReInvestError::invalid(
            &field,
            format!("Range {}..{} is not a whole number of {} steps", var.min, var.max, var.step),
        ));
    }
    let steps = steps
        .to_u32()
        .filter(|n| *n < MAX_SWEEP_POINTS)
        .ok_or_else(|| {
            ReInvestError::invalid(&field, format!("Sweep exceeds {MAX_SWEEP_POINTS} points"))
        })?;

    Ok((0..=steps)
        .map(|i| var.min + var.step * Decimal::from(i))
        .collect())
}

/// All three curves for a property.
pub fn sensitivity_curves(
    params: &PropertyParameters,
    assumptions: &Assumptions,
) -> ReInvestResult<SensitivityCurves> {
    validate_parameters(params)?;
    validate_assumptions(assumptions)?;
    curves_for(&BaseCase::new(params, assumptions)?)
}

/// A single curve for a property.
pub fn sweep(
    axis: SensitivityAxis,
    params: &PropertyParameters,
    assumptions: &Assumptions,
) -> ReInvestResult<Vec<SensitivityPoint>> {
    validate_parameters(params)?;
    validate_assumptions(assumptions)?;
    sweep_axis(axis, &BaseCase::new(params, assumptions)?)
}

pub(crate) fn curves_for(base: &BaseCase<'_>) -> ReInvestResult<SensitivityCurves> {
    Ok(SensitivityCurves {
        exit_cap_rate: sweep_axis(SensitivityAxis::ExitCapRate, base)?,
        vacancy_rate: sweep_axis(SensitivityAxis::VacancyRate, base)?,
        interest_rate: sweep_axis(SensitivityAxis::InterestRate, base)?,
    })
}

fn sweep_axis(axis: SensitivityAxis, base: &BaseCase<'_>) -> ReInvestResult<Vec<SensitivityPoint>> {
    sweep_values(&axis.variable())?
        .into_iter()
        .map(|value| {
            let flows = flows_at(axis, value, base)?;
            let irr = time_value::solve_irr(&flows, DEFAULT_IRR_GUESS)?;
            Ok(SensitivityPoint {
                value,
                label: axis.label(value),
                irr_pct: irr.rate().map(|r| to_pct(r, 2)),
            })
        })
        .collect()
}

/// Equity cash flows with one input replaced, recomputing only what depends on it.
fn flows_at(axis: SensitivityAxis, value: Rate, base: &BaseCase<'_>) -> ReInvestResult<Vec<Money>> {
    let params = base.params;
    let total_equity = base.financing.total_equity;

    let (fcf, exit) = match axis {
        SensitivityAxis::ExitCapRate => {
            let exit = exit_sale(
                base.statement.noi,
                value,
                base.remaining_loan,
                params.price,
                base.assumptions,
            )?;
            (base.fcf, exit)
        }
        SensitivityAxis::VacancyRate => {
            let noi = operating_statement(params, base.assumptions, value)?.noi;
            let exit = exit_sale(
                noi,
                params.exit_cap_rate,
                base.remaining_loan,
                params.price,
                base.assumptions,
            )?;
            (checked(noi.checked_sub(base.annual_debt), "free cash flow")?, exit)
        }
        SensitivityAxis::InterestRate => {
            let loan = base.financing.loan_amount;
            let monthly = amortization::monthly_payment(loan, value, params.loan_years)?;
            let annual_debt = checked(monthly.checked_mul(dec!(12)), "annual debt service")?;
            let remaining =
                amortization::remaining_balance(loan, value, params.loan_years, params.hold_years)?;
            let exit = exit_sale(
                base.statement.noi,
                params.exit_cap_rate,
                remaining,
                params.price,
                base.assumptions,
            )?;
            (
                checked(base.statement.noi.checked_sub(annual_debt), "free cash flow")?,
                exit,
            )
        }
    };

    equity_cash_flows(total_equity, fcf, exit.proceeds, params.hold_years)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn income_property() -> PropertyParameters {
        PropertyParameters {
            area: dec!(400),
            ..PropertyParameters::default()
        }
    }

    #[test]
    fn test_sweep_point_counts() {
        let counts: Vec<usize> = SensitivityAxis::ALL
            .iter()
            .map(|axis| sweep_values(&axis.variable()).unwrap().len())
            .collect();
        assert_eq!(counts, vec![16, 15, 15]);
    }

    #[test]
    fn test_sweep_values_exact_bounds() {
        let values = sweep_values(&SensitivityAxis::InterestRate.variable()).unwrap();
        assert_eq!(values[0], dec!(0.005));
        assert_eq!(values[1], dec!(0.0075));
        assert_eq!(*values.last().unwrap(), dec!(0.040));
    }

    #[test]
    fn test_every_axis_ends_exactly_on_its_max() {
        for axis in SensitivityAxis::ALL {
            let var = axis.variable();
            let values = sweep_values(&var).unwrap();
            assert_eq!(values[0], var.min);
            assert_eq!(*values.last().unwrap(), var.max, "{axis:?}");
            for pair in values.windows(2) {
                assert_eq!(pair[1] - pair[0], var.step);
            }
        }
    }

    #[test]
    fn test_partial_step_range_rejected() {
        let var = SensitivityVariable {
            name: "exit_cap_rate".into(),
            min: dec!(0.025),
            max: dec!(0.100),
            step: dec!(0.004),
        };
        assert!(matches!(
            sweep_values(&var),
            Err(ReInvestError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_oversized_sweep_rejected() {
        let var = SensitivityVariable {
            name: "vacancy_rate".into(),
            min: dec!(0),
            max: dec!(1),
            step: dec!(0.0000001),
        };
        assert!(sweep_values(&var).is_err());
    }

    #[test]
    fn test_out_of_range_assumptions_rejected() {
        let assumptions = Assumptions {
            management_fee_rate: dec!(5),
            transfer_tax_rate: dec!(-3),
            ..Assumptions::default()
        };
        assert!(matches!(
            sensitivity_curves(&income_property(), &assumptions),
            Err(ReInvestError::InvalidParameter { .. })
        ));
        assert!(matches!(
            sweep(SensitivityAxis::VacancyRate, &income_property(), &assumptions),
            Err(ReInvestError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_invalid_step() {
        let var = SensitivityVariable {
            name: "bad".into(),
            min: dec!(0),
            max: dec!(1),
            step: dec!(0),
        };
        assert!(sweep_values(&var).is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(SensitivityAxis::ExitCapRate.label(dec!(0.025)), "2.5%");
        assert_eq!(SensitivityAxis::ExitCapRate.label(dec!(0.100)), "10.0%");
        assert_eq!(SensitivityAxis::VacancyRate.label(dec!(0)), "0.0%");
        assert_eq!(SensitivityAxis::InterestRate.label(dec!(0.0075)), "0.75%");
    }

    #[test]
    fn test_exit_cap_curve_is_decreasing() {
        let curve = sweep(
            SensitivityAxis::ExitCapRate,
            &income_property(),
            &Assumptions::default(),
        )
        .unwrap();
        let irrs: Vec<Decimal> = curve.iter().map(|p| p.irr_pct.unwrap()).collect();
        for pair in irrs.windows(2) {
            assert!(pair[0] > pair[1], "IRR should fall as exit cap rises: {irrs:?}");
        }
    }

    #[test]
    fn test_curve_passes_through_base_case() {
        let params = income_property();
        let base_irr = crate::real_estate::valuation::calculate(&params)
            .unwrap()
            .irr
            .rate()
            .unwrap();
        let curves = sensitivity_curves(&params, &Assumptions::default()).unwrap();

        let expected = Some(to_pct(base_irr, 2));
        let at = |axis: SensitivityAxis, value: Decimal| {
            curves
                .curve(axis)
                .iter()
                .find(|p| p.value == value)
                .and_then(|p| p.irr_pct)
        };
        assert_eq!(at(SensitivityAxis::ExitCapRate, dec!(0.05)), expected);
        assert_eq!(at(SensitivityAxis::VacancyRate, dec!(0.05)), expected);
        assert_eq!(at(SensitivityAxis::InterestRate, dec!(0.015)), expected);
    }

    #[test]
    fn test_loss_making_property_reports_null_points() {
        let curves =
            sensitivity_curves(&PropertyParameters::default(), &Assumptions::default()).unwrap();
        assert!(curves.unconverged_points() > 0);
        assert_eq!(curves.exit_cap_rate.len(), 16);
    }
}
