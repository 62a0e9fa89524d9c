use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ReInvestError;
use crate::types::{Money, Rate};
use crate::ReInvestResult;

/// Starting point for Newton-Raphson when the caller has no better estimate.
pub const DEFAULT_IRR_GUESS: Rate = dec!(0.10);

const IRR_TOLERANCE: Decimal = dec!(0.000000001);
const MAX_IRR_ITERATIONS: u32 = 300;
const DERIVATIVE_FLOOR: Decimal = dec!(0.000000000000000001);
const RATE_FLOOR: Rate = dec!(-0.99);

/// Why the IRR iteration stopped without meeting the tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonConvergenceReason {
    /// 300 Newton steps without |r_new - r_old| < 1e-9
    IterationLimit,
    /// dNPV/dr vanished, no next iterate exists
    FlatDerivative,
    /// Every cash flow has the same sign, so NPV has no real root
    NoSignChange,
    /// Iterate ran below -99% or the discount factors overflowed
    Diverged,
}

/// Outcome of the IRR root-finder.
///
/// A non-converged outcome still carries the last iterate so callers can
/// decide whether a borderline estimate is usable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IrrSolution {
    Converged {
        rate: Rate,
        iterations: u32,
    },
    NotConverged {
        last_rate: Rate,
        last_step: Decimal,
        iterations: u32,
        reason: NonConvergenceReason,
    },
}

impl IrrSolution {
    /// The rate, only when the solver converged.
    pub fn rate(&self) -> Option<Rate> {
        match self {
            IrrSolution::Converged { rate, .. } => Some(*rate),
            IrrSolution::NotConverged { .. } => None,
        }
    }

    /// The last computed iterate regardless of convergence.
    pub fn last_rate(&self) -> Rate {
        match self {
            IrrSolution::Converged { rate, .. } => *rate,
            IrrSolution::NotConverged { last_rate, .. } => *last_rate,
        }
    }

    pub fn iterations(&self) -> u32 {
        match self {
            IrrSolution::Converged { iterations, .. }
            | IrrSolution::NotConverged { iterations, .. } => *iterations,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, IrrSolution::Converged { .. })
    }

    /// Strict view: a non-converged outcome becomes `NonConvergence`.
    pub fn into_rate(self) -> ReInvestResult<Rate> {
        match self {
            IrrSolution::Converged { rate, .. } => Ok(rate),
            IrrSolution::NotConverged {
                last_step,
                iterations,
                reason,
                ..
            } => Err(ReInvestError::NonConvergence {
                function: format!("IRR ({})", reason.describe()),
                iterations,
                last_delta: last_step,
            }),
        }
    }
}

impl NonConvergenceReason {
    pub fn describe(&self) -> &'static str {
        match self {
            NonConvergenceReason::IterationLimit => "iteration limit reached",
            NonConvergenceReason::FlatDerivative => "derivative is zero",
            NonConvergenceReason::NoSignChange => "cash flows never change sign",
            NonConvergenceReason::Diverged => "iterate diverged",
        }
    }
}

/// Net Present Value of a series of cash flows, period 0 undiscounted.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> ReInvestResult<Money> {
    if rate <= dec!(-1) {
        return Err(ReInvestError::invalid(
            "rate",
            "Discount rate must be greater than -100%",
        ));
    }

    npv_with_derivative(rate, cash_flows)
        .map(|(value, _)| value)
        .ok_or_else(|| ReInvestError::DivisionByZero {
            context: format!("NPV discount factors at rate {rate}"),
        })
}

/// Internal Rate of Return using Newton-Raphson.
///
/// `cash_flows[0]` is conventionally the (negative) outlay. Multi-sign-flip
/// sequences converge to whichever root the guess basin leads to.
pub fn solve_irr(cash_flows: &[Money], guess: Rate) -> ReInvestResult<IrrSolution> {
    if cash_flows.len() < 2 {
        return Err(ReInvestError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }
    if guess <= dec!(-1) {
        return Err(ReInvestError::invalid(
            "guess",
            "Initial IRR guess must be greater than -100%",
        ));
    }

    if !has_sign_change(cash_flows) {
        debug!(periods = cash_flows.len(), "IRR skipped: no sign change");
        return Ok(not_converged(
            guess,
            Decimal::ZERO,
            0,
            NonConvergenceReason::NoSignChange,
        ));
    }

    let mut rate = guess;
    let mut last_step = Decimal::ZERO;

    for i in 0..MAX_IRR_ITERATIONS {
        let Some((value, slope)) = npv_with_derivative(rate, cash_flows) else {
            return Ok(not_converged(rate, last_step, i, NonConvergenceReason::Diverged));
        };

        if slope.abs() < DERIVATIVE_FLOOR {
            return Ok(not_converged(
                rate,
                last_step,
                i,
                NonConvergenceReason::FlatDerivative,
            ));
        }

        let Some(next) = value
            .checked_div(slope)
            .and_then(|step| rate.checked_sub(step))
        else {
            return Ok(not_converged(rate, last_step, i, NonConvergenceReason::Diverged));
        };

        // Guard against divergence through -100%
        if next < RATE_FLOOR {
            if rate == RATE_FLOOR {
                return Ok(not_converged(
                    rate,
                    last_step,
                    i + 1,
                    NonConvergenceReason::Diverged,
                ));
            }
            last_step = RATE_FLOOR - rate;
            rate = RATE_FLOOR;
            continue;
        }

        last_step = next - rate;
        if last_step.abs() < IRR_TOLERANCE {
            debug!(iterations = i + 1, rate = %next, "IRR converged");
            return Ok(IrrSolution::Converged {
                rate: next,
                iterations: i + 1,
            });
        }
        rate = next;
    }

    Ok(not_converged(
        rate,
        last_step,
        MAX_IRR_ITERATIONS,
        NonConvergenceReason::IterationLimit,
    ))
}

fn not_converged(
    last_rate: Rate,
    last_step: Decimal,
    iterations: u32,
    reason: NonConvergenceReason,
) -> IrrSolution {
    debug!(iterations, last_rate = %last_rate, reason = reason.describe(), "IRR did not converge");
    IrrSolution::NotConverged {
        last_rate,
        last_step,
        iterations,
        reason,
    }
}

fn has_sign_change(cash_flows: &[Money]) -> bool {
    let any_positive = cash_flows.iter().any(|cf| *cf > Decimal::ZERO);
    let any_negative = cash_flows.iter().any(|cf| *cf < Decimal::ZERO);
    any_positive && any_negative
}

/// NPV(r) = sum CF_t / (1+r)^t and its derivative d(NPV)/dr.
/// `None` when a discount factor leaves the decimal range.
fn npv_with_derivative(rate: Rate, cash_flows: &[Money]) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    let mut value = Decimal::ZERO;
    let mut slope = Decimal::ZERO;
    let mut discount = Decimal::ONE; // (1+r)^-t

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_div(one_plus_r)?;
            // d/dr of CF_t / (1+r)^t = -t * CF_t / (1+r)^(t+1)
            let term = Decimal::from(t as u64)
                .checked_mul(*cf)?
                .checked_mul(discount)?
                .checked_div(one_plus_r)?;
            slope = slope.checked_sub(term)?;
        }
        value = value.checked_add(cf.checked_mul(discount)?)?;
    }

    Some((value, slope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_npv_basic() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        // -1000 + 300/1.1 + 400/1.21 + 500/1.331 ≈ -21.04
        assert!((result - dec!(-21.04)).abs() < dec!(0.01));
    }

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        assert_eq!(npv(dec!(0.0), &cfs).unwrap(), dec!(50));
    }

    #[test]
    fn test_npv_rejects_rate_at_minus_one() {
        assert!(npv(dec!(-1), &[dec!(-100), dec!(110)]).is_err());
    }

    #[test]
    fn test_irr_single_period() {
        let solution = solve_irr(&[dec!(-100), dec!(110)], DEFAULT_IRR_GUESS).unwrap();
        assert!(solution.is_converged());
        let rate = solution.rate().unwrap();
        assert!((rate - dec!(0.10)).abs() < dec!(0.000001), "got {rate}");
    }

    #[test]
    fn test_irr_level_annuity() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let rate = solve_irr(&cfs, DEFAULT_IRR_GUESS).unwrap().into_rate().unwrap();
        // IRR ≈ 9.70%
        assert!((rate - dec!(0.0970)).abs() < dec!(0.0001), "got {rate}");
    }

    #[test]
    fn test_irr_negative_root() {
        // Lose 20% over one period
        let rate = solve_irr(&[dec!(-100), dec!(80)], DEFAULT_IRR_GUESS)
            .unwrap()
            .into_rate()
            .unwrap();
        assert!((rate - dec!(-0.20)).abs() < dec!(0.000001), "got {rate}");
    }

    #[test]
    fn test_irr_all_negative_reports_no_sign_change() {
        let cfs = vec![dec!(-100), dec!(-10), dec!(-10)];
        let solution = solve_irr(&cfs, DEFAULT_IRR_GUESS).unwrap();
        assert_eq!(
            solution,
            IrrSolution::NotConverged {
                last_rate: DEFAULT_IRR_GUESS,
                last_step: Decimal::ZERO,
                iterations: 0,
                reason: NonConvergenceReason::NoSignChange,
            }
        );
        assert!(solution.rate().is_none());
        assert!(matches!(
            solution.into_rate(),
            Err(ReInvestError::NonConvergence { .. })
        ));
    }

    #[test]
    fn test_irr_requires_two_flows() {
        assert!(matches!(
            solve_irr(&[dec!(-100)], DEFAULT_IRR_GUESS),
            Err(ReInvestError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_irr_zero_outlay_later_flows_positive() {
        // Leading zero is neither sign; the sequence still flips once.
        let cfs = vec![dec!(0), dec!(-100), dec!(121)];
        let rate = solve_irr(&cfs, DEFAULT_IRR_GUESS).unwrap().into_rate().unwrap();
        assert!((rate - dec!(0.21)).abs() < dec!(0.000001), "got {rate}");
    }

    #[test]
    fn test_solution_serializes_with_status_tag() {
        let json = serde_json::to_value(IrrSolution::Converged {
            rate: dec!(0.1),
            iterations: 4,
        })
        .unwrap();
        assert_eq!(json["status"], "converged");
        assert_eq!(json["iterations"], 4);
    }
}
