//! Fixed-payment (fully amortising, monthly compounding) loan mechanics.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ReInvestError;
use crate::types::{Money, Rate};
use crate::ReInvestResult;

const MONTHS_PER_YEAR: u32 = 12;

/// One monthly instalment of an amortisation schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationPeriod {
    /// 1-based month number
    pub period: u32,
    pub payment: Money,
    pub interest: Money,
    pub principal: Money,
    /// Outstanding balance after this payment
    pub balance: Money,
}

/// Twelve instalments rolled into one loan year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualAmortization {
    pub year: u32,
    pub interest: Money,
    pub principal: Money,
    pub closing_balance: Money,
}

/// Longest loan term accepted, in years.
pub const MAX_LOAN_YEARS: u32 = 100;

/// Standard fixed-rate mortgage payment: P * r(1+r)^n / ((1+r)^n - 1)
///
/// With a zero rate the loan is repaid straight-line: P / (years * 12).
pub fn monthly_payment(principal: Money, annual_rate: Rate, years: u32) -> ReInvestResult<Money> {
    validate_loan(principal, annual_rate, years)?;

    let total_months = years * MONTHS_PER_YEAR;
    if annual_rate.is_zero() {
        return Ok(principal / Decimal::from(total_months));
    }

    let monthly_rate = annual_rate / dec!(12);
    let compound = compound_factor(monthly_rate, total_months)?;
    let denominator = compound - Decimal::ONE;

    if denominator.is_zero() {
        return Err(ReInvestError::DivisionByZero {
            context: "mortgage payment denominator".into(),
        });
    }

    // (1+r)^n / ((1+r)^n - 1) stays near 1, so divide before scaling by P
    compound
        .checked_div(denominator)
        .and_then(|annuity| annuity.checked_mul(monthly_rate))
        .and_then(|per_unit| per_unit.checked_mul(principal))
        .ok_or_else(|| ReInvestError::overflow("mortgage payment"))
}

/// Outstanding balance after `elapsed_years * 12` payments.
///
/// Closed form P * ((1+r)^n - (1+r)^m) / ((1+r)^n - 1); straight-line
/// P * (1 - elapsed/total) at a zero rate. A loan held past its term is
/// fully retired.
pub fn remaining_balance(
    principal: Money,
    annual_rate: Rate,
    total_years: u32,
    elapsed_years: u32,
) -> ReInvestResult<Money> {
    validate_loan(principal, annual_rate, total_years)?;

    if elapsed_years >= total_years {
        return Ok(Decimal::ZERO);
    }

    if annual_rate.is_zero() {
        return Ok(principal
            * (Decimal::ONE - Decimal::from(elapsed_years) / Decimal::from(total_years)));
    }

    let monthly_rate = annual_rate / dec!(12);
    let full_term = compound_factor(monthly_rate, total_years * MONTHS_PER_YEAR)?;
    let elapsed = compound_factor(monthly_rate, elapsed_years * MONTHS_PER_YEAR)?;
    let denominator = full_term - Decimal::ONE;

    if denominator.is_zero() {
        return Err(ReInvestError::DivisionByZero {
            context: "remaining balance denominator".into(),
        });
    }

    (full_term - elapsed)
        .checked_div(denominator)
        .and_then(|share| share.checked_mul(principal))
        .ok_or_else(|| ReInvestError::overflow("remaining balance"))
}

/// Month-by-month schedule splitting each payment into interest and principal.
pub fn schedule(
    principal: Money,
    annual_rate: Rate,
    years: u32,
) -> ReInvestResult<Vec<AmortizationPeriod>> {
    let payment = monthly_payment(principal, annual_rate, years)?;
    let monthly_rate = annual_rate / dec!(12);
    let total_months = years * MONTHS_PER_YEAR;

    let mut balance = principal;
    let mut periods = Vec::with_capacity(total_months as usize);
    for period in 1..=total_months {
        let interest = balance * monthly_rate;
        let principal_part = payment - interest;
        balance -= principal_part;
        periods.push(AmortizationPeriod {
            period,
            payment,
            interest,
            principal: principal_part,
            balance,
        });
    }

    Ok(periods)
}

/// Roll a monthly schedule up into `years` annual rows.
///
/// Years past the end of the schedule carry no interest or principal and
/// hold the final balance.
pub fn annual_summary(periods: &[AmortizationPeriod], years: u32) -> Vec<AnnualAmortization> {
    let mut rows = Vec::with_capacity(years.min(MAX_LOAN_YEARS) as usize);
    let mut closing_balance = periods.last().map_or(Decimal::ZERO, |p| p.balance);
    let mut chunks = periods.chunks(MONTHS_PER_YEAR as usize);

    for year in 1..=years {
        match chunks.next() {
            Some(months) => {
                closing_balance = months.last().map_or(closing_balance, |p| p.balance);
                rows.push(AnnualAmortization {
                    year,
                    interest: months.iter().map(|p| p.interest).sum(),
                    principal: months.iter().map(|p| p.principal).sum(),
                    closing_balance,
                });
            }
            None => rows.push(AnnualAmortization {
                year,
                interest: Decimal::ZERO,
                principal: Decimal::ZERO,
                closing_balance,
            }),
        }
    }

    rows
}

/// (1 + r)^n via iterative multiplication
fn compound_factor(periodic_rate: Rate, periods: u32) -> ReInvestResult<Decimal> {
    let growth = Decimal::ONE + periodic_rate;
    let mut compound = Decimal::ONE;
    for _ in 0..periods {
        compound = compound
            .checked_mul(growth)
            .ok_or_else(|| ReInvestError::overflow(format!("(1 + {periodic_rate})^{periods}")))?;
    }
    Ok(compound)
}

fn validate_loan(principal: Money, annual_rate: Rate, years: u32) -> ReInvestResult<()> {
    if years == 0 || years > MAX_LOAN_YEARS {
        return Err(ReInvestError::invalid(
            "years",
            format!("Loan term must be between 1 and {MAX_LOAN_YEARS} years"),
        ));
    }
    if principal < Decimal::ZERO {
        return Err(ReInvestError::invalid(
            "principal",
            "Loan principal cannot be negative",
        ));
    }
    if annual_rate < Decimal::ZERO {
        return Err(ReInvestError::invalid(
            "annual_rate",
            "Interest rate cannot be negative",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_monthly_payment_sanity() {
        // 750k at 6.5% over 30 years ≈ 4,740.51
        let pmt = monthly_payment(dec!(750000), dec!(0.065), 30).unwrap();
        assert!((pmt - dec!(4740.51)).abs() < dec!(0.01), "got {pmt}");
    }

    #[test]
    fn test_zero_rate_payment_is_straight_line() {
        let pmt = monthly_payment(dec!(1200000), Decimal::ZERO, 10).unwrap();
        assert_eq!(pmt, dec!(10000));
    }

    #[test]
    fn test_zero_year_loan_rejected() {
        assert!(monthly_payment(dec!(1000), dec!(0.05), 0).is_err());
        assert!(remaining_balance(dec!(1000), dec!(0.05), 0, 0).is_err());
    }

    #[test]
    fn test_term_beyond_limit_rejected() {
        assert!(matches!(
            monthly_payment(dec!(1000), dec!(0.05), MAX_LOAN_YEARS + 1),
            Err(ReInvestError::InvalidParameter { .. })
        ));
        assert!(schedule(dec!(1000), dec!(0.05), u32::MAX).is_err());
        assert!(monthly_payment(dec!(1000), dec!(0.05), MAX_LOAN_YEARS).is_ok());
    }

    #[test]
    fn test_compounding_overflow_is_an_error() {
        // (1 + 1/12)^1200 is far beyond the decimal range
        assert!(matches!(
            monthly_payment(dec!(70000000), Decimal::ONE, 100),
            Err(ReInvestError::Overflow { .. })
        ));
        assert!(matches!(
            remaining_balance(dec!(70000000), Decimal::ONE, 100, 10),
            Err(ReInvestError::Overflow { .. })
        ));
    }

    #[test]
    fn test_negative_rate_rejected() {
        assert!(monthly_payment(dec!(1000), dec!(-0.01), 10).is_err());
    }

    #[test]
    fn test_remaining_balance_endpoints() {
        let p = dec!(70000000);
        assert_eq!(remaining_balance(p, dec!(0.015), 30, 0).unwrap(), p);
        assert_eq!(remaining_balance(p, dec!(0.015), 30, 30).unwrap(), Decimal::ZERO);
        assert_eq!(remaining_balance(p, dec!(0.015), 30, 35).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_remaining_balance_matches_schedule() {
        let periods = schedule(dec!(70000000), dec!(0.015), 30).unwrap();
        let closed_form = remaining_balance(dec!(70000000), dec!(0.015), 30, 10).unwrap();
        let simulated = periods[119].balance;
        assert!(
            (closed_form - simulated).abs() < dec!(0.000001),
            "closed form {closed_form} vs simulated {simulated}"
        );
    }

    #[test]
    fn test_schedule_first_period_split() {
        let periods = schedule(dec!(120000), dec!(0.12), 1).unwrap();
        assert_eq!(periods.len(), 12);
        // 1% monthly on 120k
        assert_eq!(periods[0].interest, dec!(1200));
        assert_eq!(periods[0].principal, periods[0].payment - dec!(1200));
    }

    #[test]
    fn test_annual_summary_beyond_term() {
        let periods = schedule(dec!(120000), dec!(0.06), 2).unwrap();
        let rows = annual_summary(&periods, 3);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].interest, Decimal::ZERO);
        assert_eq!(rows[2].principal, Decimal::ZERO);
        assert!(rows[2].closing_balance.abs() < dec!(0.000001));
        let repaid: Decimal = rows.iter().map(|r| r.principal).sum();
        assert!((repaid - dec!(120000)).abs() < dec!(0.000001));
    }
}
