use re_invest_core::amortization::{annual_summary, monthly_payment, remaining_balance, schedule};
use re_invest_core::ReInvestError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Payment
// ===========================================================================

#[test]
fn test_payment_for_default_property_loan() {
    // 70M at 1.5% over 30 years
    let pmt = monthly_payment(dec!(70000000), dec!(0.015), 30).unwrap();
    assert!(
        (pmt - dec!(241584.1473)).abs() < dec!(0.001),
        "Expected monthly payment ~241,584.15, got {pmt}"
    );
}

#[test]
fn test_payment_scales_linearly_with_principal() {
    let one = monthly_payment(dec!(1000000), dec!(0.03), 20).unwrap();
    let three = monthly_payment(dec!(3000000), dec!(0.03), 20).unwrap();
    assert!((three - one * dec!(3)).abs() < dec!(0.000001));
}

#[test]
fn test_higher_rate_means_higher_payment() {
    let low = monthly_payment(dec!(1000000), dec!(0.01), 25).unwrap();
    let high = monthly_payment(dec!(1000000), dec!(0.04), 25).unwrap();
    assert!(high > low);
}

#[test]
fn test_zero_rate_identities_are_exact() {
    let p = dec!(36000000);
    assert_eq!(monthly_payment(p, Decimal::ZERO, 30).unwrap(), dec!(100000));
    assert_eq!(remaining_balance(p, Decimal::ZERO, 30, 10).unwrap(), dec!(24000000));
    assert_eq!(remaining_balance(p, Decimal::ZERO, 30, 30).unwrap(), Decimal::ZERO);
}

#[test]
fn test_zero_principal_loan() {
    assert_eq!(monthly_payment(Decimal::ZERO, dec!(0.02), 10).unwrap(), Decimal::ZERO);
    assert_eq!(
        remaining_balance(Decimal::ZERO, dec!(0.02), 10, 5).unwrap(),
        Decimal::ZERO
    );
}

#[test]
fn test_invalid_loans_rejected() {
    assert!(matches!(
        monthly_payment(dec!(-1), dec!(0.02), 10),
        Err(ReInvestError::InvalidParameter { .. })
    ));
    assert!(matches!(
        schedule(dec!(1000), dec!(0.02), 0),
        Err(ReInvestError::InvalidParameter { .. })
    ));
}

// ===========================================================================
// Balance and schedule
// ===========================================================================

#[test]
fn test_remaining_balance_after_ten_years() {
    let remaining = remaining_balance(dec!(70000000), dec!(0.015), 30, 10).unwrap();
    assert!(
        (remaining - dec!(50064541.67)).abs() < dec!(0.01),
        "Expected ~50,064,541.67, got {remaining}"
    );
}

#[test]
fn test_remaining_balance_decreases_each_year() {
    let balances: Vec<Decimal> = (0..=30)
        .map(|y| remaining_balance(dec!(70000000), dec!(0.015), 30, y).unwrap())
        .collect();
    for pair in balances.windows(2) {
        assert!(pair[1] < pair[0]);
    }
}

#[test]
fn test_schedule_principal_sums_to_loan() {
    let principal = dec!(70000000);
    let periods = schedule(principal, dec!(0.015), 30).unwrap();
    assert_eq!(periods.len(), 360);

    let repaid: Decimal = periods.iter().map(|p| p.principal).sum();
    let relative = ((repaid - principal) / principal).abs();
    assert!(relative < dec!(0.000001), "repaid {repaid} vs {principal}");
    assert!(periods[359].balance.abs() < dec!(0.01));
}

#[test]
fn test_schedule_interest_falls_principal_rises() {
    let periods = schedule(dec!(500000), dec!(0.05), 15).unwrap();
    for pair in periods.windows(2) {
        assert!(pair[1].interest < pair[0].interest);
        assert!(pair[1].principal > pair[0].principal);
        assert_eq!(pair[0].payment, pair[1].payment);
    }
}

#[test]
fn test_annual_summary_matches_closed_form_balance() {
    let periods = schedule(dec!(70000000), dec!(0.015), 30).unwrap();
    let rows = annual_summary(&periods, 10);
    assert_eq!(rows.len(), 10);
    let closed_form = remaining_balance(dec!(70000000), dec!(0.015), 30, 10).unwrap();
    assert!((rows[9].closing_balance - closed_form).abs() < dec!(0.000001));

    // Each year pays twelve instalments
    let pmt = periods[0].payment;
    for row in &rows {
        assert!((row.interest + row.principal - pmt * dec!(12)).abs() < dec!(0.000001));
    }
}
