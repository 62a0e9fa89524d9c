use re_invest_core::time_value::{
    npv, solve_irr, IrrSolution, NonConvergenceReason, DEFAULT_IRR_GUESS,
};
use re_invest_core::ReInvestError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// NPV / IRR duality
// ===========================================================================

#[test]
fn test_npv_at_irr_is_zero() {
    let flows = vec![
        dec!(-37000000),
        dec!(8288990.23),
        dec!(8288990.23),
        dec!(8288990.23),
        dec!(157232448.56),
    ];
    let rate = solve_irr(&flows, DEFAULT_IRR_GUESS)
        .unwrap()
        .into_rate()
        .unwrap();
    let residual = npv(rate, &flows).unwrap();
    assert!(residual.abs() < dec!(1), "NPV at IRR = {residual}");
}

#[test]
fn test_irr_round_trip_from_known_rate() {
    // Build flows whose IRR is exactly 7%: -1000 then 70/yr and 1070 at the end
    let mut flows = vec![dec!(-1000)];
    flows.extend(std::iter::repeat(dec!(70)).take(9));
    flows.push(dec!(1070));
    let rate = solve_irr(&flows, DEFAULT_IRR_GUESS)
        .unwrap()
        .into_rate()
        .unwrap();
    assert!((rate - dec!(0.07)).abs() < dec!(0.0000001), "got {rate}");
}

#[test]
fn test_irr_independent_of_guess_for_conventional_flows() {
    let flows = vec![dec!(-500), dec!(100), dec!(200), dec!(300)];
    let a = solve_irr(&flows, dec!(0.01)).unwrap().rate().unwrap();
    let b = solve_irr(&flows, dec!(0.5)).unwrap().rate().unwrap();
    assert!((a - b).abs() < dec!(0.0000001));
}

#[test]
fn test_npv_decreasing_in_rate_for_conventional_flows() {
    let flows = vec![dec!(-100), dec!(30), dec!(30), dec!(30), dec!(30)];
    let low = npv(dec!(0.02), &flows).unwrap();
    let high = npv(dec!(0.12), &flows).unwrap();
    assert!(low > high);
}

// ===========================================================================
// Non-convergence
// ===========================================================================

#[test]
fn test_all_positive_flows_have_no_irr() {
    let solution = solve_irr(&[dec!(100), dec!(10)], DEFAULT_IRR_GUESS).unwrap();
    match solution {
        IrrSolution::NotConverged { reason, iterations, .. } => {
            assert_eq!(reason, NonConvergenceReason::NoSignChange);
            assert_eq!(iterations, 0);
        }
        other => panic!("expected NotConverged, got {other:?}"),
    }
}

#[test]
fn test_all_zero_flows_have_no_irr() {
    let solution = solve_irr(&[Decimal::ZERO; 4], DEFAULT_IRR_GUESS).unwrap();
    assert!(!solution.is_converged());
}

#[test]
fn test_strict_view_returns_non_convergence_error() {
    let err = solve_irr(&[dec!(-10), dec!(-10)], DEFAULT_IRR_GUESS)
        .unwrap()
        .into_rate()
        .unwrap_err();
    assert!(matches!(err, ReInvestError::NonConvergence { .. }));
    assert!(err.to_string().contains("never change sign"));
}

#[test]
fn test_guess_at_minus_one_rejected() {
    assert!(matches!(
        solve_irr(&[dec!(-100), dec!(110)], dec!(-1)),
        Err(ReInvestError::InvalidParameter { .. })
    ));
}
