use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::amortization::{self, MAX_LOAN_YEARS};
use crate::error::ReInvestError;
use crate::real_estate::sensitivity::{self, SensitivityCurves};
use crate::time_value::{self, IrrSolution, DEFAULT_IRR_GUESS};
use crate::types::{with_metadata, ComputationOutput, Money, Multiple, Rate};
use crate::ReInvestResult;

/// Longest holding period accepted, in years.
pub const MAX_HOLD_YEARS: u32 = 100;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Property and financing inputs for one calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyParameters {
    /// Acquisition price
    pub price: Money,
    /// Leasable floor area in square metres
    pub area: Decimal,
    /// Monthly rent per square metre
    pub rent_per_sqm: Money,
    /// Expected vacancy as a fraction of gross rent, in [0, 1)
    pub vacancy_rate: Rate,
    /// Total operating-expense ratio applied to effective rent
    /// (includes the management fee)
    pub opex_ratio: Rate,
    /// Loan-to-value
    pub ltv: Rate,
    /// Nominal annual loan rate, compounded monthly
    pub interest_rate: Rate,
    /// Loan term in years
    pub loan_years: u32,
    /// Investment horizon in years
    pub hold_years: u32,
    /// Capitalisation rate assumed at sale
    pub exit_cap_rate: Rate,
}

impl Default for PropertyParameters {
    /// A ¥100M, 80 m² unit financed at 70% LTV: the dashboard's starting property.
    fn default() -> Self {
        PropertyParameters {
            price: dec!(100000000),
            area: dec!(80),
            rent_per_sqm: dec!(3500),
            vacancy_rate: dec!(0.05),
            opex_ratio: dec!(0.20),
            ltv: dec!(0.70),
            interest_rate: dec!(0.015),
            loan_years: 30,
            hold_years: 10,
            exit_cap_rate: dec!(0.05),
        }
    }
}

/// Fixed-percentage cost and tax assumptions. Defaults reflect Japanese
/// residential practice; override per jurisdiction or scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Assumptions {
    /// Property-management fee, share of effective rent
    pub management_fee_rate: Rate,
    /// Repair reserve, share of price per year
    pub repair_reserve_rate: Rate,
    /// Property tax, share of assessed value per year
    pub property_tax_rate: Rate,
    /// Assessed (tax) value as a share of price
    pub assessed_value_ratio: Rate,
    /// Insurance premium, share of price per year
    pub insurance_rate: Rate,
    /// Brokerage, registration and acquisition taxes, share of price
    pub acquisition_cost_rate: Rate,
    /// Capital-gains tax on positive appreciation at exit
    pub transfer_tax_rate: Rate,
}

impl Default for Assumptions {
    fn default() -> Self {
        Assumptions {
            management_fee_rate: dec!(0.05),
            repair_reserve_rate: dec!(0.005),
            property_tax_rate: dec!(0.014),
            assessed_value_ratio: dec!(0.70),
            insurance_rate: dec!(0.001),
            acquisition_cost_rate: dec!(0.07),
            transfer_tax_rate: dec!(0.20),
        }
    }
}

/// Input envelope: the property plus the assumption set to value it under.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValuationInput {
    pub parameters: PropertyParameters,
    #[serde(default)]
    pub assumptions: Assumptions,
}

/// Headline IRR band shown next to the return figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrrGrade {
    /// IRR >= 8%
    Excellent,
    /// IRR >= 5%
    Good,
    /// IRR >= 2%
    Marginal,
    /// Below 2%, or no IRR could be found
    Poor,
}

/// Debt-service headroom band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DscrAssessment {
    /// DSCR >= 1.30
    Safe,
    /// 1.00 <= DSCR < 1.30
    Caution,
    /// DSCR < 1.00: NOI does not cover debt service
    Reconsider,
    /// No debt, DSCR undefined
    Unlevered,
}

/// One row of the hold-period projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyRow {
    pub year: u32,
    pub noi: Money,
    pub debt_service: Money,
    pub fcf: Money,
    pub interest: Money,
    pub principal: Money,
    pub remaining_balance: Money,
    /// Running total of FCF, starting from -total_equity
    pub cumulative_fcf: Money,
}

/// Complete single-property result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationResult {
    // Income
    pub gross_rent: Money,
    pub effective_rent: Money,
    /// Gross rent / price
    pub gross_yield: Rate,
    // Expenses
    pub management_fee: Money,
    pub repair_reserve: Money,
    pub property_tax: Money,
    pub insurance: Money,
    pub other_opex: Money,
    pub total_opex: Money,
    pub noi: Money,
    pub cap_rate: Rate,
    // Financing
    pub loan_amount: Money,
    pub equity: Money,
    pub acquisition_cost: Money,
    pub total_equity: Money,
    pub monthly_payment: Money,
    pub annual_debt: Money,
    /// NOI / annual debt service; absent for an all-equity purchase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dscr: Option<Decimal>,
    pub fcf: Money,
    // Exit
    pub exit_price: Money,
    pub remaining_loan: Money,
    pub transfer_tax: Money,
    pub exit_proceeds: Money,
    // Returns
    pub irr: IrrSolution,
    pub equity_multiple: Multiple,
    /// Equity cash flows: index 0 = -total_equity, last = FCF + exit proceeds
    pub cash_flows: Vec<Money>,
    pub irr_grade: IrrGrade,
    pub dscr_assessment: DscrAssessment,
    pub yearly_data: Vec<YearlyRow>,
    pub sensitivity: SensitivityCurves,
}

// ---------------------------------------------------------------------------
// Building blocks shared with the sensitivity sweep
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) struct OperatingStatement {
    pub gross_rent: Money,
    pub effective_rent: Money,
    pub management_fee: Money,
    pub repair_reserve: Money,
    pub property_tax: Money,
    pub insurance: Money,
    pub other_opex: Money,
    pub total_opex: Money,
    pub noi: Money,
}

#[derive(Debug, Clone)]
pub(crate) struct Financing {
    pub loan_amount: Money,
    pub equity: Money,
    pub acquisition_cost: Money,
    pub total_equity: Money,
}

#[derive(Debug, Clone)]
pub(crate) struct ExitSale {
    pub exit_price: Money,
    pub transfer_tax: Money,
    pub proceeds: Money,
}

/// Everything derived from the base inputs before returns are computed.
#[derive(Debug, Clone)]
pub(crate) struct BaseCase<'a> {
    pub params: &'a PropertyParameters,
    pub assumptions: &'a Assumptions,
    pub statement: OperatingStatement,
    pub financing: Financing,
    pub monthly_payment: Money,
    pub annual_debt: Money,
    pub fcf: Money,
    pub remaining_loan: Money,
    pub exit: ExitSale,
}

impl<'a> BaseCase<'a> {
    pub(crate) fn new(
        params: &'a PropertyParameters,
        assumptions: &'a Assumptions,
    ) -> ReInvestResult<Self> {
        let statement = operating_statement(params, assumptions, params.vacancy_rate)?;
        let financing = financing(params, assumptions)?;

        let monthly_payment =
            amortization::monthly_payment(financing.loan_amount, params.interest_rate, params.loan_years)?;
        let annual_debt = checked(monthly_payment.checked_mul(dec!(12)), "annual debt service")?;
        let fcf = checked(statement.noi.checked_sub(annual_debt), "free cash flow")?;

        let remaining_loan = amortization::remaining_balance(
            financing.loan_amount,
            params.interest_rate,
            params.loan_years,
            params.hold_years,
        )?;
        let exit = exit_sale(
            statement.noi,
            params.exit_cap_rate,
            remaining_loan,
            params.price,
            assumptions,
        )?;

        Ok(BaseCase {
            params,
            assumptions,
            statement,
            financing,
            monthly_payment,
            annual_debt,
            fcf,
            remaining_loan,
            exit,
        })
    }
}

/// Turn a `checked_*` result into an overflow error naming the quantity.
pub(crate) fn checked(value: Option<Decimal>, context: &str) -> ReInvestResult<Decimal> {
    value.ok_or_else(|| ReInvestError::overflow(context))
}

/// Rent and expense lines at a given vacancy rate.
pub(crate) fn operating_statement(
    params: &PropertyParameters,
    assumptions: &Assumptions,
    vacancy_rate: Rate,
) -> ReInvestResult<OperatingStatement> {
    let gross_rent = checked(
        params
            .rent_per_sqm
            .checked_mul(params.area)
            .and_then(|monthly| monthly.checked_mul(dec!(12))),
        "gross rent",
    )?;
    let effective_rent = gross_rent * (Decimal::ONE - vacancy_rate);

    let management_fee = effective_rent * assumptions.management_fee_rate;
    let repair_reserve = params.price * assumptions.repair_reserve_rate;
    let property_tax = params.price * assumptions.assessed_value_ratio * assumptions.property_tax_rate;
    let insurance = params.price * assumptions.insurance_rate;
    let other_opex =
        effective_rent * (params.opex_ratio - assumptions.management_fee_rate).max(Decimal::ZERO);

    let total_opex = checked(
        [repair_reserve, property_tax, insurance, other_opex]
            .iter()
            .try_fold(management_fee, |acc, line| acc.checked_add(*line)),
        "total operating expenses",
    )?;
    let noi = effective_rent - total_opex;

    Ok(OperatingStatement {
        gross_rent,
        effective_rent,
        management_fee,
        repair_reserve,
        property_tax,
        insurance,
        other_opex,
        total_opex,
        noi,
    })
}

pub(crate) fn financing(
    params: &PropertyParameters,
    assumptions: &Assumptions,
) -> ReInvestResult<Financing> {
    let loan_amount = params.price * params.ltv;
    let equity = params.price * (Decimal::ONE - params.ltv);
    let acquisition_cost = params.price * assumptions.acquisition_cost_rate;

    Ok(Financing {
        loan_amount,
        equity,
        acquisition_cost,
        total_equity: checked(equity.checked_add(acquisition_cost), "total equity")?,
    })
}

/// Sale at `noi / exit_cap_rate`.
///
/// The exit capitalises the entry-year NOI: the model holds NOI flat over
/// the hold period, so no terminal-year projection is made.
pub(crate) fn exit_sale(
    noi: Money,
    exit_cap_rate: Rate,
    remaining_loan: Money,
    price: Money,
    assumptions: &Assumptions,
) -> ReInvestResult<ExitSale> {
    let exit_price = checked(noi.checked_div(exit_cap_rate), "exit price (noi / exit cap rate)")?;
    let gain = checked(exit_price.checked_sub(price), "capital gain at exit")?;
    let transfer_tax = gain.max(Decimal::ZERO) * assumptions.transfer_tax_rate;
    let proceeds = checked(
        exit_price
            .checked_sub(remaining_loan)
            .and_then(|p| p.checked_sub(transfer_tax)),
        "exit proceeds",
    )?;

    Ok(ExitSale {
        exit_price,
        transfer_tax,
        proceeds,
    })
}

/// [-total_equity, fcf, ..., fcf + exit_proceeds] over `hold_years` periods.
pub(crate) fn equity_cash_flows(
    total_equity: Money,
    fcf: Money,
    exit_proceeds: Money,
    hold_years: u32,
) -> ReInvestResult<Vec<Money>> {
    let final_year = checked(fcf.checked_add(exit_proceeds), "final-year cash flow")?;
    let mut flows = Vec::with_capacity(hold_years.min(MAX_HOLD_YEARS) as usize + 1);
    flows.push(-total_equity);
    for year in 1..=hold_years {
        flows.push(if year < hold_years { fcf } else { final_year });
    }
    Ok(flows)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Value a property under the default assumption set.
pub fn calculate(params: &PropertyParameters) -> ReInvestResult<ValuationResult> {
    calculate_with(params, &Assumptions::default())
}

/// Value a property: operating statement, financing, exit, IRR, equity
/// multiple, yearly projection and the three sensitivity curves.
///
/// Pure: the result depends only on `params` and `assumptions`.
pub fn calculate_with(
    params: &PropertyParameters,
    assumptions: &Assumptions,
) -> ReInvestResult<ValuationResult> {
    validate_parameters(params)?;
    validate_assumptions(assumptions)?;

    debug!(price = %params.price, hold_years = params.hold_years, "valuing property");

    let base = BaseCase::new(params, assumptions)?;
    let st = &base.statement;
    let fin = &base.financing;

    if fin.total_equity.is_zero() {
        return Err(ReInvestError::DivisionByZero {
            context: "equity multiple (total equity is zero)".into(),
        });
    }

    let dscr = if base.annual_debt.is_zero() {
        None
    } else {
        Some(checked(st.noi.checked_div(base.annual_debt), "DSCR")?)
    };

    let cash_flows =
        equity_cash_flows(fin.total_equity, base.fcf, base.exit.proceeds, params.hold_years)?;
    let irr = time_value::solve_irr(&cash_flows, DEFAULT_IRR_GUESS)?;

    let distributions = checked(
        cash_flows
            .iter()
            .skip(1)
            .try_fold(Decimal::ZERO, |acc, cf| acc.checked_add(*cf)),
        "sum of distributions",
    )?;
    let equity_multiple = checked(
        distributions
            .checked_add(fin.total_equity)
            .and_then(|returned| returned.checked_div(fin.total_equity)),
        "equity multiple",
    )?;
    let gross_yield = checked(st.gross_rent.checked_div(params.price), "gross yield")?;
    let cap_rate = checked(st.noi.checked_div(params.price), "cap rate")?;

    let yearly_data = build_yearly_data(&base)?;
    let sensitivity = sensitivity::curves_for(&base)?;

    Ok(ValuationResult {
        gross_rent: st.gross_rent,
        effective_rent: st.effective_rent,
        gross_yield,
        management_fee: st.management_fee,
        repair_reserve: st.repair_reserve,
        property_tax: st.property_tax,
        insurance: st.insurance,
        other_opex: st.other_opex,
        total_opex: st.total_opex,
        noi: st.noi,
        cap_rate,
        loan_amount: fin.loan_amount,
        equity: fin.equity,
        acquisition_cost: fin.acquisition_cost,
        total_equity: fin.total_equity,
        monthly_payment: base.monthly_payment,
        annual_debt: base.annual_debt,
        dscr,
        fcf: base.fcf,
        exit_price: base.exit.exit_price,
        remaining_loan: base.remaining_loan,
        transfer_tax: base.exit.transfer_tax,
        exit_proceeds: base.exit.proceeds,
        irr_grade: grade_irr(irr.rate()),
        dscr_assessment: assess_dscr(dscr),
        irr,
        equity_multiple,
        cash_flows,
        yearly_data,
        sensitivity,
    })
}

/// Value a property and wrap the result in the standard output envelope,
/// with warnings for unusual inputs and results.
pub fn value_property(
    input: &ValuationInput,
) -> ReInvestResult<ComputationOutput<ValuationResult>> {
    let start = Instant::now();

    let result = calculate_with(&input.parameters, &input.assumptions)?;
    let warnings = collect_warnings(&input.parameters, &input.assumptions, &result);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Leveraged Real Estate Investment Analysis (flat NOI, direct-cap exit)",
        &input.assumptions,
        warnings,
        elapsed,
        result,
    ))
}

/// Classify an IRR into the dashboard's headline band.
pub fn grade_irr(irr: Option<Rate>) -> IrrGrade {
    match irr {
        Some(r) if r >= dec!(0.08) => IrrGrade::Excellent,
        Some(r) if r >= dec!(0.05) => IrrGrade::Good,
        Some(r) if r >= dec!(0.02) => IrrGrade::Marginal,
        _ => IrrGrade::Poor,
    }
}

pub fn assess_dscr(dscr: Option<Decimal>) -> DscrAssessment {
    match dscr {
        None => DscrAssessment::Unlevered,
        Some(d) if d >= dec!(1.3) => DscrAssessment::Safe,
        Some(d) if d >= Decimal::ONE => DscrAssessment::Caution,
        Some(_) => DscrAssessment::Reconsider,
    }
}

// ---------------------------------------------------------------------------
// Yearly projection
// ---------------------------------------------------------------------------

fn build_yearly_data(base: &BaseCase<'_>) -> ReInvestResult<Vec<YearlyRow>> {
    let months = amortization::schedule(
        base.financing.loan_amount,
        base.params.interest_rate,
        base.params.loan_years,
    )?;
    let years = amortization::annual_summary(&months, base.params.hold_years);

    let mut cumulative_fcf = -base.financing.total_equity;
    let mut rows = Vec::with_capacity(years.len());
    for year in years {
        cumulative_fcf = checked(cumulative_fcf.checked_add(base.fcf), "cumulative FCF")?;
        rows.push(YearlyRow {
            year: year.year,
            noi: base.statement.noi,
            debt_service: base.annual_debt,
            fcf: base.fcf,
            interest: year.interest,
            principal: year.principal,
            remaining_balance: year.closing_balance,
            cumulative_fcf,
        });
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub(crate) fn validate_parameters(params: &PropertyParameters) -> ReInvestResult<()> {
    if params.price <= Decimal::ZERO {
        return Err(ReInvestError::invalid("price", "Price must be positive"));
    }
    if params.area <= Decimal::ZERO {
        return Err(ReInvestError::invalid("area", "Area must be positive"));
    }
    if params.rent_per_sqm < Decimal::ZERO {
        return Err(ReInvestError::invalid(
            "rent_per_sqm",
            "Rent per square metre cannot be negative",
        ));
    }
    if params.vacancy_rate < Decimal::ZERO || params.vacancy_rate >= Decimal::ONE {
        return Err(ReInvestError::invalid(
            "vacancy_rate",
            "Vacancy rate must be between 0 and 1 (exclusive upper)",
        ));
    }
    check_unit_ratio("opex_ratio", params.opex_ratio)?;
    check_unit_ratio("ltv", params.ltv)?;
    check_unit_ratio("interest_rate", params.interest_rate)?;
    if params.loan_years == 0 || params.loan_years > MAX_LOAN_YEARS {
        return Err(ReInvestError::invalid(
            "loan_years",
            format!("Loan term must be between 1 and {MAX_LOAN_YEARS} years"),
        ));
    }
    if params.hold_years == 0 || params.hold_years > MAX_HOLD_YEARS {
        return Err(ReInvestError::invalid(
            "hold_years",
            format!("Holding period must be between 1 and {MAX_HOLD_YEARS} years"),
        ));
    }
    if params.exit_cap_rate <= Decimal::ZERO || params.exit_cap_rate > Decimal::ONE {
        return Err(ReInvestError::invalid(
            "exit_cap_rate",
            "Exit cap rate must be in (0, 1]",
        ));
    }
    Ok(())
}

pub(crate) fn validate_assumptions(assumptions: &Assumptions) -> ReInvestResult<()> {
    check_unit_ratio("management_fee_rate", assumptions.management_fee_rate)?;
    check_unit_ratio("repair_reserve_rate", assumptions.repair_reserve_rate)?;
    check_unit_ratio("property_tax_rate", assumptions.property_tax_rate)?;
    check_unit_ratio("assessed_value_ratio", assumptions.assessed_value_ratio)?;
    check_unit_ratio("insurance_rate", assumptions.insurance_rate)?;
    check_unit_ratio("acquisition_cost_rate", assumptions.acquisition_cost_rate)?;
    check_unit_ratio("transfer_tax_rate", assumptions.transfer_tax_rate)
}

fn check_unit_ratio(field: &str, value: Rate) -> ReInvestResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(ReInvestError::invalid(field, "Must be between 0 and 1"));
    }
    Ok(())
}

fn collect_warnings(
    params: &PropertyParameters,
    assumptions: &Assumptions,
    result: &ValuationResult,
) -> Vec<String> {
    let mut warnings = Vec::new();

    if params.opex_ratio < assumptions.management_fee_rate {
        warnings.push(format!(
            "Opex ratio {:.1}% is below the {:.1}% management fee; other opex floored at zero",
            params.opex_ratio * dec!(100),
            assumptions.management_fee_rate * dec!(100)
        ));
    }

    if params.hold_years > params.loan_years {
        warnings.push(format!(
            "Hold period of {} years exceeds the {}-year loan term; loan is fully repaid before exit",
            params.hold_years, params.loan_years
        ));
    }

    if params.vacancy_rate > dec!(0.15) {
        warnings.push(format!(
            "Vacancy rate {:.1}% exceeds 15%, above typical market norms",
            params.vacancy_rate * dec!(100)
        ));
    }

    if params.exit_cap_rate < dec!(0.03) {
        warnings.push(format!(
            "Exit cap rate {:.2}% is below 3%; exit value is highly sensitive to it",
            params.exit_cap_rate * dec!(100)
        ));
    }
    if params.exit_cap_rate > dec!(0.12) {
        warnings.push(format!(
            "Exit cap rate {:.2}% exceeds 12%, unusually high",
            params.exit_cap_rate * dec!(100)
        ));
    }

    if let Some(dscr) = result.dscr {
        if dscr < dec!(1.2) {
            warnings.push(format!(
                "DSCR of {dscr:.2} is below 1.20x: thin debt-service headroom"
            ));
        }
    }

    if result.fcf < Decimal::ZERO {
        warnings.push(format!(
            "Annual FCF is negative ({:.0}); the investor funds a shortfall every year",
            result.fcf
        ));
    }

    if let IrrSolution::NotConverged { reason, last_rate, .. } = result.irr {
        warn!(reason = reason.describe(), "IRR unavailable");
        warnings.push(format!(
            "IRR unavailable: {} (last estimate {:.4})",
            reason.describe(),
            last_rate
        ));
    }

    let unconverged = result.sensitivity.unconverged_points();
    if unconverged > 0 {
        warnings.push(format!(
            "{unconverged} sensitivity point(s) have no IRR and are reported as null"
        ));
    }

    warnings
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
