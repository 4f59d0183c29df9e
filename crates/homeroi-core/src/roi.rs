use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::amortization::{mortgage_amortization, AmortizationSchedule};
use crate::error::HomeRoiError;
use crate::formulas::checked;
use crate::params::{LoanParameters, PmiPolicy, PMI_EQUITY_THRESHOLD};
use crate::property_tax::{property_tax_projection, MonthlyTaxSchedule, TaxProjection};
use crate::types::{column_of, Money, Month, Rate, TableRow, PAYMENTS_PER_YEAR};
use crate::HomeRoiResult;

/// Below this exponent `exp(x)` is smaller than the finest Decimal step, so
/// the growth factor is taken as zero instead of asking for an exponential
/// that cannot be represented.
const MIN_EXP_ARGUMENT: Decimal = dec!(-60);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Cash flows and position of the home purchase at the end of one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiRow {
    pub month: Month,
    /// Outstanding loan balance (0 once the loan is repaid)
    pub balance: Money,
    pub mortgage_payment: Money,
    /// Cumulative principal repaid
    pub principal_paid: Money,
    /// Cumulative loan interest paid
    pub interest_paid: Money,
    pub appraisal_value: Money,
    pub monthly_tax: Money,
    pub pmi: Money,
    /// Mortgage + tax + PMI for this month
    pub total_monthly_payment: Money,
    pub tax_paid: Money,
    pub pmi_paid: Money,
    /// Everything paid to date, including down payment and closing costs
    pub total_paid: Money,
    /// Appraisal value less outstanding balance
    pub equity: Money,
    /// Annualized return of equity over total paid (0 at month 0)
    pub cagr: Rate,
}

impl TableRow for RoiRow {
    fn value(&self, column: &str) -> Option<Decimal> {
        let v = match column {
            "month" => Decimal::from(self.month),
            "balance" => self.balance,
            "mortgage_payment" => self.mortgage_payment,
            "principal_paid" => self.principal_paid,
            "interest_paid" => self.interest_paid,
            "appraisal_value" => self.appraisal_value,
            "monthly_tax" => self.monthly_tax,
            "pmi" => self.pmi,
            "total_monthly_payment" => self.total_monthly_payment,
            "tax_paid" => self.tax_paid,
            "pmi_paid" => self.pmi_paid,
            "total_paid" => self.total_paid,
            "equity" => self.equity,
            "cagr" => self.cagr,
            _ => return None,
        };
        Some(v)
    }
}

/// Monthly return-on-investment table, months `0..=(term + extend)*12`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiTimeline {
    pub parameters: LoanParameters,
    pub rows: Vec<RoiRow>,
}

impl RoiTimeline {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, month: Month) -> Option<&RoiRow> {
        self.rows.get(month as usize)
    }

    pub fn final_row(&self) -> Option<&RoiRow> {
        self.rows.last()
    }

    /// Annualized return at the end of the projection.
    pub fn final_cagr(&self) -> Rate {
        self.final_row().map(|r| r.cagr).unwrap_or_default()
    }

    /// First month whose annualized return exceeds `threshold`.
    pub fn crossover_month(&self, threshold: Rate) -> Option<Month> {
        self.rows.iter().find(|r| r.cagr > threshold).map(|r| r.month)
    }

    /// Number of months in which PMI is charged.
    pub fn pmi_months(&self) -> usize {
        self.rows.iter().filter(|r| !r.pmi.is_zero()).count()
    }

    pub fn column(&self, name: &str) -> Option<Vec<Decimal>> {
        column_of(&self.rows, name)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Annualized return implied by `equity / total_paid` after `month` months:
/// `exp(ln(equity / total_paid) / (month / 12)) - 1`, and 0 at month 0.
///
/// A non-positive ratio has no real annualized return and is reported as
/// [`HomeRoiError::NumericDomain`]. A return too large for a Decimal is
/// [`HomeRoiError::Overflow`].
pub fn annualized_return(equity: Money, total_paid: Money, month: Month) -> HomeRoiResult<Rate> {
    if month == 0 {
        return Ok(Decimal::ZERO);
    }
    if total_paid.is_zero() {
        return Err(HomeRoiError::DivisionByZero {
            context: format!("annualized return at month {month} with nothing paid"),
        });
    }

    let context = format!("annualized return at month {month}");
    let ratio = checked(equity.checked_div(total_paid), &context)?;
    if ratio <= Decimal::ZERO {
        return Err(HomeRoiError::NumericDomain {
            month,
            ratio,
            scenario: format!("equity {equity}, total paid {total_paid}"),
        });
    }

    let years = Decimal::from(month) / Decimal::from(PAYMENTS_PER_YEAR);
    let exponent = checked(
        ratio.checked_ln().and_then(|ln| ln.checked_div(years)),
        &context,
    )?;
    if exponent < MIN_EXP_ARGUMENT {
        return Ok(-Decimal::ONE);
    }
    let factor = checked(exponent.checked_exp(), &context)?;

    Ok(factor - Decimal::ONE)
}

/// Compose the amortization schedule and tax projection of `params` into the
/// monthly return-on-investment timeline.
pub fn return_on_investment(params: &LoanParameters) -> HomeRoiResult<RoiTimeline> {
    params.validate()?;

    let tax = property_tax_projection(
        params.home_value,
        params.property_tax_rate,
        params.projection_years(),
        params.appraisal_growth_rate,
    )?;
    let schedule = mortgage_amortization(
        params.principal(),
        params.down_payment,
        params.loan_apr,
        params.loan_term_years,
    )?;

    compose(params, &schedule, &tax)
}

/// Outer-join a mortgage schedule with a tax projection on the month index
/// and derive PMI, running totals, equity and annualized return.
pub fn compose(
    params: &LoanParameters,
    schedule: &AmortizationSchedule,
    tax: &TaxProjection,
) -> HomeRoiResult<RoiTimeline> {
    let monthly_tax = tax.to_monthly();
    let merged = outer_join(schedule, &monthly_tax);

    let origin_balance = schedule.principal;
    let origin_appraisal = merged.first().map(|m| m.appraisal_value).unwrap_or_default();
    let closing_costs = checked(params.closing_rate.checked_mul(origin_balance), "closing costs")?;
    let periods = Decimal::from(PAYMENTS_PER_YEAR);
    let charge_pmi = params.requires_pmi();

    let mut rows = Vec::with_capacity(merged.len());
    let mut tax_paid = Decimal::ZERO;
    let mut pmi_paid = Decimal::ZERO;
    let mut payments = Decimal::ZERO;

    let context = "running totals";
    for m in merged {
        let loan_equity = checked(params.down_payment.checked_add(m.principal_paid), context)?;
        let pmi = if !charge_pmi {
            Decimal::ZERO
        } else {
            match params.pmi_policy {
                PmiPolicy::FreezeAtOrigin => {
                    if loan_equity < origin_appraisal * PMI_EQUITY_THRESHOLD {
                        origin_balance * params.pmi_rate / periods
                    } else {
                        Decimal::ZERO
                    }
                }
                PmiPolicy::RecomputeMonthly => {
                    if loan_equity < m.appraisal_value * PMI_EQUITY_THRESHOLD {
                        m.balance * params.pmi_rate / periods
                    } else {
                        Decimal::ZERO
                    }
                }
            }
        };

        let total_monthly_payment = checked(
            m.mortgage_payment
                .checked_add(m.monthly_tax)
                .and_then(|v| v.checked_add(pmi)),
            context,
        )?;
        tax_paid = checked(tax_paid.checked_add(m.monthly_tax), context)?;
        pmi_paid = checked(pmi_paid.checked_add(pmi), context)?;
        payments = checked(payments.checked_add(total_monthly_payment), context)?;

        let total_paid = checked(
            payments
                .checked_add(params.down_payment)
                .and_then(|v| v.checked_add(closing_costs)),
            context,
        )?;
        let equity = checked(m.appraisal_value.checked_sub(m.balance), context)?;
        let cagr = annualized_return(equity, total_paid, m.month).map_err(|e| match e {
            HomeRoiError::NumericDomain { month, ratio, .. } => HomeRoiError::NumericDomain {
                month,
                ratio,
                scenario: params.to_string(),
            },
            other => other,
        })?;

        rows.push(RoiRow {
            month: m.month,
            balance: m.balance,
            mortgage_payment: m.mortgage_payment,
            principal_paid: m.principal_paid,
            interest_paid: m.interest_paid,
            appraisal_value: m.appraisal_value,
            monthly_tax: m.monthly_tax,
            pmi,
            total_monthly_payment,
            tax_paid,
            pmi_paid,
            total_paid,
            equity,
            cagr,
        });
    }

    tracing::debug!(
        months = rows.len(),
        pmi_months = rows.iter().filter(|r| !r.pmi.is_zero()).count(),
        final_cagr = %rows.last().map(|r| r.cagr).unwrap_or_default(),
        "composed return on investment timeline"
    );

    Ok(RoiTimeline {
        parameters: params.clone(),
        rows,
    })
}

// ---------------------------------------------------------------------------
// Merge helpers
// ---------------------------------------------------------------------------

struct MergedMonth {
    month: Month,
    balance: Money,
    mortgage_payment: Money,
    principal_paid: Money,
    interest_paid: Money,
    appraisal_value: Money,
    monthly_tax: Money,
}

/// Outer join on month. Cumulative principal and interest carry forward past
/// the end of the loan; every other missing value is zero.
fn outer_join(schedule: &AmortizationSchedule, tax: &MonthlyTaxSchedule) -> Vec<MergedMonth> {
    let last_month = schedule
        .final_month()
        .max(tax.rows.last().map(|r| r.month).unwrap_or(0));

    let mut principal_paid = Decimal::ZERO;
    let mut interest_paid = Decimal::ZERO;
    let mut merged = Vec::with_capacity(last_month as usize + 1);

    for month in 0..=last_month {
        let loan = schedule.row(month);
        if let Some(l) = loan {
            principal_paid = l.principal_paid;
            interest_paid = l.interest_paid;
        }
        let levy = tax.row(month);

        merged.push(MergedMonth {
            month,
            balance: loan.map(|l| l.balance).unwrap_or_default(),
            mortgage_payment: loan.map(|l| l.payment).unwrap_or_default(),
            principal_paid,
            interest_paid,
            appraisal_value: levy.map(|t| t.appraisal_value).unwrap_or_default(),
            monthly_tax: levy.map(|t| t.monthly_tax).unwrap_or_default(),
        });
    }

    merged
}
