use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::HomeRoiError;
use crate::formulas::{checked, fixed_payment};
use crate::params::{validate_rate, validate_years};
use crate::types::{column_of, Money, Month, Rate, TableRow, PAYMENTS_PER_YEAR};
use crate::HomeRoiResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Loan position at the end of one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationRow {
    pub month: Month,
    /// Outstanding loan balance after this month's payment
    pub balance: Money,
    /// Mortgage payment made this month (0 at month 0)
    pub payment: Money,
    /// Cumulative mortgage payments
    pub total_paid: Money,
    /// Cumulative principal repaid
    pub principal_paid: Money,
    /// Cumulative interest paid
    pub interest_paid: Money,
    /// Down payment plus principal repaid
    pub equity: Money,
    /// Principal portion of this month's payment
    pub payment_principal: Money,
    /// Interest portion of this month's payment
    pub payment_interest: Money,
}

impl TableRow for AmortizationRow {
    fn value(&self, column: &str) -> Option<Decimal> {
        let v = match column {
            "month" => Decimal::from(self.month),
            "balance" => self.balance,
            "payment" => self.payment,
            "total_paid" => self.total_paid,
            "principal_paid" => self.principal_paid,
            "interest_paid" => self.interest_paid,
            "equity" => self.equity,
            "payment_principal" => self.payment_principal,
            "payment_interest" => self.payment_interest,
            _ => return None,
        };
        Some(v)
    }
}

/// Month-by-month schedule of a fixed-rate loan, months `0..=term*12`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub principal: Money,
    pub down_payment: Money,
    pub apr: Rate,
    /// The constant monthly payment
    pub monthly_payment: Money,
    pub rows: Vec<AmortizationRow>,
}

impl AmortizationSchedule {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Last month of the loan.
    pub fn final_month(&self) -> Month {
        self.rows.last().map(|r| r.month).unwrap_or(0)
    }

    pub fn final_balance(&self) -> Money {
        self.rows.last().map(|r| r.balance).unwrap_or(self.principal)
    }

    /// Total interest over the life of the loan.
    pub fn total_interest(&self) -> Money {
        self.rows.last().map(|r| r.interest_paid).unwrap_or_default()
    }

    pub fn row(&self, month: Month) -> Option<&AmortizationRow> {
        self.rows.get(month as usize)
    }

    pub fn column(&self, name: &str) -> Option<Vec<Decimal>> {
        column_of(&self.rows, name)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build the amortization schedule of a fixed-rate, monthly-payment loan.
///
/// The balance follows `balance[i] = balance[i-1] * (1 + apr/12) - payment`
/// from `balance[0] = principal`. `down_payment` only offsets the reported
/// equity.
pub fn mortgage_amortization(
    principal: Money,
    down_payment: Money,
    apr: Rate,
    years: u32,
) -> HomeRoiResult<AmortizationSchedule> {
    if principal <= Decimal::ZERO {
        return Err(HomeRoiError::InvalidInput {
            field: "principal".into(),
            reason: "Loan principal must be positive".into(),
        });
    }
    if down_payment < Decimal::ZERO {
        return Err(HomeRoiError::InvalidInput {
            field: "down_payment".into(),
            reason: "Down payment cannot be negative".into(),
        });
    }
    if years == 0 {
        return Err(HomeRoiError::InvalidInput {
            field: "years".into(),
            reason: "Loan term must be > 0".into(),
        });
    }
    validate_years("years", years)?;
    validate_rate("apr", apr)?;

    let periods = years * PAYMENTS_PER_YEAR;
    let periodic_rate = apr / Decimal::from(PAYMENTS_PER_YEAR);
    let payment = fixed_payment(principal, periodic_rate, periods)?;
    let multiplier = Decimal::ONE + periodic_rate;

    let mut rows = Vec::with_capacity(periods as usize + 1);
    rows.push(AmortizationRow {
        month: 0,
        balance: principal,
        payment: Decimal::ZERO,
        total_paid: Decimal::ZERO,
        principal_paid: Decimal::ZERO,
        interest_paid: Decimal::ZERO,
        equity: down_payment,
        payment_principal: Decimal::ZERO,
        payment_interest: Decimal::ZERO,
    });

    let mut balance = principal;
    let mut total_paid = Decimal::ZERO;

    let context = "amortization schedule";
    for month in 1..=periods {
        let payment_interest = checked(balance.checked_mul(periodic_rate), context)?;
        balance = checked(
            balance
                .checked_mul(multiplier)
                .and_then(|b| b.checked_sub(payment)),
            context,
        )?;
        total_paid = checked(total_paid.checked_add(payment), context)?;

        let equity_gained = checked(principal.checked_sub(balance), context)?;
        let interest_paid = checked(total_paid.checked_sub(equity_gained), context)?;
        let principal_paid = total_paid - interest_paid;

        rows.push(AmortizationRow {
            month,
            balance,
            payment,
            total_paid,
            principal_paid,
            interest_paid,
            equity: checked(equity_gained.checked_add(down_payment), context)?,
            payment_principal: payment - payment_interest,
            payment_interest,
        });
    }

    tracing::debug!(
        %principal,
        %apr,
        years,
        %payment,
        final_balance = %balance,
        "built amortization schedule"
    );

    Ok(AmortizationSchedule {
        principal,
        down_payment,
        apr,
        monthly_payment: payment,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulas::remaining_balance;
    use rust_decimal_macros::dec;

    fn thirty_year() -> AmortizationSchedule {
        mortgage_amortization(dec!(300_000), dec!(60_000), dec!(0.06), 30).unwrap()
    }

    #[test]
    fn test_monthly_payment_thirty_year_six_percent() {
        let s = thirty_year();
        assert_eq!(s.monthly_payment.round_dp(2), dec!(1798.65));
    }

    #[test]
    fn test_schedule_shape() {
        let s = thirty_year();
        assert_eq!(s.len(), 361);
        assert_eq!(s.final_month(), 360);
        assert_eq!(s.rows[0].payment, Decimal::ZERO);
        assert_eq!(s.rows[0].balance, dec!(300_000));
        assert!(s.rows[1..].iter().all(|r| r.payment == s.monthly_payment));
    }

    #[test]
    fn test_final_balance_near_zero() {
        let s = thirty_year();
        assert!(s.final_balance().abs() < dec!(300_000) * dec!(0.000001));
    }

    #[test]
    fn test_balance_recurrence() {
        let s = thirty_year();
        let r = dec!(0.06) / dec!(12);
        for w in s.rows.windows(2) {
            let expected = w[0].balance * (Decimal::ONE + r) - s.monthly_payment;
            assert!((w[1].balance - expected).abs() < dec!(0.0000001));
            assert!(w[1].balance <= w[0].balance);
        }
    }

    #[test]
    fn test_iterative_matches_closed_form() {
        let s = thirty_year();
        let r = dec!(0.06) / dec!(12);
        for row in s.rows.iter().step_by(37) {
            let closed =
                remaining_balance(dec!(300_000), r, s.monthly_payment, row.month).unwrap();
            assert!((closed - row.balance).abs() < dec!(0.0001), "month {}", row.month);
        }
    }

    #[test]
    fn test_cumulative_columns_are_consistent() {
        let s = thirty_year();
        for row in &s.rows {
            let tol = dec!(0.0000001);
            assert!((row.principal_paid + row.interest_paid - row.total_paid).abs() < tol);
            assert!((row.equity - (dec!(360_000) - row.balance)).abs() < tol);
        }
        let last = s.rows.last().unwrap();
        assert!((last.principal_paid - dec!(300_000)).abs() < dec!(0.001));
        // 360 * 1798.65 - 300k ≈ 347.5k of interest
        assert!((s.total_interest() - dec!(347_514)).abs() < dec!(1));
    }

    #[test]
    fn test_payment_split() {
        let s = thirty_year();
        let first = &s.rows[1];
        assert_eq!(first.payment_interest, dec!(1500));
        assert_eq!(first.payment_principal + first.payment_interest, s.monthly_payment);
        // Interest share falls over time
        assert!(s.rows[300].payment_interest < first.payment_interest);
    }

    #[test]
    fn test_zero_rate_schedule() {
        let s = mortgage_amortization(dec!(120_000), dec!(0), Decimal::ZERO, 10).unwrap();
        assert_eq!(s.monthly_payment, dec!(1000));
        assert_eq!(s.final_balance(), Decimal::ZERO);
        assert_eq!(s.total_interest(), Decimal::ZERO);
    }

    #[test]
    fn test_column_access() {
        let s = thirty_year();
        let balances = s.column("balance").unwrap();
        assert_eq!(balances.len(), 361);
        assert_eq!(balances[0], dec!(300_000));
        assert!(s.column("nope").is_none());
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(mortgage_amortization(dec!(0), dec!(0), dec!(0.05), 30).is_err());
        assert!(mortgage_amortization(dec!(1000), dec!(0), dec!(0.05), 0).is_err());
        assert!(mortgage_amortization(dec!(1000), dec!(0), dec!(5), 30).is_err());
        assert!(mortgage_amortization(dec!(1000), dec!(0), dec!(0.05), 400_000_000).is_err());
    }

    #[test]
    fn test_unrepresentable_schedule_is_error() {
        let err = mortgage_amortization(Decimal::MAX, Decimal::MAX, dec!(0), 1).unwrap_err();
        assert!(matches!(err, HomeRoiError::Overflow { .. }));
    }
}
