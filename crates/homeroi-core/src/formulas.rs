use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;

use crate::error::HomeRoiError;
use crate::types::{Money, Rate};
use crate::HomeRoiResult;

/// Turn a checked Decimal operation into [`HomeRoiError::Overflow`].
pub(crate) fn checked(value: Option<Decimal>, context: &str) -> HomeRoiResult<Decimal> {
    value.ok_or_else(|| HomeRoiError::Overflow {
        context: context.to_string(),
    })
}

/// `(1 + rate)^periods`, failing instead of overflowing.
fn growth_factor(rate: Rate, periods: u32) -> HomeRoiResult<Decimal> {
    checked(
        (Decimal::ONE + rate).checked_powu(u64::from(periods)),
        "growth factor",
    )
}

/// Compound growth of `principal`: `p * (1 + r/n)^(n*t)`.
///
/// `periods` may be fractional (e.g. 7.5 years). Returns `principal`
/// unchanged when `periods` is zero.
pub fn compound_growth(
    principal: Money,
    rate: Rate,
    compounds_per_period: u32,
    periods: Decimal,
) -> HomeRoiResult<Money> {
    if compounds_per_period == 0 {
        return Err(HomeRoiError::InvalidInput {
            field: "compounds_per_period".into(),
            reason: "Must be > 0".into(),
        });
    }
    if periods.is_zero() {
        return Ok(principal);
    }

    let n = Decimal::from(compounds_per_period);
    let base = Decimal::ONE + rate / n;
    if base <= Decimal::ZERO {
        return Err(HomeRoiError::InvalidInput {
            field: "rate".into(),
            reason: "Periodic rate must be greater than -100%".into(),
        });
    }

    let factor = checked(base.checked_powd(n * periods), "compound growth factor")?;
    checked(principal.checked_mul(factor), "compound growth")
}

/// Fixed annuity payment: `L * i(1+i)^n / ((1+i)^n - 1)`.
///
/// A zero periodic rate is amortised straight-line (`L / n`). Zero periods,
/// or a denominator that vanishes for a non-zero rate, is a
/// [`HomeRoiError::DegenerateRate`].
pub fn fixed_payment(
    loan_amount: Money,
    periodic_rate: Rate,
    total_periods: u32,
) -> HomeRoiResult<Money> {
    if total_periods == 0 {
        return Err(HomeRoiError::DegenerateRate {
            context: "annuity payment over zero periods".into(),
        });
    }

    if periodic_rate.is_zero() {
        // Interest-free: straight-line amortisation
        return Ok(loan_amount / Decimal::from(total_periods));
    }

    let compound = growth_factor(periodic_rate, total_periods)?;
    let denominator = compound - Decimal::ONE;

    if denominator.is_zero() {
        return Err(HomeRoiError::DegenerateRate {
            context: format!("(1 + {periodic_rate})^{total_periods} - 1 is zero"),
        });
    }

    let numerator = checked(
        loan_amount
            .checked_mul(periodic_rate)
            .and_then(|v| v.checked_mul(compound)),
        "annuity payment",
    )?;
    checked(numerator.checked_div(denominator), "annuity payment")
}

/// Closed-form loan balance after `periods` payments of `payment`:
/// `P(1+i)^k - pmt * ((1+i)^k - 1) / i`.
pub fn remaining_balance(
    principal: Money,
    periodic_rate: Rate,
    payment: Money,
    periods: u32,
) -> HomeRoiResult<Money> {
    let context = "remaining balance";
    if periodic_rate.is_zero() {
        return checked(
            payment
                .checked_mul(Decimal::from(periods))
                .and_then(|paid| principal.checked_sub(paid)),
            context,
        );
    }

    let compound = growth_factor(periodic_rate, periods)?;
    let grown = checked(principal.checked_mul(compound), context)?;
    let repaid = checked(
        payment
            .checked_mul(compound - Decimal::ONE)
            .and_then(|v| v.checked_div(periodic_rate)),
        context,
    )?;
    checked(grown.checked_sub(repaid), context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_compound_growth_annual() {
        let result = compound_growth(dec!(100), dec!(0.1), 1, dec!(1)).unwrap();
        assert_eq!(result.round_dp(2), dec!(110.00));
    }

    #[test]
    fn test_compound_growth_fractional_periods() {
        let result = compound_growth(dec!(100), dec!(0.03875), 12, dec!(7.5)).unwrap();
        assert!((result - dec!(133.66370154434335)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_compound_growth_zero_periods_is_identity() {
        let result = compound_growth(dec!(350000), dec!(0.08), 1, Decimal::ZERO).unwrap();
        assert_eq!(result, dec!(350000));
    }

    #[test]
    fn test_compound_growth_zero_compounds_error() {
        assert!(compound_growth(dec!(100), dec!(0.1), 0, dec!(1)).is_err());
    }

    #[test]
    fn test_fixed_payment_thirty_year() {
        // 100k at 7% over 30 years of monthly payments
        let pmt = fixed_payment(dec!(100000), dec!(0.07) / dec!(12), 360).unwrap();
        assert!((pmt - dec!(665.3024951791823)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_fixed_payment_zero_rate_is_straight_line() {
        let pmt = fixed_payment(dec!(1200), Decimal::ZERO, 12).unwrap();
        assert_eq!(pmt, dec!(100));
    }

    #[test]
    fn test_fixed_payment_zero_periods_is_degenerate() {
        let err = fixed_payment(dec!(1200), dec!(0.01), 0).unwrap_err();
        assert!(matches!(err, HomeRoiError::DegenerateRate { .. }));
    }

    #[test]
    fn test_remaining_balance_at_term_is_zero() {
        let rate = dec!(0.06) / dec!(12);
        let pmt = fixed_payment(dec!(300000), rate, 360).unwrap();
        let balance = remaining_balance(dec!(300000), rate, pmt, 360).unwrap();
        assert!(balance.abs() < dec!(0.000001));
    }

    #[test]
    fn test_compound_growth_overflow_is_error() {
        let err = compound_growth(dec!(1_000_000), dec!(0.99), 1, dec!(80)).unwrap_err();
        assert!(matches!(err, HomeRoiError::Overflow { .. }));
    }

    #[test]
    fn test_fixed_payment_overflow_is_error() {
        let err = fixed_payment(Decimal::MAX, dec!(0.05), 360).unwrap_err();
        assert!(matches!(err, HomeRoiError::Overflow { .. }));
    }

    #[test]
    fn test_remaining_balance_zero_rate() {
        let balance = remaining_balance(dec!(1200), Decimal::ZERO, dec!(100), 3).unwrap();
        assert_eq!(balance, dec!(900));
    }
}
