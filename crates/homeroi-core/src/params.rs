use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::HomeRoiError;
use crate::types::{Money, Rate, PAYMENTS_PER_YEAR};
use crate::HomeRoiResult;

/// Equity share below which a lender charges PMI.
pub const PMI_EQUITY_THRESHOLD: Rate = dec!(0.2);

/// Longest loan term, and longest post-payoff extension, accepted in years.
pub const MAX_YEARS: u32 = 100;

/// How PMI is applied when the down payment is below the equity threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PmiPolicy {
    /// Mask and premium fixed against the month-0 appraisal and balance.
    #[default]
    FreezeAtOrigin,
    /// Mask and premium re-evaluated every month against that month's
    /// appraisal and outstanding balance.
    RecomputeMonthly,
}

/// Purchase and loan assumptions for one home-ownership scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanParameters {
    /// Appraised value of the home at purchase
    pub home_value: Money,
    /// Cash down payment
    pub down_payment: Money,
    /// Annual loan interest rate (e.g. 0.033 = 3.3%)
    pub loan_apr: Rate,
    /// Loan term in years
    pub loan_term_years: u32,
    /// Loan payments per year. Only monthly schedules are supported.
    #[serde(default = "default_payments_per_year")]
    pub payments_per_year: u32,
    /// Annual property tax as a fraction of appraised value
    pub property_tax_rate: Rate,
    /// Annual PMI premium as a fraction of the loan balance
    pub pmi_rate: Rate,
    /// Annual appreciation of the appraised value
    pub appraisal_growth_rate: Rate,
    /// One-time closing cost as a fraction of the loan amount
    pub closing_rate: Rate,
    /// Years to keep projecting tax and appreciation after the loan is paid off
    #[serde(default)]
    pub extend_years: u32,
    #[serde(default)]
    pub pmi_policy: PmiPolicy,
}

fn default_payments_per_year() -> u32 {
    PAYMENTS_PER_YEAR
}

impl Default for LoanParameters {
    fn default() -> Self {
        LoanParameters {
            home_value: dec!(350_000),
            down_payment: dec!(50_000),
            loan_apr: dec!(0.033),
            loan_term_years: 15,
            payments_per_year: PAYMENTS_PER_YEAR,
            property_tax_rate: dec!(0.02),
            pmi_rate: dec!(0.015),
            appraisal_growth_rate: dec!(0.08),
            closing_rate: dec!(0.034),
            extend_years: 0,
            pmi_policy: PmiPolicy::FreezeAtOrigin,
        }
    }
}

impl fmt::Display for LoanParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "home value {}, down payment {}, {} years at {} APR, tax {}, PMI {}, growth {}, closing {}, extend {} years",
            self.home_value,
            self.down_payment,
            self.loan_term_years,
            self.loan_apr,
            self.property_tax_rate,
            self.pmi_rate,
            self.appraisal_growth_rate,
            self.closing_rate,
            self.extend_years,
        )
    }
}

impl LoanParameters {
    /// Loan amount: home value less the down payment.
    pub fn principal(&self) -> Money {
        self.home_value - self.down_payment
    }

    /// Total number of monthly loan payments.
    pub fn total_payments(&self) -> u32 {
        self.loan_term_years.saturating_mul(self.payments_per_year)
    }

    /// Years covered by the tax and appreciation projection.
    pub fn projection_years(&self) -> u32 {
        self.loan_term_years.saturating_add(self.extend_years)
    }

    /// Whether the down payment is below the lender's equity threshold.
    pub fn requires_pmi(&self) -> bool {
        self.down_payment < self.home_value * PMI_EQUITY_THRESHOLD
    }

    /// Interpret every rate field as a percentage (3.3 = 3.3%) and convert it
    /// to a fraction. This is the only path that accepts percentages.
    pub fn rates_from_percent(mut self) -> Self {
        let hundred = dec!(100);
        self.loan_apr /= hundred;
        self.property_tax_rate /= hundred;
        self.pmi_rate /= hundred;
        self.appraisal_growth_rate /= hundred;
        self.closing_rate /= hundred;
        self
    }

    /// Reject parameter sets the engine cannot evaluate.
    pub fn validate(&self) -> HomeRoiResult<()> {
        if self.home_value <= Decimal::ZERO {
            return Err(HomeRoiError::InvalidInput {
                field: "home_value".into(),
                reason: "Home value must be positive".into(),
            });
        }
        if self.down_payment < Decimal::ZERO {
            return Err(HomeRoiError::InvalidInput {
                field: "down_payment".into(),
                reason: "Down payment cannot be negative".into(),
            });
        }
        if self.down_payment >= self.home_value {
            return Err(HomeRoiError::InvalidInput {
                field: "down_payment".into(),
                reason: format!(
                    "Down payment {} must be less than home value {}",
                    self.down_payment, self.home_value
                ),
            });
        }
        if self.loan_term_years == 0 {
            return Err(HomeRoiError::InvalidInput {
                field: "loan_term_years".into(),
                reason: "Loan term must be > 0".into(),
            });
        }
        validate_years("loan_term_years", self.loan_term_years)?;
        validate_years("extend_years", self.extend_years)?;
        if self.payments_per_year != PAYMENTS_PER_YEAR {
            return Err(HomeRoiError::InvalidInput {
                field: "payments_per_year".into(),
                reason: format!("Only monthly schedules ({PAYMENTS_PER_YEAR}) are supported"),
            });
        }

        for (field, rate) in [
            ("loan_apr", self.loan_apr),
            ("property_tax_rate", self.property_tax_rate),
            ("pmi_rate", self.pmi_rate),
            ("appraisal_growth_rate", self.appraisal_growth_rate),
            ("closing_rate", self.closing_rate),
        ] {
            validate_rate(field, rate)?;
        }

        Ok(())
    }
}

/// Year counts are capped at [`MAX_YEARS`].
pub fn validate_years(field: &str, years: u32) -> HomeRoiResult<()> {
    if years > MAX_YEARS {
        return Err(HomeRoiError::InvalidInput {
            field: field.into(),
            reason: format!("{years} years exceeds the maximum of {MAX_YEARS}"),
        });
    }
    Ok(())
}

/// Rates are fractions in `[0, 1)`. A value of 1 or more is almost certainly
/// a percentage and is rejected rather than reinterpreted.
pub fn validate_rate(field: &str, rate: Rate) -> HomeRoiResult<()> {
    if rate < Decimal::ZERO {
        return Err(HomeRoiError::InvalidInput {
            field: field.into(),
            reason: "Rate cannot be negative".into(),
        });
    }
    if rate >= Decimal::ONE {
        return Err(HomeRoiError::InvalidInput {
            field: field.into(),
            reason: format!(
                "Rate {rate} must be a fraction (0.033 for 3.3%); use the percent input path for percentages"
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_are_valid() {
        let p = LoanParameters::default();
        p.validate().unwrap();
        assert_eq!(p.principal(), dec!(300_000));
        assert_eq!(p.total_payments(), 180);
        assert!(p.requires_pmi());
    }

    #[test]
    fn test_down_payment_not_below_home_value_rejected() {
        let p = LoanParameters {
            down_payment: dec!(350_000),
            ..Default::default()
        };
        let err = p.validate().unwrap_err();
        assert!(matches!(err, HomeRoiError::InvalidInput { ref field, .. } if field == "down_payment"));
    }

    #[test]
    fn test_zero_term_rejected() {
        let p = LoanParameters {
            loan_term_years: 0,
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_year_counts_are_bounded() {
        let p = LoanParameters {
            loan_term_years: 400_000_000,
            ..Default::default()
        };
        let err = p.validate().unwrap_err();
        assert!(matches!(err, HomeRoiError::InvalidInput { ref field, .. } if field == "loan_term_years"));

        let p = LoanParameters {
            extend_years: MAX_YEARS + 1,
            ..Default::default()
        };
        let err = p.validate().unwrap_err();
        assert!(matches!(err, HomeRoiError::InvalidInput { ref field, .. } if field == "extend_years"));

        let p = LoanParameters {
            loan_term_years: MAX_YEARS,
            extend_years: MAX_YEARS,
            ..Default::default()
        };
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_negative_rate_rejected() {
        let p = LoanParameters {
            appraisal_growth_rate: dec!(-0.01),
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_percentage_rate_rejected_not_reinterpreted() {
        let p = LoanParameters {
            loan_apr: dec!(3.3),
            ..Default::default()
        };
        let err = p.validate().unwrap_err();
        assert!(matches!(err, HomeRoiError::InvalidInput { ref field, .. } if field == "loan_apr"));
    }

    #[test]
    fn test_rates_from_percent() {
        let p = LoanParameters {
            loan_apr: dec!(3.3),
            property_tax_rate: dec!(2),
            pmi_rate: dec!(1.5),
            appraisal_growth_rate: dec!(8),
            closing_rate: dec!(3.4),
            ..Default::default()
        }
        .rates_from_percent();
        assert_eq!(p, LoanParameters::default());
    }

    #[test]
    fn test_non_monthly_payments_rejected() {
        let p = LoanParameters {
            payments_per_year: 26,
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_pmi_threshold() {
        let p = LoanParameters {
            home_value: dec!(400_000),
            down_payment: dec!(80_000),
            ..Default::default()
        };
        // Exactly 20% does not require PMI
        assert!(!p.requires_pmi());
    }
}
