use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::HomeRoiError;
use crate::formulas::{checked, compound_growth};
use crate::params::{validate_rate, MAX_YEARS};
use crate::types::{column_of, Money, Month, Rate, TableRow, PAYMENTS_PER_YEAR};
use crate::HomeRoiResult;

/// Appraisal and tax liability for one year of ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxYearRow {
    /// Year of ownership, starting at 1
    pub year: u32,
    pub appraisal_value: Money,
    pub annual_tax: Money,
    pub monthly_tax: Money,
}

impl TableRow for TaxYearRow {
    fn value(&self, column: &str) -> Option<Decimal> {
        let v = match column {
            "year" => Decimal::from(self.year),
            "appraisal_value" => self.appraisal_value,
            "annual_tax" => self.annual_tax,
            "monthly_tax" => self.monthly_tax,
            _ => return None,
        };
        Some(v)
    }
}

/// Yearly appraisal and property tax, years `1..=duration`.
///
/// Year 0 (the purchase) is not a row; [`TaxProjection::to_monthly`] maps
/// year `t` onto months `(t-1)*12 ..`, so month 0 carries year 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxProjection {
    pub initial_value: Money,
    pub tax_rate: Rate,
    pub growth_rate: Rate,
    pub rows: Vec<TaxYearRow>,
}

/// One month of the step-function resampled tax projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTaxRow {
    pub month: Month,
    /// Projection year this month inherits its figures from
    pub year: u32,
    pub appraisal_value: Money,
    pub monthly_tax: Money,
}

impl TableRow for MonthlyTaxRow {
    fn value(&self, column: &str) -> Option<Decimal> {
        let v = match column {
            "month" => Decimal::from(self.month),
            "year" => Decimal::from(self.year),
            "appraisal_value" => self.appraisal_value,
            "monthly_tax" => self.monthly_tax,
            _ => return None,
        };
        Some(v)
    }
}

/// Monthly view of a [`TaxProjection`], months `0..=duration*12`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTaxSchedule {
    pub rows: Vec<MonthlyTaxRow>,
}

impl TaxProjection {
    pub fn duration_years(&self) -> u32 {
        self.rows.last().map(|r| r.year).unwrap_or(0)
    }

    pub fn year(&self, year: u32) -> Option<&TaxYearRow> {
        year.checked_sub(1).and_then(|i| self.rows.get(i as usize))
    }

    pub fn total_tax(&self) -> Money {
        self.rows.iter().map(|r| r.annual_tax).sum()
    }

    pub fn column(&self, name: &str) -> Option<Vec<Decimal>> {
        column_of(&self.rows, name)
    }

    /// Upsample from yearly to monthly rows.
    ///
    /// Year `t` is keyed at month `(t-1)*12`; every month up to and including
    /// `duration*12` is forward-filled from the most recent keyed year.
    pub fn to_monthly(&self) -> MonthlyTaxSchedule {
        let last_month = self.duration_years() * PAYMENTS_PER_YEAR;
        let mut rows = Vec::with_capacity(last_month as usize + 1);
        let mut keyed = self.rows.iter().peekable();
        let mut current: Option<&TaxYearRow> = None;

        for month in 0..=last_month {
            while let Some(next) = keyed.peek() {
                if (next.year - 1) * PAYMENTS_PER_YEAR > month {
                    break;
                }
                current = keyed.next();
            }
            if let Some(row) = current {
                rows.push(MonthlyTaxRow {
                    month,
                    year: row.year,
                    appraisal_value: row.appraisal_value,
                    monthly_tax: row.monthly_tax,
                });
            }
        }

        MonthlyTaxSchedule { rows }
    }
}

impl MonthlyTaxSchedule {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, month: Month) -> Option<&MonthlyTaxRow> {
        self.rows.get(month as usize)
    }

    pub fn column(&self, name: &str) -> Option<Vec<Decimal>> {
        column_of(&self.rows, name)
    }
}

/// Project appraisal value and property tax for `years` years of
/// appreciation at `growth_rate`, compounded annually.
pub fn property_tax_projection(
    initial_value: Money,
    tax_rate: Rate,
    years: u32,
    growth_rate: Rate,
) -> HomeRoiResult<TaxProjection> {
    if initial_value <= Decimal::ZERO {
        return Err(HomeRoiError::InvalidInput {
            field: "initial_value".into(),
            reason: "Appraisal value must be positive".into(),
        });
    }
    if years == 0 {
        return Err(HomeRoiError::InvalidInput {
            field: "years".into(),
            reason: "Projection must cover at least one year".into(),
        });
    }
    // Loan term plus extension
    if years > 2 * MAX_YEARS {
        return Err(HomeRoiError::InvalidInput {
            field: "years".into(),
            reason: format!("Projection cannot exceed {} years", 2 * MAX_YEARS),
        });
    }
    validate_rate("tax_rate", tax_rate)?;
    validate_rate("growth_rate", growth_rate)?;

    let months = Decimal::from(PAYMENTS_PER_YEAR);
    let rows = (1..=years)
        .map(|year| {
            let appraisal_value =
                compound_growth(initial_value, growth_rate, 1, Decimal::from(year))?;
            let annual_tax = checked(appraisal_value.checked_mul(tax_rate), "property tax")?;
            Ok(TaxYearRow {
                year,
                appraisal_value,
                annual_tax,
                monthly_tax: annual_tax / months,
            })
        })
        .collect::<HomeRoiResult<Vec<_>>>()?;

    Ok(TaxProjection {
        initial_value,
        tax_rate,
        growth_rate,
        rows,
    })
}
