//! `HomeModel`: one validated parameter set plus its derived tables.
//!
//! Each table is computed on first access and cached in a `OnceCell`.
//! Failed computations are not cached. Views never mutate one another.

use std::time::Instant;

use once_cell::sync::OnceCell;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::amortization::{mortgage_amortization, AmortizationSchedule};
use crate::error::HomeRoiError;
use crate::params::LoanParameters;
use crate::property_tax::{property_tax_projection, TaxProjection};
use crate::roi::{compose, RoiTimeline};
use crate::types::{with_metadata, ComputationOutput, Money, Month};
use crate::HomeRoiResult;

/// Amount per spending category for one month, labelled for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRow {
    pub month: Month,
    #[serde(rename = "Principal")]
    pub principal: Money,
    #[serde(rename = "Interest")]
    pub interest: Money,
    #[serde(rename = "Tax")]
    pub tax: Money,
    #[serde(rename = "PMI")]
    pub pmi: Money,
    #[serde(rename = "Down Payment")]
    pub down_payment: Money,
}

/// Headline figures of a home purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeSummary {
    pub principal: Money,
    pub monthly_payment: Money,
    /// Mortgage, tax and PMI due in the first month
    pub initial_monthly_payment: Money,
    pub total_interest: Money,
    pub total_tax: Money,
    pub total_pmi: Money,
    pub pmi_months: usize,
    pub total_paid: Money,
    pub final_appraisal_value: Money,
    pub final_equity: Money,
    /// Annualized return at the end of the projection, in percent
    pub final_cagr_pct: Decimal,
    pub months: usize,
}

#[derive(Debug, Clone)]
pub struct HomeModel {
    params: LoanParameters,
    schedule: OnceCell<AmortizationSchedule>,
    tax: OnceCell<TaxProjection>,
    timeline: OnceCell<RoiTimeline>,
}

impl HomeModel {
    pub fn new(params: LoanParameters) -> HomeRoiResult<Self> {
        params.validate()?;
        Ok(HomeModel {
            params,
            schedule: OnceCell::new(),
            tax: OnceCell::new(),
            timeline: OnceCell::new(),
        })
    }

    pub fn parameters(&self) -> &LoanParameters {
        &self.params
    }

    pub fn principal(&self) -> Money {
        self.params.principal()
    }

    pub fn mortgage_schedule(&self) -> HomeRoiResult<&AmortizationSchedule> {
        self.schedule.get_or_try_init(|| {
            mortgage_amortization(
                self.params.principal(),
                self.params.down_payment,
                self.params.loan_apr,
                self.params.loan_term_years,
            )
        })
    }

    /// Tax projection over the loan term plus any extension years.
    pub fn tax_projection(&self) -> HomeRoiResult<&TaxProjection> {
        self.tax.get_or_try_init(|| {
            property_tax_projection(
                self.params.home_value,
                self.params.property_tax_rate,
                self.params.projection_years(),
                self.params.appraisal_growth_rate,
            )
        })
    }

    pub fn roi_timeline(&self) -> HomeRoiResult<&RoiTimeline> {
        self.timeline.get_or_try_init(|| {
            compose(&self.params, self.mortgage_schedule()?, self.tax_projection()?)
        })
    }

    /// Cumulative amount per category for every month, with the down payment
    /// as a constant column.
    pub fn totals_by_category(&self) -> HomeRoiResult<Vec<CategoryRow>> {
        let timeline = self.roi_timeline()?;
        Ok(timeline
            .rows
            .iter()
            .map(|r| CategoryRow {
                month: r.month,
                principal: r.principal_paid,
                interest: r.interest_paid,
                tax: r.tax_paid,
                pmi: r.pmi_paid,
                down_payment: self.params.down_payment,
            })
            .collect())
    }

    /// Month-over-month change of [`Self::totals_by_category`]; the month-0
    /// baseline row is dropped.
    pub fn per_period_payments(&self) -> HomeRoiResult<Vec<CategoryRow>> {
        let totals = self.totals_by_category()?;
        Ok(totals
            .windows(2)
            .map(|w| CategoryRow {
                month: w[1].month,
                principal: w[1].principal - w[0].principal,
                interest: w[1].interest - w[0].interest,
                tax: w[1].tax - w[0].tax,
                pmi: w[1].pmi - w[0].pmi,
                down_payment: w[1].down_payment - w[0].down_payment,
            })
            .collect())
    }

    /// Annualized return at the last month of the projection, in percent.
    pub fn final_cagr(&self) -> HomeRoiResult<Decimal> {
        Ok(self.roi_timeline()?.final_cagr() * dec!(100))
    }

    /// The fixed monthly mortgage payment.
    pub fn monthly_payment(&self) -> HomeRoiResult<Money> {
        Ok(self.mortgage_schedule()?.monthly_payment)
    }

    /// Mortgage, tax and PMI due in the first month.
    pub fn initial_monthly_payment(&self) -> HomeRoiResult<Money> {
        self.roi_timeline()?
            .row(1)
            .map(|r| r.total_monthly_payment)
            .ok_or_else(|| HomeRoiError::InsufficientData("timeline has no month 1".into()))
    }

    pub fn summary(&self) -> HomeRoiResult<ComputationOutput<HomeSummary>> {
        let start = Instant::now();
        let mut warnings: Vec<String> = Vec::new();

        let schedule = self.mortgage_schedule()?;
        let timeline = self.roi_timeline()?;
        let last = timeline
            .final_row()
            .ok_or_else(|| HomeRoiError::InsufficientData("empty timeline".into()))?;

        let pmi_months = timeline.pmi_months();
        if pmi_months > 0 {
            warnings.push(format!(
                "PMI charged for {pmi_months} months (down payment below 20% of home value)"
            ));
        }
        if last.cagr < Decimal::ZERO {
            warnings.push("Negative annualized return at the end of the projection".into());
        }
        if last.equity < last.total_paid {
            warnings.push("Final equity is below the total amount paid".into());
        }

        let summary = HomeSummary {
            principal: schedule.principal,
            monthly_payment: schedule.monthly_payment,
            initial_monthly_payment: self.initial_monthly_payment()?,
            total_interest: last.interest_paid,
            total_tax: last.tax_paid,
            total_pmi: last.pmi_paid,
            pmi_months,
            total_paid: last.total_paid,
            final_appraisal_value: last.appraisal_value,
            final_equity: last.equity,
            final_cagr_pct: last.cagr * dec!(100),
            months: timeline.len(),
        };

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            "Fixed-rate amortization with annually compounding appraisal and property tax",
            &self.params,
            warnings,
            elapsed,
            summary,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn model() -> HomeModel {
        HomeModel::new(LoanParameters::default()).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid() {
        let params = LoanParameters {
            loan_term_years: 0,
            ..Default::default()
        };
        assert!(HomeModel::new(params).is_err());
    }

    #[test]
    fn test_views_are_memoized() {
        let m = model();
        let a = m.roi_timeline().unwrap() as *const RoiTimeline;
        let b = m.roi_timeline().unwrap() as *const RoiTimeline;
        assert_eq!(a, b);
        assert_eq!(m.principal(), dec!(300_000));
    }

    #[test]
    fn test_totals_carry_down_payment() {
        let m = model();
        let totals = m.totals_by_category().unwrap();
        assert_eq!(totals.len(), 181);
        assert!(totals.iter().all(|r| r.down_payment == dec!(50_000)));
        let last = totals.last().unwrap();
        assert!((last.principal - dec!(300_000)).abs() < dec!(0.001));
    }

    #[test]
    fn test_payments_are_first_difference() {
        let m = model();
        let totals = m.totals_by_category().unwrap();
        let payments = m.per_period_payments().unwrap();
        assert_eq!(payments.len(), totals.len() - 1);
        assert_eq!(payments[0].month, 1);
        assert_eq!(payments[0].tax, totals[1].tax - totals[0].tax);
        assert!(payments.iter().all(|p| p.down_payment.is_zero()));
        // principal + interest of each month is the mortgage payment
        let pmt = m.monthly_payment().unwrap();
        for p in &payments {
            assert!((p.principal + p.interest - pmt).abs() < dec!(0.0000001));
        }
    }

    #[test]
    fn test_final_cagr_percent() {
        let m = model();
        let timeline = m.roi_timeline().unwrap();
        assert_eq!(m.final_cagr().unwrap(), timeline.final_cagr() * dec!(100));
        // 8% appreciation on a leveraged purchase yields a positive return
        assert!(m.final_cagr().unwrap() > Decimal::ZERO);
    }

    #[test]
    fn test_summary_envelope() {
        let m = model();
        let out = m.summary().unwrap();
        assert_eq!(out.result.months, 181);
        assert!(out.result.pmi_months > 0);
        assert!(out.warnings.iter().any(|w| w.contains("PMI")));
        assert_eq!(out.assumptions["loan_term_years"], 15);
    }

    #[test]
    fn test_initial_monthly_payment_includes_tax_and_pmi() {
        let m = model();
        let timeline = m.roi_timeline().unwrap();
        let first = timeline.row(1).unwrap();
        assert_eq!(
            m.initial_monthly_payment().unwrap(),
            m.monthly_payment().unwrap() + first.monthly_tax + first.pmi
        );
    }
}
