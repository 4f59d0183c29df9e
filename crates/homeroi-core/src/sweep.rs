use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::HomeRoiError;
use crate::params::LoanParameters;
use crate::roi::return_on_investment;
use crate::types::*;
use crate::HomeRoiResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A [`LoanParameters`] field that can be swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepVariable {
    HomeValue,
    DownPayment,
    LoanApr,
    LoanTermYears,
    PropertyTaxRate,
    PmiRate,
    AppraisalGrowthRate,
    ClosingRate,
    ExtendYears,
}

impl SweepVariable {
    pub const ALL: [SweepVariable; 9] = [
        SweepVariable::HomeValue,
        SweepVariable::DownPayment,
        SweepVariable::LoanApr,
        SweepVariable::LoanTermYears,
        SweepVariable::PropertyTaxRate,
        SweepVariable::PmiRate,
        SweepVariable::AppraisalGrowthRate,
        SweepVariable::ClosingRate,
        SweepVariable::ExtendYears,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SweepVariable::HomeValue => "home_value",
            SweepVariable::DownPayment => "down_payment",
            SweepVariable::LoanApr => "loan_apr",
            SweepVariable::LoanTermYears => "loan_term_years",
            SweepVariable::PropertyTaxRate => "property_tax_rate",
            SweepVariable::PmiRate => "pmi_rate",
            SweepVariable::AppraisalGrowthRate => "appraisal_growth_rate",
            SweepVariable::ClosingRate => "closing_rate",
            SweepVariable::ExtendYears => "extend_years",
        }
    }

    /// Whether the field holds a whole number of years.
    pub fn is_integral(self) -> bool {
        matches!(self, SweepVariable::LoanTermYears | SweepVariable::ExtendYears)
    }

    /// Copy of `base` with this field set to `value`.
    ///
    /// Integral fields take the integer part of `value`; negative values
    /// saturate at zero and are rejected later by validation.
    pub fn apply(self, base: &LoanParameters, value: Decimal) -> LoanParameters {
        let mut p = base.clone();
        let years = || value.trunc().to_u32().unwrap_or(0);
        match self {
            SweepVariable::HomeValue => p.home_value = value,
            SweepVariable::DownPayment => p.down_payment = value,
            SweepVariable::LoanApr => p.loan_apr = value,
            SweepVariable::LoanTermYears => p.loan_term_years = years(),
            SweepVariable::PropertyTaxRate => p.property_tax_rate = value,
            SweepVariable::PmiRate => p.pmi_rate = value,
            SweepVariable::AppraisalGrowthRate => p.appraisal_growth_rate = value,
            SweepVariable::ClosingRate => p.closing_rate = value,
            SweepVariable::ExtendYears => p.extend_years = years(),
        }
        p
    }
}

impl fmt::Display for SweepVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SweepVariable {
    type Err = HomeRoiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SweepVariable::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| HomeRoiError::InvalidInput {
                field: "variable".into(),
                reason: format!(
                    "Unknown sweep variable '{s}'. Available: {}",
                    SweepVariable::ALL.map(|v| v.name()).join(", ")
                ),
            })
    }
}

/// Range of values for one swept variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepAxis {
    pub variable: SweepVariable,
    pub min: Decimal,
    pub max: Decimal,
    pub step: Decimal,
}

/// The figure recorded for every evaluated scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum SweepMetric {
    /// Annualized return at the end of the projection (fraction)
    FinalCagr,
    /// Mortgage, tax and PMI due in month 1
    InitialMonthlyPayment,
    /// Everything paid by the end of the projection
    TotalPaid,
    /// First month whose annualized return exceeds `threshold`, or -1
    CrossoverMonth { threshold: Rate },
}

/// Recorded for a crossover that never happens within the projection.
pub const NO_CROSSOVER: Decimal = Decimal::NEGATIVE_ONE;

impl SweepMetric {
    pub fn label(&self) -> &'static str {
        match self {
            SweepMetric::FinalCagr => "final_cagr",
            SweepMetric::InitialMonthlyPayment => "initial_monthly_payment",
            SweepMetric::TotalPaid => "total_paid",
            SweepMetric::CrossoverMonth { .. } => "crossover_month",
        }
    }

    pub fn evaluate(&self, params: &LoanParameters) -> HomeRoiResult<Decimal> {
        let timeline = return_on_investment(params)?;
        match self {
            SweepMetric::FinalCagr => Ok(timeline.final_cagr()),
            SweepMetric::InitialMonthlyPayment => timeline
                .row(1)
                .map(|r| r.total_monthly_payment)
                .ok_or_else(|| HomeRoiError::InsufficientData("timeline has no month 1".into())),
            SweepMetric::TotalPaid => timeline
                .final_row()
                .map(|r| r.total_paid)
                .ok_or_else(|| HomeRoiError::InsufficientData("empty timeline".into())),
            SweepMetric::CrossoverMonth { threshold } => Ok(timeline
                .crossover_month(*threshold)
                .map(Decimal::from)
                .unwrap_or(NO_CROSSOVER)),
        }
    }
}

/// Outcome of one scenario. `value` is `None` when the scenario failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepPoint {
    pub index: usize,
    pub parameters: LoanParameters,
    pub value: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepOutput {
    pub metric: String,
    pub points: Vec<SweepPoint>,
    pub succeeded: usize,
    pub failed: usize,
}

impl SweepOutput {
    /// Values in scenario order, `None` for failed scenarios.
    pub fn values(&self) -> Vec<Option<Decimal>> {
        self.points.iter().map(|p| p.value).collect()
    }
}

/// Output of a one- or two-variable grid sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepGridOutput {
    pub variable_1_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_2_name: Option<String>,
    pub variable_1_values: Vec<Decimal>,
    pub variable_2_values: Vec<Decimal>,
    pub metric: String,
    /// Matrix[i][j] = metric at variable_1_values[i], variable_2_values[j]
    /// (a single column when there is no second variable)
    pub matrix: Vec<Vec<Option<Decimal>>>,
    pub failed: usize,
}

/// One cell of the crossover study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossoverCell {
    pub appraisal_growth_rate: Rate,
    pub home_value: Money,
    pub down_payment: Money,
    /// Crossover month, -1 if never reached, `None` if the scenario failed
    pub crossover_month: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossoverOutput {
    pub threshold: Rate,
    pub cells: Vec<CrossoverCell>,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Generate the sweep values for an axis from min to max with step.
pub fn generate_sweep_values(axis: &SweepAxis) -> HomeRoiResult<Vec<Decimal>> {
    if axis.step <= Decimal::ZERO {
        return Err(HomeRoiError::InvalidInput {
            field: format!("variable:{}", axis.variable),
            reason: "Step must be positive".into(),
        });
    }
    if axis.min > axis.max {
        return Err(HomeRoiError::InvalidInput {
            field: format!("variable:{}", axis.variable),
            reason: "Min must be <= max".into(),
        });
    }
    if axis.variable.is_integral()
        && [axis.min, axis.max, axis.step].iter().any(|v| !v.fract().is_zero())
    {
        return Err(HomeRoiError::InvalidInput {
            field: format!("variable:{}", axis.variable),
            reason: "Year counts must be swept in whole years".into(),
        });
    }

    let mut values = Vec::new();
    let mut current = axis.min;
    while current <= axis.max {
        values.push(current);
        current += axis.step;
    }
    // Ensure max is included if step doesn't land exactly on it
    if let Some(&last) = values.last() {
        if last < axis.max {
            values.push(axis.max);
        }
    }

    Ok(values)
}

/// Evaluate `metric` for every scenario independently.
///
/// A failing scenario never aborts the sweep: it is logged, listed in the
/// warnings and recorded as a point with no value.
pub fn evaluate_scenarios(
    scenarios: &[LoanParameters],
    metric: &SweepMetric,
) -> HomeRoiResult<ComputationOutput<SweepOutput>> {
    let start = Instant::now();

    if scenarios.is_empty() {
        return Err(HomeRoiError::InsufficientData(
            "Sweep requires at least one scenario".into(),
        ));
    }

    let points: Vec<SweepPoint> = scenarios
        .par_iter()
        .enumerate()
        .map(|(index, params)| match metric.evaluate(params) {
            Ok(value) => SweepPoint {
                index,
                parameters: params.clone(),
                value: Some(value),
                error: None,
            },
            Err(e) => {
                tracing::warn!(index, scenario = %params, error = %e, "sweep scenario failed");
                SweepPoint {
                    index,
                    parameters: params.clone(),
                    value: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    let warnings: Vec<String> = points
        .iter()
        .filter_map(|p| {
            p.error
                .as_ref()
                .map(|e| format!("Evaluation failed for scenario {}: {e}", p.index))
        })
        .collect();
    let failed = warnings.len();

    tracing::debug!(
        scenarios = points.len(),
        failed,
        metric = metric.label(),
        "sweep evaluated"
    );

    let output = SweepOutput {
        metric: metric.label().to_string(),
        succeeded: points.len() - failed,
        failed,
        points,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Scenario sweep with per-scenario failure isolation",
        &serde_json::json!({
            "metric": metric,
            "scenarios": scenarios.len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Sweep one or two parameters over a grid around `base`.
pub fn evaluate_grid(
    base: &LoanParameters,
    axis_1: &SweepAxis,
    axis_2: Option<&SweepAxis>,
    metric: &SweepMetric,
) -> HomeRoiResult<ComputationOutput<SweepGridOutput>> {
    let start = Instant::now();

    let v1_values = generate_sweep_values(axis_1)?;
    let v2_values = axis_2.map(generate_sweep_values).transpose()?.unwrap_or_default();

    let mut scenarios = Vec::with_capacity(v1_values.len() * v2_values.len().max(1));
    for &v1 in &v1_values {
        let row_base = axis_1.variable.apply(base, v1);
        match axis_2 {
            Some(a2) => {
                for &v2 in &v2_values {
                    scenarios.push(a2.variable.apply(&row_base, v2));
                }
            }
            None => scenarios.push(row_base),
        }
    }

    let swept = evaluate_scenarios(&scenarios, metric)?;
    let columns = v2_values.len().max(1);
    let matrix: Vec<Vec<Option<Decimal>>> = swept
        .result
        .values()
        .chunks(columns)
        .map(|row| row.to_vec())
        .collect();

    let output = SweepGridOutput {
        variable_1_name: axis_1.variable.to_string(),
        variable_2_name: axis_2.map(|a| a.variable.to_string()),
        variable_1_values: v1_values,
        variable_2_values: v2_values,
        metric: metric.label().to_string(),
        matrix,
        failed: swept.result.failed,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Parameter grid sweep",
        &serde_json::json!({
            "base": base,
            "variable_1": axis_1,
            "variable_2": axis_2,
            "metric": metric,
        }),
        swept.warnings,
        elapsed,
        output,
    ))
}

/// Final annualized return for each appreciation rate.
pub fn annualized_return_vs_growth(
    base: &LoanParameters,
    growth_rates: &[Rate],
) -> HomeRoiResult<ComputationOutput<SweepOutput>> {
    let scenarios: Vec<LoanParameters> = growth_rates
        .iter()
        .map(|&g| SweepVariable::AppraisalGrowthRate.apply(base, g))
        .collect();
    evaluate_scenarios(&scenarios, &SweepMetric::FinalCagr)
}

/// First-month total payment for each down payment.
pub fn monthly_payment_vs_down_payment(
    base: &LoanParameters,
    down_payments: &[Money],
) -> HomeRoiResult<ComputationOutput<SweepOutput>> {
    let scenarios: Vec<LoanParameters> = down_payments
        .iter()
        .map(|&d| SweepVariable::DownPayment.apply(base, d))
        .collect();
    evaluate_scenarios(&scenarios, &SweepMetric::InitialMonthlyPayment)
}

/// Month at which the annualized return first exceeds `threshold`, for every
/// combination of appreciation rate, home value and down payment.
pub fn crossover_grid(
    base: &LoanParameters,
    threshold: Rate,
    down_payments: &[Money],
    home_values: &[Money],
    growth_rates: &[Rate],
) -> HomeRoiResult<ComputationOutput<CrossoverOutput>> {
    let start = Instant::now();

    let mut scenarios = Vec::with_capacity(down_payments.len() * home_values.len() * growth_rates.len());
    for &growth in growth_rates {
        for &home_value in home_values {
            for &down_payment in down_payments {
                scenarios.push(LoanParameters {
                    home_value,
                    down_payment,
                    appraisal_growth_rate: growth,
                    ..base.clone()
                });
            }
        }
    }

    let swept = evaluate_scenarios(&scenarios, &SweepMetric::CrossoverMonth { threshold })?;
    let cells = swept
        .result
        .points
        .iter()
        .map(|p| CrossoverCell {
            appraisal_growth_rate: p.parameters.appraisal_growth_rate,
            home_value: p.parameters.home_value,
            down_payment: p.parameters.down_payment,
            crossover_month: p.value,
        })
        .collect();

    let output = CrossoverOutput {
        threshold,
        cells,
        failed: swept.result.failed,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Annualized return crossover study",
        &serde_json::json!({
            "base": base,
            "threshold": threshold,
            "down_payments": down_payments.len(),
            "home_values": home_values.len(),
            "growth_rates": growth_rates.len(),
        }),
        swept.warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_sweep_values() {
        let axis = SweepAxis {
            variable: SweepVariable::LoanApr,
            min: dec!(0.03),
            max: dec!(0.07),
            step: dec!(0.01),
        };
        let vals = generate_sweep_values(&axis).unwrap();
        assert_eq!(
            vals,
            vec![dec!(0.03), dec!(0.04), dec!(0.05), dec!(0.06), dec!(0.07)]
        );
    }

    #[test]
    fn test_sweep_with_non_exact_step() {
        let axis = SweepAxis {
            variable: SweepVariable::AppraisalGrowthRate,
            min: dec!(0),
            max: dec!(0.1),
            step: dec!(0.03),
        };
        let vals = generate_sweep_values(&axis).unwrap();
        // 0, 0.03, 0.06, 0.09, 0.1 (max appended)
        assert_eq!(vals.len(), 5);
        assert_eq!(*vals.last().unwrap(), dec!(0.1));
    }

    #[test]
    fn test_invalid_step() {
        let axis = SweepAxis {
            variable: SweepVariable::HomeValue,
            min: dec!(100_000),
            max: dec!(200_000),
            step: dec!(0),
        };
        assert!(generate_sweep_values(&axis).is_err());
    }

    #[test]
    fn test_fractional_years_rejected() {
        let axis = SweepAxis {
            variable: SweepVariable::LoanTermYears,
            min: dec!(10),
            max: dec!(30),
            step: dec!(2.5),
        };
        assert!(generate_sweep_values(&axis).is_err());
    }

    #[test]
    fn test_variable_round_trip_names() {
        for v in SweepVariable::ALL {
            assert_eq!(v.name().parse::<SweepVariable>().unwrap(), v);
        }
        assert!("bogus".parse::<SweepVariable>().is_err());
    }

    #[test]
    fn test_apply_integral_variable() {
        let p = SweepVariable::LoanTermYears.apply(&LoanParameters::default(), dec!(30));
        assert_eq!(p.loan_term_years, 30);
    }

    #[test]
    fn test_one_dimensional_grid() {
        let axis = SweepAxis {
            variable: SweepVariable::LoanApr,
            min: dec!(0.03),
            max: dec!(0.06),
            step: dec!(0.01),
        };
        let out = evaluate_grid(
            &LoanParameters::default(),
            &axis,
            None,
            &SweepMetric::InitialMonthlyPayment,
        )
        .unwrap();
        let grid = &out.result;
        assert_eq!(grid.matrix.len(), 4);
        assert!(grid.matrix.iter().all(|row| row.len() == 1));
        // Higher rate, higher payment
        for w in grid.matrix.windows(2) {
            assert!(w[1][0].unwrap() > w[0][0].unwrap());
        }
    }

    #[test]
    fn test_two_dimensional_grid_records_failures() {
        let axis_1 = SweepAxis {
            variable: SweepVariable::HomeValue,
            min: dec!(100_000),
            max: dec!(300_000),
            step: dec!(100_000),
        };
        let axis_2 = SweepAxis {
            variable: SweepVariable::DownPayment,
            min: dec!(50_000),
            max: dec!(150_000),
            step: dec!(50_000),
        };
        let out = evaluate_grid(
            &LoanParameters::default(),
            &axis_1,
            Some(&axis_2),
            &SweepMetric::FinalCagr,
        )
        .unwrap();
        let grid = &out.result;
        assert_eq!(grid.matrix.len(), 3);
        assert_eq!(grid.matrix[0].len(), 3);
        // 100k home with 100k or 150k down is invalid
        assert_eq!(grid.matrix[0][1], None);
        assert_eq!(grid.matrix[0][2], None);
        assert!(grid.matrix[0][0].is_some());
        assert_eq!(grid.failed, 2);
        assert_eq!(out.warnings.len(), 2);
    }

    #[test]
    fn test_crossover_metric_sentinel() {
        let params = LoanParameters {
            appraisal_growth_rate: Decimal::ZERO,
            ..Default::default()
        };
        // A 50% annualized return is never reached without appreciation
        let month = SweepMetric::CrossoverMonth { threshold: dec!(0.5) }
            .evaluate(&params)
            .unwrap();
        assert_eq!(month, NO_CROSSOVER);
    }

    #[test]
    fn test_annualized_return_increases_with_growth() {
        let out = annualized_return_vs_growth(
            &LoanParameters::default(),
            &[dec!(0.0), dec!(0.04), dec!(0.08)],
        )
        .unwrap();
        let values: Vec<Decimal> = out.result.values().into_iter().flatten().collect();
        assert_eq!(values.len(), 3);
        assert!(values[0] < values[1] && values[1] < values[2]);
    }

    #[test]
    fn test_monthly_payment_falls_with_down_payment() {
        let out = monthly_payment_vs_down_payment(
            &LoanParameters::default(),
            &[dec!(25_000), dec!(75_000), dec!(125_000)],
        )
        .unwrap();
        let values: Vec<Decimal> = out.result.values().into_iter().flatten().collect();
        assert!(values[0] > values[1] && values[1] > values[2]);
    }

    #[test]
    fn test_empty_sweep_rejected() {
        assert!(evaluate_scenarios(&[], &SweepMetric::FinalCagr).is_err());
    }
}
