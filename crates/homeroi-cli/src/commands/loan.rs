use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use serde_json::Value;

use homeroi_core::{HomeModel, LoanParameters, PmiPolicy};

use crate::input;

/// Loan and purchase assumptions shared by every scenario command.
///
/// Parameters are taken from `--config` when given, otherwise from JSON piped
/// on stdin, otherwise from the built-in defaults. Individual flags override
/// whichever source was used.
#[derive(Args, Debug, Default)]
#[command(allow_hyphen_values = true)]
pub struct LoanArgs {
    /// Path to a YAML parameter file (see `homeroi config init`)
    #[arg(long)]
    pub config: Option<String>,

    /// Appraised home value at purchase
    #[arg(long)]
    pub home_value: Option<Decimal>,

    /// Cash down payment
    #[arg(long)]
    pub down_payment: Option<Decimal>,

    /// Annual loan rate (e.g. 0.033 for 3.3%)
    #[arg(long)]
    pub apr: Option<Decimal>,

    /// Loan term in years
    #[arg(long)]
    pub term: Option<u32>,

    /// Annual property tax rate
    #[arg(long)]
    pub tax_rate: Option<Decimal>,

    /// Annual PMI rate on the loan balance
    #[arg(long)]
    pub pmi_rate: Option<Decimal>,

    /// Annual appreciation of the appraised value
    #[arg(long)]
    pub growth: Option<Decimal>,

    /// Closing costs as a fraction of the loan amount
    #[arg(long)]
    pub closing_rate: Option<Decimal>,

    /// Years to keep projecting after the loan is paid off
    #[arg(long)]
    pub extend_years: Option<u32>,

    /// How PMI is assessed
    #[arg(long)]
    pub pmi_policy: Option<PmiPolicyArg>,

    /// Rate flags are given in percent (3.3 instead of 0.033)
    #[arg(long)]
    pub percent: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PmiPolicyArg {
    /// Fixed against the purchase appraisal and opening balance
    Freeze,
    /// Re-evaluated every month
    Recompute,
}

impl From<PmiPolicyArg> for PmiPolicy {
    fn from(arg: PmiPolicyArg) -> Self {
        match arg {
            PmiPolicyArg::Freeze => PmiPolicy::FreezeAtOrigin,
            PmiPolicyArg::Recompute => PmiPolicy::RecomputeMonthly,
        }
    }
}

/// Arguments for the month-by-month tables
#[derive(Args, Debug)]
pub struct TimelineArgs {
    #[command(flatten)]
    pub loan: LoanArgs,

    /// Only print every n-th month (the final month is always printed)
    #[arg(long)]
    pub every: Option<usize>,
}

/// Arguments for the property tax projection
#[derive(Args, Debug)]
pub struct TaxArgs {
    #[command(flatten)]
    pub loan: LoanArgs,

    /// Expand the yearly projection to one row per month
    #[arg(long)]
    pub monthly: bool,
}

impl LoanArgs {
    /// Apply flag overrides on top of `params`.
    pub fn apply_overrides(&self, mut params: LoanParameters) -> LoanParameters {
        let rate = |r: Decimal| if self.percent { r / dec!(100) } else { r };

        if let Some(v) = self.home_value {
            params.home_value = v;
        }
        if let Some(v) = self.down_payment {
            params.down_payment = v;
        }
        if let Some(v) = self.apr {
            params.loan_apr = rate(v);
        }
        if let Some(v) = self.term {
            params.loan_term_years = v;
        }
        if let Some(v) = self.tax_rate {
            params.property_tax_rate = rate(v);
        }
        if let Some(v) = self.pmi_rate {
            params.pmi_rate = rate(v);
        }
        if let Some(v) = self.growth {
            params.appraisal_growth_rate = rate(v);
        }
        if let Some(v) = self.closing_rate {
            params.closing_rate = rate(v);
        }
        if let Some(v) = self.extend_years {
            params.extend_years = v;
        }
        if let Some(v) = self.pmi_policy {
            params.pmi_policy = v.into();
        }
        params
    }
}

/// Load, override and validate the scenario parameters.
pub fn resolve_params(args: &LoanArgs) -> Result<LoanParameters, Box<dyn std::error::Error>> {
    let base = match &args.config {
        Some(path) => input::file::read_params(path)?,
        None => input::stdin::read_stdin::<LoanParameters>()?.unwrap_or_default(),
    };
    let params = args.apply_overrides(base);
    params.validate()?;
    tracing::debug!(scenario = %params, "resolved loan parameters");
    Ok(params)
}

fn build_model(args: &LoanArgs) -> Result<HomeModel, Box<dyn std::error::Error>> {
    Ok(HomeModel::new(resolve_params(args)?)?)
}

/// Keep every n-th row plus the last one.
fn thin<T: Clone>(rows: &[T], every: Option<usize>) -> Vec<T> {
    match every {
        Some(n) if n > 1 => rows
            .iter()
            .enumerate()
            .filter(|(i, _)| i % n == 0 || *i + 1 == rows.len())
            .map(|(_, r)| r.clone())
            .collect(),
        _ => rows.to_vec(),
    }
}

fn rows_to_value<T: Serialize + Clone>(
    rows: &[T],
    every: Option<usize>,
) -> Result<Value, Box<dyn std::error::Error>> {
    Ok(serde_json::to_value(thin(rows, every))?)
}

pub fn run_schedule(args: TimelineArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let model = build_model(&args.loan)?;
    rows_to_value(&model.mortgage_schedule()?.rows, args.every)
}

pub fn run_tax(args: TaxArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let model = build_model(&args.loan)?;
    let projection = model.tax_projection()?;
    if args.monthly {
        Ok(serde_json::to_value(projection.to_monthly().rows)?)
    } else {
        Ok(serde_json::to_value(&projection.rows)?)
    }
}

pub fn run_roi(args: TimelineArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let model = build_model(&args.loan)?;
    rows_to_value(&model.roi_timeline()?.rows, args.every)
}

pub fn run_totals(args: TimelineArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let model = build_model(&args.loan)?;
    rows_to_value(&model.totals_by_category()?, args.every)
}

pub fn run_payments(args: TimelineArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let model = build_model(&args.loan)?;
    rows_to_value(&model.per_period_payments()?, args.every)
}

pub fn run_summary(args: LoanArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let model = build_model(&args)?;
    Ok(serde_json::to_value(model.summary()?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_scale_rates_in_percent_mode() {
        let args = LoanArgs {
            apr: Some(dec!(4.5)),
            growth: Some(dec!(3)),
            home_value: Some(dec!(400000)),
            percent: true,
            ..LoanArgs::default()
        };
        let params = args.apply_overrides(LoanParameters::default());
        assert_eq!(params.loan_apr, dec!(0.045));
        assert_eq!(params.appraisal_growth_rate, dec!(0.03));
        assert_eq!(params.home_value, dec!(400000));
        assert_eq!(params.pmi_rate, LoanParameters::default().pmi_rate);
    }

    #[test]
    fn test_pmi_policy_flag_maps_to_core_policy() {
        let args = LoanArgs {
            pmi_policy: Some(PmiPolicyArg::Recompute),
            ..LoanArgs::default()
        };
        let params = args.apply_overrides(LoanParameters::default());
        assert_eq!(params.pmi_policy, PmiPolicy::RecomputeMonthly);
    }

    #[test]
    fn test_thin_keeps_stride_and_last_row() {
        let rows: Vec<u32> = (0..=10).collect();
        assert_eq!(thin(&rows, Some(4)), vec![0, 4, 8, 10]);
        assert_eq!(thin(&rows, None).len(), 11);
        assert_eq!(thin(&rows, Some(1)).len(), 11);
    }
}
