use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use homeroi_core::sweep::{self, SweepAxis, SweepMetric, SweepVariable};
use homeroi_core::LoanParameters;

use super::loan::{resolve_params, LoanArgs};
use crate::input;

/// Arguments for a parameter sweep
#[derive(Args)]
pub struct SweepArgs {
    #[command(flatten)]
    pub loan: LoanArgs,

    /// First swept variable in format name:min:max:step
    /// (e.g. "appraisal_growth_rate:0:0.1:0.01")
    #[arg(long, required_unless_present = "scenarios")]
    pub var1: Option<String>,

    /// Second swept variable (optional, creates a 2D grid)
    #[arg(long, requires = "var1")]
    pub var2: Option<String>,

    /// JSON file holding an explicit list of scenarios, evaluated as given
    #[arg(long, conflicts_with_all = ["var1", "var2"])]
    pub scenarios: Option<String>,

    /// Figure recorded for every scenario
    #[arg(long, default_value = "final-cagr")]
    pub metric: MetricArg,

    /// Annualized return threshold for the crossover metric
    #[arg(long, default_value = "0.1")]
    pub threshold: Decimal,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MetricArg {
    FinalCagr,
    InitialMonthlyPayment,
    TotalPaid,
    CrossoverMonth,
}

/// Arguments for the crossover study
#[derive(Args)]
pub struct CrossoverArgs {
    #[command(flatten)]
    pub loan: LoanArgs,

    /// Annualized return the crossover must exceed
    #[arg(long, default_value = "0.1")]
    pub threshold: Decimal,

    /// Down payments as min:max:step
    #[arg(long, default_value = "25000:200000:5000")]
    pub down_payments: String,

    /// Home values as min:max:step
    #[arg(long, default_value = "200000:600000:50000")]
    pub home_values: String,

    /// Appreciation rates as min:max:step
    #[arg(long, default_value = "0:0.15:0.01")]
    pub growth_rates: String,
}

fn to_metric(arg: MetricArg, threshold: Decimal) -> SweepMetric {
    match arg {
        MetricArg::FinalCagr => SweepMetric::FinalCagr,
        MetricArg::InitialMonthlyPayment => SweepMetric::InitialMonthlyPayment,
        MetricArg::TotalPaid => SweepMetric::TotalPaid,
        MetricArg::CrossoverMonth => SweepMetric::CrossoverMonth { threshold },
    }
}

fn parse_axis(text: &str) -> Result<SweepAxis, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() != 4 {
        return Err(format!("Sweep variable must be name:min:max:step, got '{}'", text).into());
    }
    Ok(SweepAxis {
        variable: parts[0].parse::<SweepVariable>()?,
        min: parts[1].parse()?,
        max: parts[2].parse()?,
        step: parts[3].parse()?,
    })
}

/// Expand a `min:max:step` range into its values.
fn parse_range(
    variable: SweepVariable,
    text: &str,
) -> Result<Vec<Decimal>, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() != 3 {
        return Err(format!("Range must be min:max:step, got '{}'", text).into());
    }
    let axis = SweepAxis {
        variable,
        min: parts[0].parse()?,
        max: parts[1].parse()?,
        step: parts[2].parse()?,
    };
    Ok(sweep::generate_sweep_values(&axis)?)
}

pub fn run_sweep(args: SweepArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let metric = to_metric(args.metric, args.threshold);

    if let Some(path) = &args.scenarios {
        let scenarios: Vec<LoanParameters> = input::file::read_json(path)?;
        let scenarios: Vec<LoanParameters> = scenarios
            .into_iter()
            .map(|p| args.loan.apply_overrides(p))
            .collect();
        let result = sweep::evaluate_scenarios(&scenarios, &metric)?;
        return Ok(serde_json::to_value(result)?);
    }

    let var1 = match &args.var1 {
        Some(text) => parse_axis(text)?,
        None => return Err("--var1 or --scenarios is required".into()),
    };
    let var2 = args.var2.as_deref().map(parse_axis).transpose()?;
    let base = resolve_params(&args.loan)?;

    let result = sweep::evaluate_grid(&base, &var1, var2.as_ref(), &metric)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_crossover(args: CrossoverArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let threshold = if args.loan.percent {
        args.threshold / dec!(100)
    } else {
        args.threshold
    };
    let base = resolve_params(&args.loan)?;

    let down_payments = parse_range(SweepVariable::DownPayment, &args.down_payments)?;
    let home_values = parse_range(SweepVariable::HomeValue, &args.home_values)?;
    let growth_rates = parse_range(SweepVariable::AppraisalGrowthRate, &args.growth_rates)?;

    let result = sweep::crossover_grid(&base, threshold, &down_payments, &home_values, &growth_rates)?;
    Ok(serde_json::to_value(result)?)
}
