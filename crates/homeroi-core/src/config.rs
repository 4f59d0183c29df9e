//! Persisted form of [`LoanParameters`]: a flat YAML `key: value` mapping of
//! the parameter fields.
//!
//! Reading validates the parameters, so a stored file never hands the engine
//! an invalid scenario.

use crate::params::LoanParameters;
use crate::HomeRoiResult;

/// Serialise parameters to their persisted text form.
pub fn to_yaml_string(params: &LoanParameters) -> HomeRoiResult<String> {
    Ok(serde_yaml::to_string(params)?)
}

/// Parse and validate parameters from their persisted text form.
pub fn from_yaml_str(text: &str) -> HomeRoiResult<LoanParameters> {
    let params: LoanParameters = serde_yaml::from_str(text)?;
    params.validate()?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HomeRoiError;
    use crate::params::PmiPolicy;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_trip_defaults() {
        let params = LoanParameters::default();
        let text = to_yaml_string(&params).unwrap();
        assert_eq!(from_yaml_str(&text).unwrap(), params);
    }

    #[test]
    fn test_round_trip_custom() {
        let params = LoanParameters {
            home_value: dec!(412_345.67),
            down_payment: dec!(90_000),
            loan_apr: dec!(0.0615),
            loan_term_years: 30,
            extend_years: 7,
            pmi_policy: PmiPolicy::RecomputeMonthly,
            ..Default::default()
        };
        let text = to_yaml_string(&params).unwrap();
        assert_eq!(from_yaml_str(&text).unwrap(), params);
    }

    #[test]
    fn test_flat_mapping_with_numbers_and_defaults() {
        let text = "\
home_value: 400000
down_payment: 100000
loan_apr: 0.05
loan_term_years: 30
property_tax_rate: 0.02
pmi_rate: 0.015
appraisal_growth_rate: 0.03
closing_rate: 0.034
";
        let params = from_yaml_str(text).unwrap();
        assert_eq!(params.home_value, dec!(400000));
        assert_eq!(params.payments_per_year, 12);
        assert_eq!(params.extend_years, 0);
        assert_eq!(params.pmi_policy, PmiPolicy::FreezeAtOrigin);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let mut params = LoanParameters::default();
        params.down_payment = dec!(500_000);
        let text = to_yaml_string(&params).unwrap();
        assert!(matches!(
            from_yaml_str(&text),
            Err(HomeRoiError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_malformed_yaml_is_serialization_error() {
        assert!(matches!(
            from_yaml_str("home_value: [1, 2"),
            Err(HomeRoiError::SerializationError(_))
        ));
    }
}
