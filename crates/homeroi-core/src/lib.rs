pub mod amortization;
pub mod config;
pub mod error;
pub mod formulas;
pub mod model;
pub mod params;
pub mod property_tax;
pub mod roi;
pub mod types;

#[cfg(feature = "sweep")]
pub mod sweep;

pub use error::HomeRoiError;
pub use model::HomeModel;
pub use params::{LoanParameters, PmiPolicy};
pub use types::*;

/// Standard result type for all home ROI operations
pub type HomeRoiResult<T> = Result<T, HomeRoiError>;
