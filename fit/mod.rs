pub mod cv;
pub mod harness;
pub mod irls;
pub mod metrics;

use thiserror::Error;

/// Failures of the model-fit harness. Hitting an iteration cap is not one of
/// them; it is reported through `irls::FitStatus`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("The outcome has a single class across {n} observations; a logistic fit needs both cases and controls.")]
    SingleClass { n: usize },

    #[error("Dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

impl FitError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
