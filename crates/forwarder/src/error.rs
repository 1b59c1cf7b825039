//! Forwarding Error Types

use thiserror::Error;

use crate::indicator::Indicator;

/// An indicator output could not be driven
#[derive(Debug, Error)]
#[error("Failed to set {indicator} indicator: {reason}")]
pub struct IndicatorError {
    pub indicator: Indicator,
    pub reason: String,
}

/// Errors that stop the forwarding task
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error(transparent)]
    Indicator(#[from] IndicatorError),
}
