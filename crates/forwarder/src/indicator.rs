//! Status indicators

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use crate::error::IndicatorError;

/// The two status outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indicator {
    /// Lit while reporting is on
    Mode,
    /// Lit while frames are being forwarded
    Traffic,
}

impl Indicator {
    pub fn index(self) -> usize {
        match self {
            Indicator::Mode => 0,
            Indicator::Traffic => 1,
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indicator::Mode => f.write_str("mode"),
            Indicator::Traffic => f.write_str("traffic"),
        }
    }
}

/// On/off status outputs driven by the forwarding task
pub trait Indicators: Send {
    fn set(&mut self, indicator: Indicator, on: bool) -> Result<(), IndicatorError>;
}

/// Indicators rendered as log records. Only state changes are logged.
#[derive(Debug, Default)]
pub struct LogIndicators {
    state: [bool; 2],
}

impl LogIndicators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self, indicator: Indicator) -> bool {
        self.state[indicator.index()]
    }
}

impl Indicators for LogIndicators {
    fn set(&mut self, indicator: Indicator, on: bool) -> Result<(), IndicatorError> {
        let slot = &mut self.state[indicator.index()];
        if *slot != on {
            *slot = on;
            match indicator {
                Indicator::Mode => info!(%indicator, on, "indicator"),
                // Toggles every cycle under traffic
                Indicator::Traffic => trace!(%indicator, on, "indicator"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_indicators_track_state() {
        let mut leds = LogIndicators::new();
        assert!(!leds.is_on(Indicator::Mode));

        leds.set(Indicator::Mode, true).unwrap();
        leds.set(Indicator::Traffic, true).unwrap();
        leds.set(Indicator::Traffic, false).unwrap();

        assert!(leds.is_on(Indicator::Mode));
        assert!(!leds.is_on(Indicator::Traffic));
    }
}
