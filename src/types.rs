// =============================================================================
// Shared types used across the RSI report pipeline
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A configured instrument: the symbol understood by the price source plus
/// the name shown in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub display_name: String,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            display_name: display_name.into(),
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.display_name, self.symbol)
    }
}

/// One daily close from the price history source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Outcome of evaluating a single instrument in a batch.
///
/// `rsi == None` marks a fetch or compute failure; `error` keeps the reason
/// for logging.  The report only looks at `rsi`.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentResult {
    pub instrument: Instrument,
    pub rsi: Option<f64>,
    pub error: Option<String>,
}

impl InstrumentResult {
    pub fn success(instrument: Instrument, rsi: f64) -> Self {
        Self {
            instrument,
            rsi: Some(rsi),
            error: None,
        }
    }

    pub fn failure(instrument: Instrument, error: impl std::fmt::Display) -> Self {
        Self {
            instrument,
            rsi: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_absent(&self) -> bool {
        self.rsi.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instrument_display_names_both() {
        let btc = Instrument::new("BTC-USD", "Bitcoin");
        assert_eq!(btc.to_string(), "Bitcoin (BTC-USD)");
    }

    #[test]
    fn failure_keeps_reason() {
        let result = InstrumentResult::failure(Instrument::new("X", "X"), "HTTP 500");
        assert!(result.is_absent());
        assert_eq!(result.error.as_deref(), Some("HTTP 500"));
    }
}
