// =============================================================================
// Pipeline Errors
// =============================================================================
//
// Every failure the report pipeline can observe.  Per-instrument variants
// (fetch, insufficient data, invalid price, timeout) are absorbed by the batch
// evaluator and rendered in the report footer; they never abort a batch.
// Transport failures are logged and dropped.
// =============================================================================

use thiserror::Error;

/// All errors generated by the RSI report pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("failed to fetch prices for {symbol}: {reason}")]
    DataFetch { symbol: String, reason: String },

    #[error("insufficient data: need more than {needed} closes, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("invalid close price {value} at index {index}")]
    InvalidPrice { index: usize, value: f64 },

    #[error("price fetch for {symbol} timed out after {secs}s")]
    Timeout { symbol: String, secs: u64 },

    #[error("chat transport failed: {0}")]
    Transport(String),

    #[error("invalid schedule expression: {0}")]
    Schedule(String),
}

impl PipelineError {
    pub fn data_fetch(symbol: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::DataFetch {
            symbol: symbol.into(),
            reason: reason.to_string(),
        }
    }
}
