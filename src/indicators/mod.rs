// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator implementations.  Every public function
// returns `Result` so callers are forced to handle insufficient-data and
// malformed-input scenarios.

pub mod rsi;

pub use rsi::{latest_rsi, DEFAULT_PERIOD};
