// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Seed average gain / average loss with the SMA of the first `period`
//          gains / losses.
// Step 3 — Apply Wilder's exponential smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Zero-loss convention:
//   avg_loss == 0, avg_gain > 0  => RSI = 100
//   avg_loss == 0, avg_gain == 0 => RSI = 0   (flat series: no momentum)
// =============================================================================

use crate::error::PipelineError;

/// Default look-back period.
pub const DEFAULT_PERIOD: usize = 14;

/// Compute the full RSI series for `closes` (oldest first) and `period`.
///
/// The returned vector has one RSI value for each close starting at index
/// `period` (the first `period` closes are consumed to seed the averages), so
/// its length is `closes.len() - period`.  Every value lies in `[0, 100]`.
///
/// # Errors
/// - `period == 0` or `closes.len() <= period` => [`PipelineError::InsufficientData`]
/// - a non-finite or non-positive close => [`PipelineError::InvalidPrice`]
pub fn compute_rsi(closes: &[f64], period: usize) -> Result<Vec<f64>, PipelineError> {
    if period == 0 || closes.len() <= period {
        return Err(PipelineError::InsufficientData {
            needed: period,
            got: closes.len(),
        });
    }

    if let Some((index, &value)) = closes
        .iter()
        .enumerate()
        .find(|(_, c)| !c.is_finite() || **c <= 0.0)
    {
        return Err(PipelineError::InvalidPrice { index, value });
    }

    // --- Compute price deltas ------------------------------------------------
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    // --- Seed averages with SMA of first `period` deltas ---------------------
    let (sum_gain, sum_loss) = deltas[..period].iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
        if d > 0.0 {
            (g + d, l)
        } else {
            (g, l + d.abs())
        }
    });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    let mut result = Vec::with_capacity(deltas.len() - period + 1);
    result.push(rsi_from_averages(avg_gain, avg_loss));

    // --- Wilder's smoothing for subsequent values ----------------------------
    for &delta in &deltas[period..] {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        result.push(rsi_from_averages(avg_gain, avg_loss));
    }

    Ok(result)
}

/// The most recent RSI value for `closes` (oldest first).
pub fn latest_rsi(closes: &[f64], period: usize) -> Result<f64, PipelineError> {
    let series = compute_rsi(closes, period)?;
    // compute_rsi always yields at least one value on success.
    series.last().copied().ok_or(PipelineError::InsufficientData {
        needed: period,
        got: closes.len(),
    })
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain > 0.0 { 100.0 } else { 0.0 };
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}
