// =============================================================================
// Instrument Batch Evaluator — fetch + RSI per instrument, failures isolated
// =============================================================================
//
// For every configured instrument, in configured order:
//   1. Fetch daily closes for [today - lookback_days, today].
//   2. Normalise to oldest-first.
//   3. Compute RSI and keep the latest value.
//
// Any failure (fetch error, timeout, empty series, malformed close,
// insufficient data) turns into an absent result for that instrument only.
// `evaluate_batch` itself cannot fail and always returns one result per
// instrument.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::indicators::{latest_rsi, DEFAULT_PERIOD};
use crate::market_data::{closes_oldest_first, PriceSource};
use crate::sentiment::classify;
use crate::types::{Instrument, InstrumentResult};

/// Tunables for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorSettings {
    pub rsi_period: usize,
    pub lookback_days: u64,
    pub fetch_timeout: Duration,
    /// 1 = strictly sequential fetches.
    pub max_concurrent_fetches: usize,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            rsi_period: DEFAULT_PERIOD,
            lookback_days: 100,
            fetch_timeout: Duration::from_secs(10),
            max_concurrent_fetches: 1,
        }
    }
}

/// Runs the per-instrument fetch + compute pipeline for a whole basket.
#[derive(Clone)]
pub struct BatchEvaluator {
    source: Arc<dyn PriceSource>,
    settings: EvaluatorSettings,
}

impl BatchEvaluator {
    pub fn new(source: Arc<dyn PriceSource>, settings: EvaluatorSettings) -> Self {
        Self { source, settings }
    }

    /// Evaluate every instrument with today's (UTC) date as the window end.
    pub async fn evaluate_batch(&self, instruments: &[Instrument]) -> Vec<InstrumentResult> {
        self.evaluate_batch_as_of(instruments, Utc::now().date_naive())
            .await
    }

    /// Evaluate every instrument with `today` as the window end.
    ///
    /// The output has exactly `instruments.len()` entries in the same order.
    pub async fn evaluate_batch_as_of(
        &self,
        instruments: &[Instrument],
        today: NaiveDate,
    ) -> Vec<InstrumentResult> {
        let concurrency = self.settings.max_concurrent_fetches.max(1);

        // `buffered` yields in input order regardless of completion order.
        let results: Vec<InstrumentResult> = stream::iter(instruments.iter().cloned())
            .map(|instrument| self.evaluate_one(instrument, today))
            .buffered(concurrency)
            .collect()
            .await;

        let failed = results.iter().filter(|r| r.is_absent()).count();
        debug!(
            total = results.len(),
            failed,
            concurrency,
            "batch evaluated"
        );
        results
    }

    /// Failure boundary for a single instrument.
    async fn evaluate_one(&self, instrument: Instrument, today: NaiveDate) -> InstrumentResult {
        match self.current_rsi(&instrument.symbol, today).await {
            Ok(rsi) => {
                debug!(
                    instrument = %instrument,
                    rsi,
                    bucket = %classify(rsi),
                    "RSI computed"
                );
                InstrumentResult::success(instrument, rsi)
            }
            Err(e) => {
                warn!(instrument = %instrument, error = %e, "instrument evaluation failed");
                InstrumentResult::failure(instrument, e)
            }
        }
    }

    async fn current_rsi(&self, symbol: &str, today: NaiveDate) -> Result<f64, PipelineError> {
        let from = today
            .checked_sub_days(Days::new(self.settings.lookback_days))
            .unwrap_or(NaiveDate::MIN);

        let fetch = self.source.fetch_daily_closes(symbol, from, today);
        let points = tokio::time::timeout(self.settings.fetch_timeout, fetch)
            .await
            .map_err(|_| PipelineError::Timeout {
                symbol: symbol.to_string(),
                secs: self.settings.fetch_timeout.as_secs(),
            })??;

        if points.is_empty() {
            return Err(PipelineError::data_fetch(symbol, "no price data returned"));
        }

        let closes = closes_oldest_first(points);
        latest_rsi(&closes, self.settings.rsi_period)
    }
}
