// =============================================================================
// Price History — source abstraction and series normalisation
// =============================================================================

pub mod yahoo;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::PipelineError;
use crate::types::PricePoint;

pub use yahoo::YahooClient;

/// Date format used for every date that crosses a source boundary.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A source of daily closing prices.
///
/// Implementations make one external request per call and never retry.  The
/// order of the returned points is unspecified.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_daily_closes(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, PipelineError>;
}

/// Sort `points` into ascending date order and return their closes.
///
/// When the source repeats a date the last occurrence wins.
pub fn closes_oldest_first(mut points: Vec<PricePoint>) -> Vec<f64> {
    points.sort_by_key(|p| p.date);

    let mut closes: Vec<f64> = Vec::with_capacity(points.len());
    let mut last_date = None;
    for point in points {
        if last_date == Some(point.date) {
            if let Some(prev) = closes.last_mut() {
                *prev = point.close;
            }
            continue;
        }
        last_date = Some(point.date);
        closes.push(point.close);
    }
    closes
}
