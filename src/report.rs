// =============================================================================
// Report Builder — rank, classify and render a batch of RSI results
// =============================================================================
//
// Layout:
//
//   📈 RSI ranking
//   🔴 Bitcoin: 74
//   🟡 Apple: 41
//
//   ⚠️ Errors
//   TSLA
//
// Succeeded instruments are sorted by RSI descending; ties keep configured
// order.  The error section only appears when at least one instrument failed.
// =============================================================================

use crate::sentiment::{classify, Bucket};
use crate::types::InstrumentResult;

/// First line of every report.
pub const REPORT_HEADER: &str = "📈 RSI ranking";

/// Heading of the trailing failure section.
pub const ERRORS_HEADING: &str = "⚠️ Errors";

/// One ranked line of the report.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub symbol: String,
    pub display_name: String,
    pub rsi: f64,
    pub bucket: Bucket,
}

/// Ranked successes plus the raw symbols of failed instruments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Report {
    pub ranked: Vec<RankedEntry>,
    pub failed: Vec<String>,
}

/// Partition `results`, rank the successes and classify each one.
pub fn build_report(results: &[InstrumentResult]) -> Report {
    let mut ranked = Vec::with_capacity(results.len());
    let mut failed = Vec::new();

    for result in results {
        match result.rsi {
            Some(rsi) => ranked.push(RankedEntry {
                symbol: result.instrument.symbol.clone(),
                display_name: result.instrument.display_name.clone(),
                rsi,
                bucket: classify(rsi),
            }),
            None => failed.push(result.instrument.symbol.clone()),
        }
    }

    // Stable: equal RSI values keep configured order.
    ranked.sort_by(|a, b| b.rsi.total_cmp(&a.rsi));

    Report { ranked, failed }
}

impl Report {
    /// Render the report as chat text.
    pub fn render(&self) -> String {
        let mut lines = Vec::with_capacity(self.ranked.len() + self.failed.len() + 3);
        lines.push(REPORT_HEADER.to_string());

        for entry in &self.ranked {
            lines.push(format!(
                "{} {}: {}",
                entry.bucket.glyph(),
                entry.display_name,
                entry.rsi.round() as i64
            ));
        }

        if !self.failed.is_empty() {
            lines.push(String::new());
            lines.push(ERRORS_HEADING.to_string());
            lines.extend(self.failed.iter().cloned());
        }

        lines.join("\n")
    }

    pub fn is_complete_failure(&self) -> bool {
        self.ranked.is_empty() && !self.failed.is_empty()
    }
}
