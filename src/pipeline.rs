// =============================================================================
// Report Pipeline — evaluate the configured basket and render the report
// =============================================================================
//
// Stateless per call: every run fetches fresh prices, so concurrent runs from
// different triggers never share mutable state.
// =============================================================================

use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument as _};
use uuid::Uuid;

use crate::evaluator::BatchEvaluator;
use crate::report::{build_report, Report};
use crate::types::Instrument;

/// What caused a pipeline run (for logs only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    OnDemand,
    Daily,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnDemand => write!(f, "on-demand"),
            Self::Daily => write!(f, "daily"),
        }
    }
}

/// The configured basket plus the evaluator that prices it.
#[derive(Clone)]
pub struct ReportPipeline {
    evaluator: BatchEvaluator,
    instruments: Arc<[Instrument]>,
}

impl ReportPipeline {
    pub fn new(evaluator: BatchEvaluator, instruments: Vec<Instrument>) -> Self {
        Self {
            evaluator,
            instruments: instruments.into(),
        }
    }

    /// Evaluate the basket as of today and build the report.
    pub async fn run(&self, trigger: Trigger) -> Report {
        let run_id = Uuid::new_v4();
        let span = info_span!("report_run", %run_id, %trigger);
        async {
            let results = self.evaluator.evaluate_batch(&self.instruments).await;
            let report = build_report(&results);
            if report.is_complete_failure() {
                warn!(failed = report.failed.len(), "every instrument failed");
            }
            info!(
                ranked = report.ranked.len(),
                failed = report.failed.len(),
                "report built"
            );
            report
        }
        .instrument(span)
        .await
    }

    /// Same as [`run`](Self::run) with an explicit window end date.
    #[cfg(test)]
    pub async fn run_as_of(&self, today: chrono::NaiveDate) -> Report {
        let results = self
            .evaluator
            .evaluate_batch_as_of(&self.instruments, today)
            .await;
        build_report(&results)
    }
}
