// =============================================================================
// Daily Schedule — once-a-day cron expression
// =============================================================================
//
// Accepts the five-field cron form restricted to a single daily firing:
//
//   "<minute> <hour> * * *"      e.g. "30 8 * * *" = every day at 08:30 UTC
//
// Day-of-month, month and day-of-week must be `*`.
// =============================================================================

use chrono::{DateTime, Days, NaiveTime, Timelike, Utc};

use crate::error::PipelineError;

/// A once-daily trigger time, interpreted in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
}

impl DailySchedule {
    pub fn at(hour: u32, minute: u32) -> Result<Self, PipelineError> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(|time| Self { time })
            .ok_or_else(|| PipelineError::Schedule(format!("{hour:02}:{minute:02} is not a valid time")))
    }

    /// Parse a `"M H * * *"` expression.
    pub fn parse(expr: &str) -> Result<Self, PipelineError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let &[minute, hour, dom, month, dow] = fields.as_slice() else {
            return Err(PipelineError::Schedule(format!(
                "expected 5 fields, got {} in {expr:?}",
                fields.len()
            )));
        };

        if [dom, month, dow].iter().any(|f| *f != "*") {
            return Err(PipelineError::Schedule(format!(
                "only daily schedules are supported (\"M H * * *\"), got {expr:?}"
            )));
        }

        let minute: u32 = minute
            .parse()
            .map_err(|_| PipelineError::Schedule(format!("invalid minute {minute:?}")))?;
        let hour: u32 = hour
            .parse()
            .map_err(|_| PipelineError::Schedule(format!("invalid hour {hour:?}")))?;

        Self::at(hour, minute)
    }

    /// The first firing strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.time).and_utc();
        if today > now {
            return today;
        }
        let tomorrow = now
            .date_naive()
            .checked_add_days(Days::new(1))
            .unwrap_or(now.date_naive());
        tomorrow.and_time(self.time).and_utc()
    }
}

impl std::fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} * * *", self.time.minute(), self.time.hour())
    }
}
