// =============================================================================
// Runtime Configuration — basket, indicator and delivery settings
// =============================================================================
//
// Loaded from a JSON file at startup; every field carries a serde default so
// a partial (or missing) file still yields a usable configuration.  A few
// fields can be overridden from the environment.  The chat credential is
// never stored here — it only comes from the environment.
//
// Persistence uses an atomic tmp + rename pattern so the registered recipient
// survives restarts without risking a half-written file.  Only the file copy
// is ever saved: environment overrides stay in memory.
// =============================================================================

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chat::ChatId;
use crate::delivery::DailySchedule;
use crate::evaluator::EvaluatorSettings;
use crate::indicators::DEFAULT_PERIOD;
use crate::types::Instrument;

/// Longest history window accepted (ten years).
const MAX_LOOKBACK_DAYS: u64 = 3650;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_instruments() -> Vec<Instrument> {
    vec![
        Instrument::new("BTC-USD", "Bitcoin"),
        Instrument::new("ETH-USD", "Ethereum"),
        Instrument::new("AAPL", "Apple"),
        Instrument::new("TSLA", "Tesla"),
    ]
}

fn default_rsi_period() -> usize {
    DEFAULT_PERIOD
}

fn default_lookback_days() -> u64 {
    100
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_max_concurrent_fetches() -> usize {
    1
}

fn default_daily_schedule() -> String {
    "0 8 * * *".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_price_base_url() -> String {
    crate::market_data::yahoo::DEFAULT_BASE_URL.to_string()
}

fn default_chat_base_url() -> String {
    crate::chat::telegram::DEFAULT_BASE_URL.to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Basket ----------------------------------------------------------------

    /// Instruments to report on, in default (pre-ranking) order.
    #[serde(default = "default_instruments")]
    pub instruments: Vec<Instrument>,

    // --- Indicator ---------------------------------------------------------------

    /// RSI look-back period.
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    /// Calendar days of history requested per instrument.  Must comfortably
    /// exceed `rsi_period` trading days.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u64,

    // --- Price source ------------------------------------------------------------

    #[serde(default = "default_price_base_url")]
    pub price_base_url: String,

    /// Per-instrument fetch timeout.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// 1 fetches instruments one after another.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    // --- Delivery ---------------------------------------------------------------

    /// Daily push time as `"M H * * *"` (UTC).
    #[serde(default = "default_daily_schedule")]
    pub daily_schedule: String,

    /// Chat that receives daily pushes.  Updated when a user sends `/start`.
    #[serde(default)]
    pub recipient_chat_id: Option<ChatId>,

    #[serde(default = "default_chat_base_url")]
    pub chat_base_url: String,

    /// Long-poll duration for inbound messages.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            instruments: default_instruments(),
            rsi_period: default_rsi_period(),
            lookback_days: default_lookback_days(),
            price_base_url: default_price_base_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            daily_schedule: default_daily_schedule(),
            recipient_chat_id: None,
            chat_base_url: default_chat_base_url(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// Falls back to defaults only when the file does not exist.  An
    /// unreadable or malformed file is an error, so it is never replaced by
    /// defaults on the next save.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(path, &content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e)
                .with_context(|| format!("failed to read config from {}", path.display())),
        }
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            instruments = config.instruments.len(),
            schedule = %config.daily_schedule,
            "config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write (write to
    /// `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "config saved (atomic)");
        Ok(())
    }

    /// Apply overrides from an environment lookup.
    ///
    /// * `RSI_PULSE_INSTRUMENTS` — `SYMBOL:Name,SYMBOL:Name` (a bare symbol
    ///   doubles as its display name)
    /// * `RSI_PULSE_SCHEDULE`    — daily cron expression
    /// * `TELEGRAM_CHAT_ID`      — daily recipient
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup("RSI_PULSE_INSTRUMENTS") {
            self.instruments = parse_instruments(&raw);
        }
        if let Some(schedule) = lookup("RSI_PULSE_SCHEDULE") {
            self.daily_schedule = schedule.trim().to_string();
        }
        if let Some(chat) = lookup("TELEGRAM_CHAT_ID") {
            let chat_id = chat
                .trim()
                .parse::<ChatId>()
                .with_context(|| format!("TELEGRAM_CHAT_ID is not a chat id: {chat:?}"))?;
            self.recipient_chat_id = Some(chat_id);
        }
        Ok(())
    }

    /// Carry a recipient registered at runtime into this (file) copy.
    ///
    /// `started_with` is the recipient the process started with, after
    /// environment overrides.  Nothing changes unless a chat registered since,
    /// so a `TELEGRAM_CHAT_ID` override is not written back.
    pub fn remember_recipient(
        &mut self,
        started_with: Option<ChatId>,
        current: Option<ChatId>,
    ) {
        if current != started_with {
            self.recipient_chat_id = current;
        }
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.instruments.is_empty() {
            bail!("no instruments configured");
        }
        if self.rsi_period == 0 {
            bail!("rsi_period must be positive");
        }
        if self.lookback_days > MAX_LOOKBACK_DAYS {
            bail!(
                "lookback_days ({}) exceeds {MAX_LOOKBACK_DAYS}",
                self.lookback_days
            );
        }
        // Roughly 5 trading days per 7 calendar days for equities.
        if self.lookback_days.saturating_mul(5) / 7 <= self.rsi_period as u64 {
            bail!(
                "lookback_days ({}) is too short for rsi_period ({})",
                self.lookback_days,
                self.rsi_period
            );
        }
        if self.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be positive");
        }
        self.schedule()?;
        Ok(())
    }

    pub fn schedule(&self) -> Result<DailySchedule> {
        DailySchedule::parse(&self.daily_schedule).context("invalid daily_schedule")
    }

    pub fn evaluator_settings(&self) -> EvaluatorSettings {
        EvaluatorSettings {
            rsi_period: self.rsi_period,
            lookback_days: self.lookback_days,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_concurrent_fetches: self.max_concurrent_fetches.max(1),
        }
    }
}

/// Parse `SYMBOL:Name,SYMBOL:Name`.  Empty entries are ignored.
fn parse_instruments(raw: &str) -> Vec<Instrument> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((symbol, name)) if !name.trim().is_empty() => {
                Instrument::new(symbol.trim().to_uppercase(), name.trim())
            }
            Some((symbol, _)) => {
                let symbol = symbol.trim().to_uppercase();
                Instrument::new(symbol.clone(), symbol)
            }
            None => Instrument::new(entry.to_uppercase(), entry),
        })
        .collect()
}
