// =============================================================================
// RSI Pulse — Main Entry Point
// =============================================================================
//
// Reports the 14-period RSI of a configured basket to a Telegram chat, on
// demand (any inbound message) and once a day at the configured time.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod chat;
mod delivery;
mod error;
mod evaluator;
mod indicators;
mod market_data;
mod pipeline;
mod report;
mod runtime_config;
mod sentiment;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::chat::TelegramClient;
use crate::delivery::DeliveryScheduler;
use crate::evaluator::BatchEvaluator;
use crate::market_data::YahooClient;
use crate::pipeline::ReportPipeline;
use crate::runtime_config::RuntimeConfig;

/// Config file used when `RSI_PULSE_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "rsi_pulse.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("RSI Pulse starting up");

    let config_path =
        std::env::var("RSI_PULSE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

    // `file_config` mirrors the file and is what gets saved on shutdown;
    // `config` adds the environment overrides for this run only.
    let mut file_config = RuntimeConfig::load_or_default(&config_path)
        .with_context(|| format!("cannot start with config {config_path}"))?;
    let mut config = file_config.clone();
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    let schedule = config.schedule()?;

    let token = std::env::var("TELEGRAM_BOT_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty())
        .context("TELEGRAM_BOT_TOKEN must be set")?;

    info!(
        instruments = ?config.instruments.iter().map(|i| i.symbol.as_str()).collect::<Vec<_>>(),
        rsi_period = config.rsi_period,
        schedule = %schedule,
        recipient = ?config.recipient_chat_id,
        "Configured basket"
    );

    // ── 2. Clients ───────────────────────────────────────────────────────
    let prices = Arc::new(YahooClient::new(
        config.price_base_url.clone(),
        config.fetch_timeout_secs,
    )?);
    let telegram = Arc::new(TelegramClient::new(
        token,
        config.chat_base_url.clone(),
        config.poll_timeout_secs,
    )?);

    // ── 3. Pipeline & scheduler ──────────────────────────────────────────
    let evaluator = BatchEvaluator::new(prices, config.evaluator_settings());
    let pipeline = ReportPipeline::new(evaluator, config.instruments.clone());
    let scheduler = DeliveryScheduler::new(pipeline, telegram, config.recipient_chat_id);

    // Created once for the lifetime of the process.
    scheduler.start_daily_job(schedule);

    // ── 4. Inbound messages ──────────────────────────────────────────────
    let poller = tokio::spawn(scheduler.clone().run_inbound_loop());

    info!(
        daily_job = scheduler.daily_job_active(),
        "All subsystems running. Press Ctrl+C to stop."
    );

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    poller.abort();
    scheduler.stop_daily_job();

    file_config.remember_recipient(config.recipient_chat_id, scheduler.recipient());
    if let Err(e) = file_config.save(&config_path) {
        error!(error = %e, "Failed to save config on shutdown");
    }

    info!("RSI Pulse shut down complete.");
    Ok(())
}
