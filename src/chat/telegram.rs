// =============================================================================
// Telegram Bot API Client — long-polling inbound, sendMessage outbound
// =============================================================================
//
// SECURITY: The bot token is part of every request path.  It is never logged
// and is redacted from `Debug` output; request URLs are not logged either.
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::chat::{ChatId, ChatTransport, InboundMessage, UpdateBatch};
use crate::error::PipelineError;

/// Public Bot API host.
pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Slack added on top of the long-poll timeout for the HTTP client timeout.
const POLL_SLACK_SECS: u64 = 10;

/// Telegram Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    token: String,
    base_url: String,
    poll_timeout_secs: u64,
    client: reqwest::Client,
}

impl TelegramClient {
    /// Create a new `TelegramClient`.
    ///
    /// # Arguments
    /// * `token`             — bot token issued by BotFather.
    /// * `base_url`          — API host, normally [`DEFAULT_BASE_URL`].
    /// * `poll_timeout_secs` — long-poll duration for `getUpdates`.
    pub fn new(
        token: impl Into<String>,
        base_url: impl Into<String>,
        poll_timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(poll_timeout_secs + POLL_SLACK_SECS))
            .build()
            .context("failed to build reqwest client for Telegram")?;

        let base_url = base_url.into();
        debug!(base_url = %base_url, poll_timeout_secs, "TelegramClient initialised");

        Ok(Self {
            token: token.into(),
            base_url,
            poll_timeout_secs,
            client,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// GET getUpdates (long poll).
    ///
    /// Blocks for up to `poll_timeout_secs` waiting for new updates.
    #[instrument(skip(self), name = "telegram::get_updates")]
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<UpdateBatch> {
        let mut query = vec![("timeout", self.poll_timeout_secs.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }
        query.push(("allowed_updates", r#"["message"]"#.to_string()));

        let resp = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&query)
            .send()
            .await
            .context("GET getUpdates request failed")?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .context("failed to parse getUpdates response")?;

        if !status.is_success() || body["ok"].as_bool() != Some(true) {
            anyhow::bail!(
                "Telegram getUpdates returned {}: {}",
                status,
                describe(&body)
            );
        }

        let batch = parse_updates(&body)?;
        if !batch.messages.is_empty() {
            debug!(count = batch.messages.len(), "inbound messages received");
        }
        Ok(batch)
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    /// POST sendMessage.
    #[instrument(skip(self, text), name = "telegram::send_message")]
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), PipelineError> {
        let payload = json!({ "chat_id": chat_id, "text": text });

        let resp = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| PipelineError::Transport(format!("sendMessage request failed: {e}")))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| PipelineError::Transport(format!("invalid sendMessage response: {e}")))?;

        if !status.is_success() || body["ok"].as_bool() != Some(true) {
            return Err(PipelineError::Transport(format!(
                "sendMessage returned {}: {}",
                status,
                describe(&body)
            )));
        }

        debug!(chat_id, chars = text.chars().count(), "message delivered");
        Ok(())
    }

    async fn poll_updates(&self, offset: Option<i64>) -> Result<UpdateBatch, PipelineError> {
        self.get_updates(offset)
            .await
            .map_err(|e| PipelineError::Transport(format!("{e:#}")))
    }
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

fn describe(body: &Value) -> String {
    body["description"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

/// Parse a successful `getUpdates` body.
///
/// Updates without a `message` (edits, callbacks, ...) still advance the
/// offset but produce no inbound message.
pub(crate) fn parse_updates(body: &Value) -> Result<UpdateBatch> {
    let updates = body["result"]
        .as_array()
        .context("getUpdates result is not an array")?;

    let mut batch = UpdateBatch::default();
    for update in updates {
        let Some(update_id) = update["update_id"].as_i64() else {
            warn!("skipping update without update_id");
            continue;
        };
        let next = update_id + 1;
        batch.next_offset = Some(batch.next_offset.map_or(next, |o| o.max(next)));

        let message = &update["message"];
        let Some(chat_id) = message.pointer("/chat/id").and_then(Value::as_i64) else {
            continue;
        };
        batch.messages.push(InboundMessage {
            chat_id,
            text: message["text"].as_str().map(str::to_string),
        });
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_messages_and_offset() {
        let body = json!({
            "ok": true,
            "result": [
                { "update_id": 10, "message": { "chat": { "id": 42 }, "text": "/start" } },
                { "update_id": 11, "edited_message": { "chat": { "id": 42 }, "text": "x" } },
                { "update_id": 12, "message": { "chat": { "id": -100 }, "sticker": {} } }
            ]
        });
        let batch = parse_updates(&body).unwrap();
        assert_eq!(batch.next_offset, Some(13));
        assert_eq!(
            batch.messages,
            vec![
                InboundMessage { chat_id: 42, text: Some("/start".into()) },
                InboundMessage { chat_id: -100, text: None },
            ]
        );
    }

    #[test]
    fn empty_result_keeps_offset() {
        let batch = parse_updates(&json!({ "ok": true, "result": [] })).unwrap();
        assert_eq!(batch, UpdateBatch::default());
    }

    #[test]
    fn non_array_result_is_error() {
        assert!(parse_updates(&json!({ "ok": true, "result": {} })).is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let client = TelegramClient::new("123:secret", DEFAULT_BASE_URL, 30).unwrap();
        let out = format!("{client:?}");
        assert!(!out.contains("secret"));
        assert!(out.contains("<redacted>"));
    }
}
