// =============================================================================
// Chat Transport — outbound delivery and inbound triggers
// =============================================================================

pub mod telegram;

use async_trait::async_trait;

use crate::error::PipelineError;

pub use telegram::TelegramClient;

/// Opaque chat identifier understood by the transport.
pub type ChatId = i64;

/// A message received from a user or channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    /// `None` for non-text messages (stickers, photos, ...).
    pub text: Option<String>,
}

impl InboundMessage {
    /// Whether the message is the bot start command (`/start`, optionally
    /// with a `@botname` suffix or a payload).
    pub fn is_start_command(&self) -> bool {
        self.text
            .as_deref()
            .and_then(|t| t.split_whitespace().next())
            .map(|cmd| cmd == "/start" || cmd.starts_with("/start@"))
            .unwrap_or(false)
    }
}

/// Result of one inbound poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateBatch {
    /// Offset to pass to the next poll, if any update was received.
    pub next_offset: Option<i64>,
    pub messages: Vec<InboundMessage>,
}

/// Two-way chat transport: delivers report text and yields inbound triggers.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), PipelineError>;

    /// Wait for the next batch of inbound messages after `offset`.
    async fn poll_updates(&self, offset: Option<i64>) -> Result<UpdateBatch, PipelineError>;
}
