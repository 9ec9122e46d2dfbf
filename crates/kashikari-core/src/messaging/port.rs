use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef, UserId},
    scheduler::AccrualNotice,
    Result,
};

/// Outbound message port.
///
/// Telegram is the first implementation; the shape is kept narrow so future
/// adapters (Slack/Discord) can fit behind the same interface.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;
}

/// Delivery of monthly accrual notices.
///
/// The scheduler calls this once per relationship per pass; the adapter owns
/// rendering and transport. Failures are reported back as non-fatal events.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, borrower: UserId, notice: &AccrualNotice) -> Result<()>;
}
