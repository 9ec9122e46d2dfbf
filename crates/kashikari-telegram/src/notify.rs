//! Direct-message delivery of monthly accrual notices.

use std::sync::Arc;

use async_trait::async_trait;

use kashikari_core::{
    domain::{ChatId, UserId},
    formatting::format_amount,
    messaging::port::{MessagingPort, NotificationSink},
    scheduler::AccrualNotice,
    Result,
};

/// Renders an [`AccrualNotice`] to Telegram HTML and DMs the borrower.
///
/// For private chats the chat id equals the user id, so the borrower id is
/// the delivery address.
pub struct DirectMessageNotifier {
    messenger: Arc<dyn MessagingPort>,
}

impl DirectMessageNotifier {
    pub fn new(messenger: Arc<dyn MessagingPort>) -> Self {
        Self { messenger }
    }
}

#[async_trait]
impl NotificationSink for DirectMessageNotifier {
    async fn notify(&self, borrower: UserId, notice: &AccrualNotice) -> Result<()> {
        let html = render_notice(notice);
        self.messenger.send_html(ChatId(borrower.0), &html).await?;
        Ok(())
    }
}

fn render_notice(n: &AccrualNotice) -> String {
    format!(
        "📅 <b>月次利子のお知らせ</b>\n\n\
相手: {}\n\
借入元本: {} 円\n\
利率: {}%\n\
今月の利子: {} 円\n\
利子を含む総借金: {} 円",
        n.lender.0,
        format_amount(n.initial_principal),
        format_amount(n.rate),
        format_amount(n.interest),
        format_amount(n.total_due),
    )
}
