use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio_util::sync::CancellationToken;

use kashikari_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use kashikari_core::{
    config::Config, ledger::Ledger, messaging::port::MessagingPort, scheduler::AccrualScheduler,
    utils::AuditLogger,
};

use crate::handlers;
use crate::notify::DirectMessageNotifier;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub ledger: Arc<Ledger>,
    pub messenger: Arc<dyn MessagingPort>,
    pub audit: Arc<AuditLogger>,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    ledger: Arc<Ledger>,
    audit: Arc<AuditLogger>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // Basic startup info.
    if let Ok(me) = bot.get_me().await {
        println!("kashikari started: @{}", me.username());
    }

    // Wrap the raw Telegram messenger with a throttling decorator: the
    // monthly reconciliation pass is burst-heavy. A 429 RetryAfter retry
    // stays at the Telegram adapter layer.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let sink = Arc::new(DirectMessageNotifier::new(messenger.clone()));
    let scheduler = AccrualScheduler::new(ledger.clone(), sink, audit.clone());
    let _accrual_loop = scheduler.start(shutdown.clone());

    let state = Arc::new(AppState {
        cfg,
        ledger,
        messenger,
        audit,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
