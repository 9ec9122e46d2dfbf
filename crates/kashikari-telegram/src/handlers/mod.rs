//! Telegram update handlers.
//!
//! Inbound messages are either the `$hello` easter egg, a slash command, or
//! ignored. Command handling is fully contained in `commands`; any unexpected
//! failure is caught there and rendered generically.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::AppState;

mod commands;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if text.trim_start().starts_with("$hello") {
        let _ = bot.send_message(msg.chat.id, "Hello!").await;
        return Ok(());
    }

    if text.starts_with('/') {
        return commands::handle_command(msg, state).await;
    }

    Ok(())
}
