use std::sync::Arc;

use chrono::Utc;
use teloxide::{prelude::*, types::MessageEntityKind};

use kashikari_core::{
    domain::{ChatId, UserId},
    formatting::{escape_html, format_amount},
    ledger::{ReturnOutcome, TotalsReport},
    utils::AuditEvent,
    Error,
};

use crate::router::AppState;

const USAGE_BORROW: &str = "使用法: /borrow [相手] [金額]";
const USAGE_RETURN: &str = "使用法: /return [相手] [金額]";
const USAGE_INTEREST: &str = "使用法: /interest [相手] [利率]";
const NO_DEBT: &str = "借金がありません。";

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// The counterparty argument is either a text-mention entity (users without a
/// username) or a raw numeric id. Returns the resolved id plus a display label.
fn resolve_counterparty(msg: &Message, token: &str) -> Option<(UserId, String)> {
    if let Some(entities) = msg.parse_entities() {
        for e in entities {
            if let MessageEntityKind::TextMention { user } = e.kind() {
                return Some((UserId(user.id.0 as i64), user.first_name.clone()));
            }
        }
    }

    counterparty_from_token(token)
}

/// Raw-id fallback when the message carries no text mention.
fn counterparty_from_token(token: &str) -> Option<(UserId, String)> {
    let id = token.parse::<i64>().ok()?;
    Some((UserId(id), token.to_string()))
}

/// Splits the `[相手] [金額]` argument pair shared by /borrow, /return and
/// /interest into its raw counterparty token and parsed number.
fn split_pair_args(arg: &str) -> Option<(&str, f64)> {
    let mut tokens = arg.split_whitespace();
    let counterparty = tokens.next()?;
    let number = tokens.next()?.parse::<f64>().ok()?;
    Some((counterparty, number))
}

fn parse_pair_and_number(msg: &Message, arg: &str) -> Option<(UserId, String, f64)> {
    let (counterparty, number) = split_pair_args(arg)?;
    let (id, label) = resolve_counterparty(msg, counterparty)?;
    Some((id, label, number))
}

pub async fn handle_command(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let borrower = UserId(user.id.0 as i64);
    let chat_id = ChatId(msg.chat.id.0);

    let (cmd, arg) = parse_command(text);

    let reply = match cmd.as_str() {
        "borrow" => borrow_reply(&state, &msg, borrower, &arg).await,
        "return" => return_reply(&state, &msg, borrower, &arg).await,
        "interest" => interest_reply(&state, &msg, borrower, &arg).await,
        "total" => total_reply(&state, borrower).await,
        "start" | "help" => Ok(help_text()),
        _ => Ok(format!("未知のコマンドです: /{}", escape_html(&cmd))),
    };

    let html = match reply {
        Ok(html) => html,
        Err(e) => {
            // Internals only to the log; the user sees a short rejection.
            eprintln!("[CMD] /{cmd} from user {} failed: {e}", borrower.0);
            let _ = state
                .audit
                .write(AuditEvent::command_error(borrower.0, &e.to_string()));
            render_error(&e)
        }
    };

    if let Err(e) = state.messenger.send_html(chat_id, &html).await {
        eprintln!("[CMD] Failed to reply to /{cmd} in chat {}: {e}", chat_id.0);
    }
    Ok(())
}

async fn borrow_reply(
    state: &AppState,
    msg: &Message,
    borrower: UserId,
    arg: &str,
) -> kashikari_core::Result<String> {
    let Some((lender, label, amount)) = parse_pair_and_number(msg, arg) else {
        return Ok(USAGE_BORROW.to_string());
    };

    let snap = state.ledger.record_borrow(borrower, lender, amount).await?;
    let _ = state
        .audit
        .write(AuditEvent::borrow(borrower.0, lender.0, amount, snap.principal));

    Ok(render_borrow(amount, &label, snap.principal))
}

async fn return_reply(
    state: &AppState,
    msg: &Message,
    borrower: UserId,
    arg: &str,
) -> kashikari_core::Result<String> {
    let Some((lender, label, amount)) = parse_pair_and_number(msg, arg) else {
        return Ok(USAGE_RETURN.to_string());
    };

    let outcome = state.ledger.record_return(borrower, lender, amount).await?;
    let remaining = match outcome {
        ReturnOutcome::Settled => 0.0,
        ReturnOutcome::Outstanding(snap) => snap.principal,
    };
    let _ = state
        .audit
        .write(AuditEvent::repayment(borrower.0, lender.0, amount, remaining));

    Ok(render_return(amount, &label, &outcome))
}

async fn interest_reply(
    state: &AppState,
    msg: &Message,
    borrower: UserId,
    arg: &str,
) -> kashikari_core::Result<String> {
    let Some((lender, _label, rate)) = parse_pair_and_number(msg, arg) else {
        return Ok(USAGE_INTEREST.to_string());
    };

    let quote = state.ledger.assign_rate(borrower, lender, rate).await?;
    let _ = state.audit.write(AuditEvent::rate_assigned(
        borrower.0,
        lender.0,
        quote.rate,
        quote.interest,
    ));

    Ok(format!("毎月の利子: {} 円", format_amount(quote.interest)))
}

async fn total_reply(state: &AppState, borrower: UserId) -> kashikari_core::Result<String> {
    match state.ledger.totals_for(borrower, Utc::now()).await {
        None => Ok(NO_DEBT.to_string()),
        Some(report) => Ok(render_totals(&report)),
    }
}

fn render_borrow(amount: f64, lender_label: &str, principal: f64) -> String {
    format!(
        "あなたは {} 円を借りました。{}への総借金: {} 円",
        format_amount(amount),
        escape_html(lender_label),
        format_amount(principal)
    )
}

fn render_return(amount: f64, lender_label: &str, outcome: &ReturnOutcome) -> String {
    match outcome {
        ReturnOutcome::Settled => format!(
            "あなたは {} 円を返しました。{}への借金を完済しました。",
            format_amount(amount),
            escape_html(lender_label)
        ),
        ReturnOutcome::Outstanding(snap) => format!(
            "あなたは {} 円を返しました。{}への残りの借金: {} 円",
            format_amount(amount),
            escape_html(lender_label),
            format_amount(snap.principal)
        ),
    }
}

fn render_totals(report: &TotalsReport) -> String {
    let mut lines = vec!["<b>借金の内訳</b>".to_string()];
    for l in &report.lenders {
        lines.push(format!(
            "• {}: {} 円 (利子: {} 円)",
            l.lender.0,
            format_amount(l.principal),
            format_amount(l.interest)
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "総借金: {} 円",
        format_amount(report.total_principal)
    ));
    lines.push(format!(
        "毎月の利子合計: {} 円",
        format_amount(report.total_interest)
    ));
    lines.join("\n")
}

fn render_error(e: &Error) -> String {
    match e {
        Error::NoSuchDebt { .. } => NO_DEBT.to_string(),
        Error::InvalidOperation(_) => "無効な操作です。相手と金額を確認してください。".to_string(),
        _ => "エラーが発生しました。後でもう一度お試しください。".to_string(),
    }
}

fn help_text() -> String {
    "💴 <b>貸し借りボット</b>\n\n\
/borrow [相手] [金額] - 借金を記録\n\
/return [相手] [金額] - 返済を記録\n\
/interest [相手] [利率] - 利率を設定して毎月の利子を計算\n\
/total - 借金の合計を表示\n\
/help - このヘルプを表示\n\n\
相手はメンションまたはユーザーIDで指定します。\n\
毎月1日に利子のお知らせが届きます。"
        .to_string()
}
