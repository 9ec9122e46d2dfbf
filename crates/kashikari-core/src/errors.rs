use crate::domain::UserId;

/// Core error type.
///
/// Adapter crates should map their specific errors into this type so the bot
/// core can handle failures consistently (user-facing rejection vs log-only).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// Malformed amount/rate or a self-referential pair. Rejected with no
    /// state change.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Operation referenced a pair with no recorded debt. Non-fatal.
    #[error("no debt recorded between user {} and user {}", borrower.0, lender.0)]
    NoSuchDebt { borrower: UserId, lender: UserId },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
