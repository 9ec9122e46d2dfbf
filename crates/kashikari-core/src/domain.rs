/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric). Equal to the user id for private chats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Ordered (borrower, lender) key of a debt relationship.
///
/// A borrower holds at most one relationship per lender; repeat borrows
/// merge into the existing entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DebtPair {
    pub borrower: UserId,
    pub lender: UserId,
}
