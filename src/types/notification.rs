/// An outbound chat message, delivered fire-and-forget.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Recipient account id.
    pub user_id: i64,
    /// Message body (chat-layer Markdown).
    pub text: String,
}

impl Notification {
    pub fn new(user_id: i64, text: impl Into<String>) -> Self {
        Self {
            user_id,
            text: text.into(),
        }
    }
}
