use thiserror::Error;

/// Input rejected before any write reaches the store.
///
/// Validation failures are never retried; the UI shows them inline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message text is empty")]
    EmptyMessage,

    #[error("Message too long: {len} bytes (max {max})")]
    MessageTooLong { len: usize, max: usize },

    #[error("Cannot start a conversation with yourself")]
    SelfConversation,

    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),

    #[error("Invalid conversation key: {0:?}")]
    InvalidConversationKey(String),
}

pub type Result<T> = std::result::Result<T, ValidationError>;
