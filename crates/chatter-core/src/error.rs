use thiserror::Error;

use chatter_shared::{ConversationKey, UserId, ValidationError};
use chatter_store::StoreError;

/// Errors surfaced by the chat core.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Rejected before any write; never retried.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The store failed the operation or ended a subscription.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The session has been signed out.
    #[error("Session is signed out")]
    SignedOut,

    #[error("{user} is not a participant of conversation {key}")]
    NotAParticipant { user: UserId, key: ConversationKey },
}

/// What the user was doing when an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SignIn,
    SendMessage,
    OpenConversation,
    LoadConversations,
    LoadMessages,
    Search,
}

impl ChatError {
    /// Text suitable for showing to the user.
    ///
    /// Validation failures are shown as-is; anything else becomes a generic
    /// message for the failed action.
    pub fn user_message(&self, action: Action) -> String {
        match self {
            ChatError::Validation(e) => e.to_string(),
            ChatError::SignedOut => "You are signed out.".to_string(),
            ChatError::Store(_) | ChatError::NotAParticipant { .. } => match action {
                Action::SignIn => "Sign-in failed. Try again.",
                Action::SendMessage => "Message could not be sent.",
                Action::OpenConversation => "Conversation could not be opened.",
                Action::LoadConversations => "Conversation list could not load.",
                Action::LoadMessages => "Messages could not load.",
                Action::Search => "Search is unavailable right now.",
            }
            .to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ChatError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_shown_inline() {
        let err = ChatError::from(ValidationError::EmptyMessage);
        assert!(err.is_validation());
        assert_eq!(err.user_message(Action::SendMessage), "Message text is empty");
    }

    #[test]
    fn test_store_failures_are_generic() {
        let err = ChatError::from(StoreError::Unavailable("connection reset".into()));
        assert_eq!(
            err.user_message(Action::SendMessage),
            "Message could not be sent."
        );
        assert_eq!(
            err.user_message(Action::LoadConversations),
            "Conversation list could not load."
        );
        assert_eq!(err.user_message(Action::SignIn), "Sign-in failed. Try again.");
    }
}
