//! Typed views of the documents the core reads and writes.
//!
//! Field names match the stored documents (`camelCase`), so the same store
//! can be shared with clients written against the original layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use chatter_shared::constants::{DEFAULT_DISPLAY_NAME, EMPTY_INBOX_PREVIEW};
use chatter_shared::format::time_ago;
use chatter_shared::{ConversationKey, Profile, UserId};
use chatter_store::{Document, Timestamp};

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// The shared record of a two-party conversation, stored at `chats/{key}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub participants: Vec<UserId>,
    /// Missing only if the record was first written by a touch.
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    /// Last activity.
    pub updated_at: Timestamp,
    #[serde(default)]
    pub last_message: String,
}

/// Result of ensuring a conversation exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRef {
    pub key: ConversationKey,
    pub conversation: Conversation,
    /// Whether this call created the record.
    pub created: bool,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One entry of a conversation's message log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Store-generated document id; not a stored field.
    #[serde(skip)]
    pub id: String,
    pub text: String,
    pub sender_id: UserId,
    /// Server-assigned; the only sort key.
    pub created_at: Timestamp,
}

impl Message {
    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender_id == user
    }

    pub(crate) fn from_document(doc: &Document) -> chatter_store::Result<Self> {
        let mut message: Message = doc.decode()?;
        message.id = doc.id().to_string();
        Ok(message)
    }
}

// ---------------------------------------------------------------------------
// Inbox entry
// ---------------------------------------------------------------------------

/// One row of a user's recent-conversations list, stored at
/// `userChats/{owner}/items/{key}`.
///
/// Holds a copy of the counterparty's profile and of the conversation's
/// last activity, so the list renders without further reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InboxEntry {
    pub chat_id: ConversationKey,
    pub other_uid: UserId,
    #[serde(default)]
    pub other_name: String,
    #[serde(default)]
    pub other_photo: String,
    #[serde(default)]
    pub last_message: String,
    pub updated_at: Timestamp,
}

impl InboxEntry {
    /// Last message text, or the placeholder for a conversation with none.
    pub fn preview(&self) -> &str {
        if self.last_message.is_empty() {
            EMPTY_INBOX_PREVIEW
        } else {
            &self.last_message
        }
    }

    pub fn display_name(&self) -> &str {
        if self.other_name.trim().is_empty() {
            DEFAULT_DISPLAY_NAME
        } else {
            &self.other_name
        }
    }

    /// Short relative age of the last activity, e.g. `5m`.
    pub fn last_active(&self, now: DateTime<Utc>) -> String {
        time_ago(now, self.updated_at.to_datetime())
    }

    /// Profile snapshot of the counterparty, for reopening the conversation
    /// from the list.  The email is not part of the snapshot.
    pub fn counterparty_profile(&self) -> Profile {
        Profile::new(
            self.other_uid.clone(),
            self.other_name.clone(),
            String::new(),
            self.other_photo.clone(),
        )
    }
}

/// Decode every document of a snapshot, skipping (and logging) the ones
/// that do not have the expected shape.
pub(crate) fn decode_all<T>(
    docs: &[Document],
    decode: impl Fn(&Document) -> chatter_store::Result<T>,
) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match decode(doc) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(path = %doc.path(), error = %e, "skipping malformed document");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(last_message: &str, other_name: &str) -> InboxEntry {
        serde_json::from_value(json!({
            "chatId": "u1_u2",
            "otherUid": "u2",
            "otherName": other_name,
            "otherPhoto": "https://example.test/u2.svg",
            "lastMessage": last_message,
            "updatedAt": 1_700_000_000_000_000i64,
        }))
        .unwrap()
    }

    #[test]
    fn test_preview_placeholder() {
        assert_eq!(entry("", "Ada").preview(), "Say hi 👋");
        assert_eq!(entry("hey", "Ada").preview(), "hey");
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(entry("", "  ").display_name(), "Anonymous");
    }

    #[test]
    fn test_counterparty_profile() {
        let profile = entry("hey", "Ada").counterparty_profile();
        assert_eq!(profile.uid.as_str(), "u2");
        assert_eq!(profile.name, "Ada");
        assert_eq!(profile.photo_url, "https://example.test/u2.svg");
    }

    #[test]
    fn test_field_names_match_stored_layout() {
        let message = Message {
            id: "m1".into(),
            text: "hi".into(),
            sender_id: UserId::parse("u1").unwrap(),
            created_at: Timestamp::from_micros(5),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"text": "hi", "senderId": "u1", "createdAt": 5})
        );
    }
}
