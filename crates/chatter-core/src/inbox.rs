//! Per-user recent-conversations lists.
//!
//! Every conversation has one inbox entry per participant.  Entries are
//! projections of the message log: they are written after the message, not
//! atomically with it, and may lag or miss an update when a write fails.
//! Recency fields only ever move forward (`merge_if_newer` on `updatedAt`),
//! so replays and out-of-order writes converge on the newest values, and
//! reopening a conversation repairs whatever the fan-out left behind.

use std::sync::Arc;

use tracing::{debug, warn};

use chatter_shared::{ConversationKey, Profile, UserId, ValidationError};
use chatter_store::{Direction, DocumentStore, Query, Subscription, Timestamp, Write};

use crate::conversations::ConversationStore;
use crate::error::{ChatError, Result};
use crate::messages::MessageStream;
use crate::models::{decode_all, InboxEntry, Message};
use crate::paths;

/// Receives the owner's entries, most recent first, on every change.
pub type InboxCallback = Arc<dyn Fn(Result<Vec<InboxEntry>>) + Send + Sync>;

/// Outcome of one write of the fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    /// The target already held newer activity.
    Superseded,
    Failed(String),
}

impl StepOutcome {
    fn from_write(result: Result<bool>) -> Self {
        match result {
            Ok(true) => StepOutcome::Applied,
            Ok(false) => StepOutcome::Superseded,
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

/// What happened to the three denormalized writes of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub conversation: StepOutcome,
    pub sender_entry: StepOutcome,
    pub counterparty_entry: StepOutcome,
}

impl FanoutReport {
    pub fn is_complete(&self) -> bool {
        !(self.conversation.is_failed()
            || self.sender_entry.is_failed()
            || self.counterparty_entry.is_failed())
    }
}

#[derive(Clone)]
pub struct Inbox {
    store: Arc<dyn DocumentStore>,
    conversations: ConversationStore,
    messages: MessageStream,
}

impl Inbox {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        conversations: ConversationStore,
        messages: MessageStream,
    ) -> Self {
        Self {
            store,
            conversations,
            messages,
        }
    }

    /// Propagate `message` to the conversation record and both inbox
    /// entries, in that order.
    ///
    /// Every step is attempted even if an earlier one failed; failures are
    /// logged and reported, never raised.  All three writes carry the
    /// message's own timestamp, so both entries end up with the same
    /// `updatedAt`.
    pub async fn record_message(&self, key: &ConversationKey, message: &Message) -> FanoutReport {
        let sender = &message.sender_id;
        let at = message.created_at;

        let conversation = StepOutcome::from_write(
            self.conversations
                .touch_conversation_at(key, &message.text, at)
                .await,
        );
        let sender_entry =
            StepOutcome::from_write(self.record_activity(key, sender, &message.text, at).await);
        let counterparty_entry = match key.counterpart(sender) {
            Some(other) => {
                StepOutcome::from_write(self.record_activity(key, &other, &message.text, at).await)
            }
            None => StepOutcome::Failed(format!("{sender} is not a participant")),
        };

        let report = FanoutReport {
            conversation,
            sender_entry,
            counterparty_entry,
        };
        if report.is_complete() {
            debug!(key = %key, "fan-out complete");
        } else {
            warn!(key = %key, report = ?report, "partial fan-out; entries repair on next open");
        }
        report
    }

    async fn record_activity(
        &self,
        key: &ConversationKey,
        owner: &UserId,
        last_message: &str,
        at: Timestamp,
    ) -> Result<bool> {
        let other = key.counterpart(owner).ok_or_else(|| ChatError::NotAParticipant {
            user: owner.clone(),
            key: key.clone(),
        })?;
        let write = Write::new()
            .set("chatId", key.as_str())
            .set("otherUid", other.as_str())
            .set("lastMessage", last_message)
            .set("updatedAt", at);
        Ok(self
            .store
            .merge_if_newer(&paths::inbox_entry(owner, key)?, write, "updatedAt")
            .await?
            .is_some())
    }

    /// Make sure both participants have an entry for `key`, each holding the
    /// other's profile snapshot.
    ///
    /// The last-message fields are taken from the newest message in the log,
    /// or from the conversation record when the log is empty, so entries left
    /// stale by an interrupted fan-out are brought up to date.
    ///
    /// Both profiles must be the two distinct participants of `key`; nothing
    /// is read or written otherwise.
    pub async fn ensure_inbox_entries(&self, key: &ConversationKey, a: &Profile, b: &Profile) -> Result<()> {
        if a.uid == b.uid {
            return Err(ValidationError::SelfConversation.into());
        }
        if let Some(outsider) = [a, b].into_iter().find(|p| !key.contains(&p.uid)) {
            return Err(ChatError::NotAParticipant {
                user: outsider.uid.clone(),
                key: key.clone(),
            });
        }

        let (last_message, at) = match self.messages.latest(key).await? {
            Some(message) => (message.text, Some(message.created_at)),
            None => match self.conversations.get_conversation(key).await? {
                Some(conversation) => (conversation.last_message, Some(conversation.updated_at)),
                None => (String::new(), None),
            },
        };

        for (owner, other) in [(a, b), (b, a)] {
            let path = paths::inbox_entry(&owner.uid, key)?;
            let snapshot = Write::new()
                .set("chatId", key.as_str())
                .set("otherUid", other.uid.as_str())
                .set("otherName", other.name.as_str())
                .set("otherPhoto", other.photo_url.as_str());

            let with_activity = snapshot.clone().set("lastMessage", last_message.as_str());
            let with_activity = match at {
                Some(at) => with_activity.set("updatedAt", at),
                None => with_activity.server_timestamp("updatedAt"),
            };

            let applied = self
                .store
                .merge_if_newer(&path, with_activity, "updatedAt")
                .await?
                .is_some();
            if !applied {
                // Activity is already current; refresh the profile copy only.
                self.store.upsert_merge(&path, snapshot).await?;
            }
            debug!(key = %key, owner = %owner.uid, applied, "inbox entry ensured");
        }
        Ok(())
    }

    /// Live view of `owner`'s entries, most recent first.
    pub async fn subscribe_inbox(&self, owner: &UserId, on_change: InboxCallback) -> Result<Subscription> {
        let subscription = self
            .store
            .subscribe(
                Self::inbox_query(owner)?,
                Box::new(move |snapshot| {
                    on_change(
                        snapshot
                            .map(|docs| decode_all(&docs, |doc| doc.decode()))
                            .map_err(ChatError::from),
                    )
                }),
            )
            .await?;
        Ok(subscription)
    }

    /// `owner`'s entries, most recent first.
    pub async fn list_inbox(&self, owner: &UserId) -> Result<Vec<InboxEntry>> {
        let docs = self.store.query(&Self::inbox_query(owner)?).await?;
        Ok(decode_all(&docs, |doc| doc.decode()))
    }

    fn inbox_query(owner: &UserId) -> Result<Query> {
        Ok(Query::new(paths::inbox(owner)?).order_by("updatedAt", Direction::Descending))
    }
}
