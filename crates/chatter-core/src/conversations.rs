//! Conversation records.
//!
//! A record is created lazily the first time either participant shows intent
//! to talk, is never deleted, and is touched on every send.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use chatter_shared::{ConversationKey, UserId};
use chatter_store::{DocumentStore, Timestamp, Write};

use crate::error::{ChatError, Result};
use crate::models::{Conversation, ConversationRef};
use crate::paths;

#[derive(Clone)]
pub struct ConversationStore {
    store: Arc<dyn DocumentStore>,
}

impl ConversationStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Return the record for `key`, creating it if absent.
    ///
    /// Idempotent: an existing record is returned unchanged.  If two callers
    /// race on the first creation only one write lands, so the creation time
    /// never moves.
    pub async fn ensure_conversation(
        &self,
        key: &ConversationKey,
        a: &UserId,
        b: &UserId,
    ) -> Result<ConversationRef> {
        if let Some(outsider) = [a, b].into_iter().find(|u| !key.contains(u)) {
            return Err(ChatError::NotAParticipant {
                user: outsider.clone(),
                key: key.clone(),
            });
        }

        let path = paths::conversation(key)?;
        if let Some(doc) = self.store.get(&path).await? {
            return Ok(ConversationRef {
                key: key.clone(),
                conversation: doc.decode()?,
                created: false,
            });
        }

        let (lo, hi) = key.participants();
        let write = Write::new()
            .set("participants", participants(&lo, &hi))
            .server_timestamp("createdAt")
            .server_timestamp("updatedAt");

        let (doc, created) = match self.store.create(&path, write).await? {
            Some(doc) => (doc, true),
            None => {
                // Lost the creation race; read back the winner.
                let doc = self
                    .store
                    .get(&path)
                    .await?
                    .ok_or_else(|| chatter_store::StoreError::NotFound(path.to_string()))?;
                (doc, false)
            }
        };

        if created {
            info!(key = %key, "conversation created");
        }
        Ok(ConversationRef {
            key: key.clone(),
            conversation: doc.decode()?,
            created,
        })
    }

    /// Record `last_message` as the latest activity, stamped now.
    pub async fn touch_conversation(&self, key: &ConversationKey, last_message: &str) -> Result<bool> {
        self.touch(key, last_message, None).await
    }

    /// Record `last_message` as the activity at `at`, unless the record
    /// already reflects something later.  Returns whether it was applied.
    pub async fn touch_conversation_at(
        &self,
        key: &ConversationKey,
        last_message: &str,
        at: Timestamp,
    ) -> Result<bool> {
        self.touch(key, last_message, Some(at)).await
    }

    async fn touch(&self, key: &ConversationKey, last_message: &str, at: Option<Timestamp>) -> Result<bool> {
        let (lo, hi) = key.participants();
        let mut write = Write::new()
            .set("participants", participants(&lo, &hi))
            .set("lastMessage", last_message);
        write = match at {
            Some(at) => write.set("updatedAt", at),
            None => write.server_timestamp("updatedAt"),
        };

        let applied = self
            .store
            .merge_if_newer(&paths::conversation(key)?, write, "updatedAt")
            .await?
            .is_some();
        debug!(key = %key, applied, "conversation touched");
        Ok(applied)
    }

    pub async fn get_conversation(&self, key: &ConversationKey) -> Result<Option<Conversation>> {
        match self.store.get(&paths::conversation(key)?).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }
}

fn participants(a: &UserId, b: &UserId) -> Value {
    Value::from(vec![a.as_str(), b.as_str()])
}
