//! The message log of a conversation.
//!
//! Messages are append-only and immutable.  Their only sort key is the
//! server-assigned `createdAt`; equal timestamps fall back to store write
//! order.  Readers always receive the full ordered log.

use std::sync::Arc;

use tracing::info;

use chatter_shared::validation::validate_message_text;
use chatter_shared::{ConversationKey, UserId};
use chatter_store::{Direction, DocumentStore, Query, Subscription, Write};

use crate::config::CoreConfig;
use crate::error::{ChatError, Result};
use crate::models::{decode_all, Message};
use crate::paths;

/// Receives the full ordered log on every change, or the error that ended
/// the stream.
pub type MessagesCallback = Arc<dyn Fn(Result<Vec<Message>>) + Send + Sync>;

#[derive(Clone)]
pub struct MessageStream {
    store: Arc<dyn DocumentStore>,
    config: CoreConfig,
}

impl MessageStream {
    pub fn new(store: Arc<dyn DocumentStore>, config: CoreConfig) -> Self {
        Self { store, config }
    }

    fn log_query(key: &ConversationKey) -> Result<Query> {
        Ok(Query::new(paths::messages(key)?).order_by("createdAt", Direction::Ascending))
    }

    /// Append a message from `sender`.
    ///
    /// Blank or oversized text is rejected before anything is written.  The
    /// returned message carries the timestamp the store assigned.
    pub async fn append(&self, key: &ConversationKey, sender: &UserId, text: &str) -> Result<Message> {
        validate_message_text(text, self.config.max_message_bytes)?;
        if !key.contains(sender) {
            return Err(ChatError::NotAParticipant {
                user: sender.clone(),
                key: key.clone(),
            });
        }

        let write = Write::new()
            .set("text", text)
            .set("senderId", sender.as_str())
            .server_timestamp("createdAt");
        let doc = self.store.append(&paths::messages(key)?, write).await?;
        let message = Message::from_document(&doc)?;

        info!(key = %key, sender = %sender, id = %message.id, "message appended");
        Ok(message)
    }

    /// Live view of the log, ascending.  The current log is delivered before
    /// this returns.  Dropping or cancelling the handle stops delivery.
    pub async fn subscribe(&self, key: &ConversationKey, on_change: MessagesCallback) -> Result<Subscription> {
        let subscription = self
            .store
            .subscribe(
                Self::log_query(key)?,
                Box::new(move |snapshot| {
                    on_change(
                        snapshot
                            .map(|docs| decode_all(&docs, Message::from_document))
                            .map_err(ChatError::from),
                    )
                }),
            )
            .await?;
        Ok(subscription)
    }

    /// The whole log, ascending.
    pub async fn history(&self, key: &ConversationKey) -> Result<Vec<Message>> {
        let docs = self.store.query(&Self::log_query(key)?).await?;
        Ok(decode_all(&docs, Message::from_document))
    }

    /// The newest message, if any.
    pub async fn latest(&self, key: &ConversationKey) -> Result<Option<Message>> {
        let query = Query::new(paths::messages(key)?)
            .order_by("createdAt", Direction::Descending)
            .limit(1);
        let docs = self.store.query(&query).await?;
        Ok(decode_all(&docs, Message::from_document).into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatter_shared::ValidationError;
    use chatter_store::{MemoryStore, StoreError};
    use std::sync::Mutex;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, MessageStream, ConversationKey) {
        let store = Arc::new(MemoryStore::new());
        let stream = MessageStream::new(store.clone(), CoreConfig::default());
        let key = ConversationKey::resolve(&uid("u1"), &uid("u2")).unwrap();
        (store, stream, key)
    }

    fn texts(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.text.as_str()).collect()
    }

    #[tokio::test]
    async fn test_fresh_subscriber_sees_send_order() {
        let (_store, stream, key) = setup();
        let (u1, u2) = (uid("u1"), uid("u2"));

        // Another subscriber is live while the messages go out.
        let _other = stream.subscribe(&key, Arc::new(|_| {})).await.unwrap();
        stream.append(&key, &u1, "hi").await.unwrap();
        stream.append(&key, &u2, "there").await.unwrap();
        stream.append(&key, &u1, "!").await.unwrap();

        let seen: Arc<Mutex<Vec<Vec<Message>>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let _sub = stream
            .subscribe(
                &key,
                Arc::new(move |snapshot| sink.lock().unwrap().push(snapshot.unwrap())),
            )
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(texts(&seen[0]), ["hi", "there", "!"]);
        assert!(seen[0].windows(2).all(|w| w[0].created_at < w[1].created_at));
    }

    #[tokio::test]
    async fn test_blank_text_writes_nothing() {
        let (_store, stream, key) = setup();
        let u1 = uid("u1");

        for text in ["", "   "] {
            let err = stream.append(&key, &u1, text).await.unwrap_err();
            assert!(matches!(err, ChatError::Validation(ValidationError::EmptyMessage)));
        }
        assert!(stream.history(&key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_text_rejected() {
        let store = Arc::new(MemoryStore::new());
        let stream = MessageStream::new(store, CoreConfig { max_message_bytes: 4 });
        let key = ConversationKey::resolve(&uid("u1"), &uid("u2")).unwrap();

        let err = stream.append(&key, &uid("u1"), "hello").await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Validation(ValidationError::MessageTooLong { len: 5, max: 4 })
        ));
    }

    #[tokio::test]
    async fn test_outsider_cannot_append() {
        let (_store, stream, key) = setup();
        let err = stream.append(&key, &uid("u3"), "hi").await.unwrap_err();
        assert!(matches!(err, ChatError::NotAParticipant { .. }));
    }

    #[tokio::test]
    async fn test_latest_and_history() {
        let (_store, stream, key) = setup();
        assert!(stream.latest(&key).await.unwrap().is_none());

        let u1 = uid("u1");
        stream.append(&key, &u1, "one").await.unwrap();
        let two = stream.append(&key, &u1, "two").await.unwrap();

        assert_eq!(stream.latest(&key).await.unwrap(), Some(two));
        assert_eq!(texts(&stream.history(&key).await.unwrap()), ["one", "two"]);
    }

    #[tokio::test]
    async fn test_unavailable_store_is_a_stream_error() {
        let (store, stream, key) = setup();
        let errors: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = Arc::clone(&errors);
        let _sub = stream
            .subscribe(
                &key,
                Arc::new(move |snapshot| {
                    if let Err(e) = snapshot {
                        sink.lock().unwrap().push(e.to_string());
                    }
                }),
            )
            .await
            .unwrap();

        store.terminate_subscriptions("connection lost");
        assert_eq!(errors.lock().unwrap().len(), 1);

        store.set_unavailable(true);
        let err = stream.append(&key, &uid("u1"), "hi").await.unwrap_err();
        assert!(matches!(err, ChatError::Store(StoreError::Unavailable(_))));
    }
}
