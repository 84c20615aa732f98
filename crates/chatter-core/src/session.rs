//! The session: the one object a front end talks to.
//!
//! A session belongs to one signed-in user and moves between three states:
//!
//! ```text
//! NoActiveConversation --open(X)--> ConversationOpen(X) --open(Y)--> ConversationOpen(Y)
//!          \                               |
//!           `---------- sign_out ----------+------------------> LoggedOut
//! ```
//!
//! It owns at most one live message subscription (for the open
//! conversation) and at most one live inbox subscription.  Switching
//! conversations cancels the old message subscription before the new one is
//! made, and a generation counter drops any delivery for a conversation that
//! is no longer open.  Signing out cancels everything.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use chatter_shared::{ConversationKey, Profile};
use chatter_store::{DocumentStore, Subscription};

use crate::auth::AuthProvider;
use crate::config::CoreConfig;
use crate::conversations::ConversationStore;
use crate::directory::Directory;
use crate::error::{ChatError, Result};
use crate::inbox::{Inbox, InboxCallback};
use crate::messages::{MessageStream, MessagesCallback};
use crate::models::{ConversationRef, InboxEntry, Message};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NoActiveConversation,
    ConversationOpen(ConversationKey),
    LoggedOut,
}

/// The session's live subscriptions, at most one of each kind.
#[derive(Default)]
struct SubscriptionSlots {
    messages: Option<Subscription>,
    inbox: Option<Subscription>,
}

impl SubscriptionSlots {
    fn live(&self) -> usize {
        [&self.messages, &self.inbox]
            .into_iter()
            .flatten()
            .filter(|s| s.is_active())
            .count()
    }

    fn take_all(&mut self) -> Vec<Subscription> {
        self.messages.take().into_iter().chain(self.inbox.take()).collect()
    }
}

struct Inner {
    state: SessionState,
    counterparty: Option<Profile>,
    slots: SubscriptionSlots,
}

/// State reachable from store callbacks.
#[derive(Default)]
struct Live {
    generation: AtomicU64,
    signed_out: AtomicBool,
    messages: Mutex<Vec<Message>>,
    on_messages: Mutex<Option<MessagesCallback>>,
}

impl Live {
    fn message_listener(self: &Arc<Self>, generation: u64) -> MessagesCallback {
        let live = Arc::clone(self);
        Arc::new(move |snapshot| {
            if live.generation.load(Ordering::Acquire) != generation {
                return;
            }
            if let Ok(messages) = &snapshot {
                *lock(&live.messages) = messages.clone();
            }
            let callback = lock(&live.on_messages).clone();
            if let Some(callback) = callback {
                callback(snapshot);
            }
        })
    }
}

pub struct ChatSession {
    me: Profile,
    auth: Arc<dyn AuthProvider>,
    conversations: ConversationStore,
    messages: MessageStream,
    inbox: Inbox,
    directory: Directory,
    inner: Mutex<Inner>,
    live: Arc<Live>,
}

impl ChatSession {
    /// Start a session for the user `auth` reports as signed in, publishing
    /// their profile if this is their first sign-in.
    pub async fn start(
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
        config: CoreConfig,
    ) -> Result<Self> {
        let me = auth.current_user().ok_or(ChatError::SignedOut)?;

        let conversations = ConversationStore::new(Arc::clone(&store));
        let messages = MessageStream::new(Arc::clone(&store), config);
        let inbox = Inbox::new(Arc::clone(&store), conversations.clone(), messages.clone());
        let directory = Directory::new(store);

        directory.ensure_profile(&me).await?;
        info!(uid = %me.uid, "session started");

        Ok(Self {
            me,
            auth,
            conversations,
            messages,
            inbox,
            directory,
            inner: Mutex::new(Inner {
                state: SessionState::NoActiveConversation,
                counterparty: None,
                slots: SubscriptionSlots::default(),
            }),
            live: Arc::new(Live::default()),
        })
    }

    pub fn me(&self) -> &Profile {
        &self.me
    }

    pub fn state(&self) -> SessionState {
        lock(&self.inner).state.clone()
    }

    /// Profile of the other participant of the open conversation.
    pub fn counterparty(&self) -> Option<Profile> {
        lock(&self.inner).counterparty.clone()
    }

    /// Number of subscriptions this session currently holds open.
    pub fn live_subscriptions(&self) -> usize {
        lock(&self.inner).slots.live()
    }

    /// The open conversation's log as last delivered by the store.
    pub fn cached_messages(&self) -> Vec<Message> {
        lock(&self.live.messages).clone()
    }

    fn ensure_signed_in(&self) -> Result<()> {
        if lock(&self.inner).state == SessionState::LoggedOut {
            return Err(ChatError::SignedOut);
        }
        Ok(())
    }

    /// Open (creating if needed) the conversation with `other` and start
    /// streaming its messages.
    ///
    /// The conversation record and both inbox entries are ensured first; a
    /// previously open conversation is unsubscribed before the new stream
    /// is subscribed.
    pub async fn open_conversation(&self, other: &Profile) -> Result<ConversationRef> {
        self.ensure_signed_in()?;
        let key = ConversationKey::resolve(&self.me.uid, &other.uid)?;

        let conversation = self
            .conversations
            .ensure_conversation(&key, &self.me.uid, &other.uid)
            .await?;
        self.inbox
            .ensure_inbox_entries(&key, &self.me, other)
            .await?;

        let (generation, previous) = {
            let mut inner = lock(&self.inner);
            if inner.state == SessionState::LoggedOut {
                return Err(ChatError::SignedOut);
            }
            let generation = self.live.generation.fetch_add(1, Ordering::AcqRel) + 1;
            inner.state = SessionState::ConversationOpen(key.clone());
            inner.counterparty = Some(other.clone());
            (generation, inner.slots.messages.take())
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
        lock(&self.live.messages).clear();

        let subscription = match self
            .messages
            .subscribe(&key, self.live.message_listener(generation))
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                let mut inner = lock(&self.inner);
                if self.live.generation.load(Ordering::Acquire) == generation {
                    inner.state = SessionState::NoActiveConversation;
                    inner.counterparty = None;
                }
                return Err(e);
            }
        };

        let mut inner = lock(&self.inner);
        if self.live.generation.load(Ordering::Acquire) == generation
            && inner.state != SessionState::LoggedOut
        {
            inner.slots.messages = Some(subscription);
            info!(uid = %self.me.uid, key = %key, "conversation opened");
        } else {
            // Another open or a sign-out overtook this one.
            debug!(key = %key, "discarding superseded message subscription");
            subscription.cancel();
        }
        Ok(conversation)
    }

    /// Reopen a conversation from the recent-conversations list.
    pub async fn open_from_inbox(&self, entry: &InboxEntry) -> Result<ConversationRef> {
        self.open_conversation(&entry.counterparty_profile()).await
    }

    /// Send `text` to the open conversation.
    ///
    /// Without an open conversation this does nothing and returns
    /// `Ok(None)`.  Blank text fails with a validation error and writes
    /// nothing.  Inbox propagation failures are logged, not returned.
    pub async fn send_message(&self, text: &str) -> Result<Option<Message>> {
        let key = match &lock(&self.inner).state {
            SessionState::ConversationOpen(key) => key.clone(),
            _ => {
                debug!(uid = %self.me.uid, "send ignored: no open conversation");
                return Ok(None);
            }
        };

        let message = self.messages.append(&key, &self.me.uid, text).await?;
        self.inbox.record_message(&key, &message).await;
        Ok(Some(message))
    }

    /// Register the callback for the open conversation's messages.
    ///
    /// The callback follows the session across conversation switches; it
    /// immediately receives the current log if a conversation is open.
    pub fn subscribe_to_open_conversation_messages(&self, callback: MessagesCallback) -> Result<()> {
        let is_open = match lock(&self.inner).state {
            SessionState::LoggedOut => return Err(ChatError::SignedOut),
            SessionState::ConversationOpen(_) => true,
            SessionState::NoActiveConversation => false,
        };
        *lock(&self.live.on_messages) = Some(Arc::clone(&callback));
        if is_open {
            callback(Ok(self.cached_messages()));
        }
        Ok(())
    }

    /// Stream the signed-in user's inbox to `callback`, replacing any
    /// previous inbox subscription of this session.
    pub async fn subscribe_to_my_inbox(&self, callback: InboxCallback) -> Result<()> {
        let previous = {
            let mut inner = lock(&self.inner);
            if inner.state == SessionState::LoggedOut {
                return Err(ChatError::SignedOut);
            }
            inner.slots.inbox.take()
        };
        if let Some(previous) = previous {
            previous.cancel();
        }

        let live = Arc::clone(&self.live);
        let subscription = self
            .inbox
            .subscribe_inbox(
                &self.me.uid,
                Arc::new(move |snapshot| {
                    if !live.signed_out.load(Ordering::Acquire) {
                        callback(snapshot);
                    }
                }),
            )
            .await?;

        let mut inner = lock(&self.inner);
        if inner.state == SessionState::LoggedOut {
            subscription.cancel();
            return Err(ChatError::SignedOut);
        }
        if let Some(stale) = inner.slots.inbox.replace(subscription) {
            stale.cancel();
        }
        Ok(())
    }

    pub async fn search_users(&self, text: &str) -> Result<Vec<Profile>> {
        self.ensure_signed_in()?;
        self.directory.search(text, &self.me.uid).await
    }

    /// One-shot read of the inbox, most recent first.
    pub async fn list_my_conversations(&self) -> Result<Vec<InboxEntry>> {
        self.ensure_signed_in()?;
        self.inbox.list_inbox(&self.me.uid).await
    }

    /// One-shot read of the open conversation's log; empty when none is open.
    pub async fn history(&self) -> Result<Vec<Message>> {
        let key = match &lock(&self.inner).state {
            SessionState::ConversationOpen(key) => key.clone(),
            SessionState::NoActiveConversation => return Ok(Vec::new()),
            SessionState::LoggedOut => return Err(ChatError::SignedOut),
        };
        self.messages.history(&key).await
    }

    /// Cancel every subscription and sign out.  Calling it again is a no-op.
    pub async fn sign_out(&self) -> Result<()> {
        let subscriptions = {
            let mut inner = lock(&self.inner);
            if inner.state == SessionState::LoggedOut {
                return Ok(());
            }
            inner.state = SessionState::LoggedOut;
            inner.counterparty = None;
            inner.slots.take_all()
        };

        self.live.generation.fetch_add(1, Ordering::AcqRel);
        self.live.signed_out.store(true, Ordering::Release);
        *lock(&self.live.on_messages) = None;
        lock(&self.live.messages).clear();
        for subscription in subscriptions {
            subscription.cancel();
        }

        info!(uid = %self.me.uid, "session ended");
        self.auth.sign_out().await
    }
}
