//! # chatter-core
//!
//! The realtime two-party chat engine.  Every component receives the store
//! as an `Arc<dyn DocumentStore>`; nothing here holds global state.
//!
//! Data flows leaf-first:
//!
//! ```text
//! Directory / inbox entry -> ConversationKey::resolve -> ConversationStore
//!     -> Inbox::ensure_inbox_entries -> MessageStream (append / subscribe)
//!     -> Inbox::record_message
//! ```
//!
//! [`ChatSession`] composes them into the API a front end uses.

pub mod auth;
pub mod config;
pub mod conversations;
pub mod directory;
pub mod error;
pub mod inbox;
pub mod messages;
pub mod models;
pub mod paths;
pub mod session;

pub use auth::{AuthProvider, StaticAuth};
pub use config::CoreConfig;
pub use conversations::ConversationStore;
pub use directory::Directory;
pub use error::{Action, ChatError, Result};
pub use inbox::{FanoutReport, Inbox, InboxCallback, StepOutcome};
pub use messages::{MessageStream, MessagesCallback};
pub use models::{Conversation, ConversationRef, InboxEntry, Message};
pub use session::{ChatSession, SessionState};
