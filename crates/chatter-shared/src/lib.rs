//! # chatter-shared
//!
//! Identifiers, profile snapshots and validation rules shared by every
//! Chatter crate.  Nothing in here touches storage: the conversation key of
//! two users is a pure function of their identifiers, so any layer can derive
//! it without a lookup.

pub mod constants;
pub mod error;
pub mod format;
pub mod identity;
pub mod profile;
pub mod types;
pub mod validation;

pub use error::ValidationError;
pub use identity::ConversationKey;
pub use profile::Profile;
pub use types::UserId;
