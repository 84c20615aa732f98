//! Conversation identity.
//!
//! A two-party conversation is addressed by a key derived from its
//! participants alone: the lexicographically smaller user id, the separator,
//! then the larger one.  Both participants compute the same key on their own,
//! so "does a conversation with X exist?" is a point read, never a search.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::KEY_SEPARATOR;
use crate::error::{Result, ValidationError};
use crate::types::UserId;

/// Canonical, order-independent key of a two-party conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Derive the key for the pair `(a, b)`.
    ///
    /// `resolve(a, b) == resolve(b, a)` for every pair.  A user cannot hold a
    /// conversation with themselves, so `a == b` is rejected.
    pub fn resolve(a: &UserId, b: &UserId) -> Result<Self> {
        let (lo, hi) = match a.cmp(b) {
            std::cmp::Ordering::Less => (a, b),
            std::cmp::Ordering::Greater => (b, a),
            std::cmp::Ordering::Equal => return Err(ValidationError::SelfConversation),
        };
        Ok(Self(format!("{lo}{KEY_SEPARATOR}{hi}")))
    }

    /// Parse a key read back from storage.  Only canonical keys are accepted.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let invalid = || ValidationError::InvalidConversationKey(raw.clone());

        let (lo, hi) = raw.split_once(KEY_SEPARATOR).ok_or_else(invalid)?;
        let lo = UserId::parse(lo).map_err(|_| invalid())?;
        let hi = UserId::parse(hi).map_err(|_| invalid())?;
        if lo >= hi {
            return Err(invalid());
        }
        Ok(Self(raw))
    }

    /// Both participants, smaller id first.
    pub fn participants(&self) -> (UserId, UserId) {
        // Construction guarantees exactly one separator between two valid ids.
        let (lo, hi) = self
            .0
            .split_once(KEY_SEPARATOR)
            .unwrap_or((self.0.as_str(), ""));
        (UserId(lo.to_string()), UserId(hi.to_string()))
    }

    pub fn contains(&self, user: &UserId) -> bool {
        let (lo, hi) = self.participants();
        &lo == user || &hi == user
    }

    /// The participant that is not `me`, or `None` if `me` is not part of
    /// this conversation.
    pub fn counterpart(&self, me: &UserId) -> Option<UserId> {
        let (lo, hi) = self.participants();
        if &lo == me {
            Some(hi)
        } else if &hi == me {
            Some(lo)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ConversationKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<ConversationKey> for String {
    fn from(key: ConversationKey) -> Self {
        key.0
    }
}
