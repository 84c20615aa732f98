//! Profile snapshots of users, as published by the authentication
//! collaborator and copied into inbox entries.

use serde::{Deserialize, Serialize};

use crate::constants::{AVATAR_BASE_URL, DEFAULT_DISPLAY_NAME};
use crate::types::UserId;

/// A user as seen by the chat core: id, display name, email and avatar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub uid: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: String,
}

impl Profile {
    pub fn new(
        uid: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
        photo_url: impl Into<String>,
    ) -> Self {
        Self {
            uid,
            name: name.into(),
            email: email.into(),
            photo_url: photo_url.into(),
        }
    }

    /// Build the profile of a freshly registered account.
    ///
    /// The display name falls back to the local part of the email, and the
    /// avatar is generated from the display name.
    pub fn for_signup(uid: UserId, entered_name: &str, email: &str) -> Self {
        let name = match entered_name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            trimmed => trimmed.to_string(),
        };
        let photo_url = default_avatar_url(&name);
        Self {
            uid,
            name,
            email: email.to_string(),
            photo_url,
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            DEFAULT_DISPLAY_NAME
        } else {
            &self.name
        }
    }

    /// Case-insensitive substring match over name and email.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.email.to_lowercase().contains(needle)
    }
}

/// Generated avatar for `seed`.
pub fn default_avatar_url(seed: &str) -> String {
    format!("{AVATAR_BASE_URL}{}", urlencoding::encode(seed))
}
