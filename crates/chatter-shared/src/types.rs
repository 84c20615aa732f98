use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::KEY_SEPARATOR;
use crate::error::{Result, ValidationError};

/// Opaque identifier handed out by the authentication collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(pub(crate) String);

impl UserId {
    /// Validate and wrap a raw identifier.
    ///
    /// Ids must be non-empty and must not contain the conversation key
    /// separator, a path separator or whitespace, since they are embedded in
    /// both conversation keys and document paths.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let valid = !raw.is_empty()
            && !raw
                .chars()
                .any(|c| c == KEY_SEPARATOR || c == '/' || c.is_whitespace() || c.is_control());
        if valid {
            Ok(Self(raw))
        } else {
            Err(ValidationError::InvalidUserId(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_opaque_ids() {
        assert!(UserId::parse("u1").is_ok());
        assert!(UserId::parse("Xq9LmZ2pYt0aBcDeFgHiJkLmNo12").is_ok());
        assert!(UserId::parse("ada@chatter.app").is_ok());
    }

    #[test]
    fn test_rejects_separator_and_paths() {
        assert_eq!(
            UserId::parse("u_1"),
            Err(ValidationError::InvalidUserId("u_1".into()))
        );
        assert!(UserId::parse("users/u1").is_err());
        assert!(UserId::parse("").is_err());
        assert!(UserId::parse("a b").is_err());
    }

    #[test]
    fn test_serde_validates() {
        let id: UserId = serde_json::from_str("\"u2\"").unwrap();
        assert_eq!(id.as_str(), "u2");
        assert!(serde_json::from_str::<UserId>("\"bad_id\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"u2\"");
    }
}
