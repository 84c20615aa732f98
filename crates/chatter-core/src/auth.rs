//! The authentication collaborator.
//!
//! The core never authenticates anyone itself.  It asks an [`AuthProvider`]
//! who is signed in and tells it when the user signs out.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use chatter_shared::Profile;

use crate::error::Result;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Profile of the signed-in user, `None` once signed out.
    fn current_user(&self) -> Option<Profile>;

    async fn sign_out(&self) -> Result<()>;
}

/// An already-authenticated user, e.g. one picked on a local terminal.
pub struct StaticAuth {
    user: Mutex<Option<Profile>>,
}

impl StaticAuth {
    pub fn new(profile: Profile) -> Self {
        Self {
            user: Mutex::new(Some(profile)),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<Profile> {
        self.user
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn sign_out(&self) -> Result<()> {
        let previous = self
            .user
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(profile) = previous {
            info!(uid = %profile.uid, "signed out");
        }
        Ok(())
    }
}
