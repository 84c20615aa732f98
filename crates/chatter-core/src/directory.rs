//! User profiles and counterparty search.

use std::sync::Arc;

use tracing::info;

use chatter_shared::{Profile, UserId};
use chatter_store::{DocumentStore, FilterOp, Query, Write};

use crate::error::Result;
use crate::models::decode_all;
use crate::paths;

#[derive(Clone)]
pub struct Directory {
    store: Arc<dyn DocumentStore>,
}

impl Directory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Publish `profile` unless the user already has a profile document.
    /// Returns whether it was created.
    pub async fn ensure_profile(&self, profile: &Profile) -> Result<bool> {
        let write = Write::from_serializable(profile)?.server_timestamp("createdAt");
        let created = self
            .store
            .create(&paths::user(&profile.uid)?, write)
            .await?
            .is_some();
        if created {
            info!(uid = %profile.uid, "profile created");
        }
        Ok(created)
    }

    pub async fn get_profile(&self, uid: &UserId) -> Result<Option<Profile>> {
        match self.store.get(&paths::user(uid)?).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Profiles whose name or email contains `text`, ignoring case, except
    /// `exclude`.  A blank query matches nobody and reads nothing.
    ///
    /// Scans every profile; results are in no particular order.
    pub async fn search(&self, text: &str, exclude: &UserId) -> Result<Vec<Profile>> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let query = Query::new(paths::users()?).filter("uid", FilterOp::NotEqual, exclude.as_str());
        let docs = self.store.query(&query).await?;
        Ok(decode_all(&docs, |doc| doc.decode::<Profile>())
            .into_iter()
            .filter(|profile| profile.matches(&needle))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatter_store::MemoryStore;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    async fn seeded() -> (Arc<MemoryStore>, Directory) {
        let store = Arc::new(MemoryStore::new());
        let directory = Directory::new(store.clone());
        for (id, name, email) in [
            ("u1", "Bob Builder", "bob@example.com"),
            ("u2", "Ada Lovelace", "ada@example.com"),
            ("u3", "Grace Hopper", "grace@navy.mil"),
        ] {
            let profile = Profile::for_signup(uid(id), name, email);
            assert!(directory.ensure_profile(&profile).await.unwrap());
        }
        (store, directory)
    }

    fn ids(profiles: &[Profile]) -> Vec<&str> {
        let mut ids: Vec<_> = profiles.iter().map(|p| p.uid.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    #[tokio::test]
    async fn test_search_name_and_email_case_insensitive() {
        let (_store, directory) = seeded().await;
        let me = uid("u1");

        assert_eq!(ids(&directory.search("ADA", &me).await.unwrap()), ["u2"]);
        assert_eq!(ids(&directory.search("navy", &me).await.unwrap()), ["u3"]);
        assert_eq!(ids(&directory.search("example", &me).await.unwrap()), ["u2"]);
    }

    #[tokio::test]
    async fn test_search_excludes_caller() {
        let (_store, directory) = seeded().await;
        assert!(directory.search("bob", &uid("u1")).await.unwrap().is_empty());
        assert_eq!(ids(&directory.search("bob", &uid("u2")).await.unwrap()), ["u1"]);
    }

    #[tokio::test]
    async fn test_blank_search_never_reads() {
        let (store, directory) = seeded().await;
        store.set_unavailable(true);
        assert!(directory.search("   ", &uid("u1")).await.unwrap().is_empty());
        assert!(directory.search("ada", &uid("u1")).await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_profile_keeps_first_version() {
        let (_store, directory) = seeded().await;
        let changed = Profile::for_signup(uid("u2"), "Someone Else", "else@example.com");
        assert!(!directory.ensure_profile(&changed).await.unwrap());

        let stored = directory.get_profile(&uid("u2")).await.unwrap().unwrap();
        assert_eq!(stored.name, "Ada Lovelace");
        assert!(directory.get_profile(&uid("nobody")).await.unwrap().is_none());
    }
}
