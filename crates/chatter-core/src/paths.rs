//! Where each kind of document lives in the store.
//!
//! ```text
//! users/{uid}                      profile
//! chats/{key}                      conversation record
//! chats/{key}/messages/{auto-id}   message
//! userChats/{uid}/items/{key}      inbox entry of uid
//! ```

use chatter_shared::constants::{
    CHATS_COLLECTION, INBOX_ITEMS_COLLECTION, MESSAGES_COLLECTION, USERS_COLLECTION,
    USER_CHATS_COLLECTION,
};
use chatter_shared::{ConversationKey, UserId};
use chatter_store::{CollectionPath, DocPath, Result};

pub fn users() -> Result<CollectionPath> {
    CollectionPath::root(USERS_COLLECTION)
}

pub fn user(uid: &UserId) -> Result<DocPath> {
    users()?.doc(uid.as_str())
}

pub fn conversation(key: &ConversationKey) -> Result<DocPath> {
    CollectionPath::root(CHATS_COLLECTION)?.doc(key.as_str())
}

pub fn messages(key: &ConversationKey) -> Result<CollectionPath> {
    conversation(key)?.collection(MESSAGES_COLLECTION)
}

pub fn inbox(owner: &UserId) -> Result<CollectionPath> {
    CollectionPath::root(USER_CHATS_COLLECTION)?
        .doc(owner.as_str())?
        .collection(INBOX_ITEMS_COLLECTION)
}

pub fn inbox_entry(owner: &UserId, key: &ConversationKey) -> Result<DocPath> {
    inbox(owner)?.doc(key.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let u1 = UserId::parse("u1").unwrap();
        let u2 = UserId::parse("u2").unwrap();
        let key = ConversationKey::resolve(&u2, &u1).unwrap();

        assert_eq!(user(&u1).unwrap().as_str(), "users/u1");
        assert_eq!(conversation(&key).unwrap().as_str(), "chats/u1_u2");
        assert_eq!(messages(&key).unwrap().as_str(), "chats/u1_u2/messages");
        assert_eq!(
            inbox_entry(&u2, &key).unwrap().as_str(),
            "userChats/u2/items/u1_u2"
        );
    }
}
