/// Application name
pub const APP_NAME: &str = "Chatter";

/// Separator between the two user ids of a conversation key.
/// User ids may not contain it.
pub const KEY_SEPARATOR: char = '_';

/// Maximum message size in bytes (16 KiB)
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024;

/// Display name used when a profile carries none.
pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous";

/// Avatar generator used for new accounts, seeded with the display name.
pub const AVATAR_BASE_URL: &str = "https://api.dicebear.com/9.x/thumbs/svg?seed=";

/// Inbox preview shown before the first message of a conversation.
pub const EMPTY_INBOX_PREVIEW: &str = "Say hi 👋";

/// Top-level collections of the document store.
pub const USERS_COLLECTION: &str = "users";
pub const CHATS_COLLECTION: &str = "chats";
pub const MESSAGES_COLLECTION: &str = "messages";
pub const USER_CHATS_COLLECTION: &str = "userChats";
pub const INBOX_ITEMS_COLLECTION: &str = "items";
