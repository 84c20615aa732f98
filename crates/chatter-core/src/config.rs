use chatter_shared::constants::MAX_MESSAGE_BYTES;

/// Tunables shared by the core components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Longest accepted message body, in bytes.
    pub max_message_bytes: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: MAX_MESSAGE_BYTES,
        }
    }
}
