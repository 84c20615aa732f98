use crate::error::{Result, ValidationError};

/// Check message text before anything is written.
///
/// The text must contain something other than whitespace and must not
/// exceed `max_bytes`.  The text itself is stored as typed, untrimmed.
pub fn validate_message_text(text: &str, max_bytes: usize) -> Result<()> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if text.len() > max_bytes {
        return Err(ValidationError::MessageTooLong {
            len: text.len(),
            max: max_bytes,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_blank_rejected() {
        assert_eq!(validate_message_text("", 10), Err(ValidationError::EmptyMessage));
        assert_eq!(
            validate_message_text("   \n\t", 10),
            Err(ValidationError::EmptyMessage)
        );
    }

    #[test]
    fn test_size_ceiling() {
        assert!(validate_message_text("hello", 5).is_ok());
        assert_eq!(
            validate_message_text("hello!", 5),
            Err(ValidationError::MessageTooLong { len: 6, max: 5 })
        );
    }
}
