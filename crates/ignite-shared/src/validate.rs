//! Input checks applied before any storage call.

use crate::constants::{MAX_MESSAGE_LEN, MAX_ROOM_NAME_LEN};
use crate::error::ValidationError;

/// Trim a message body and check it against the length bounds.
pub fn message_body(raw: &str) -> Result<String, ValidationError> {
    let body = raw.trim();
    let len = body.chars().count();
    if len == 0 {
        return Err(ValidationError::EmptyBody);
    }
    if len > MAX_MESSAGE_LEN {
        return Err(ValidationError::BodyTooLong {
            len,
            max: MAX_MESSAGE_LEN,
        });
    }
    Ok(body.to_string())
}

/// Trim a room name and check it against the length bounds.
pub fn room_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 {
        return Err(ValidationError::EmptyRoomName);
    }
    if len > MAX_ROOM_NAME_LEN {
        return Err(ValidationError::RoomNameTooLong {
            len,
            max: MAX_ROOM_NAME_LEN,
        });
    }
    Ok(name.to_string())
}

pub fn media_url(raw: &str) -> Result<String, ValidationError> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(ValidationError::EmptyMediaUrl);
    }
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_rejected() {
        assert_eq!(message_body(""), Err(ValidationError::EmptyBody));
        assert_eq!(message_body(" \n\t "), Err(ValidationError::EmptyBody));
    }

    #[test]
    fn test_body_length_bound() {
        assert_eq!(message_body(&"a".repeat(1000)).unwrap().len(), 1000);
        assert_eq!(
            message_body(&"a".repeat(1001)),
            Err(ValidationError::BodyTooLong {
                len: 1001,
                max: 1000
            })
        );
    }

    #[test]
    fn test_body_counts_characters_not_bytes() {
        // 1000 two-byte characters is still within bounds
        assert!(message_body(&"é".repeat(1000)).is_ok());
    }

    #[test]
    fn test_room_name() {
        assert_eq!(room_name("  lobby ").unwrap(), "lobby");
        assert_eq!(room_name("   "), Err(ValidationError::EmptyRoomName));
        assert!(room_name(&"r".repeat(51)).is_err());
    }
}
