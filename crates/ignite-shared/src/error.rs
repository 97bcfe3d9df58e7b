use thiserror::Error;

/// Input rejected before it reaches the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message body is empty")]
    EmptyBody,

    #[error("Message body too long: {len} characters (max {max})")]
    BodyTooLong { len: usize, max: usize },

    #[error("Room name is empty")]
    EmptyRoomName,

    #[error("Room name too long: {len} characters (max {max})")]
    RoomNameTooLong { len: usize, max: usize },

    #[error("Name is required")]
    EmptyUserName,

    #[error("Name must be at least {min} characters long")]
    UserNameTooShort { min: usize },

    #[error("Name too long: {len} characters (max {max})")]
    UserNameTooLong { len: usize, max: usize },

    #[error("Media URL is empty")]
    EmptyMediaUrl,
}
