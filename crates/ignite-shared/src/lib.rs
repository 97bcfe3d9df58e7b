//! Types, limits and validation rules shared by every Ignite crate.

pub mod constants;
pub mod error;
pub mod types;
pub mod validate;

pub use error::ValidationError;
pub use types::{MessageId, RoomId, RoomVisibility, SessionId, UserName};
