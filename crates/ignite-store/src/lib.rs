//! # ignite-store
//!
//! The storage collaborator behind Ignite Chat: rooms, messages and
//! room-membership records in SQLite, plus a change feed that announces every
//! committed insert, update and delete.
//!
//! [`Database`] is the synchronous `rusqlite` handle with typed CRUD helpers.
//! [`Store`] wraps it for concurrent use, stamps server-side timestamps,
//! enforces the membership row-ownership rule and publishes [`ChangeEvent`]s
//! in commit order.

pub mod changes;
pub mod database;
pub mod members;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod rooms;
pub mod store;

mod error;

pub use changes::{ChangeEvent, ChangeFilter, ChangeKind, ChangeSubscription, Table};
pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use store::{Store, StoreSession};
