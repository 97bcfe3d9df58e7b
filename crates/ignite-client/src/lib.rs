pub mod backend;
pub mod client;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod presence;
pub mod reaper;
pub mod session;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

use tracing_subscriber::{fmt, EnvFilter};

pub use backend::{Backend, BackendResult};
pub use client::{ChatClient, RoomSession};
pub use config::ClientConfig;
pub use context::ChatContext;
pub use directory::{DirectoryWatch, RoomDirectory, RoomSummary};
pub use error::{BackendError, ClientError, Notice, UserAction};
pub use session::{SavedSession, SessionFile};
pub use stream::MessageFeed;

/// Install the global subscriber. Logs go to stderr so they do not mix with
/// the chat transcript.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ignite_client=debug,ignite_store=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
