//! The per-login context handed to every component.

use std::sync::Arc;

use chrono::TimeDelta;

use ignite_shared::{SessionId, UserName};

use crate::config::ClientConfig;

/// Who is chatting, under which session, with which settings.
///
/// Created at login and dropped at logout; components receive it explicitly.
#[derive(Debug, Clone)]
pub struct ChatContext {
    user: UserName,
    session_id: SessionId,
    config: Arc<ClientConfig>,
}

impl ChatContext {
    pub fn new(user: UserName, session_id: SessionId, config: ClientConfig) -> Self {
        Self {
            user,
            session_id,
            config: Arc::new(config),
        }
    }

    pub fn user(&self) -> &UserName {
        &self.user
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn freshness(&self) -> TimeDelta {
        self.config.freshness()
    }
}
