/// Maximum message body length in characters
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Maximum room name length in characters
pub const MAX_ROOM_NAME_LEN: usize = 50;

/// Display name bounds in characters
pub const MIN_USER_NAME_LEN: usize = 2;
pub const MAX_USER_NAME_LEN: usize = 50;

/// A membership record counts as active for this long after its last activity
pub const DEFAULT_FRESHNESS_WINDOW_SECS: u64 = 600;

/// Upper bound on the freshness window (30 days)
pub const MAX_FRESHNESS_WINDOW_SECS: u64 = 30 * 24 * 60 * 60;

/// Presence announce period while a room is open
pub const DEFAULT_PRESENCE_INTERVAL_SECS: u64 = 30;

/// Room directory re-evaluation period (catches passive expiry)
pub const DEFAULT_DIRECTORY_REFRESH_SECS: u64 = 60;

/// Number of messages backfilled when a room is opened
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// Length of a generated session token
pub const SESSION_ID_LEN: usize = 6;
