/// Default base URL of the backend API.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default snapshot polling interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;

/// Default retention window for buffered statuses whose message has not
/// arrived yet (15 minutes). Entries older than this are evicted so the
/// pending buffer cannot grow without bound.
pub const DEFAULT_PENDING_RETENTION_SECS: u64 = 900;

/// Maximum characters of a message body shown in a conversation preview.
pub const PREVIEW_MAX_CHARS: usize = 80;

/// Capacity of the source command and notification channels.
pub const SOURCE_CHANNEL_CAPACITY: usize = 64;
