/// Backend address used when neither config nor CLI supply one.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

/// Delay between two result polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Poll attempts before a job is reported as timed out (~10 s at the default interval).
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 20;

/// Per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Table name sent with the credentials when the user leaves it blank.
pub const DEFAULT_DATA_TABLE_NAME: &str = "ACTIVITIES";

/// Zeta used for temporal profile conformance when none is given.
pub const DEFAULT_ZETA: f64 = 0.5;

/// Reserved XES attribute names bound to the required roles.
pub const XES_CASE_ID_COLUMN: &str = "case:concept:name";
pub const XES_ACTIVITY_COLUMN: &str = "concept:name";
pub const XES_TIMESTAMP_COLUMN: &str = "time:timestamp";

/// File extensions accepted by the upload endpoint.
pub const ACCEPTED_LOG_EXTENSIONS: [&str; 2] = ["csv", "xes"];
