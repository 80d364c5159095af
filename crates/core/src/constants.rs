//! Constants used throughout the amendment discussion core.
//!
//! Defaults for values that can be overridden at startup live here alongside the fixed limits the
//! components enforce.

/// Default collaborator API base URL when no override is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3000";

/// Default interval between background comment refreshes, in seconds.
pub const DEFAULT_REFRESH_SECS: u64 = 30;

/// Default maximum number of mention suggestions requested per lookup.
pub const DEFAULT_MENTION_LIMIT: usize = 10;

/// Default per-request timeout for the HTTP collaborator client, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Deepest reply nesting the tree builder will materialise.
pub const MAX_THREAD_DEPTH: usize = 50;

/// Character that opens a mention token.
pub const MENTION_TRIGGER: char = '@';

/// Environment variable names resolved by the binaries at startup.
pub const ENV_API_URL: &str = "AMEND_API_URL";
pub const ENV_EMPLOYEE_ID: &str = "AMEND_EMPLOYEE_ID";
pub const ENV_EMPLOYEE_NAME: &str = "AMEND_EMPLOYEE_NAME";
pub const ENV_REFRESH_SECS: &str = "AMEND_REFRESH_SECS";
pub const ENV_MENTION_LIMIT: &str = "AMEND_MENTION_LIMIT";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "AMEND_REQUEST_TIMEOUT_SECS";
