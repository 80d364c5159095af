//! Client runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the discussion
//! components. Nothing in this crate reads process environment variables; the binaries read them
//! and hand the raw values to the `*_from_env_value` helpers below.

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_MENTION_LIMIT, DEFAULT_REFRESH_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::error::{DiscussionError, DiscussionResult};
use crate::model::EmployeeId;
use std::time::Duration;

/// The person using this session.
///
/// Resolved once and passed down to anything that authors comments or reacts, so no component
/// looks the current user up on its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionUser {
    pub employee_id: EmployeeId,
    pub display_name: String,
}

impl SessionUser {
    pub fn new(employee_id: EmployeeId, display_name: impl Into<String>) -> DiscussionResult<Self> {
        if employee_id <= 0 {
            return Err(DiscussionError::InvalidConfig(
                "employee id must be a positive integer".into(),
            ));
        }
        let display_name = display_name.into().trim().to_string();
        let display_name = if display_name.is_empty() {
            format!("Employee {}", employee_id)
        } else {
            display_name
        };
        Ok(Self {
            employee_id,
            display_name,
        })
    }
}

/// Client configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    api_base_url: String,
    session: SessionUser,
    refresh_interval: Duration,
    mention_limit: usize,
    request_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration with default intervals and limits.
    pub fn new(api_base_url: impl Into<String>, session: SessionUser) -> DiscussionResult<Self> {
        let api_base_url = api_base_url_from_env_value(Some(api_base_url.into()))?;
        Ok(Self {
            api_base_url,
            session,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_SECS),
            mention_limit: DEFAULT_MENTION_LIMIT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_mention_limit(mut self, limit: usize) -> Self {
        self.mention_limit = limit;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn session(&self) -> &SessionUser {
        &self.session
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub fn mention_limit(&self) -> usize {
        self.mention_limit
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the collaborator base URL, falling back to the default when unset.
///
/// Only `http://` and `https://` URLs are accepted; a trailing slash is dropped so paths can be
/// appended directly.
pub fn api_base_url_from_env_value(value: Option<String>) -> DiscussionResult<String> {
    let url = non_blank(value).unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(DiscussionError::InvalidConfig(format!(
            "API URL must start with http:// or https://, got {}",
            url
        )));
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// Parse the session user from the employee id and optional display name.
pub fn session_user_from_env_values(
    employee_id: Option<String>,
    display_name: Option<String>,
) -> DiscussionResult<SessionUser> {
    let raw = non_blank(employee_id)
        .ok_or_else(|| DiscussionError::InvalidConfig("employee id is not set".into()))?;
    let employee_id = raw.parse::<EmployeeId>().map_err(|_| {
        DiscussionError::InvalidConfig(format!("employee id must be an integer, got {}", raw))
    })?;
    SessionUser::new(employee_id, non_blank(display_name).unwrap_or_default())
}

fn positive_from_env_value(value: Option<String>, default: u64, what: &str) -> DiscussionResult<u64> {
    match non_blank(value) {
        None => Ok(default),
        Some(v) => match v.parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(DiscussionError::InvalidConfig(format!(
                "{} must be a positive integer, got {}",
                what, v
            ))),
        },
    }
}

/// Parse the refresh interval in seconds. Unset means the 30 second default.
pub fn refresh_interval_from_env_value(value: Option<String>) -> DiscussionResult<Duration> {
    positive_from_env_value(value, DEFAULT_REFRESH_SECS, "refresh interval").map(Duration::from_secs)
}

pub fn mention_limit_from_env_value(value: Option<String>) -> DiscussionResult<usize> {
    positive_from_env_value(value, DEFAULT_MENTION_LIMIT as u64, "mention limit").map(|n| n as usize)
}

pub fn request_timeout_from_env_value(value: Option<String>) -> DiscussionResult<Duration> {
    positive_from_env_value(value, DEFAULT_REQUEST_TIMEOUT_SECS, "request timeout")
        .map(Duration::from_secs)
}
