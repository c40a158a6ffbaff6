//! Which GitHub API failures are worth retrying.

use reqwest::StatusCode;
use reqwest::header::HeaderMap;

/// Maximum number of attempts for one API call.
pub const MAX_RETRIES: usize = 3;

/// Delay between attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// API failures that a retry within this run cannot fix.
#[derive(Debug, PartialEq, Eq)]
pub enum NonRetryableError {
    /// Primary or secondary rate limit; carries the reset time (epoch seconds) when known.
    RateLimited(Option<u64>),
    /// HTTP 401.
    Unauthorized,
    /// HTTP 404; carries the requested URL.
    NotFound(String),
    /// HTTP 403 that is not a rate limit.
    Forbidden,
    /// Any other 4xx.
    Rejected(u16),
    /// The body parsed, but not into the expected shape.
    MalformedResponse(String),
}

impl std::fmt::Display for NonRetryableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NonRetryableError::RateLimited(Some(reset)) => write!(
                f,
                "GitHub API rate limit exceeded (resets at {}). Pass --githubtoken for a higher limit.",
                reset
            ),
            NonRetryableError::RateLimited(None) => write!(
                f,
                "GitHub API rate limit exceeded. Pass --githubtoken for a higher limit."
            ),
            NonRetryableError::Unauthorized => {
                write!(f, "GitHub rejected the token. Check --githubtoken.")
            }
            NonRetryableError::NotFound(url) => write!(f, "Not found: {}", url),
            NonRetryableError::Forbidden => write!(f, "Access forbidden"),
            NonRetryableError::Rejected(status) => write!(f, "Request rejected with HTTP {}", status),
            NonRetryableError::MalformedResponse(msg) => {
                write!(f, "Unexpected response shape: {}", msg)
            }
        }
    }
}

impl std::error::Error for NonRetryableError {}

/// Classify a response by status and rate limit headers.
///
/// Returns `None` for successes and for failures that may go away on retry
/// (5xx).
pub fn classify(status: StatusCode, headers: &HeaderMap, url: &str) -> Option<NonRetryableError> {
    if !status.is_client_error() {
        return None;
    }

    let exhausted = header_u64(headers, RATELIMIT_REMAINING) == Some(0);
    let error = match status {
        StatusCode::TOO_MANY_REQUESTS => {
            NonRetryableError::RateLimited(header_u64(headers, RATELIMIT_RESET))
        }
        StatusCode::FORBIDDEN if exhausted => {
            NonRetryableError::RateLimited(header_u64(headers, RATELIMIT_RESET))
        }
        StatusCode::FORBIDDEN => NonRetryableError::Forbidden,
        StatusCode::UNAUTHORIZED => NonRetryableError::Unauthorized,
        StatusCode::NOT_FOUND => NonRetryableError::NotFound(url.to_string()),
        s => NonRetryableError::Rejected(s.as_u16()),
    };
    Some(error)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
