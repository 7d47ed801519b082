//! Chat errors — classified failures surfaced by the dispatcher.
//!
//! DESIGN
//! ======
//! Every failure a caller can observe is a `ChatError` variant. Display text
//! is the human-readable message shown in the chat UI; `kind()` gives the
//! typed classification that UI policy (apology bubbles, banners) keys on,
//! so nothing downstream has to inspect message text.

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by chat dispatch and configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// The user submitted empty or whitespace-only text.
    #[error("Message cannot be empty")]
    Validation,

    /// A send was attempted while another one is still outstanding.
    #[error("Message already being sent, ignoring duplicate request")]
    DuplicateRequest,

    /// An attempt exceeded the per-request timeout.
    #[error("Request timeout (attempt {attempt}/{max}). Please try again.")]
    Timeout { attempt: u32, max: u32 },

    /// The request never produced an HTTP response.
    #[error("Network error (attempt {attempt}/{max}). Please check your connection.")]
    Network { attempt: u32, max: u32, detail: String },

    /// The endpoint answered with a non-success HTTP status.
    #[error("{}", describe_status(.status, .reason, .attempt, .max))]
    HttpStatus { status: u16, reason: String, attempt: u32, max: u32 },

    /// The endpoint answered 2xx but not with a usable 200 body.
    #[error("Unexpected response status: {status} (attempt {attempt}/{max})")]
    UnexpectedResponse { status: u16, attempt: u32, max: u32 },

    /// Any other failure during an attempt.
    #[error("{detail} (attempt {attempt}/{max})")]
    Unknown { detail: String, attempt: u32, max: u32 },

    /// The session was reset or ended before the reply arrived; the reply
    /// was discarded.
    #[error("Session changed before the reply arrived")]
    SessionReset,

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    Config(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

/// Typed classification of a [`ChatError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Duplicate,
    Timeout,
    Network,
    HttpStatus,
    UnexpectedResponse,
    Unknown,
    Superseded,
    Config,
}

impl ChatError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation => ErrorKind::Validation,
            Self::DuplicateRequest => ErrorKind::Duplicate,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Network { .. } => ErrorKind::Network,
            Self::HttpStatus { .. } => ErrorKind::HttpStatus,
            Self::UnexpectedResponse { .. } => ErrorKind::UnexpectedResponse,
            Self::Unknown { .. } => ErrorKind::Unknown,
            Self::SessionReset => ErrorKind::Superseded,
            Self::Config(_) | Self::HttpClientBuild(_) => ErrorKind::Config,
        }
    }

    /// Transport-level failures the user already watched a spinner for.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Timeout | ErrorKind::Network)
    }

    /// Whether the dispatcher spends another attempt on this failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::Duplicate | ErrorKind::Superseded | ErrorKind::Config
        )
    }

    /// The HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } | Self::UnexpectedResponse { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Curated statuses drop the attempt suffix; everything else keeps it.
#[allow(clippy::trivially_copy_pass_by_ref)]
fn describe_status(status: &u16, reason: &str, attempt: &u32, max: &u32) -> String {
    let curated = match *status {
        400 => "Invalid request format. Please try rephrasing your message.",
        401 => "Authentication failed. Please refresh the page and try again.",
        403 => "Access denied. You may not have permission to use this service.",
        404 => "Service not found. The chatbot API may be temporarily unavailable.",
        429 => "Too many requests. Please wait a moment before trying again.",
        500 => "Server error. The chatbot service is temporarily unavailable.",
        502..=504 => "Service temporarily unavailable. Please try again in a moment.",
        _ => return format!("API error {status}: {reason} (attempt {attempt}/{max})"),
    };
    curated.to_string()
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
