use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Authorization exchange error: {message}")]
    #[diagnostic(code(calendar_digest::auth_exchange))]
    AuthExchange { message: String, transient: bool },

    #[error("Google Calendar API error: {message}")]
    #[diagnostic(code(calendar_digest::google_calendar))]
    GoogleCalendar { message: String, transient: bool },

    #[error("Summary generation error: {message}")]
    #[diagnostic(code(calendar_digest::summary_generation))]
    SummaryGeneration { message: String, transient: bool },

    #[error("Embedding error: {message}")]
    #[diagnostic(code(calendar_digest::embedding))]
    Embedding { message: String, transient: bool },

    #[error("Storage error: {message}")]
    #[diagnostic(code(calendar_digest::storage))]
    Storage { message: String, transient: bool },

    #[error("Search error: {message}")]
    #[diagnostic(code(calendar_digest::search))]
    Search { message: String, transient: bool },

    #[error("Invalid input: {0}")]
    #[diagnostic(code(calendar_digest::invalid_input))]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    #[diagnostic(code(calendar_digest::unauthorized))]
    Unauthorized(String),

    #[error("Not found: {0}")]
    #[diagnostic(code(calendar_digest::not_found))]
    NotFound(String),

    #[error("Session store error: {0}")]
    #[diagnostic(code(calendar_digest::session))]
    Session(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(calendar_digest::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(calendar_digest::config))]
    Config(String),

    #[error(transparent)]
    #[diagnostic(code(calendar_digest::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(calendar_digest::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(calendar_digest::other))]
    Other(String),
}

impl Error {
    /// Whether a retry could plausibly succeed (5xx, 429, timeouts,
    /// connection failures on an outbound call)
    pub fn is_transient(&self) -> bool {
        match self {
            Error::AuthExchange { transient, .. }
            | Error::GoogleCalendar { transient, .. }
            | Error::SummaryGeneration { transient, .. }
            | Error::Embedding { transient, .. }
            | Error::Storage { transient, .. }
            | Error::Search { transient, .. } => *transient,
            _ => false,
        }
    }
}

// Implement From for JSON errors
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

// Implement From for TOML deserialization errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type DigestResult<T> = Result<T, Error>;

/// Description of a failed outbound call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
    pub message: String,
    pub transient: bool,
}

impl From<&str> for CallFailure {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
            transient: false,
        }
    }
}

impl From<&String> for CallFailure {
    fn from(message: &String) -> Self {
        Self::from(message.as_str())
    }
}

/// Describe a failed outbound request
pub fn describe_request_error(call: &str, err: &reqwest::Error) -> CallFailure {
    let kind = if err.is_timeout() { "timed out" } else { "failed" };
    CallFailure {
        message: format!("{} request {}: {}", call, kind, err),
        transient: err.is_timeout()
            || err.is_connect()
            || err.status().is_some_and(is_transient_status),
    }
}

/// Describe a non-success HTTP response
pub fn describe_status_error(call: &str, status: reqwest::StatusCode, body: &str) -> CallFailure {
    CallFailure {
        message: format!("{} returned HTTP {} - {}", call, status, body),
        transient: is_transient_status(status),
    }
}

fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

/// Helper to create authorization exchange errors
pub fn auth_exchange_error(failure: impl Into<CallFailure>) -> Error {
    let CallFailure { message, transient } = failure.into();
    Error::AuthExchange { message, transient }
}

/// Helper to create Google Calendar errors
pub fn google_calendar_error(failure: impl Into<CallFailure>) -> Error {
    let CallFailure { message, transient } = failure.into();
    Error::GoogleCalendar { message, transient }
}

/// Helper to create summary generation errors
pub fn summary_error(failure: impl Into<CallFailure>) -> Error {
    let CallFailure { message, transient } = failure.into();
    Error::SummaryGeneration { message, transient }
}

/// Helper to create embedding errors
pub fn embedding_error(failure: impl Into<CallFailure>) -> Error {
    let CallFailure { message, transient } = failure.into();
    Error::Embedding { message, transient }
}

/// Helper to create storage errors
pub fn storage_error(failure: impl Into<CallFailure>) -> Error {
    let CallFailure { message, transient } = failure.into();
    Error::Storage { message, transient }
}

/// Helper to create search errors
pub fn search_error(failure: impl Into<CallFailure>) -> Error {
    let CallFailure { message, transient } = failure.into();
    Error::Search { message, transient }
}

/// Helper to create invalid input errors
pub fn invalid_input_error(message: &str) -> Error {
    Error::InvalidInput(message.to_string())
}

/// Helper to create unauthorized errors
pub fn unauthorized_error(message: &str) -> Error {
    Error::Unauthorized(message.to_string())
}

/// Helper to create not-found errors
pub fn not_found_error(message: &str) -> Error {
    Error::NotFound(message.to_string())
}

/// Helper to create session store errors
pub fn session_error(message: &str) -> Error {
    Error::Session(message.to_string())
}

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}
