use std::fmt;

/// Error type for harvest-engine operations.
#[derive(Debug)]
pub enum KnifeError {
    /// HTTP request failed at the transport layer
    Http(reqwest::Error),
    /// Upstream returned a non-2xx status outside the error-limit protocol
    Api { status: u16, message: String },
    /// JSON (de)serialization error
    Json(String),
    /// The swagger document could not be parsed into the expected shape
    Spec(String),
    /// A state-store read/write failed
    State(String),
    /// Run could not proceed because authentication or role lookup failed
    Auth(String),
}

impl fmt::Display for KnifeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnifeError::Http(e) => write!(f, "HTTP request failed: {}", e),
            KnifeError::Api { status, message } => {
                write!(f, "API error (status {}): {}", status, message)
            }
            KnifeError::Json(msg) => write!(f, "JSON error: {}", msg),
            KnifeError::Spec(msg) => write!(f, "spec error: {}", msg),
            KnifeError::State(msg) => write!(f, "state store error: {}", msg),
            KnifeError::Auth(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for KnifeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KnifeError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for KnifeError {
    fn from(err: reqwest::Error) -> Self {
        KnifeError::Http(err)
    }
}

impl From<serde_json::Error> for KnifeError {
    fn from(err: serde_json::Error) -> Self {
        KnifeError::Json(err.to_string())
    }
}

impl From<std::io::Error> for KnifeError {
    fn from(err: std::io::Error) -> Self {
        KnifeError::State(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KnifeError>;
