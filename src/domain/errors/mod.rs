// Domain errors - Low-level failures raised by ports and adapters

use std::fmt;

/// Failures reported by engine, resource and configuration ports.
///
/// These carry the raw text of the underlying failure. The trim interactor
/// classifies that text into a user-facing [`crate::error::TrimError`].
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid arguments provided
    BadArgs(String),
    /// Engine call failed (load, exec, read, write)
    EngineFailure(String),
    /// Engine used before it was loaded, or after it was terminated
    EngineNotLoaded,
    /// Virtual or host filesystem failure
    FsFail(String),
    /// Engine resource could not be acquired from any source
    ResourceUnavailable(String),
    /// Configuration could not be read, parsed or validated
    ConfigFail(String),
    /// Engine was terminated while the call was in flight
    Terminated,
}

impl DomainError {
    /// Raw failure text used for classification
    pub fn message(&self) -> String {
        match self {
            DomainError::BadArgs(msg)
            | DomainError::EngineFailure(msg)
            | DomainError::FsFail(msg)
            | DomainError::ResourceUnavailable(msg)
            | DomainError::ConfigFail(msg) => msg.clone(),
            DomainError::EngineNotLoaded => "engine not loaded".to_string(),
            DomainError::Terminated => "engine terminated".to_string(),
        }
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::BadArgs(msg) => write!(f, "Bad arguments: {}", msg),
            DomainError::EngineFailure(msg) => write!(f, "Engine failure: {}", msg),
            DomainError::EngineNotLoaded => write!(f, "Engine is not loaded"),
            DomainError::FsFail(msg) => write!(f, "FS error: {}", msg),
            DomainError::ResourceUnavailable(msg) => write!(f, "Resource unavailable: {}", msg),
            DomainError::ConfigFail(msg) => write!(f, "Configuration error: {}", msg),
            DomainError::Terminated => write!(f, "Engine terminated"),
        }
    }
}

impl std::error::Error for DomainError {}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::FsFail(err.to_string())
    }
}
