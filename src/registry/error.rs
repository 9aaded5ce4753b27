//! Registry error types
//!
//! Error types for keyed registry operations.

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The topic was closed while the operation was in flight
    TopicClosed(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::TopicClosed(key) => write!(f, "Topic closed: {}", key),
        }
    }
}

impl std::error::Error for RegistryError {}
