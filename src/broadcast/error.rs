//! Broadcaster error types

/// Error type for broadcaster operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastError {
    /// The owning loop has exited (closed, or every handle was dropped)
    Closed,
}

impl std::fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BroadcastError::Closed => write!(f, "Broadcaster is closed"),
        }
    }
}

impl std::error::Error for BroadcastError {}
