//! Crate error types

use crate::broadcast::BroadcastError;
use crate::chat::StoreError;
use crate::delivery::DeliveryError;
use crate::registry::RegistryError;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Single-topic broadcaster error
    Broadcast(BroadcastError),
    /// Keyed registry error
    Registry(RegistryError),
    /// Persistence collaborator error
    Store(StoreError),
    /// An identifier could not be parsed
    InvalidId(String),
    /// Attachment IDs and names have different lengths
    AttachmentMismatch { ids: usize, names: usize },
    /// The outbound sink of a streaming call failed
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Broadcast(e) => write!(f, "Broadcast error: {}", e),
            Error::Registry(e) => write!(f, "Registry error: {}", e),
            Error::Store(e) => write!(f, "Store error: {}", e),
            Error::InvalidId(s) => write!(f, "Invalid ID: {}", s),
            Error::AttachmentMismatch { ids, names } => write!(
                f,
                "Number of attachment IDs ({}) doesn't match number of names ({})",
                ids, names
            ),
            Error::Transport(e) => write!(f, "Transport error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Broadcast(e) => Some(e),
            Error::Registry(e) => Some(e),
            Error::Store(e) => Some(e),
            Error::Transport(e) => Some(e.as_ref()),
            Error::InvalidId(_) | Error::AttachmentMismatch { .. } => None,
        }
    }
}

impl From<BroadcastError> for Error {
    fn from(e: BroadcastError) -> Self {
        Error::Broadcast(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Store(e)
    }
}

impl<E> From<DeliveryError<E>> for Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(e: DeliveryError<E>) -> Self {
        match e {
            DeliveryError::Subscribe(e) => Error::Registry(e),
            DeliveryError::Sink(e) => Error::Transport(Box::new(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;
    use std::io;

    use super::*;

    #[test]
    fn test_display() {
        let err = Error::AttachmentMismatch { ids: 2, names: 1 };
        assert_eq!(
            err.to_string(),
            "Number of attachment IDs (2) doesn't match number of names (1)"
        );

        let err = Error::from(RegistryError::TopicClosed("chan-1".into()));
        assert_eq!(err.to_string(), "Registry error: Topic closed: chan-1");
    }

    #[test]
    fn test_delivery_error_conversion() {
        let err: Error = DeliveryError::Sink(io::Error::new(io::ErrorKind::BrokenPipe, "gone")).into();
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.source().is_some());

        let err: Error =
            DeliveryError::<io::Error>::Subscribe(RegistryError::TopicClosed("x".into())).into();
        assert!(matches!(err, Error::Registry(_)));
    }
}
