/// Represents the various errors that can occur while producing, publishing or consuming events.
///
/// Variants:
/// - `SerializationError`: a payload or an envelope could not be encoded/decoded as JSON.
///   Fatal when building an event, fatal for the single message when consuming.
/// - `InvalidEventType`: the event type has no `<noun>-<verb>` shape, so no route can be
///   derived from it. This is a programming/configuration error.
/// - `TransportError`: the underlying pub/sub transport failed (connection down, cannot
///   subscribe, ...). It encapsulates a boxed trait object so any client error fits.
/// - `BrokerClosed`: the broker was closed and no longer accepts messages.
/// - `StorageError`: a read store rejected a write.
/// - `Timeout`: a store operation did not complete within its deadline.
///
/// Example:
/// ```
/// use user_event_core::{EventError, EventType, Route};
///
/// let err = Route::from_event_type(&EventType::new("user")).unwrap_err();
/// assert!(matches!(err, EventError::InvalidEventType(_)));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("invalid event type `{0}`, expected `<noun>-<verb>`")]
    InvalidEventType(String),
    #[error("transport error: {0}")]
    TransportError(Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("broker is closed")]
    BrokerClosed,
    #[error("storage error: {0}")]
    StorageError(Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("operation timed out")]
    Timeout,
}

impl EventError {
    pub fn transport_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
        Self::TransportError(Box::new(e))
    }

    pub fn storage_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
        Self::StorageError(Box::new(e))
    }

    /// Builds a storage error out of a plain message.
    pub fn storage(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::StorageError(message.into())
    }
}

pub type EventResult<T> = Result<T, EventError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_foreign_errors_are_boxed() {
        let err = EventError::transport_error(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "broker down",
        ));
        assert!(matches!(err, EventError::TransportError(_)));
        assert_eq!(err.to_string(), "transport error: broker down");

        let err = EventError::storage_error(io::Error::other("disk full"));
        assert_eq!(err.to_string(), "storage error: disk full");
        assert_eq!(
            EventError::storage("user 42 not found").to_string(),
            "storage error: user 42 not found"
        );
    }
}
