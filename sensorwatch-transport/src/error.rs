//! Error types for transports.

use thiserror::Error;

/// Errors raised by a transport channel.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach the broker, or the link dropped.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The broker accepted the connection but the publish failed.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// The broker negatively confirmed a published message.
    #[error("Message rejected by broker: {0}")]
    Rejected(String),

    /// Settling a delivery (ack / requeue) failed.
    #[error("Acknowledgement failed: {0}")]
    Ack(String),
}

#[cfg(feature = "amqp")]
impl From<lapin::Error> for TransportError {
    fn from(err: lapin::Error) -> Self {
        TransportError::Connection(err.to_string())
    }
}
