//! Protocol errors

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during protocol communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Fewer bytes than requested arrived before the read deadline.
    #[error("Timeout: received {received} of {expected} bytes")]
    Timeout { expected: usize, received: usize },

    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Malformed {kind} payload: expected {expected} bytes, got {actual}")]
    MalformedPayload {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Device reported error {code:#06x}: {message}")]
    Device { code: u16, message: String },

    /// A move was triggered but no completion frame arrived in time.
    /// The stage may still be moving.
    #[error("Channel {channel} did not report move completion within {timeout:?}")]
    MotionTimeout { channel: u16, timeout: Duration },

    #[error("Channel {0} does not fit in a short frame parameter")]
    InvalidChannel(u16),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the error left the byte stream in an unknown position.
    ///
    /// After one of these the caller should assume the session is out of
    /// sync and reopen the transport before issuing further commands.
    pub fn is_desync(&self) -> bool {
        matches!(
            self,
            ProtocolError::Timeout { .. } | ProtocolError::Framing(_) | ProtocolError::IoError(_)
        )
    }

    /// True for both read timeouts and motion timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ProtocolError::Timeout { .. } | ProtocolError::MotionTimeout { .. }
        )
    }
}
