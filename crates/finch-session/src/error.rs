//! Session error types.
//!
//! Validation failures are reported before any transport access; transport
//! failures during a transaction surface directly with no automatic retry.
//! Best-effort teardown I/O and keep-alive pings absorb their own failures
//! (logged, never propagated) since teardown must complete and the ping has
//! no caller.

use hid_finch_protocol::ProtocolError;

/// Errors returned by session operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// Operation attempted without a live device handle.
    #[error("Not connected to a Finch")]
    NotConnected,

    /// `connect` called while a handle is already held.
    #[error("Already connected to a Finch")]
    AlreadyConnected,

    /// No matching device present, or it is claimed by another process.
    #[error("Finch not found (not plugged in, or another program holds it?): {0}")]
    DeviceNotFound(String),

    /// Out-of-range numeric input, detected before any I/O.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying HID write or read failed.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Convenience result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    /// Whether blindly re-invoking the failed operation can succeed.
    ///
    /// Connection and validation failures need caller intervention first
    /// (plug the robot in, fix the argument); only transient I/O is worth
    /// a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Io(_))
    }

    pub(crate) fn io(message: impl Into<String>) -> Self {
        SessionError::Io(message.into())
    }
}

impl From<ProtocolError> for SessionError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::ChannelOutOfRange { .. } | ProtocolError::SpeedOutOfRange { .. } => {
                SessionError::InvalidArgument(e.to_string())
            }
            ProtocolError::InvalidReportSize { .. } => SessionError::Io(e.to_string()),
        }
    }
}

impl From<hidapi::HidError> for SessionError {
    fn from(e: hidapi::HidError) -> Self {
        SessionError::Io(e.to_string())
    }
}
