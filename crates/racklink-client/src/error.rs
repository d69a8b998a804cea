use std::borrow::Cow;
use std::time::Duration;

use racklink_frame::{is_session_nack, nack_message, FrameError};
use racklink_transport::TransportError;

/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Malformed or corrupted frame from the device.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Socket-level failure.
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// The device refused the configured credentials.
    #[error("authentication rejected by device (status 0x{status:02X})")]
    Authentication { status: u8 },

    /// The device rejected the previous command.
    #[error("device rejected command (NACK 0x{code:02X}): {message}")]
    Nack {
        code: u8,
        message: Cow<'static, str>,
    },

    /// The response does not have the shape the command expects.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No response arrived before the deadline.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The client was closed while the operation was in flight.
    #[error("connection closed")]
    Closed,

    /// Every attempt allowed by the retry policy failed.
    #[error("failed to get response after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ClientError>,
    },

    /// Outlet numbers start at 1.
    #[error("invalid outlet {0} (outlets are numbered from 1)")]
    InvalidOutlet(u8),
}

impl ClientError {
    /// Build a NACK error with its table message.
    pub fn nack(code: u8) -> Self {
        ClientError::Nack {
            code,
            message: nack_message(code),
        }
    }

    /// True when tearing the session down and trying again may help.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Frame(_) | ClientError::Timeout(_) => true,
            ClientError::Transport(TransportError::InvalidConfig(_)) => false,
            ClientError::Transport(_) => true,
            ClientError::Nack { code, .. } => is_session_nack(*code),
            _ => false,
        }
    }

    /// Errors in the "device currently unreachable" class.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::RetriesExhausted { .. } | ClientError::Closed
        )
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::AuthenticationRejected { status } => {
                ClientError::Authentication { status }
            }
            TransportError::Frame(err) => ClientError::Frame(err),
            TransportError::Timeout(timeout) => ClientError::Timeout(timeout),
            TransportError::UnexpectedResponse(message) => ClientError::Protocol(message),
            other => ClientError::Transport(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
