use std::time::Duration;

use racklink_frame::FrameError;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The TCP connect did not complete in time.
    #[error("connecting to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// No frame was exchanged within the I/O timeout.
    #[error("no frame exchanged within {0:?}")]
    Timeout(Duration),

    /// The device answered the login with a non-success status.
    #[error("authentication rejected (status 0x{status:02X})")]
    AuthenticationRejected { status: u8 },

    /// The device answered with a frame that does not fit the exchange.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The configuration cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The device closed the connection.
    #[error("connection closed by device")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
