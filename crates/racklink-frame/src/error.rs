/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The first byte of a frame was not the `0xFE` start delimiter.
    #[error("invalid frame start byte 0x{0:02X} (expected 0xFE)")]
    InvalidStart(u8),

    /// The byte after the checksum was not the `0xFF` end delimiter.
    #[error("invalid frame end byte 0x{0:02X} (expected 0xFF)")]
    InvalidEnd(u8),

    /// A delimiter byte appeared unescaped inside the envelope.
    #[error("unescaped delimiter 0x{0:02X} inside envelope")]
    UnescapedDelimiter(u8),

    /// The data ended between an escape byte and the byte it escapes.
    #[error("truncated escape sequence")]
    TruncatedEscape,

    /// The frame ended before the declared envelope was complete.
    #[error("truncated frame ({needed} more bytes expected)")]
    Truncated { needed: usize },

    /// The declared envelope cannot hold destination, command and subcommand.
    #[error("envelope too short ({0} bytes, min 3)")]
    EnvelopeTooShort(usize),

    /// The envelope does not fit the one-byte length field.
    #[error("envelope too long ({size} bytes, max {max})")]
    EnvelopeTooLong { size: usize, max: usize },

    /// The received checksum does not match the recomputed one.
    #[error("checksum mismatch (expected 0x{expected:02X}, got 0x{actual:02X})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Corruption detected by the checksum.
    pub fn is_checksum(&self) -> bool {
        matches!(self, FrameError::ChecksumMismatch { .. })
    }

    /// Malformed delimiters, lengths or escape sequences.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidStart(_)
                | FrameError::InvalidEnd(_)
                | FrameError::UnescapedDelimiter(_)
                | FrameError::TruncatedEscape
                | FrameError::Truncated { .. }
                | FrameError::EnvelopeTooShort(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
