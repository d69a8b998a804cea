use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Start-of-frame delimiter.
pub const START: u8 = 0xFE;

/// End-of-frame delimiter.
pub const END: u8 = 0xFF;

/// Escape introducer. The escaped byte follows, XORed with `0xFF`.
pub const ESCAPE: u8 = 0xFD;

/// Envelope header: destination (1) + command (1) + subcommand (1).
pub const HEADER_LEN: usize = 3;

/// The length field is one byte wide.
pub const MAX_ENVELOPE_LEN: usize = u8::MAX as usize;

/// Largest payload that still fits the length field.
pub const MAX_PAYLOAD_LEN: usize = MAX_ENVELOPE_LEN - HEADER_LEN;

/// Destination address used for every client-originated frame.
pub const DESTINATION: u8 = 0x00;

/// The unescaped logical content of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Destination address (always 0 on this protocol).
    pub destination: u8,
    /// Command byte.
    pub command: u8,
    /// Subcommand byte.
    pub subcommand: u8,
    /// Command-specific data.
    pub payload: Bytes,
}

impl Envelope {
    /// Create an envelope addressed to the default destination.
    pub fn new(command: u8, subcommand: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            destination: DESTINATION,
            command,
            subcommand,
            payload: payload.into(),
        }
    }

    /// Create an envelope with an empty payload.
    pub fn bare(command: u8, subcommand: u8) -> Self {
        Self::new(command, subcommand, Bytes::new())
    }

    /// True when the envelope carries exactly this command/subcommand pair.
    pub fn is(&self, command: u8, subcommand: u8) -> bool {
        self.command == command && self.subcommand == subcommand
    }

    /// Unescaped envelope length, as carried in the length field.
    pub fn envelope_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Byte at an envelope offset (0 = destination, 1 = command,
    /// 2 = subcommand, 3.. = payload).
    pub fn byte(&self, offset: usize) -> Option<u8> {
        match offset {
            0 => Some(self.destination),
            1 => Some(self.command),
            2 => Some(self.subcommand),
            n => self.payload.get(n - HEADER_LEN).copied(),
        }
    }

    /// Flatten into `destination, command, subcommand, payload..`.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.envelope_len());
        out.extend_from_slice(&[self.destination, self.command, self.subcommand]);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Encode this envelope into the wire format.
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        encode_parts(
            self.destination,
            self.command,
            self.subcommand,
            &self.payload,
            dst,
        )
    }

    fn from_unescaped(mut raw: Vec<u8>) -> Self {
        let payload = Bytes::from(raw.split_off(HEADER_LEN));
        Self {
            destination: raw[0],
            command: raw[1],
            subcommand: raw[2],
            payload,
        }
    }
}

/// 7-bit additive checksum.
pub fn checksum(data: &[u8]) -> u8 {
    seven_bit_sum(data.iter().copied())
}

/// Checksum of a frame: start byte, length byte, then the unescaped envelope.
fn frame_checksum(length: u8, envelope: impl IntoIterator<Item = u8>) -> u8 {
    seven_bit_sum([START, length].into_iter().chain(envelope))
}

fn seven_bit_sum(bytes: impl IntoIterator<Item = u8>) -> u8 {
    let sum = bytes
        .into_iter()
        .fold(0u32, |acc, b| acc.wrapping_add(u32::from(b)));
    (sum & 0x7F) as u8
}

/// Escape delimiter bytes so they never appear raw inside an envelope.
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = BytesMut::with_capacity(data.len() * 2);
    for &b in data {
        put_escaped(&mut out, b);
    }
    out.to_vec()
}

/// Reverse [`escape`].
pub fn unescape(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut iter = data.iter().copied();
    while let Some(b) = iter.next() {
        match b {
            ESCAPE => {
                let next = iter.next().ok_or(FrameError::TruncatedEscape)?;
                if next == START || next == END {
                    return Err(FrameError::UnescapedDelimiter(next));
                }
                out.push(next ^ 0xFF);
            }
            START | END => return Err(FrameError::UnescapedDelimiter(b)),
            _ => out.push(b),
        }
    }
    Ok(out)
}

/// Encode a command into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬────────┬──────────────────────────────────┬──────────┬──────┐
/// │ 0xFE │ Length │ Escaped envelope                 │ Checksum │ 0xFF │
/// │      │ (1B)   │ dest, cmd, sub, payload..        │ (1B)     │      │
/// └──────┴────────┴──────────────────────────────────┴──────────┴──────┘
/// ```
///
/// Length and checksum are computed over the unescaped envelope; the
/// checksum also covers the start and length bytes.
pub fn encode_frame(
    command: u8,
    subcommand: u8,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    encode_parts(DESTINATION, command, subcommand, payload, dst)
}

/// Encode a command into a standalone buffer.
pub fn encode(command: u8, subcommand: u8, payload: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    encode_frame(command, subcommand, payload, &mut buf)?;
    Ok(buf.freeze())
}

fn encode_parts(
    destination: u8,
    command: u8,
    subcommand: u8,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    let size = HEADER_LEN + payload.len();
    if size > MAX_ENVELOPE_LEN {
        return Err(FrameError::EnvelopeTooLong {
            size,
            max: MAX_ENVELOPE_LEN,
        });
    }

    let header = [destination, command, subcommand];
    let sum = frame_checksum(size as u8, header.iter().chain(payload).copied());

    // Worst case every envelope byte is escaped.
    dst.reserve(4 + size * 2);
    dst.put_u8(START);
    dst.put_u8(size as u8);
    for &b in header.iter().chain(payload) {
        put_escaped(dst, b);
    }
    dst.put_u8(sum);
    dst.put_u8(END);
    Ok(())
}

fn put_escaped(dst: &mut BytesMut, b: u8) {
    if matches!(b, ESCAPE | START | END) {
        dst.put_u8(ESCAPE);
        dst.put_u8(b ^ 0xFF);
    } else {
        dst.put_u8(b);
    }
}

/// Decode one frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Envelope>> {
    match parse(src)? {
        Parsed::Complete { envelope, consumed } => {
            src.advance(consumed);
            Ok(Some(envelope))
        }
        Parsed::Incomplete { .. } => Ok(None),
    }
}

/// Decode exactly one complete wire message.
///
/// Bytes after the end delimiter are ignored.
pub fn decode(bytes: &[u8]) -> Result<Envelope> {
    match parse(bytes)? {
        Parsed::Complete { envelope, .. } => Ok(envelope),
        Parsed::Incomplete {
            mid_escape: true, ..
        } => Err(FrameError::TruncatedEscape),
        Parsed::Incomplete { needed, .. } => Err(FrameError::Truncated { needed }),
    }
}

enum Parsed {
    Complete { envelope: Envelope, consumed: usize },
    Incomplete { needed: usize, mid_escape: bool },
}

fn parse(src: &[u8]) -> Result<Parsed> {
    let Some(&first) = src.first() else {
        return Ok(Parsed::Incomplete {
            needed: HEADER_LEN + 4,
            mid_escape: false,
        });
    };
    if first != START {
        return Err(FrameError::InvalidStart(first));
    }
    let Some(&length) = src.get(1) else {
        return Ok(Parsed::Incomplete {
            needed: HEADER_LEN + 3,
            mid_escape: false,
        });
    };
    let len = usize::from(length);
    if len < HEADER_LEN {
        return Err(FrameError::EnvelopeTooShort(len));
    }

    // The length field counts unescaped bytes, so walk the escaped region
    // until `len` bytes have been produced.
    let escaped = &src[2..];
    let mut raw = Vec::with_capacity(len);
    let mut pos = 0usize;
    while raw.len() < len {
        let Some(&b) = escaped.get(pos) else {
            return Ok(Parsed::Incomplete {
                needed: len - raw.len() + 2,
                mid_escape: false,
            });
        };
        match b {
            ESCAPE => {
                let Some(&next) = escaped.get(pos + 1) else {
                    return Ok(Parsed::Incomplete {
                        needed: len - raw.len() + 2,
                        mid_escape: true,
                    });
                };
                if next == START || next == END {
                    return Err(FrameError::UnescapedDelimiter(next));
                }
                raw.push(next ^ 0xFF);
                pos += 2;
            }
            START | END => return Err(FrameError::UnescapedDelimiter(b)),
            _ => {
                raw.push(b);
                pos += 1;
            }
        }
    }

    let tail = 2 + pos;
    if src.len() < tail + 2 {
        return Ok(Parsed::Incomplete {
            needed: tail + 2 - src.len(),
            mid_escape: false,
        });
    }

    let received = src[tail];
    let end = src[tail + 1];
    if end != END {
        return Err(FrameError::InvalidEnd(end));
    }

    let expected = frame_checksum(length, raw.iter().copied());
    if received != expected {
        return Err(FrameError::ChecksumMismatch {
            expected,
            actual: received,
        });
    }

    Ok(Parsed::Complete {
        envelope: Envelope::from_unescaped(raw),
        consumed: tail + 2,
    })
}
