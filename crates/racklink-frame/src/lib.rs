//! Wire framing for the RackLink PDU control protocol.
//!
//! Every message on the wire is framed as:
//! - a `0xFE` start byte
//! - a 1-byte length of the unescaped envelope
//! - the escaped envelope (`destination, command, subcommand, payload..`)
//! - a 7-bit additive checksum
//! - a `0xFF` end byte
//!
//! Everything here is pure: no sockets, no state. The `async` feature adds a
//! [`tokio_util::codec`] adapter so the same rules drive a `Framed` stream.

pub mod codec;
pub mod command;
pub mod error;
#[cfg(feature = "async")]
pub mod framed;
pub mod nack;

pub use codec::{
    checksum, decode, decode_frame, encode, encode_frame, escape, unescape, Envelope, END, ESCAPE,
    HEADER_LEN, MAX_ENVELOPE_LEN, MAX_PAYLOAD_LEN, START,
};
pub use command::command_name;
pub use error::{FrameError, Result};
#[cfg(feature = "async")]
pub use framed::RackLinkCodec;
pub use nack::{is_session_nack, nack_message};
