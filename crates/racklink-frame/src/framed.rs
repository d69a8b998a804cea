use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::codec::{decode_frame, Envelope};
use crate::command::command_name;
use crate::error::{FrameError, Result};

/// `tokio_util` codec for RackLink frames.
///
/// Wrap a socket half in `FramedRead`/`FramedWrite` with this codec to get a
/// `Stream` of [`Envelope`]s and a `Sink` accepting them.
#[derive(Debug, Clone, Copy, Default)]
pub struct RackLinkCodec;

impl RackLinkCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for RackLinkCodec {
    type Item = Envelope;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>> {
        let frame = decode_frame(src)?;
        if let Some(envelope) = &frame {
            trace!(
                command = command_name(envelope.command),
                subcommand = envelope.subcommand,
                len = envelope.envelope_len(),
                "decoded frame"
            );
        }
        Ok(frame)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Envelope>> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Envelope> for RackLinkCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<()> {
        item.encode_into(dst)
    }
}
