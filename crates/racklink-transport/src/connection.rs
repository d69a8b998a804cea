use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use racklink_frame::{command_name, Envelope, RackLinkCodec};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace};

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};

/// Inbound half of a connection: a `Stream` of decoded envelopes.
pub type FrameSource = FramedRead<OwnedReadHalf, RackLinkCodec>;

/// Outbound half of a connection: a `Sink` of envelopes.
pub type FrameSink = FramedWrite<OwnedWriteHalf, RackLinkCodec>;

/// One framed TCP connection to a PDU.
///
/// Every read and write is bounded by the configured I/O timeout.
pub struct Connection {
    reader: FrameSource,
    writer: FrameSink,
    addr: String,
    io_timeout: Duration,
}

impl Connection {
    /// Open the TCP socket (bounded by `connect_timeout`).
    pub async fn open(config: &TransportConfig) -> Result<Self> {
        let addr = config.address();
        debug!(%addr, "connecting");

        let stream = match timeout(config.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(TransportError::Connect { addr, source }),
            Err(_) => {
                return Err(TransportError::ConnectTimeout {
                    addr,
                    timeout: config.connect_timeout,
                })
            }
        };
        // Frames are tiny; don't let Nagle hold a command back.
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        debug!(%addr, "connected");

        Ok(Self {
            reader: FramedRead::new(read_half, RackLinkCodec::new()),
            writer: FramedWrite::new(write_half, RackLinkCodec::new()),
            addr,
            io_timeout: config.io_timeout,
        })
    }

    /// Encode and send one envelope.
    pub async fn send(&mut self, envelope: Envelope) -> Result<()> {
        trace!(
            command = command_name(envelope.command),
            subcommand = envelope.subcommand,
            "sending frame"
        );
        match timeout(self.io_timeout, self.writer.send(envelope)).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(TransportError::Timeout(self.io_timeout)),
        }
    }

    /// Receive the next envelope.
    pub async fn recv(&mut self) -> Result<Envelope> {
        match timeout(self.io_timeout, self.reader.next()).await {
            Ok(Some(frame)) => frame.map_err(Into::into),
            Ok(None) => Err(TransportError::Closed),
            Err(_) => Err(TransportError::Timeout(self.io_timeout)),
        }
    }

    /// `host:port` this connection was opened to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Configured per-operation I/O timeout.
    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Split into the inbound stream and outbound sink.
    pub fn into_split(self) -> (FrameSource, FrameSink) {
        (self.reader, self.writer)
    }

    /// Flush and shut down the write side. Errors are ignored; the socket
    /// is dropped either way.
    pub async fn close(mut self) {
        let _ = timeout(self.io_timeout, self.writer.close()).await;
        debug!(addr = %self.addr, "connection closed");
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("addr", &self.addr)
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}
