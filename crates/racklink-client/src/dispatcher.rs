use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use racklink_frame::command::{is_nack, is_ping, PING, SUB_RESPONSE};
use racklink_frame::{command_name, Envelope};
use racklink_transport::{FrameSink, FrameSource, TransportError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{ClientError, Result};
use crate::state::ConnectionState;

/// Bound on flushing the write half when the loop stops.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// A command handed to the read loop, plus the slot its answer goes to.
pub(crate) struct PendingRequest {
    pub envelope: Envelope,
    pub reply: oneshot::Sender<Result<Envelope>>,
}

/// What an inbound frame means to the session.
#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    /// Device keepalive probe; answered immediately.
    Keepalive,
    /// Device rejected the pending command.
    Nack { code: u8 },
    /// Anything else answers the pending command.
    Response(Envelope),
}

impl Inbound {
    fn classify(envelope: Envelope) -> Self {
        if is_ping(envelope.command, envelope.subcommand) {
            Inbound::Keepalive
        } else if is_nack(envelope.command, envelope.subcommand) {
            Inbound::Nack {
                code: envelope.payload.first().copied().unwrap_or_default(),
            }
        } else {
            Inbound::Response(envelope)
        }
    }
}

/// Background task that owns both halves of a logged-in connection.
///
/// It is the only reader of the socket and the only writer. Commands come
/// in over `requests`; at most one is pending at a time. A new request
/// replaces a pending one (its requester has given up).
pub(crate) struct Dispatcher {
    frames: FrameSource,
    sink: FrameSink,
    requests: mpsc::Receiver<PendingRequest>,
    cancel: CancellationToken,
    state: Arc<watch::Sender<ConnectionState>>,
    pending: Option<oneshot::Sender<Result<Envelope>>>,
}

impl Dispatcher {
    pub(crate) fn spawn(
        frames: FrameSource,
        sink: FrameSink,
        requests: mpsc::Receiver<PendingRequest>,
        cancel: CancellationToken,
        state: Arc<watch::Sender<ConnectionState>>,
    ) -> JoinHandle<()> {
        let dispatcher = Self {
            frames,
            sink,
            requests,
            cancel,
            state,
            pending: None,
        };
        tokio::spawn(dispatcher.run())
    }

    async fn run(mut self) {
        debug!("read loop started");

        match self.serve().await {
            Ok(()) => debug!("read loop stopped"),
            Err(err) => {
                warn!(error = %err, "read loop failed");
                self.state.send_replace(ConnectionState::Failed);
                if let Some(reply) = self.pending.take() {
                    let _ = reply.send(Err(err));
                }
            }
        }

        let _ = timeout(CLOSE_TIMEOUT, self.sink.close()).await;
    }

    async fn serve(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Ok(()),

                request = self.requests.recv() => match request {
                    Some(request) => self.submit(request).await?,
                    // Client dropped its handle.
                    None => return Ok(()),
                },

                frame = self.frames.next() => match frame {
                    Some(Ok(envelope)) => self.route(envelope).await?,
                    Some(Err(err)) => return Err(err.into()),
                    None => return Err(ClientError::Transport(TransportError::Closed)),
                },
            }
        }
    }

    async fn submit(&mut self, request: PendingRequest) -> Result<()> {
        if self.pending.take().is_some() {
            debug!("replacing abandoned request");
        }
        trace!(
            command = command_name(request.envelope.command),
            subcommand = request.envelope.subcommand,
            "writing request"
        );
        self.pending = Some(request.reply);
        self.sink.send(request.envelope).await?;
        Ok(())
    }

    async fn route(&mut self, envelope: Envelope) -> Result<()> {
        match Inbound::classify(envelope) {
            Inbound::Keepalive => {
                debug!("keepalive probe, answering");
                self.sink.send(Envelope::bare(PING, SUB_RESPONSE)).await?;
            }
            Inbound::Nack { code } => self.resolve(Err(ClientError::nack(code))),
            Inbound::Response(envelope) => self.resolve(Ok(envelope)),
        }
        Ok(())
    }

    fn resolve(&mut self, result: Result<Envelope>) {
        match self.pending.take() {
            Some(reply) => {
                if reply.send(result).is_err() {
                    debug!("requester went away before its response arrived");
                }
            }
            None => match result {
                Ok(envelope) => debug!(
                    command = command_name(envelope.command),
                    subcommand = envelope.subcommand,
                    "dropping unsolicited frame"
                ),
                Err(err) => debug!(error = %err, "dropping unsolicited NACK"),
            },
        }
    }
}
