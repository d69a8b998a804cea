use std::sync::Arc;
use std::time::Duration;

use racklink_frame::Envelope;
use racklink_transport::{login, Connection, TransportError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::dispatcher::{Dispatcher, PendingRequest};
use crate::error::{ClientError, Result};
use crate::outlet::{parse_ping, ping_request};
use crate::state::ConnectionState;

/// Bound on waiting for the read loop to exit after cancellation.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// One logged-in connection and the read loop serving it.
pub(crate) struct Session {
    id: u64,
    requests: mpsc::Sender<PendingRequest>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Cheap handle used to issue requests without holding the session slot.
#[derive(Clone)]
pub(crate) struct SessionHandle {
    pub id: u64,
    requests: mpsc::Sender<PendingRequest>,
    cancel: CancellationToken,
}

impl Session {
    /// Connect, log in, start the read loop and confirm with a ping.
    pub(crate) async fn establish(
        id: u64,
        config: &ClientConfig,
        state: &Arc<watch::Sender<ConnectionState>>,
    ) -> Result<Self> {
        state.send_replace(ConnectionState::Connecting);
        let mut conn = Connection::open(&config.transport).await?;

        state.send_replace(ConnectionState::Authenticating);
        if let Err(err) = login(&mut conn, &config.transport.credentials).await {
            conn.close().await;
            return Err(err.into());
        }

        let (frames, sink) = conn.into_split();
        let (requests, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task = Dispatcher::spawn(frames, sink, rx, cancel.clone(), state.clone());
        let session = Self {
            id,
            requests,
            cancel,
            task,
        };

        let confirmed = session
            .handle()
            .request(ping_request(), config.response_timeout)
            .await
            .and_then(|response| {
                if parse_ping(&response) {
                    Ok(())
                } else {
                    Err(ClientError::Protocol(format!(
                        "expected pong after login, got {:#04x}/{:#04x}",
                        response.command, response.subcommand
                    )))
                }
            });
        if let Err(err) = confirmed {
            session.shutdown().await;
            return Err(err);
        }

        state.send_replace(ConnectionState::Ready);
        debug!(session = id, "session ready");
        Ok(session)
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// True while the read loop is still running.
    pub(crate) fn is_alive(&self) -> bool {
        !self.requests.is_closed() && !self.task.is_finished()
    }

    pub(crate) fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id,
            requests: self.requests.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Stop the read loop and wait for it to release the socket.
    pub(crate) async fn shutdown(mut self) {
        self.cancel.cancel();
        if timeout(SHUTDOWN_TIMEOUT, &mut self.task).await.is_err() {
            warn!(session = self.id, "read loop did not stop in time, aborting");
            self.task.abort();
        }
        debug!(session = self.id, "session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl SessionHandle {
    /// Send one command and wait for the frame that answers it.
    pub(crate) async fn request(&self, envelope: Envelope, deadline: Duration) -> Result<Envelope> {
        let (reply, rx) = oneshot::channel();
        let exchange = async {
            self.requests
                .send(PendingRequest { envelope, reply })
                .await
                .map_err(|_| self.gone())?;
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(self.gone()),
            }
        };

        match timeout(deadline, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(deadline)),
        }
    }

    fn gone(&self) -> ClientError {
        if self.cancel.is_cancelled() {
            ClientError::Closed
        } else {
            ClientError::Transport(TransportError::Closed)
        }
    }
}
