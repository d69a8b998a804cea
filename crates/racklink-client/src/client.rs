use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use racklink_frame::{command_name, Envelope, FrameError, MAX_ENVELOPE_LEN};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::session::{Session, SessionHandle};
use crate::state::ConnectionState;

/// Persistent, self-healing session with one PDU.
///
/// All methods take `&self`; share the client behind an `Arc` to issue
/// commands from several tasks. Commands are serialized: a call waits for
/// its turn, and the next command is written only after the previous one
/// has been answered, timed out or failed.
pub struct RackLinkClient {
    config: ClientConfig,
    /// Held for the whole of one command, retries included.
    turn: tokio::sync::Mutex<()>,
    session: Mutex<Option<Session>>,
    state: Arc<watch::Sender<ConnectionState>>,
    next_session: AtomicU64,
    /// Bumped by `close()` so in-flight calls stop instead of reconnecting.
    close_epoch: AtomicU64,
}

impl RackLinkClient {
    /// Create a disconnected client. Nothing touches the network until
    /// [`connect`](Self::connect) or the first command.
    pub fn new(config: ClientConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            turn: tokio::sync::Mutex::new(()),
            session: Mutex::new(None),
            state: Arc::new(state),
            next_session: AtomicU64::new(1),
            close_epoch: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// True when logged in with a running read loop.
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Open a fresh session: connect, log in, start the read loop and
    /// confirm with a ping. Any existing session is torn down first.
    ///
    /// Failed attempts are retried per the configured policy. A rejected
    /// login is returned immediately as [`ClientError::Authentication`].
    pub async fn connect(&self) -> Result<()> {
        let _turn = self.turn.lock().await;
        let epoch = self.epoch();

        let stale = self.slot().take();
        if let Some(stale) = stale {
            stale.shutdown().await;
        }

        let policy = self.config.retry;
        let attempts = policy.attempts();
        let mut last = None;

        for attempt in 1..=attempts {
            self.ensure_open(epoch)?;
            match self.establish(epoch).await {
                Ok(()) => return Ok(()),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    warn!(attempt, attempts, error = %err, "connect attempt failed");
                    last = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(policy.delay_after(attempt)).await;
                    }
                }
            }
        }

        Err(ClientError::RetriesExhausted {
            attempts,
            last: Box::new(last.unwrap_or(ClientError::Closed)),
        })
    }

    /// Stop the read loop, close the socket and mark the client
    /// disconnected. Calls in flight fail with [`ClientError::Closed`].
    /// Safe to call repeatedly; a later command reconnects.
    pub async fn close(&self) {
        self.close_epoch.fetch_add(1, Ordering::SeqCst);
        let session = self.slot().take();
        if let Some(session) = session {
            session.shutdown().await;
            info!(addr = %self.config.transport.address(), "disconnected");
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }

    /// Send one command and return the device's answer.
    ///
    /// Connects first if needed. A timeout, malformed frame, lost socket or
    /// session-expired NACK tears the session down and the command is
    /// re-sent over a new one, up to the policy's attempt count. Other
    /// NACKs come back as [`ClientError::Nack`] with the session intact.
    pub async fn send_and_receive(
        &self,
        command: u8,
        subcommand: u8,
        payload: impl Into<Bytes>,
    ) -> Result<Envelope> {
        let envelope = Envelope::new(command, subcommand, payload);
        if envelope.envelope_len() > MAX_ENVELOPE_LEN {
            return Err(FrameError::EnvelopeTooLong {
                size: envelope.envelope_len(),
                max: MAX_ENVELOPE_LEN,
            }
            .into());
        }

        let _turn = self.turn.lock().await;
        let epoch = self.epoch();
        let policy = self.config.retry;
        let attempts = policy.attempts();
        let mut last = None;

        for attempt in 1..=attempts {
            self.ensure_open(epoch)?;

            let outcome = match self.live_handle().await {
                Some(handle) => self.exchange(&handle, envelope.clone()).await,
                None => match self.establish(epoch).await {
                    Ok(()) => match self.live_handle().await {
                        Some(handle) => self.exchange(&handle, envelope.clone()).await,
                        None => Err(ClientError::Closed),
                    },
                    Err(err) => Err(err),
                },
            };

            let err = match outcome {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            if self.epoch() != epoch {
                return Err(ClientError::Closed);
            }
            if !err.is_retryable() {
                return Err(err);
            }

            warn!(
                attempt,
                attempts,
                command = command_name(command),
                error = %err,
                "command failed, reconnecting"
            );
            self.teardown().await;
            last = Some(err);
            if attempt < attempts {
                tokio::time::sleep(policy.delay_after(attempt)).await;
            }
        }

        Err(ClientError::RetriesExhausted {
            attempts,
            last: Box::new(last.unwrap_or(ClientError::Closed)),
        })
    }

    async fn exchange(&self, handle: &SessionHandle, envelope: Envelope) -> Result<Envelope> {
        debug!(
            session = handle.id,
            command = command_name(envelope.command),
            subcommand = envelope.subcommand,
            "sending command"
        );
        handle.request(envelope, self.config.response_timeout).await
    }

    /// Establish one session and install it, unless `close()` ran meanwhile.
    async fn establish(&self, epoch: u64) -> Result<()> {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let session = match Session::establish(id, &self.config, &self.state).await {
            Ok(session) => session,
            Err(err) => {
                if self.epoch() == epoch {
                    self.state.send_replace(ConnectionState::Failed);
                }
                return Err(err);
            }
        };

        let rejected = {
            let mut slot = self.slot();
            if self.epoch() == epoch {
                *slot = Some(session);
                None
            } else {
                Some(session)
            }
        };
        if let Some(session) = rejected {
            session.shutdown().await;
            self.state.send_replace(ConnectionState::Disconnected);
            return Err(ClientError::Closed);
        }

        info!(
            addr = %self.config.transport.address(),
            session = id,
            "connected"
        );
        Ok(())
    }

    /// Handle to the current session if its read loop is still running.
    /// A dead session is removed.
    async fn live_handle(&self) -> Option<SessionHandle> {
        let dead = {
            let mut slot = self.slot();
            match slot.as_ref().map(Session::is_alive) {
                Some(true) => return slot.as_ref().map(Session::handle),
                Some(false) => slot.take(),
                None => None,
            }
        };
        if let Some(dead) = dead {
            debug!(session = dead.id(), "discarding dead session");
            dead.shutdown().await;
        }
        None
    }

    async fn teardown(&self) {
        let session = self.slot().take();
        if let Some(session) = session {
            session.shutdown().await;
        }
        self.state.send_replace(ConnectionState::Failed);
    }

    fn ensure_open(&self, epoch: u64) -> Result<()> {
        if self.epoch() == epoch {
            Ok(())
        } else {
            Err(ClientError::Closed)
        }
    }

    fn epoch(&self) -> u64 {
        self.close_epoch.load(Ordering::SeqCst)
    }

    fn slot(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RackLinkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RackLinkClient")
            .field("addr", &self.config.transport.address())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use racklink_transport::TransportConfig;
    use std::time::Duration;

    fn unreachable_config() -> ClientConfig {
        // Port 1 on loopback refuses connections.
        let mut transport = TransportConfig::new("127.0.0.1");
        transport.port = 1;
        transport.connect_timeout = Duration::from_millis(200);
        ClientConfig {
            transport,
            response_timeout: Duration::from_millis(200),
            retry: RetryPolicy {
                max_attempts: 2,
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(5),
            },
        }
    }

    #[test]
    fn starts_disconnected() {
        let client = RackLinkClient::new(ClientConfig::default());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.is_ready());
    }

    #[tokio::test]
    async fn close_without_connect_is_harmless() {
        let client = RackLinkClient::new(ClientConfig::default());
        client.close().await;
        client.close().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn unreachable_device_exhausts_retries() {
        let client = RackLinkClient::new(unreachable_config());
        match client.connect().await {
            Err(ClientError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert!(last.is_connection_error(), "{last:?}");
            }
            other => panic!("expected exhausted retries, got {other:?}"),
        }
        assert_eq!(client.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn oversized_command_is_rejected_locally() {
        let client = RackLinkClient::new(unreachable_config());
        let err = client
            .send_and_receive(0x20, 0x01, vec![0u8; 253])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Frame(FrameError::EnvelopeTooLong { size: 256, .. })
        ));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
