use std::fmt;

/// Lifecycle of the client's connection to the PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session. The next command connects first.
    #[default]
    Disconnected,
    /// TCP connect in progress.
    Connecting,
    /// Socket open, login in progress.
    Authenticating,
    /// Logged in, read loop running, session confirmed by a ping.
    Ready,
    /// The session broke (read error, lost socket, rejected login).
    Failed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Ready => "ready",
            ConnectionState::Failed => "failed",
        }
    }

    pub fn is_ready(self) -> bool {
        self == ConnectionState::Ready
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
