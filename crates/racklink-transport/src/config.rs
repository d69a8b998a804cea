use std::fmt;
use std::time::Duration;

use racklink_frame::MAX_PAYLOAD_LEN;

use crate::error::{Result, TransportError};

/// TCP port the PDU control service listens on.
pub const DEFAULT_PORT: u16 = 60000;
/// Factory default user name.
pub const DEFAULT_USERNAME: &str = "user";
/// Factory default password.
pub const DEFAULT_PASSWORD: &str = "cstmcstm";

const CREDENTIAL_SEPARATOR: char = '|';

/// Login credentials.
///
/// The password is sent in plaintext on the wire and is redacted in debug
/// output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Payload of the login command: ASCII `username|password`.
    pub fn login_payload(&self) -> Vec<u8> {
        format!(
            "{}{CREDENTIAL_SEPARATOR}{}",
            self.username, self.password
        )
        .into_bytes()
    }

    /// Check that the credentials can be carried by a single login frame.
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(TransportError::InvalidConfig(
                "username must not be empty".to_string(),
            ));
        }
        if self.username.contains(CREDENTIAL_SEPARATOR) {
            return Err(TransportError::InvalidConfig(format!(
                "username must not contain '{CREDENTIAL_SEPARATOR}'"
            )));
        }
        if !self.username.is_ascii() || !self.password.is_ascii() {
            return Err(TransportError::InvalidConfig(
                "credentials must be ASCII".to_string(),
            ));
        }
        let len = self.username.len() + 1 + self.password.len();
        if len > MAX_PAYLOAD_LEN {
            return Err(TransportError::InvalidConfig(format!(
                "credentials too long ({len} bytes, max {MAX_PAYLOAD_LEN})"
            )));
        }
        Ok(())
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_PASSWORD)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field(
                "password",
                &format_args!("<redacted:{} bytes>", self.password.len()),
            )
            .finish()
    }
}

/// Where and how to reach a PDU.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Host name or IP address of the PDU.
    pub host: String,
    /// TCP port. Default: 60000.
    pub port: u16,
    /// Login credentials.
    pub credentials: Credentials,
    /// Bound on the TCP connect. Default: 10 s.
    pub connect_timeout: Duration,
    /// Bound on each frame read or write during the handshake. Default: 10 s.
    pub io_timeout: Duration,
}

impl TransportConfig {
    /// Configuration for `host` with every other setting at its default.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// `host:port` string used for connecting and logging.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            credentials: Credentials::default(),
            connect_timeout: Duration::from_secs(10),
            io_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_login_payload() {
        assert_eq!(Credentials::default().login_payload(), b"user|cstmcstm");
    }

    #[test]
    fn debug_output_redacts_password() {
        let creds = Credentials::new("admin", "super-secret");
        let debug = format!("{creds:?}");
        assert!(debug.contains("admin"));
        assert!(debug.contains("<redacted:12 bytes>"));
        assert!(!debug.contains("super-secret"));

        let config = TransportConfig {
            credentials: creds,
            ..TransportConfig::new("pdu.local")
        };
        assert!(!format!("{config:?}").contains("super-secret"));
    }

    #[test]
    fn rejects_unusable_credentials() {
        assert!(Credentials::new("", "x").validate().is_err());
        assert!(Credentials::new("a|b", "x").validate().is_err());
        assert!(Credentials::new("user", "pässword").validate().is_err());
        assert!(Credentials::new("user", "x".repeat(MAX_PAYLOAD_LEN))
            .validate()
            .is_err());
        assert!(Credentials::default().validate().is_ok());
    }

    #[test]
    fn address_uses_default_port() {
        assert_eq!(TransportConfig::new("10.0.0.5").address(), "10.0.0.5:60000");
    }
}
