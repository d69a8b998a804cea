use std::time::Duration;

use racklink_transport::TransportConfig;

use crate::retry::RetryPolicy;

/// Default bound on waiting for the response to one command.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Address, credentials and socket timeouts.
    pub transport: TransportConfig,
    /// Deadline for the response to each command attempt. Default: 10 s.
    pub response_timeout: Duration,
    /// Retry policy for connecting and for failed command exchanges.
    pub retry: RetryPolicy,
}

impl ClientConfig {
    /// Configuration for `host` with every other setting at its default.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            transport: TransportConfig::new(host),
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}
