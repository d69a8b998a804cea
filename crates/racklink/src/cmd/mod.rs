use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use racklink_client::{ClientConfig, Credentials, RackLinkClient, RetryPolicy, TransportConfig};
use racklink_transport::{DEFAULT_PASSWORD, DEFAULT_PORT, DEFAULT_USERNAME};

use crate::exit::{client_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod count;
pub mod ping;
pub mod set;
pub mod status;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the PDU answers a ping.
    Ping,
    /// Count the outlets the PDU reports as present.
    Count,
    /// Show outlet power states.
    Status(StatusArgs),
    /// Switch an outlet on or off.
    Set(SetArgs),
    /// Poll outlet states until interrupted.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, device: &DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ping => ping::run(device, format).await,
        Command::Count => count::run(device, format).await,
        Command::Status(args) => status::run(args, device, format).await,
        Command::Set(args) => set::run(args, device, format).await,
        Command::Watch(args) => watch::run(args, device, format).await,
        Command::Version(args) => version::run(args),
    }
}

/// Where the PDU is and how to log in.
#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// PDU host name or IP address.
    #[arg(long, env = "RACKLINK_HOST", global = true)]
    pub host: Option<String>,
    /// PDU control port.
    #[arg(long, env = "RACKLINK_PORT", default_value_t = DEFAULT_PORT, global = true)]
    pub port: u16,
    /// Login user name.
    #[arg(long, env = "RACKLINK_USERNAME", default_value = DEFAULT_USERNAME, global = true)]
    pub username: String,
    /// Login password.
    #[arg(
        long,
        env = "RACKLINK_PASSWORD",
        default_value = DEFAULT_PASSWORD,
        hide_default_value = true,
        hide_env_values = true,
        global = true
    )]
    pub password: String,
    /// Response timeout per command attempt (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s", global = true)]
    pub timeout: String,
    /// Attempts per command before giving up.
    #[arg(long, default_value_t = 3, global = true)]
    pub retries: u32,
}

impl DeviceArgs {
    pub fn host(&self) -> CliResult<&str> {
        self.host
            .as_deref()
            .filter(|host| !host.trim().is_empty())
            .ok_or_else(|| CliError::new(USAGE, "no PDU host given (use --host or RACKLINK_HOST)"))
    }

    pub fn client_config(&self) -> CliResult<ClientConfig> {
        let timeout = parse_duration(&self.timeout)?;
        if self.retries == 0 {
            return Err(CliError::new(USAGE, "--retries must be at least 1"));
        }

        let mut transport = TransportConfig::new(self.host()?);
        transport.port = self.port;
        transport.credentials = Credentials::new(&self.username, &self.password);
        transport.connect_timeout = timeout;
        transport.io_timeout = timeout;

        Ok(ClientConfig {
            transport,
            response_timeout: timeout,
            retry: RetryPolicy {
                max_attempts: self.retries,
                ..RetryPolicy::default()
            },
        })
    }
}

/// Build a client and open its session.
pub async fn connect(device: &DeviceArgs) -> CliResult<RackLinkClient> {
    let client = RackLinkClient::new(device.client_config()?);
    client
        .connect()
        .await
        .map_err(|err| client_error("connect failed", err))?;
    Ok(client)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Power {
    On,
    Off,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Outlets to query. Default: every outlet the PDU reports.
    pub outlets: Vec<u8>,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Outlet number (from 1).
    pub outlet: u8,
    /// Desired power state.
    pub state: Power,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Outlets to poll. Default: every outlet the PDU reports.
    pub outlets: Vec<u8>,
    /// Time between polls (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub interval: String,
    /// Stop after N polls.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(host: Option<&str>) -> DeviceArgs {
        DeviceArgs {
            host: host.map(str::to_string),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            timeout: "2s".to_string(),
            retries: 2,
        }
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn client_config_from_flags() {
        let config = device(Some("pdu.local")).client_config().unwrap();
        assert_eq!(config.transport.address(), "pdu.local:60000");
        assert_eq!(config.response_timeout, Duration::from_secs(2));
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.transport.credentials.username, "user");
    }

    #[test]
    fn missing_host_is_usage_error() {
        assert_eq!(device(None).client_config().unwrap_err().code, USAGE);
        assert_eq!(device(Some("  ")).client_config().unwrap_err().code, USAGE);
    }
}
