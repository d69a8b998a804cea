//! Client for RackLink networked power-distribution units.
//!
//! This is the "just works" layer. A [`RackLinkClient`] owns one persistent
//! session with a PDU: it logs in, keeps the device's keepalive probes
//! answered in the background, and serializes commands so that exactly one
//! is on the wire at a time. Failed exchanges are retried over a fresh
//! connection according to a [`RetryPolicy`].
//!
//! ```no_run
//! use racklink_client::{ClientConfig, RackLinkClient};
//!
//! # async fn run() -> racklink_client::Result<()> {
//! let client = RackLinkClient::new(ClientConfig::new("192.168.1.50"));
//! client.connect().await?;
//!
//! let count = client.outlet_count().await?;
//! for outlet in 1..=count as u8 {
//!     let on = client.outlet_status(outlet).await?;
//!     println!("outlet {outlet}: {}", if on { "ON" } else { "OFF" });
//! }
//! client.set_outlet_state(3, false).await?;
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
mod dispatcher;
pub mod error;
pub mod outlet;
pub mod retry;
mod session;
pub mod state;

pub use client::RackLinkClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use outlet::{OutletPresence, PRESENCE_MAP_LEN};
pub use racklink_transport::{Credentials, TransportConfig};
pub use retry::RetryPolicy;
pub use state::ConnectionState;
