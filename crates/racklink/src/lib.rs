//! Control RackLink networked power distribution units.
//!
//! racklink speaks the PDU's binary TCP control protocol: it logs in, keeps
//! the session alive, and switches or queries outlets.
//!
//! # Crate Structure
//!
//! - [`frame`]: wire framing, escaping and checksums
//! - [`transport`]: TCP connection and login handshake
//! - [`client`]: persistent session, retries and the outlet API
//!
//! Most users only need [`RackLinkClient`].

/// Re-export frame types.
pub mod frame {
    pub use racklink_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use racklink_transport::*;
}

/// Re-export client types.
pub mod client {
    pub use racklink_client::*;
}

pub use racklink_client::{
    ClientConfig, ClientError, ConnectionState, Credentials, OutletPresence, RackLinkClient,
    RetryPolicy, TransportConfig,
};
