//! TCP transport for RackLink PDUs.
//!
//! Opens the single TCP connection a PDU accepts, wraps it in the frame
//! codec, and performs the credential handshake. This is the lowest async
//! layer; the session machinery in `racklink-client` builds on the
//! [`Connection`] type provided here.

pub mod config;
pub mod connection;
pub mod error;
pub mod handshake;

pub use config::{Credentials, TransportConfig, DEFAULT_PASSWORD, DEFAULT_PORT, DEFAULT_USERNAME};
pub use connection::{Connection, FrameSink, FrameSource};
pub use error::{Result, TransportError};
pub use handshake::{check_login_response, login};
