//! Outlet commands.
//!
//! Request builders and response parsers are plain functions so they can be
//! checked without a device; the async methods on [`RackLinkClient`] run
//! them through the command correlator.

use std::collections::BTreeMap;

use racklink_frame::command::{
    is_pong, OUTLET_PRESENCE, OUTLET_STATE, PING, SUB_GET, SUB_NOTIFY, SUB_PING, SUB_RESPONSE,
    SUB_SET, SUB_STATUS,
};
use racklink_frame::Envelope;
use tracing::debug;

use crate::client::RackLinkClient;
use crate::error::{ClientError, Result};

/// Size of the outlet presence map in an outlet-count response.
pub const PRESENCE_MAP_LEN: usize = 16;

/// Envelope offset of the state byte in an outlet-status response.
const STATE_OFFSET: usize = 4;

/// Padding the device expects after the state byte of a set command.
const SET_PADDING: [u8; 4] = *b"0000";

/// Whether a slot in the presence map holds an outlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutletPresence {
    Present,
    Absent,
}

impl OutletPresence {
    /// `C` and `N` mark populated slots; anything else is empty.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'C' | b'N' => OutletPresence::Present,
            _ => OutletPresence::Absent,
        }
    }

    pub fn is_present(self) -> bool {
        self == OutletPresence::Present
    }
}

pub fn ping_request() -> Envelope {
    Envelope::bare(PING, SUB_PING)
}

/// True when the response is a pong.
pub fn parse_ping(response: &Envelope) -> bool {
    is_pong(response.command, response.subcommand)
}

pub fn presence_request() -> Envelope {
    Envelope::bare(OUTLET_PRESENCE, SUB_GET)
}

/// Parse the presence map. A shorter map than usual is accepted as-is.
pub fn parse_presence_map(response: &Envelope) -> Result<Vec<OutletPresence>> {
    if !response.is(OUTLET_PRESENCE, SUB_RESPONSE) {
        return Err(unexpected("outlet count", response));
    }
    let map = &response.payload[..response.payload.len().min(PRESENCE_MAP_LEN)];
    Ok(map.iter().copied().map(OutletPresence::from_byte).collect())
}

/// Count the populated slots in an outlet-count response.
pub fn parse_outlet_count(response: &Envelope) -> Result<usize> {
    Ok(parse_presence_map(response)?
        .into_iter()
        .filter(|slot| slot.is_present())
        .count())
}

pub fn status_request(outlet: u8) -> Result<Envelope> {
    check_outlet(outlet)?;
    Ok(Envelope::new(OUTLET_STATE, SUB_GET, vec![outlet]))
}

/// True when the outlet is ON.
pub fn parse_outlet_status(response: &Envelope) -> Result<bool> {
    let shape_ok = response.command == OUTLET_STATE
        && matches!(response.subcommand, SUB_RESPONSE | SUB_STATUS | SUB_NOTIFY);
    if !shape_ok {
        return Err(unexpected("outlet status", response));
    }
    response
        .byte(STATE_OFFSET)
        .map(|state| state == 0x01)
        .ok_or_else(|| ClientError::Protocol("outlet status response has no state byte".into()))
}

pub fn set_state_request(outlet: u8, on: bool) -> Result<Envelope> {
    check_outlet(outlet)?;
    let mut payload = vec![outlet, u8::from(on)];
    payload.extend_from_slice(&SET_PADDING);
    Ok(Envelope::new(OUTLET_STATE, SUB_SET, payload))
}

pub fn check_set_state(response: &Envelope) -> Result<()> {
    if response.is(OUTLET_STATE, SUB_RESPONSE) {
        Ok(())
    } else {
        Err(unexpected("set outlet state", response))
    }
}

fn check_outlet(outlet: u8) -> Result<()> {
    if outlet == 0 {
        return Err(ClientError::InvalidOutlet(outlet));
    }
    Ok(())
}

fn unexpected(what: &str, response: &Envelope) -> ClientError {
    ClientError::Protocol(format!(
        "unexpected {what} response {:#04x}/{:#04x}",
        response.command, response.subcommand
    ))
}

impl RackLinkClient {
    /// Round-trip a ping. True when the device answered with a pong.
    pub async fn ping(&self) -> Result<bool> {
        let response = self.request(ping_request()).await?;
        Ok(parse_ping(&response))
    }

    /// Number of populated outlets.
    pub async fn outlet_count(&self) -> Result<usize> {
        let response = self.request(presence_request()).await?;
        parse_outlet_count(&response)
    }

    /// Per-slot presence map.
    pub async fn outlet_presence(&self) -> Result<Vec<OutletPresence>> {
        let response = self.request(presence_request()).await?;
        parse_presence_map(&response)
    }

    /// True when `outlet` is ON.
    pub async fn outlet_status(&self, outlet: u8) -> Result<bool> {
        let response = self.request(status_request(outlet)?).await?;
        let on = parse_outlet_status(&response)?;
        debug!(outlet, on, "outlet status");
        Ok(on)
    }

    /// Query several outlets, one after another.
    pub async fn outlets_status(&self, outlets: &[u8]) -> Result<BTreeMap<u8, bool>> {
        let mut states = BTreeMap::new();
        for &outlet in outlets {
            states.insert(outlet, self.outlet_status(outlet).await?);
        }
        Ok(states)
    }

    /// Switch `outlet` on or off.
    pub async fn set_outlet_state(&self, outlet: u8, on: bool) -> Result<()> {
        let response = self.request(set_state_request(outlet, on)?).await?;
        check_set_state(&response)?;
        debug!(outlet, on, "outlet switched");
        Ok(())
    }

    async fn request(&self, envelope: Envelope) -> Result<Envelope> {
        self.send_and_receive(envelope.command, envelope.subcommand, envelope.payload)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_c_and_n_slots() {
        let response = Envelope::new(OUTLET_PRESENCE, SUB_RESPONSE, b"CCNNxxxxxxxxxxxx".to_vec());
        assert_eq!(parse_outlet_count(&response).unwrap(), 4);

        let map = parse_presence_map(&response).unwrap();
        assert_eq!(map.len(), PRESENCE_MAP_LEN);
        assert!(map[3].is_present());
        assert_eq!(map[4], OutletPresence::Absent);
    }

    #[test]
    fn presence_map_ignores_trailing_bytes() {
        let response = Envelope::new(
            OUTLET_PRESENCE,
            SUB_RESPONSE,
            b"CCCCCCCCxxxxxxxxCCCC".to_vec(),
        );
        assert_eq!(parse_outlet_count(&response).unwrap(), 8);
    }

    #[test]
    fn count_rejects_wrong_shape() {
        let response = Envelope::new(OUTLET_STATE, SUB_RESPONSE, b"CC".to_vec());
        assert!(matches!(
            parse_outlet_count(&response),
            Err(ClientError::Protocol(_))
        ));
    }

    #[test]
    fn status_reads_state_byte() {
        for sub in [SUB_RESPONSE, SUB_STATUS, SUB_NOTIFY] {
            let on = Envelope::new(OUTLET_STATE, sub, vec![3, 0x01]);
            assert!(parse_outlet_status(&on).unwrap());
        }
        let off = Envelope::new(OUTLET_STATE, SUB_RESPONSE, vec![3, 0x00]);
        assert!(!parse_outlet_status(&off).unwrap());
    }

    #[test]
    fn status_without_state_byte_is_protocol_error() {
        let short = Envelope::new(OUTLET_STATE, SUB_RESPONSE, vec![3]);
        assert!(matches!(
            parse_outlet_status(&short),
            Err(ClientError::Protocol(_))
        ));
        let wrong_sub = Envelope::new(OUTLET_STATE, SUB_SET, vec![3, 1]);
        assert!(parse_outlet_status(&wrong_sub).is_err());
    }

    #[test]
    fn set_request_layout() {
        let request = set_state_request(3, true).unwrap();
        assert!(request.is(OUTLET_STATE, SUB_SET));
        assert_eq!(&request.payload[..], &[3, 1, b'0', b'0', b'0', b'0']);

        let off = set_state_request(12, false).unwrap();
        assert_eq!(&off.payload[..2], &[12, 0]);
    }

    #[test]
    fn outlet_zero_is_rejected() {
        assert!(matches!(status_request(0), Err(ClientError::InvalidOutlet(0))));
        assert!(matches!(
            set_state_request(0, true),
            Err(ClientError::InvalidOutlet(0))
        ));
    }

    #[test]
    fn ping_matches_pong_only() {
        assert!(parse_ping(&Envelope::bare(PING, SUB_RESPONSE)));
        assert!(!parse_ping(&Envelope::bare(PING, SUB_PING)));
        assert!(!parse_ping(&Envelope::bare(OUTLET_STATE, SUB_RESPONSE)));
    }

    #[tokio::test]
    async fn invalid_outlet_never_touches_network() {
        let client = RackLinkClient::new(crate::ClientConfig::new("192.0.2.1"));
        assert!(matches!(
            client.outlet_status(0).await,
            Err(ClientError::InvalidOutlet(0))
        ));
        assert!(matches!(
            client.set_outlet_state(0, false).await,
            Err(ClientError::InvalidOutlet(0))
        ));
        assert_eq!(client.state(), crate::ConnectionState::Disconnected);
    }
}
