//! Command and subcommand identifiers.
//!
//! A frame is routed by its `(command, subcommand)` pair. Requests use the
//! `SUB_SET`/`SUB_GET` subcommands, and the device answers with `SUB_RESPONSE`
//! (or one of the status variants for outlet queries).

/// Keepalive probe and its answer. Either side may send the probe.
pub const PING: u8 = 0x01;

/// Credential exchange performed right after the socket opens.
pub const LOGIN: u8 = 0x02;

/// Negative acknowledgement of the previous command.
pub const NACK: u8 = 0x10;

/// Per-outlet power state (query and control).
pub const OUTLET_STATE: u8 = 0x20;

/// Outlet presence map, used to derive the outlet count.
pub const OUTLET_PRESENCE: u8 = 0x22;

/// Request subcommand: change something.
pub const SUB_SET: u8 = 0x01;

/// Request subcommand: read something.
pub const SUB_GET: u8 = 0x02;

/// Keepalive probe subcommand.
pub const SUB_PING: u8 = 0x01;

/// Normal response subcommand. Also the pong subcommand.
pub const SUB_RESPONSE: u8 = 0x10;

/// Outlet status reported with extended data.
pub const SUB_STATUS: u8 = 0x12;

/// Outlet status change notification.
pub const SUB_NOTIFY: u8 = 0x30;

/// Login status byte meaning the credentials were accepted.
pub const LOGIN_ACCEPTED: u8 = 0x01;

/// Returns a human-readable name for a command byte.
pub fn command_name(command: u8) -> &'static str {
    match command {
        PING => "PING",
        LOGIN => "LOGIN",
        NACK => "NACK",
        OUTLET_STATE => "OUTLET_STATE",
        OUTLET_PRESENCE => "OUTLET_PRESENCE",
        _ => "UNKNOWN",
    }
}

/// Returns true if the pair is a keepalive probe.
pub fn is_ping(command: u8, subcommand: u8) -> bool {
    command == PING && subcommand == SUB_PING
}

/// Returns true if the pair is a keepalive answer.
pub fn is_pong(command: u8, subcommand: u8) -> bool {
    command == PING && subcommand == SUB_RESPONSE
}

/// Returns true if the pair is a negative acknowledgement.
pub fn is_nack(command: u8, subcommand: u8) -> bool {
    command == NACK && subcommand == SUB_RESPONSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_known_commands() {
        assert_eq!(command_name(0x01), "PING");
        assert_eq!(command_name(0x20), "OUTLET_STATE");
        assert_eq!(command_name(0x99), "UNKNOWN");
    }

    #[test]
    fn classifies_control_pairs() {
        assert!(is_ping(0x01, 0x01));
        assert!(!is_ping(0x01, 0x10));
        assert!(is_pong(0x01, 0x10));
        assert!(is_nack(0x10, 0x10));
        assert!(!is_nack(0x20, 0x10));
    }
}
