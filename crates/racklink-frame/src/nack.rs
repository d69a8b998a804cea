use std::borrow::Cow;

/// Bad CRC on previous command.
pub const BAD_CRC: u8 = 0x01;
/// Bad length on previous command.
pub const BAD_LENGTH: u8 = 0x02;
/// Bad escape sequence on previous command.
pub const BAD_ESCAPE: u8 = 0x03;
/// Previous command invalid.
pub const INVALID_COMMAND: u8 = 0x04;
/// Previous sub-command invalid.
pub const INVALID_SUBCOMMAND: u8 = 0x05;
/// Previous command had an incorrect byte count.
pub const BAD_BYTE_COUNT: u8 = 0x06;
/// Invalid data bytes in previous command.
pub const INVALID_DATA: u8 = 0x07;
/// Credentials no longer valid; the session has to log in again.
pub const INVALID_CREDENTIALS: u8 = 0x08;
/// Unknown error.
pub const UNKNOWN_ERROR: u8 = 0x10;
/// Access denied (emergency power off engaged).
pub const ACCESS_DENIED: u8 = 0x11;

/// Describe a NACK error code.
pub fn nack_message(code: u8) -> Cow<'static, str> {
    let text = match code {
        BAD_CRC => "bad CRC on previous command",
        BAD_LENGTH => "bad length on previous command",
        BAD_ESCAPE => "bad escape sequence on previous command",
        INVALID_COMMAND => "previous command invalid",
        INVALID_SUBCOMMAND => "previous sub-command invalid",
        BAD_BYTE_COUNT => "previous command incorrect byte count",
        INVALID_DATA => "invalid data bytes in previous command",
        INVALID_CREDENTIALS => "invalid credentials (need to login again)",
        UNKNOWN_ERROR => "unknown error",
        ACCESS_DENIED => "access denied (EPO)",
        other => return Cow::Owned(format!("unknown error code {other}")),
    };
    Cow::Borrowed(text)
}

/// True when the NACK means the session itself is no longer usable.
pub fn is_session_nack(code: u8) -> bool {
    code == INVALID_CREDENTIALS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_table_entry() {
        for code in [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x10, 0x11] {
            assert!(matches!(nack_message(code), Cow::Borrowed(_)), "{code:#x}");
        }
        assert_eq!(nack_message(0x11), "access denied (EPO)");
    }

    #[test]
    fn unknown_codes_carry_the_number() {
        assert_eq!(nack_message(0x42), "unknown error code 66");
    }

    #[test]
    fn only_credentials_nack_breaks_the_session() {
        assert!(is_session_nack(INVALID_CREDENTIALS));
        assert!(!is_session_nack(BAD_CRC));
        assert!(!is_session_nack(ACCESS_DENIED));
    }
}
