use racklink_frame::command::{
    is_nack, is_ping, LOGIN, LOGIN_ACCEPTED, PING, SUB_RESPONSE, SUB_SET,
};
use racklink_frame::{nack, nack_message, Envelope};
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use crate::config::Credentials;
use crate::connection::Connection;
use crate::error::{Result, TransportError};

/// Log in on a freshly opened connection.
///
/// Sends `username|password` and waits for the login response. Keepalive
/// probes that arrive first are answered so the device doesn't drop the
/// socket mid-handshake. The whole exchange is bounded by the connection's
/// I/O timeout.
pub async fn login(conn: &mut Connection, credentials: &Credentials) -> Result<()> {
    credentials.validate()?;

    let io_timeout = conn.io_timeout();
    let deadline = Instant::now() + io_timeout;

    debug!(username = %credentials.username, "logging in");
    conn.send(Envelope::new(LOGIN, SUB_SET, credentials.login_payload()))
        .await?;

    let exchange = async {
        loop {
            let response = conn.recv().await?;
            if is_ping(response.command, response.subcommand) {
                debug!("keepalive during login, answering");
                conn.send(Envelope::bare(PING, SUB_RESPONSE)).await?;
                continue;
            }

            check_login_response(&response)?;
            debug!("login accepted");
            return Ok::<(), TransportError>(());
        }
    };

    match timeout_at(deadline, exchange).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(io_timeout)),
    }
}

/// Interpret the device's answer to a login command.
pub fn check_login_response(response: &Envelope) -> Result<()> {
    if is_nack(response.command, response.subcommand) {
        let code = response.payload.first().copied().unwrap_or_default();
        if nack::is_session_nack(code) {
            return Err(TransportError::AuthenticationRejected { status: code });
        }
        return Err(TransportError::UnexpectedResponse(format!(
            "login NACK: {}",
            nack_message(code)
        )));
    }

    if !response.is(LOGIN, SUB_RESPONSE) {
        return Err(TransportError::UnexpectedResponse(format!(
            "login: expected 0x{LOGIN:02X}/0x{SUB_RESPONSE:02X}, got 0x{:02X}/0x{:02X}",
            response.command, response.subcommand
        )));
    }

    let status = response.payload.first().copied().ok_or_else(|| {
        TransportError::UnexpectedResponse("login response without status byte".to_string())
    })?;
    if status != LOGIN_ACCEPTED {
        return Err(TransportError::AuthenticationRejected { status });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use racklink_frame::RackLinkCodec;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::config::TransportConfig;

    type DeviceIo = (
        FramedRead<tokio::net::tcp::OwnedReadHalf, RackLinkCodec>,
        FramedWrite<tokio::net::tcp::OwnedWriteHalf, RackLinkCodec>,
    );

    fn framed(stream: TcpStream) -> DeviceIo {
        let (read_half, write_half) = stream.into_split();
        (
            FramedRead::new(read_half, RackLinkCodec::new()),
            FramedWrite::new(write_half, RackLinkCodec::new()),
        )
    }

    async fn listen() -> (TcpListener, TransportConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = TransportConfig {
            port: listener.local_addr().unwrap().port(),
            io_timeout: Duration::from_millis(500),
            ..TransportConfig::new("127.0.0.1")
        };
        (listener, config)
    }

    async fn login_against(responses: Vec<Envelope>) -> (Result<()>, Vec<Envelope>) {
        let (listener, config) = listen().await;

        let device = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut frames, mut sink) = framed(stream);
            let mut received = vec![frames.next().await.unwrap().unwrap()];
            for response in responses {
                let probe = response.is(PING, 0x01);
                sink.send(response).await.unwrap();
                if probe {
                    received.push(frames.next().await.unwrap().unwrap());
                }
            }
            received
        });

        let mut conn = Connection::open(&config).await.unwrap();
        let result = login(&mut conn, &config.credentials).await;
        let received = device.await.unwrap();
        (result, received)
    }

    #[tokio::test]
    async fn accepted_login() {
        let (result, received) =
            login_against(vec![Envelope::new(LOGIN, SUB_RESPONSE, vec![0x01])]).await;

        assert!(result.is_ok());
        assert!(received[0].is(LOGIN, SUB_SET));
        assert_eq!(received[0].payload.as_ref(), b"user|cstmcstm");
    }

    #[tokio::test]
    async fn rejected_login() {
        let (result, _) =
            login_against(vec![Envelope::new(LOGIN, SUB_RESPONSE, vec![0x00])]).await;

        assert!(matches!(
            result,
            Err(TransportError::AuthenticationRejected { status: 0x00 })
        ));
    }

    #[tokio::test]
    async fn keepalive_during_login_is_answered() {
        let (result, received) = login_against(vec![
            Envelope::bare(PING, 0x01),
            Envelope::new(LOGIN, SUB_RESPONSE, vec![0x01]),
        ])
        .await;

        assert!(result.is_ok());
        assert_eq!(received.len(), 2);
        assert!(received[1].is(PING, SUB_RESPONSE));
    }

    #[test]
    fn unexpected_shape_is_rejected() {
        let err = check_login_response(&Envelope::bare(0x20, 0x10)).unwrap_err();
        assert!(matches!(err, TransportError::UnexpectedResponse(_)));

        let err = check_login_response(&Envelope::bare(LOGIN, SUB_RESPONSE)).unwrap_err();
        assert!(matches!(err, TransportError::UnexpectedResponse(_)));
    }

    #[test]
    fn credentials_nack_is_authentication_failure() {
        let err = check_login_response(&Envelope::new(0x10, 0x10, vec![0x08])).unwrap_err();
        assert!(matches!(
            err,
            TransportError::AuthenticationRejected { status: 0x08 }
        ));

        let err = check_login_response(&Envelope::new(0x10, 0x10, vec![0x04])).unwrap_err();
        assert!(matches!(err, TransportError::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn keepalives_cannot_extend_login_past_deadline() {
        let (listener, config) = listen().await;
        let device = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut frames, mut sink) = framed(stream);
            frames.next().await.unwrap().unwrap();
            // Keep the socket busy with probes but never answer the login.
            loop {
                tokio::time::sleep(Duration::from_millis(100)).await;
                if sink.send(Envelope::bare(PING, 0x01)).await.is_err() {
                    return;
                }
                if frames.next().await.is_none() {
                    return;
                }
            }
        });

        let mut conn = Connection::open(&config).await.unwrap();
        let started = Instant::now();
        let err = login(&mut conn, &config.credentials).await.unwrap_err();

        assert!(matches!(err, TransportError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_millis(800));
        device.abort();
    }

    #[tokio::test]
    async fn silent_device_times_out() {
        let (listener, config) = listen().await;
        let device = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(stream);
        });

        let mut conn = Connection::open(&config).await.unwrap();
        let err = login(&mut conn, &config.credentials).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));

        device.abort();
    }
}
