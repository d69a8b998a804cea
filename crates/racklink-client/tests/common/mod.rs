//! Scriptable PDU stand-in listening on loopback.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use racklink_client::{ClientConfig, RetryPolicy, TransportConfig};
use racklink_frame::{Envelope, RackLinkCodec};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

/// What the device does with one received frame.
pub enum Reply {
    /// Send these frames.
    Send(Vec<Envelope>),
    /// Wait, then send these frames.
    Delay(Duration, Vec<Envelope>),
    /// Send a keepalive probe, read the client's answer, then send these.
    ProbeFirst(Vec<Envelope>),
    /// Write raw bytes.
    Raw(Vec<u8>),
    /// Say nothing.
    Silent,
    /// Drop the connection.
    Disconnect,
}

#[derive(Debug, Clone)]
pub enum Event {
    Connected(usize),
    Received(usize, Envelope),
    Sent(usize, Envelope),
}

type Behavior = Arc<dyn Fn(usize, &Envelope) -> Reply + Send + Sync>;
type Events = Arc<Mutex<Vec<Event>>>;

pub struct MockPdu {
    addr: SocketAddr,
    events: Events,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockPdu {
    /// Start a device whose reply to each frame is decided by `behavior`,
    /// called with the 0-based connection index and the received frame.
    pub async fn start<F>(behavior: F) -> Self
    where
        F: Fn(usize, &Envelope) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let events: Events = Arc::default();
        let connections = Arc::new(AtomicUsize::new(0));
        let behavior: Behavior = Arc::new(behavior);

        let task = {
            let events = events.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let conn = connections.fetch_add(1, Ordering::SeqCst);
                    events.lock().unwrap().push(Event::Connected(conn));
                    tokio::spawn(serve(conn, stream, behavior.clone(), events.clone()));
                }
            })
        };

        Self {
            addr,
            events,
            connections,
            task,
        }
    }

    /// A well-behaved device.
    pub async fn standard() -> Self {
        Self::start(|_, request| standard_reply(request)).await
    }

    /// Client configuration pointed at this device with short timeouts.
    pub fn config(&self) -> ClientConfig {
        let mut transport = TransportConfig::new(self.addr.ip().to_string());
        transport.port = self.addr.port();
        transport.connect_timeout = Duration::from_millis(500);
        transport.io_timeout = Duration::from_millis(500);
        ClientConfig {
            transport,
            response_timeout: Duration::from_millis(300),
            retry: RetryPolicy {
                max_attempts: 3,
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(40),
            },
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Every frame the device received, across connections.
    pub fn received(&self) -> Vec<Envelope> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Received(_, envelope) => Some(envelope),
                _ => None,
            })
            .collect()
    }

    /// How many received frames match `command`/`subcommand`.
    pub fn received_count(&self, command: u8, subcommand: u8) -> usize {
        self.received()
            .iter()
            .filter(|envelope| envelope.is(command, subcommand))
            .count()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockPdu {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Replies of a healthy PDU: accepts the default login, answers pings,
/// reports outlets 1-4 present, odd outlets ON.
pub fn standard_reply(request: &Envelope) -> Reply {
    match (request.command, request.subcommand) {
        (0x02, 0x01) => Reply::Send(vec![login_response(0x01)]),
        (0x01, 0x01) => Reply::Send(vec![Envelope::bare(0x01, 0x10)]),
        (0x01, 0x10) => Reply::Silent,
        (0x22, 0x02) => Reply::Send(vec![Envelope::new(
            0x22,
            0x10,
            b"CCNNxxxxxxxxxxxx".to_vec(),
        )]),
        (0x20, 0x02) => Reply::Send(vec![status_response(request.payload[0])]),
        (0x20, 0x01) => Reply::Send(vec![Envelope::new(
            0x20,
            0x10,
            request.payload[..2].to_vec(),
        )]),
        _ => Reply::Send(vec![nack(0x04)]),
    }
}

pub fn login_response(status: u8) -> Envelope {
    Envelope::new(0x02, 0x10, vec![status])
}

pub fn status_response(outlet: u8) -> Envelope {
    Envelope::new(0x20, 0x10, vec![outlet, outlet % 2])
}

pub fn nack(code: u8) -> Envelope {
    Envelope::new(0x10, 0x10, vec![code])
}

async fn serve(conn: usize, stream: TcpStream, behavior: Behavior, events: Events) {
    let (read_half, write_half) = stream.into_split();
    let mut frames = FramedRead::new(read_half, RackLinkCodec::new());
    let mut sink = FramedWrite::new(write_half, RackLinkCodec::new());
    let record = |event: Event| events.lock().unwrap().push(event);

    // A frame that showed up while a delayed reply was still owed.
    let mut early: Option<Envelope> = None;

    loop {
        let request = match early.take() {
            Some(request) => request,
            None => match frames.next().await {
                Some(Ok(request)) => {
                    record(Event::Received(conn, request.clone()));
                    request
                }
                _ => return,
            },
        };

        let outgoing = match behavior(conn, &request) {
            Reply::Send(replies) => replies,
            Reply::Delay(delay, replies) => {
                tokio::time::sleep(delay).await;
                let next = tokio::time::timeout(Duration::from_millis(1), frames.next()).await;
                if let Ok(Some(Ok(next))) = next {
                    record(Event::Received(conn, next.clone()));
                    early = Some(next);
                }
                replies
            }
            Reply::ProbeFirst(replies) => {
                let probe = Envelope::bare(0x01, 0x01);
                record(Event::Sent(conn, probe.clone()));
                if sink.send(probe).await.is_err() {
                    return;
                }
                match frames.next().await {
                    Some(Ok(answer)) => record(Event::Received(conn, answer)),
                    _ => return,
                }
                replies
            }
            Reply::Raw(bytes) => {
                if sink.get_mut().write_all(&bytes).await.is_err() {
                    return;
                }
                Vec::new()
            }
            Reply::Silent => Vec::new(),
            Reply::Disconnect => return,
        };

        for envelope in outgoing {
            record(Event::Sent(conn, envelope.clone()));
            if sink.send(envelope).await.is_err() {
                return;
            }
        }
    }
}
