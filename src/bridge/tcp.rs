use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bridge::{Ack, COMMAND_CHANNEL, Command, EventBridge, InboundEvent};
use crate::error::BridgeError;

// Frames are base64 JPEGs, a line can be large.
const MAX_LINE_LENGTH: usize = 8 * 1024 * 1024;
const OUTGOING_BUFFER: usize = 64;

#[derive(Serialize)]
struct OutgoingMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    id: Uuid,
    event: &'a str,
    data: &'a Command,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum IncomingKind {
    Event,
    Ack,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    #[serde(rename = "type")]
    kind: IncomingKind,
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Default, Clone)]
struct PendingAcks {
    inner: Arc<Mutex<HashMap<Uuid, oneshot::Sender<Ack>>>>,
}

impl PendingAcks {
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, oneshot::Sender<Ack>>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, id: Uuid) -> (oneshot::Receiver<Ack>, PendingGuard) {
        let (responder, response_rx) = oneshot::channel();
        self.lock().insert(id, responder);
        (
            response_rx,
            PendingGuard {
                id,
                pending: self.clone(),
            },
        )
    }

    fn resolve(&self, id: Uuid, ack: Ack) {
        match self.lock().remove(&id) {
            Some(responder) => {
                let _ = responder.send(ack);
            }
            None => debug!("Acknowledgement {} arrived after its command gave up", id),
        }
    }

    fn fail_all(&self) {
        let mut pending = self.lock();
        if !pending.is_empty() {
            warn!("Failing {} unacknowledged commands", pending.len());
        }
        pending.clear();
    }
}

// Removes the pending entry when an emit future is dropped, e.g. on timeout.
struct PendingGuard {
    id: Uuid,
    pending: PendingAcks,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// [`EventBridge`] speaking newline-delimited JSON over TCP.
///
/// Outbound: `{"type":"emit","id":..,"event":"biometric_command","data":{..}}`.
/// Inbound: `{"type":"event","event":..,"data":{..}}` and
/// `{"type":"ack","id":..,"data":{..}}`.
pub struct TcpBridge {
    outgoing: mpsc::Sender<String>,
    pending: PendingAcks,
    events: broadcast::Sender<InboundEvent>,
    connected: Arc<AtomicBool>,
    cancel_token: CancellationToken,
    io_task: JoinHandle<()>,
}

impl TcpBridge {
    pub async fn connect(address: impl ToSocketAddrs, event_buffer: usize) -> Result<Self, BridgeError> {
        let stream = TcpStream::connect(address).await.map_err(|e| {
            error!("Failed to connect to capture backend: {}", e);
            BridgeError::ChannelUnavailable
        })?;
        Ok(Self::from_stream(stream, event_buffer))
    }

    pub fn from_stream(stream: TcpStream, event_buffer: usize) -> Self {
        Self::from_stream_with_max_line_length(stream, event_buffer, MAX_LINE_LENGTH)
    }

    /// Like [`TcpBridge::from_stream`], with a custom cap on inbound line
    /// length. Longer lines are skipped and the connection stays up.
    pub fn from_stream_with_max_line_length(
        stream: TcpStream,
        event_buffer: usize,
        max_line_length: usize,
    ) -> Self {
        if let Ok(peer) = stream.peer_addr() {
            info!("Connected to capture backend at {}", peer);
        }
        let (events, _) = broadcast::channel(event_buffer);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_BUFFER);
        let pending = PendingAcks::default();
        let connected = Arc::new(AtomicBool::new(true));
        let cancel_token = CancellationToken::new();

        let io_task = tokio::spawn(run_io(
            Framed::new(stream, LinesCodec::new_with_max_length(max_line_length)),
            outgoing_rx,
            pending.clone(),
            events.clone(),
            Arc::clone(&connected),
            cancel_token.clone(),
        ));

        Self {
            outgoing: outgoing_tx,
            pending,
            events,
            connected,
            cancel_token,
            io_task,
        }
    }

    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.io_task.is_finished()
    }
}

impl Drop for TcpBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

#[async_trait]
impl EventBridge for TcpBridge {
    fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        self.events.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn emit(&self, command: Command) -> Result<Ack, BridgeError> {
        if !self.is_connected() {
            return Err(BridgeError::ChannelUnavailable);
        }
        let id = Uuid::new_v4();
        let line = serde_json::to_string(&OutgoingMessage {
            kind: "emit",
            id,
            event: COMMAND_CHANNEL,
            data: &command,
        })
        .map_err(|e| BridgeError::Protocol(e.to_string()))?;

        let (response_rx, _guard) = self.pending.register(id);
        self.outgoing
            .send(line)
            .await
            .map_err(|_| BridgeError::ChannelUnavailable)?;
        response_rx.await.map_err(|_| BridgeError::ChannelUnavailable)
    }
}

async fn run_io(
    framed: Framed<TcpStream, LinesCodec>,
    mut outgoing: mpsc::Receiver<String>,
    pending: PendingAcks,
    events: broadcast::Sender<InboundEvent>,
    connected: Arc<AtomicBool>,
    cancel_token: CancellationToken,
) {
    let (mut sink, mut stream) = framed.split();
    // the codec reports one end of stream right after a decode error
    let mut skipping_line = false;
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("TCP bridge stopped");
                break;
            }
            Some(line) = outgoing.recv() => {
                if let Err(e) = sink.send(line).await {
                    error!("Failed to write to capture backend: {}", e);
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(line)) => dispatch_line(&line, &pending, &events),
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    warn!("Skipping a line from capture backend longer than the limit");
                    skipping_line = true;
                }
                Some(Err(LinesCodecError::Io(e))) => {
                    error!("Failed to read from capture backend: {}", e);
                    break;
                }
                None if skipping_line => skipping_line = false,
                None => {
                    info!("Capture backend closed the connection");
                    break;
                }
            }
        }
    }

    connected.store(false, Ordering::Release);
    // refuse new lines before failing the ones already waiting
    outgoing.close();
    pending.fail_all();
}

fn dispatch_line(line: &str, pending: &PendingAcks, events: &broadcast::Sender<InboundEvent>) {
    let message: IncomingMessage = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            warn!("Malformed line from capture backend: {}", e);
            return;
        }
    };

    match message.kind {
        IncomingKind::Event => {
            let Some(name) = message.event else {
                warn!("Event without a name from capture backend");
                return;
            };
            match InboundEvent::from_parts(&name, message.data) {
                Ok(event) => {
                    // no subscribers is fine, nobody is capturing
                    let _ = events.send(event);
                }
                Err(e) => debug!("Skipping event: {}", e),
            }
        }
        IncomingKind::Ack => {
            let Some(id) = message.id else {
                warn!("Acknowledgement without an id from capture backend");
                return;
            };
            pending.resolve(id, parse_ack(message.data));
        }
    }
}

fn parse_ack(data: Value) -> Ack {
    match data {
        Value::Object(_) => serde_json::from_value(data).unwrap_or_else(|e| {
            warn!("Malformed acknowledgement: {}", e);
            Ack::rejected("malformed acknowledgement")
        }),
        // bare values (true, null, ...) carry no error
        _ => Ack::ok(),
    }
}
