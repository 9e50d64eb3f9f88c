use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error};

use crate::bridge::{Ack, Command, EventBridge, InboundEvent};
use crate::error::BridgeError;

const COMMAND_BUFFER: usize = 64;

/// A command as seen by the backend side, with the slot for its acknowledgement.
#[derive(Debug)]
pub struct CommandEnvelope {
    pub command: Command,
    responder: oneshot::Sender<Ack>,
}

impl CommandEnvelope {
    pub fn ack(self, ack: Ack) {
        if self.responder.send(ack).is_err() {
            debug!("Acknowledgement for {} dropped, sender gone", self.command.kind());
        }
    }

    pub fn reject(self, message: impl Into<String>) {
        self.ack(Ack::rejected(message));
    }
}

/// In-process [`EventBridge`]. The paired [`BackendEndpoint`] plays the backend.
#[derive(Debug, Clone)]
pub struct ChannelBridge {
    events: broadcast::Sender<InboundEvent>,
    commands: mpsc::Sender<CommandEnvelope>,
    connected: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct BackendEndpoint {
    events: broadcast::Sender<InboundEvent>,
    commands: mpsc::Receiver<CommandEnvelope>,
    connected: Arc<AtomicBool>,
}

impl ChannelBridge {
    pub fn new(event_buffer: usize) -> (Self, BackendEndpoint) {
        let (events, _) = broadcast::channel(event_buffer);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let connected = Arc::new(AtomicBool::new(true));
        (
            Self {
                events: events.clone(),
                commands: command_tx,
                connected: Arc::clone(&connected),
            },
            BackendEndpoint {
                events,
                commands: command_rx,
                connected,
            },
        )
    }
}

#[async_trait]
impl EventBridge for ChannelBridge {
    fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        self.events.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.commands.is_closed()
    }

    async fn emit(&self, command: Command) -> Result<Ack, BridgeError> {
        if !self.is_connected() {
            return Err(BridgeError::ChannelUnavailable);
        }
        let (responder, response_rx) = oneshot::channel();
        self.commands
            .send(CommandEnvelope { command, responder })
            .await
            .map_err(|e| {
                error!("Backend command channel closed: {}", e);
                BridgeError::ChannelUnavailable
            })?;
        response_rx
            .await
            .map_err(|_| BridgeError::ChannelUnavailable)
    }
}

impl BackendEndpoint {
    pub async fn recv_command(&mut self) -> Option<CommandEnvelope> {
        self.commands.recv().await
    }

    pub fn try_recv_command(&mut self) -> Option<CommandEnvelope> {
        self.commands.try_recv().ok()
    }

    /// Pushes an event to every subscriber. Returns the number of receivers reached.
    pub fn publish(&self, event: InboundEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::StatusState;

    #[tokio::test]
    async fn test_emit_round_trip() {
        let (bridge, mut endpoint) = ChannelBridge::new(8);
        let backend = tokio::spawn(async move {
            let envelope = endpoint.recv_command().await.unwrap();
            assert_eq!(envelope.command, Command::CompleteCapture);
            envelope.reject("missing captures");
        });

        let ack = bridge.emit(Command::CompleteCapture).await.unwrap();
        assert_eq!(ack.error.as_deref(), Some("missing captures"));
        backend.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_envelope_is_unavailable() {
        let (bridge, mut endpoint) = ChannelBridge::new(8);
        tokio::spawn(async move {
            let envelope = endpoint.recv_command().await.unwrap();
            drop(envelope);
        });

        let result = bridge.emit(Command::CancelCapture).await;
        assert_eq!(result, Err(BridgeError::ChannelUnavailable));
    }

    #[tokio::test]
    async fn test_backend_gone_disconnects() {
        let (bridge, endpoint) = ChannelBridge::new(8);
        assert!(bridge.is_connected());
        drop(endpoint);
        assert!(!bridge.is_connected());
        assert_eq!(
            bridge.emit(Command::CancelCapture).await,
            Err(BridgeError::ChannelUnavailable)
        );
    }

    #[tokio::test]
    async fn test_events_fan_out_to_each_subscriber() {
        let (bridge, endpoint) = ChannelBridge::new(8);
        let mut first = bridge.subscribe();
        let mut second = bridge.subscribe();

        let reached = endpoint.publish(InboundEvent::status(StatusState::Idle));
        assert_eq!(reached, 2);
        assert_eq!(
            first.recv().await.unwrap(),
            InboundEvent::status(StatusState::Idle)
        );
        assert_eq!(
            second.recv().await.unwrap(),
            InboundEvent::status(StatusState::Idle)
        );

        drop(first);
        assert_eq!(endpoint.subscriber_count(), 1);
    }
}
