use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::bridge::{Ack, Command, InboundEvent};
use crate::error::BridgeError;

/// Bidirectional channel to the capture backend.
///
/// Inbound events fan out to every subscriber; each subscriber gets its own
/// receiver and stops receiving when it is dropped.
#[async_trait]
pub trait EventBridge: Send + Sync + 'static {
    fn subscribe(&self) -> broadcast::Receiver<InboundEvent>;

    fn is_connected(&self) -> bool;

    /// Sends `command` and resolves with the backend's acknowledgement.
    ///
    /// Never times out on its own; callers bound the wait.
    async fn emit(&self, command: Command) -> Result<Ack, BridgeError>;
}
