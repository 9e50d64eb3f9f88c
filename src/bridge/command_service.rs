use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tower::util::BoxService;
use tower::{Service, ServiceBuilder};

use crate::bridge::{Ack, Command, EventBridge};
use crate::error::BridgeError;

/// Command sender with the acknowledgement timeout applied.
pub type CommandService = BoxService<Command, Ack, BridgeError>;

/// Emits commands over an [`EventBridge`] and turns error acknowledgements
/// into [`BridgeError::CommandRejected`].
#[derive(Clone)]
pub struct BridgeService {
    bridge: Arc<dyn EventBridge>,
}

impl BridgeService {
    pub fn new(bridge: Arc<dyn EventBridge>) -> Self {
        Self { bridge }
    }
}

impl Service<Command> for BridgeService {
    type Response = Ack;
    type Error = BridgeError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, command: Command) -> Self::Future {
        let bridge = Arc::clone(&self.bridge);
        Box::pin(async move {
            if !bridge.is_connected() {
                return Err(BridgeError::ChannelUnavailable);
            }
            let kind = command.kind();
            tracing::debug!("Emitting {}", kind);
            bridge.emit(command).await?.into_result()
        })
    }
}

pub fn command_service(bridge: Arc<dyn EventBridge>, ack_timeout: Duration) -> CommandService {
    BoxService::new(
        ServiceBuilder::new()
            .map_err(BridgeError::from_boxed)
            .timeout(ack_timeout)
            .service(BridgeService::new(bridge)),
    )
}
