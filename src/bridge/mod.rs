pub mod channel;
pub mod command_service;
pub mod event;
pub mod event_bridge;
pub mod tcp;

pub use channel::{BackendEndpoint, ChannelBridge, CommandEnvelope};
pub use command_service::{BridgeService, CommandService, command_service};
pub use event::{
    Ack, BackendStatus, COMMAND_CHANNEL, Command, CommandKind, InboundEvent, StatusState,
};
pub use event_bridge::EventBridge;
pub use tcp::TcpBridge;
