pub mod app;
pub mod bridge;
pub mod capture;
pub mod config;
pub mod error;
pub mod simulator;

pub use bridge::{ChannelBridge, EventBridge, TcpBridge};
pub use capture::{CaptureSessionBuilder, CaptureSessionHandle, WizardState, WizardStep};
pub use config::Settings;
pub use error::{AppError, BridgeError};
