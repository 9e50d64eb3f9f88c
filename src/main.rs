use std::str::FromStr;
use std::sync::Arc;

use biometric_enroll::app::EnrollmentApp;
use biometric_enroll::bridge::{ChannelBridge, EventBridge, TcpBridge};
use biometric_enroll::config::{BridgeMode, Settings};
use biometric_enroll::error::AppError;
use biometric_enroll::simulator::SimulatedBackend;
use tracing::{Level, info};

fn init_logging(level: &str) -> Result<(), AppError> {
    let level = Level::from_str(level)
        .map_err(|_| AppError::InvalidSettings(format!("unknown log level '{}'", level)))?;
    tracing_subscriber::fmt().with_max_level(level).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let settings = Settings::load()?;
    init_logging(&settings.logging.level)?;

    let (bridge, backend): (Arc<dyn EventBridge>, Option<SimulatedBackend>) =
        match settings.bridge.mode {
            BridgeMode::Simulated => {
                info!("Using the simulated capture backend");
                let (bridge, endpoint) = ChannelBridge::new(settings.bridge.event_buffer);
                let backend = SimulatedBackend::spawn(endpoint, settings.simulator.clone());
                (Arc::new(bridge), Some(backend))
            }
            BridgeMode::Tcp => {
                info!("Connecting to capture backend at {}", settings.bridge.address);
                let bridge =
                    TcpBridge::connect(settings.bridge.address.as_str(), settings.bridge.event_buffer)
                        .await?;
                (Arc::new(bridge), None)
            }
        };

    EnrollmentApp::start_gui(&settings, bridge, backend)
}
