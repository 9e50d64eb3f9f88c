use std::time::Duration;

use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use serde::Deserialize;

use crate::error::AppError;

const ENV_PREFIX: &str = "BIOMETRIC";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub capture: CaptureSettings,
    pub bridge: BridgeSettings,
    pub simulator: SimulatorSettings,
    pub ui: UiSettings,
    pub logging: LoggingSettings,
}

/// Timing knobs of a capture session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub ack_timeout_ms: u64,
    pub completion_delay_ms: u64,
    pub intent_buffer: usize,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 5000,
            completion_delay_ms: 2000,
            intent_buffer: 16,
        }
    }
}

impl CaptureSettings {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeMode {
    /// In-process simulated backend.
    Simulated,
    /// Newline-delimited JSON over TCP to an external backend.
    Tcp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    pub mode: BridgeMode,
    pub address: String,
    pub event_buffer: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            mode: BridgeMode::Simulated,
            address: "127.0.0.1:5001".to_string(),
            event_buffer: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    pub frame_interval_ms: u64,
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
    pub detection_rate: f64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: 33,
            width: 320,
            height: 240,
            jpeg_quality: 75,
            detection_rate: 0.9,
        }
    }
}

impl SimulatorSettings {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub width: f32,
    pub height: f32,
    pub title: String,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            width: 520.0,
            height: 720.0,
            title: "Biometric Enrollment".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Loads defaults, then `config/default.toml`, `config/local.toml` and
    /// `BIOMETRIC__*` environment variables, later sources winning.
    pub fn load() -> Result<Self, AppError> {
        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            );
        Self::from_builder(builder)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, AppError> {
        Self::from_builder(Config::builder().add_source(File::from_str(source, FileFormat::Toml)))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, AppError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), AppError> {
        if self.capture.ack_timeout_ms == 0 {
            return Err(invalid("capture.ack_timeout_ms must be greater than 0"));
        }

        if self.capture.intent_buffer == 0 {
            return Err(invalid("capture.intent_buffer must be greater than 0"));
        }

        if self.bridge.event_buffer == 0 {
            return Err(invalid("bridge.event_buffer must be greater than 0"));
        }

        if self.simulator.frame_interval_ms == 0 {
            return Err(invalid("simulator.frame_interval_ms must be greater than 0"));
        }

        if self.simulator.width == 0 || self.simulator.height == 0 {
            return Err(invalid("simulator frame size must be non-empty"));
        }

        if !(0.0..=1.0).contains(&self.simulator.detection_rate) {
            return Err(invalid("simulator.detection_rate must be between 0.0 and 1.0"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> AppError {
    AppError::InvalidSettings(message.to_string())
}
