use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capture::Angle;
use crate::error::BridgeError;

/// Name of the single multiplexed channel every command travels on.
pub const COMMAND_CHANNEL: &str = "biometric_command";

/// Events pushed by the capture backend.
///
/// On the wire an event is `{"event": <name>, "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Latest preview image, base64 encoded JPEG.
    BiometricFrame { image: String },
    FaceDetected { detected: bool },
    BiometricStatus(BackendStatus),
    Error { msg: String },
}

impl InboundEvent {
    /// Builds an event from a separately transported name and payload.
    pub fn from_parts(name: &str, data: Value) -> Result<Self, BridgeError> {
        let mut envelope = Map::new();
        envelope.insert("event".to_string(), Value::String(name.to_string()));
        envelope.insert("data".to_string(), data);
        serde_json::from_value(Value::Object(envelope))
            .map_err(|e| BridgeError::Protocol(format!("bad '{}' event: {}", name, e)))
    }

    pub fn status(state: StatusState) -> Self {
        InboundEvent::BiometricStatus(BackendStatus {
            state,
            message: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStatus {
    pub state: StatusState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    Idle,
    Welcome,
    Capturing,
    Confirmation,
    Success,
    Cancelled,
    Error,
    #[serde(other)]
    Unknown,
}

/// Commands sent to the backend on [`COMMAND_CHANNEL`].
///
/// Serialized flat: `{"command": "start_capture", "angle": "frontal"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    StartCapture { angle: Angle },
    CapturePhoto { angle: Angle, image: String },
    CompleteCapture,
    CancelCapture,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::StartCapture { .. } => CommandKind::StartCapture,
            Command::CapturePhoto { .. } => CommandKind::CapturePhoto,
            Command::CompleteCapture => CommandKind::CompleteCapture,
            Command::CancelCapture => CommandKind::CancelCapture,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    StartCapture,
    CapturePhoto,
    CompleteCapture,
    CancelCapture,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::StartCapture => "start_capture",
            CommandKind::CapturePhoto => "capture_photo",
            CommandKind::CompleteCapture => "complete_capture",
            CommandKind::CancelCapture => "cancel_capture",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend response to a command. A present `error` means the command was refused.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Ack {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn into_result(self) -> Result<Ack, BridgeError> {
        match self.error {
            Some(message) => Err(BridgeError::CommandRejected(message)),
            None => Ok(self),
        }
    }
}
