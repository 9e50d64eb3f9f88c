use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::bridge::CommandKind;
use crate::capture::Angle;

/// Number of confirmed captures that completes a profile.
pub const REQUIRED_CAPTURES: u8 = Angle::ALL.len() as u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WizardStep {
    #[default]
    Welcome,
    CaptureFrontal,
    CaptureLeft,
    CaptureRight,
    Confirm,
    Success,
}

impl WizardStep {
    pub fn capture(angle: Angle) -> Self {
        match angle {
            Angle::Frontal => WizardStep::CaptureFrontal,
            Angle::Left => WizardStep::CaptureLeft,
            Angle::Right => WizardStep::CaptureRight,
        }
    }

    /// The angle of a capture step, `None` for every other step.
    pub fn capture_angle(&self) -> Option<Angle> {
        match self {
            WizardStep::CaptureFrontal => Some(Angle::Frontal),
            WizardStep::CaptureLeft => Some(Angle::Left),
            WizardStep::CaptureRight => Some(Angle::Right),
            _ => None,
        }
    }

    pub fn is_capture(&self) -> bool {
        self.capture_angle().is_some()
    }
}

/// How a finished session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Cancelled,
}

/// A preview image as pushed by the backend: base64 JPEG plus a per-session
/// sequence number. Clones share the payload.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    seq: u64,
    data: Arc<str>,
}

impl PreviewFrame {
    pub fn new(seq: u64, base64: impl Into<Arc<str>>) -> Self {
        Self {
            seq,
            data: base64.into(),
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn base64(&self) -> &str {
        &self.data
    }

    pub fn data_uri(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.data)
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.data.as_bytes())
    }
}

// Frames are identified by sequence number, payloads can be large.
impl PartialEq for PreviewFrame {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for PreviewFrame {}

/// Single source of truth for one capture flow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WizardState {
    pub step: WizardStep,
    /// Angle of the active capture step, or of the image awaiting confirmation.
    pub angle: Angle,
    pub current_frame: Option<PreviewFrame>,
    pub face_detected: bool,
    /// Set only while `step == Confirm`.
    pub captured_image: Option<PreviewFrame>,
    pub progress: u8,
    pub is_capturing: bool,
    pub last_error: Option<String>,
    pub last_command: Option<CommandKind>,
    /// `Some` once the flow reached a terminal state.
    pub outcome: Option<Outcome>,
}

impl WizardState {
    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Whether the capture action would currently be accepted.
    pub fn can_capture(&self) -> bool {
        !self.is_finished()
            && self.step.is_capture()
            && self.face_detected
            && self.current_frame.is_some()
    }
}
