use crate::capture::{Angle, REQUIRED_CAPTURES, WizardStep};

/// Texts shown above the controls of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInfo {
    pub title: String,
    pub subtitle: &'static str,
    pub instructions: &'static [&'static str],
    pub requirements: &'static [&'static str],
}

impl StepInfo {
    pub fn for_step(step: WizardStep) -> Self {
        match step {
            WizardStep::Welcome => Self {
                title: "BIOMETRIC PROFILE".to_string(),
                subtitle: "Capture your face from 3 angles",
                instructions: &[
                    "This process takes 3 photos of your face",
                    "from different angles to improve",
                    "face recognition accuracy.",
                ],
                requirements: &[
                    "Good lighting",
                    "Whole face visible",
                    "Follow the instructions",
                ],
            },
            WizardStep::CaptureFrontal => Self::capture(
                Angle::Frontal,
                "Look straight at the camera",
                &["Center your face inside the guide"],
            ),
            WizardStep::CaptureLeft => Self::capture(
                Angle::Left,
                "Turn to the left",
                &["Turn your face slightly to the left (about 45°)"],
            ),
            WizardStep::CaptureRight => Self::capture(
                Angle::Right,
                "Turn to the right",
                &["Turn your face slightly to the right (about 45°)"],
            ),
            WizardStep::Confirm => Self {
                title: "CONFIRM CAPTURE".to_string(),
                subtitle: "Review the captured image",
                instructions: &[],
                requirements: &[],
            },
            WizardStep::Success => Self {
                title: "PROFILE CREATED".to_string(),
                subtitle: "Capture completed successfully",
                instructions: &[],
                requirements: &[],
            },
        }
    }

    fn capture(
        angle: Angle,
        subtitle: &'static str,
        instructions: &'static [&'static str],
    ) -> Self {
        Self {
            title: format!(
                "ANGLE {}/{}: {}",
                angle.index() + 1,
                REQUIRED_CAPTURES,
                angle_label(angle)
            ),
            subtitle,
            instructions,
            requirements: &[],
        }
    }
}

pub fn angle_label(angle: Angle) -> &'static str {
    match angle {
        Angle::Frontal => "FRONTAL",
        Angle::Left => "LEFT",
        Angle::Right => "RIGHT",
    }
}
