use egui::{Button, Color32, RichText};
use tracing::warn;

use crate::app::views::{PreviewTexture, StepInfo, View};
use crate::capture::{Intent, Outcome, REQUIRED_CAPTURES, WizardState, WizardStep};

const ACCENT: Color32 = Color32::from_rgb(34, 211, 238);
const SUCCESS: Color32 = Color32::from_rgb(34, 197, 94);

/// Renders one [`WizardState`] snapshot and records the button the user pressed.
pub struct WizardView {
    state: WizardState,
    preview: PreviewTexture,
    captured: PreviewTexture,
    requested: Option<Intent>,
    dismissed: bool,
    image_error: Option<String>,
}

impl Default for WizardView {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardView {
    pub fn new() -> Self {
        Self {
            state: WizardState::default(),
            preview: PreviewTexture::new("live_preview"),
            captured: PreviewTexture::new("captured_image"),
            requested: None,
            dismissed: false,
            image_error: None,
        }
    }

    pub fn set_state(&mut self, state: WizardState) {
        self.state = state;
    }

    /// The intent chosen during the last draw, if any.
    pub fn take_request(&mut self) -> Option<Intent> {
        self.requested.take()
    }

    /// Whether the user closed a finished flow during the last draw.
    pub fn take_dismiss(&mut self) -> bool {
        std::mem::take(&mut self.dismissed)
    }

    fn request(&mut self, intent: Intent) {
        self.requested = Some(intent);
    }

    fn draw_header(&self, ui: &mut egui::Ui, info: &StepInfo) {
        ui.vertical_centered(|ui| {
            ui.heading(RichText::new(&info.title).color(ACCENT).strong());
            ui.label(info.subtitle);
        });
        if self.state.step != WizardStep::Welcome {
            let progress = self.state.progress as f32 / REQUIRED_CAPTURES as f32;
            ui.add(
                egui::ProgressBar::new(progress)
                    .text(format!("{}/{}", self.state.progress, REQUIRED_CAPTURES)),
            );
        }
    }

    fn draw_error_banner(&self, ui: &mut egui::Ui) {
        if let Some(error) = &self.state.last_error {
            egui::Frame::group(ui.style())
                .fill(Color32::from_rgb(60, 16, 16))
                .show(ui, |ui| {
                    ui.colored_label(Color32::LIGHT_RED, format!("Error: {}", error));
                });
        }
    }

    fn draw_welcome(&mut self, ui: &mut egui::Ui, info: &StepInfo) {
        ui.group(|ui| {
            ui.label(RichText::new("INSTRUCTIONS").color(ACCENT));
            for line in info.instructions {
                ui.label(*line);
            }
        });
        ui.group(|ui| {
            ui.label(RichText::new("MAKE SURE OF").color(ACCENT));
            for requirement in info.requirements {
                ui.label(format!("• {}", requirement));
            }
        });
        ui.horizontal(|ui| {
            if ui.button("Start").clicked() {
                self.request(Intent::Start);
            }
            if ui.button("Cancel").clicked() {
                self.request(Intent::Cancel);
            }
        });
    }

    fn draw_capture(&mut self, ui: &mut egui::Ui, info: &StepInfo) {
        let ctx = ui.ctx().clone();
        if let Err(e) = self.preview.update(&ctx, self.state.current_frame.as_ref()) {
            warn!("Dropping preview frame: {}", e);
            self.image_error = Some(e.to_string());
        }

        ui.group(|ui| match self.preview.texture() {
            Some(texture) => {
                ui.add(egui::Image::new(texture).max_width(ui.available_width()));
            }
            None => {
                ui.label("Waiting for camera...");
            }
        });

        if self.state.face_detected {
            ui.colored_label(SUCCESS, "Face detected");
        } else {
            ui.colored_label(Color32::YELLOW, "No face detected");
        }
        for line in info.instructions {
            ui.label(*line);
        }

        ui.horizontal(|ui| {
            let capture = ui.add_enabled(self.state.can_capture(), Button::new("Capture"));
            if capture.clicked() {
                self.request(Intent::Capture);
            }
            if ui.button("Cancel").clicked() {
                self.request(Intent::Cancel);
            }
        });
    }

    fn draw_confirm(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        if let Err(e) = self.captured.update(&ctx, self.state.captured_image.as_ref()) {
            warn!("Cannot show captured image: {}", e);
            self.image_error = Some(e.to_string());
        }
        if let Some(texture) = self.captured.texture() {
            ui.add(egui::Image::new(texture).max_width(ui.available_width()));
        }
        ui.label(format!("Angle: {}", self.state.angle));

        ui.horizontal(|ui| {
            if ui.button("Retake").clicked() {
                self.request(Intent::Retake);
            }
            if ui.button("Confirm").clicked() {
                self.request(Intent::Confirm);
            }
            if ui.button("Cancel").clicked() {
                self.request(Intent::Cancel);
            }
        });
    }

    fn draw_success(&mut self, ui: &mut egui::Ui) {
        let rejected =
            self.state.outcome == Some(Outcome::Completed) && self.state.last_error.is_some();
        ui.vertical_centered(|ui| {
            ui.label(
                RichText::new(format!("{} photos captured", self.state.progress))
                    .color(SUCCESS)
                    .size(20.0),
            );
            if rejected {
                ui.label("The backend did not accept the profile.");
                if ui.button("Close").clicked() {
                    self.dismissed = true;
                }
            } else {
                ui.spinner();
            }
        });
    }
}

impl View for WizardView {
    fn draw(&mut self, ui: &mut egui::Ui) {
        let info = StepInfo::for_step(self.state.step);
        self.draw_header(ui, &info);
        ui.separator();
        self.draw_error_banner(ui);

        if self.state.is_finished() && self.state.step != WizardStep::Success {
            ui.label("Closing...");
            return;
        }

        match self.state.step {
            WizardStep::Welcome => self.draw_welcome(ui, &info),
            WizardStep::CaptureFrontal | WizardStep::CaptureLeft | WizardStep::CaptureRight => {
                self.draw_capture(ui, &info)
            }
            WizardStep::Confirm => self.draw_confirm(ui),
            WizardStep::Success => self.draw_success(ui),
        }

        if let Some(error) = &self.image_error {
            ui.small(error.as_str());
        }
    }
}
