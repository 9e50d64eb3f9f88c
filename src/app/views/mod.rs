pub mod preview;
pub mod step_info;
pub mod wizard_view;

pub use preview::PreviewTexture;
pub use step_info::StepInfo;
pub use wizard_view::WizardView;

pub trait View {
    fn draw(&mut self, ui: &mut egui::Ui);
}
