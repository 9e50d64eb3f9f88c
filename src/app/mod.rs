pub mod enrollment_app;
pub mod views;

pub use enrollment_app::EnrollmentApp;
pub use views::wizard_view::WizardView;
