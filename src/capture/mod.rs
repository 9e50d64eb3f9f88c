pub mod angle;
pub mod controller;
pub mod session;
pub mod state;

pub use angle::Angle;
pub use controller::{AckTicket, CaptureController, Effect, Intent, Rejection};
pub use session::{Callback, CaptureSessionBuilder, CaptureSessionHandle};
pub use state::{Outcome, PreviewFrame, REQUIRED_CAPTURES, WizardState, WizardStep};
