use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::views::{View, WizardView};
use crate::bridge::EventBridge;
use crate::capture::{
    CaptureSessionBuilder, CaptureSessionHandle, Intent, Outcome, WizardState, WizardStep,
};
use crate::config::Settings;
use crate::error::AppError;
use crate::simulator::SimulatedBackend;

/// What the window does with itself after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowAction {
    /// Nothing to do, a pending close request goes through.
    Proceed,
    Close,
    /// Hold a close request back while the session winds down.
    Hold,
    /// Hold a close request back and cancel; the cancel callback closes.
    CancelFirst,
}

fn window_action(
    state: &WizardState,
    session_running: bool,
    close_requested: bool,
    cancel_sent: bool,
) -> WindowAction {
    if close_requested {
        if !session_running || state.is_finished() {
            return WindowAction::Proceed;
        }
        // completion is already scheduled and closes the window itself
        if state.step == WizardStep::Success || cancel_sent {
            return WindowAction::Hold;
        }
        return WindowAction::CancelFirst;
    }
    // a rejected completion stays on screen until dismissed
    if state.outcome == Some(Outcome::Completed) && state.last_error.is_none() {
        return WindowAction::Close;
    }
    WindowAction::Proceed
}

pub struct EnrollmentApp {
    handle: CaptureSessionHandle,
    view: WizardView,
    errors: Vec<AppError>,
    cancel_sent: bool,
    closing: bool,
    session_task: JoinHandle<Option<Outcome>>,
    repaint_task: JoinHandle<()>,
    // keeps the in-process backend alive for the lifetime of the window
    _backend: Option<SimulatedBackend>,
}

impl EnrollmentApp {
    pub fn new(
        ctx: &egui::Context,
        settings: &Settings,
        bridge: Arc<dyn EventBridge>,
        backend: Option<SimulatedBackend>,
    ) -> Self {
        let complete_ctx = ctx.clone();
        let cancel_ctx = ctx.clone();
        let (handle, session_task) = CaptureSessionBuilder::new(bridge, settings.capture.clone())
            .on_complete(move || {
                info!("Enrollment completed");
                complete_ctx.request_repaint();
            })
            .on_cancel(move || {
                info!("Enrollment cancelled, closing window");
                cancel_ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            })
            .spawn();

        // the session publishes from its own task, wake the UI on every change
        let mut state_rx = handle.subscribe();
        let repaint_ctx = ctx.clone();
        let repaint_task = tokio::spawn(async move {
            while state_rx.changed().await.is_ok() {
                repaint_ctx.request_repaint();
            }
        });

        info!("Enrollment window bound to session {}", handle.id());
        Self {
            handle,
            view: WizardView::new(),
            errors: Vec::new(),
            cancel_sent: false,
            closing: false,
            session_task,
            repaint_task,
            _backend: backend,
        }
    }

    pub fn start_gui(
        settings: &Settings,
        bridge: Arc<dyn EventBridge>,
        backend: Option<SimulatedBackend>,
    ) -> Result<(), AppError> {
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size(egui::vec2(settings.ui.width, settings.ui.height))
                .with_title(settings.ui.title.clone()),
            ..Default::default()
        };

        let title = settings.ui.title.clone();
        let settings = settings.clone();
        eframe::run_native(
            &title,
            options,
            Box::new(move |cc| {
                Ok(Box::new(EnrollmentApp::new(
                    &cc.egui_ctx,
                    &settings,
                    bridge,
                    backend,
                )))
            }),
        )
        .map_err(|e| AppError::Ui(e.to_string()))
    }

    fn send(&mut self, intent: Intent) -> bool {
        match self.handle.send(intent) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to deliver {:?}: {}", intent, e);
                self.errors.push(e);
                false
            }
        }
    }

    fn close(&mut self, ctx: &egui::Context) {
        if !self.closing {
            self.closing = true;
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }
}

impl eframe::App for EnrollmentApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let state = self.handle.snapshot();
        let close_requested = ctx.input(|i| i.viewport().close_requested());
        match window_action(
            &state,
            !self.session_task.is_finished(),
            close_requested,
            self.cancel_sent,
        ) {
            WindowAction::Proceed => {}
            WindowAction::Close => self.close(ctx),
            WindowAction::Hold => ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose),
            WindowAction::CancelFirst => {
                info!("Window closed mid-flow, cancelling enrollment");
                if self.send(Intent::Cancel) {
                    self.cancel_sent = true;
                    ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
                }
            }
        }
        self.view.set_state(state);

        if !self.errors.is_empty() {
            egui::TopBottomPanel::bottom("error_panel")
                .resizable(true)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        for error in self.errors.iter().rev() {
                            ui.label(format!("[ERROR] {}", error));
                        }
                    });
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.view.draw(ui);
        });

        if let Some(intent) = self.view.take_request() {
            self.send(intent);
        }
        if self.view.take_dismiss() {
            self.close(ctx);
        }
    }
}

impl Drop for EnrollmentApp {
    fn drop(&mut self) {
        self.repaint_task.abort();
    }
}
