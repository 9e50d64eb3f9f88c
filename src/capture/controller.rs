use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bridge::{Ack, BackendStatus, Command, CommandKind, InboundEvent, StatusState};
use crate::capture::{Angle, Outcome, PreviewFrame, REQUIRED_CAPTURES, WizardState, WizardStep};
use crate::error::BridgeError;

/// User intents issued by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Start,
    Capture,
    Confirm,
    Retake,
    Cancel,
}

/// Identifies the acknowledgement of one emitted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckTicket {
    pub intent: Intent,
    pub kind: CommandKind,
    epoch: u64,
}

/// Side effects the owner of the controller must carry out, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Emit { command: Command, ticket: AckTicket },
    ScheduleCompletion,
    NotifyCancelled,
}

/// Why an intent was not applied. None of these reach the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("{intent:?} is not available in step {step:?}")]
    WrongStep { intent: Intent, step: WizardStep },
    #[error("no face detected")]
    FaceNotDetected,
    #[error("no frame available to capture")]
    NoFrame,
    #[error("capture flow already finished")]
    Finished,
}

/// The capture wizard state machine.
///
/// Every transition is applied synchronously and optimistically; outbound
/// commands and callbacks are returned as [`Effect`]s for the caller to run.
/// Acknowledgements come back through [`CaptureController::handle_ack`].
#[derive(Debug, Default)]
pub struct CaptureController {
    state: WizardState,
    // bumped on every step change, lets late acks detect that the flow moved on
    epoch: u64,
    frame_seq: u64,
    completion_scheduled: bool,
    cancel_notified: bool,
}

impl CaptureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn handle_intent(&mut self, intent: Intent) -> Result<Vec<Effect>, Rejection> {
        match intent {
            Intent::Start => self.start(),
            Intent::Capture => self.capture(),
            Intent::Confirm => self.confirm(),
            Intent::Retake => self.retake(),
            Intent::Cancel => self.cancel(),
        }
    }

    pub fn start(&mut self) -> Result<Vec<Effect>, Rejection> {
        self.expect_step(Intent::Start, WizardStep::Welcome)?;
        self.state.last_error = None;
        Ok(vec![self.enter_capture(Angle::Frontal, Intent::Start)])
    }

    pub fn capture(&mut self) -> Result<Vec<Effect>, Rejection> {
        self.ensure_active()?;
        let angle = self
            .state
            .step
            .capture_angle()
            .ok_or(Rejection::WrongStep {
                intent: Intent::Capture,
                step: self.state.step,
            })?;
        if !self.state.face_detected {
            return Err(Rejection::FaceNotDetected);
        }
        let Some(frame) = self.state.current_frame.clone() else {
            self.state.last_error = Some(Rejection::NoFrame.to_string());
            return Err(Rejection::NoFrame);
        };

        self.state.last_error = None;
        self.state.is_capturing = false;
        let image = frame.data_uri();
        self.state.captured_image = Some(frame);
        self.transition(WizardStep::Confirm);
        Ok(vec![self.emit(Command::CapturePhoto { angle, image }, Intent::Capture)])
    }

    pub fn retake(&mut self) -> Result<Vec<Effect>, Rejection> {
        self.expect_step(Intent::Retake, WizardStep::Confirm)?;
        self.state.last_error = None;
        Ok(vec![self.enter_capture(self.state.angle, Intent::Retake)])
    }

    pub fn confirm(&mut self) -> Result<Vec<Effect>, Rejection> {
        self.expect_step(Intent::Confirm, WizardStep::Confirm)?;
        self.state.last_error = None;
        self.state.progress = (self.state.progress + 1).min(REQUIRED_CAPTURES);
        self.state.captured_image = None;
        info!(
            "Confirmed {} capture, progress {}/{}",
            self.state.angle, self.state.progress, REQUIRED_CAPTURES
        );

        match Angle::for_progress(self.state.progress) {
            Some(next) => Ok(vec![self.enter_capture(next, Intent::Confirm)]),
            None => {
                self.state.is_capturing = false;
                self.state.current_frame = None;
                self.transition(WizardStep::Success);
                let mut effects = vec![self.emit(Command::CompleteCapture, Intent::Confirm)];
                effects.extend(self.schedule_completion());
                Ok(effects)
            }
        }
    }

    pub fn cancel(&mut self) -> Result<Vec<Effect>, Rejection> {
        self.ensure_active()?;
        if self.state.step == WizardStep::Success {
            return Err(Rejection::Finished);
        }
        info!("Capture cancelled from step {:?}", self.state.step);
        self.state.last_error = None;
        self.finish(Outcome::Cancelled);
        Ok(vec![self.emit(Command::CancelCapture, Intent::Cancel)])
    }

    /// Records a failure that prevented `intent` from being attempted at all.
    /// State is left untouched.
    pub fn refuse_intent(&mut self, intent: Intent, error: BridgeError) {
        warn!("{:?} refused: {}", intent, error);
        self.state.last_error = Some(error.to_string());
    }

    pub fn handle_event(&mut self, event: InboundEvent) -> Vec<Effect> {
        match event {
            InboundEvent::BiometricFrame { image } => {
                if self.accepts_stream() {
                    self.frame_seq += 1;
                    self.state.current_frame = Some(PreviewFrame::new(self.frame_seq, image));
                } else {
                    debug!("Dropping frame outside of a live capture step");
                }
                Vec::new()
            }
            InboundEvent::FaceDetected { detected } => {
                if self.accepts_stream() {
                    self.state.face_detected = detected;
                }
                Vec::new()
            }
            InboundEvent::BiometricStatus(status) => self.handle_status(status),
            InboundEvent::Error { msg } => {
                warn!("Backend error: {}", msg);
                self.state.last_error = Some(msg);
                Vec::new()
            }
        }
    }

    pub fn handle_ack(&mut self, ticket: AckTicket, result: Result<Ack, BridgeError>) -> Vec<Effect> {
        if ticket.intent == Intent::Cancel {
            if let Err(error) = &result {
                warn!("Backend was not notified of cancellation: {}", error);
            }
            return self.notify_cancelled();
        }
        if self.state.is_finished() {
            debug!("Ignoring {} acknowledgement after the flow finished", ticket.kind);
            return Vec::new();
        }

        match result {
            Ok(_) => {
                debug!("{} acknowledged", ticket.kind);
                self.state.last_error = None;
            }
            Err(error) => {
                warn!("{} failed: {}", ticket.kind, error);
                self.state.last_error = Some(error.to_string());
                if ticket.intent == Intent::Start && ticket.epoch == self.epoch {
                    self.revert_to_welcome();
                }
            }
        }
        Vec::new()
    }

    /// Marks the flow completed once the post-success delay elapsed.
    /// Returns false when the flow ended some other way in the meantime.
    pub fn complete(&mut self) -> bool {
        if self.state.is_finished() || self.state.step != WizardStep::Success {
            return false;
        }
        info!("Capture flow completed with {} captures", self.state.progress);
        self.finish(Outcome::Completed);
        true
    }

    fn handle_status(&mut self, status: BackendStatus) -> Vec<Effect> {
        match status.state {
            StatusState::Success => self.force_success(),
            StatusState::Cancelled => self.force_cancel(),
            StatusState::Error => {
                let message = status.message.unwrap_or_else(|| "backend error".to_string());
                warn!("Backend reported an error: {}", message);
                self.state.last_error = Some(message);
                Vec::new()
            }
            other => {
                debug!("Backend status {:?}", other);
                Vec::new()
            }
        }
    }

    fn force_success(&mut self) -> Vec<Effect> {
        if self.state.is_finished() {
            return Vec::new();
        }
        if self.state.step != WizardStep::Success {
            info!("Backend reported success from step {:?}", self.state.step);
            self.state.is_capturing = false;
            self.state.captured_image = None;
            self.state.current_frame = None;
            self.transition(WizardStep::Success);
        }
        self.schedule_completion().into_iter().collect()
    }

    fn force_cancel(&mut self) -> Vec<Effect> {
        match self.state.outcome {
            Some(Outcome::Completed) => Vec::new(),
            Some(Outcome::Cancelled) => self.notify_cancelled(),
            None => {
                info!("Backend cancelled the capture in step {:?}", self.state.step);
                self.finish(Outcome::Cancelled);
                self.notify_cancelled()
            }
        }
    }

    fn enter_capture(&mut self, angle: Angle, intent: Intent) -> Effect {
        self.state.angle = angle;
        self.state.captured_image = None;
        self.state.current_frame = None;
        self.state.face_detected = false;
        self.state.is_capturing = true;
        self.transition(WizardStep::capture(angle));
        self.emit(Command::StartCapture { angle }, intent)
    }

    fn revert_to_welcome(&mut self) {
        self.state.is_capturing = false;
        self.state.current_frame = None;
        self.state.face_detected = false;
        self.state.captured_image = None;
        self.transition(WizardStep::Welcome);
    }

    fn finish(&mut self, outcome: Outcome) {
        self.state.outcome = Some(outcome);
        self.state.is_capturing = false;
        self.state.captured_image = None;
        self.state.current_frame = None;
        self.state.face_detected = false;
    }

    fn transition(&mut self, step: WizardStep) {
        debug!("Step {:?} -> {:?}", self.state.step, step);
        self.state.step = step;
        self.epoch += 1;
    }

    fn emit(&mut self, command: Command, intent: Intent) -> Effect {
        let ticket = AckTicket {
            intent,
            kind: command.kind(),
            epoch: self.epoch,
        };
        self.state.last_command = Some(ticket.kind);
        Effect::Emit { command, ticket }
    }

    fn schedule_completion(&mut self) -> Option<Effect> {
        if self.completion_scheduled {
            return None;
        }
        self.completion_scheduled = true;
        Some(Effect::ScheduleCompletion)
    }

    fn notify_cancelled(&mut self) -> Vec<Effect> {
        if self.cancel_notified {
            return Vec::new();
        }
        self.cancel_notified = true;
        vec![Effect::NotifyCancelled]
    }

    fn accepts_stream(&self) -> bool {
        self.state.is_capturing && !self.state.is_finished()
    }

    fn ensure_active(&self) -> Result<(), Rejection> {
        if self.state.is_finished() {
            return Err(Rejection::Finished);
        }
        Ok(())
    }

    fn expect_step(&self, intent: Intent, step: WizardStep) -> Result<(), Rejection> {
        self.ensure_active()?;
        if self.state.step != step {
            return Err(Rejection::WrongStep {
                intent,
                step: self.state.step,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitted(effects: &[Effect]) -> Vec<(Command, AckTicket)> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Emit { command, ticket } => Some((command.clone(), *ticket)),
                _ => None,
            })
            .collect()
    }

    fn single_emit(effects: Vec<Effect>) -> (Command, AckTicket) {
        let mut commands = emitted(&effects);
        assert_eq!(commands.len(), 1, "expected one command in {:?}", effects);
        commands.remove(0)
    }

    fn feed_live_frame(controller: &mut CaptureController) {
        controller.handle_event(InboundEvent::BiometricFrame {
            image: "AAAA".to_string(),
        });
        controller.handle_event(InboundEvent::FaceDetected { detected: true });
    }

    /// Drives a fresh controller into `Confirm` for the frontal angle.
    fn controller_in_confirm() -> CaptureController {
        let mut controller = CaptureController::new();
        controller.start().unwrap();
        feed_live_frame(&mut controller);
        controller.capture().unwrap();
        controller
    }

    #[test]
    fn test_start_enters_frontal_capture() {
        let mut controller = CaptureController::new();
        let (command, ticket) = single_emit(controller.start().unwrap());

        assert_eq!(
            command,
            Command::StartCapture {
                angle: Angle::Frontal
            }
        );
        assert_eq!(ticket.intent, Intent::Start);
        let state = controller.state();
        assert_eq!(state.step, WizardStep::CaptureFrontal);
        assert!(state.is_capturing);
        assert_eq!(state.last_command, Some(CommandKind::StartCapture));
    }

    #[test]
    fn test_start_only_from_welcome() {
        let mut controller = CaptureController::new();
        controller.start().unwrap();
        assert!(matches!(
            controller.start(),
            Err(Rejection::WrongStep {
                intent: Intent::Start,
                step: WizardStep::CaptureFrontal
            })
        ));
    }

    #[test]
    fn test_capture_rejected_without_face_in_every_capture_step() {
        let mut controller = CaptureController::new();
        controller.start().unwrap();

        for angle in Angle::ALL {
            assert_eq!(controller.state().step, WizardStep::capture(angle));
            controller.handle_event(InboundEvent::BiometricFrame {
                image: "AAAA".to_string(),
            });
            controller.handle_event(InboundEvent::FaceDetected { detected: false });

            assert_eq!(controller.capture(), Err(Rejection::FaceNotDetected));
            assert_eq!(controller.state().step, WizardStep::capture(angle));
            assert_eq!(controller.state().last_error, None);

            controller.handle_event(InboundEvent::FaceDetected { detected: true });
            controller.capture().unwrap();
            controller.confirm().unwrap();
        }
        assert_eq!(controller.state().step, WizardStep::Success);
    }

    #[test]
    fn test_capture_without_frame_surfaces_error() {
        let mut controller = CaptureController::new();
        controller.start().unwrap();
        controller.handle_event(InboundEvent::FaceDetected { detected: true });

        assert_eq!(controller.capture(), Err(Rejection::NoFrame));
        assert_eq!(controller.state().step, WizardStep::CaptureFrontal);
        assert_eq!(
            controller.state().last_error.as_deref(),
            Some("no frame available to capture")
        );
    }

    #[test]
    fn test_capture_pins_frame_and_emits_photo() {
        let mut controller = CaptureController::new();
        controller.start().unwrap();
        feed_live_frame(&mut controller);

        let (command, _) = single_emit(controller.capture().unwrap());
        assert_eq!(
            command,
            Command::CapturePhoto {
                angle: Angle::Frontal,
                image: "data:image/jpeg;base64,AAAA".to_string(),
            }
        );
        let state = controller.state();
        assert_eq!(state.step, WizardStep::Confirm);
        assert!(!state.is_capturing);
        assert_eq!(state.captured_image.as_ref().map(|f| f.base64()), Some("AAAA"));
    }

    #[test]
    fn test_retake_returns_to_same_angle() {
        let mut controller = controller_in_confirm();
        controller.confirm().unwrap();
        feed_live_frame(&mut controller);
        controller.capture().unwrap();
        assert_eq!(controller.state().angle, Angle::Left);

        let (command, ticket) = single_emit(controller.retake().unwrap());
        assert_eq!(command, Command::StartCapture { angle: Angle::Left });
        assert_eq!(ticket.intent, Intent::Retake);
        let state = controller.state();
        assert_eq!(state.step, WizardStep::CaptureLeft);
        assert_eq!(state.progress, 1);
        assert!(state.captured_image.is_none());
        assert!(state.is_capturing);
        // the previous stream is not reused
        assert!(state.current_frame.is_none());
        assert!(!state.face_detected);
    }

    #[test]
    fn test_progress_increments_once_per_confirm_and_caps_at_three() {
        let mut controller = CaptureController::new();
        controller.start().unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            feed_live_frame(&mut controller);
            controller.capture().unwrap();
            // retakes never move progress
            controller.retake().unwrap();
            feed_live_frame(&mut controller);
            controller.capture().unwrap();
            assert_eq!(controller.state().progress as usize, seen.len());
            controller.confirm().unwrap();
            seen.push(controller.state().progress);
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert!(controller.confirm().is_err());
        assert_eq!(controller.state().progress, 3);
    }

    #[test]
    fn test_last_confirm_completes_and_schedules_once() {
        let mut controller = CaptureController::new();
        controller.start().unwrap();
        for angle in [Angle::Frontal, Angle::Left] {
            feed_live_frame(&mut controller);
            controller.capture().unwrap();
            let (command, _) = single_emit(controller.confirm().unwrap());
            assert_eq!(
                command,
                Command::StartCapture {
                    angle: angle.next().unwrap()
                }
            );
        }
        feed_live_frame(&mut controller);
        controller.capture().unwrap();

        let effects = controller.confirm().unwrap();
        assert_eq!(emitted(&effects)[0].0, Command::CompleteCapture);
        assert!(effects.contains(&Effect::ScheduleCompletion));
        assert_eq!(controller.state().step, WizardStep::Success);
        assert!(!controller.state().is_finished());

        // a backend success echo must not schedule a second completion
        let echoed = controller.handle_event(InboundEvent::status(StatusState::Success));
        assert!(echoed.is_empty());

        assert!(controller.complete());
        assert_eq!(controller.state().outcome, Some(Outcome::Completed));
        assert!(!controller.complete());
    }

    #[test]
    fn test_confirm_outside_confirm_step_is_rejected() {
        let mut controller = CaptureController::new();
        assert!(matches!(
            controller.confirm(),
            Err(Rejection::WrongStep { .. })
        ));
        assert_eq!(controller.state().progress, 0);
    }

    #[test]
    fn test_cancel_emits_and_notifies_once_after_ack() {
        let mut controller = CaptureController::new();
        controller.start().unwrap();

        let (command, ticket) = single_emit(controller.cancel().unwrap());
        assert_eq!(command, Command::CancelCapture);
        assert_eq!(controller.state().outcome, Some(Outcome::Cancelled));
        assert_eq!(controller.cancel(), Err(Rejection::Finished));

        let effects = controller.handle_ack(ticket, Err(BridgeError::CommandTimeout));
        assert_eq!(effects, vec![Effect::NotifyCancelled]);
        assert!(controller.handle_ack(ticket, Ok(Ack::ok())).is_empty());
    }

    /// Drives a fresh controller into `step` through user intents.
    fn controller_at(step: WizardStep) -> CaptureController {
        let mut controller = CaptureController::new();
        if step == WizardStep::Welcome {
            return controller;
        }
        controller.start().unwrap();
        for angle in Angle::ALL {
            if step == WizardStep::capture(angle) {
                return controller;
            }
            feed_live_frame(&mut controller);
            controller.capture().unwrap();
            if step == WizardStep::Confirm {
                return controller;
            }
            controller.confirm().unwrap();
        }
        panic!("{:?} is not reachable before success", step);
    }

    #[test]
    fn test_cancel_notifies_once_from_every_open_step() {
        let steps = [
            WizardStep::Welcome,
            WizardStep::CaptureFrontal,
            WizardStep::CaptureLeft,
            WizardStep::CaptureRight,
            WizardStep::Confirm,
        ];
        let results = [
            Ok(Ack::ok()),
            Err(BridgeError::CommandTimeout),
            Err(BridgeError::ChannelUnavailable),
            Err(BridgeError::CommandRejected("busy".to_string())),
        ];

        for step in steps {
            for result in results.clone() {
                let mut controller = controller_at(step);
                assert_eq!(controller.state().step, step);

                let (command, ticket) = single_emit(controller.cancel().unwrap());
                assert_eq!(command, Command::CancelCapture, "from {:?}", step);
                assert_eq!(controller.state().outcome, Some(Outcome::Cancelled));

                let effects = controller.handle_ack(ticket, result.clone());
                assert_eq!(
                    effects,
                    vec![Effect::NotifyCancelled],
                    "from {:?} with {:?}",
                    step,
                    result
                );
                assert!(controller.handle_ack(ticket, result).is_empty());
                assert!(controller
                    .handle_event(InboundEvent::status(StatusState::Cancelled))
                    .is_empty());
                assert!(!controller.complete());
            }
        }
    }

    #[test]
    fn test_cancel_clears_live_preview() {
        let mut controller = CaptureController::new();
        controller.start().unwrap();
        feed_live_frame(&mut controller);
        assert!(controller.state().current_frame.is_some());

        controller.cancel().unwrap();
        let state = controller.state();
        assert!(state.current_frame.is_none());
        assert!(!state.face_detected);
        assert!(!state.can_capture());
    }

    #[test]
    fn test_cancel_from_welcome() {
        let mut controller = CaptureController::new();
        let (command, _) = single_emit(controller.cancel().unwrap());
        assert_eq!(command, Command::CancelCapture);
        assert_eq!(controller.state().step, WizardStep::Welcome);
    }

    #[test]
    fn test_cancel_not_available_after_success() {
        let mut controller = CaptureController::new();
        controller.start().unwrap();
        controller.handle_event(InboundEvent::status(StatusState::Success));
        assert_eq!(controller.cancel(), Err(Rejection::Finished));
    }

    #[test]
    fn test_start_failure_reverts_to_welcome() {
        let mut controller = CaptureController::new();
        let (_, ticket) = single_emit(controller.start().unwrap());
        feed_live_frame(&mut controller);

        controller.handle_ack(
            ticket,
            Err(BridgeError::CommandRejected("denied".to_string())),
        );
        let state = controller.state();
        assert_eq!(state.step, WizardStep::Welcome);
        assert_eq!(state.last_error.as_deref(), Some("denied"));
        assert!(!state.is_capturing);
        assert!(state.current_frame.is_none());
        assert!(controller.start().is_ok());
    }

    #[test]
    fn test_late_start_failure_does_not_rewind() {
        let mut controller = CaptureController::new();
        let (_, ticket) = single_emit(controller.start().unwrap());
        feed_live_frame(&mut controller);
        controller.capture().unwrap();

        controller.handle_ack(ticket, Err(BridgeError::CommandTimeout));
        let state = controller.state();
        assert_eq!(state.step, WizardStep::Confirm);
        assert_eq!(
            state.last_error.as_deref(),
            Some("command acknowledgement timed out")
        );
    }

    #[test]
    fn test_failures_after_start_keep_optimistic_state() {
        let mut controller = controller_in_confirm();
        let (_, ticket) = single_emit(controller.confirm().unwrap());

        controller.handle_ack(ticket, Err(BridgeError::ChannelUnavailable));
        let state = controller.state();
        assert_eq!(state.step, WizardStep::CaptureLeft);
        assert_eq!(state.progress, 1);
        assert_eq!(state.last_error.as_deref(), Some("event channel unavailable"));
    }

    #[test]
    fn test_successful_ack_clears_error() {
        let mut controller = CaptureController::new();
        let (_, ticket) = single_emit(controller.start().unwrap());
        controller.handle_event(InboundEvent::Error {
            msg: "camera warming up".to_string(),
        });
        assert!(controller.state().last_error.is_some());

        controller.handle_ack(ticket, Ok(Ack::ok()));
        assert_eq!(controller.state().last_error, None);
    }

    #[test]
    fn test_refused_intent_leaves_state() {
        let mut controller = CaptureController::new();
        controller.refuse_intent(Intent::Start, BridgeError::ChannelUnavailable);
        assert_eq!(controller.state().step, WizardStep::Welcome);
        assert_eq!(
            controller.state().last_error.as_deref(),
            Some("event channel unavailable")
        );
    }

    #[test]
    fn test_frames_ignored_when_not_capturing() {
        let mut controller = CaptureController::new();
        feed_live_frame(&mut controller);
        assert!(controller.state().current_frame.is_none());
        assert!(!controller.state().face_detected);

        let mut controller = controller_in_confirm();
        let pinned = controller.state().captured_image.clone();
        controller.handle_event(InboundEvent::BiometricFrame {
            image: "BBBB".to_string(),
        });
        assert_eq!(controller.state().captured_image, pinned);

        controller.cancel().unwrap();
        assert!(controller.state().current_frame.is_none());
        feed_live_frame(&mut controller);
        assert!(controller.state().current_frame.is_none());
    }

    #[test]
    fn test_frames_get_increasing_sequence_numbers() {
        let mut controller = CaptureController::new();
        controller.start().unwrap();
        feed_live_frame(&mut controller);
        let first = controller.state().current_frame.as_ref().unwrap().seq();
        feed_live_frame(&mut controller);
        let second = controller.state().current_frame.as_ref().unwrap().seq();
        assert!(second > first);
    }

    #[test]
    fn test_error_event_does_not_change_step() {
        let mut controller = CaptureController::new();
        controller.start().unwrap();
        controller.handle_event(InboundEvent::Error {
            msg: "camera unplugged".to_string(),
        });
        assert_eq!(controller.state().step, WizardStep::CaptureFrontal);
        assert_eq!(
            controller.state().last_error.as_deref(),
            Some("camera unplugged")
        );
    }

    #[test]
    fn test_backend_error_status_sets_error() {
        let mut controller = CaptureController::new();
        controller.handle_event(InboundEvent::BiometricStatus(BackendStatus {
            state: StatusState::Error,
            message: Some("profile write failed".to_string()),
        }));
        assert_eq!(
            controller.state().last_error.as_deref(),
            Some("profile write failed")
        );
        assert_eq!(controller.state().step, WizardStep::Welcome);
    }

    #[test]
    fn test_backend_cancel_forces_termination_once() {
        let mut controller = CaptureController::new();
        controller.start().unwrap();

        let effects = controller.handle_event(InboundEvent::status(StatusState::Cancelled));
        assert_eq!(effects, vec![Effect::NotifyCancelled]);
        assert_eq!(controller.state().outcome, Some(Outcome::Cancelled));

        let repeated = controller.handle_event(InboundEvent::status(StatusState::Cancelled));
        assert!(repeated.is_empty());
    }

    #[test]
    fn test_backend_cancel_during_local_cancel_notifies_once() {
        let mut controller = CaptureController::new();
        let (_, ticket) = single_emit(controller.cancel().unwrap());

        let effects = controller.handle_event(InboundEvent::status(StatusState::Cancelled));
        assert_eq!(effects, vec![Effect::NotifyCancelled]);
        assert!(controller.handle_ack(ticket, Ok(Ack::ok())).is_empty());
    }

    #[test]
    fn test_backend_success_overrides_optimistic_state() {
        let mut controller = controller_in_confirm();
        let effects = controller.handle_event(InboundEvent::status(StatusState::Success));

        assert_eq!(effects, vec![Effect::ScheduleCompletion]);
        let state = controller.state();
        assert_eq!(state.step, WizardStep::Success);
        assert!(state.captured_image.is_none());
        assert_eq!(state.progress, 0);
    }

    #[test]
    fn test_backend_cancel_beats_pending_completion() {
        let mut controller = CaptureController::new();
        controller.start().unwrap();
        controller.handle_event(InboundEvent::status(StatusState::Success));
        controller.handle_event(InboundEvent::status(StatusState::Cancelled));

        assert!(!controller.complete());
        assert_eq!(controller.state().outcome, Some(Outcome::Cancelled));
    }
}
