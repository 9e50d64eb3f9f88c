pub mod frames;

use chrono::{DateTime, SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::{
    Ack, BackendEndpoint, BackendStatus, Command, CommandEnvelope, InboundEvent, StatusState,
};
use crate::capture::{Angle, REQUIRED_CAPTURES};
use crate::config::SimulatorSettings;

pub use frames::{decode_image_payload, synthesize_frame};

/// In-process stand-in for the camera backend, driven through a [`BackendEndpoint`].
///
/// Streams synthetic frames and face detections for the requested angle,
/// stores captured photos and answers every command with an acknowledgement.
pub struct SimulatedBackend {
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SimulatedBackend {
    pub fn spawn(endpoint: BackendEndpoint, settings: SimulatorSettings) -> Self {
        Self::with_rng(endpoint, settings, StdRng::from_os_rng())
    }

    pub fn with_rng(endpoint: BackendEndpoint, settings: SimulatorSettings, rng: StdRng) -> Self {
        let cancel_token = CancellationToken::new();
        let simulator = Simulator {
            endpoint,
            settings,
            rng,
            streaming: None,
            tick: 0,
            photos: Vec::new(),
        };
        Self {
            task: Some(tokio::spawn(simulator.run(cancel_token.clone()))),
            cancel_token,
        }
    }

    pub fn stop(&mut self) {
        self.cancel_token.cancel();
        self.task.take();
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for SimulatedBackend {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone)]
struct CapturedPhoto {
    angle: Angle,
    captured_at: DateTime<Utc>,
    size: usize,
}

struct Simulator {
    endpoint: BackendEndpoint,
    settings: SimulatorSettings,
    rng: StdRng,
    streaming: Option<Angle>,
    tick: u64,
    photos: Vec<CapturedPhoto>,
}

impl Simulator {
    async fn run(mut self, cancel_token: CancellationToken) {
        info!("Simulated capture backend started");
        let mut ticker = interval(self.settings.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                envelope = self.endpoint.recv_command() => match envelope {
                    Some(envelope) => self.handle_command(envelope),
                    None => {
                        debug!("Bridge dropped, simulator has nothing left to serve");
                        break;
                    }
                },
                _ = ticker.tick(), if self.streaming.is_some() => self.stream_frame(),
            }
        }
        info!("Simulated capture backend stopped");
    }

    fn handle_command(&mut self, envelope: CommandEnvelope) {
        debug!("Simulator received {}", envelope.command.kind());
        match envelope.command.clone() {
            Command::StartCapture { angle } => {
                // a retake replaces the earlier photo of the same angle
                self.photos.retain(|photo| photo.angle != angle);
                self.streaming = Some(angle);
                self.publish_status(StatusState::Capturing, format!("Capturing {angle}"));
                envelope.ack(Ack::ok().with_field("angle", angle.as_str()));
            }
            Command::CapturePhoto { angle, image } => {
                let Some(bytes) = decode_image_payload(&image) else {
                    warn!("Simulator got an undecodable {} photo", angle);
                    envelope.reject("invalid image payload");
                    return;
                };
                self.streaming = None;
                let photo = CapturedPhoto {
                    angle,
                    captured_at: Utc::now(),
                    size: bytes.len(),
                };
                info!("Stored {} photo ({} bytes)", angle, photo.size);
                let captured_at = photo.captured_at.to_rfc3339_opts(SecondsFormat::Millis, true);
                self.photos.retain(|photo| photo.angle != angle);
                self.photos.push(photo);
                envelope.ack(
                    Ack::ok()
                        .with_field("angle", angle.as_str())
                        .with_field("captured_at", captured_at)
                        .with_field("photos_count", self.photos.len()),
                );
            }
            Command::CompleteCapture => {
                if self.photos.len() < REQUIRED_CAPTURES as usize {
                    envelope.reject(format!(
                        "incomplete capture: {} of {} photos",
                        self.photos.len(),
                        REQUIRED_CAPTURES
                    ));
                    return;
                }
                self.streaming = None;
                let total: usize = self.photos.iter().map(|photo| photo.size).sum();
                info!("Profile saved with {} photos ({} bytes)", self.photos.len(), total);
                self.publish_status(StatusState::Success, "Profile saved".to_string());
                envelope.ack(Ack::ok().with_field("photos_count", self.photos.len()));
            }
            Command::CancelCapture => {
                self.streaming = None;
                self.photos.clear();
                self.publish_status(StatusState::Idle, "Capture cancelled".to_string());
                envelope.ack(Ack::ok());
            }
        }
    }

    fn stream_frame(&mut self) {
        let Some(angle) = self.streaming else {
            return;
        };
        self.tick += 1;
        let detected = self.rng.random_bool(self.settings.detection_rate.clamp(0.0, 1.0));
        match synthesize_frame(
            self.settings.width,
            self.settings.height,
            self.tick,
            angle,
            detected,
            self.settings.jpeg_quality,
        ) {
            Ok(image) => {
                self.endpoint.publish(InboundEvent::BiometricFrame { image });
                self.endpoint.publish(InboundEvent::FaceDetected { detected });
            }
            Err(e) => warn!("Failed to render simulated frame: {}", e),
        }
    }

    fn publish_status(&self, state: StatusState, message: String) {
        self.endpoint
            .publish(InboundEvent::BiometricStatus(BackendStatus {
                state,
                message: Some(message),
            }));
    }
}
