use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tower::{Service, ServiceExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bridge::{Ack, Command, CommandService, EventBridge, InboundEvent, command_service};
use crate::capture::{AckTicket, CaptureController, Effect, Intent, Outcome, WizardState};
use crate::config::CaptureSettings;
use crate::error::{AppError, BridgeError};

/// Terminal callback. Runs on the session task, at most once.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

type PendingAck = Pin<Box<dyn Future<Output = (AckTicket, Result<Ack, BridgeError>)> + Send>>;

pub struct CaptureSessionBuilder {
    bridge: Arc<dyn EventBridge>,
    settings: CaptureSettings,
    on_complete: Option<Callback>,
    on_cancel: Option<Callback>,
}

impl CaptureSessionBuilder {
    pub fn new(bridge: Arc<dyn EventBridge>, settings: CaptureSettings) -> Self {
        Self {
            bridge,
            settings,
            on_complete: None,
            on_cancel: None,
        }
    }

    pub fn on_complete(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn on_cancel(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(callback));
        self
    }

    /// Starts the session task. The task resolves with the outcome once a
    /// terminal callback ran. If every handle is dropped first, in-flight
    /// commands and a scheduled completion still run to the end; the task then
    /// resolves with whatever outcome was reached, `None` if the flow was open.
    pub fn spawn(self) -> (CaptureSessionHandle, JoinHandle<Option<Outcome>>) {
        let id = Uuid::new_v4();
        // subscribe before spawning so no event published after this call is missed
        let events = self.bridge.subscribe();
        let (intent_tx, intent_rx) = mpsc::channel(self.settings.intent_buffer.max(1));
        let controller = CaptureController::new();
        let (state_tx, state_rx) = watch::channel(controller.state().clone());

        let session = CaptureSession {
            id,
            service: command_service(Arc::clone(&self.bridge), self.settings.ack_timeout()),
            bridge: self.bridge,
            controller,
            state_tx,
            completion_delay: self.settings.completion_delay(),
            completion_at: None,
            pending_acks: FuturesUnordered::new(),
            on_complete: self.on_complete,
            on_cancel: self.on_cancel,
            terminated: false,
        };
        let task = tokio::spawn(session.run(intent_rx, events));

        (
            CaptureSessionHandle {
                id,
                intent_tx,
                state_rx,
            },
            task,
        )
    }
}

/// Cheap handle used by the presentation layer to drive one session.
#[derive(Clone)]
pub struct CaptureSessionHandle {
    id: Uuid,
    intent_tx: mpsc::Sender<Intent>,
    state_rx: watch::Receiver<WizardState>,
}

impl CaptureSessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn start(&self) -> Result<(), AppError> {
        self.send(Intent::Start)
    }

    pub fn capture(&self) -> Result<(), AppError> {
        self.send(Intent::Capture)
    }

    pub fn confirm(&self) -> Result<(), AppError> {
        self.send(Intent::Confirm)
    }

    pub fn retake(&self) -> Result<(), AppError> {
        self.send(Intent::Retake)
    }

    pub fn cancel(&self) -> Result<(), AppError> {
        self.send(Intent::Cancel)
    }

    /// Queues `intent` without waiting; safe to call from the UI thread.
    pub fn send(&self, intent: Intent) -> Result<(), AppError> {
        self.intent_tx.try_send(intent).map_err(|e| match e {
            TrySendError::Full(intent) => {
                warn!("Session {} dropped {:?}, intent queue full", self.id, intent);
                AppError::SessionBusy(self.id)
            }
            TrySendError::Closed(_) => AppError::SessionClosed(self.id),
        })
    }

    pub fn snapshot(&self) -> WizardState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WizardState> {
        self.state_rx.clone()
    }

    /// Resolves with the first published state matching `predicate`.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&WizardState) -> bool,
    ) -> Result<WizardState, AppError> {
        let mut state_rx = self.state_rx.clone();
        state_rx
            .wait_for(|state| predicate(state))
            .await
            .map(|state| (*state).clone())
            .map_err(|_| AppError::SessionClosed(self.id))
    }

    pub fn is_closed(&self) -> bool {
        self.intent_tx.is_closed()
    }
}

struct CaptureSession {
    id: Uuid,
    bridge: Arc<dyn EventBridge>,
    service: CommandService,
    controller: CaptureController,
    state_tx: watch::Sender<WizardState>,
    completion_delay: Duration,
    completion_at: Option<Instant>,
    pending_acks: FuturesUnordered<PendingAck>,
    on_complete: Option<Callback>,
    on_cancel: Option<Callback>,
    terminated: bool,
}

impl CaptureSession {
    async fn run(
        mut self,
        mut intents: mpsc::Receiver<Intent>,
        events: broadcast::Receiver<InboundEvent>,
    ) -> Option<Outcome> {
        info!("Capture session {} started", self.id);
        let mut events = BroadcastStream::new(events);

        let mut intents_open = true;
        while !self.terminated {
            // without handles only in-flight work can still change the outcome
            if !intents_open && self.pending_acks.is_empty() && self.completion_at.is_none() {
                info!("Capture session {} abandoned", self.id);
                break;
            }
            let completion_at = self.completion_at;
            tokio::select! {
                intent = intents.recv(), if intents_open => match intent {
                    Some(intent) => self.handle_intent(intent).await,
                    None => {
                        debug!("Capture session {} lost its last handle", self.id);
                        intents_open = false;
                    }
                },
                Some(event) = events.next() => match event {
                    Ok(event) => {
                        let effects = self.controller.handle_event(event);
                        self.apply(effects).await;
                    }
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!("Capture session {} lagged, skipped {} events", self.id, skipped);
                    }
                },
                Some((ticket, result)) = self.pending_acks.next(), if !self.pending_acks.is_empty() => {
                    let effects = self.controller.handle_ack(ticket, result);
                    self.apply(effects).await;
                }
                _ = sleep_until(completion_at.unwrap_or_else(Instant::now)), if completion_at.is_some() => {
                    self.completion_at = None;
                    if self.controller.complete() {
                        if let Some(on_complete) = self.on_complete.take() {
                            on_complete();
                        }
                        self.terminated = true;
                    }
                }
                else => break,
            }
            self.publish();
        }

        self.publish();
        let outcome = self.controller.state().outcome;
        info!("Capture session {} finished: {:?}", self.id, outcome);
        outcome
    }

    async fn handle_intent(&mut self, intent: Intent) {
        // cancel goes through regardless, its callback fires even if the emit fails
        if intent != Intent::Cancel && !self.bridge.is_connected() {
            self.controller
                .refuse_intent(intent, BridgeError::ChannelUnavailable);
            return;
        }
        match self.controller.handle_intent(intent) {
            Ok(effects) => self.apply(effects).await,
            Err(rejection) => debug!("Session {} ignored {:?}: {}", self.id, intent, rejection),
        }
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Emit { command, ticket } => self.dispatch(command, ticket).await,
                Effect::ScheduleCompletion => {
                    self.completion_at = Some(Instant::now() + self.completion_delay);
                }
                Effect::NotifyCancelled => {
                    if let Some(on_cancel) = self.on_cancel.take() {
                        on_cancel();
                    }
                    self.terminated = true;
                }
            }
        }
    }

    async fn dispatch(&mut self, command: Command, ticket: AckTicket) {
        let response = match self.service.ready().await {
            Ok(service) => service.call(command),
            Err(e) => {
                self.pending_acks
                    .push(Box::pin(async move { (ticket, Err(e)) }));
                return;
            }
        };
        self.pending_acks
            .push(Box::pin(async move { (ticket, response.await) }));
    }

    fn publish(&self) {
        let current = self.controller.state();
        self.state_tx.send_if_modified(|published| {
            if *published == *current {
                return false;
            }
            *published = current.clone();
            true
        });
    }
}
