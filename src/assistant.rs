//! Assistant session loop
//!
//! One task owns [`SessionState`] and multiplexes face sampling, recognition
//! events, and user controls. Chat dispatches run as separate tasks with a
//! context snapshot and report back through the transcript.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::breathing::{BreathingPacer, PacerView};
use crate::config::AssistantConfig;
use crate::dialogue::Dispatcher;
use crate::providers::ChatBackend;
use crate::report::{ReportError, ReportPanel, ReportRelay, ReportSink};
use crate::session::{SessionState, Transcript, Utterance};
use crate::vision::{EmotionTracker, FaceMatcher, FaceSensor, IdentityTracker};
use crate::voice::{
    PlaybackIndicator, RecognitionSupervisor, SpeechCoordinator, SpeechEngine, SpeechRecognizer,
    SupervisorEvent, WakeAction, WakeWordController,
};
use crate::{Error, Result};

/// Shown when no camera is available
pub const NOTICE_NO_CAMERA: &str = "Camera unavailable. Face tracking is inactive.";

/// Shown when the face capability fails while sampling
pub const NOTICE_SENSOR_FAILED: &str = "Could not load AI models. Check file paths.";

const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(1);

/// User controls routed into the session loop
#[derive(Debug)]
pub enum Control {
    /// Mic button: restart recognition if stopped, arm if idle
    Mic,
    /// Typed chat message
    Typed(String),
    /// Submit a report through the report panel
    Report {
        text: String,
        done: oneshot::Sender<std::result::Result<(), ReportError>>,
    },
    /// Start or stop the breathing exercise
    Breathe,
    /// Stop the session loop
    Shutdown,
}

/// External capabilities the session runs on
pub struct Capabilities {
    /// Face detection; `None` when there is no camera
    pub sensor: Option<Arc<dyn FaceSensor>>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub speech: Arc<dyn SpeechEngine>,
    pub indicator: Arc<dyn PlaybackIndicator>,
    pub chat: Arc<dyn ChatBackend>,
    pub reports: Arc<dyn ReportSink>,
}

/// Cloneable handle for driving a running [`Assistant`]
#[derive(Clone)]
pub struct AssistantHandle {
    controls: mpsc::Sender<Control>,
    state: watch::Receiver<SessionState>,
    breathing: watch::Receiver<PacerView>,
    transcript: Transcript,
    report_panel: ReportPanel,
}

impl AssistantHandle {
    async fn send(&self, control: Control) -> Result<()> {
        self.controls
            .send(control)
            .await
            .map_err(|_| Error::Config("assistant is not running".to_string()))
    }

    /// Press the mic button
    ///
    /// # Errors
    ///
    /// Returns error if the session loop has stopped
    pub async fn mic(&self) -> Result<()> {
        self.send(Control::Mic).await
    }

    /// Send a typed chat message
    ///
    /// # Errors
    ///
    /// Returns error if the session loop has stopped
    pub async fn typed(&self, text: impl Into<String>) -> Result<()> {
        self.send(Control::Typed(text.into())).await
    }

    /// Toggle the breathing exercise
    ///
    /// # Errors
    ///
    /// Returns error if the session loop has stopped
    pub async fn breathe(&self) -> Result<()> {
        self.send(Control::Breathe).await
    }

    /// Submit a report and wait for the outcome
    ///
    /// # Errors
    ///
    /// Returns error if the session loop has stopped
    pub async fn report(
        &self,
        text: impl Into<String>,
    ) -> Result<std::result::Result<(), ReportError>> {
        let (done, outcome) = oneshot::channel();
        self.send(Control::Report {
            text: text.into(),
            done,
        })
        .await?;
        outcome
            .await
            .map_err(|_| Error::Report("report task ended without an outcome".to_string()))
    }

    /// Ask the session loop to stop
    ///
    /// # Errors
    ///
    /// Returns error if the session loop has already stopped
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Control::Shutdown).await
    }

    /// Latest published session state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch session state changes
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Watch the breathing pacer
    #[must_use]
    pub fn watch_breathing(&self) -> watch::Receiver<PacerView> {
        self.breathing.clone()
    }

    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub const fn report_panel(&self) -> &ReportPanel {
        &self.report_panel
    }
}

/// The assistant session
pub struct Assistant {
    state: SessionState,
    published: watch::Sender<SessionState>,
    sensor: Option<Arc<dyn FaceSensor>>,
    emotion: EmotionTracker,
    identity: IdentityTracker,
    controller: WakeWordController,
    supervisor: RecognitionSupervisor,
    dispatcher: Dispatcher,
    speech: SpeechCoordinator,
    transcript: Transcript,
    report_panel: ReportPanel,
    pacer: BreathingPacer,
    sample_interval: Duration,
    controls: mpsc::Receiver<Control>,
    dispatches: JoinSet<()>,
}

impl Assistant {
    /// Build a session and its handle
    ///
    /// A face reference file that fails to load is logged and identity stays
    /// at the default.
    ///
    /// # Errors
    ///
    /// Returns error if the wake phrase is invalid
    pub fn new(config: &AssistantConfig, caps: Capabilities) -> Result<(Self, AssistantHandle)> {
        let controller = WakeWordController::new(&config.wake_phrase)?;

        let matcher = config.face_references.as_deref().and_then(|path| {
            FaceMatcher::from_path(path, config.match_threshold)
                .inspect_err(|e| {
                    tracing::warn!(path = %path.display(), error = %e, "failed to load face references");
                })
                .ok()
        });
        let identity = IdentityTracker::new(matcher, config.default_identity.clone());

        let mut state = SessionState::new(&config.default_identity);
        if caps.sensor.is_none() {
            state.notice = Some(NOTICE_NO_CAMERA.to_string());
        }

        let transcript = Transcript::new();
        let speech = SpeechCoordinator::new(
            caps.speech,
            caps.indicator,
            config.speech_poll,
            config.speech_idle_reads,
        );
        let dispatcher = Dispatcher::new(caps.chat, transcript.clone(), speech.clone());
        let report_panel = ReportPanel::new(ReportRelay::new(caps.reports), config.report_dismiss);
        let pacer = BreathingPacer::default();

        let (published, state_rx) = watch::channel(state.clone());
        let (controls_tx, controls) = mpsc::channel(32);

        let handle = AssistantHandle {
            controls: controls_tx,
            state: state_rx,
            breathing: pacer.subscribe(),
            transcript: transcript.clone(),
            report_panel: report_panel.clone(),
        };

        let assistant = Self {
            state,
            published,
            sensor: caps.sensor,
            emotion: EmotionTracker::new(),
            identity,
            controller,
            supervisor: RecognitionSupervisor::new(caps.recognizer),
            dispatcher,
            speech,
            transcript,
            report_panel,
            pacer,
            sample_interval: config.sample_interval.max(MIN_SAMPLE_INTERVAL),
            controls,
            dispatches: JoinSet::new(),
        };

        Ok((assistant, handle))
    }

    /// Run until shutdown or until every handle is dropped
    ///
    /// # Errors
    ///
    /// Currently never fails; component failures are logged and degrade
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            wake_phrase = self.controller.wake_phrase(),
            camera = self.sensor.is_some(),
            references = self.identity.has_references(),
            "assistant session starting"
        );

        if let Err(e) = self.supervisor.start() {
            tracing::warn!(error = %e, "speech recognition unavailable");
        }
        self.sync_mic();
        self.publish();

        let mut sampler = tokio::time::interval(self.sample_interval);
        sampler.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = sampler.tick(), if self.sensor.is_some() => self.sample_face().await,
                event = self.supervisor.next_event() => self.on_recognition(event),
                control = self.controls.recv() => match control {
                    Some(Control::Shutdown) | None => break,
                    Some(control) => self.on_control(control),
                },
                Some(joined) = self.dispatches.join_next(), if !self.dispatches.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "dispatch task failed");
                    }
                }
            }
            self.publish();
        }

        self.supervisor.stop();
        self.speech.stop();
        self.pacer.stop();
        self.report_panel.close();
        self.dispatches.abort_all();
        self.state.mic_active = false;
        self.publish();

        tracing::info!("assistant session stopped");
        Ok(())
    }

    async fn sample_face(&mut self) {
        let Some(sensor) = self.sensor.clone() else {
            return;
        };

        let sample = match sensor.sample().await {
            Ok(sample) => sample,
            Err(e) => {
                if self.state.notice.is_none() {
                    tracing::error!(error = %e, "face sampling failed");
                    self.state.notice = Some(NOTICE_SENSOR_FAILED.to_string());
                }
                None
            }
        };

        self.identity.observe(&mut self.state, sample.as_ref());
        self.emotion.observe(&mut self.state, sample.as_ref());
    }

    fn on_recognition(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Started | SupervisorEvent::Ended { .. } => self.sync_mic(),
            SupervisorEvent::Segment(segment) => {
                if let Some(action) = self.controller.on_segment(&mut self.state, &segment) {
                    self.on_wake_action(action);
                }
            }
            SupervisorEvent::Failed(error) => {
                tracing::debug!(%error, "recognition failure reported");
            }
        }
    }

    fn on_control(&mut self, control: Control) {
        match control {
            Control::Mic => {
                if self.supervisor.force_restart() {
                    tracing::info!("recognition restarted from mic control");
                }
                self.sync_mic();
                if let Some(action) = WakeWordController::activate(&mut self.state) {
                    self.on_wake_action(action);
                }
            }
            Control::Typed(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    self.spawn_dispatch(text.to_string());
                }
            }
            Control::Report { text, done } => {
                let panel = self.report_panel.clone();
                panel.open();
                panel.set_text(text);
                tokio::spawn(async move {
                    let outcome = panel.submit().await;
                    // Caller may have stopped waiting
                    let _ = done.send(outcome);
                });
            }
            Control::Breathe => self.pacer.toggle(),
            Control::Shutdown => {}
        }
    }

    fn on_wake_action(&mut self, action: WakeAction) {
        match action {
            WakeAction::Armed { greeting } => {
                self.transcript.push(Utterance::assistant(greeting.clone()));
                if let Err(e) = self.speech.speak(&greeting, None) {
                    tracing::warn!(error = %e, "failed to speak greeting");
                }
            }
            WakeAction::Command(command) => self.spawn_dispatch(command),
            WakeAction::Dismissed => {}
        }
    }

    fn spawn_dispatch(&mut self, text: String) {
        let context = self.state.dialogue_context();
        let dispatcher = self.dispatcher.clone();
        self.dispatches.spawn(async move {
            dispatcher.dispatch(&context, &text).await;
        });
    }

    fn sync_mic(&mut self) {
        self.state.mic_active = self.supervisor.is_listening();
    }

    fn publish(&self) {
        self.published.send_if_modified(|published| {
            if *published == self.state {
                false
            } else {
                published.clone_from(&self.state);
                true
            }
        });
    }
}
