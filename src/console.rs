//! Terminal front end
//!
//! Stands in for the browser: stdin lines play the role of speech, the
//! transcript is printed as it grows, and speech playback is simulated with a
//! reading-speed timer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use crate::assistant::{Assistant, AssistantHandle, Capabilities};
use crate::config::AssistantConfig;
use crate::providers::GatewayClient;
use crate::session::{Sender, Utterance};
use crate::vision::{FaceSensor, ReplayFaceSensor};
use crate::voice::{
    PlaybackIndicator, RecognitionError, RecognitionEvent, SpeechEngine, SpeechRecognizer,
    TranscriptSegment,
};
use crate::{Error, Result};

/// Simulated speaking time per word
const WORD_DURATION: Duration = Duration::from_millis(300);

const HELP: &str = "\
Type to speak (e.g. \"hey maitri what is the cabin pressure\").
  > <text>         send a typed chat message
  /mic             press the mic button
  /report <text>   submit a report
  /breathe         start or stop the breathing exercise
  /status          show tracker and session state
  /drop [network]  end the recognition session (optionally as a network failure)
  /quit            exit";

/// Recognizer fed from text lines
///
/// Each `listen` opens a new session; lines are delivered to the latest one.
#[derive(Default, Clone)]
pub struct LineRecognizer {
    session: Arc<Mutex<Option<mpsc::Sender<RecognitionEvent>>>>,
}

impl LineRecognizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&self) -> MutexGuard<'_, Option<mpsc::Sender<RecognitionEvent>>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver one raw event to the open session
    ///
    /// Returns `false` if no session is open.
    pub fn push(&self, event: RecognitionEvent) -> bool {
        let session = self.session();
        match session.as_ref() {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }

    /// Deliver a spoken line: one interim segment per word, then the final one
    pub fn speak(&self, line: &str) -> bool {
        let words: Vec<&str> = line.split_whitespace().collect();
        for end in 1..words.len() {
            let partial = words[..end].join(" ");
            if !self.push(RecognitionEvent::Segment(TranscriptSegment::interim(partial))) {
                return false;
            }
        }
        self.push(RecognitionEvent::Segment(TranscriptSegment::finalized(
            words.join(" "),
        )))
    }

    /// End the open session, optionally reporting an error first
    pub fn end_session(&self, error: Option<RecognitionError>) {
        let mut session = self.session();
        if let (Some(tx), Some(error)) = (session.as_ref(), error) {
            let _ = tx.try_send(RecognitionEvent::Error(error));
        }
        *session = None;
    }
}

impl SpeechRecognizer for LineRecognizer {
    fn listen(&self) -> Result<mpsc::Receiver<RecognitionEvent>> {
        let (tx, rx) = mpsc::channel(256);
        tx.try_send(RecognitionEvent::Started)
            .map_err(|e| Error::Recognition(e.to_string()))?;
        *self.session() = Some(tx);
        Ok(rx)
    }
}

/// Speech engine that "speaks" for a time proportional to the word count
#[derive(Default)]
pub struct SimulatedSpeech {
    until: Mutex<Option<Instant>>,
}

impl SimulatedSpeech {
    fn until(&self) -> MutexGuard<'_, Option<Instant>> {
        self.until.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SpeechEngine for SimulatedSpeech {
    fn speak(&self, text: &str) -> Result<()> {
        let words = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
        *self.until() = Some(Instant::now() + WORD_DURATION.saturating_mul(words));
        Ok(())
    }

    fn cancel(&self) {
        *self.until() = None;
    }

    fn is_speaking(&self) -> bool {
        self.until().is_some_and(|until| Instant::now() < until)
    }
}

/// Logs the speaking indicator
#[derive(Debug, Default, Clone, Copy)]
pub struct LogIndicator;

impl PlaybackIndicator for LogIndicator {
    fn set_playing(&self, playing: bool) {
        tracing::debug!(playing, "speaking indicator");
    }
}

fn render(utterance: &Utterance) {
    let who = match utterance.sender {
        Sender::User => "You",
        Sender::Assistant => "MAITRI",
    };
    println!("[{}] {who}: {}", utterance.at.format("%H:%M:%S"), utterance.text);
}

/// Run the console session against a gateway
///
/// # Errors
///
/// Returns error if the session cannot be built or stdin fails
pub async fn run(config: &AssistantConfig) -> Result<()> {
    let gateway = Arc::new(GatewayClient::new(config.gateway_url.clone()));
    let recognizer = LineRecognizer::new();

    let sensor = match config.face_log.as_deref() {
        Some(path) => match ReplayFaceSensor::from_path(path) {
            Ok(sensor) => Some(Arc::new(sensor) as Arc<dyn FaceSensor>),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to load face log");
                None
            }
        },
        None => None,
    };

    let caps = Capabilities {
        sensor,
        recognizer: Arc::new(recognizer.clone()),
        speech: Arc::new(SimulatedSpeech::default()),
        indicator: Arc::new(LogIndicator),
        chat: gateway.clone(),
        reports: gateway,
    };

    let (assistant, handle) = Assistant::new(config, caps)?;
    let session = tokio::spawn(assistant.run());

    let mut transcript = handle.transcript().subscribe();
    tokio::spawn(async move {
        loop {
            match transcript.recv().await {
                Ok(utterance) => render(&utterance),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "transcript display fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut breathing = handle.watch_breathing();
    tokio::spawn(async move {
        while breathing.changed().await.is_ok() {
            let view = *breathing.borrow_and_update();
            let pacer = if view.expanded { "( O )" } else { "(o)" };
            println!("  {pacer} {}", view.instruction);
        }
    });

    println!("MAITRI console. Gateway: {}", config.gateway_url);
    println!("{HELP}");
    if let Some(notice) = handle.state().notice {
        println!("! {notice}");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !handle_line(&handle, &recognizer, line.trim()).await? {
            break;
        }
    }

    // Session may already have stopped
    let _ = handle.shutdown().await;
    match session.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "assistant task failed");
            Ok(())
        }
    }
}

/// Returns `false` when the console should exit
async fn handle_line(
    handle: &AssistantHandle,
    recognizer: &LineRecognizer,
    line: &str,
) -> Result<bool> {
    if line.is_empty() {
        return Ok(true);
    }

    if let Some(text) = line.strip_prefix('>') {
        handle.typed(text).await?;
        return Ok(true);
    }

    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "/quit" | "/exit" => return Ok(false),
        "/help" => println!("{HELP}"),
        "/mic" => handle.mic().await?,
        "/breathe" => handle.breathe().await?,
        "/report" => {
            let _ = handle.report(rest).await?;
            println!("  report: {}", handle.report_panel().view().status);
        }
        "/status" => {
            let state = handle.state();
            println!("  {}", state.tracker_status());
            println!(
                "  User: {} | Mic: {} | Awaiting command: {}",
                state.identified_user,
                if state.mic_active { "on" } else { "off" },
                state.awaiting_command
            );
            if let Some(notice) = state.notice {
                println!("  ! {notice}");
            }
        }
        "/drop" => {
            let error = (rest.trim() == "network").then_some(RecognitionError::Network);
            recognizer.end_session(error);
        }
        _ if command.starts_with('/') => println!("unknown command, try /help"),
        _ => {
            if !recognizer.speak(line) {
                println!("  (not listening, press /mic)");
            }
        }
    }

    Ok(true)
}
