//! Assistant session integration tests
//!
//! Runs the full session loop against in-process capabilities.

use std::sync::Arc;
use std::time::Duration;

use maitri::api::ApiServerBuilder;
use maitri::config::AssistantConfig;
use maitri::console::LineRecognizer;
use maitri::report::{EMPTY_REPORT, REPORT_SUBMITTED};
use maitri::session::Sender;
use maitri::vision::{FaceSensor, ReplayFaceSensor};
use maitri::voice::RecognitionError;
use maitri::{
    Assistant, AssistantHandle, Capabilities, ChatBackend, EmotionLabel, FALLBACK_REPLY,
    GatewayClient, ReportError, ReportSink, SessionState, Utterance,
};
use tokio::sync::broadcast;

mod common;
use common::{MockChat, RecordingSink, RecordingSpeech, no_indicator, spawn_server};

struct Session {
    handle: AssistantHandle,
    recognizer: LineRecognizer,
    speech: Arc<RecordingSpeech>,
    transcript: broadcast::Receiver<Utterance>,
    task: tokio::task::JoinHandle<maitri::Result<()>>,
}

fn start(
    config: &AssistantConfig,
    sensor: Option<Arc<dyn FaceSensor>>,
    chat: Arc<dyn ChatBackend>,
    reports: Arc<dyn ReportSink>,
) -> Session {
    let recognizer = LineRecognizer::new();
    let speech = RecordingSpeech::new();
    let caps = Capabilities {
        sensor,
        recognizer: Arc::new(recognizer.clone()),
        speech: speech.clone(),
        indicator: no_indicator(),
        chat,
        reports,
    };

    let (assistant, handle) = Assistant::new(config, caps).unwrap();
    let transcript = handle.transcript().subscribe();
    let task = tokio::spawn(assistant.run());

    Session {
        handle,
        recognizer,
        speech,
        transcript,
        task,
    }
}

impl Session {
    async fn wait_for(&self, condition: impl FnMut(&SessionState) -> bool) {
        let mut state = self.handle.watch_state();
        tokio::time::timeout(Duration::from_secs(10), state.wait_for(condition))
            .await
            .expect("timed out waiting for session state")
            .unwrap();
    }

    async fn next_utterance(&mut self) -> Utterance {
        tokio::time::timeout(Duration::from_secs(10), self.transcript.recv())
            .await
            .expect("timed out waiting for transcript")
            .unwrap()
    }

    async fn stop(self) {
        self.handle.shutdown().await.unwrap();
        self.task.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_wake_word_greets_and_dispatches_command() {
    let chat = MockChat::replying("Cabin pressure is nominal.");
    let mut session = start(
        &AssistantConfig::default(),
        None,
        chat.clone(),
        RecordingSink::new(),
    );
    session.wait_for(|s| s.mic_active).await;

    assert!(session.recognizer.speak("hey maitri what is the cabin pressure"));

    let greeting = session.next_utterance().await;
    assert_eq!(greeting.sender, Sender::Assistant);
    assert_eq!(greeting.text, "Hey Crew Member, how can I assist you today?");

    let user = session.next_utterance().await;
    assert_eq!(user.sender, Sender::User);
    assert_eq!(user.text, "what is the cabin pressure");

    let reply = session.next_utterance().await;
    assert_eq!(reply.sender, Sender::Assistant);
    assert_eq!(reply.text, "Cabin pressure is nominal.");

    let requests = chat.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].emotion, "neutral");
    assert_eq!(requests[0].name, "Crew Member");

    session.wait_for(|s| !s.awaiting_command).await;
    session.stop().await;
}

#[tokio::test]
async fn test_gateway_failure_falls_back_in_order() {
    // Gateway whose upstream always fails answers 500
    let base = spawn_server(
        ApiServerBuilder::new(MockChat::failing(), 0)
            .build()
            .router(),
    )
    .await;
    let gateway = Arc::new(GatewayClient::new(base));

    let mut session = start(
        &AssistantConfig::default(),
        None,
        gateway.clone(),
        gateway,
    );
    session.wait_for(|s| s.mic_active).await;

    session.handle.typed("  hello?  ").await.unwrap();

    let user = session.next_utterance().await;
    assert_eq!((user.sender, user.text.as_str()), (Sender::User, "hello?"));

    let reply = session.next_utterance().await;
    assert_eq!(reply.sender, Sender::Assistant);
    assert_eq!(reply.text, FALLBACK_REPLY);

    // Spoken after it was appended
    tokio::time::timeout(Duration::from_secs(5), async {
        while session.speech.spoken().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(session.speech.spoken(), [FALLBACK_REPLY]);

    session.stop().await;
}

#[tokio::test]
async fn test_blank_typed_input_is_ignored() {
    let chat = MockChat::replying("hi");
    let mut session = start(
        &AssistantConfig::default(),
        None,
        chat.clone(),
        RecordingSink::new(),
    );

    session.handle.typed("   ").await.unwrap();
    session.handle.typed("ping").await.unwrap();

    assert_eq!(session.next_utterance().await.text, "ping");
    assert_eq!(chat.requests().len(), 1);

    session.stop().await;
}

#[tokio::test]
async fn test_network_failure_waits_for_mic() {
    let chat = MockChat::replying("Oxygen at 21 percent.");
    let mut session = start(
        &AssistantConfig::default(),
        None,
        chat.clone(),
        RecordingSink::new(),
    );
    session.wait_for(|s| s.mic_active).await;

    session.recognizer.end_session(Some(RecognitionError::Network));
    session.wait_for(|s| !s.mic_active).await;
    assert!(!session.recognizer.speak("hey maitri are you there"));

    // Mic button restarts and arms without the wake phrase
    session.handle.mic().await.unwrap();
    session.wait_for(|s| s.mic_active && s.awaiting_command).await;
    assert_eq!(
        session.next_utterance().await.text,
        "Hey Crew Member, how can I assist you today?"
    );

    assert!(session.recognizer.speak("check oxygen"));
    assert_eq!(session.next_utterance().await.text, "check oxygen");
    assert_eq!(session.next_utterance().await.text, "Oxygen at 21 percent.");

    session.stop().await;
}

#[tokio::test]
async fn test_face_samples_drive_greeting_and_context() {
    let dir = tempfile::tempdir().unwrap();
    let references = dir.path().join("faces.json");
    std::fs::write(
        &references,
        r#"[{"label": "Vaibhav", "descriptors": [[0.1, 0.2, 0.3]]}]"#,
    )
    .unwrap();

    let sensor = ReplayFaceSensor::parse(
        r#"{"expressions": {"happy": 0.82, "neutral": 0.1}, "descriptor": [0.1, 0.2, 0.31]}"#,
    )
    .unwrap();

    let config = AssistantConfig {
        face_references: Some(references),
        sample_interval: Duration::from_millis(20),
        ..AssistantConfig::default()
    };

    let chat = MockChat::replying("Glad you're in good spirits!");
    let mut session = start(
        &config,
        Some(Arc::new(sensor)),
        chat.clone(),
        RecordingSink::new(),
    );
    session
        .wait_for(|s| s.identified_user == "Vaibhav" && s.face_present && s.mic_active)
        .await;

    let status = session.handle.state().tracker_status();
    assert_eq!(
        status.to_string(),
        "Emotion: Happy | Confidence: 82% | Physical State: Active"
    );

    session.recognizer.speak("hey maitri good morning");
    assert_eq!(
        session.next_utterance().await.text,
        "Hey Vaibhav, how can I assist you today?"
    );
    assert_eq!(session.next_utterance().await.text, "good morning");
    session.next_utterance().await;

    let requests = chat.requests();
    assert_eq!(requests[0].emotion, "happy");
    assert_eq!(requests[0].name, "Vaibhav");

    session.stop().await;
}

#[tokio::test]
async fn test_zero_sample_interval_keeps_sampling() {
    let sensor = ReplayFaceSensor::parse(r#"{"expressions": {"sad": 0.7}}"#).unwrap();
    let config = AssistantConfig {
        sample_interval: Duration::ZERO,
        speech_poll: Duration::ZERO,
        ..AssistantConfig::default()
    };

    let session = start(
        &config,
        Some(Arc::new(sensor)),
        MockChat::replying("hi"),
        RecordingSink::new(),
    );
    session
        .wait_for(|s| s.face_present && s.active_emotion == EmotionLabel::Sad)
        .await;

    session.stop().await;
}

#[tokio::test]
async fn test_missing_camera_sets_notice() {
    let session = start(
        &AssistantConfig::default(),
        None,
        MockChat::replying("hi"),
        RecordingSink::new(),
    );

    let state = session.handle.state();
    assert!(state.notice.is_some());
    assert_eq!(state.tracker_status().physical_state, "Inactive");

    session.stop().await;
}

#[tokio::test]
async fn test_reports_through_session() {
    let sink = RecordingSink::new();
    let session = start(
        &AssistantConfig::default(),
        None,
        MockChat::replying("hi"),
        sink.clone(),
    );

    let outcome = session.handle.report("   ").await.unwrap();
    assert_eq!(outcome, Err(ReportError::Empty));
    assert_eq!(session.handle.report_panel().view().status, EMPTY_REPORT);
    assert!(sink.reports().is_empty());

    let outcome = session.handle.report("Sleep schedule disrupted").await.unwrap();
    assert_eq!(outcome, Ok(()));
    assert_eq!(session.handle.report_panel().view().status, REPORT_SUBMITTED);
    assert_eq!(sink.reports(), ["Sleep schedule disrupted"]);

    session.stop().await;
}

#[tokio::test]
async fn test_breathing_toggle() {
    let session = start(
        &AssistantConfig::default(),
        None,
        MockChat::replying("hi"),
        RecordingSink::new(),
    );
    let mut breathing = session.handle.watch_breathing();

    session.handle.breathe().await.unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        breathing.wait_for(|view| view.instruction == "Breathe In..." && view.expanded),
    )
    .await
    .unwrap()
    .unwrap();

    session.handle.breathe().await.unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        breathing.wait_for(|view| view.instruction == "Get Ready..." && !view.expanded),
    )
    .await
    .unwrap()
    .unwrap();

    session.stop().await;
}
