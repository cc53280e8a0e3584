//! MAITRI - Emotion-aware voice assistant for crew support
//!
//! This library provides both halves of the assistant:
//! - The gateway: `/chat` (emotion-aware completions via OpenRouter) and `/report`
//! - The session: face identity and emotion tracking, wake word control,
//!   dialogue dispatch, speech playback, reports, and a breathing exercise
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  Assistant session                    │
//! │  Face sensor │ Recognizer │ Speech engine │ Controls  │
//! │        └──────── select! loop (SessionState) ───────┘ │
//! └──────────────────────────┬───────────────────────────┘
//!                            │ HTTP
//! ┌──────────────────────────▼───────────────────────────┐
//! │                   MAITRI gateway                      │
//! │            /chat   │   /report   │   /health          │
//! └──────────────────────────┬───────────────────────────┘
//!                            │
//! ┌──────────────────────────▼───────────────────────────┐
//! │              OpenRouter chat completions              │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod assistant;
pub mod breathing;
pub mod config;
pub mod console;
pub mod dialogue;
pub mod error;
pub mod providers;
pub mod report;
pub mod session;
pub mod vision;
pub mod voice;

pub use assistant::{Assistant, AssistantHandle, Capabilities, Control};
pub use config::Config;
pub use dialogue::{Dispatcher, FALLBACK_REPLY};
pub use error::{Error, Result};
pub use providers::{ChatBackend, ChatRequest, GatewayClient, OpenRouterClient};
pub use report::{ReportError, ReportPanel, ReportRelay, ReportSink};
pub use session::{DialogueContext, EmotionLabel, SessionState, Transcript, Utterance};
