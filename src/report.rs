//! Crew reports: local validation, relay to a sink, and the report panel

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::{Error, Result};

/// Shown when the report text is blank
pub const EMPTY_REPORT: &str = "Please enter a report before submitting.";

/// Shown when the sink fails without a message of its own
pub const REPORT_FAILED: &str = "Failed to submit report.";

/// Shown after a successful submission
pub const REPORT_SUBMITTED: &str = "Report submitted successfully!";

/// Destination for submitted reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Record one report
    ///
    /// # Errors
    ///
    /// `Error::Report(message)` carries a message meant for the user; any other
    /// error is reported generically
    async fn submit(&self, report: &str) -> Result<()>;
}

/// Header logged above each received report
pub const REPORT_BANNER: &str = "--- DAILY REPORT RECEIVED ---";

/// Writes reports to the log inside a banner
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReportLog;

#[async_trait]
impl ReportSink for TracingReportLog {
    async fn submit(&self, report: &str) -> Result<()> {
        tracing::info!("{REPORT_BANNER}");
        tracing::info!(report, "crew report");
        tracing::info!("{}", "-".repeat(REPORT_BANNER.len()));
        Ok(())
    }
}

/// Why a report was not accepted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    /// Nothing to send
    #[error("Please enter a report before submitting.")]
    Empty,

    /// The sink refused; message is user-facing
    #[error("{0}")]
    Rejected(String),
}

/// Validates reports and forwards them to a sink
#[derive(Clone)]
pub struct ReportRelay {
    sink: Arc<dyn ReportSink>,
}

impl ReportRelay {
    #[must_use]
    pub fn new(sink: Arc<dyn ReportSink>) -> Self {
        Self { sink }
    }

    /// Submit a report
    ///
    /// Returns the confirmation text on success.
    ///
    /// # Errors
    ///
    /// `ReportError::Empty` for blank input (the sink is not called),
    /// `ReportError::Rejected` when the sink fails
    pub async fn submit(&self, text: &str) -> std::result::Result<&'static str, ReportError> {
        if text.trim().is_empty() {
            return Err(ReportError::Empty);
        }

        match self.sink.submit(text).await {
            Ok(()) => {
                tracing::info!(chars = text.len(), "report submitted");
                Ok(REPORT_SUBMITTED)
            }
            Err(Error::Report(message)) if !message.trim().is_empty() => {
                tracing::warn!(%message, "report rejected");
                Err(ReportError::Rejected(message))
            }
            Err(e) => {
                tracing::warn!(error = %e, "report submission failed");
                Err(ReportError::Rejected(REPORT_FAILED.to_string()))
            }
        }
    }
}

/// Snapshot of the report panel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelView {
    pub open: bool,
    pub text: String,
    pub status: String,
}

#[derive(Default)]
struct PanelState {
    view: PanelView,
    generation: u64,
}

/// Report entry surface: open/close, text, status line
///
/// Clones share the same panel.
#[derive(Clone)]
pub struct ReportPanel {
    relay: ReportRelay,
    dismiss_after: Duration,
    state: Arc<Mutex<PanelState>>,
}

impl ReportPanel {
    #[must_use]
    pub fn new(relay: ReportRelay, dismiss_after: Duration) -> Self {
        Self {
            relay,
            dismiss_after,
            state: Arc::new(Mutex::new(PanelState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open(&self) {
        let mut state = self.state();
        state.generation += 1;
        state.view.open = true;
    }

    /// Close and clear the text and status line
    pub fn close(&self) {
        let mut state = self.state();
        state.generation += 1;
        state.view = PanelView::default();
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.state().view.text = text.into();
    }

    #[must_use]
    pub fn view(&self) -> PanelView {
        self.state().view.clone()
    }

    /// Submit the current text
    ///
    /// On success the panel closes after the dismiss delay, unless it was
    /// reopened or closed in the meantime.
    ///
    /// # Errors
    ///
    /// Returns the relay's error; the status line shows it
    pub async fn submit(&self) -> std::result::Result<(), ReportError> {
        let text = {
            let mut state = self.state();
            if state.view.text.trim().is_empty() {
                state.view.status = EMPTY_REPORT.to_string();
                return Err(ReportError::Empty);
            }
            state.view.status = "Submitting...".to_string();
            state.view.text.clone()
        };

        match self.relay.submit(&text).await {
            Ok(confirmation) => {
                let generation = {
                    let mut state = self.state();
                    state.view.status = confirmation.to_string();
                    state.generation
                };
                let panel = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(panel.dismiss_after).await;
                    let mut state = panel.state();
                    if state.generation == generation {
                        state.generation += 1;
                        state.view = PanelView::default();
                    }
                });
                Ok(())
            }
            Err(e) => {
                let mut state = self.state();
                state.view.status = match &e {
                    ReportError::Empty => EMPTY_REPORT.to_string(),
                    ReportError::Rejected(message) => format!("Error: {message}"),
                };
                Err(e)
            }
        }
    }
}
