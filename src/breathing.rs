//! Guided box-breathing exercise

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Time spent in each phase
pub const PHASE_DURATION: Duration = Duration::from_secs(4);

/// Instruction shown while the exercise is not running
pub const GET_READY: &str = "Get Ready...";

/// One step of the breathing cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreathPhase {
    Inhale,
    HoldIn,
    Exhale,
    HoldOut,
}

impl BreathPhase {
    /// Full cycle in order
    pub const CYCLE: [Self; 4] = [Self::Inhale, Self::HoldIn, Self::Exhale, Self::HoldOut];

    #[must_use]
    pub const fn instruction(self) -> &'static str {
        match self {
            Self::Inhale => "Breathe In...",
            Self::HoldIn | Self::HoldOut => "Hold",
            Self::Exhale => "Breathe Out...",
        }
    }
}

/// What the pacer displays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacerView {
    pub instruction: &'static str,
    /// Pacer grown (inhaled) or at rest
    pub expanded: bool,
}

impl Default for PacerView {
    fn default() -> Self {
        Self {
            instruction: GET_READY,
            expanded: false,
        }
    }
}

impl PacerView {
    fn enter(&mut self, phase: BreathPhase) {
        self.instruction = phase.instruction();
        match phase {
            BreathPhase::Inhale => self.expanded = true,
            BreathPhase::Exhale => self.expanded = false,
            BreathPhase::HoldIn | BreathPhase::HoldOut => {}
        }
    }
}

/// Drives the breathing cycle and publishes the current view
pub struct BreathingPacer {
    view: watch::Sender<PacerView>,
    phase_duration: Duration,
    cycle: Option<JoinHandle<()>>,
}

impl Default for BreathingPacer {
    fn default() -> Self {
        Self::new(PHASE_DURATION)
    }
}

impl BreathingPacer {
    #[must_use]
    pub fn new(phase_duration: Duration) -> Self {
        let (view, _) = watch::channel(PacerView::default());
        Self {
            view,
            phase_duration,
            cycle: None,
        }
    }

    /// Watch the pacer view
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PacerView> {
        self.view.subscribe()
    }

    #[must_use]
    pub fn view(&self) -> PacerView {
        *self.view.borrow()
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.cycle.is_some()
    }

    /// Start the exercise at "Breathe In..."; no-op if running
    pub fn start(&mut self) {
        if self.cycle.is_some() {
            return;
        }

        self.view.send_modify(|view| view.enter(BreathPhase::Inhale));

        let view = self.view.clone();
        let period = self.phase_duration;
        self.cycle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            for phase in BreathPhase::CYCLE.into_iter().cycle().skip(1) {
                ticker.tick().await;
                view.send_modify(|v| v.enter(phase));
            }
        }));

        tracing::debug!("breathing exercise started");
    }

    /// Stop and reset to "Get Ready..."
    pub fn stop(&mut self) {
        if let Some(cycle) = self.cycle.take() {
            cycle.abort();
            tracing::debug!("breathing exercise stopped");
        }
        self.view.send_replace(PacerView::default());
    }

    /// Start if stopped, stop if running
    pub fn toggle(&mut self) {
        if self.is_running() {
            self.stop();
        } else {
            self.start();
        }
    }
}

impl Drop for BreathingPacer {
    fn drop(&mut self) {
        if let Some(cycle) = self.cycle.take() {
            cycle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn cycles_through_phases() {
        let mut pacer = BreathingPacer::default();
        assert_eq!(pacer.view().instruction, GET_READY);

        pacer.start();
        assert_eq!(
            pacer.view(),
            PacerView {
                instruction: "Breathe In...",
                expanded: true
            }
        );

        sleep(Duration::from_millis(4010)).await;
        assert_eq!(pacer.view(), PacerView { instruction: "Hold", expanded: true });

        sleep(Duration::from_secs(4)).await;
        assert_eq!(
            pacer.view(),
            PacerView {
                instruction: "Breathe Out...",
                expanded: false
            }
        );

        sleep(Duration::from_secs(4)).await;
        assert_eq!(pacer.view(), PacerView { instruction: "Hold", expanded: false });

        sleep(Duration::from_secs(4)).await;
        assert_eq!(pacer.view().instruction, "Breathe In...");
        assert!(pacer.view().expanded);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_resets_instruction() {
        let mut pacer = BreathingPacer::default();
        pacer.toggle();
        sleep(Duration::from_secs(9)).await;
        assert!(pacer.is_running());

        pacer.toggle();
        assert!(!pacer.is_running());
        assert_eq!(pacer.view(), PacerView::default());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(pacer.view().instruction, GET_READY);
    }
}
