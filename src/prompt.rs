//! Install-Prompt Collaborator Interface
//!
//! The install control itself lives in the UI; this core only exchanges
//! two signals with it. `make_available` latches that the host deemed
//! the application installable (enabling the UI control), and
//! `record_outcome` stores the user's choice for the record. The
//! outcome is informational only; nothing in the agent consumes it.

/// The user's answer to the install prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    Accepted,
    Dismissed,
}

/// Install prompt availability latch and outcome record.
pub struct InstallPrompt {
    available: bool,
    last_outcome: Option<PromptOutcome>,
}

impl InstallPrompt {
    pub fn new() -> Self {
        Self {
            available: false,
            last_outcome: None,
        }
    }

    /// Latch prompt availability. Idempotent.
    pub fn make_available(&mut self) {
        self.available = true;
    }

    /// Whether the UI may show its install control.
    pub fn available(&self) -> bool {
        self.available
    }

    /// Record the outcome reported by the UI. Clears availability so
    /// the control is not offered again this session.
    pub fn record_outcome(&mut self, outcome: PromptOutcome) {
        log::info!("install prompt outcome: {:?}", outcome);
        self.last_outcome = Some(outcome);
        self.available = false;
    }

    /// The most recent recorded outcome, if any.
    pub fn last_outcome(&self) -> Option<PromptOutcome> {
        self.last_outcome
    }
}

impl Default for InstallPrompt {
    fn default() -> Self {
        Self::new()
    }
}
