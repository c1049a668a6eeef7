//! Session lifecycle state machine.
//!
//! `NotStarted → Active → Submitting → Completed`, with `Stopped` reachable
//! from any non-completed state on teardown. Pure and deterministic: the
//! async controller holds one of these behind a lock and asks it whether a
//! transition may proceed.

use crate::error::{ProctorError, Result};
use crate::types::SessionStatus;

/// Answer to "may this caller run the Submission Transition now?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitGate {
    /// Caller owns the transition. `retry` is true when a previous attempt failed.
    Proceed { retry: bool },
    /// Another caller is already running the transition.
    InFlight,
    /// Session already completed or stopped; nothing to do.
    Finished,
    /// Session never became active.
    NotStarted,
}

#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    status: SessionStatus,
    in_flight: bool,
    failed_attempts: u32,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// `NotStarted → Active`.
    pub fn activate(&mut self) -> Result<()> {
        if self.status != SessionStatus::NotStarted {
            return Err(ProctorError::InvalidTransition {
                from: self.status,
                to: SessionStatus::Active,
            });
        }
        self.status = SessionStatus::Active;
        Ok(())
    }

    /// Claim the Submission Transition. At most one caller holds it at a time,
    /// and nobody gets it once the session is finished.
    pub fn begin_submit(&mut self) -> SubmitGate {
        match self.status {
            SessionStatus::NotStarted => SubmitGate::NotStarted,
            SessionStatus::Completed | SessionStatus::Stopped => SubmitGate::Finished,
            SessionStatus::Submitting if self.in_flight => SubmitGate::InFlight,
            SessionStatus::Active | SessionStatus::Submitting => {
                let retry = self.status == SessionStatus::Submitting;
                self.status = SessionStatus::Submitting;
                self.in_flight = true;
                SubmitGate::Proceed { retry }
            }
        }
    }

    /// Release the claim after a failed attempt. Status stays `Submitting`
    /// (monitors are already down) so the next `begin_submit` is a retry.
    pub fn fail_submit(&mut self) {
        if self.status == SessionStatus::Submitting {
            self.in_flight = false;
            self.failed_attempts += 1;
        }
    }

    /// `Submitting → Completed`.
    pub fn complete(&mut self) -> Result<()> {
        if self.status != SessionStatus::Submitting || !self.in_flight {
            return Err(ProctorError::InvalidTransition {
                from: self.status,
                to: SessionStatus::Completed,
            });
        }
        self.status = SessionStatus::Completed;
        self.in_flight = false;
        Ok(())
    }

    /// Abandon the attempt. Returns false when already terminal or while a
    /// submission is in flight (the submitting caller finishes the transition).
    pub fn stop(&mut self) -> bool {
        if self.status.is_terminal() || self.in_flight {
            return false;
        }
        self.status = SessionStatus::Stopped;
        self.in_flight = false;
        true
    }

    /// Warnings and answer edits are only accepted while active.
    pub fn accepts_warnings(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active() -> Lifecycle {
        let mut lc = Lifecycle::new();
        lc.activate().expect("activate");
        lc
    }

    #[test]
    fn happy_path() {
        let mut lc = active();
        assert_eq!(lc.status(), SessionStatus::Active);
        assert_eq!(lc.begin_submit(), SubmitGate::Proceed { retry: false });
        assert_eq!(lc.status(), SessionStatus::Submitting);
        lc.complete().expect("complete");
        assert_eq!(lc.status(), SessionStatus::Completed);
    }

    #[test]
    fn concurrent_submit_is_rejected_while_in_flight() {
        let mut lc = active();
        assert_eq!(lc.begin_submit(), SubmitGate::Proceed { retry: false });
        assert_eq!(lc.begin_submit(), SubmitGate::InFlight);
        lc.complete().expect("complete");
        assert_eq!(lc.begin_submit(), SubmitGate::Finished);
    }

    #[test]
    fn failed_submit_can_be_retried() {
        let mut lc = active();
        lc.begin_submit();
        lc.fail_submit();
        assert_eq!(lc.status(), SessionStatus::Submitting);
        assert_eq!(lc.failed_attempts(), 1);
        assert!(!lc.accepts_warnings());
        assert_eq!(lc.begin_submit(), SubmitGate::Proceed { retry: true });
        lc.complete().expect("complete");
        assert_eq!(lc.status(), SessionStatus::Completed);
    }

    #[test]
    fn cannot_submit_before_start() {
        let mut lc = Lifecycle::new();
        assert_eq!(lc.begin_submit(), SubmitGate::NotStarted);
        assert!(lc.complete().is_err());
    }

    #[test]
    fn activate_twice_is_invalid() {
        let mut lc = active();
        let err = lc.activate().unwrap_err();
        assert_eq!(
            err,
            ProctorError::InvalidTransition {
                from: SessionStatus::Active,
                to: SessionStatus::Active,
            }
        );
    }

    #[test]
    fn stop_does_not_override_completed() {
        let mut lc = active();
        lc.begin_submit();
        lc.complete().expect("complete");
        assert!(!lc.stop());
        assert_eq!(lc.status(), SessionStatus::Completed);

        let mut abandoned = active();
        assert!(abandoned.stop());
        assert_eq!(abandoned.status(), SessionStatus::Stopped);
        assert_eq!(abandoned.begin_submit(), SubmitGate::Finished);
    }

    #[test]
    fn stop_defers_to_in_flight_submission() {
        let mut lc = active();
        lc.begin_submit();
        assert!(!lc.stop());
        assert_eq!(lc.status(), SessionStatus::Submitting);
        lc.fail_submit();
        assert!(lc.stop());
        assert_eq!(lc.status(), SessionStatus::Stopped);
    }

    #[test]
    fn warnings_only_while_active() {
        let mut lc = Lifecycle::new();
        assert!(!lc.accepts_warnings());
        lc.activate().expect("activate");
        assert!(lc.accepts_warnings());
        lc.begin_submit();
        assert!(!lc.accepts_warnings());
    }
}
