//! Two-step autoplay policy: attempt unmuted, retry muted, then escalate.
//!
//! Platform audio policy commonly rejects unmuted autoplay. The retry runs
//! muted and schedules an asynchronous unmute once playback has started; a
//! second rejection escalates to a fatal playback error.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayStage {
    Unmuted,
    Muted,
    Escalated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayDecision {
    /// Retry the attempt with the output muted, unmuting asynchronously
    /// after playback starts.
    RetryMuted,
    /// Both attempts rejected, surface a fatal error.
    Escalate,
}

#[derive(Debug, Clone, Copy)]
pub struct AutoplayPolicy {
    stage: AutoplayStage,
}

impl AutoplayPolicy {
    pub fn new() -> Self {
        Self {
            stage: AutoplayStage::Unmuted,
        }
    }

    pub fn stage(&self) -> AutoplayStage {
        self.stage
    }

    /// Whether the current attempt should run muted.
    pub fn muted(&self) -> bool {
        self.stage == AutoplayStage::Muted
    }

    /// A muted attempt that succeeds owes the session an unmute afterwards.
    pub fn unmute_after_start(&self) -> bool {
        self.stage == AutoplayStage::Muted
    }

    pub fn on_rejected(&mut self) -> AutoplayDecision {
        match self.stage {
            AutoplayStage::Unmuted => {
                self.stage = AutoplayStage::Muted;
                AutoplayDecision::RetryMuted
            }
            AutoplayStage::Muted | AutoplayStage::Escalated => {
                self.stage = AutoplayStage::Escalated;
                AutoplayDecision::Escalate
            }
        }
    }
}

impl Default for AutoplayPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_is_unmuted() {
        let policy = AutoplayPolicy::new();
        assert_eq!(policy.stage(), AutoplayStage::Unmuted);
        assert!(!policy.muted());
        assert!(!policy.unmute_after_start());
    }

    #[test]
    fn rejection_retries_muted_then_escalates() {
        let mut policy = AutoplayPolicy::new();
        assert_eq!(policy.on_rejected(), AutoplayDecision::RetryMuted);
        assert!(policy.muted());
        assert!(policy.unmute_after_start());
        assert_eq!(policy.on_rejected(), AutoplayDecision::Escalate);
        assert_eq!(policy.stage(), AutoplayStage::Escalated);
    }
}
