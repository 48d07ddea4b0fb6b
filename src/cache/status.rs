//! Per-ABI `CacheStatus` state machine (§3, §4.8). Transitions via
//! `mark_available`/`mark_unavailable`/`mark_restored` are monotonic:
//! `Unknown -> Available -> Restored`, never backwards, and the
//! unavailable-provider list never shrinks (§8 property 8).
//!
//! The one documented exception is [`CacheStatus::restore_failed`]: per §7,
//! "only `try_restore` converts a provider-declared success into an
//! 'unavailable' if the decompress fails" -- that is, a provider can report
//! an object as present (`Available`) and then fail to actually produce
//! usable bytes, which must fall back to the next provider (scenario S7).
//! That regression is modeled as its own operation rather than as a
//! generic `mark_unavailable`, which stays a true no-op outside `Unknown`
//! as the state machine in §4.8 literally specifies.

use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Eq)]
enum State {
    Unknown,
    Available { provider: String },
    Restored,
}

#[derive(Clone, Debug)]
pub struct CacheStatus {
    state: State,
    unavailable: HashSet<String>,
    total_known_providers: usize,
}

impl CacheStatus {
    pub fn new(total_known_providers: usize) -> Self {
        CacheStatus {
            state: State::Unknown,
            unavailable: HashSet::new(),
            total_known_providers,
        }
    }

    pub fn is_restored(&self) -> bool {
        matches!(self.state, State::Restored)
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, State::Available { .. } | State::Restored)
    }

    /// True once every configured provider has already said "not found" for
    /// this ABI, so a `try_restore` loop can stop asking (supplemented
    /// feature: the original's `CacheStatus::is_unavailable`).
    pub fn is_unavailable(&self) -> bool {
        matches!(self.state, State::Unknown) && self.unavailable.len() >= self.total_known_providers
    }

    pub fn should_attempt_precheck(&self, provider: &str) -> bool {
        matches!(self.state, State::Unknown) && !self.unavailable.contains(provider)
    }

    pub fn should_attempt_restore(&self, provider: &str) -> bool {
        match &self.state {
            State::Unknown => !self.unavailable.contains(provider),
            State::Available { provider: recorded } => recorded == provider,
            State::Restored => false,
        }
    }

    /// No-op outside `Unknown`, per §4.8's state table.
    pub fn mark_unavailable(&mut self, provider: &str) {
        if matches!(self.state, State::Unknown) {
            self.unavailable.insert(provider.to_string());
        }
    }

    pub fn mark_available(&mut self, provider: &str) {
        if matches!(self.state, State::Unknown) {
            self.state = State::Available { provider: provider.to_string() };
        }
    }

    pub fn mark_restored(&mut self) {
        self.state = State::Restored;
    }

    /// A provider claimed this ABI was available but the subsequent
    /// download/decompress failed: demote back to `Unknown` with that
    /// provider recorded unavailable, so the next provider gets a turn.
    /// No-op if already `Restored`.
    pub fn restore_failed(&mut self, provider: &str) {
        match &self.state {
            State::Restored => {}
            State::Available { provider: recorded } if recorded == provider => {
                self.state = State::Unknown;
                self.unavailable.insert(provider.to_string());
            }
            State::Available { .. } => {}
            State::Unknown => {
                self.unavailable.insert(provider.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s7_prefetch_ordering() {
        let mut status = CacheStatus::new(2);
        assert!(status.should_attempt_precheck("p1"));
        status.mark_available("p1");
        assert!(status.is_available());
        assert!(status.should_attempt_restore("p1"));
        assert!(!status.should_attempt_restore("p2"));

        status.restore_failed("p1");
        assert!(!status.is_available());
        assert!(status.should_attempt_restore("p2"));

        status.mark_restored();
        assert!(status.is_restored());
        assert!(!status.should_attempt_restore("p2"));
    }

    #[test]
    fn unavailable_list_never_shrinks_and_never_regresses_from_restored() {
        let mut status = CacheStatus::new(1);
        status.mark_unavailable("p1");
        status.mark_restored();
        status.mark_unavailable("p1"); // no-op, but must not panic or revert
        status.restore_failed("p1"); // also a no-op once Restored
        assert!(status.is_restored());
    }

    #[test]
    fn is_unavailable_once_every_provider_has_declined() {
        let mut status = CacheStatus::new(2);
        status.mark_unavailable("p1");
        assert!(!status.is_unavailable());
        status.mark_unavailable("p2");
        assert!(status.is_unavailable());
    }

    #[test]
    fn mark_unavailable_is_a_true_noop_once_available() {
        let mut status = CacheStatus::new(2);
        status.mark_available("p1");
        status.mark_unavailable("p1");
        assert!(status.should_attempt_restore("p1"));
    }
}
