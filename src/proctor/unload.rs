//! Reload and navigation attempt detection

use web_time::Duration;

use crate::{
    controller::SessionState,
    session::{Capability, Platform},
};

use super::{SignalSource, ViolationKind};

/// Reports attempts to reload, close or leave the exam page
#[derive(Debug, Clone, Default)]
pub struct UnloadSource {
    running: bool,
}

impl UnloadSource {
    /// Handles a navigation attempt
    ///
    /// # Returns
    ///
    /// The violation, if any, and whether the host should ask the student
    /// to confirm leaving the page
    pub fn observe(&mut self, state: SessionState) -> (Option<ViolationKind>, bool) {
        if !self.running {
            return (None, false);
        }
        match state {
            SessionState::Active => (Some(ViolationKind::Reload), true),
            // an attempt mid submission is not a violation, but leaving now could lose it
            SessionState::Submitting => (None, true),
            SessionState::Submitted => (None, false),
        }
    }
}

impl SignalSource for UnloadSource {
    fn start<P: Platform, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        platform: &P,
        _schedule_message: S,
    ) {
        if !self.running {
            platform.subscribe(Capability::Unload);
            self.running = true;
        }
    }

    fn stop<P: Platform>(&mut self, platform: &P) {
        if self.running {
            platform.unsubscribe(Capability::Unload);
            self.running = false;
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::session::tests::MockPlatform;

    #[test]
    fn test_unload_attempt() {
        let platform = MockPlatform::new();
        let mut source = UnloadSource::default();
        source.start(&platform, |_, _| {});

        assert_eq!(
            source.observe(SessionState::Active),
            (Some(ViolationKind::Reload), true)
        );
        assert_eq!(source.observe(SessionState::Submitting), (None, true));
        assert_eq!(source.observe(SessionState::Submitted), (None, false));
    }

    #[test]
    fn test_stopped_source_lets_the_page_go() {
        let platform = MockPlatform::new();
        let mut source = UnloadSource::default();
        source.start(&platform, |_, _| {});
        source.stop(&platform);

        assert!(!platform.is_subscribed(Capability::Unload));
        assert_eq!(source.observe(SessionState::Active), (None, false));
    }
}
