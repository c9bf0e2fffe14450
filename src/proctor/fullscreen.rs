//! Fullscreen enforcement

use tracing::{debug, warn};
use web_time::Duration;

use crate::{
    controller::SessionState,
    session::{Capability, Platform},
};

use super::{SignalSource, ViolationKind};

/// Requests fullscreen on start and reports every exit while the session is active
///
/// After an exit it asks for fullscreen again. A failed request is logged
/// and left for the next exit or the next start.
#[derive(Debug, Clone, Default)]
pub struct FullscreenSource {
    running: bool,
    /// A re-request is outstanding; exits before it settles are one exit
    recovering: bool,
}

impl FullscreenSource {
    /// Handles a fullscreen change
    pub fn observe<P: Platform>(
        &mut self,
        active: bool,
        state: SessionState,
        platform: &P,
    ) -> Option<ViolationKind> {
        if !self.running {
            return None;
        }
        if active {
            self.recovering = false;
            return None;
        }
        if state != SessionState::Active {
            return None;
        }
        if self.recovering {
            debug!("fullscreen exit while recovering, not counted again");
            return None;
        }
        self.recovering = true;
        platform.request_fullscreen();
        Some(ViolationKind::FullscreenExit)
    }

    /// Handles a rejected fullscreen request
    pub fn request_failed(&mut self) {
        if self.running {
            warn!("fullscreen request was rejected");
            self.recovering = false;
        }
    }
}

impl SignalSource for FullscreenSource {
    fn start<P: Platform, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        platform: &P,
        _schedule_message: S,
    ) {
        if !self.running {
            platform.subscribe(Capability::Fullscreen);
            platform.request_fullscreen();
            self.running = true;
            self.recovering = false;
        }
    }

    fn stop<P: Platform>(&mut self, platform: &P) {
        if self.running {
            platform.unsubscribe(Capability::Fullscreen);
            platform.exit_fullscreen();
            self.running = false;
            self.recovering = false;
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
    fn test_start_requests_fullscreen() {
        let platform = MockPlatform::new();
        let mut source = FullscreenSource::default();
        source.start(&platform, |_, _| {});

        assert!(platform.is_subscribed(Capability::Fullscreen));
        assert_eq!(platform.fullscreen_requests(), 1);
    }

    #[test]
    fn test_exit_is_reported_and_recovered() {
        let platform = MockPlatform::new();
        let mut source = FullscreenSource::default();
        source.start(&platform, |_, _| {});

        assert_eq!(
            source.observe(false, SessionState::Active, &platform),
            Some(ViolationKind::FullscreenExit)
        );
        assert_eq!(platform.fullscreen_requests(), 2);

        // duplicate exit notification before the re-request settles
        assert_eq!(source.observe(false, SessionState::Active, &platform), None);

        assert_eq!(source.observe(true, SessionState::Active, &platform), None);
        assert_eq!(
            source.observe(false, SessionState::Active, &platform),
            Some(ViolationKind::FullscreenExit)
        );
        assert_eq!(platform.fullscreen_requests(), 3);
    }

    #[test]
    fn test_failed_request_allows_next_exit() {
        let platform = MockPlatform::new();
        let mut source = FullscreenSource::default();
        source.start(&platform, |_, _| {});

        assert!(
            source
                .observe(false, SessionState::Active, &platform)
                .is_some()
        );
        source.request_failed();
        assert!(
            source
                .observe(false, SessionState::Active, &platform)
                .is_some()
        );
    }

    #[test]
    fn test_no_violation_after_stop() {
        let platform = MockPlatform::new();
        let mut source = FullscreenSource::default();
        source.start(&platform, |_, _| {});
        source.stop(&platform);

        assert!(!platform.is_subscribed(Capability::Fullscreen));
        assert_eq!(platform.log.lock().unwrap().fullscreen_exits, 1);
        assert_eq!(source.observe(false, SessionState::Active, &platform), None);
    }

    #[test]
    fn test_no_violation_while_submitting() {
        let platform = MockPlatform::new();
        let mut source = FullscreenSource::default();
        source.start(&platform, |_, _| {});

        assert_eq!(
            source.observe(false, SessionState::Submitting, &platform),
            None
        );
        assert_eq!(platform.fullscreen_requests(), 1);
    }
}
