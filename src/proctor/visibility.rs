//! Tab and window switch detection

use web_time::Duration;

use crate::{
    controller::SessionState,
    session::{Capability, Platform},
};

use super::{SignalSource, ViolationKind};

/// Reports a violation whenever the exam page becomes hidden
#[derive(Debug, Clone, Default)]
pub struct VisibilitySource {
    running: bool,
}

impl VisibilitySource {
    /// Handles a visibility change
    ///
    /// Only the transition to hidden is a violation. Coming back is not.
    pub fn observe(&mut self, hidden: bool, state: SessionState) -> Option<ViolationKind> {
        (self.running && hidden && state == SessionState::Active)
            .then_some(ViolationKind::TabSwitch)
    }
}

impl SignalSource for VisibilitySource {
    fn start<P: Platform, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        platform: &P,
        _schedule_message: S,
    ) {
        if !self.running {
            platform.subscribe(Capability::Visibility);
            self.running = true;
        }
    }

    fn stop<P: Platform>(&mut self, platform: &P) {
        if self.running {
            platform.unsubscribe(Capability::Visibility);
            self.running = false;
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
