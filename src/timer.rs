//! Session countdown
//!
//! The timer counts whole seconds down from the exam duration, one alarm
//! per second. It never looks at the wall clock: every tick removes exactly
//! one second. Alarms carry the generation of the start that scheduled
//! them, so a tick left over from before a stop is recognised and dropped.

use serde::{Deserialize, Serialize};
use tracing::debug;
use web_time::Duration;

use crate::{constants, controller::SessionState};

/// Alarm messages for the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// One second has passed
    Tick {
        /// Start generation of the timer that scheduled the alarm
        generation: u64,
    },
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick was stale or the timer is not running
    Ignored,
    /// One second was removed and time is left
    Ticked {
        /// Seconds left after the tick
        remaining_seconds: u64,
        /// Whether this tick crossed the low time threshold
        low_time: bool,
    },
    /// The last second was removed
    Expired,
}

/// Countdown of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionTimer {
    duration_seconds: u64,
    remaining_seconds: u64,
    low_time_threshold: u64,
    low_time_announced: bool,
    running: bool,
    generation: u64,
}

impl SessionTimer {
    /// Creates a stopped timer with the full duration left
    pub fn new(duration_seconds: u64, low_time_threshold: u64) -> Self {
        Self {
            duration_seconds,
            remaining_seconds: duration_seconds,
            low_time_threshold,
            // a session shorter than the threshold starts in low time without a notice
            low_time_announced: duration_seconds <= low_time_threshold,
            running: false,
            generation: 0,
        }
    }

    /// Seconds left
    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    /// Seconds since the session started
    pub fn elapsed_seconds(&self) -> u64 {
        self.duration_seconds - self.remaining_seconds
    }

    /// Whether ticks are being scheduled
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Starts ticking
    ///
    /// # Arguments
    ///
    /// * `schedule_message` - Function to schedule the next tick
    pub fn start<S: FnMut(crate::AlarmMessage, Duration)>(&mut self, schedule_message: S) {
        if self.running {
            return;
        }
        self.running = true;
        self.generation += 1;
        self.schedule_tick(schedule_message);
    }

    /// Stops ticking; the already scheduled tick becomes stale
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.generation += 1;
        }
    }

    /// Handles a tick alarm
    ///
    /// A tick while the session is not active stops the timer instead of
    /// counting, so a zero reached mid submission cannot trigger a second
    /// termination.
    ///
    /// # Arguments
    ///
    /// * `generation` - Generation carried by the alarm
    /// * `state` - Current state of the session
    /// * `schedule_message` - Function to schedule the next tick
    pub fn receive_tick<S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        generation: u64,
        state: SessionState,
        schedule_message: S,
    ) -> TickOutcome {
        if !self.running || generation != self.generation {
            debug!(generation, current = self.generation, "stale tick");
            return TickOutcome::Ignored;
        }
        if state != SessionState::Active {
            self.stop();
            return TickOutcome::Ignored;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.stop();
            return TickOutcome::Expired;
        }

        let low_time =
            !self.low_time_announced && self.remaining_seconds <= self.low_time_threshold;
        if low_time {
            self.low_time_announced = true;
        }
        self.schedule_tick(schedule_message);

        TickOutcome::Ticked {
            remaining_seconds: self.remaining_seconds,
            low_time,
        }
    }

    fn schedule_tick<S: FnMut(crate::AlarmMessage, Duration)>(&self, mut schedule_message: S) {
        schedule_message(
            AlarmMessage::Tick {
                generation: self.generation,
            }
            .into(),
            Duration::from_secs(constants::timer::TICK_SECONDS),
        );
    }
}
