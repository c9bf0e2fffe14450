//! Bounded warning counter

use enum_map::EnumMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::controller::SessionState;

use super::{ViolationEvent, ViolationKind};

/// How violations observed within the same timer tick are counted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountingMode {
    /// Every violation counts, even several in the same tick
    #[default]
    EveryEvent,
    /// At most one violation counts per tick
    OncePerTick,
}

/// What recording a violation led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The violation was not counted
    Ignored,
    /// The violation was counted and a warning must be shown
    Warned {
        /// The broken rule
        kind: ViolationKind,
        /// Warnings received so far
        warnings: u32,
        /// Warnings left before termination
        remaining: u32,
    },
    /// The violation reached the bound; the session must be terminated
    Exceeded {
        /// The broken rule
        kind: ViolationKind,
    },
}

/// Counts violations and decides when the session has failed its integrity check
///
/// The counter never decreases and stops at the bound. Reaching the bound
/// yields [`Verdict::Exceeded`] exactly once.
#[derive(Debug, Clone)]
pub struct ViolationAggregator {
    max_warnings: u32,
    mode: CountingMode,
    warnings: u32,
    last_kind: Option<ViolationKind>,
    tallies: EnumMap<ViolationKind, u32>,
    last_counted_tick: Option<u64>,
}

impl ViolationAggregator {
    /// Creates an empty aggregator
    pub fn new(max_warnings: u32, mode: CountingMode) -> Self {
        Self {
            max_warnings,
            mode,
            warnings: 0,
            last_kind: None,
            tallies: EnumMap::default(),
            last_counted_tick: None,
        }
    }

    /// Warnings received so far
    pub fn warnings(&self) -> u32 {
        self.warnings
    }

    /// Warnings after which the session is terminated
    pub fn max_warnings(&self) -> u32 {
        self.max_warnings
    }

    /// The rule broken most recently
    pub fn last_kind(&self) -> Option<ViolationKind> {
        self.last_kind
    }

    /// Counted violations per rule
    pub fn tallies(&self) -> &EnumMap<ViolationKind, u32> {
        &self.tallies
    }

    /// Records a violation
    ///
    /// # Arguments
    ///
    /// * `event` - The violation
    /// * `state` - Current state of the session; nothing is counted unless active
    /// * `tick` - Elapsed whole seconds of the session, used by [`CountingMode::OncePerTick`]
    pub fn record(&mut self, event: &ViolationEvent, state: SessionState, tick: u64) -> Verdict {
        let kind = event.kind;
        if state != SessionState::Active {
            debug!(?kind, ?state, "violation ignored outside active session");
            return Verdict::Ignored;
        }
        if self.warnings >= self.max_warnings {
            return Verdict::Ignored;
        }
        if self.mode == CountingMode::OncePerTick && self.last_counted_tick == Some(tick) {
            debug!(?kind, tick, "violation already counted this tick");
            return Verdict::Ignored;
        }

        self.warnings += 1;
        self.last_kind = Some(kind);
        self.tallies[kind] += 1;
        self.last_counted_tick = Some(tick);

        if self.warnings >= self.max_warnings {
            Verdict::Exceeded { kind }
        } else {
            Verdict::Warned {
                kind,
                warnings: self.warnings,
                remaining: self.max_warnings - self.warnings,
            }
        }
    }
}

/// Text of the warning shown after a counted violation
pub fn warning_text(kind: ViolationKind, remaining: u32) -> String {
    format!(
        "{}. {} remaining before the exam is submitted automatically.",
        kind.rule(),
        pluralizer::pluralize("warning", isize::try_from(remaining).unwrap_or(isize::MAX), true)
    )
}
