//! Blocked key combinations

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::Duration;

use crate::{
    controller::SessionState,
    session::{Capability, Platform},
};

use super::{SignalSource, ViolationKind};

/// Modifier keys held during a key press
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    /// Control
    pub ctrl: bool,
    /// Shift
    pub shift: bool,
    /// Alt, Option on macOS
    pub alt: bool,
    /// Meta, Command on macOS
    pub meta: bool,
}

impl Modifiers {
    const CTRL: Self = Self::new(true, false, false, false);
    const CTRL_SHIFT: Self = Self::new(true, true, false, false);
    const ALT: Self = Self::new(false, false, true, false);
    const META: Self = Self::new(false, false, false, true);
    const META_SHIFT: Self = Self::new(false, true, false, true);
    const META_ALT: Self = Self::new(false, false, true, true);

    const fn new(ctrl: bool, shift: bool, alt: bool, meta: bool) -> Self {
        Self {
            ctrl,
            shift,
            alt,
            meta,
        }
    }
}

/// A key together with the modifiers held while pressing it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCombo {
    /// Key name as reported by the platform, e.g. `"Escape"` or `"i"`
    pub key: String,
    /// Held modifiers
    pub modifiers: Modifiers,
}

impl KeyCombo {
    /// Creates a key combination
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
        }
    }

    /// Whether the combination is on the deny-list
    pub fn is_denied(&self) -> bool {
        DENIED_KEYS.iter().any(|denied| denied.matches(self))
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Modifiers {
            ctrl,
            shift,
            alt,
            meta,
        } = self.modifiers;
        for (held, name) in [(ctrl, "Ctrl"), (meta, "Meta"), (alt, "Alt"), (shift, "Shift")] {
            if held {
                write!(f, "{name}+")?;
            }
        }
        write!(f, "{}", self.key)
    }
}

/// Errors from parsing a key combination
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyComboError {
    /// No key was given
    #[error("key combination has no key")]
    Empty,
    /// A modifier name was not recognized
    #[error("unknown modifier {0}")]
    UnknownModifier(String),
}

impl FromStr for KeyCombo {
    type Err = KeyComboError;

    /// Parses combinations such as `"Ctrl+Shift+I"`, `"F12"` or `"Ctrl++"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (held, key) = match s.strip_suffix('+') {
            // "+" and "Ctrl++" end in the plus key, "Ctrl+" has no key
            Some(rest) => match rest.trim_end().strip_suffix('+') {
                Some(held) => (held, "+"),
                None if rest.trim().is_empty() => ("", "+"),
                None => return Err(KeyComboError::Empty),
            },
            None => s
                .rsplit_once('+')
                .map_or(("", s), |(held, key)| (held, key.trim())),
        };
        if key.is_empty() {
            return Err(KeyComboError::Empty);
        }

        let mut modifiers = Modifiers::default();
        for part in held
            .split('+')
            .map(str::trim)
            .filter(|part| !part.is_empty())
        {
            match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "shift" => modifiers.shift = true,
                "alt" | "option" => modifiers.alt = true,
                "meta" | "cmd" | "command" | "super" => modifiers.meta = true,
                _ => return Err(KeyComboError::UnknownModifier(part.to_owned())),
            }
        }

        Ok(Self::new(key, modifiers))
    }
}

/// Deny-list entry; `None` modifiers block the key whatever is held
struct DeniedKey {
    key: &'static str,
    modifiers: Option<Modifiers>,
}

impl DeniedKey {
    const fn any(key: &'static str) -> Self {
        Self {
            key,
            modifiers: None,
        }
    }

    const fn with(key: &'static str, modifiers: Modifiers) -> Self {
        Self {
            key,
            modifiers: Some(modifiers),
        }
    }

    fn matches(&self, combo: &KeyCombo) -> bool {
        combo.key.eq_ignore_ascii_case(self.key)
            && self
                .modifiers
                .is_none_or(|modifiers| modifiers == combo.modifiers)
    }
}

const DENIED_KEYS: &[DeniedKey] = &[
    DeniedKey::any("Escape"),
    DeniedKey::any("F5"),
    DeniedKey::any("F11"),
    DeniedKey::any("F12"),
    DeniedKey::any("PrintScreen"),
    // refresh
    DeniedKey::with("r", Modifiers::CTRL),
    DeniedKey::with("r", Modifiers::CTRL_SHIFT),
    DeniedKey::with("r", Modifiers::META),
    DeniedKey::with("r", Modifiers::META_SHIFT),
    // new tab, new window, close tab
    DeniedKey::with("t", Modifiers::CTRL),
    DeniedKey::with("t", Modifiers::META),
    DeniedKey::with("n", Modifiers::CTRL),
    DeniedKey::with("n", Modifiers::META),
    DeniedKey::with("n", Modifiers::CTRL_SHIFT),
    DeniedKey::with("n", Modifiers::META_SHIFT),
    DeniedKey::with("w", Modifiers::CTRL),
    DeniedKey::with("w", Modifiers::META),
    DeniedKey::with("Tab", Modifiers::ALT),
    DeniedKey::with("F4", Modifiers::ALT),
    // developer tools and page source
    DeniedKey::with("i", Modifiers::CTRL_SHIFT),
    DeniedKey::with("j", Modifiers::CTRL_SHIFT),
    DeniedKey::with("c", Modifiers::CTRL_SHIFT),
    DeniedKey::with("i", Modifiers::META_ALT),
    DeniedKey::with("j", Modifiers::META_ALT),
    DeniedKey::with("c", Modifiers::META_ALT),
    DeniedKey::with("u", Modifiers::CTRL),
    DeniedKey::with("u", Modifiers::META_ALT),
    DeniedKey::with("p", Modifiers::CTRL),
    DeniedKey::with("p", Modifiers::META),
    DeniedKey::with("s", Modifiers::CTRL),
    DeniedKey::with("s", Modifiers::META),
];

/// Intercepts key presses and blocks the deny-list
#[derive(Debug, Clone, Default)]
pub struct KeyboardSource {
    running: bool,
}

impl KeyboardSource {
    /// Handles a key press
    ///
    /// # Returns
    ///
    /// The violation, if any, and whether the default action must be suppressed
    pub fn observe(
        &mut self,
        combo: &KeyCombo,
        state: SessionState,
    ) -> (Option<ViolationKind>, bool) {
        if !self.running || !combo.is_denied() {
            return (None, false);
        }
        // keys stay blocked until the listener is gone, but only count while active
        let violation = (state == SessionState::Active).then_some(ViolationKind::BlockedKey);
        (violation, true)
    }
}

impl SignalSource for KeyboardSource {
    fn start<P: Platform, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        platform: &P,
        _schedule_message: S,
    ) {
        if !self.running {
            platform.subscribe(Capability::Keyboard);
            self.running = true;
        }
    }

    fn stop<P: Platform>(&mut self, platform: &P) {
        if self.running {
            platform.unsubscribe(Capability::Keyboard);
            self.running = false;
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
