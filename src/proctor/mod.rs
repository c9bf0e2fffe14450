//! Proctoring signal sources and violation aggregation
//!
//! Each signal source is a narrow adapter over one platform capability. It
//! turns raw [`PlatformEvent`]s into [`ViolationKind`]s while the session is
//! active, and has an explicit start/stop pair so nothing keeps producing
//! events once the session is over. The [`aggregator`] counts violations and
//! decides when the session must be terminated.

use enum_map::Enum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::{Duration, SystemTime};

use crate::{controller::SessionState, session::Platform};

pub mod aggregator;
pub mod face;
pub mod fullscreen;
pub mod keyboard;
pub mod photo;
pub mod unload;
pub mod visibility;

use face::FacePresenceSource;
use fullscreen::FullscreenSource;
use keyboard::{KeyCombo, KeyboardSource};
use photo::ReferencePhotoSource;
use unload::UnloadSource;
use visibility::VisibilitySource;

/// The rule a violation broke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum ViolationKind {
    /// The exam tab was hidden
    TabSwitch,
    /// Fullscreen was left
    FullscreenExit,
    /// A blocked key combination was pressed
    BlockedKey,
    /// No face was visible on camera
    NoFace,
    /// More than one face was visible on camera
    MultiFace,
    /// The camera frame did not match the reference photo
    PhotoMismatch,
    /// The student tried to reload or leave the page
    Reload,
}

impl ViolationKind {
    /// Describes the broken rule to the student
    pub fn rule(self) -> &'static str {
        match self {
            Self::TabSwitch => "Switching tabs or windows is not allowed",
            Self::FullscreenExit => "The exam must stay in fullscreen",
            Self::BlockedKey => "This key combination is disabled during the exam",
            Self::NoFace => "Your face must stay visible to the camera",
            Self::MultiFace => "Only one person may be visible to the camera",
            Self::PhotoMismatch => "The person on camera does not match the reference photo",
            Self::Reload => "Reloading or leaving the exam page is not allowed",
        }
    }
}

/// A single detected violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViolationEvent {
    /// The broken rule
    pub kind: ViolationKind,
    /// When the violation was observed
    pub timestamp: SystemTime,
}

impl ViolationEvent {
    /// Creates a violation observed now
    pub fn now(kind: ViolationKind) -> Self {
        Self {
            kind,
            timestamp: SystemTime::now(),
        }
    }
}

/// Approximate position of a detected face, in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width of the box
    pub width: f64,
    /// Height of the box
    pub height: f64,
}

impl BoundingBox {
    /// Largest distance along either axis between the origins of two boxes
    pub fn displacement(&self, other: &Self) -> f64 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// Result of running face detection on one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    /// Every face found in the frame
    pub faces: Vec<BoundingBox>,
}

impl FaceDetection {
    /// Number of faces found
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

/// Failure of the face detection capability on a single sample
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    /// The detection model is not loaded yet or failed to load
    #[error("face detection model unavailable")]
    ModelUnavailable,
    /// The video frame could not be read
    #[error("no video frame available")]
    NoFrame,
    /// The detector failed for another reason
    #[error("face detection failed: {0}")]
    Failed(String),
}

/// A media device the session needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum Device {
    /// The camera
    Camera,
    /// The microphone
    Microphone,
}

/// Notifications delivered by the host platform
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    /// The page became hidden or visible
    VisibilityChanged {
        /// Whether the page is hidden now
        hidden: bool,
    },
    /// The page entered or left fullscreen
    FullscreenChanged {
        /// Whether the page is in fullscreen now
        active: bool,
    },
    /// A fullscreen request was rejected
    FullscreenRequestFailed,
    /// A key combination was pressed
    KeyDown(KeyCombo),
    /// The student tried to reload, close or leave the page
    BeforeUnload,
    /// Face detection result for the requested video frame
    FaceSample(Result<FaceDetection, DetectionError>),
    /// Face detection result for a captured reference comparison frame
    ReferenceSample(Result<FaceDetection, DetectionError>),
    /// Access to a media device was denied
    PermissionDenied(Device),
}

/// What the host should do with the original platform event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventResponse {
    /// Suppress the browser's default action for the event
    pub prevent_default: bool,
    /// Ask the student to confirm leaving the page
    pub confirm_unload: bool,
}

/// Outcome of passing a platform event through the signal sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Observation {
    /// The violation detected, if any
    pub violation: Option<ViolationKind>,
    /// How the host should treat the original event
    pub response: EventResponse,
}

impl Observation {
    fn violation(violation: Option<ViolationKind>) -> Self {
        Self {
            violation,
            response: EventResponse::default(),
        }
    }
}

/// Update messages sent to the view about proctoring
#[derive(Debug, Clone, Serialize)]
pub enum UpdateMessage {
    /// A dismissible warning about a violation
    Warning {
        /// The broken rule
        kind: ViolationKind,
        /// Text shown to the student
        message: String,
        /// Warnings received so far
        warnings: u32,
        /// Warnings after which the exam is submitted
        max_warnings: u32,
    },
    /// The warning was dismissed
    WarningDismissed,
    /// Access to a device was denied, proctoring runs degraded
    PermissionDenied(Device),
}

/// Alarm messages for the proctoring intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// Time for the next reference photo comparison
    PhotoCheck {
        /// Start generation of the photo source that scheduled the alarm
        generation: u64,
    },
}

/// Trait for the start/stop lifecycle shared by every signal source
pub trait SignalSource {
    /// Acquires the platform capability and starts producing signals
    ///
    /// # Arguments
    ///
    /// * `platform` - The host platform
    /// * `schedule_message` - Function to schedule alarm messages for interval driven sources
    fn start<P: Platform, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        platform: &P,
        schedule_message: S,
    );

    /// Releases the platform capability; no signal is produced afterwards
    fn stop<P: Platform>(&mut self, platform: &P);

    /// Whether the source is currently producing signals
    fn is_running(&self) -> bool;
}

/// Options needed to build the signal sources
#[derive(Debug, Clone, Copy)]
pub struct SourceOptions {
    /// Time between two reference photo comparisons
    pub photo_interval: Duration,
    /// Largest face displacement in pixels still matching the reference
    pub displacement_threshold: f64,
}

/// Every signal source of a session
#[derive(Debug, Clone)]
pub struct SignalSources {
    visibility: VisibilitySource,
    fullscreen: FullscreenSource,
    keyboard: KeyboardSource,
    unload: UnloadSource,
    face: FacePresenceSource,
    photo: ReferencePhotoSource,
}

impl SignalSources {
    /// Creates all sources in their stopped state
    ///
    /// The reference photo source only runs when a reference detection is given.
    pub fn new(options: SourceOptions, reference: Option<FaceDetection>) -> Self {
        Self {
            visibility: VisibilitySource::default(),
            fullscreen: FullscreenSource::default(),
            keyboard: KeyboardSource::default(),
            unload: UnloadSource::default(),
            face: FacePresenceSource::default(),
            photo: ReferencePhotoSource::new(
                reference,
                options.photo_interval,
                options.displacement_threshold,
            ),
        }
    }

    /// Starts every source
    pub fn start_all<P: Platform, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        platform: &P,
        mut schedule_message: S,
    ) {
        self.visibility.start(platform, &mut schedule_message);
        self.fullscreen.start(platform, &mut schedule_message);
        self.keyboard.start(platform, &mut schedule_message);
        self.unload.start(platform, &mut schedule_message);
        self.face.start(platform, &mut schedule_message);
        self.photo.start(platform, &mut schedule_message);
    }

    /// Stops every source
    pub fn stop_all<P: Platform>(&mut self, platform: &P) {
        self.visibility.stop(platform);
        self.fullscreen.stop(platform);
        self.keyboard.stop(platform);
        self.unload.stop(platform);
        self.face.stop(platform);
        self.photo.stop(platform);
    }

    /// Whether any source is still running
    pub fn any_running(&self) -> bool {
        self.visibility.is_running()
            || self.fullscreen.is_running()
            || self.keyboard.is_running()
            || self.unload.is_running()
            || self.face.is_running()
            || self.photo.is_running()
    }

    /// Routes a platform event to the source responsible for it
    ///
    /// # Arguments
    ///
    /// * `event` - The platform event
    /// * `state` - Current state of the session
    /// * `platform` - The host platform, for recovery side effects
    ///
    /// # Returns
    ///
    /// The detected violation, if any, and how to treat the original event
    pub fn observe<P: Platform>(
        &mut self,
        event: PlatformEvent,
        state: SessionState,
        platform: &P,
    ) -> Observation {
        match event {
            PlatformEvent::VisibilityChanged { hidden } => {
                Observation::violation(self.visibility.observe(hidden, state))
            }
            PlatformEvent::FullscreenChanged { active } => {
                Observation::violation(self.fullscreen.observe(active, state, platform))
            }
            PlatformEvent::FullscreenRequestFailed => {
                self.fullscreen.request_failed();
                Observation::default()
            }
            PlatformEvent::KeyDown(combo) => {
                let (violation, blocked) = self.keyboard.observe(&combo, state);
                Observation {
                    violation,
                    response: EventResponse {
                        prevent_default: blocked,
                        confirm_unload: false,
                    },
                }
            }
            PlatformEvent::BeforeUnload => {
                let (violation, confirm) = self.unload.observe(state);
                Observation {
                    violation,
                    response: EventResponse {
                        prevent_default: confirm,
                        confirm_unload: confirm,
                    },
                }
            }
            PlatformEvent::FaceSample(sample) => {
                Observation::violation(self.face.observe(sample, state, platform))
            }
            PlatformEvent::ReferenceSample(sample) => {
                Observation::violation(self.photo.observe(sample, state))
            }
            PlatformEvent::PermissionDenied(_) => Observation::default(),
        }
    }

    /// Handles an alarm scheduled by one of the sources
    pub fn receive_alarm<P: Platform, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        message: AlarmMessage,
        platform: &P,
        schedule_message: S,
    ) {
        match message {
            AlarmMessage::PhotoCheck { generation } => {
                self.photo
                    .receive_alarm(generation, platform, schedule_message);
            }
        }
    }
}
