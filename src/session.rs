//! Boundaries between the session and its host environment
//!
//! The session never touches the screen or the browser directly. It talks
//! to the student's view through a [`Tunnel`] and drives device and page
//! capabilities through a [`Platform`]. Hosts implement both traits over
//! whatever rendering and browser bindings they use.

use enum_map::Enum;
use serde::{Deserialize, Serialize};

use super::{SyncMessage, UpdateMessage};

/// Trait for sending messages to the student's exam view
pub trait Tunnel {
    /// Sends an update message to the view
    ///
    /// Update messages notify the view about a change it should apply on
    /// top of what it already shows.
    ///
    /// # Arguments
    ///
    /// * `message` - The update message to send
    fn send_message(&self, message: &UpdateMessage);

    /// Sends a state synchronization message to the view
    ///
    /// Sync messages carry everything needed to render the exam from
    /// scratch, typically after a reload of the view.
    ///
    /// # Arguments
    ///
    /// * `state` - The synchronization message to send
    fn send_state(&self, state: &SyncMessage);

    /// Navigates the student away from the exam view
    fn redirect(&self);
}

/// Page level notifications a signal source may listen to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum Capability {
    /// Page visibility changes
    Visibility,
    /// Fullscreen enter and exit notifications
    Fullscreen,
    /// Key presses, intercepted before the default action
    Keyboard,
    /// Attempts to navigate away or close the page
    Unload,
}

/// Device and page capabilities used by the signal sources
///
/// All calls are fire and forget. Results, where there are any, come back
/// later as [`crate::proctor::PlatformEvent`]s.
pub trait Platform {
    /// Starts delivering notifications for `capability`
    fn subscribe(&self, capability: Capability);

    /// Stops delivering notifications for `capability` and releases the listener
    fn unsubscribe(&self, capability: Capability);

    /// Asks the page to enter fullscreen
    fn request_fullscreen(&self);

    /// Leaves fullscreen
    fn exit_fullscreen(&self);

    /// Asks for a face detection sample on the next rendered video frame
    fn request_frame(&self);

    /// Cancels an outstanding frame request
    fn cancel_frame(&self);

    /// Captures a still frame and runs face detection on it for the reference comparison
    fn capture_frame(&self);

    /// Opens the camera and microphone stream of the session
    ///
    /// A device the student refuses comes back as
    /// [`crate::proctor::PlatformEvent::PermissionDenied`].
    fn acquire_media(&self);

    /// Stops every camera and microphone track of the session's media stream
    fn release_media(&self);
}
