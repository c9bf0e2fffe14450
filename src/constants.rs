//! Configuration constants for the proctored exam session
//!
//! This module contains the limits and fixed parameters used throughout
//! the session controller, grouped the same way the rest of the crate is
//! split into components.

/// Exam configuration constants
pub mod exam {
    /// Maximum number of questions accepted in a single exam
    pub const MAX_QUESTION_COUNT: usize = 500;
    /// Maximum length of a question title in characters
    pub const MAX_TITLE_LENGTH: usize = 500;
    /// Maximum length of a question description in characters
    pub const MAX_DESCRIPTION_LENGTH: usize = 20_000;
    /// Minimum number of options for a multiple choice question
    pub const MIN_OPTION_COUNT: usize = 2;
    /// Maximum number of options for a multiple choice question
    pub const MAX_OPTION_COUNT: usize = 10;
    /// Minimum exam duration in minutes
    pub const MIN_DURATION_MINUTES: u64 = 1;
    /// Maximum exam duration in minutes
    pub const MAX_DURATION_MINUTES: u64 = 24 * 60;
}

/// Violation and signal source constants
pub mod proctoring {
    /// Number of violations after which the session is terminated
    pub const MAX_WARNINGS: u32 = 3;
    /// Lowest accepted warning bound
    pub const MIN_WARNINGS: u32 = 1;
    /// Highest accepted warning bound
    pub const MAX_WARNINGS_LIMIT: u32 = 20;
    /// Seconds between two reference photo comparisons
    pub const PHOTO_INTERVAL_SECONDS: u64 = 5;
    /// Accepted range in seconds for the photo comparison interval
    pub const MIN_PHOTO_INTERVAL_SECONDS: u64 = 1;
    /// Accepted range in seconds for the photo comparison interval
    pub const MAX_PHOTO_INTERVAL_SECONDS: u64 = 60;
    /// Largest bounding box displacement in pixels still matching the reference
    pub const DISPLACEMENT_THRESHOLD_PX: f64 = 50.0;
}

/// Session timer constants
pub mod timer {
    /// Seconds between two timer ticks
    pub const TICK_SECONDS: u64 = 1;
    /// Remaining seconds at which the low time notice is shown
    pub const LOW_TIME_THRESHOLD_SECONDS: u64 = 5 * 60;
}

/// Controller constants
pub mod controller {
    /// Seconds the termination reason stays visible before navigating away
    pub const REDIRECT_DELAY_SECONDS: u64 = 5;
    /// Accepted range in seconds for the redirect delay
    pub const MAX_REDIRECT_DELAY_SECONDS: u64 = 60;
}

/// Answer constants
pub mod answer {
    /// Maximum length of a textual answer in characters
    pub const MAX_TEXT_LENGTH: usize = 100_000;
    /// Maximum size of an attached file in bytes
    pub const MAX_ATTACHMENT_BYTES: usize = 25 * 1024 * 1024;
}
