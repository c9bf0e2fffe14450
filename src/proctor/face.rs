//! Continuous face presence detection

use tracing::{debug, warn};
use web_time::Duration;

use crate::{controller::SessionState, session::Platform};

use super::{DetectionError, FaceDetection, SignalSource, ViolationKind};

/// Runs face detection on the live camera feed, one sample per rendered frame
///
/// The next frame is requested only once the previous sample arrived, so
/// the loop never runs faster than the display refreshes. A violation is
/// reported when the feed enters an anomaly or switches from one anomaly
/// to the other; frames repeating the same anomaly are not counted again.
#[derive(Debug, Clone, Default)]
pub struct FacePresenceSource {
    running: bool,
    frame_requested: bool,
    anomaly: Option<ViolationKind>,
}

impl FacePresenceSource {
    /// Classifies the face count of a sample
    pub fn classify(detection: &FaceDetection) -> Option<ViolationKind> {
        match detection.face_count() {
            0 => Some(ViolationKind::NoFace),
            1 => None,
            _ => Some(ViolationKind::MultiFace),
        }
    }

    /// The anomaly the feed currently shows, if any
    pub fn anomaly(&self) -> Option<ViolationKind> {
        self.anomaly
    }

    /// Handles a detection sample for the requested frame
    ///
    /// Failed samples are transient; they are logged and the loop moves on
    /// to the next frame without touching the anomaly state.
    pub fn observe<P: Platform>(
        &mut self,
        sample: Result<FaceDetection, DetectionError>,
        state: SessionState,
        platform: &P,
    ) -> Option<ViolationKind> {
        if !self.running {
            return None;
        }
        if !self.frame_requested {
            debug!("face sample without an outstanding frame request");
            return None;
        }
        self.frame_requested = false;

        let violation = match sample {
            Ok(detection) => {
                let anomaly = Self::classify(&detection);
                let entered = anomaly.filter(|_| anomaly != self.anomaly);
                self.anomaly = anomaly;
                entered.filter(|_| state == SessionState::Active)
            }
            Err(error) => {
                warn!(%error, "face detection sample failed");
                None
            }
        };

        self.request_frame(platform);
        violation
    }

    fn request_frame<P: Platform>(&mut self, platform: &P) {
        platform.request_frame();
        self.frame_requested = true;
    }
}

impl SignalSource for FacePresenceSource {
    fn start<P: Platform, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        platform: &P,
        _schedule_message: S,
    ) {
        if !self.running {
            self.running = true;
            self.anomaly = None;
            self.request_frame(platform);
        }
    }

    fn stop<P: Platform>(&mut self, platform: &P) {
        if self.running {
            if self.frame_requested {
                platform.cancel_frame();
            }
            self.running = false;
            self.frame_requested = false;
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
    use crate::{proctor::BoundingBox, session::tests::MockPlatform};

    fn faces(count: usize) -> Result<FaceDetection, DetectionError> {
        Ok(FaceDetection {
            faces: (0..count)
                .map(|i| BoundingBox {
                    x: 100.0 * i as f64,
                    y: 50.0,
                    width: 80.0,
                    height: 80.0,
                })
                .collect(),
        })
    }

    fn started(platform: &MockPlatform) -> FacePresenceSource {
        let mut source = FacePresenceSource::default();
        source.start(platform, |_, _| {});
        source
    }

    #[test]
    fn test_one_request_per_sample() {
        let platform = MockPlatform::new();
        let mut source = started(&platform);
        assert_eq!(platform.frame_requests(), 1);

        source.observe(faces(1), SessionState::Active, &platform);
        source.observe(faces(1), SessionState::Active, &platform);
        assert_eq!(platform.frame_requests(), 3);
    }

    #[test]
    fn test_unrequested_sample_is_ignored() {
        let platform = MockPlatform::new();
        let mut source = started(&platform);
        source.observe(faces(1), SessionState::Active, &platform);

        // mimic a sample arriving after the loop already moved on
        source.frame_requested = false;
        assert_eq!(source.observe(faces(0), SessionState::Active, &platform), None);
        assert_eq!(platform.frame_requests(), 2);
    }

    #[test]
    fn test_anomaly_fires_once_until_cleared() {
        let platform = MockPlatform::new();
        let mut source = started(&platform);

        assert_eq!(
            source.observe(faces(0), SessionState::Active, &platform),
            Some(ViolationKind::NoFace)
        );
        assert_eq!(source.observe(faces(0), SessionState::Active, &platform), None);
        assert_eq!(
            source.observe(faces(2), SessionState::Active, &platform),
            Some(ViolationKind::MultiFace)
        );
        assert_eq!(source.observe(faces(1), SessionState::Active, &platform), None);
        assert_eq!(source.anomaly(), None);
        assert_eq!(
            source.observe(faces(0), SessionState::Active, &platform),
            Some(ViolationKind::NoFace)
        );
    }

    #[test]
    fn test_detection_errors_are_transient() {
        let platform = MockPlatform::new();
        let mut source = started(&platform);

        assert_eq!(
            source.observe(
                Err(DetectionError::ModelUnavailable),
                SessionState::Active,
                &platform
            ),
            None
        );
        assert_eq!(platform.frame_requests(), 2);
        assert_eq!(
            source.observe(faces(0), SessionState::Active, &platform),
            Some(ViolationKind::NoFace)
        );
    }

    #[test]
    fn test_no_violation_outside_active() {
        let platform = MockPlatform::new();
        let mut source = started(&platform);
        assert_eq!(
            source.observe(faces(3), SessionState::Submitting, &platform),
            None
        );
    }

    #[test]
    fn test_stop_cancels_frame() {
        let platform = MockPlatform::new();
        let mut source = started(&platform);
        source.stop(&platform);

        assert_eq!(platform.log.lock().unwrap().frame_cancels, 1);
        assert_eq!(source.observe(faces(0), SessionState::Active, &platform), None);
        assert_eq!(platform.frame_requests(), 1);
    }
}
