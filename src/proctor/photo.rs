//! Periodic comparison against the reference photo

use tracing::{debug, info, warn};
use web_time::Duration;

use crate::{controller::SessionState, session::Platform};

use super::{AlarmMessage, DetectionError, FaceDetection, SignalSource, ViolationKind};

/// Every interval captures a frame and compares it with the reference detection
///
/// A different face count, or a first face whose origin moved further than
/// the displacement threshold, is a mismatch. Without a reference the
/// source never runs.
#[derive(Debug, Clone)]
pub struct ReferencePhotoSource {
    reference: Option<FaceDetection>,
    interval: Duration,
    displacement_threshold: f64,
    running: bool,
    generation: u64,
    awaiting_sample: bool,
}

impl ReferencePhotoSource {
    /// Creates a stopped source
    pub fn new(
        reference: Option<FaceDetection>,
        interval: Duration,
        displacement_threshold: f64,
    ) -> Self {
        Self {
            reference,
            interval,
            displacement_threshold,
            running: false,
            generation: 0,
            awaiting_sample: false,
        }
    }

    /// Whether `sample` differs from `reference`
    pub fn mismatches(
        reference: &FaceDetection,
        sample: &FaceDetection,
        displacement_threshold: f64,
    ) -> bool {
        if reference.face_count() != sample.face_count() {
            return true;
        }
        match (reference.faces.first(), sample.faces.first()) {
            (Some(expected), Some(actual)) => {
                expected.displacement(actual) > displacement_threshold
            }
            _ => false,
        }
    }

    /// Handles a photo check alarm
    ///
    /// Alarms scheduled by an earlier start are ignored.
    pub fn receive_alarm<P: Platform, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        generation: u64,
        platform: &P,
        mut schedule_message: S,
    ) {
        if !self.running || generation != self.generation {
            debug!(generation, "stale photo check alarm");
            return;
        }
        platform.capture_frame();
        self.awaiting_sample = true;
        schedule_message(
            AlarmMessage::PhotoCheck { generation }.into(),
            self.interval,
        );
    }

    /// Handles the detection result of a captured frame
    pub fn observe(
        &mut self,
        sample: Result<FaceDetection, DetectionError>,
        state: SessionState,
    ) -> Option<ViolationKind> {
        if !self.running || !self.awaiting_sample {
            return None;
        }
        self.awaiting_sample = false;

        let sample = match sample {
            Ok(sample) => sample,
            Err(error) => {
                warn!(%error, "reference photo sample failed");
                return None;
            }
        };
        let reference = self.reference.as_ref()?;

        (state == SessionState::Active
            && Self::mismatches(reference, &sample, self.displacement_threshold))
        .then_some(ViolationKind::PhotoMismatch)
    }
}

impl SignalSource for ReferencePhotoSource {
    fn start<P: Platform, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        _platform: &P,
        mut schedule_message: S,
    ) {
        if self.running {
            return;
        }
        if self.reference.is_none() {
            info!("no reference photo, photo comparison disabled");
            return;
        }
        self.running = true;
        self.generation += 1;
        schedule_message(
            AlarmMessage::PhotoCheck {
                generation: self.generation,
            }
            .into(),
            self.interval,
        );
    }

    fn stop<P: Platform>(&mut self, _platform: &P) {
        if self.running {
            self.running = false;
            self.awaiting_sample = false;
            // invalidates the alarm already scheduled
            self.generation += 1;
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

    fn face_at(x: f64, y: f64) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: 120.0,
            height: 120.0,
        }
    }

    fn detection(faces: Vec<BoundingBox>) -> FaceDetection {
        FaceDetection { faces }
    }

    fn source() -> ReferencePhotoSource {
        ReferencePhotoSource::new(
            Some(detection(vec![face_at(100.0, 100.0)])),
            Duration::from_secs(5),
            50.0,
        )
    }

    fn generation_of(message: &crate::AlarmMessage) -> u64 {
        match message {
            crate::AlarmMessage::Proctor(AlarmMessage::PhotoCheck { generation }) => *generation,
            other => panic!("unexpected alarm {other:?}"),
        }
    }

    #[test]
    fn test_mismatch_rules() {
        let reference = detection(vec![face_at(100.0, 100.0)]);

        assert!(!ReferencePhotoSource::mismatches(
            &reference,
            &detection(vec![face_at(130.0, 80.0)]),
            50.0
        ));
        assert!(ReferencePhotoSource::mismatches(
            &reference,
            &detection(vec![face_at(151.0, 100.0)]),
            50.0
        ));
        assert!(ReferencePhotoSource::mismatches(
            &reference,
            &detection(vec![]),
            50.0
        ));
        assert!(ReferencePhotoSource::mismatches(
            &reference,
            &detection(vec![face_at(100.0, 100.0), face_at(300.0, 100.0)]),
            50.0
        ));
    }

    #[test]
    fn test_interval_captures_and_reschedules() {
        let platform = MockPlatform::new();
        let mut scheduled = Vec::new();
        let mut source = source();

        source.start(&platform, |message, duration| {
            scheduled.push((message, duration));
        });
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].1, Duration::from_secs(5));
        assert_eq!(platform.captures(), 0);

        let generation = generation_of(&scheduled[0].0);
        source.receive_alarm(generation, &platform, |message, duration| {
            scheduled.push((message, duration));
        });
        assert_eq!(platform.captures(), 1);
        assert_eq!(scheduled.len(), 2);

        assert_eq!(
            source.observe(Ok(detection(vec![])), SessionState::Active),
            Some(ViolationKind::PhotoMismatch)
        );
        // only the requested capture counts
        assert_eq!(source.observe(Ok(detection(vec![])), SessionState::Active), None);
    }

    #[test]
    fn test_matching_frame_is_fine() {
        let platform = MockPlatform::new();
        let mut source = source();
        source.start(&platform, |_, _| {});
        source.receive_alarm(source.generation, &platform, |_, _| {});

        assert_eq!(
            source.observe(
                Ok(detection(vec![face_at(110.0, 95.0)])),
                SessionState::Active
            ),
            None
        );
    }

    #[test]
    fn test_failed_capture_is_transient() {
        let platform = MockPlatform::new();
        let mut source = source();
        source.start(&platform, |_, _| {});
        source.receive_alarm(source.generation, &platform, |_, _| {});

        assert_eq!(
            source.observe(Err(DetectionError::NoFrame), SessionState::Active),
            None
        );
        assert!(source.is_running());
    }

    #[test]
    fn test_stale_alarm_after_stop() {
        let platform = MockPlatform::new();
        let mut scheduled = Vec::new();
        let mut source = source();
        source.start(&platform, |message, _| scheduled.push(message));
        let generation = generation_of(&scheduled[0]);

        source.stop(&platform);
        source.receive_alarm(generation, &platform, |message, _| scheduled.push(message));

        assert_eq!(platform.captures(), 0);
        assert_eq!(scheduled.len(), 1);
    }

    #[test]
    fn test_disabled_without_reference() {
        let platform = MockPlatform::new();
        let mut scheduled = 0;
        let mut source = ReferencePhotoSource::new(None, Duration::from_secs(5), 50.0);
        source.start(&platform, |_, _| scheduled += 1);

        assert!(!source.is_running());
        assert_eq!(scheduled, 0);
    }
}
