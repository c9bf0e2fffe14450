//! # Proctored Exam Session Library
//!
//! This library provides the client side core of a proctored online exam.
//! It owns one student's attempt from start to terminal submission: the
//! countdown, the proctoring signal sources and their warning bound, the
//! answer pipeline with its per question submission policies, and the
//! single guarded transition that submits the exam.
//!
//! The library never touches a browser or a network directly. Hosts
//! implement [`session::Tunnel`], [`session::Platform`] and
//! [`api::ExamApi`], deliver scheduled [`AlarmMessage`]s back to the session
//! and report every remote call completion by its [`api::Ticket`].

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]
use serde::{Deserialize, Serialize};

pub mod api;
pub mod constants;
pub mod controller;
pub mod exam;
pub mod proctor;
pub mod session;
pub mod timer;

/// Messages sent to synchronize the complete view state
///
/// A sync message carries everything the view needs to render the session
/// from scratch, for instance after the view was reloaded.
pub use controller::SyncMessage;

impl SyncMessage {
    /// Converts the sync message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Messages sent to update specific aspects of the view
///
/// Update messages notify the view about a change it applies on top of
/// what it already shows, such as a timer tick or a saved answer.
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum UpdateMessage {
    /// Session lifecycle and timer updates
    Session(controller::UpdateMessage),
    /// Answer updates
    Answer(exam::pipeline::UpdateMessage),
    /// Proctoring warnings and notices
    Proctor(proctor::UpdateMessage),
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Alarm messages for timed events of a session
///
/// The host schedules these on behalf of the session and delivers them back
/// through [`controller::ExamSession::receive_alarm`] once the delay passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::From, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// Countdown ticks
    Timer(timer::AlarmMessage),
    /// Proctoring intervals
    Proctor(proctor::AlarmMessage),
    /// Controller alarms
    Session(controller::AlarmMessage),
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        controller::TerminationReason,
        exam::question::QuestionId,
        proctor::{Device, ViolationKind},
    };

    #[test]
    fn test_update_message_json() {
        let message: UpdateMessage = controller::UpdateMessage::Tick {
            remaining_seconds: 42,
        }
        .into();
        assert_eq!(
            message.to_message(),
            r#"{"Session":{"Tick":{"remaining_seconds":42}}}"#
        );

        let message: UpdateMessage = exam::pipeline::UpdateMessage::AnswerSaved {
            question_id: QuestionId::from("q1"),
        }
        .into();
        assert_eq!(
            message.to_message(),
            r#"{"Answer":{"AnswerSaved":{"question_id":"q1"}}}"#
        );

        let message: UpdateMessage =
            proctor::UpdateMessage::PermissionDenied(Device::Camera).into();
        assert_eq!(
            message.to_message(),
            r#"{"Proctor":{"PermissionDenied":"Camera"}}"#
        );
    }

    #[test]
    fn test_submitting_sync_message_json() {
        let message = SyncMessage::Submitting {
            reason: TerminationReason::IntegrityFailed(ViolationKind::TabSwitch),
        };
        assert_eq!(
            message.to_message(),
            r#"{"Submitting":{"reason":{"IntegrityFailed":"TabSwitch"}}}"#
        );
    }

    #[test]
    fn test_alarm_message_round_trip() {
        let alarm: AlarmMessage = timer::AlarmMessage::Tick { generation: 3 }.into();
        let json = serde_json::to_string(&alarm).unwrap();
        assert_eq!(serde_json::from_str::<AlarmMessage>(&json).unwrap(), alarm);
    }
}
