//! Exam service operations consumed by the session
//!
//! Every remote call is issued with a [`Ticket`]. The host performs the
//! call asynchronously and later reports the outcome for that ticket, in
//! whatever order the calls complete.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exam::{
    answer::WritePayload,
    question::{ExamId, QuestionId},
};

/// Correlates an issued remote call with its completion
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("#{_0}")]
pub struct Ticket(u64);

/// Hands out increasing tickets
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Tickets {
    next: u64,
}

impl Tickets {
    /// Returns a ticket never handed out before by this counter
    pub fn issue(&mut self) -> Ticket {
        let ticket = Ticket(self.next);
        self.next += 1;
        ticket
    }
}

/// Failure of a remote call
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request never reached the service or the response was lost
    #[error("network error: {0}")]
    Network(String),
    /// The service answered with an error status
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Message returned by the service
        message: String,
    },
}

/// Operations of the exam service
///
/// Implementations start the call and return immediately. The outcome is
/// delivered later through the session's completion handler using the
/// same ticket.
pub trait ExamApi {
    /// Fetches duration and questions of an exam
    fn get_exam_details(&self, ticket: Ticket, exam_id: &ExamId);

    /// Writes an answer, as a multipart form when the payload carries a file
    fn submit_answer(&self, ticket: Ticket, question_id: &QuestionId, payload: &WritePayload);

    /// Writes the chosen option of a multiple choice question
    fn submit_mcq_answer(&self, ticket: Ticket, exam_id: &ExamId, payload: &WritePayload);

    /// Submits the exam, ending the attempt on the service side
    fn submit_exam(&self, ticket: Ticket, exam_id: &ExamId);
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// A recorded call to the exam service
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        ExamDetails(Ticket, ExamId),
        Answer(Ticket, QuestionId, WritePayload),
        McqAnswer(Ticket, ExamId, WritePayload),
        SubmitExam(Ticket, ExamId),
    }

    /// Exam service double recording every call
    #[derive(Debug, Clone, Default)]
    pub(crate) struct MockApi {
        pub(crate) calls: Arc<Mutex<Vec<Call>>>,
    }

    impl MockApi {
        pub(crate) fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn submit_exam_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|call| matches!(call, Call::SubmitExam(..)))
                .count()
        }

        pub(crate) fn write_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|call| matches!(call, Call::Answer(..) | Call::McqAnswer(..)))
                .count()
        }

        pub(crate) fn last_ticket(&self) -> Option<Ticket> {
            self.calls().last().map(|call| match call {
                Call::ExamDetails(ticket, _)
                | Call::Answer(ticket, _, _)
                | Call::McqAnswer(ticket, _, _)
                | Call::SubmitExam(ticket, _) => *ticket,
            })
        }
    }

    impl ExamApi for MockApi {
        fn get_exam_details(&self, ticket: Ticket, exam_id: &ExamId) {
            self.calls
                .lock()
                .unwrap()
                .push(Call::ExamDetails(ticket, exam_id.clone()));
        }

        fn submit_answer(&self, ticket: Ticket, question_id: &QuestionId, payload: &WritePayload) {
            self.calls.lock().unwrap().push(Call::Answer(
                ticket,
                question_id.clone(),
                payload.clone(),
            ));
        }

        fn submit_mcq_answer(&self, ticket: Ticket, exam_id: &ExamId, payload: &WritePayload) {
            self.calls.lock().unwrap().push(Call::McqAnswer(
                ticket,
                exam_id.clone(),
                payload.clone(),
            ));
        }

        fn submit_exam(&self, ticket: Ticket, exam_id: &ExamId) {
            self.calls
                .lock()
                .unwrap()
                .push(Call::SubmitExam(ticket, exam_id.clone()));
        }
    }

    #[test]
    fn test_tickets_are_unique_and_increasing() {
        let mut tickets = Tickets::default();
        let first = tickets.issue();
        let second = tickets.issue();
        assert!(first < second);
        assert_eq!(first.to_string(), "#0");
        assert_eq!(second.to_string(), "#1");
    }

    #[test]
    fn test_api_error_display() {
        let error = ApiError::Server {
            status: 503,
            message: "unavailable".to_owned(),
        };
        assert_eq!(error.to_string(), "server error 503: unavailable");
        assert_eq!(
            ApiError::Network("timeout".to_owned()).to_string(),
            "network error: timeout"
        );
    }
}
