//! Answer pipeline
//!
//! The pipeline owns every answer of a session. Edits to immediate-submit
//! questions are written right away and applied optimistically, rolling
//! back if the write fails. Edits to deferred-submit questions only touch
//! an unsaved draft until the student submits that question. Once the
//! session is no longer active every edit is refused, and once it is
//! submitted late completions are ignored as well.

use std::collections::HashMap;

use garde::Validate;
use itertools::Itertools;
use serde::Serialize;
use serde_with::skip_serializing_none;
use tracing::{debug, warn};
use web_time::SystemTime;

use crate::{
    api::{ApiError, ExamApi, Ticket, Tickets},
    controller::SessionState,
    session::Tunnel,
};

use super::{
    Error,
    answer::{Answer, AnswerContent, AnswerView, Attachment, WritePayload},
    question::{ExamId, Question, QuestionId, QuestionKind, SubmissionPolicy},
};

/// Progress of a single question as shown in the question overview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuestionStatus {
    /// Nothing was answered yet
    Unanswered,
    /// A deferred question has edits that were not submitted
    Unsaved,
    /// A write for this question is still outstanding
    Pending,
    /// The last write was acknowledged
    Saved,
}

/// Update messages sent to the view about answers
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub enum UpdateMessage {
    /// An answer changed locally and its write was issued
    AnswerUpdated {
        /// The new answer
        answer: AnswerView,
    },
    /// The exam service acknowledged the last write of a question
    AnswerSaved {
        /// The saved question
        question_id: QuestionId,
    },
    /// A write failed and the answer was restored to its prior value
    AnswerReverted {
        /// The question whose write failed
        question_id: QuestionId,
        /// The restored answer, `None` when the question is unanswered again
        answer: Option<AnswerView>,
        /// Why the write failed
        error: ApiError,
    },
}

/// A write that has been issued but not completed
#[derive(Debug, Clone)]
struct PendingWrite {
    ticket: Ticket,
    /// The answer this write replaced
    previous: Option<Answer>,
    /// The write that produced `previous`, if any
    replaced: Option<Ticket>,
    written: Answer,
}

/// Everything the pipeline knows about one question
#[derive(Debug, Clone, Default)]
struct Slot {
    /// The answer as last written, optimistically
    saved: Option<Answer>,
    /// The write that produced `saved`
    applied: Option<Ticket>,
    /// Unsaved buffer of a deferred question
    draft: Option<String>,
    /// Writes still waiting for their completion
    pending: Vec<PendingWrite>,
    /// Elapsed exam second at which the answer timer of this question started
    marked_at: Option<u64>,
}

/// Buffers, serialises and writes the answers of one session
#[derive(Debug, Clone)]
pub struct AnswerPipeline {
    exam_id: ExamId,
    questions: Vec<Question>,
    slots: HashMap<QuestionId, Slot>,
}

impl AnswerPipeline {
    /// Creates a pipeline with no answers for the given questions
    pub fn new(exam_id: ExamId, questions: Vec<Question>) -> Self {
        let slots = questions
            .iter()
            .map(|question| (question.id().clone(), Slot::default()))
            .collect();
        Self {
            exam_id,
            questions,
            slots,
        }
    }

    /// The questions of the exam in display order
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Looks up a question by id
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownQuestion`] if the exam has no such question.
    pub fn question(&self, question_id: &QuestionId) -> Result<&Question, Error> {
        self.questions
            .iter()
            .find(|question| question.id() == question_id)
            .ok_or_else(|| Error::UnknownQuestion(question_id.clone()))
    }

    /// The current answer of a question, including optimistic edits
    pub fn answer(&self, question_id: &QuestionId) -> Option<&Answer> {
        self.slots.get(question_id)?.saved.as_ref()
    }

    /// The unsaved draft of a deferred question
    pub fn draft(&self, question_id: &QuestionId) -> Option<&str> {
        self.slots.get(question_id)?.draft.as_deref()
    }

    /// Progress of a question
    pub fn status(&self, question_id: &QuestionId) -> QuestionStatus {
        match self.slots.get(question_id) {
            Some(slot) if !slot.pending.is_empty() => QuestionStatus::Pending,
            Some(slot) if slot.draft.is_some() => QuestionStatus::Unsaved,
            Some(Slot {
                saved: Some(answer),
                ..
            }) if answer.is_answered => QuestionStatus::Saved,
            _ => QuestionStatus::Unanswered,
        }
    }

    /// Progress of every question in display order
    pub fn statuses(&self) -> Vec<QuestionStatus> {
        self.questions
            .iter()
            .map(|question| self.status(question.id()))
            .collect_vec()
    }

    /// Number of questions whose current answer counts as answered
    pub fn answered_count(&self) -> usize {
        self.slots
            .values()
            .filter_map(|slot| slot.saved.as_ref())
            .filter(|answer| answer.is_answered)
            .count()
    }

    /// Whether any write is still outstanding
    pub fn has_pending_writes(&self) -> bool {
        self.slots.values().any(|slot| !slot.pending.is_empty())
    }

    /// Starts the answer timer of a question the first time it is shown
    pub fn mark_displayed(&mut self, question_id: &QuestionId, elapsed: u64) {
        if let Some(slot) = self.slots.get_mut(question_id) {
            slot.marked_at.get_or_insert(elapsed);
        }
    }

    /// Selects an option of a multiple choice question and writes it
    ///
    /// # Arguments
    ///
    /// * `question_id` - The multiple choice question
    /// * `index` - Index of the selected option
    /// * `state` - Current state of the session
    /// * `elapsed` - Seconds elapsed since the exam started
    /// * `tickets` - Ticket counter of the session
    /// * `api` - The exam service
    /// * `tunnel` - The student's view
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] once the session stopped accepting answers,
    /// and an error if the question is unknown, not a multiple choice
    /// question, or has no such option.
    pub fn select_option<T: Tunnel, A: ExamApi>(
        &mut self,
        question_id: &QuestionId,
        index: usize,
        state: SessionState,
        elapsed: u64,
        tickets: &mut Tickets,
        api: &A,
        tunnel: &T,
    ) -> Result<(), Error> {
        Self::ensure_accepting(state)?;

        let question = self.question(question_id)?;
        if !matches!(question.kind(), QuestionKind::MultipleChoice { .. }) {
            return Err(Error::WrongKind {
                question: question_id.clone(),
                attempted: "option",
            });
        }
        let option = question
            .option(index)
            .ok_or_else(|| Error::OptionOutOfRange {
                question: question_id.clone(),
                index,
            })?
            .to_owned();

        self.write(
            question_id,
            AnswerContent::Text(option),
            elapsed,
            tickets,
            api,
            tunnel,
        )
    }

    /// Applies a text edit
    ///
    /// Immediate-submit questions write the text right away. Deferred-submit
    /// questions only update their unsaved draft.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] once the session stopped accepting answers,
    /// and an error if the question is unknown, does not take text, or the
    /// text is too long.
    pub fn edit_text<T: Tunnel, A: ExamApi>(
        &mut self,
        question_id: &QuestionId,
        text: String,
        state: SessionState,
        elapsed: u64,
        tickets: &mut Tickets,
        api: &A,
        tunnel: &T,
    ) -> Result<(), Error> {
        Self::ensure_accepting(state)?;

        let question = self.question(question_id)?;
        if matches!(
            question.kind(),
            QuestionKind::MultipleChoice { .. } | QuestionKind::Assignment
        ) {
            return Err(Error::WrongKind {
                question: question_id.clone(),
                attempted: "text",
            });
        }
        if text.chars().count() > crate::constants::answer::MAX_TEXT_LENGTH {
            return Err(Error::Rejected {
                question: question_id.clone(),
                reason: "answer is too long".to_owned(),
            });
        }

        let policy = question.kind().policy();
        match policy {
            SubmissionPolicy::Immediate => self.write(
                question_id,
                AnswerContent::Text(text),
                elapsed,
                tickets,
                api,
                tunnel,
            ),
            SubmissionPolicy::Deferred => {
                if let Some(slot) = self.slots.get_mut(question_id) {
                    slot.draft = Some(text);
                }
                Ok(())
            }
        }
    }

    /// Attaches a file to an assignment question and uploads it
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] once the session stopped accepting answers,
    /// and an error if the question is unknown, is not an assignment, or the
    /// attachment is not acceptable.
    pub fn attach_file<T: Tunnel, A: ExamApi>(
        &mut self,
        question_id: &QuestionId,
        attachment: Attachment,
        state: SessionState,
        elapsed: u64,
        tickets: &mut Tickets,
        api: &A,
        tunnel: &T,
    ) -> Result<(), Error> {
        Self::ensure_accepting(state)?;

        let question = self.question(question_id)?;
        if !matches!(question.kind(), QuestionKind::Assignment) {
            return Err(Error::WrongKind {
                question: question_id.clone(),
                attempted: "file",
            });
        }
        attachment.validate().map_err(|report| Error::Rejected {
            question: question_id.clone(),
            reason: report.to_string(),
        })?;

        self.write(
            question_id,
            AnswerContent::File(attachment),
            elapsed,
            tickets,
            api,
            tunnel,
        )
    }

    /// Writes the unsaved draft of a deferred question
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] once the session stopped accepting answers,
    /// [`Error::NothingToSubmit`] when the question has no draft, and an
    /// error if the question is unknown or is not deferred.
    pub fn submit_question<T: Tunnel, A: ExamApi>(
        &mut self,
        question_id: &QuestionId,
        state: SessionState,
        elapsed: u64,
        tickets: &mut Tickets,
        api: &A,
        tunnel: &T,
    ) -> Result<(), Error> {
        Self::ensure_accepting(state)?;

        if self.question(question_id)?.kind().policy() != SubmissionPolicy::Deferred {
            return Err(Error::WrongKind {
                question: question_id.clone(),
                attempted: "explicit submit",
            });
        }
        let draft = self
            .draft(question_id)
            .ok_or_else(|| Error::NothingToSubmit(question_id.clone()))?
            .to_owned();

        self.write(
            question_id,
            AnswerContent::Text(draft),
            elapsed,
            tickets,
            api,
            tunnel,
        )
    }

    /// Handles the completion of a write
    ///
    /// # Returns
    ///
    /// `true` if the ticket belonged to an answer write, `false` otherwise
    pub fn receive_completion<T: Tunnel>(
        &mut self,
        ticket: Ticket,
        result: Result<(), ApiError>,
        state: SessionState,
        tunnel: &T,
    ) -> bool {
        let Some((question_id, position)) = self.slots.iter().find_map(|(id, slot)| {
            slot.pending
                .iter()
                .position(|pending| pending.ticket == ticket)
                .map(|position| (id.clone(), position))
        }) else {
            return false;
        };

        let Some(slot) = self.slots.get_mut(&question_id) else {
            return false;
        };
        let pending = slot.pending.remove(position);

        if state == SessionState::Submitted {
            debug!(%ticket, %question_id, "ignoring answer completion after submission");
            return true;
        }

        match result {
            Ok(()) => {
                if slot.draft.as_deref() == Some(pending.written.content.text()) {
                    slot.draft = None;
                }
                tunnel.send_message(&UpdateMessage::AnswerSaved { question_id }.into());
            }
            Err(error) => {
                warn!(%ticket, %question_id, %error, "answer write failed");
                if slot.applied == Some(pending.ticket) {
                    slot.saved = pending.previous;
                    slot.applied = pending.replaced;
                    tunnel.send_message(
                        &UpdateMessage::AnswerReverted {
                            question_id,
                            answer: slot.saved.as_ref().map(AnswerView::from),
                            error,
                        }
                        .into(),
                    );
                } else {
                    // A newer edit superseded this write; its rollback target moves back.
                    for later in &mut slot.pending {
                        if later.replaced == Some(pending.ticket) {
                            later.previous.clone_from(&pending.previous);
                            later.replaced = pending.replaced;
                        }
                    }
                }
            }
        }

        true
    }

    /// Refuses edits unless the session is active
    fn ensure_accepting(state: SessionState) -> Result<(), Error> {
        if state == SessionState::Active {
            Ok(())
        } else {
            debug!(?state, "refusing answer edit");
            Err(Error::Locked)
        }
    }

    /// Applies `content` optimistically and issues its write
    fn write<T: Tunnel, A: ExamApi>(
        &mut self,
        question_id: &QuestionId,
        content: AnswerContent,
        elapsed: u64,
        tickets: &mut Tickets,
        api: &A,
        tunnel: &T,
    ) -> Result<(), Error> {
        let question = self
            .questions
            .iter()
            .find(|question| question.id() == question_id)
            .ok_or_else(|| Error::UnknownQuestion(question_id.clone()))?;
        let slot = self
            .slots
            .get_mut(question_id)
            .ok_or_else(|| Error::UnknownQuestion(question_id.clone()))?;

        let started = slot.marked_at.unwrap_or(elapsed);
        slot.marked_at = Some(elapsed);

        let answer = Answer::new(
            question_id.clone(),
            content,
            elapsed.saturating_sub(started),
            SystemTime::now(),
        );
        let payload = answer.to_payload(question);
        let ticket = tickets.issue();

        slot.pending.push(PendingWrite {
            ticket,
            previous: slot.saved.replace(answer.clone()),
            replaced: slot.applied.replace(ticket),
            written: answer.clone(),
        });

        debug!(%ticket, %question_id, "writing answer");
        match &payload {
            WritePayload::Choice(_) => api.submit_mcq_answer(ticket, &self.exam_id, &payload),
            WritePayload::Text(_) | WritePayload::Multipart { .. } => {
                api.submit_answer(ticket, question_id, &payload);
            }
        }

        tunnel.send_message(
            &UpdateMessage::AnswerUpdated {
                answer: AnswerView::from(&answer),
            }
            .into(),
        );

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        api::tests::{Call, MockApi},
        session::tests::MockTunnel,
    };

    fn questions() -> Vec<Question> {
        vec![
            Question::new(
                "mcq",
                QuestionKind::MultipleChoice {
                    options: vec!["A".to_owned(), "B".to_owned(), "C".to_owned()],
                },
                "Choose",
                2,
            ),
            Question::new("essay", QuestionKind::Essay, "Write", 10),
            Question::new("short", QuestionKind::ShortAnswer, "Name it", 1),
            Question::new("upload", QuestionKind::Assignment, "Upload", 5),
            Question::new("code", QuestionKind::Coding, "Implement", 8),
        ]
    }

    struct Fixture {
        pipeline: AnswerPipeline,
        tickets: Tickets,
        api: MockApi,
        tunnel: MockTunnel,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                pipeline: AnswerPipeline::new(ExamId::from("exam"), questions()),
                tickets: Tickets::default(),
                api: MockApi::default(),
                tunnel: MockTunnel::default(),
            }
        }

        fn select(&mut self, index: usize) -> Result<(), Error> {
            self.pipeline.select_option(
                &QuestionId::from("mcq"),
                index,
                SessionState::Active,
                0,
                &mut self.tickets,
                &self.api,
                &self.tunnel,
            )
        }

        fn edit(&mut self, id: &str, text: &str, state: SessionState) -> Result<(), Error> {
            self.pipeline.edit_text(
                &QuestionId::from(id),
                text.to_owned(),
                state,
                0,
                &mut self.tickets,
                &self.api,
                &self.tunnel,
            )
        }

        fn submit(&mut self, id: &str, elapsed: u64) -> Result<(), Error> {
            self.pipeline.submit_question(
                &QuestionId::from(id),
                SessionState::Active,
                elapsed,
                &mut self.tickets,
                &self.api,
                &self.tunnel,
            )
        }

        fn complete(&mut self, result: Result<(), ApiError>) -> bool {
            let ticket = self.api.last_ticket().unwrap();
            self.pipeline
                .receive_completion(ticket, result, SessionState::Active, &self.tunnel)
        }

        fn answer_text(&self, id: &str) -> Option<String> {
            self.pipeline
                .answer(&QuestionId::from(id))
                .map(|answer| answer.content.text().to_owned())
        }
    }

    fn network_error() -> Result<(), ApiError> {
        Err(ApiError::Network("connection reset".to_owned()))
    }

    #[test]
    fn test_immediate_write_success_keeps_value() {
        let mut fixture = Fixture::new();
        fixture.select(1).unwrap();

        assert_eq!(fixture.answer_text("mcq").as_deref(), Some("B"));
        assert!(matches!(fixture.api.calls()[0], Call::McqAnswer(..)));
        assert_eq!(
            fixture.pipeline.status(&QuestionId::from("mcq")),
            QuestionStatus::Pending
        );

        assert!(fixture.complete(Ok(())));
        assert_eq!(fixture.answer_text("mcq").as_deref(), Some("B"));
        assert_eq!(
            fixture.pipeline.status(&QuestionId::from("mcq")),
            QuestionStatus::Saved
        );
    }

    #[test]
    fn test_immediate_write_failure_rolls_back_to_unset() {
        let mut fixture = Fixture::new();
        fixture.select(1).unwrap();
        fixture.complete(network_error());

        assert_eq!(fixture.answer_text("mcq"), None);
        let reverted = fixture.tunnel.messages().into_iter().any(|message| {
            matches!(
                message,
                crate::UpdateMessage::Answer(UpdateMessage::AnswerReverted { answer: None, .. })
            )
        });
        assert!(reverted);
    }

    #[test]
    fn test_immediate_write_failure_rolls_back_to_previous_selection() {
        let mut fixture = Fixture::new();
        fixture.select(0).unwrap();
        fixture.complete(Ok(()));

        fixture.select(1).unwrap();
        fixture.complete(network_error());

        assert_eq!(fixture.answer_text("mcq").as_deref(), Some("A"));
    }

    #[test]
    fn test_superseded_write_failure_keeps_newer_value() {
        let mut fixture = Fixture::new();
        fixture.select(0).unwrap();
        let first = fixture.api.last_ticket().unwrap();
        fixture.select(2).unwrap();

        fixture.pipeline.receive_completion(
            first,
            network_error(),
            SessionState::Active,
            &fixture.tunnel,
        );
        assert_eq!(fixture.answer_text("mcq").as_deref(), Some("C"));

        // The newer write now rolls back past the failed one.
        fixture.complete(network_error());
        assert_eq!(fixture.answer_text("mcq"), None);
    }

    #[test]
    fn test_identical_writes_roll_back_by_ticket() {
        let mut fixture = Fixture::new();
        fixture.select(1).unwrap();
        let first = fixture.api.last_ticket().unwrap();
        fixture.select(1).unwrap();

        fixture.pipeline.receive_completion(
            first,
            network_error(),
            SessionState::Active,
            &fixture.tunnel,
        );
        assert_eq!(fixture.answer_text("mcq").as_deref(), Some("B"));
        assert_eq!(
            fixture.pipeline.status(&QuestionId::from("mcq")),
            QuestionStatus::Pending
        );
        let reverted = fixture.tunnel.messages().into_iter().any(|message| {
            matches!(
                message,
                crate::UpdateMessage::Answer(UpdateMessage::AnswerReverted { .. })
            )
        });
        assert!(!reverted);

        fixture.complete(network_error());
        assert_eq!(fixture.answer_text("mcq"), None);
    }

    #[test]
    fn test_short_answer_is_written_on_every_edit() {
        let mut fixture = Fixture::new();
        fixture.edit("short", "Ad", SessionState::Active).unwrap();
        fixture.edit("short", "Ada", SessionState::Active).unwrap();
        assert_eq!(fixture.api.write_count(), 2);
        assert!(matches!(fixture.api.calls()[1], Call::Answer(..)));
    }

    #[test]
    fn test_deferred_edits_do_not_write() {
        let mut fixture = Fixture::new();
        fixture.edit("essay", "First", SessionState::Active).unwrap();
        fixture.edit("essay", "First draft", SessionState::Active).unwrap();

        assert_eq!(fixture.api.write_count(), 0);
        assert_eq!(
            fixture.pipeline.draft(&QuestionId::from("essay")),
            Some("First draft")
        );
        assert_eq!(
            fixture.pipeline.status(&QuestionId::from("essay")),
            QuestionStatus::Unsaved
        );
    }

    #[test]
    fn test_deferred_submit_writes_current_buffer_once() {
        let mut fixture = Fixture::new();
        fixture.edit("code", "fn main() {}", SessionState::Active).unwrap();
        fixture.submit("code", 0).unwrap();

        let calls = fixture.api.calls();
        assert_eq!(calls.len(), 1);
        let Call::Answer(_, question_id, payload) = &calls[0] else {
            panic!("expected an answer write, got {:?}", calls[0]);
        };
        assert_eq!(question_id, &QuestionId::from("code"));
        assert_eq!(payload.fields().answer_text, "fn main() {}");

        fixture.complete(Ok(()));
        assert_eq!(fixture.pipeline.draft(&QuestionId::from("code")), None);
        assert_eq!(
            fixture.pipeline.status(&QuestionId::from("code")),
            QuestionStatus::Saved
        );
    }

    #[test]
    fn test_deferred_submit_failure_keeps_draft() {
        let mut fixture = Fixture::new();
        fixture.edit("essay", "Lost?", SessionState::Active).unwrap();
        fixture.submit("essay", 0).unwrap();
        fixture.complete(network_error());

        assert_eq!(fixture.answer_text("essay"), None);
        assert_eq!(
            fixture.pipeline.draft(&QuestionId::from("essay")),
            Some("Lost?")
        );
    }

    #[test]
    fn test_submit_without_draft() {
        let mut fixture = Fixture::new();
        assert_eq!(
            fixture.submit("essay", 0),
            Err(Error::NothingToSubmit(QuestionId::from("essay")))
        );
        assert!(matches!(
            fixture.submit("short", 0),
            Err(Error::WrongKind { .. })
        ));
    }

    #[test]
    fn test_answer_duration_resets_on_each_write() {
        let mut fixture = Fixture::new();
        let essay = QuestionId::from("essay");
        fixture.pipeline.mark_displayed(&essay, 10);
        fixture.pipeline.mark_displayed(&essay, 15);

        fixture.edit("essay", "one", SessionState::Active).unwrap();
        fixture.submit("essay", 40).unwrap();
        fixture.edit("essay", "two", SessionState::Active).unwrap();
        fixture.submit("essay", 55).unwrap();

        let durations = fixture
            .api
            .calls()
            .iter()
            .filter_map(|call| match call {
                Call::Answer(_, _, payload) => Some(payload.fields().answer_duration),
                _ => None,
            })
            .collect_vec();
        assert_eq!(durations, vec![30, 15]);
    }

    #[test]
    fn test_attachment_is_sent_as_multipart() {
        let mut fixture = Fixture::new();
        fixture
            .pipeline
            .attach_file(
                &QuestionId::from("upload"),
                Attachment {
                    file_name: "work.zip".to_owned(),
                    mime_type: "application/zip".to_owned(),
                    bytes: vec![0; 16],
                },
                SessionState::Active,
                0,
                &mut fixture.tickets,
                &fixture.api,
                &fixture.tunnel,
            )
            .unwrap();

        let Call::Answer(_, _, payload) = &fixture.api.calls()[0] else {
            panic!("expected an answer write");
        };
        assert!(matches!(payload, WritePayload::Multipart { .. }));
        assert_eq!(payload.fields().answer_text, "work.zip");
    }

    #[test]
    fn test_empty_attachment_is_rejected() {
        let mut fixture = Fixture::new();
        let result = fixture.pipeline.attach_file(
            &QuestionId::from("upload"),
            Attachment {
                file_name: "empty.txt".to_owned(),
                mime_type: "text/plain".to_owned(),
                bytes: vec![],
            },
            SessionState::Active,
            0,
            &mut fixture.tickets,
            &fixture.api,
            &fixture.tunnel,
        );
        assert!(matches!(result, Err(Error::Rejected { .. })));
        assert_eq!(fixture.api.write_count(), 0);
    }

    #[test]
    fn test_wrong_kind_and_range_errors() {
        let mut fixture = Fixture::new();
        assert!(matches!(
            fixture.select(7),
            Err(Error::OptionOutOfRange { index: 7, .. })
        ));
        assert!(matches!(
            fixture.edit("mcq", "B", SessionState::Active),
            Err(Error::WrongKind { .. })
        ));
        assert!(matches!(
            fixture.edit("missing", "x", SessionState::Active),
            Err(Error::UnknownQuestion(_))
        ));
    }

    #[test]
    fn test_edits_refused_when_not_active() {
        let mut fixture = Fixture::new();
        assert_eq!(
            fixture.edit("short", "late", SessionState::Submitting),
            Err(Error::Locked)
        );
        assert_eq!(
            fixture.edit("essay", "late", SessionState::Submitted),
            Err(Error::Locked)
        );
        assert_eq!(fixture.api.write_count(), 0);
        assert_eq!(fixture.pipeline.draft(&QuestionId::from("essay")), None);
    }

    #[test]
    fn test_completion_after_submission_is_ignored() {
        let mut fixture = Fixture::new();
        fixture.select(1).unwrap();
        let ticket = fixture.api.last_ticket().unwrap();

        assert!(fixture.pipeline.receive_completion(
            ticket,
            network_error(),
            SessionState::Submitted,
            &fixture.tunnel,
        ));
        assert_eq!(fixture.answer_text("mcq").as_deref(), Some("B"));
        assert!(!fixture.pipeline.has_pending_writes());
        assert_ne!(
            fixture.pipeline.status(&QuestionId::from("mcq")),
            QuestionStatus::Pending
        );
    }

    #[test]
    fn test_text_limit_counts_characters() {
        let mut fixture = Fixture::new();
        let essay = QuestionId::from("essay");
        let limit = crate::constants::answer::MAX_TEXT_LENGTH;

        let at_limit = "é".repeat(limit);
        fixture.edit("essay", &at_limit, SessionState::Active).unwrap();
        assert_eq!(
            fixture.pipeline.draft(&essay).map(str::len),
            Some(at_limit.len())
        );

        let over_limit = "é".repeat(limit + 1);
        assert!(matches!(
            fixture.edit("essay", &over_limit, SessionState::Active),
            Err(Error::Rejected { .. })
        ));
    }

    #[test]
    fn test_unknown_ticket_is_not_claimed() {
        let mut fixture = Fixture::new();
        let foreign = fixture.tickets.issue();
        assert!(!fixture.pipeline.receive_completion(
            foreign,
            Ok(()),
            SessionState::Active,
            &fixture.tunnel,
        ));
    }

    #[test]
    fn test_answered_count() {
        let mut fixture = Fixture::new();
        fixture.select(0).unwrap();
        fixture.edit("short", "  ", SessionState::Active).unwrap();
        assert_eq!(fixture.pipeline.answered_count(), 1);
        assert_eq!(fixture.pipeline.statuses()[2], QuestionStatus::Pending);
    }
}
