//! Exam content and answers
//!
//! This module contains the question types of an exam, the answers a
//! student gives, and the pipeline that writes those answers to the exam
//! service according to each question type's submission policy.

use serde::Serialize;
use thiserror::Error;

pub mod answer;
pub mod pipeline;
pub mod question;

use question::QuestionId;

/// Errors raised while loading an exam or editing answers
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The exam details failed validation
    #[error("invalid exam details: {0}")]
    Invalid(String),
    /// Two questions share the same id
    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),
    /// No question with this id belongs to the exam
    #[error("unknown question {0}")]
    UnknownQuestion(QuestionId),
    /// The edit does not apply to this type of question
    #[error("question {question} does not accept {attempted} answers")]
    WrongKind {
        /// The edited question
        question: QuestionId,
        /// The kind of edit that was attempted
        attempted: &'static str,
    },
    /// The chosen option does not exist
    #[error("question {question} has no option {index}")]
    OptionOutOfRange {
        /// The edited question
        question: QuestionId,
        /// The requested option index
        index: usize,
    },
    /// The answer is too long or the attachment is not acceptable
    #[error("answer to {question} rejected: {reason}")]
    Rejected {
        /// The edited question
        question: QuestionId,
        /// Why the answer was rejected
        reason: String,
    },
    /// A deferred question was submitted without unsaved changes
    #[error("question {0} has no unsaved changes")]
    NothingToSubmit(QuestionId),
    /// The session no longer accepts answers
    #[error("the exam is no longer accepting answers")]
    Locked,
}
