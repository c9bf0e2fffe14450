//! Exam details and question definitions
//!
//! This module defines the exam description returned by the exam details
//! operation and the closed set of question types. Every question type
//! carries its own submission policy and payload format so the answer
//! pipeline never branches on type names.

use garde::Validate;
use serde::{Deserialize, Serialize};

/// Identifier of an exam as assigned by the exam service
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct ExamId(String);

impl From<&str> for ExamId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Identifier of a question as assigned by the exam service
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct QuestionId(String);

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// How edits to an answer reach the exam service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionPolicy {
    /// Every edit is written as soon as it happens
    Immediate,
    /// Edits stay in a local buffer until the student submits the question
    Deferred,
}

/// Shape of the request carrying an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadFormat {
    /// A chosen option, sent through the multiple choice endpoint
    Choice,
    /// A structured textual payload
    Text,
    /// A multipart form carrying the answer fields and a file
    Multipart,
}

/// The type of a question along with its type specific data
///
/// Adding a question type means adding a variant here and answering
/// [`QuestionKind::policy`] and [`QuestionKind::format`] for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(tag = "type")]
pub enum QuestionKind {
    /// A question with a fixed list of options, one of which is selected
    #[serde(rename = "MCQ")]
    MultipleChoice {
        /// The options offered to the student
        #[garde(
            length(
                min = crate::constants::exam::MIN_OPTION_COUNT,
                max = crate::constants::exam::MAX_OPTION_COUNT
            ),
            inner(length(chars, min = 1))
        )]
        options: Vec<String>,
    },
    /// A long free text answer
    Essay,
    /// A free form program
    Coding,
    /// A short structured answer
    ShortAnswer,
    /// A file upload
    Assignment,
}

impl QuestionKind {
    /// Returns when edits to answers of this kind are written
    pub fn policy(&self) -> SubmissionPolicy {
        match self {
            Self::MultipleChoice { .. } | Self::ShortAnswer | Self::Assignment => {
                SubmissionPolicy::Immediate
            }
            Self::Essay | Self::Coding => SubmissionPolicy::Deferred,
        }
    }

    /// Returns the request shape used for answers of this kind
    pub fn format(&self) -> PayloadFormat {
        match self {
            Self::MultipleChoice { .. } => PayloadFormat::Choice,
            Self::Essay | Self::Coding | Self::ShortAnswer => PayloadFormat::Text,
            Self::Assignment => PayloadFormat::Multipart,
        }
    }

    /// Returns a short human readable label for the kind
    pub fn label(&self) -> &'static str {
        match self {
            Self::MultipleChoice { .. } => "Multiple choice",
            Self::Essay => "Essay",
            Self::Coding => "Coding",
            Self::ShortAnswer => "Short answer",
            Self::Assignment => "Assignment",
        }
    }
}

/// A single question of an exam
///
/// Questions are immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Identifier of the question
    #[garde(skip)]
    id: QuestionId,
    /// Type of the question
    #[serde(flatten)]
    #[garde(dive)]
    kind: QuestionKind,
    /// Title shown above the question
    #[garde(length(chars, min = 1, max = crate::constants::exam::MAX_TITLE_LENGTH))]
    title: String,
    /// Longer description or statement of the question
    #[serde(default)]
    #[garde(length(chars, max = crate::constants::exam::MAX_DESCRIPTION_LENGTH))]
    description: String,
    /// Marks awarded for this question
    #[garde(skip)]
    marks: u64,
}

impl Question {
    /// Creates a question without a description
    pub fn new(
        id: impl Into<QuestionId>,
        kind: QuestionKind,
        title: impl Into<String>,
        marks: u64,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            description: String::new(),
            marks,
        }
    }

    /// Sets the description of the question
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Identifier of the question
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    /// Type of the question
    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    /// Title of the question
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Description of the question
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Marks awarded for this question
    pub fn marks(&self) -> u64 {
        self.marks
    }

    /// Returns the text of the option at `index` for multiple choice questions
    pub fn option(&self, index: usize) -> Option<&str> {
        match &self.kind {
            QuestionKind::MultipleChoice { options } => options.get(index).map(String::as_str),
            _ => None,
        }
    }
}

/// Exam description as returned by the exam details operation
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExamDetails {
    /// Length of the exam in minutes
    #[garde(range(
        min = crate::constants::exam::MIN_DURATION_MINUTES,
        max = crate::constants::exam::MAX_DURATION_MINUTES
    ))]
    duration_minutes: u64,
    /// Questions of the exam in display order
    #[garde(length(min = 1, max = crate::constants::exam::MAX_QUESTION_COUNT), dive)]
    questions: Vec<Question>,
}

impl ExamDetails {
    /// Creates exam details from a duration and questions
    pub fn new(duration_minutes: u64, questions: Vec<Question>) -> Self {
        Self {
            duration_minutes,
            questions,
        }
    }

    /// Length of the exam in seconds
    pub fn duration_seconds(&self) -> u64 {
        self.duration_minutes.saturating_mul(60)
    }

    /// Questions of the exam
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Validates the details and hands out the questions
    ///
    /// # Errors
    ///
    /// Returns [`super::Error::Invalid`] when a field is out of bounds and
    /// [`super::Error::DuplicateQuestion`] when two questions share an id.
    pub fn into_questions(self) -> Result<(u64, Vec<Question>), super::Error> {
        self.validate()
            .map_err(|report| super::Error::Invalid(report.to_string()))?;

        let mut seen = std::collections::HashSet::new();
        if let Some(duplicate) = self.questions.iter().find(|q| !seen.insert(q.id())) {
            return Err(super::Error::DuplicateQuestion(duplicate.id().clone()));
        }

        Ok((self.duration_seconds(), self.questions))
    }
}
