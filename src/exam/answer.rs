//! Answers and their wire payloads
//!
//! An [`Answer`] is the single logical answer a student has given to a
//! question. Every write of an answer is serialised into a [`WritePayload`]
//! whose shape depends on the question type.

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use web_time::{SystemTime, UNIX_EPOCH};

use super::question::{PayloadFormat, Question, QuestionId};

/// A file attached to an answer
#[derive(Clone, PartialEq, Eq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Name of the file as chosen by the student
    #[garde(length(min = 1, max = 255))]
    pub file_name: String,
    /// MIME type of the file
    #[garde(length(min = 1, max = 255))]
    pub mime_type: String,
    /// Raw content of the file
    #[serde(skip_serializing)]
    #[garde(length(min = 1, max = crate::constants::answer::MAX_ATTACHMENT_BYTES))]
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    /// Prints the attachment without its content
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Content of an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AnswerContent {
    /// Textual content, including the text of a chosen option
    Text(String),
    /// A file reference
    File(Attachment),
}

impl AnswerContent {
    /// Returns the text sent as `answerText` for this content
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::File(attachment) => &attachment.file_name,
        }
    }

    /// Whether the content counts as an answer
    pub fn is_answered(&self) -> bool {
        match self {
            Self::Text(text) => !text.trim().is_empty(),
            Self::File(attachment) => !attachment.bytes.is_empty(),
        }
    }
}

/// The answer given to a single question
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    /// The question this answer belongs to
    pub question_id: QuestionId,
    /// What the student answered
    pub content: AnswerContent,
    /// Seconds spent on the question before this answer was written
    pub duration_seconds: u64,
    /// Whether the content counts as an answer
    pub is_answered: bool,
    /// When the answer was written
    pub submitted_at: Option<SystemTime>,
}

impl Answer {
    /// Creates an answer written at `submitted_at`
    pub fn new(
        question_id: QuestionId,
        content: AnswerContent,
        duration_seconds: u64,
        submitted_at: SystemTime,
    ) -> Self {
        let is_answered = content.is_answered();
        Self {
            question_id,
            content,
            duration_seconds,
            is_answered,
            submitted_at: Some(submitted_at),
        }
    }

    /// Builds the wire payload for this answer to `question`
    pub fn to_payload(&self, question: &Question) -> WritePayload {
        let fields = AnswerPayload {
            question_id: self.question_id.clone(),
            answer_text: self.content.text().to_owned(),
            answer_duration: self.duration_seconds,
            answer_marks: question.marks(),
            is_answered: self.is_answered,
            answer_time: self.submitted_at.map_or(0, millis_since_epoch),
        };

        match (question.kind().format(), &self.content) {
            (PayloadFormat::Multipart, AnswerContent::File(attachment)) => WritePayload::Multipart {
                fields,
                attachment: attachment.clone(),
            },
            (PayloadFormat::Choice, _) => WritePayload::Choice(fields),
            _ => WritePayload::Text(fields),
        }
    }
}

/// Milliseconds between the unix epoch and `time`
fn millis_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Structured fields of every answer write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    /// The question being answered
    pub question_id: QuestionId,
    /// Textual answer, option text or file name
    pub answer_text: String,
    /// Seconds spent since the question was shown or last written
    pub answer_duration: u64,
    /// Marks of the question
    pub answer_marks: u64,
    /// Whether the answer counts as answered
    pub is_answered: bool,
    /// Time of the write in milliseconds since the unix epoch
    pub answer_time: u64,
}

/// A serialised answer write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritePayload {
    /// A chosen option for the multiple choice endpoint
    Choice(AnswerPayload),
    /// A structured textual answer
    Text(AnswerPayload),
    /// Answer fields plus a binary attachment
    Multipart {
        /// The structured fields, sent as form parts
        fields: AnswerPayload,
        /// The attached file
        attachment: Attachment,
    },
}

impl WritePayload {
    /// The structured fields of the write
    pub fn fields(&self) -> &AnswerPayload {
        match self {
            Self::Choice(fields) | Self::Text(fields) | Self::Multipart { fields, .. } => fields,
        }
    }

    /// Serialises the structured fields as a JSON body
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self.fields())
    }

    /// Returns the text parts of a multipart form, in field order
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let fields = self.fields();
        vec![
            ("questionId", fields.question_id.to_string()),
            ("answerText", fields.answer_text.clone()),
            ("answerDuration", fields.answer_duration.to_string()),
            ("answerMarks", fields.answer_marks.to_string()),
            ("isAnswered", fields.is_answered.to_string()),
            ("answerTime", fields.answer_time.to_string()),
        ]
    }

    /// The attached file, if the write carries one
    pub fn attachment(&self) -> Option<&Attachment> {
        match self {
            Self::Multipart { attachment, .. } => Some(attachment),
            Self::Choice(_) | Self::Text(_) => None,
        }
    }
}

/// Answer as presented to the student
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerView {
    /// The answered question
    pub question_id: QuestionId,
    /// Text of the answer or name of the attached file
    pub text: String,
    /// Name of the attached file
    pub file_name: Option<String>,
    /// Whether the content counts as an answer
    pub is_answered: bool,
}

impl From<&Answer> for AnswerView {
    fn from(answer: &Answer) -> Self {
        Self {
            question_id: answer.question_id.clone(),
            text: answer.content.text().to_owned(),
            file_name: match &answer.content {
                AnswerContent::File(attachment) => Some(attachment.file_name.clone()),
                AnswerContent::Text(_) => None,
            },
            is_answered: answer.is_answered,
        }
    }
}
