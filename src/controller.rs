//! Session controller
//!
//! The controller owns the state of one exam attempt. It starts the timer
//! and the signal sources, routes platform events, alarms and remote call
//! completions to the component they belong to, and runs the one-way
//! termination sequence:
//!
//! ```text
//! Active ──terminate(reason)──> Submitting ──submit completion──> Submitted
//! ```
//!
//! Every trigger (the student, the timer and the violation bound) goes
//! through [`ExamSession::terminate`], which enters `Submitting` with a
//! single compare-and-set, so exactly one submission is ever issued.

use std::{fmt::Display, str::FromStr};

use enum_map::EnumMap;
use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay, skip_serializing_none};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use web_time::Duration;

use crate::{
    api::{ApiError, ExamApi, Ticket, Tickets},
    constants::{
        self,
        controller::MAX_REDIRECT_DELAY_SECONDS,
        proctoring::{MAX_PHOTO_INTERVAL_SECONDS, MIN_PHOTO_INTERVAL_SECONDS},
    },
    exam::{
        self,
        answer::{AnswerView, Attachment},
        pipeline::{AnswerPipeline, QuestionStatus},
        question::{ExamDetails, ExamId, Question, QuestionId},
    },
    proctor::{
        self, Device, EventResponse, FaceDetection, PlatformEvent, SignalSources, SourceOptions,
        ViolationEvent, ViolationKind,
        aggregator::{self, CountingMode, Verdict, ViolationAggregator},
    },
    session::{Platform, Tunnel},
    timer::{self, SessionTimer, TickOutcome},
};

/// Lifecycle state of a session
///
/// The state only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Signal sources run, the timer ticks and answers are accepted
    Active,
    /// The exam submission was issued and has not completed
    Submitting,
    /// The attempt is over
    Submitted,
}

/// Why a session was terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// The student submitted the exam
    UserSubmitted,
    /// The timer reached zero
    TimeExpired,
    /// The warning bound was reached; carries the violation that reached it
    IntegrityFailed(ViolationKind),
}

impl TerminationReason {
    /// Explains the termination to the student
    pub fn describe(self) -> &'static str {
        match self {
            Self::UserSubmitted => "You submitted the exam.",
            Self::TimeExpired => "Time is up. Your exam was submitted automatically.",
            Self::IntegrityFailed(_) => {
                "Your exam was submitted automatically after too many proctoring warnings."
            }
        }
    }
}

/// A unique identifier of a session, used to correlate its log lines
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Validates that a duration in whole seconds falls within bounds
fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    val: &Duration,
    _ctx: &(),
) -> garde::Result {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "outside of bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

/// Tunable behaviour of a session
///
/// Every field has a default, so hosts only need to send what they change.
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Violations after which the session is terminated
    #[garde(range(
        min = constants::proctoring::MIN_WARNINGS,
        max = constants::proctoring::MAX_WARNINGS_LIMIT
    ))]
    max_warnings: u32,
    /// How violations within the same second are counted
    #[garde(skip)]
    counting_mode: CountingMode,
    /// Whether leaving a deferred question submits its unsaved draft
    #[garde(skip)]
    flush_on_navigate: bool,
    /// Time between two reference photo comparisons
    #[garde(custom(validate_duration::<MIN_PHOTO_INTERVAL_SECONDS, MAX_PHOTO_INTERVAL_SECONDS>))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    photo_interval: Duration,
    /// Largest face displacement in pixels still matching the reference photo
    #[garde(range(min = 0.0))]
    displacement_threshold: f64,
    /// Time the termination reason stays visible before navigating away
    #[garde(custom(validate_duration::<0, MAX_REDIRECT_DELAY_SECONDS>))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    redirect_delay: Duration,
    /// Remaining seconds at which the low time notice is shown
    #[garde(skip)]
    low_time_threshold_seconds: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_warnings: constants::proctoring::MAX_WARNINGS,
            counting_mode: CountingMode::default(),
            flush_on_navigate: false,
            photo_interval: Duration::from_secs(constants::proctoring::PHOTO_INTERVAL_SECONDS),
            displacement_threshold: constants::proctoring::DISPLACEMENT_THRESHOLD_PX,
            redirect_delay: Duration::from_secs(constants::controller::REDIRECT_DELAY_SECONDS),
            low_time_threshold_seconds: constants::timer::LOW_TIME_THRESHOLD_SECONDS,
        }
    }
}

impl Options {
    /// Sets the number of violations after which the session is terminated
    #[must_use]
    pub fn with_max_warnings(mut self, max_warnings: u32) -> Self {
        self.max_warnings = max_warnings;
        self
    }

    /// Sets how violations within the same second are counted
    #[must_use]
    pub fn with_counting_mode(mut self, counting_mode: CountingMode) -> Self {
        self.counting_mode = counting_mode;
        self
    }

    /// Sets whether leaving a deferred question submits its unsaved draft
    #[must_use]
    pub fn with_flush_on_navigate(mut self, flush_on_navigate: bool) -> Self {
        self.flush_on_navigate = flush_on_navigate;
        self
    }

    /// Sets the delay between submission and navigating away
    #[must_use]
    pub fn with_redirect_delay(mut self, redirect_delay: Duration) -> Self {
        self.redirect_delay = redirect_delay;
        self
    }

    /// Violations after which the session is terminated
    pub fn max_warnings(&self) -> u32 {
        self.max_warnings
    }

    /// Delay between submission and navigating away
    pub fn redirect_delay(&self) -> Duration {
        self.redirect_delay
    }
}

/// Errors raised by the session controller
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Loading or editing the exam failed
    #[error(transparent)]
    Exam(#[from] exam::Error),
    /// The exam details could not be fetched
    #[error("failed to load exam details: {0}")]
    Load(#[from] ApiError),
    /// The session options failed validation
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    /// Navigation to a question that does not exist
    #[error("question {index} does not exist, the exam has {count} questions")]
    NoSuchQuestion {
        /// Requested index
        index: usize,
        /// Number of questions
        count: usize,
    },
}

/// The question currently shown to the student
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    /// Position of the question
    pub index: usize,
    /// Number of questions
    pub count: usize,
    /// The question itself
    pub question: Question,
    /// Human readable type of the question
    pub kind: &'static str,
    /// Current answer, including optimistic edits
    pub answer: Option<AnswerView>,
    /// Unsaved draft of a deferred question
    pub draft: Option<String>,
    /// Progress of the question
    pub status: QuestionStatus,
}

/// Outcome of a terminated session
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// The session
    pub session: SessionId,
    /// Why the session ended
    pub reason: TerminationReason,
    /// Text explaining the reason
    pub message: &'static str,
    /// Violations counted
    pub warnings: u32,
    /// Counted violations per rule
    pub tallies: EnumMap<ViolationKind, u32>,
    /// Questions with an answer
    pub answered: usize,
    /// Number of questions
    pub total: usize,
    /// Whether the exam service accepted the submission, `None` while it is outstanding
    pub acknowledged: Option<bool>,
}

/// Everything needed to render an active session from scratch
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct ActiveView {
    /// The session
    pub session: SessionId,
    /// Seconds left
    pub remaining_seconds: u64,
    /// The question on screen
    pub question: Option<QuestionView>,
    /// Progress of every question in display order
    pub statuses: Vec<QuestionStatus>,
    /// Questions with an answer
    pub answered: usize,
    /// Whether an answer write is still outstanding
    pub saving: bool,
    /// Violations counted so far
    pub warnings: u32,
    /// Violations after which the session is terminated
    pub max_warnings: u32,
    /// Text of the warning on screen
    pub warning: Option<String>,
    /// Devices the student denied access to
    pub denied_devices: Vec<Device>,
}

/// Messages sent to synchronize the complete view state
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub enum SyncMessage {
    /// The session is running
    Active(Box<ActiveView>),
    /// The submission is in flight
    Submitting {
        /// Why the session is ending
        reason: TerminationReason,
    },
    /// The attempt is over
    Submitted {
        /// Outcome of the session
        summary: Summary,
        /// Why the submission failed, if it did
        error: Option<ApiError>,
    },
}

/// Update messages sent to the view about the session
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub enum UpdateMessage {
    /// One second passed
    Tick {
        /// Seconds left
        remaining_seconds: u64,
    },
    /// Little time is left
    LowTime {
        /// Seconds left
        remaining_seconds: u64,
    },
    /// Another question is on screen
    QuestionShown(Box<QuestionView>),
    /// The session is ending and the submission was issued
    Submitting {
        /// Why the session is ending
        reason: TerminationReason,
    },
    /// The attempt is over
    Submitted {
        /// Outcome of the session
        summary: Summary,
        /// Why the submission failed, if it did; the session ends regardless
        error: Option<ApiError>,
    },
}

/// Alarm messages of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// Time to navigate away from the finished exam
    Redirect,
}

/// A session waiting for its exam details
///
/// The loader issues the exam details request. Once the host delivers
/// the response for [`PendingSession::ticket`], [`PendingSession::receive_details`]
/// validates it and builds the [`ExamSession`].
#[derive(Debug, Clone)]
pub struct PendingSession {
    exam_id: ExamId,
    options: Options,
    reference: Option<FaceDetection>,
    tickets: Tickets,
    ticket: Ticket,
}

impl PendingSession {
    /// Requests the details of an exam
    ///
    /// # Arguments
    ///
    /// * `exam_id` - The exam to attempt
    /// * `options` - Session options
    /// * `reference` - Face detection of the student's reference photo, if one was taken
    /// * `api` - The exam service
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOptions`] if the options fail validation; no
    /// request is issued in that case.
    pub fn request<A: ExamApi>(
        exam_id: ExamId,
        options: Options,
        reference: Option<FaceDetection>,
        api: &A,
    ) -> Result<Self, Error> {
        options
            .validate()
            .map_err(|report| Error::InvalidOptions(report.to_string()))?;

        let mut tickets = Tickets::default();
        let ticket = tickets.issue();
        debug!(exam = %exam_id, %ticket, "requesting exam details");
        api.get_exam_details(ticket, &exam_id);

        Ok(Self {
            exam_id,
            options,
            reference,
            tickets,
            ticket,
        })
    }

    /// Ticket of the exam details request
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// Builds the session from the exam details response
    ///
    /// # Errors
    ///
    /// Returns [`Error::Load`] if the request failed and [`Error::Exam`] if
    /// the details are invalid.
    pub fn receive_details(
        self,
        result: Result<ExamDetails, ApiError>,
    ) -> Result<ExamSession, Error> {
        let details = result.inspect_err(|error| {
            warn!(exam = %self.exam_id, %error, "failed to load exam details");
        })?;
        let (duration_seconds, questions) = details.into_questions()?;

        ExamSession::with_tickets(
            self.exam_id,
            questions,
            duration_seconds,
            self.options,
            self.reference,
            self.tickets,
        )
    }
}

/// One student's attempt at one exam
#[derive(Debug, Clone)]
pub struct ExamSession {
    id: SessionId,
    exam_id: ExamId,
    options: Options,
    state: SessionState,
    reason: Option<TerminationReason>,
    started: bool,

    timer: SessionTimer,
    sources: SignalSources,
    aggregator: ViolationAggregator,
    pipeline: AnswerPipeline,

    tickets: Tickets,
    submit_ticket: Option<Ticket>,
    acknowledged: Option<bool>,
    submission_error: Option<ApiError>,

    current: usize,
    warning: Option<String>,
    denied: EnumMap<Device, bool>,
    redirected: bool,
}

// Convenience methods
impl ExamSession {
    /// Attempts to change the state from `before` to `after`
    ///
    /// # Returns
    ///
    /// `true` if the state was `before` and is now `after`, `false` otherwise
    fn change_state(&mut self, before: SessionState, after: SessionState) -> bool {
        if self.state == before {
            self.state = after;
            true
        } else {
            false
        }
    }

    fn mark_current_displayed(&mut self) {
        if self.state != SessionState::Active {
            return;
        }
        let elapsed = self.timer.elapsed_seconds();
        if let Some(question_id) = self
            .pipeline
            .questions()
            .get(self.current)
            .map(|question| question.id().clone())
        {
            self.pipeline.mark_displayed(&question_id, elapsed);
        }
    }

    fn question_view(&self) -> Option<QuestionView> {
        let question = self.pipeline.questions().get(self.current)?;
        let id = question.id();
        Some(QuestionView {
            index: self.current,
            count: self.pipeline.questions().len(),
            question: question.clone(),
            kind: question.kind().label(),
            answer: self.pipeline.answer(id).map(AnswerView::from),
            draft: self.pipeline.draft(id).map(str::to_owned),
            status: self.pipeline.status(id),
        })
    }

    /// Submits the unsaved draft of the current question, if it has one
    fn flush_current<A: ExamApi, T: Tunnel>(&mut self, api: &A, tunnel: &T) -> Result<(), Error> {
        if self.state != SessionState::Active {
            return Ok(());
        }
        let Some(question_id) = self
            .pipeline
            .questions()
            .get(self.current)
            .map(|question| question.id().clone())
        else {
            return Ok(());
        };
        if self.pipeline.draft(&question_id).is_none() {
            return Ok(());
        }

        debug!(session = %self.id, %question_id, "flushing draft on navigation");
        self.pipeline.submit_question(
            &question_id,
            self.state,
            self.timer.elapsed_seconds(),
            &mut self.tickets,
            api,
            tunnel,
        )?;
        Ok(())
    }

    fn permission_denied<T: Tunnel>(&mut self, device: Device, tunnel: &T) {
        if self.denied[device] {
            return;
        }
        self.denied[device] = true;
        warn!(session = %self.id, ?device, "media permission denied, proctoring degraded");
        tunnel.send_message(&proctor::UpdateMessage::PermissionDenied(device).into());
    }

    /// Moves from `Submitting` to `Submitted` and releases everything
    fn finish_submission<P: Platform, T: Tunnel, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        result: Result<(), ApiError>,
        platform: &P,
        tunnel: &T,
        mut schedule_message: S,
    ) {
        if !self.change_state(SessionState::Submitting, SessionState::Submitted) {
            debug!(session = %self.id, "duplicate submission completion");
            return;
        }

        match &result {
            Ok(()) => info!(session = %self.id, "exam submitted"),
            Err(error) => warn!(session = %self.id, %error, "exam submission failed"),
        }
        self.acknowledged = Some(result.is_ok());
        self.submission_error = result.err();

        self.sources.stop_all(platform);
        self.timer.stop();
        platform.release_media();
        schedule_message(AlarmMessage::Redirect.into(), self.options.redirect_delay);

        if let Some(summary) = self.summary() {
            tunnel.send_message(
                &UpdateMessage::Submitted {
                    summary,
                    error: self.submission_error.clone(),
                }
                .into(),
            );
        }
    }
}

impl ExamSession {
    /// Creates a session in the `Active` state
    ///
    /// Nothing runs until [`ExamSession::start`] is called.
    ///
    /// # Arguments
    ///
    /// * `exam_id` - The exam being attempted
    /// * `questions` - Questions in display order
    /// * `duration_seconds` - Length of the attempt
    /// * `options` - Session options
    /// * `reference` - Face detection of the reference photo; without one the
    ///   photo comparison is off
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOptions`] if the options fail validation and
    /// [`Error::Exam`] if there are no questions.
    pub fn new(
        exam_id: ExamId,
        questions: Vec<Question>,
        duration_seconds: u64,
        options: Options,
        reference: Option<FaceDetection>,
    ) -> Result<Self, Error> {
        Self::with_tickets(
            exam_id,
            questions,
            duration_seconds,
            options,
            reference,
            Tickets::default(),
        )
    }

    fn with_tickets(
        exam_id: ExamId,
        questions: Vec<Question>,
        duration_seconds: u64,
        options: Options,
        reference: Option<FaceDetection>,
        tickets: Tickets,
    ) -> Result<Self, Error> {
        options
            .validate()
            .map_err(|report| Error::InvalidOptions(report.to_string()))?;
        if questions.is_empty() {
            return Err(exam::Error::Invalid("the exam has no questions".to_owned()).into());
        }

        Ok(Self {
            id: SessionId::new(),
            options,
            state: SessionState::Active,
            reason: None,
            started: false,
            timer: SessionTimer::new(duration_seconds, options.low_time_threshold_seconds),
            sources: SignalSources::new(
                SourceOptions {
                    photo_interval: options.photo_interval,
                    displacement_threshold: options.displacement_threshold,
                },
                reference,
            ),
            aggregator: ViolationAggregator::new(options.max_warnings, options.counting_mode),
            pipeline: AnswerPipeline::new(exam_id.clone(), questions),
            exam_id,
            tickets,
            submit_ticket: None,
            acknowledged: None,
            submission_error: None,
            current: 0,
            warning: None,
            denied: EnumMap::default(),
            redirected: false,
        })
    }

    /// The session id
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Why the session is ending or ended
    pub fn reason(&self) -> Option<TerminationReason> {
        self.reason
    }

    /// Seconds left
    pub fn remaining_seconds(&self) -> u64 {
        self.timer.remaining_seconds()
    }

    /// Violations counted so far
    pub fn warnings(&self) -> u32 {
        self.aggregator.warnings()
    }

    /// Index of the question on screen
    pub fn current_question(&self) -> usize {
        self.current
    }

    /// The answers of the session
    pub fn pipeline(&self) -> &AnswerPipeline {
        &self.pipeline
    }

    /// Whether any signal source or the timer is still running
    pub fn is_running(&self) -> bool {
        self.sources.any_running() || self.timer.is_running()
    }

    /// Opens the media stream, starts the timer and the signal sources and
    /// shows the first question
    ///
    /// # Arguments
    ///
    /// * `platform` - The host platform
    /// * `tunnel` - The student's view
    /// * `schedule_message` - Function to schedule alarm messages
    ///
    /// # Type Parameters
    ///
    /// * `P` - Type implementing the Platform trait
    /// * `T` - Type implementing the Tunnel trait
    /// * `S` - Function type for scheduling alarm messages
    pub fn start<P: Platform, T: Tunnel, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        platform: &P,
        tunnel: &T,
        mut schedule_message: S,
    ) {
        if self.started || self.state != SessionState::Active {
            return;
        }
        self.started = true;
        info!(
            session = %self.id,
            exam = %self.exam_id,
            remaining = self.timer.remaining_seconds(),
            "session started"
        );

        platform.acquire_media();
        self.timer.start(&mut schedule_message);
        self.sources.start_all(platform, &mut schedule_message);
        self.mark_current_displayed();

        tunnel.send_state(&self.state_message());
    }

    /// Handles a platform notification
    ///
    /// # Arguments
    ///
    /// * `event` - The notification
    /// * `api` - The exam service, used if the violation terminates the session
    /// * `platform` - The host platform
    /// * `tunnel` - The student's view
    ///
    /// # Returns
    ///
    /// How the host should treat the original browser event
    pub fn receive_platform_event<A: ExamApi, P: Platform, T: Tunnel>(
        &mut self,
        event: PlatformEvent,
        api: &A,
        platform: &P,
        tunnel: &T,
    ) -> EventResponse {
        if let PlatformEvent::PermissionDenied(device) = event {
            if self.state != SessionState::Submitted {
                self.permission_denied(device, tunnel);
            }
            return EventResponse::default();
        }

        let observation = self.sources.observe(event, self.state, platform);
        if let Some(kind) = observation.violation {
            self.record_violation(ViolationEvent::now(kind), api, tunnel);
        }
        observation.response
    }

    /// Counts a violation
    ///
    /// Below the bound a warning is shown. Reaching the bound terminates the
    /// session with [`TerminationReason::IntegrityFailed`].
    pub fn record_violation<A: ExamApi, T: Tunnel>(
        &mut self,
        event: ViolationEvent,
        api: &A,
        tunnel: &T,
    ) {
        match self
            .aggregator
            .record(&event, self.state, self.timer.elapsed_seconds())
        {
            Verdict::Ignored => {}
            Verdict::Warned {
                kind,
                warnings,
                remaining,
            } => {
                info!(session = %self.id, ?kind, warnings, "proctoring warning");
                let message = aggregator::warning_text(kind, remaining);
                self.warning = Some(message.clone());
                tunnel.send_message(
                    &proctor::UpdateMessage::Warning {
                        kind,
                        message,
                        warnings,
                        max_warnings: self.aggregator.max_warnings(),
                    }
                    .into(),
                );
            }
            Verdict::Exceeded { kind } => {
                warn!(session = %self.id, ?kind, "warning limit reached");
                self.terminate(TerminationReason::IntegrityFailed(kind), api, tunnel);
            }
        }
    }

    /// Dismisses the warning on screen
    pub fn dismiss_warning<T: Tunnel>(&mut self, tunnel: &T) {
        if self.warning.take().is_some() {
            tunnel.send_message(&proctor::UpdateMessage::WarningDismissed.into());
        }
    }

    /// Handles scheduled alarm messages
    ///
    /// # Arguments
    ///
    /// * `message` - The alarm message to process
    /// * `api` - The exam service, used if the timer expires
    /// * `platform` - The host platform
    /// * `tunnel` - The student's view
    /// * `schedule_message` - Function to schedule alarm messages
    ///
    /// # Type Parameters
    ///
    /// * `A` - Type implementing the ExamApi trait
    /// * `P` - Type implementing the Platform trait
    /// * `T` - Type implementing the Tunnel trait
    /// * `S` - Function type for scheduling alarm messages
    pub fn receive_alarm<
        A: ExamApi,
        P: Platform,
        T: Tunnel,
        S: FnMut(crate::AlarmMessage, Duration),
    >(
        &mut self,
        message: crate::AlarmMessage,
        api: &A,
        platform: &P,
        tunnel: &T,
        mut schedule_message: S,
    ) {
        match message {
            crate::AlarmMessage::Timer(timer::AlarmMessage::Tick { generation }) => {
                match self
                    .timer
                    .receive_tick(generation, self.state, &mut schedule_message)
                {
                    TickOutcome::Ignored => {}
                    TickOutcome::Ticked {
                        remaining_seconds,
                        low_time,
                    } => {
                        tunnel.send_message(&UpdateMessage::Tick { remaining_seconds }.into());
                        if low_time {
                            info!(session = %self.id, remaining_seconds, "low time");
                            tunnel.send_message(
                                &UpdateMessage::LowTime { remaining_seconds }.into(),
                            );
                        }
                    }
                    TickOutcome::Expired => {
                        tunnel.send_message(
                            &UpdateMessage::Tick {
                                remaining_seconds: 0,
                            }
                            .into(),
                        );
                        self.terminate(TerminationReason::TimeExpired, api, tunnel);
                    }
                }
            }
            crate::AlarmMessage::Proctor(message) => {
                self.sources
                    .receive_alarm(message, platform, schedule_message);
            }
            crate::AlarmMessage::Session(AlarmMessage::Redirect) => {
                if self.state == SessionState::Submitted && !self.redirected {
                    self.redirected = true;
                    info!(session = %self.id, "leaving exam");
                    tunnel.redirect();
                }
            }
        }
    }

    /// Handles the completion of a remote call
    ///
    /// # Returns
    ///
    /// `true` if the ticket belonged to this session
    pub fn receive_completion<P: Platform, T: Tunnel, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        ticket: Ticket,
        result: Result<(), ApiError>,
        platform: &P,
        tunnel: &T,
        schedule_message: S,
    ) -> bool {
        if self.submit_ticket == Some(ticket) {
            self.finish_submission(result, platform, tunnel, schedule_message);
            return true;
        }
        self.pipeline
            .receive_completion(ticket, result, self.state, tunnel)
    }

    /// Submits the exam on the student's request
    ///
    /// # Returns
    ///
    /// `true` if this call started the submission
    pub fn submit<A: ExamApi, T: Tunnel>(&mut self, api: &A, tunnel: &T) -> bool {
        self.terminate(TerminationReason::UserSubmitted, api, tunnel)
    }

    /// Starts the termination sequence
    ///
    /// Only the first call while `Active` has any effect: it stops the
    /// timer, issues the exam submission and moves to `Submitting`. Every
    /// later call, from any trigger, returns `false`.
    pub fn terminate<A: ExamApi, T: Tunnel>(
        &mut self,
        reason: TerminationReason,
        api: &A,
        tunnel: &T,
    ) -> bool {
        if !self.change_state(SessionState::Active, SessionState::Submitting) {
            debug!(session = %self.id, ?reason, state = ?self.state, "termination already started");
            return false;
        }

        self.reason = Some(reason);
        self.timer.stop();
        self.warning = None;

        let ticket = self.tickets.issue();
        self.submit_ticket = Some(ticket);
        info!(session = %self.id, ?reason, %ticket, "submitting exam");
        api.submit_exam(ticket, &self.exam_id);

        tunnel.send_message(&UpdateMessage::Submitting { reason }.into());
        true
    }

    /// Shows the question at `index`
    ///
    /// With `flush_on_navigate` set, the unsaved draft of the question being
    /// left is submitted first. Once the session is submitted navigation
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchQuestion`] if `index` is out of range, or the
    /// error of the draft submission.
    pub fn show_question<A: ExamApi, T: Tunnel>(
        &mut self,
        index: usize,
        api: &A,
        tunnel: &T,
    ) -> Result<(), Error> {
        if self.state == SessionState::Submitted {
            return Ok(());
        }
        let count = self.pipeline.questions().len();
        if index >= count {
            return Err(Error::NoSuchQuestion { index, count });
        }
        if self.options.flush_on_navigate && index != self.current {
            self.flush_current(api, tunnel)?;
        }

        self.current = index;
        self.mark_current_displayed();
        if let Some(view) = self.question_view() {
            tunnel.send_message(&UpdateMessage::QuestionShown(Box::new(view)).into());
        }
        Ok(())
    }

    /// Shows the next question
    ///
    /// # Returns
    ///
    /// `false` if the last question is already on screen or the session is submitted
    ///
    /// # Errors
    ///
    /// See [`ExamSession::show_question`].
    pub fn next_question<A: ExamApi, T: Tunnel>(
        &mut self,
        api: &A,
        tunnel: &T,
    ) -> Result<bool, Error> {
        if self.state == SessionState::Submitted
            || self.current + 1 >= self.pipeline.questions().len()
        {
            return Ok(false);
        }
        self.show_question(self.current + 1, api, tunnel)?;
        Ok(true)
    }

    /// Shows the previous question
    ///
    /// # Returns
    ///
    /// `false` if the first question is already on screen or the session is submitted
    ///
    /// # Errors
    ///
    /// See [`ExamSession::show_question`].
    pub fn previous_question<A: ExamApi, T: Tunnel>(
        &mut self,
        api: &A,
        tunnel: &T,
    ) -> Result<bool, Error> {
        if self.state == SessionState::Submitted {
            return Ok(false);
        }
        let Some(index) = self.current.checked_sub(1) else {
            return Ok(false);
        };
        self.show_question(index, api, tunnel)?;
        Ok(true)
    }

    /// Selects an option of a multiple choice question
    ///
    /// # Errors
    ///
    /// See [`AnswerPipeline::select_option`].
    pub fn select_option<A: ExamApi, T: Tunnel>(
        &mut self,
        question_id: &QuestionId,
        index: usize,
        api: &A,
        tunnel: &T,
    ) -> Result<(), Error> {
        self.pipeline.select_option(
            question_id,
            index,
            self.state,
            self.timer.elapsed_seconds(),
            &mut self.tickets,
            api,
            tunnel,
        )?;
        Ok(())
    }

    /// Edits the text answer of a question
    ///
    /// # Errors
    ///
    /// See [`AnswerPipeline::edit_text`].
    pub fn edit_text<A: ExamApi, T: Tunnel>(
        &mut self,
        question_id: &QuestionId,
        text: String,
        api: &A,
        tunnel: &T,
    ) -> Result<(), Error> {
        self.pipeline.edit_text(
            question_id,
            text,
            self.state,
            self.timer.elapsed_seconds(),
            &mut self.tickets,
            api,
            tunnel,
        )?;
        Ok(())
    }

    /// Attaches a file to an assignment question
    ///
    /// # Errors
    ///
    /// See [`AnswerPipeline::attach_file`].
    pub fn attach_file<A: ExamApi, T: Tunnel>(
        &mut self,
        question_id: &QuestionId,
        attachment: Attachment,
        api: &A,
        tunnel: &T,
    ) -> Result<(), Error> {
        self.pipeline.attach_file(
            question_id,
            attachment,
            self.state,
            self.timer.elapsed_seconds(),
            &mut self.tickets,
            api,
            tunnel,
        )?;
        Ok(())
    }

    /// Submits the unsaved draft of a deferred question
    ///
    /// # Errors
    ///
    /// See [`AnswerPipeline::submit_question`].
    pub fn submit_question<A: ExamApi, T: Tunnel>(
        &mut self,
        question_id: &QuestionId,
        api: &A,
        tunnel: &T,
    ) -> Result<(), Error> {
        self.pipeline.submit_question(
            question_id,
            self.state,
            self.timer.elapsed_seconds(),
            &mut self.tickets,
            api,
            tunnel,
        )?;
        Ok(())
    }

    /// Outcome of the session, once it is terminating
    pub fn summary(&self) -> Option<Summary> {
        let reason = self.reason?;
        Some(Summary {
            session: self.id,
            reason,
            message: reason.describe(),
            warnings: self.aggregator.warnings(),
            tallies: *self.aggregator.tallies(),
            answered: self.pipeline.answered_count(),
            total: self.pipeline.questions().len(),
            acknowledged: self.acknowledged,
        })
    }

    /// Returns the message necessary to render the session from scratch
    pub fn state_message(&self) -> SyncMessage {
        match (self.state, self.summary()) {
            (SessionState::Submitting, Some(summary)) => SyncMessage::Submitting {
                reason: summary.reason,
            },
            (SessionState::Submitted, Some(summary)) => SyncMessage::Submitted {
                summary,
                error: self.submission_error.clone(),
            },
            _ => SyncMessage::Active(Box::new(ActiveView {
                session: self.id,
                remaining_seconds: self.timer.remaining_seconds(),
                question: self.question_view(),
                statuses: self.pipeline.statuses(),
                answered: self.pipeline.answered_count(),
                saving: self.pipeline.has_pending_writes(),
                warnings: self.aggregator.warnings(),
                max_warnings: self.aggregator.max_warnings(),
                warning: self.warning.clone(),
                denied_devices: self
                    .denied
                    .iter()
                    .filter(|(_, denied)| **denied)
                    .map(|(device, _)| device)
                    .collect(),
            })),
        }
    }
}
