//! crates/courseforge_core/src/workflow.rs
//!
//! The interactive content-generation workflow: one state machine driving a
//! session from analysis through requirement selection to generation and
//! review. A single parametrized implementation covers both module-level and
//! lesson-level scopes via `ScopeKey`.
//!
//! Transitions are server-directed where the contract says so: a chat reply
//! carrying a phase value moves the session to that phase, including
//! regressions to earlier phases. Absent a phase value, the phase after a
//! chat call equals the phase before it.

use crate::domain::{
    ChatContext, ContentPayload, GenerationRequest, GenerationSettings, RequirementSet, ScopeKey,
    Transcript, TurnRole, WorkflowPhase,
};

/// Synthetic assistant turn appended when a chat call fails. The failure
/// must not mutate requirements or phase.
pub const CHAT_FAILURE_NOTICE: &str =
    "I'm sorry, something went wrong while processing your message. Please try again.";

/// System notice appended when generation completes.
pub const GENERATION_COMPLETE_NOTICE: &str =
    "Content has been generated and saved. Review it below or reopen the requirements to refine it.";

//=========================================================================================
// Errors and Call Bookkeeping
//=========================================================================================

/// Client-local validation and sequencing errors. None of these involve a
/// network call; all leave the session untouched.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Message must not be empty")]
    EmptyMessage,
    #[error("At least one content requirement must be selected before generating")]
    NoRequirementsSelected,
    #[error("Another call is already in flight for this session")]
    CallInFlight,
    #[error("The workflow session is closed")]
    SessionClosed,
    #[error("Analysis has already run for this session")]
    AlreadyAnalyzed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Analysis,
    Chat,
    Generation,
}

/// Handed out when a backend call starts, presented back when its result
/// arrives. Results from a stale epoch (the session was closed or reset in
/// the meantime) are discarded without touching state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTicket {
    kind: CallKind,
    epoch: u64,
}

/// Whether a settled call actually mutated the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    Discarded,
}

//=========================================================================================
// Scope Metadata
//=========================================================================================

/// Display metadata for the module or lesson a session is generating
/// content for, carried into analysis and generation requests.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeMeta {
    pub course_title: String,
    pub course_description: String,
    pub module_title: String,
    pub module_description: String,
    pub lesson_title: Option<String>,
}

impl ScopeMeta {
    /// The title shown in chat context: the lesson title for lesson scopes,
    /// otherwise the module title.
    pub fn scope_title(&self) -> &str {
        self.lesson_title.as_deref().unwrap_or(&self.module_title)
    }
}

//=========================================================================================
// WorkflowSession
//=========================================================================================

/// One open authoring session. Owns the phase, the requirement checklist,
/// the conversation transcript, and the in-flight call guard.
#[derive(Debug)]
pub struct WorkflowSession {
    scope: ScopeKey,
    meta: ScopeMeta,
    settings: GenerationSettings,
    phase: WorkflowPhase,
    requirements: RequirementSet,
    transcript: Transcript,
    in_flight: Option<CallKind>,
    epoch: u64,
    closed: bool,
}

impl WorkflowSession {
    /// Opens a fresh session in the analysis phase.
    pub fn open(scope: ScopeKey, meta: ScopeMeta, settings: GenerationSettings) -> Self {
        Self {
            scope,
            meta,
            settings,
            phase: WorkflowPhase::Analysis,
            requirements: RequirementSet::default(),
            transcript: Transcript::default(),
            in_flight: None,
            epoch: 0,
            closed: false,
        }
    }

    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    pub fn requirements(&self) -> &RequirementSet {
        &self.requirements
    }

    pub fn requirements_mut(&mut self) -> &mut RequirementSet {
        &mut self.requirements
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn settings(&self) -> GenerationSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: GenerationSettings) {
        self.settings = settings;
    }

    pub fn call_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the automatic analysis call should fire: only on a session
    /// that has never spoken to the server. Reopening with existing state
    /// must not re-trigger analysis.
    pub fn needs_analysis(&self) -> bool {
        self.phase == WorkflowPhase::Analysis
            && self.transcript.is_empty()
            && self.requirements.is_empty()
    }

    // --- Analysis -----------------------------------------------------------------------

    pub fn begin_analysis(&mut self) -> Result<CallTicket, WorkflowError> {
        self.ensure_open()?;
        if !self.needs_analysis() {
            return Err(WorkflowError::AlreadyAnalyzed);
        }
        self.begin_call(CallKind::Analysis)
    }

    /// Seeds the requirement checklist from the analysis result and moves
    /// to the requirements phase.
    pub fn apply_analysis(
        &mut self,
        ticket: CallTicket,
        analysis: String,
        requirements: RequirementSet,
    ) -> Applied {
        if self.settle(ticket) == Applied::Discarded {
            return Applied::Discarded;
        }
        self.transcript.push(TurnRole::Assistant, analysis);
        self.requirements = requirements;
        self.phase = WorkflowPhase::Requirements;
        Applied::Applied
    }

    /// A failed analysis keeps the session in the analysis phase with an
    /// empty checklist so the user can retry.
    pub fn apply_analysis_failure(&mut self, ticket: CallTicket) -> Applied {
        self.settle(ticket)
    }

    // --- Chat ---------------------------------------------------------------------------

    /// Appends the user's turn and reserves the chat call slot. Blank
    /// messages are rejected before anything is appended; a second call
    /// while one is outstanding is forbidden, not merely discouraged.
    pub fn send_message(&mut self, text: &str) -> Result<CallTicket, WorkflowError> {
        self.ensure_open()?;
        if text.trim().is_empty() {
            return Err(WorkflowError::EmptyMessage);
        }
        let ticket = self.begin_call(CallKind::Chat)?;
        self.transcript.push(TurnRole::User, text.trim().to_string());
        Ok(ticket)
    }

    /// The context bundle to send with the chat call reserved by
    /// `send_message`.
    pub fn chat_context(&self) -> ChatContext {
        ChatContext {
            scope_title: self.meta.scope_title().to_string(),
            requirements: self.requirements.items().to_vec(),
            phase: self.phase,
        }
    }

    /// Applies a chat reply: appends exactly one assistant turn, replaces
    /// the checklist iff the reply carried an update, and adopts the
    /// server-declared phase iff one was present.
    pub fn apply_chat(
        &mut self,
        ticket: CallTicket,
        message: String,
        updated_requirements: Option<RequirementSet>,
        phase: Option<WorkflowPhase>,
    ) -> Applied {
        if self.settle(ticket) == Applied::Discarded {
            return Applied::Discarded;
        }
        self.transcript.push(TurnRole::Assistant, message);
        if let Some(update) = updated_requirements {
            self.requirements = update;
        }
        if let Some(next) = phase {
            self.phase = next;
        }
        Applied::Applied
    }

    /// Appends the synthetic apology turn. Requirements and phase are left
    /// untouched so the user can retry.
    pub fn apply_chat_failure(&mut self, ticket: CallTicket) -> Applied {
        if self.settle(ticket) == Applied::Discarded {
            return Applied::Discarded;
        }
        self.transcript.push(TurnRole::Assistant, CHAT_FAILURE_NOTICE);
        Applied::Applied
    }

    // --- Generation ---------------------------------------------------------------------

    /// Validates the generation precondition and builds the request body.
    /// Rejected client-side, with no network call, unless at least one
    /// requirement is completed. On success the session enters the
    /// generation phase.
    pub fn prepare_generation(
        &mut self,
    ) -> Result<(CallTicket, GenerationRequest), WorkflowError> {
        self.ensure_open()?;
        if !self.requirements.any_completed() {
            return Err(WorkflowError::NoRequirementsSelected);
        }
        let ticket = self.begin_call(CallKind::Generation)?;
        self.phase = WorkflowPhase::Generation;
        let request = GenerationRequest {
            scope: self.scope,
            module_title: self.meta.module_title.clone(),
            module_description: self.meta.module_description.clone(),
            course_title: self.meta.course_title.clone(),
            course_description: self.meta.course_description.clone(),
            lesson_title: self.meta.lesson_title.clone(),
            requirements: self.requirements.completed_only(),
            transcript: self.transcript.turns().to_vec(),
            detail_level: self.settings.detail_level,
            target_word_count: self.settings.clamped_word_count(&self.scope),
        };
        Ok((ticket, request))
    }

    /// Moves to review once the generated content has been persisted
    /// server-side. The payload itself lives in the content record; the
    /// session only records the completion notice.
    pub fn apply_generation(&mut self, ticket: CallTicket, _payload: &ContentPayload) -> Applied {
        if self.settle(ticket) == Applied::Discarded {
            return Applied::Discarded;
        }
        self.transcript.push(TurnRole::System, GENERATION_COMPLETE_NOTICE);
        self.phase = WorkflowPhase::Review;
        Applied::Applied
    }

    /// A failed generation stays in the generation phase; the user may
    /// retry the identical request.
    pub fn apply_generation_failure(&mut self, ticket: CallTicket) -> Applied {
        self.settle(ticket)
    }

    // --- Re-entry and Teardown ----------------------------------------------------------

    /// Loops a reviewed session back to requirement selection.
    pub fn reopen_requirements(&mut self) {
        if !self.closed && self.phase == WorkflowPhase::Review {
            self.phase = WorkflowPhase::Requirements;
        }
    }

    /// Closes the session. Results of calls still in flight will be
    /// discarded when they arrive; nothing mutates a closed session.
    pub fn close(&mut self) {
        self.closed = true;
        self.in_flight = None;
        self.epoch += 1;
    }

    // --- Internals ----------------------------------------------------------------------

    fn ensure_open(&self) -> Result<(), WorkflowError> {
        if self.closed {
            Err(WorkflowError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn begin_call(&mut self, kind: CallKind) -> Result<CallTicket, WorkflowError> {
        if self.in_flight.is_some() {
            return Err(WorkflowError::CallInFlight);
        }
        self.in_flight = Some(kind);
        Ok(CallTicket {
            kind,
            epoch: self.epoch,
        })
    }

    /// Clears the in-flight slot for a current ticket, or reports the
    /// result as stale.
    fn settle(&mut self, ticket: CallTicket) -> Applied {
        if self.closed || ticket.epoch != self.epoch || self.in_flight != Some(ticket.kind) {
            return Applied::Discarded;
        }
        self.in_flight = None;
        Applied::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContentRequirement, DetailLevel, Priority};
    use uuid::Uuid;

    fn meta() -> ScopeMeta {
        ScopeMeta {
            course_title: "APIs from Scratch".into(),
            course_description: "A practical API design course".into(),
            module_title: "Intro to APIs".into(),
            module_description: "What an API is and why it matters".into(),
            lesson_title: None,
        }
    }

    fn session() -> WorkflowSession {
        WorkflowSession::open(
            ScopeKey::module(Uuid::new_v4(), 0),
            meta(),
            GenerationSettings::default(),
        )
    }

    fn reqs(completed: &[(&str, bool)]) -> RequirementSet {
        RequirementSet::new(
            completed
                .iter()
                .map(|(id, done)| ContentRequirement {
                    id: (*id).into(),
                    title: (*id).into(),
                    description: format!("Cover {}", id),
                    completed: *done,
                    priority: Priority::default(),
                })
                .collect(),
        )
    }

    #[test]
    fn opens_in_analysis_and_wants_the_automatic_call() {
        let s = session();
        assert_eq!(s.phase(), WorkflowPhase::Analysis);
        assert!(s.needs_analysis());
    }

    #[test]
    fn analysis_seeds_requirements_and_advances() {
        let mut s = session();
        let ticket = s.begin_analysis().unwrap();
        let applied = s.apply_analysis(
            ticket,
            "This module needs theory and examples.".into(),
            reqs(&[("theory", true), ("examples", true), ("exercises", false)]),
        );
        assert_eq!(applied, Applied::Applied);
        assert_eq!(s.phase(), WorkflowPhase::Requirements);
        assert_eq!(s.requirements().len(), 3);
        assert_eq!(s.transcript().len(), 1);
        assert!(!s.needs_analysis());
    }

    #[test]
    fn failed_analysis_stays_in_analysis_for_retry() {
        let mut s = session();
        let ticket = s.begin_analysis().unwrap();
        s.apply_analysis_failure(ticket);
        assert_eq!(s.phase(), WorkflowPhase::Analysis);
        assert!(s.requirements().is_empty());
        // Retry is permitted.
        assert!(s.begin_analysis().is_ok());
    }

    #[test]
    fn blank_messages_are_rejected_without_appending() {
        let mut s = session();
        assert_eq!(s.send_message("   "), Err(WorkflowError::EmptyMessage));
        assert!(s.transcript().is_empty());
        assert!(!s.call_in_flight());
    }

    #[test]
    fn transcript_grows_by_exactly_one_turn_per_side() {
        let mut s = analyzed_session();
        let before = s.transcript().len();
        let ticket = s.send_message("Add a case study please").unwrap();
        assert_eq!(s.transcript().len(), before + 1);
        s.apply_chat(ticket, "Added a case study requirement.".into(), None, None);
        assert_eq!(s.transcript().len(), before + 2);
    }

    #[test]
    fn chat_failure_appends_one_synthetic_turn_and_mutates_nothing_else() {
        let mut s = analyzed_session();
        let phase_before = s.phase();
        let reqs_before = s.requirements().clone();
        let ticket = s.send_message("hello?").unwrap();
        let len_after_send = s.transcript().len();
        s.apply_chat_failure(ticket);
        assert_eq!(s.transcript().len(), len_after_send + 1);
        assert_eq!(s.transcript().turns().last().unwrap().content, CHAT_FAILURE_NOTICE);
        assert_eq!(s.phase(), phase_before);
        assert_eq!(s.requirements(), &reqs_before);
    }

    #[test]
    fn phase_is_unchanged_without_a_server_signal() {
        let mut s = analyzed_session();
        let ticket = s.send_message("what do you think?").unwrap();
        s.apply_chat(ticket, "Looks good.".into(), None, None);
        assert_eq!(s.phase(), WorkflowPhase::Requirements);
    }

    #[test]
    fn server_declared_phase_is_adopted_even_backwards() {
        let mut s = analyzed_session();
        let ticket = s.send_message("let's generate").unwrap();
        s.apply_chat(ticket, "Generating now.".into(), None, Some(WorkflowPhase::Generation));
        assert_eq!(s.phase(), WorkflowPhase::Generation);

        let ticket = s.send_message("wait, go back").unwrap();
        s.apply_chat(
            ticket,
            "Sure, back to requirements.".into(),
            None,
            Some(WorkflowPhase::Requirements),
        );
        assert_eq!(s.phase(), WorkflowPhase::Requirements);
    }

    #[test]
    fn overlapping_chat_calls_are_forbidden() {
        let mut s = analyzed_session();
        let _outstanding = s.send_message("first").unwrap();
        assert_eq!(s.send_message("second"), Err(WorkflowError::CallInFlight));
    }

    #[test]
    fn generation_is_gated_on_a_completed_requirement() {
        let mut s = analyzed_session();
        for id in ["theory", "examples"] {
            s.requirements_mut().toggle(id, false);
        }
        assert_eq!(
            s.prepare_generation().map(|_| ()),
            Err(WorkflowError::NoRequirementsSelected)
        );
        assert_eq!(s.phase(), WorkflowPhase::Requirements);

        s.requirements_mut().toggle("theory", true);
        let (_, request) = s.prepare_generation().unwrap();
        assert_eq!(s.phase(), WorkflowPhase::Generation);
        assert_eq!(request.requirements.len(), 1);
        assert_eq!(request.requirements[0].id, "theory");
    }

    #[test]
    fn generation_request_carries_clamped_word_count_and_transcript() {
        let mut s = analyzed_session();
        s.set_settings(GenerationSettings {
            detail_level: DetailLevel::Comprehensive,
            target_word_count: 9000,
        });
        let (_, request) = s.prepare_generation().unwrap();
        assert_eq!(request.target_word_count, 3000);
        assert_eq!(request.transcript.len(), s.transcript().len());
    }

    #[test]
    fn successful_generation_reaches_review_and_can_reopen() {
        let mut s = analyzed_session();
        let (ticket, _) = s.prepare_generation().unwrap();
        s.apply_generation(ticket, &ContentPayload::PlainText("Body".into()));
        assert_eq!(s.phase(), WorkflowPhase::Review);
        assert_eq!(
            s.transcript().turns().last().unwrap().content,
            GENERATION_COMPLETE_NOTICE
        );

        s.reopen_requirements();
        assert_eq!(s.phase(), WorkflowPhase::Requirements);
    }

    #[test]
    fn failed_generation_stays_in_generation_for_an_identical_retry() {
        let mut s = analyzed_session();
        let (ticket, first) = s.prepare_generation().unwrap();
        s.apply_generation_failure(ticket);
        assert_eq!(s.phase(), WorkflowPhase::Generation);

        // The retry builds an identical request body (timestamps aside, the
        // transcript has not moved).
        let (_, second) = s.prepare_generation().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn results_arriving_after_close_are_discarded() {
        let mut s = analyzed_session();
        let ticket = s.send_message("still there?").unwrap();
        let len_before = s.transcript().len();
        s.close();
        let applied = s.apply_chat(ticket, "late reply".into(), None, Some(WorkflowPhase::Review));
        assert_eq!(applied, Applied::Discarded);
        assert_eq!(s.transcript().len(), len_before);
        assert_eq!(s.phase(), WorkflowPhase::Requirements);
    }

    #[test]
    fn closed_sessions_reject_new_calls() {
        let mut s = analyzed_session();
        s.close();
        assert_eq!(s.send_message("hi"), Err(WorkflowError::SessionClosed));
        assert_eq!(
            s.prepare_generation().map(|_| ()),
            Err(WorkflowError::SessionClosed)
        );
    }

    fn analyzed_session() -> WorkflowSession {
        let mut s = session();
        let ticket = s.begin_analysis().unwrap();
        s.apply_analysis(
            ticket,
            "Analyzed.".into(),
            reqs(&[("theory", true), ("examples", true)]),
        );
        s
    }
}
