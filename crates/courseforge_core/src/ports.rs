//! crates/courseforge_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or LLM APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    AnalysisOutcome, AnalysisRequest, ChatContext, ChatOutcome, ContentPayload, ContentStatus,
    ConversationTurn, GenerationRequest, ModuleContent, Outline, ScopeKey,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth ---
    /// Validates an ambient session cookie and returns the user it belongs to.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    // --- Outlines ---
    async fn get_outline(&self, outline_id: Uuid) -> PortResult<Outline>;

    // --- Module / Lesson Content ---
    /// Writes the canonical content record for a scope key, overwriting any
    /// existing record for the same key. Never versions; last write wins.
    async fn upsert_module_content(
        &self,
        scope: &ScopeKey,
        title: &str,
        payload: &ContentPayload,
        status: ContentStatus,
    ) -> PortResult<ModuleContent>;

    async fn get_module_content(&self, content_id: Uuid) -> PortResult<ModuleContent>;

    /// Direct read-modify-write used by the manual editor. Bypasses the
    /// workflow entirely.
    async fn update_module_content(
        &self,
        content_id: Uuid,
        title: &str,
        payload: &ContentPayload,
    ) -> PortResult<ModuleContent>;

    /// All module-level content records for an outline.
    async fn list_module_contents(&self, outline_id: Uuid) -> PortResult<Vec<ModuleContent>>;

    /// All lesson-level content records for an outline.
    async fn list_lesson_contents(&self, outline_id: Uuid) -> PortResult<Vec<ModuleContent>>;

    // --- Content Sessions ---
    /// Best-effort transcript persistence for audit. Write-only; no read
    /// path is wired, and callers may ignore failures.
    async fn save_content_session(
        &self,
        user_id: Uuid,
        scope: &ScopeKey,
        transcript: &[ConversationTurn],
    ) -> PortResult<()>;
}

#[async_trait]
pub trait ContentAnalysisService: Send + Sync {
    /// Proposes an initial content-requirement checklist for a module or
    /// lesson, with a natural-language summary of the analysis.
    async fn analyze(&self, request: &AnalysisRequest) -> PortResult<AnalysisOutcome>;
}

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Answers one user message in the requirement-refinement dialogue. The
    /// reply may carry an updated requirement list and/or a phase directive.
    async fn chat(&self, message: &str, context: &ChatContext) -> PortResult<ChatOutcome>;
}

#[async_trait]
pub trait ContentGenerationService: Send + Sync {
    /// Produces module or lesson content from the selected requirements,
    /// transcript, and detail settings.
    async fn generate(&self, request: &GenerationRequest) -> PortResult<ContentPayload>;
}

//=========================================================================================
// Input Validation
//=========================================================================================

impl AnalysisRequest {
    /// Rejects requests with empty titles or descriptions before any
    /// network call is made.
    pub fn validate(&self) -> PortResult<()> {
        if self.module_title.trim().is_empty() {
            return Err(PortError::InvalidInput(
                "module title must not be empty".to_string(),
            ));
        }
        if self.module_description.trim().is_empty() {
            return Err(PortError::InvalidInput(
                "module description must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
