pub mod domain;
pub mod markdown;
pub mod ports;
pub mod workflow;

pub use domain::{
    AnalysisOutcome, AnalysisRequest, ChatContext, ChatOutcome, ContentPayload,
    ContentRequirement, ContentStatus, ConversationTurn, DetailLevel, GenerationRequest,
    GenerationSettings, ModuleContent, Outline, OutlineLesson, OutlineModule, Priority,
    RequirementSet, ScopeKey, StructuredContent, Transcript, TurnRole, WorkflowPhase,
};
pub use ports::{
    ChatService, ContentAnalysisService, ContentGenerationService, DatabaseService, PortError,
    PortResult,
};
pub use workflow::{Applied, CallTicket, ScopeMeta, WorkflowError, WorkflowSession};
