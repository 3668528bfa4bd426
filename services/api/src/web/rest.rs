//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification. One parametrized generation
//! path serves both module-level and lesson-level scopes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use courseforge_core::domain::{
    AnalysisRequest, ChatContext, ContentPayload, ContentRequirement, ContentStatus,
    ConversationTurn, DetailLevel, GenerationRequest, GenerationSettings, ModuleContent,
    ScopeKey, WorkflowPhase,
};
use courseforge_core::markdown::{self, Block};
use courseforge_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        analyze_content_requirements_handler,
        content_chat_handler,
        generate_comprehensive_content_handler,
        generate_lesson_content_handler,
        list_module_contents_handler,
        list_lesson_contents_handler,
        update_module_content_handler,
    ),
    components(
        schemas(
            AnalyzeContentRequest,
            AnalyzeContentResponse,
            ContentChatRequest,
            ChatContextBody,
            ContentChatResponse,
            GenerateModuleContentRequest,
            GenerateLessonContentRequest,
            GenerateContentResponse,
            ModuleContentView,
            LessonContentView,
            UpdateContentRequest,
        )
    ),
    tags(
        (name = "Course Forge API", description = "API endpoints for the interactive course content generator.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

/// Request payload for the initial content-requirement analysis.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeContentRequest {
    pub module_title: String,
    pub module_description: String,
    pub course_title: String,
    pub course_description: String,
    pub module_index: u32,
    #[serde(default)]
    pub lesson_title: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AnalyzeContentResponse {
    pub analysis: String,
    #[schema(value_type = Vec<Object>)]
    pub requirements: Vec<ContentRequirement>,
}

/// The context bundle the client sends with each chat message.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatContextBody {
    #[serde(default)]
    pub module_title: Option<String>,
    #[serde(default)]
    pub lesson_title: Option<String>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub content_requirements: Vec<ContentRequirement>,
    pub current_phase: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentChatRequest {
    pub message: String,
    pub context: ChatContextBody,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentChatResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub updated_requirements: Option<Vec<ContentRequirement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub phase: Option<WorkflowPhase>,
}

/// Request payload for module-level content generation. `contentDetail` and
/// `targetWordCount` are accepted as aliases for older clients.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateModuleContentRequest {
    pub outline_id: Uuid,
    pub module_index: u32,
    pub module_title: String,
    pub module_description: String,
    pub course_title: String,
    pub course_description: String,
    #[schema(value_type = Vec<Object>)]
    pub requirements: Vec<ContentRequirement>,
    #[serde(default)]
    #[schema(value_type = Option<Vec<Object>>)]
    pub chat_history: Option<Vec<ConversationTurn>>,
    #[serde(default, alias = "contentDetail")]
    #[schema(value_type = Option<String>)]
    pub detail_level: Option<DetailLevel>,
    #[serde(default, alias = "targetWordCount")]
    pub word_count: Option<u32>,
}

/// Lesson-scoped variant of the generation request.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateLessonContentRequest {
    pub outline_id: Uuid,
    pub module_index: u32,
    pub lesson_index: u32,
    #[serde(default)]
    pub lesson_title: Option<String>,
    pub module_title: String,
    pub module_description: String,
    pub course_title: String,
    pub course_description: String,
    #[schema(value_type = Vec<Object>)]
    pub requirements: Vec<ContentRequirement>,
    #[serde(default)]
    #[schema(value_type = Option<Vec<Object>>)]
    pub chat_history: Option<Vec<ConversationTurn>>,
    #[serde(default, alias = "contentDetail")]
    #[schema(value_type = Option<String>)]
    pub detail_level: Option<DetailLevel>,
    #[serde(default, alias = "targetWordCount")]
    pub word_count: Option<u32>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    pub content_id: Uuid,
    #[schema(value_type = Object)]
    pub content: ContentPayload,
    #[schema(value_type = String)]
    pub status: ContentStatus,
}

/// A persisted content record as served to the SPA.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleContentView {
    pub id: Uuid,
    pub outline_id: Uuid,
    pub module_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_index: Option<u32>,
    pub title: String,
    #[schema(value_type = String)]
    pub status: ContentStatus,
    #[schema(value_type = Object)]
    pub content: ContentPayload,
    pub updated_at: DateTime<Utc>,
}

impl From<ModuleContent> for ModuleContentView {
    fn from(record: ModuleContent) -> Self {
        Self {
            id: record.id,
            outline_id: record.outline_id,
            module_index: record.module_index,
            lesson_index: record.lesson_index,
            title: record.title,
            status: record.status,
            content: record.payload,
            updated_at: record.updated_at,
        }
    }
}

/// A lesson-level record plus the display blocks parsed from its body, so
/// viewers do not each re-implement the markdown parse.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonContentView {
    #[serde(flatten)]
    pub record: ModuleContentView,
    #[schema(value_type = Vec<Object>)]
    pub blocks: Vec<Block>,
}

impl From<ModuleContent> for LessonContentView {
    fn from(record: ModuleContent) -> Self {
        let blocks = markdown::parse_blocks(&record.payload.to_plain_text());
        Self {
            record: record.into(),
            blocks,
        }
    }
}

/// Manual edit payload for the content editor. Bypasses the workflow.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContentRequest {
    pub title: String,
    #[schema(value_type = Object)]
    pub content: ContentPayload,
}

//=========================================================================================
// Analysis and Chat Handlers
//=========================================================================================

/// Analyze a module or lesson and propose its content-requirement checklist.
#[utoipa::path(
    post,
    path = "/api/analyze-content-requirements",
    request_body = AnalyzeContentRequest,
    responses(
        (status = 200, description = "Analysis completed", body = AnalyzeContentResponse),
        (status = 401, description = "Authentication required"),
        (status = 422, description = "Empty title or description"),
        (status = 502, description = "Analysis service failure")
    )
)]
pub async fn analyze_content_requirements_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AnalyzeContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = AnalysisRequest {
        module_title: body.module_title,
        module_description: body.module_description,
        course_title: body.course_title,
        course_description: body.course_description,
        module_index: body.module_index,
        lesson_title: body.lesson_title,
    };
    request.validate()?;

    let outcome = state.analysis_adapter.analyze(&request).await?;
    Ok(Json(AnalyzeContentResponse {
        analysis: outcome.analysis,
        requirements: outcome.requirements,
    }))
}

/// One turn of the requirement-refinement chat.
///
/// The reply may carry a full replacement checklist and/or a phase
/// directive; absent fields mean "unchanged" and the client applies
/// neither.
#[utoipa::path(
    post,
    path = "/api/content-chat",
    request_body = ContentChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ContentChatResponse),
        (status = 401, description = "Authentication required"),
        (status = 422, description = "Empty message or unknown phase"),
        (status = 502, description = "Chat service failure")
    )
)]
pub async fn content_chat_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ContentChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.message.trim().is_empty() {
        return Err(PortError::InvalidInput("message must not be empty".to_string()).into());
    }

    let scope_title = body
        .context
        .lesson_title
        .or(body.context.module_title)
        .ok_or_else(|| {
            PortError::InvalidInput("context must carry a module or lesson title".to_string())
        })?;
    let phase = WorkflowPhase::parse(&body.context.current_phase).ok_or_else(|| {
        PortError::InvalidInput(format!(
            "'{}' is not a workflow phase",
            body.context.current_phase
        ))
    })?;

    let context = ChatContext {
        scope_title,
        requirements: body.context.content_requirements,
        phase,
    };
    let outcome = state.chat_adapter.chat(&body.message, &context).await?;
    Ok(Json(ContentChatResponse {
        message: outcome.message,
        updated_requirements: outcome.updated_requirements,
        phase: outcome.phase,
    }))
}

//=========================================================================================
// Generation Handlers
//=========================================================================================

/// Generate and persist module-level content.
#[utoipa::path(
    post,
    path = "/api/generate-comprehensive-content",
    request_body = GenerateModuleContentRequest,
    responses(
        (status = 200, description = "Content generated and persisted", body = GenerateContentResponse),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "Outline not found"),
        (status = 422, description = "No completed requirements selected"),
        (status = 502, description = "Generation service failure")
    )
)]
pub async fn generate_comprehensive_content_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(body): Json<GenerateModuleContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = ScopeKey::module(body.outline_id, body.module_index);
    let request = build_generation_request(
        scope,
        body.module_title.clone(),
        body.module_description,
        body.course_title,
        body.course_description,
        None,
        body.requirements,
        body.chat_history.unwrap_or_default(),
        body.detail_level,
        body.word_count,
    )?;
    let response = generate_and_persist(&state, user_id, request, body.module_title).await?;
    Ok(Json(response))
}

/// Generate and persist lesson-level content.
#[utoipa::path(
    post,
    path = "/api/generate-lesson-content",
    request_body = GenerateLessonContentRequest,
    responses(
        (status = 200, description = "Content generated and persisted", body = GenerateContentResponse),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "Outline not found"),
        (status = 422, description = "No completed requirements selected"),
        (status = 502, description = "Generation service failure")
    )
)]
pub async fn generate_lesson_content_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(body): Json<GenerateLessonContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = ScopeKey::lesson(body.outline_id, body.module_index, body.lesson_index);
    let title = body
        .lesson_title
        .clone()
        .unwrap_or_else(|| body.module_title.clone());
    let request = build_generation_request(
        scope,
        body.module_title,
        body.module_description,
        body.course_title,
        body.course_description,
        body.lesson_title,
        body.requirements,
        body.chat_history.unwrap_or_default(),
        body.detail_level,
        body.word_count,
    )?;
    let response = generate_and_persist(&state, user_id, request, title).await?;
    Ok(Json(response))
}

#[allow(clippy::too_many_arguments)]
fn build_generation_request(
    scope: ScopeKey,
    module_title: String,
    module_description: String,
    course_title: String,
    course_description: String,
    lesson_title: Option<String>,
    requirements: Vec<ContentRequirement>,
    transcript: Vec<ConversationTurn>,
    detail_level: Option<DetailLevel>,
    word_count: Option<u32>,
) -> Result<GenerationRequest, ApiError> {
    // The generation precondition, re-checked server-side: at least one
    // completed requirement, before the LLM is ever invoked.
    let completed: Vec<ContentRequirement> =
        requirements.into_iter().filter(|r| r.completed).collect();
    if completed.is_empty() {
        return Err(PortError::InvalidInput(
            "at least one completed requirement must be selected".to_string(),
        )
        .into());
    }

    let settings = GenerationSettings {
        detail_level: detail_level.unwrap_or_default(),
        target_word_count: word_count.unwrap_or(GenerationSettings::default().target_word_count),
    };
    Ok(GenerationRequest {
        scope,
        module_title,
        module_description,
        course_title,
        course_description,
        lesson_title,
        requirements: completed,
        transcript,
        detail_level: settings.detail_level,
        target_word_count: settings.clamped_word_count(&scope),
    })
}

/// Runs the generation call and commits the result: by the time the
/// response leaves this function the content record is already persisted,
/// so callers must refetch dependent views rather than trust local copies.
async fn generate_and_persist(
    state: &AppState,
    user_id: Uuid,
    request: GenerationRequest,
    title: String,
) -> Result<GenerateContentResponse, ApiError> {
    let outline = state.db.get_outline(request.scope.outline_id).await?;
    if outline.user_id != user_id {
        return Err(PortError::Unauthorized.into());
    }

    let payload = state.generation_adapter.generate(&request).await?;
    let record = state
        .db
        .upsert_module_content(&request.scope, &title, &payload, ContentStatus::Complete)
        .await?;

    // Best-effort transcript persistence; the record write above is the
    // durable outcome, so a transcript failure only warns.
    if !request.transcript.is_empty() {
        if let Err(e) = state
            .db
            .save_content_session(user_id, &request.scope, &request.transcript)
            .await
        {
            warn!("Failed to persist content session transcript: {:?}", e);
        }
    }

    Ok(GenerateContentResponse {
        content_id: record.id,
        content: record.payload,
        status: record.status,
    })
}

//=========================================================================================
// Content Read and Edit Handlers
//=========================================================================================

/// List the persisted module-level content records for an outline.
#[utoipa::path(
    get,
    path = "/api/outlines/{outline_id}/module-contents",
    params(("outline_id" = Uuid, Path, description = "The outline to list content for")),
    responses(
        (status = 200, description = "Module content records", body = Vec<ModuleContentView>),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "Outline not found")
    )
)]
pub async fn list_module_contents_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(outline_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let outline = state.db.get_outline(outline_id).await?;
    if outline.user_id != user_id {
        return Err(PortError::Unauthorized.into());
    }
    let records = state.db.list_module_contents(outline_id).await?;
    let views: Vec<ModuleContentView> = records.into_iter().map(Into::into).collect();
    Ok(Json(views))
}

/// List the persisted lesson-level content records for an outline, with
/// display blocks parsed from each body.
#[utoipa::path(
    get,
    path = "/api/outlines/{outline_id}/lessons",
    params(("outline_id" = Uuid, Path, description = "The outline to list lesson content for")),
    responses(
        (status = 200, description = "Lesson content records", body = Vec<LessonContentView>),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "Outline not found")
    )
)]
pub async fn list_lesson_contents_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(outline_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let outline = state.db.get_outline(outline_id).await?;
    if outline.user_id != user_id {
        return Err(PortError::Unauthorized.into());
    }
    let records = state.db.list_lesson_contents(outline_id).await?;
    let views: Vec<LessonContentView> = records.into_iter().map(Into::into).collect();
    Ok(Json(views))
}

/// Manually update a content record from the editor.
///
/// A direct read-modify-write on the record: no analysis, no chat, no
/// phase involvement. Saving invalidates the same views as generation.
#[utoipa::path(
    put,
    path = "/api/module-content/{id}",
    params(("id" = Uuid, Path, description = "The content record to update")),
    request_body = UpdateContentRequest,
    responses(
        (status = 200, description = "Content updated", body = ModuleContentView),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "Content record not found")
    )
)]
pub async fn update_module_content_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let existing = state.db.get_module_content(id).await?;
    let outline = state.db.get_outline(existing.outline_id).await?;
    if outline.user_id != user_id {
        return Err(PortError::Unauthorized.into());
    }

    let updated = state
        .db
        .update_module_content(id, &body.title, &body.content)
        .await?;
    Ok((StatusCode::OK, Json(ModuleContentView::from(updated))))
}
