//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the requirement-refinement chat LLM.
//! It implements the `ChatService` port from the `core` crate. The model's
//! reply may carry an updated requirement checklist and/or a phase
//! directive; the phase is a closed set and unknown values are ignored.

const SYSTEM_INSTRUCTIONS: &str = r#"You are a course-design assistant helping a user refine the content requirements for one module or lesson before content is generated.

You will receive the scope title, the current requirement checklist (each entry has an id, title, description, completed flag, and priority), the current workflow phase, and the user's message.

Your job:
- Answer the user's message conversationally and concretely, in 1-4 sentences.
- When the user asks to add, remove, re-describe, re-prioritize, check, or uncheck requirements, return the FULL updated checklist reflecting those changes. Keep existing ids stable; invent kebab-case ids for new entries.
- When the user clearly asks to proceed to generation (e.g. "generate it", "looks good, go ahead"), set the phase to "generation". When they ask to revisit the checklist from a later stage, set it to "requirements". Otherwise omit the phase entirely.
- Never invent a phase outside: "analysis", "requirements", "generation", "review".

Respond with ONLY a JSON object in exactly this shape, no prose around it:
{
  "message": "<your reply to the user>",
  "updatedRequirements": [ ...full checklist... ] or null if unchanged,
  "phase": "generation" or null if unchanged
}"#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use courseforge_core::domain::{ChatContext, ChatOutcome, ContentRequirement, WorkflowPhase};
use courseforge_core::ports::{ChatService, PortError, PortResult};
use serde::Deserialize;
use tracing::warn;

use super::strip_code_fence;

//=========================================================================================
// Wire Shape of the Model Reply
//=========================================================================================

/// The raw reply shape requested from the model. The phase arrives as a
/// string and is narrowed to the closed enum here, at the boundary.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatReply {
    message: String,
    #[serde(default)]
    updated_requirements: Option<Vec<ContentRequirement>>,
    #[serde(default)]
    phase: Option<String>,
}

impl ChatReply {
    fn into_outcome(self) -> ChatOutcome {
        let phase = self.phase.as_deref().and_then(|raw| {
            let parsed = WorkflowPhase::parse(raw);
            if parsed.is_none() {
                warn!("Ignoring unknown phase '{}' in chat reply", raw);
            }
            parsed
        });
        ChatOutcome {
            message: self.message,
            updated_requirements: self.updated_requirements,
            phase,
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    fn build_user_input(message: &str, context: &ChatContext) -> PortResult<String> {
        let checklist = serde_json::to_string_pretty(&context.requirements)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(format!(
            "SCOPE: {}\nCURRENT PHASE: {}\n\nCURRENT REQUIREMENTS:\n{}\n\nUSER MESSAGE:\n{}",
            context.scope_title,
            context.phase.as_str(),
            checklist,
            message,
        ))
    }
}

//=========================================================================================
// `ChatService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatService for OpenAiChatAdapter {
    async fn chat(&self, message: &str, context: &ChatContext) -> PortResult<ChatOutcome> {
        if message.trim().is_empty() {
            return Err(PortError::InvalidInput(
                "message must not be empty".to_string(),
            ));
        }

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(Self::build_user_input(message, context)?)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Chat LLM returned no text content.".to_string())
            })?;

        let json = strip_code_fence(&content);
        let reply = serde_json::from_str::<ChatReply>(&json).map_err(|e| {
            PortError::Unexpected(format!("Chat LLM returned malformed JSON: {}", e))
        })?;
        Ok(reply.into_outcome())
    }
}
