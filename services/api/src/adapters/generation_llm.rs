//! services/api/src/adapters/generation_llm.rs
//!
//! This module contains the adapter for the content-generating LLM.
//! It implements the `ContentGenerationService` port from the `core` crate.
//! The model may return structured JSON or plain markdown; both are
//! resolved into `ContentPayload` here, at the boundary.

const SYSTEM_INSTRUCTIONS: &str = r#"You are an expert course author writing the actual teaching content for one module or lesson of a course.

You will receive the course and module metadata, the selected content requirements, the refinement conversation the user had about this content, the detail level with its word-count band, and a target word count. The word count is a target, not a hard limit.

Write substantive teaching content that covers every selected requirement. Respect the requirement priorities: high-priority facets get the most depth.

Format the content in markdown: `#`/`##` headings, `-` bullet lists, `1.` numbered lists, and whole-line `**bold**` lead-ins where emphasis helps.

If and only if the requirements call for distinct sub-collections (separate lessons, exercises, case studies, or assessments), you may instead respond with a JSON object of this shape:
{
  "lessons": [{"title": "...", "content": "...markdown..."}],
  "exercises": [{"title": "...", "content": "..."}],
  "caseStudies": [{"title": "...", "content": "..."}],
  "assessments": [{"title": "...", "content": "..."}]
}
Otherwise respond with the markdown content directly, with no JSON wrapper and no surrounding commentary."#;

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
use courseforge_core::domain::{
    ContentPayload, GenerationRequest, StructuredContent, TurnRole,
};
use courseforge_core::ports::{ContentGenerationService, PortError, PortResult};
use std::fmt::Write as _;

use super::strip_code_fence;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ContentGenerationService` using an
/// OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerationAdapter {
    /// Creates a new `OpenAiGenerationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    fn build_user_input(request: &GenerationRequest) -> String {
        let mut input = format!(
            "COURSE: {}\nCOURSE DESCRIPTION: {}\n\nMODULE: {}\nMODULE DESCRIPTION: {}\n",
            request.course_title,
            request.course_description,
            request.module_title,
            request.module_description,
        );
        if let Some(lesson) = &request.lesson_title {
            let _ = writeln!(input, "LESSON: {}", lesson);
        }

        input.push_str("\nSELECTED REQUIREMENTS:\n");
        for req in &request.requirements {
            let _ = writeln!(
                input,
                "- [{:?}] {}: {}",
                req.priority, req.title, req.description
            );
        }

        if !request.transcript.is_empty() {
            input.push_str("\nREFINEMENT CONVERSATION:\n");
            for turn in &request.transcript {
                let speaker = match turn.role {
                    TurnRole::User => "User",
                    TurnRole::Assistant => "Assistant",
                    TurnRole::System => "System",
                };
                let _ = writeln!(input, "{}: {}", speaker, turn.content);
            }
        }

        let (low, high) = request.detail_level.word_count_band();
        let band = match high {
            Some(high) => format!("{}-{} words", low, high),
            None => format!("{}+ words", low),
        };
        let _ = write!(
            input,
            "\nDETAIL LEVEL: {:?} ({})\nTARGET WORD COUNT: {}",
            request.detail_level, band, request.target_word_count
        );
        input
    }

    /// Resolves the model's reply into the tagged payload: a JSON object
    /// with recognizable sub-collections becomes structured content,
    /// anything else is kept as plain text.
    fn resolve_payload(raw: &str) -> ContentPayload {
        let stripped = strip_code_fence(raw);
        if stripped.starts_with('{') {
            if let Ok(structured) = serde_json::from_str::<StructuredContent>(&stripped) {
                // An object without any recognizable sub-collection is not
                // structured content; keep the raw text instead.
                let populated = !structured.lessons.is_empty()
                    || !structured.exercises.is_empty()
                    || !structured.case_studies.is_empty()
                    || !structured.assessments.is_empty();
                if populated {
                    return ContentPayload::Structured(structured);
                }
            }
        }
        ContentPayload::PlainText(stripped)
    }
}

//=========================================================================================
// `ContentGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentGenerationService for OpenAiGenerationAdapter {
    async fn generate(&self, request: &GenerationRequest) -> PortResult<ContentPayload> {
        if request.requirements.is_empty() {
            return Err(PortError::InvalidInput(
                "at least one completed requirement is required".to_string(),
            ));
        }

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(Self::build_user_input(request))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        // Roughly two tokens per word, with headroom for markup.
        let max_tokens = request.target_word_count.saturating_mul(2).clamp(1000, 12000);
        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(max_tokens)
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
                PortError::Unexpected("Generation LLM returned no text content.".to_string())
            })?;

        Ok(Self::resolve_payload(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use courseforge_core::domain::{
        ContentRequirement, ConversationTurn, DetailLevel, Priority, ScopeKey,
    };
    use uuid::Uuid;

    fn request() -> GenerationRequest {
        GenerationRequest {
            scope: ScopeKey::module(Uuid::new_v4(), 1),
            module_title: "REST Fundamentals".into(),
            module_description: "Resources, verbs, and status codes".into(),
            course_title: "API Design".into(),
            course_description: "Designing HTTP APIs well".into(),
            lesson_title: None,
            requirements: vec![ContentRequirement {
                id: "theoretical-foundation".into(),
                title: "Theory".into(),
                description: "Explain REST constraints".into(),
                completed: true,
                priority: Priority::High,
            }],
            transcript: vec![ConversationTurn {
                role: TurnRole::User,
                content: "Focus on status codes".into(),
                timestamp: Utc::now(),
            }],
            detail_level: DetailLevel::Detailed,
            target_word_count: 1000,
        }
    }

    #[test]
    fn user_input_carries_requirements_transcript_and_band() {
        let input = OpenAiGenerationAdapter::build_user_input(&request());
        assert!(input.contains("MODULE: REST Fundamentals"));
        assert!(input.contains("Theory: Explain REST constraints"));
        assert!(input.contains("User: Focus on status codes"));
        assert!(input.contains("800-1200 words"));
        assert!(input.contains("TARGET WORD COUNT: 1000"));
    }

    #[test]
    fn markdown_reply_resolves_to_plain_text() {
        let payload = OpenAiGenerationAdapter::resolve_payload("# REST\n\nResources matter.");
        assert_eq!(
            payload,
            ContentPayload::PlainText("# REST\n\nResources matter.".into())
        );
    }

    #[test]
    fn json_reply_resolves_to_structured() {
        let raw = r#"```json
{"lessons": [{"title": "Verbs", "content": "GET is safe."}], "exercises": []}
```"#;
        match OpenAiGenerationAdapter::resolve_payload(raw) {
            ContentPayload::Structured(s) => assert_eq!(s.lessons.len(), 1),
            ContentPayload::PlainText(_) => panic!("expected structured payload"),
        }
    }

    #[test]
    fn malformed_json_falls_back_to_plain_text() {
        let raw = "{not json at all";
        assert!(matches!(
            OpenAiGenerationAdapter::resolve_payload(raw),
            ContentPayload::PlainText(_)
        ));
    }
}
