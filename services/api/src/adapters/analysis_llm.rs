//! services/api/src/adapters/analysis_llm.rs
//!
//! This module contains the adapter for the requirement-analysis LLM.
//! It implements the `ContentAnalysisService` port from the `core` crate.

const SYSTEM_INSTRUCTIONS: &str = r#"You are a curriculum designer analyzing one module (or lesson) of a course to decide what kinds of content it needs.

You will receive the course title and description, the module title and description, the module's position in the course, and possibly a lesson title.

Propose a checklist of content requirements. Draw from facets such as:
- learning objectives
- theoretical foundation
- practical examples
- hands-on exercises
- case studies
- assessments
- further resources

Rules for the checklist:
- Between 3 and 7 requirements.
- Each requirement has a stable kebab-case id (e.g. "theoretical-foundation"), a short title, and a one-sentence description of what it would add to this specific module.
- Mark the requirements you consider essential for this module as completed (true); leave optional ones unchecked (false).
- Assign each a priority of "high", "medium", or "low".

Respond with ONLY a JSON object in exactly this shape, no prose around it:
{
  "analysis": "<2-4 sentences summarizing what this module needs and why>",
  "requirements": [
    {"id": "...", "title": "...", "description": "...", "completed": true, "priority": "high"}
  ]
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
use courseforge_core::domain::{AnalysisOutcome, AnalysisRequest};
use courseforge_core::ports::{ContentAnalysisService, PortError, PortResult};

use super::strip_code_fence;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ContentAnalysisService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiAnalysisAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiAnalysisAdapter {
    /// Creates a new `OpenAiAnalysisAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    fn build_user_input(request: &AnalysisRequest) -> String {
        let mut input = format!(
            "COURSE: {}\nCOURSE DESCRIPTION: {}\n\nMODULE {} TITLE: {}\nMODULE DESCRIPTION: {}",
            request.course_title,
            request.course_description,
            request.module_index + 1,
            request.module_title,
            request.module_description,
        );
        if let Some(lesson) = &request.lesson_title {
            input.push_str("\nLESSON TITLE: ");
            input.push_str(lesson);
        }
        input
    }
}

//=========================================================================================
// `ContentAnalysisService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentAnalysisService for OpenAiAnalysisAdapter {
    async fn analyze(&self, request: &AnalysisRequest) -> PortResult<AnalysisOutcome> {
        request.validate()?;

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
                PortError::Unexpected("Analysis LLM returned no text content.".to_string())
            })?;

        let json = strip_code_fence(&content);
        serde_json::from_str::<AnalysisOutcome>(&json).map_err(|e| {
            PortError::Unexpected(format!("Analysis LLM returned malformed JSON: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courseforge_core::domain::Priority;

    #[test]
    fn parses_the_expected_reply_shape() {
        let raw = r#"```json
{
  "analysis": "This module needs fundamentals first.",
  "requirements": [
    {"id": "learning-objectives", "title": "Objectives", "description": "State the goals.", "completed": true, "priority": "high"},
    {"id": "case-studies", "title": "Case Studies", "description": "Real systems.", "completed": false, "priority": "low"}
  ]
}
```"#;
        let outcome: AnalysisOutcome =
            serde_json::from_str(&strip_code_fence(raw)).unwrap();
        assert_eq!(outcome.requirements.len(), 2);
        assert_eq!(outcome.requirements[0].priority, Priority::High);
        assert!(outcome.requirements[0].completed);
    }

    #[test]
    fn missing_priority_defaults_to_medium() {
        let raw = r#"{"analysis": "ok", "requirements": [{"id": "x", "title": "X", "description": "d", "completed": true}]}"#;
        let outcome: AnalysisOutcome = serde_json::from_str(raw).unwrap();
        assert_eq!(outcome.requirements[0].priority, Priority::Medium);
    }

    #[test]
    fn user_input_includes_lesson_title_when_lesson_scoped() {
        let request = AnalysisRequest {
            module_title: "Intro".into(),
            module_description: "Basics".into(),
            course_title: "APIs".into(),
            course_description: "A course".into(),
            module_index: 0,
            lesson_title: Some("What is REST?".into()),
        };
        let input = OpenAiAnalysisAdapter::build_user_input(&request);
        assert!(input.contains("MODULE 1 TITLE: Intro"));
        assert!(input.contains("LESSON TITLE: What is REST?"));
    }
}
