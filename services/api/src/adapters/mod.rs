pub mod analysis_llm;
pub mod chat_llm;
pub mod db;
pub mod generation_llm;

pub use analysis_llm::OpenAiAnalysisAdapter;
pub use chat_llm::OpenAiChatAdapter;
pub use db::DbAdapter;
pub use generation_llm::OpenAiGenerationAdapter;

use regex::Regex;

/// Strips a markdown code fence from a model reply, if present. The models
/// are instructed to return bare JSON but routinely wrap it anyway.
pub(crate) fn strip_code_fence(raw: &str) -> String {
    let fence = Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").unwrap();
    match fence.captures(raw) {
        Some(caps) => caps[1].to_string(),
        None => raw.trim().to_string(),
    }
}
