//! crates/courseforge_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP framework, but they
//! derive serde traits because the workflow contract is a JSON wire format
//! shared with the browser client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Content Requirements
//=========================================================================================

/// Relative importance of a content requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// A selectable facet of content to include in a generation request,
/// e.g. "theoretical-foundation" or "case-studies".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRequirement {
    /// Stable string key, unique within a requirement set.
    pub id: String,
    pub title: String,
    pub description: String,
    /// The user's inclusion decision.
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
}

/// The checklist of content requirements for one workflow session.
///
/// Enforces id-uniqueness on construction and on wholesale replacement: when
/// two entries share an id, the first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementSet {
    items: Vec<ContentRequirement>,
}

impl RequirementSet {
    pub fn new(items: Vec<ContentRequirement>) -> Self {
        let mut deduped: Vec<ContentRequirement> = Vec::with_capacity(items.len());
        for item in items {
            if !deduped.iter().any(|existing| existing.id == item.id) {
                deduped.push(item);
            }
        }
        Self { items: deduped }
    }

    pub fn items(&self) -> &[ContentRequirement] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Sets the inclusion flag on one requirement. Returns false when no
    /// requirement with that id exists.
    pub fn toggle(&mut self, id: &str, completed: bool) -> bool {
        match self.items.iter_mut().find(|r| r.id == id) {
            Some(req) => {
                req.completed = completed;
                true
            }
            None => false,
        }
    }

    /// True when at least one requirement is marked for inclusion.
    /// Generation is permitted iff this holds.
    pub fn any_completed(&self) -> bool {
        self.items.iter().any(|r| r.completed)
    }

    /// The requirements that will actually be sent to the generator.
    pub fn completed_only(&self) -> Vec<ContentRequirement> {
        self.items.iter().filter(|r| r.completed).cloned().collect()
    }

    /// Replaces the whole set with a server-provided update. All-or-nothing;
    /// a failed call must not apply a partial update.
    pub fn replace_with(&mut self, items: Vec<ContentRequirement>) {
        *self = Self::new(items);
    }
}

//=========================================================================================
// Conversation
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

/// One turn in the requirement-refinement dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// An append-only, insertion-ordered transcript of conversation turns.
/// Turns are never rewritten, only appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
}

impl Transcript {
    pub fn push(&mut self, role: TurnRole, content: impl Into<String>) {
        self.turns.push(ConversationTurn {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

//=========================================================================================
// Workflow Phase
//=========================================================================================

/// The stage of the interactive generation workflow. This is a closed enum:
/// a server- or model-supplied phase string that does not match one of these
/// four values must be ignored, never adopted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowPhase {
    Analysis,
    Requirements,
    Generation,
    Review,
}

impl WorkflowPhase {
    /// Parses a phase name, returning None for anything outside the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "analysis" => Some(Self::Analysis),
            "requirements" => Some(Self::Requirements),
            "generation" => Some(Self::Generation),
            "review" => Some(Self::Review),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Requirements => "requirements",
            Self::Generation => "generation",
            Self::Review => "review",
        }
    }
}

//=========================================================================================
// Generation Settings
//=========================================================================================

/// How much depth the generator should aim for. Each level maps to a
/// canonical word-count band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Brief,
    Quick,
    #[default]
    Detailed,
    Comprehensive,
}

impl DetailLevel {
    /// The canonical word-count band for this level. The upper bound is open
    /// for `Comprehensive`.
    pub fn word_count_band(&self) -> (u32, Option<u32>) {
        match self {
            Self::Brief => (300, Some(500)),
            Self::Quick => (500, Some(800)),
            Self::Detailed => (800, Some(1200)),
            Self::Comprehensive => (1200, None),
        }
    }
}

/// User-tunable knobs for a generation request. The word count is advisory
/// to the generator, not enforced on the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub detail_level: DetailLevel,
    pub target_word_count: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            detail_level: DetailLevel::default(),
            target_word_count: 1000,
        }
    }
}

impl GenerationSettings {
    /// Clamps the target word count to the allowed range for the scope:
    /// [200, 3000] for module-level content, [300, 5000] for lesson-level.
    pub fn clamped_word_count(&self, scope: &ScopeKey) -> u32 {
        let (min, max) = if scope.is_lesson() {
            (300, 5000)
        } else {
            (200, 3000)
        };
        self.target_word_count.clamp(min, max)
    }
}

//=========================================================================================
// Content Identity and Payload
//=========================================================================================

/// The canonical key for one generated-content record. One parametrization
/// covers both module-level and lesson-level scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub outline_id: Uuid,
    pub module_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_index: Option<u32>,
}

impl ScopeKey {
    pub fn module(outline_id: Uuid, module_index: u32) -> Self {
        Self {
            outline_id,
            module_index,
            lesson_index: None,
        }
    }

    pub fn lesson(outline_id: Uuid, module_index: u32, lesson_index: u32) -> Self {
        Self {
            outline_id,
            module_index,
            lesson_index: Some(lesson_index),
        }
    }

    pub fn is_lesson(&self) -> bool {
        self.lesson_index.is_some()
    }
}

/// A titled unit inside structured generated content (a generated lesson
/// body, an exercise, a case study, an assessment item).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    pub title: String,
    pub content: String,
}

/// Sub-collections of a structured generation result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredContent {
    #[serde(default)]
    pub lessons: Vec<ContentUnit>,
    #[serde(default)]
    pub exercises: Vec<ContentUnit>,
    #[serde(default)]
    pub case_studies: Vec<ContentUnit>,
    #[serde(default)]
    pub assessments: Vec<ContentUnit>,
}

/// Generated content as stored and served. The generator may return either a
/// free-form rich-text string or a structured object; both JSON shapes are
/// resolved into this tagged variant once, at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPayload {
    Structured(StructuredContent),
    PlainText(String),
}

impl ContentPayload {
    /// Flattens the payload into a single plain-text body for editors that
    /// only take a string.
    pub fn to_plain_text(&self) -> String {
        match self {
            Self::PlainText(text) => text.clone(),
            Self::Structured(s) => {
                let mut out = String::new();
                for (heading, units) in [
                    ("Lessons", &s.lessons),
                    ("Exercises", &s.exercises),
                    ("Case Studies", &s.case_studies),
                    ("Assessments", &s.assessments),
                ] {
                    if units.is_empty() {
                        continue;
                    }
                    if !out.is_empty() {
                        out.push_str("\n\n");
                    }
                    out.push_str("## ");
                    out.push_str(heading);
                    for unit in units {
                        out.push_str("\n\n### ");
                        out.push_str(&unit.title);
                        out.push_str("\n\n");
                        out.push_str(&unit.content);
                    }
                }
                out
            }
        }
    }
}

//=========================================================================================
// Persisted Content Records
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    NotStarted,
    InProgress,
    Complete,
    NeedsReview,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::NeedsReview => "needs_review",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "not_started" => Some(Self::NotStarted),
            "in_progress" => Some(Self::InProgress),
            "complete" => Some(Self::Complete),
            "needs_review" => Some(Self::NeedsReview),
            _ => None,
        }
    }
}

/// The canonical persisted content record for one scope key. At most one
/// record exists per key; regeneration and manual edits overwrite in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleContent {
    pub id: Uuid,
    pub outline_id: Uuid,
    pub module_index: u32,
    pub lesson_index: Option<u32>,
    pub title: String,
    pub status: ContentStatus,
    pub payload: ContentPayload,
    pub updated_at: DateTime<Utc>,
}

impl ModuleContent {
    pub fn scope(&self) -> ScopeKey {
        ScopeKey {
            outline_id: self.outline_id,
            module_index: self.module_index,
            lesson_index: self.lesson_index,
        }
    }
}

//=========================================================================================
// Outline Tree
//=========================================================================================

/// A lesson inside an outline module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineLesson {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
}

/// A top-level unit of an outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineModule {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub lessons: Vec<OutlineLesson>,
}

/// The top-level generated course structure. The version counter lives at
/// outline granularity and is bumped by outline edits, independently of
/// module content records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub version: u32,
    pub modules: Vec<OutlineModule>,
}

impl Outline {
    pub fn module(&self, index: u32) -> Option<&OutlineModule> {
        self.modules.get(index as usize)
    }

    pub fn lesson(&self, module_index: u32, lesson_index: u32) -> Option<&OutlineLesson> {
        self.module(module_index)
            .and_then(|m| m.lessons.get(lesson_index as usize))
    }
}

//=========================================================================================
// Port Payloads
//=========================================================================================

/// Input for the one-shot requirement analysis call made when a workflow
/// session first opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub module_title: String,
    pub module_description: String,
    pub course_title: String,
    pub course_description: String,
    pub module_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_title: Option<String>,
}

/// Result of the analysis call: a natural-language summary plus the
/// server-proposed initial requirement checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub analysis: String,
    pub requirements: Vec<ContentRequirement>,
}

/// The context bundle sent alongside each chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatContext {
    pub scope_title: String,
    pub requirements: Vec<ContentRequirement>,
    pub phase: WorkflowPhase,
}

/// An assistant reply, optionally carrying a requirement update and/or a
/// server-directed phase change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_requirements: Option<Vec<ContentRequirement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<WorkflowPhase>,
}

/// Everything the generator needs to produce content for one scope key.
/// `requirements` carries only the completed entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub scope: ScopeKey,
    pub module_title: String,
    pub module_description: String,
    pub course_title: String,
    pub course_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_title: Option<String>,
    pub requirements: Vec<ContentRequirement>,
    pub transcript: Vec<ConversationTurn>,
    pub detail_level: DetailLevel,
    pub target_word_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirement_set_dedupes_on_construction() {
        let set = RequirementSet::new(vec![
            req("theory", true),
            req("examples", false),
            req("theory", false),
        ]);
        assert_eq!(set.len(), 2);
        // First occurrence wins.
        assert!(set.items()[0].completed);
    }

    #[test]
    fn generation_gate_requires_a_completed_requirement() {
        let mut set = RequirementSet::new(vec![req("theory", false), req("examples", false)]);
        assert!(!set.any_completed());
        assert!(set.toggle("examples", true));
        assert!(set.any_completed());
        assert_eq!(set.completed_only().len(), 1);
        assert_eq!(set.completed_only()[0].id, "examples");
    }

    #[test]
    fn toggle_unknown_id_is_a_no_op() {
        let mut set = RequirementSet::new(vec![req("theory", false)]);
        assert!(!set.toggle("missing", true));
        assert!(!set.any_completed());
    }

    #[test]
    fn phase_parse_rejects_unknown_values() {
        assert_eq!(WorkflowPhase::parse("Requirements"), Some(WorkflowPhase::Requirements));
        assert_eq!(WorkflowPhase::parse(" review "), Some(WorkflowPhase::Review));
        assert_eq!(WorkflowPhase::parse("finished"), None);
        assert_eq!(WorkflowPhase::parse(""), None);
    }

    #[test]
    fn word_count_is_clamped_per_scope() {
        let settings = GenerationSettings {
            detail_level: DetailLevel::Comprehensive,
            target_word_count: 4000,
        };
        let module_scope = ScopeKey::module(Uuid::new_v4(), 0);
        let lesson_scope = ScopeKey::lesson(Uuid::new_v4(), 0, 2);
        assert_eq!(settings.clamped_word_count(&module_scope), 3000);
        assert_eq!(settings.clamped_word_count(&lesson_scope), 4000);

        let tiny = GenerationSettings {
            detail_level: DetailLevel::Brief,
            target_word_count: 50,
        };
        assert_eq!(tiny.clamped_word_count(&module_scope), 200);
        assert_eq!(tiny.clamped_word_count(&lesson_scope), 300);
    }

    #[test]
    fn content_payload_accepts_both_wire_shapes() {
        let plain: ContentPayload = serde_json::from_str("\"Just a paragraph.\"").unwrap();
        assert_eq!(plain, ContentPayload::PlainText("Just a paragraph.".into()));

        let structured: ContentPayload = serde_json::from_str(
            r#"{"lessons":[{"title":"L1","content":"Body"}],"caseStudies":[]}"#,
        )
        .unwrap();
        match structured {
            ContentPayload::Structured(s) => {
                assert_eq!(s.lessons.len(), 1);
                assert!(s.case_studies.is_empty());
            }
            ContentPayload::PlainText(_) => panic!("expected structured payload"),
        }
    }

    #[test]
    fn structured_payload_flattens_to_plain_text() {
        let payload = ContentPayload::Structured(StructuredContent {
            lessons: vec![ContentUnit {
                title: "Intro".into(),
                content: "Welcome.".into(),
            }],
            exercises: vec![],
            case_studies: vec![],
            assessments: vec![],
        });
        let text = payload.to_plain_text();
        assert!(text.contains("## Lessons"));
        assert!(text.contains("### Intro"));
        assert!(text.contains("Welcome."));
    }

    fn req(id: &str, completed: bool) -> ContentRequirement {
        ContentRequirement {
            id: id.into(),
            title: id.to_uppercase(),
            description: format!("Include {}", id),
            completed,
            priority: Priority::default(),
        }
    }
}
