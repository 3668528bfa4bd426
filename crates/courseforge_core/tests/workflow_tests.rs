//! End-to-end workflow tests over in-memory fake ports: the session state
//! machine plus the generation/persistence contract, without a database or
//! an LLM in the loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use courseforge_core::domain::{
    ContentPayload, ContentRequirement, ContentStatus, GenerationRequest, GenerationSettings,
    ModuleContent, Priority, RequirementSet, ScopeKey, WorkflowPhase,
};
use courseforge_core::ports::{PortError, PortResult};
use courseforge_core::workflow::{ScopeMeta, WorkflowError, WorkflowSession};
use uuid::Uuid;

//=========================================================================================
// Fakes
//=========================================================================================

type Key = (Uuid, u32, Option<u32>);

/// In-memory stand-in for the content table: one record per scope key,
/// overwritten on conflict, exactly like the SQL upsert.
#[derive(Default)]
struct FakeContentStore {
    records: Mutex<HashMap<Key, ModuleContent>>,
}

impl FakeContentStore {
    fn upsert(&self, scope: &ScopeKey, title: &str, payload: ContentPayload) -> ModuleContent {
        let mut records = self.records.lock().unwrap();
        let key = (scope.outline_id, scope.module_index, scope.lesson_index);
        let id = records.get(&key).map(|r| r.id).unwrap_or_else(Uuid::new_v4);
        let record = ModuleContent {
            id,
            outline_id: scope.outline_id,
            module_index: scope.module_index,
            lesson_index: scope.lesson_index,
            title: title.to_string(),
            status: ContentStatus::Complete,
            payload,
            updated_at: Utc::now(),
        };
        records.insert(key, record.clone());
        record
    }

    fn get(&self, scope: &ScopeKey) -> Option<ModuleContent> {
        let key = (scope.outline_id, scope.module_index, scope.lesson_index);
        self.records.lock().unwrap().get(&key).cloned()
    }

    fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    fn update_by_id(&self, id: Uuid, title: &str, payload: ContentPayload) -> Option<ModuleContent> {
        let mut records = self.records.lock().unwrap();
        let record = records.values_mut().find(|r| r.id == id)?;
        record.title = title.to_string();
        record.payload = payload;
        record.updated_at = Utc::now();
        Some(record.clone())
    }
}

/// A generator that records every request body and can be flipped into a
/// failing mode.
struct FakeGenerator {
    calls: Mutex<Vec<GenerationRequest>>,
    fail: AtomicUsize,
}

impl FakeGenerator {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: AtomicUsize::new(0),
        }
    }

    fn fail_next(&self, count: usize) {
        self.fail.store(count, Ordering::SeqCst);
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl courseforge_core::ports::ContentGenerationService for FakeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> PortResult<ContentPayload> {
        self.calls.lock().unwrap().push(request.clone());
        if self.fail.load(Ordering::SeqCst) > 0 {
            self.fail.fetch_sub(1, Ordering::SeqCst);
            return Err(PortError::Unexpected("generator offline".to_string()));
        }
        Ok(ContentPayload::PlainText(format!(
            "Generated {} words about {}",
            request.target_word_count, request.module_title
        )))
    }
}

fn requirement(id: &str, completed: bool) -> ContentRequirement {
    ContentRequirement {
        id: id.to_string(),
        title: id.to_string(),
        description: format!("Cover {}", id),
        completed,
        priority: Priority::default(),
    }
}

fn open_session(outline_id: Uuid) -> WorkflowSession {
    WorkflowSession::open(
        ScopeKey::module(outline_id, 0),
        ScopeMeta {
            course_title: "API Design".into(),
            course_description: "Designing HTTP APIs well".into(),
            module_title: "Intro to APIs".into(),
            module_description: "Foundations".into(),
            lesson_title: None,
        },
        GenerationSettings::default(),
    )
}

/// Runs analysis with a canned three-requirement checklist, two completed
/// by default.
fn analyze(session: &mut WorkflowSession) {
    let ticket = session.begin_analysis().unwrap();
    session.apply_analysis(
        ticket,
        "This module should cover theory, examples, and exercises.".into(),
        RequirementSet::new(vec![
            requirement("theoretical-foundation", true),
            requirement("practical-examples", true),
            requirement("exercises", false),
        ]),
    );
}

//=========================================================================================
// Scenarios
//=========================================================================================

#[tokio::test]
async fn scenario_a_full_workflow_persists_a_complete_record() {
    use courseforge_core::ports::ContentGenerationService;

    let outline_id = Uuid::new_v4();
    let store = FakeContentStore::default();
    let generator = FakeGenerator::new();

    let mut session = open_session(outline_id);
    analyze(&mut session);
    assert_eq!(session.phase(), WorkflowPhase::Requirements);
    assert_eq!(session.requirements().completed_only().len(), 2);

    // Toggle the third requirement on, then generate with all three.
    assert!(session.requirements_mut().toggle("exercises", true));
    let (ticket, request) = session.prepare_generation().unwrap();
    assert_eq!(request.requirements.len(), 3);

    let payload = generator.generate(&request).await.unwrap();
    let record = store.upsert(&request.scope, &request.module_title, payload.clone());
    session.apply_generation(ticket, &payload);

    assert_eq!(session.phase(), WorkflowPhase::Review);
    assert_eq!(record.status, ContentStatus::Complete);
    let stored = store.get(session.scope()).unwrap();
    assert_eq!(stored.status, ContentStatus::Complete);
    assert_eq!(stored.module_index, 0);
}

#[tokio::test]
async fn scenario_b_no_completed_requirements_means_no_network_call() {
    let mut session = open_session(Uuid::new_v4());
    analyze(&mut session);
    let generator = FakeGenerator::new();

    for id in ["theoretical-foundation", "practical-examples"] {
        session.requirements_mut().toggle(id, false);
    }
    assert_eq!(
        session.prepare_generation().map(|_| ()),
        Err(WorkflowError::NoRequirementsSelected)
    );
    assert_eq!(generator.call_count(), 0);
    assert_eq!(session.phase(), WorkflowPhase::Requirements);
}

#[tokio::test]
async fn scenario_c_failed_generation_retries_with_an_identical_body() {
    use courseforge_core::ports::ContentGenerationService;

    let mut session = open_session(Uuid::new_v4());
    analyze(&mut session);
    let generator = FakeGenerator::new();
    generator.fail_next(1);

    let (ticket, first) = session.prepare_generation().unwrap();
    assert!(generator.generate(&first).await.is_err());
    session.apply_generation_failure(ticket);
    assert_eq!(session.phase(), WorkflowPhase::Generation);

    let (ticket, second) = session.prepare_generation().unwrap();
    assert_eq!(first, second);
    let payload = generator.generate(&second).await.unwrap();
    session.apply_generation(ticket, &payload);
    assert_eq!(session.phase(), WorkflowPhase::Review);
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn scenario_d_manual_edit_bypasses_the_workflow() {
    use courseforge_core::ports::ContentGenerationService;

    let outline_id = Uuid::new_v4();
    let store = FakeContentStore::default();
    let generator = FakeGenerator::new();

    let mut session = open_session(outline_id);
    analyze(&mut session);
    let (ticket, request) = session.prepare_generation().unwrap();
    let payload = generator.generate(&request).await.unwrap();
    let record = store.upsert(&request.scope, &request.module_title, payload.clone());
    session.apply_generation(ticket, &payload);
    let phase_before = session.phase();

    // Editor path: read-modify-write by record id, no workflow involvement.
    let edited = store
        .update_by_id(
            record.id,
            "Intro to APIs (edited)",
            ContentPayload::PlainText("Hand-tuned body".into()),
        )
        .unwrap();
    assert_eq!(edited.payload, ContentPayload::PlainText("Hand-tuned body".into()));
    assert_eq!(session.phase(), phase_before);
}

#[tokio::test]
async fn regeneration_overwrites_instead_of_duplicating() {
    use courseforge_core::ports::ContentGenerationService;

    let outline_id = Uuid::new_v4();
    let store = FakeContentStore::default();
    let generator = FakeGenerator::new();

    let mut session = open_session(outline_id);
    analyze(&mut session);

    let (ticket, request) = session.prepare_generation().unwrap();
    let payload = generator.generate(&request).await.unwrap();
    let first = store.upsert(&request.scope, &request.module_title, payload.clone());
    session.apply_generation(ticket, &payload);

    session.reopen_requirements();
    let (ticket, request) = session.prepare_generation().unwrap();
    let payload = generator.generate(&request).await.unwrap();
    let second = store.upsert(&request.scope, &request.module_title, payload.clone());
    session.apply_generation(ticket, &payload);

    assert_eq!(store.len(), 1);
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn lesson_scope_uses_its_own_record_key() {
    use courseforge_core::ports::ContentGenerationService;

    let outline_id = Uuid::new_v4();
    let store = FakeContentStore::default();
    let generator = FakeGenerator::new();

    for scope in [
        ScopeKey::module(outline_id, 0),
        ScopeKey::lesson(outline_id, 0, 0),
    ] {
        let mut session = WorkflowSession::open(
            scope,
            ScopeMeta {
                course_title: "API Design".into(),
                course_description: "Designing HTTP APIs well".into(),
                module_title: "Intro to APIs".into(),
                module_description: "Foundations".into(),
                lesson_title: scope.is_lesson().then(|| "What is an API?".to_string()),
            },
            GenerationSettings::default(),
        );
        analyze(&mut session);
        let (ticket, request) = session.prepare_generation().unwrap();
        let payload = generator.generate(&request).await.unwrap();
        store.upsert(&request.scope, &request.module_title, payload.clone());
        session.apply_generation(ticket, &payload);
    }

    // Module record and lesson record live under distinct keys.
    assert_eq!(store.len(), 2);
}
