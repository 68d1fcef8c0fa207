//! Integration tests for in-memory storage.
//!
//! These tests verify the full functionality of the in-memory storage
//! backend, including epic/story CRUD, sub-record operations, dependency
//! management with its observable check order, and cycle detection.

use backlog::domain::{
    Epic, EpicId, EpicStatus, NewEpic, NewStory, Story, StoryFilter, StoryId, StoryStatus,
    StoryUpdate,
};
use backlog::error::Error;
use backlog::storage::in_memory::new_in_memory_storage;
use backlog::storage::BacklogStorage;
use chrono::Utc;

fn new_epic(title: &str) -> NewEpic {
    NewEpic {
        title: title.to_string(),
        description: "Test epic".to_string(),
    }
}

fn new_story(epic_id: &EpicId, title: &str) -> NewStory {
    NewStory {
        epic_id: epic_id.clone(),
        title: title.to_string(),
        description: "Test description".to_string(),
        priority: 0,
    }
}

/// Storage pre-seeded with one epic, returned alongside the epic's id.
async fn storage_with_epic() -> (Box<dyn BacklogStorage>, EpicId) {
    let mut storage = new_in_memory_storage("test".to_string());
    let epic = storage.create_epic(new_epic("Test Epic")).await.unwrap();
    (storage, epic.id)
}

// ========== Epic CRUD ==========

#[tokio::test]
async fn test_create_epic() {
    let mut storage = new_in_memory_storage("test".to_string());

    let epic = storage.create_epic(new_epic("Payments")).await.unwrap();

    assert!(epic.id.as_str().starts_with("test-"));
    assert_eq!(epic.title, "Payments");
    assert_eq!(epic.status, EpicStatus::Draft);
    assert_eq!(epic.created_at, epic.updated_at);
}

#[tokio::test]
async fn test_create_epic_rejects_empty_title() {
    let mut storage = new_in_memory_storage("test".to_string());

    let result = storage.create_epic(new_epic("   ")).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_get_and_list_epics() {
    let mut storage = new_in_memory_storage("test".to_string());

    let created = storage.create_epic(new_epic("First")).await.unwrap();
    storage.create_epic(new_epic("Second")).await.unwrap();

    let retrieved = storage.get_epic(&created.id).await.unwrap();
    assert_eq!(retrieved.unwrap().title, "First");

    let missing = storage.get_epic(&EpicId::new("test-none")).await.unwrap();
    assert!(missing.is_none());

    let epics = storage.list_epics().await.unwrap();
    assert_eq!(epics.len(), 2);
}

#[tokio::test]
async fn test_set_epic_status() {
    let (mut storage, epic_id) = storage_with_epic().await;

    let epic = storage
        .set_epic_status(&epic_id, EpicStatus::Ready)
        .await
        .unwrap();
    assert_eq!(epic.status, EpicStatus::Ready);

    // Any transition is allowed, including back to draft
    let epic = storage
        .set_epic_status(&epic_id, EpicStatus::Draft)
        .await
        .unwrap();
    assert_eq!(epic.status, EpicStatus::Draft);

    let result = storage
        .set_epic_status(&EpicId::new("test-none"), EpicStatus::Done)
        .await;
    assert!(matches!(result, Err(Error::EpicNotFound(_))));
}

// ========== Story CRUD ==========

#[tokio::test]
async fn test_create_story() {
    let (mut storage, epic_id) = storage_with_epic().await;

    let story = storage
        .create_story(new_story(&epic_id, "Test Story"))
        .await
        .unwrap();

    assert!(story.id.as_str().starts_with("test-"));
    assert_eq!(story.epic_id, epic_id);
    assert_eq!(story.status, StoryStatus::Todo);
    assert_eq!(story.priority, 0);
    assert!(story.depends_on.is_empty());
    assert!(storage.story_exists(&story.id).await.unwrap());
}

#[tokio::test]
async fn test_create_story_requires_epic() {
    let mut storage = new_in_memory_storage("test".to_string());

    let result = storage
        .create_story(new_story(&EpicId::new("test-none"), "Orphan"))
        .await;
    assert!(matches!(result, Err(Error::EpicNotFound(_))));
}

#[tokio::test]
async fn test_get_story() {
    let (mut storage, epic_id) = storage_with_epic().await;

    let created = storage
        .create_story(new_story(&epic_id, "Test Story"))
        .await
        .unwrap();

    let retrieved = storage.get_story(&created.id).await.unwrap();
    assert_eq!(retrieved.unwrap().title, "Test Story");

    let missing = storage
        .get_story(&StoryId::new("test-nonexistent"))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_update_story() {
    let (mut storage, epic_id) = storage_with_epic().await;

    let created = storage
        .create_story(new_story(&epic_id, "Original Title"))
        .await
        .unwrap();

    let updates = StoryUpdate {
        title: Some("Updated Title".to_string()),
        status: Some(StoryStatus::InProgress),
        priority: Some(7),
        ..Default::default()
    };

    let updated = storage.update_story(&created.id, updates).await.unwrap();
    assert_eq!(updated.title, "Updated Title");
    assert_eq!(updated.status, StoryStatus::InProgress);
    assert_eq!(updated.priority, 7);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);
}

#[tokio::test]
async fn test_update_story_rejects_invalid_fields_atomically() {
    let (mut storage, epic_id) = storage_with_epic().await;

    let created = storage
        .create_story(new_story(&epic_id, "Original"))
        .await
        .unwrap();

    // An invalid title rejects the whole update, valid fields included
    let updates = StoryUpdate {
        title: Some("  ".to_string()),
        priority: Some(9),
        ..Default::default()
    };
    let result = storage.update_story(&created.id, updates).await;
    assert!(matches!(result, Err(Error::Validation(_))));

    let stored = storage.get_story(&created.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Original");
    assert_eq!(stored.priority, 0);
}

#[tokio::test]
async fn test_update_missing_story() {
    let mut storage = new_in_memory_storage("test".to_string());

    let result = storage
        .update_story(&StoryId::new("test-none"), StoryUpdate::default())
        .await;
    assert!(matches!(result, Err(Error::StoryNotFound(_))));
}

#[tokio::test]
async fn test_list_stories_filters() {
    let (mut storage, epic_a) = storage_with_epic().await;
    let epic_b = storage.create_epic(new_epic("Other Epic")).await.unwrap().id;

    let s1 = storage
        .create_story(new_story(&epic_a, "A one"))
        .await
        .unwrap();
    storage
        .create_story(new_story(&epic_a, "A two"))
        .await
        .unwrap();
    let mut in_b = new_story(&epic_b, "B one");
    in_b.priority = 5;
    storage.create_story(in_b).await.unwrap();

    storage
        .update_story(
            &s1.id,
            StoryUpdate {
                status: Some(StoryStatus::Done),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let done = storage
        .list_stories(&StoryFilter {
            status: Some(StoryStatus::Done),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, s1.id);

    let in_a = storage
        .list_stories(&StoryFilter {
            epic_id: Some(epic_a.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(in_a.len(), 2);

    let high = storage
        .list_stories(&StoryFilter {
            priority: Some(5),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(high.len(), 1);
    assert_eq!(high[0].title, "B one");

    let limited = storage
        .list_stories(&StoryFilter {
            limit: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);
}

// ========== Sub-records ==========

#[tokio::test]
async fn test_tasks_lifecycle() {
    let (mut storage, epic_id) = storage_with_epic().await;
    let story = storage
        .create_story(new_story(&epic_id, "With tasks"))
        .await
        .unwrap();

    let story = storage
        .add_task(&story.id, "Write the parser")
        .await
        .unwrap();
    let story = storage
        .add_task(&story.id, "Write the printer")
        .await
        .unwrap();

    assert_eq!(story.tasks.len(), 2);
    assert_eq!(story.tasks[0].order, 0);
    assert_eq!(story.tasks[1].order, 1);
    assert!(!story.tasks[0].done);

    let task_id = story.tasks[0].id.clone();
    let story = storage.complete_task(&story.id, &task_id).await.unwrap();
    assert!(story.tasks[0].done);

    // Completing again is idempotent
    let story = storage.complete_task(&story.id, &task_id).await.unwrap();
    assert!(story.tasks[0].done);

    let result = storage.complete_task(&story.id, "t99").await;
    assert!(matches!(result, Err(Error::Validation(_))));

    let result = storage.add_task(&story.id, "   ").await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_acceptance_criteria_and_comments() {
    let (mut storage, epic_id) = storage_with_epic().await;
    let story = storage
        .create_story(new_story(&epic_id, "With extras"))
        .await
        .unwrap();

    let story = storage
        .add_acceptance_criterion(&story.id, "Login succeeds with valid credentials")
        .await
        .unwrap();
    assert_eq!(story.acceptance_criteria.len(), 1);
    assert_eq!(story.acceptance_criteria[0].order, 0);
    assert!(!story.acceptance_criteria[0].met);

    let story = storage
        .add_comment(&story.id, "sam", "Should we support SSO?")
        .await
        .unwrap();
    assert_eq!(story.comments.len(), 1);
    assert_eq!(story.comments[0].author, "sam");

    let result = storage.add_comment(&story.id, "  ", "anonymous").await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

// ========== Dependency service ==========

#[tokio::test]
async fn test_add_dependency() {
    let (mut storage, epic_id) = storage_with_epic().await;
    let api = storage
        .create_story(new_story(&epic_id, "API"))
        .await
        .unwrap();
    let ui = storage
        .create_story(new_story(&epic_id, "UI"))
        .await
        .unwrap();

    storage.add_dependency(&ui.id, &api.id).await.unwrap();

    let deps = storage.dependencies_of(&ui.id).await.unwrap();
    assert_eq!(deps, vec![api.id.clone()]);

    let dependents = storage.dependents_of(&api.id).await.unwrap();
    assert_eq!(dependents, vec![ui.id.clone()]);

    // The edge is mirrored on the story record
    let stored = storage.get_story(&ui.id).await.unwrap().unwrap();
    assert_eq!(stored.depends_on, vec![api.id]);
}

#[tokio::test]
async fn test_dependency_check_order_empty_before_existence() {
    let (mut storage, _epic_id) = storage_with_epic().await;

    // Empty ids fail validation before any lookup happens
    let result = storage
        .add_dependency(&StoryId::new(""), &StoryId::new("test-none"))
        .await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_dependency_check_order_existence_before_self_reference() {
    let (mut storage, _epic_id) = storage_with_epic().await;

    // A self-edge on a missing story reports the missing story, not the
    // self-reference
    let ghost = StoryId::new("test-ghost");
    let result = storage.add_dependency(&ghost, &ghost).await;
    assert!(matches!(result, Err(Error::StoryNotFound(_))));
}

#[tokio::test]
async fn test_dependency_rejects_self_reference() {
    let (mut storage, epic_id) = storage_with_epic().await;
    let story = storage
        .create_story(new_story(&epic_id, "Loner"))
        .await
        .unwrap();

    let result = storage.add_dependency(&story.id, &story.id).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_dependency_rejects_duplicate() {
    let (mut storage, epic_id) = storage_with_epic().await;
    let a = storage.create_story(new_story(&epic_id, "A")).await.unwrap();
    let b = storage.create_story(new_story(&epic_id, "B")).await.unwrap();

    storage.add_dependency(&a.id, &b.id).await.unwrap();

    let result = storage.add_dependency(&a.id, &b.id).await;
    assert!(matches!(result, Err(Error::DuplicateDependency { .. })));

    // The reverse edge is a cycle, not a duplicate
    let result = storage.add_dependency(&b.id, &a.id).await;
    assert!(matches!(result, Err(Error::CircularDependency { .. })));
}

#[tokio::test]
async fn test_dependency_rejects_transitive_cycle() {
    let (mut storage, epic_id) = storage_with_epic().await;
    let a = storage.create_story(new_story(&epic_id, "A")).await.unwrap();
    let b = storage.create_story(new_story(&epic_id, "B")).await.unwrap();
    let c = storage.create_story(new_story(&epic_id, "C")).await.unwrap();

    storage.add_dependency(&a.id, &b.id).await.unwrap();
    storage.add_dependency(&b.id, &c.id).await.unwrap();

    let result = storage.add_dependency(&c.id, &a.id).await;
    assert!(matches!(result, Err(Error::CircularDependency { .. })));

    // The failed insert left no partial state behind
    let deps = storage.dependencies_of(&c.id).await.unwrap();
    assert!(deps.is_empty());

    // A redundant shortcut along the same direction is fine
    storage.add_dependency(&a.id, &c.id).await.unwrap();
}

#[tokio::test]
async fn test_would_cycle_is_pure() {
    let (mut storage, epic_id) = storage_with_epic().await;
    let a = storage.create_story(new_story(&epic_id, "A")).await.unwrap();
    let b = storage.create_story(new_story(&epic_id, "B")).await.unwrap();

    storage.add_dependency(&a.id, &b.id).await.unwrap();

    assert!(storage.would_cycle(&b.id, &a.id).await.unwrap());
    assert!(storage.would_cycle(&a.id, &a.id).await.unwrap());
    assert!(!storage.would_cycle(&a.id, &b.id).await.unwrap());

    // Asking changed nothing
    let deps = storage.dependencies_of(&b.id).await.unwrap();
    assert!(deps.is_empty());

    let result = storage.would_cycle(&a.id, &StoryId::new("test-none")).await;
    assert!(matches!(result, Err(Error::StoryNotFound(_))));
}

#[tokio::test]
async fn test_remove_dependency() {
    let (mut storage, epic_id) = storage_with_epic().await;
    let a = storage.create_story(new_story(&epic_id, "A")).await.unwrap();
    let b = storage.create_story(new_story(&epic_id, "B")).await.unwrap();

    storage.add_dependency(&a.id, &b.id).await.unwrap();

    assert!(storage.remove_dependency(&a.id, &b.id).await.unwrap());
    assert!(storage.dependencies_of(&a.id).await.unwrap().is_empty());

    // Absent edge is not an error
    assert!(!storage.remove_dependency(&a.id, &b.id).await.unwrap());

    // After removal the reverse direction is insertable again
    storage.add_dependency(&b.id, &a.id).await.unwrap();

    let result = storage
        .remove_dependency(&a.id, &StoryId::new("test-none"))
        .await;
    assert!(matches!(result, Err(Error::StoryNotFound(_))));
}

#[tokio::test]
async fn test_has_incomplete_dependency() {
    let (mut storage, epic_id) = storage_with_epic().await;
    let a = storage.create_story(new_story(&epic_id, "A")).await.unwrap();
    let b = storage.create_story(new_story(&epic_id, "B")).await.unwrap();

    assert!(!storage.has_incomplete_dependency(&a.id).await.unwrap());

    storage.add_dependency(&a.id, &b.id).await.unwrap();
    assert!(storage.has_incomplete_dependency(&a.id).await.unwrap());

    // In progress still blocks; only done satisfies
    storage
        .update_story(
            &b.id,
            StoryUpdate {
                status: Some(StoryStatus::InProgress),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(storage.has_incomplete_dependency(&a.id).await.unwrap());

    storage
        .update_story(
            &b.id,
            StoryUpdate {
                status: Some(StoryStatus::Done),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!storage.has_incomplete_dependency(&a.id).await.unwrap());
}

// ========== Batch import ==========

fn epic_record(id: &str) -> Epic {
    let now = Utc::now();
    Epic {
        id: EpicId::new(id),
        title: format!("Epic {id}"),
        description: String::new(),
        status: EpicStatus::InProgress,
        created_at: now,
        updated_at: now,
    }
}

fn story_record(id: &str, depends_on: &[&str]) -> Story {
    let now = Utc::now();
    Story {
        id: StoryId::new(id),
        epic_id: EpicId::new("test-epic"),
        title: format!("Story {id}"),
        description: String::new(),
        status: StoryStatus::Todo,
        priority: 0,
        tasks: vec![],
        acceptance_criteria: vec![],
        comments: vec![],
        depends_on: depends_on.iter().copied().map(StoryId::new).collect(),
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn test_import_screens_cycle_closing_edges() {
    let mut storage = new_in_memory_storage("test".to_string());

    // The input claims a and b depend on each other; at most one of those
    // edges can be admitted
    storage
        .import_records(
            vec![epic_record("test-epic")],
            vec![
                story_record("test-a", &["test-b"]),
                story_record("test-b", &["test-a"]),
            ],
        )
        .await
        .unwrap();

    let a_deps = storage
        .dependencies_of(&StoryId::new("test-a"))
        .await
        .unwrap();
    let b_deps = storage
        .dependencies_of(&StoryId::new("test-b"))
        .await
        .unwrap();
    assert_eq!(a_deps.len() + b_deps.len(), 1);

    // The scheduler can drain the imported set instead of starving
    let first = storage.next_ready_story().await.unwrap().unwrap();
    assert_eq!(first.id.as_str(), "test-b");

    storage
        .update_story(
            &first.id,
            StoryUpdate {
                status: Some(StoryStatus::Done),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let second = storage.next_ready_story().await.unwrap().unwrap();
    assert_eq!(second.id.as_str(), "test-a");
}

#[tokio::test]
async fn test_import_drops_orphaned_self_and_duplicate_edges() {
    let mut storage = new_in_memory_storage("test".to_string());

    storage
        .import_records(
            vec![epic_record("test-epic")],
            vec![
                story_record("test-s1", &["test-s2", "test-s2", "test-s1", "test-missing"]),
                story_record("test-s2", &[]),
            ],
        )
        .await
        .unwrap();

    // Only the one real edge survives, in both the graph and the mirror
    let deps = storage
        .dependencies_of(&StoryId::new("test-s1"))
        .await
        .unwrap();
    assert_eq!(deps, vec![StoryId::new("test-s2")]);

    let stored = storage
        .get_story(&StoryId::new("test-s1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.depends_on, vec![StoryId::new("test-s2")]);
}
