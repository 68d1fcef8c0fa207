//! BacklogStorage trait implementation for in-memory storage.
//!
//! Every method acquires the storage mutex exactly once and performs its
//! whole operation under it; that lock is the transaction boundary the
//! dependency service and the scheduler rely on.

use super::graph::{
    blockers_of, has_incomplete_dependency_impl, incoming_ids, outgoing_ids, would_close_cycle,
};
use super::sorting::sort_candidates;
use super::InMemoryStorage;
use crate::domain::{
    self, AcceptanceCriterion, Comment, Epic, EpicId, EpicStatus, NewEpic, NewStory, Story,
    StoryFilter, StoryId, StoryStatus, StoryUpdate, TaskItem,
};
use crate::error::{Error, Result};
use crate::storage::BacklogStorage;
use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

#[async_trait]
impl BacklogStorage for InMemoryStorage {
    async fn create_epic(&mut self, new_epic: NewEpic) -> Result<Epic> {
        let mut inner = self.lock().await;

        new_epic.validate()?;

        let id = EpicId::new(inner.generate_id(&new_epic.title, &new_epic.description)?);
        let now = Utc::now();

        let epic = Epic {
            id: id.clone(),
            title: new_epic.title,
            description: new_epic.description,
            status: EpicStatus::Draft,
            created_at: now,
            updated_at: now,
        };

        inner.epics.insert(id, epic.clone());
        Ok(epic)
    }

    async fn get_epic(&self, id: &EpicId) -> Result<Option<Epic>> {
        let inner = self.lock().await;
        Ok(inner.epics.get(id).cloned())
    }

    async fn list_epics(&self) -> Result<Vec<Epic>> {
        let inner = self.lock().await;
        let mut epics: Vec<Epic> = inner.epics.values().cloned().collect();
        epics.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(epics)
    }

    async fn set_epic_status(&mut self, id: &EpicId, status: EpicStatus) -> Result<Epic> {
        let mut inner = self.lock().await;

        let epic = inner
            .epics
            .get_mut(id)
            .ok_or_else(|| Error::EpicNotFound(id.clone()))?;

        epic.status = status;
        epic.updated_at = Utc::now();

        Ok(epic.clone())
    }

    async fn create_story(&mut self, new_story: NewStory) -> Result<Story> {
        let mut inner = self.lock().await;

        new_story.validate()?;

        if !inner.epics.contains_key(&new_story.epic_id) {
            return Err(Error::EpicNotFound(new_story.epic_id.clone()));
        }

        let id = StoryId::new(inner.generate_id(&new_story.title, &new_story.description)?);
        let now = Utc::now();

        let story = Story {
            id: id.clone(),
            epic_id: new_story.epic_id,
            title: new_story.title,
            description: new_story.description,
            status: StoryStatus::Todo,
            priority: new_story.priority,
            tasks: vec![],
            acceptance_criteria: vec![],
            comments: vec![],
            depends_on: vec![],
            created_at: now,
            updated_at: now,
        };

        let node = inner.graph.add_node(id.clone());
        inner.node_map.insert(id.clone(), node);
        inner.stories.insert(id, story.clone());

        Ok(story)
    }

    async fn get_story(&self, id: &StoryId) -> Result<Option<Story>> {
        let inner = self.lock().await;
        Ok(inner.stories.get(id).cloned())
    }

    async fn story_exists(&self, id: &StoryId) -> Result<bool> {
        let inner = self.lock().await;
        Ok(inner.stories.contains_key(id))
    }

    async fn update_story(&mut self, id: &StoryId, updates: StoryUpdate) -> Result<Story> {
        let mut inner = self.lock().await;

        // Validate before touching the stored story so a rejected update
        // leaves prior state intact
        if let Some(title) = &updates.title {
            domain::validate_title(title)?;
        }
        if let Some(description) = &updates.description {
            domain::validate_body("description", description)?;
        }

        let story = inner
            .stories
            .get_mut(id)
            .ok_or_else(|| Error::StoryNotFound(id.clone()))?;

        if let Some(title) = updates.title {
            story.title = title;
        }
        if let Some(description) = updates.description {
            story.description = description;
        }
        if let Some(status) = updates.status {
            story.status = status;
        }
        if let Some(priority) = updates.priority {
            story.priority = priority;
        }

        story.updated_at = Utc::now();

        Ok(story.clone())
    }

    async fn list_stories(&self, filter: &StoryFilter) -> Result<Vec<Story>> {
        let inner = self.lock().await;

        let mut stories: Vec<Story> = inner
            .stories
            .values()
            .filter(|story| {
                if let Some(status) = filter.status {
                    if story.status != status {
                        return false;
                    }
                }
                if let Some(epic_id) = &filter.epic_id {
                    if &story.epic_id != epic_id {
                        return false;
                    }
                }
                if let Some(priority) = filter.priority {
                    if story.priority != priority {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        // Most recent first; id keeps equal timestamps deterministic
        stories.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        if let Some(limit) = filter.limit {
            stories.truncate(limit);
        }

        Ok(stories)
    }

    async fn add_task(&mut self, id: &StoryId, description: &str) -> Result<Story> {
        let mut inner = self.lock().await;

        if description.trim().is_empty() {
            return Err(Error::Validation(
                "task description must not be empty".to_string(),
            ));
        }
        domain::validate_body("task description", description)?;

        let story = inner
            .stories
            .get_mut(id)
            .ok_or_else(|| Error::StoryNotFound(id.clone()))?;

        let order = u32::try_from(story.tasks.len()).unwrap_or(u32::MAX);
        story.tasks.push(TaskItem {
            id: format!("t{}", order + 1),
            order,
            description: description.to_string(),
            done: false,
        });
        story.updated_at = Utc::now();

        Ok(story.clone())
    }

    async fn complete_task(&mut self, id: &StoryId, task_id: &str) -> Result<Story> {
        let mut inner = self.lock().await;

        let story = inner
            .stories
            .get_mut(id)
            .ok_or_else(|| Error::StoryNotFound(id.clone()))?;

        let task = story
            .tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| Error::Validation(format!("unknown task id: {task_id}")))?;

        // Idempotent if already done
        if !task.done {
            task.done = true;
            story.updated_at = Utc::now();
        }

        Ok(story.clone())
    }

    async fn add_acceptance_criterion(&mut self, id: &StoryId, text: &str) -> Result<Story> {
        let mut inner = self.lock().await;

        if text.trim().is_empty() {
            return Err(Error::Validation(
                "acceptance criterion must not be empty".to_string(),
            ));
        }
        domain::validate_body("acceptance criterion", text)?;

        let story = inner
            .stories
            .get_mut(id)
            .ok_or_else(|| Error::StoryNotFound(id.clone()))?;

        let order = u32::try_from(story.acceptance_criteria.len()).unwrap_or(u32::MAX);
        story.acceptance_criteria.push(AcceptanceCriterion {
            id: format!("ac{}", order + 1),
            order,
            text: text.to_string(),
            met: false,
        });
        story.updated_at = Utc::now();

        Ok(story.clone())
    }

    async fn add_comment(&mut self, id: &StoryId, author: &str, body: &str) -> Result<Story> {
        let mut inner = self.lock().await;

        if author.trim().is_empty() {
            return Err(Error::Validation("author must not be empty".to_string()));
        }
        domain::validate_body("comment body", body)?;

        let story = inner
            .stories
            .get_mut(id)
            .ok_or_else(|| Error::StoryNotFound(id.clone()))?;

        let now = Utc::now();
        story.comments.push(Comment {
            id: format!("c{}", story.comments.len() + 1),
            author: author.to_string(),
            body: body.to_string(),
            created_at: now,
        });
        story.updated_at = now;

        Ok(story.clone())
    }

    async fn add_dependency(&mut self, from: &StoryId, to: &StoryId) -> Result<()> {
        let mut inner = self.lock().await;

        // Check order is part of the contract: validation, existence,
        // self-reference, duplicate, cycle. All under one lock so the edge
        // set observed by the cycle check cannot change before the insert.
        if from.as_str().is_empty() || to.as_str().is_empty() {
            return Err(Error::Validation(
                "story ids must not be empty".to_string(),
            ));
        }

        if !inner.stories.contains_key(from) {
            return Err(Error::StoryNotFound(from.clone()));
        }
        if !inner.stories.contains_key(to) {
            return Err(Error::StoryNotFound(to.clone()));
        }

        if from == to {
            return Err(Error::Validation(format!(
                "story {from} cannot depend on itself"
            )));
        }

        let from_node = inner.node_map[from];
        let to_node = inner.node_map[to];

        if inner.graph.find_edge(from_node, to_node).is_some() {
            return Err(Error::DuplicateDependency {
                from: from.clone(),
                to: to.clone(),
            });
        }

        if would_close_cycle(&inner.graph, &inner.node_map, from, to)? {
            return Err(Error::CircularDependency {
                from: from.clone(),
                to: to.clone(),
            });
        }

        inner.graph.add_edge(from_node, to_node, ());

        // Mirror the edge on the story for serialization
        let story = inner
            .stories
            .get_mut(from)
            .ok_or_else(|| Error::StoryNotFound(from.clone()))?;
        story.depends_on.push(to.clone());
        story.updated_at = Utc::now();

        Ok(())
    }

    async fn remove_dependency(&mut self, from: &StoryId, to: &StoryId) -> Result<bool> {
        let mut inner = self.lock().await;

        let from_node = *inner
            .node_map
            .get(from)
            .ok_or_else(|| Error::StoryNotFound(from.clone()))?;
        let to_node = *inner
            .node_map
            .get(to)
            .ok_or_else(|| Error::StoryNotFound(to.clone()))?;

        let Some(edge) = inner.graph.find_edge(from_node, to_node) else {
            return Ok(false);
        };

        inner.graph.remove_edge(edge);

        let story = inner
            .stories
            .get_mut(from)
            .ok_or_else(|| Error::StoryNotFound(from.clone()))?;
        story.depends_on.retain(|dep| dep != to);
        story.updated_at = Utc::now();

        Ok(true)
    }

    async fn dependencies_of(&self, id: &StoryId) -> Result<Vec<StoryId>> {
        let inner = self.lock().await;

        let node = *inner
            .node_map
            .get(id)
            .ok_or_else(|| Error::StoryNotFound(id.clone()))?;

        Ok(outgoing_ids(&inner.graph, node))
    }

    async fn dependents_of(&self, id: &StoryId) -> Result<Vec<StoryId>> {
        let inner = self.lock().await;

        let node = *inner
            .node_map
            .get(id)
            .ok_or_else(|| Error::StoryNotFound(id.clone()))?;

        Ok(incoming_ids(&inner.graph, node))
    }

    async fn has_incomplete_dependency(&self, id: &StoryId) -> Result<bool> {
        let inner = self.lock().await;

        let node = *inner
            .node_map
            .get(id)
            .ok_or_else(|| Error::StoryNotFound(id.clone()))?;

        Ok(has_incomplete_dependency_impl(
            &inner.graph,
            &inner.stories,
            node,
        ))
    }

    async fn would_cycle(&self, from: &StoryId, to: &StoryId) -> Result<bool> {
        let inner = self.lock().await;

        if !inner.stories.contains_key(from) {
            return Err(Error::StoryNotFound(from.clone()));
        }
        if !inner.stories.contains_key(to) {
            return Err(Error::StoryNotFound(to.clone()));
        }

        would_close_cycle(&inner.graph, &inner.node_map, from, to)
    }

    async fn next_ready_story(&mut self) -> Result<Option<Story>> {
        let mut inner = self.lock().await;

        let mut candidates: Vec<Story> = inner
            .stories
            .values()
            .filter(|story| story.status == StoryStatus::Todo)
            .cloned()
            .collect();
        sort_candidates(&mut candidates);

        for candidate in &candidates {
            let Some(&node) = inner.node_map.get(&candidate.id) else {
                continue;
            };

            if has_incomplete_dependency_impl(&inner.graph, &inner.stories, node) {
                continue;
            }

            // Conditional claim: succeeds only if the story is still Todo at
            // the moment of the write. A lost claim moves on to the next
            // candidate instead of returning a story someone else holds.
            if inner.claim_if_todo(&candidate.id) {
                return Ok(inner.stories.get(&candidate.id).cloned());
            }
        }

        Ok(None)
    }

    async fn ready_stories(&self) -> Result<Vec<Story>> {
        let inner = self.lock().await;

        let mut ready: Vec<Story> = inner
            .stories
            .values()
            .filter(|story| {
                if story.status != StoryStatus::Todo {
                    return false;
                }
                inner.node_map.get(&story.id).is_some_and(|&node| {
                    !has_incomplete_dependency_impl(&inner.graph, &inner.stories, node)
                })
            })
            .cloned()
            .collect();

        sort_candidates(&mut ready);
        Ok(ready)
    }

    async fn blocked_stories(&self) -> Result<Vec<(Story, Vec<Story>)>> {
        let inner = self.lock().await;

        let mut blocked: Vec<(Story, Vec<Story>)> = inner
            .stories
            .values()
            .filter(|story| story.status != StoryStatus::Done)
            .filter_map(|story| {
                let &node = inner.node_map.get(&story.id)?;
                let blockers = blockers_of(&inner.graph, &inner.stories, node);
                if blockers.is_empty() {
                    None
                } else {
                    Some((story.clone(), blockers))
                }
            })
            .collect();

        blocked.sort_by(|a, b| a.0.id.cmp(&b.0.id));
        Ok(blocked)
    }

    async fn import_records(&mut self, epics: Vec<Epic>, stories: Vec<Story>) -> Result<()> {
        let mut inner = self.lock().await;

        for epic in epics {
            inner.id_generator.register_id(epic.id.as_str().to_string());
            inner.epics.insert(epic.id.clone(), epic);
        }

        // First pass: stories and graph nodes
        for story in &stories {
            let node = inner.graph.add_node(story.id.clone());
            inner.node_map.insert(story.id.clone(), node);
            inner
                .id_generator
                .register_id(story.id.as_str().to_string());
            inner.stories.insert(story.id.clone(), story.clone());
        }

        // Second pass: edges, once every endpoint is present, screened the
        // same way `add_dependency` screens live inserts. Orphaned, self,
        // duplicate, and cycle-closing edges are dropped so a bulk import
        // can never materialize a graph the service would have refused.
        for story in &stories {
            for dep in &story.depends_on {
                if dep == &story.id || !inner.node_map.contains_key(dep) {
                    warn!(from = %story.id, to = %dep, "Dropping invalid edge during import");
                    continue;
                }

                let from_node = inner.node_map[&story.id];
                let to_node = inner.node_map[dep];

                if inner.graph.find_edge(from_node, to_node).is_some() {
                    continue;
                }

                if would_close_cycle(&inner.graph, &inner.node_map, &story.id, dep)? {
                    warn!(from = %story.id, to = %dep, "Dropping cycle-closing edge during import");
                    continue;
                }

                inner.graph.add_edge(from_node, to_node, ());
            }
        }

        // Rebuild each mirror from the edges that survived screening
        let ids: Vec<StoryId> = inner.stories.keys().cloned().collect();
        for id in ids {
            let deps = outgoing_ids(&inner.graph, inner.node_map[&id]);
            if let Some(story) = inner.stories.get_mut(&id) {
                story.depends_on = deps;
            }
        }

        Ok(())
    }

    async fn export_records(&self) -> Result<(Vec<Epic>, Vec<Story>)> {
        let inner = self.lock().await;
        Ok((
            inner.epics.values().cloned().collect(),
            inner.stories.values().cloned().collect(),
        ))
    }

    async fn save(&self) -> Result<()> {
        // Plain in-memory storage has no backing file
        Ok(())
    }

    async fn reload(&mut self) -> Result<()> {
        // Plain in-memory storage has nothing to reload from
        Ok(())
    }
}
