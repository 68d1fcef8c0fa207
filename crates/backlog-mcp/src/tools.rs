//! MCP tool implementations.
//!
//! This module contains the implementations for all MCP tools exposed by the
//! server. Every mutating tool persists via `save()` before returning, so a
//! crashed server never loses an acknowledged write.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::models::{
    parse_epic_status, parse_story_status, BlockedStoryResponse, McpEpic, McpStory,
    SetContextResponse, WhereAmIResponse,
};
use backlog::domain::{EpicId, NewEpic, NewStory, StoryFilter, StoryId, StoryUpdate};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Tool implementations for the backlog MCP server.
pub struct Tools {
    context: Arc<RwLock<Context>>,
}

impl Tools {
    /// Create a new Tools instance with the given context.
    pub fn new(context: Arc<RwLock<Context>>) -> Self {
        Self { context }
    }

    /// Set the workspace context.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace path is invalid or has no
    /// `.backlog/` directory.
    pub async fn set_context(&self, workspace_root: &str) -> Result<SetContextResponse> {
        let path = Path::new(workspace_root);
        let mut context = self.context.write().await;
        let info = context.set_workspace(path).await?;

        Ok(SetContextResponse {
            workspace_root: info.workspace_root.display().to_string(),
            data_path: info.data_path.display().to_string(),
            message: "Context set successfully".to_string(),
        })
    }

    /// Get current workspace information.
    ///
    /// # Errors
    ///
    /// This function does not currently return errors but returns `Result`
    /// for API consistency.
    pub async fn where_am_i(&self) -> Result<WhereAmIResponse> {
        let context = self.context.read().await;

        match context.current_workspace() {
            Some(workspace) => {
                let data_path = context.current_data_path();

                Ok(WhereAmIResponse {
                    workspace_root: Some(workspace.display().to_string()),
                    data_path: data_path.map(|p| p.display().to_string()),
                    context_set: true,
                })
            }
            None => Ok(WhereAmIResponse {
                workspace_root: None,
                data_path: None,
                context_set: false,
            }),
        }
    }

    /// Create a new epic.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, validation fails, or storage
    /// operations fail.
    pub async fn create_epic(
        &self,
        title: String,
        description: Option<String>,
        workspace_root: Option<&str>,
    ) -> Result<McpEpic> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let mut storage = storage.write().await;

        let new_epic = NewEpic {
            title,
            description: description.unwrap_or_default(),
        };

        let epic = storage.create_epic(new_epic).await?;
        storage.save().await?;
        Ok(epic.into())
    }

    /// Create a new story under an epic.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, the epic doesn't exist,
    /// validation fails, or storage operations fail.
    pub async fn create_story(
        &self,
        epic_id: &str,
        title: String,
        description: Option<String>,
        priority: Option<i32>,
        workspace_root: Option<&str>,
    ) -> Result<McpStory> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let mut storage = storage.write().await;

        let new_story = NewStory {
            epic_id: EpicId::new(epic_id),
            title,
            description: description.unwrap_or_default(),
            priority: priority.unwrap_or(0),
        };

        let story = storage.create_story(new_story).await?;
        storage.save().await?;
        Ok(story.into())
    }

    /// Show details for a specific story.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set or storage operations fail.
    pub async fn show(
        &self,
        story_id: &str,
        workspace_root: Option<&str>,
    ) -> Result<Option<McpStory>> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let storage = storage.read().await;

        let id = StoryId::new(story_id);
        let story = storage.get_story(&id).await?;
        Ok(story.map(Into::into))
    }

    /// List stories with optional filters.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for an unrecognized status filter,
    /// or an error if no context is set or storage operations fail.
    pub async fn list(
        &self,
        status: Option<&str>,
        epic_id: Option<&str>,
        priority: Option<i32>,
        limit: Option<usize>,
        workspace_root: Option<&str>,
    ) -> Result<Vec<McpStory>> {
        let status = match status {
            Some(s) => Some(parse_story_status(s).ok_or(Error::InvalidArgument {
                field: "status",
                value: s.to_string(),
                valid_values: "todo, in_progress, review, done",
            })?),
            None => None,
        };

        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let storage = storage.read().await;

        let filter = StoryFilter {
            status,
            epic_id: epic_id.map(EpicId::new),
            priority,
            limit,
        };

        let stories = storage.list_stories(&filter).await?;
        Ok(stories.into_iter().map(Into::into).collect())
    }

    /// Update an existing story.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for an unrecognized status, or an
    /// error if no context is set, the story is not found, or storage fails.
    pub async fn update(
        &self,
        story_id: &str,
        title: Option<String>,
        description: Option<String>,
        status: Option<&str>,
        priority: Option<i32>,
        workspace_root: Option<&str>,
    ) -> Result<McpStory> {
        let status = match status {
            Some(s) => Some(parse_story_status(s).ok_or(Error::InvalidArgument {
                field: "status",
                value: s.to_string(),
                valid_values: "todo, in_progress, review, done",
            })?),
            None => None,
        };

        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let mut storage = storage.write().await;

        let id = StoryId::new(story_id);
        let updates = StoryUpdate {
            title,
            description,
            status,
            priority,
        };

        let story = storage.update_story(&id, updates).await?;
        storage.save().await?;
        Ok(story.into())
    }

    /// Set an epic's status.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for an unrecognized status, or an
    /// error if no context is set, the epic is not found, or storage fails.
    pub async fn epic_status(
        &self,
        epic_id: &str,
        status: &str,
        workspace_root: Option<&str>,
    ) -> Result<McpEpic> {
        let status = parse_epic_status(status).ok_or(Error::InvalidArgument {
            field: "status",
            value: status.to_string(),
            valid_values: "draft, ready, in_progress, done, on_hold",
        })?;

        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let mut storage = storage.write().await;

        let id = EpicId::new(epic_id);
        let epic = storage.set_epic_status(&id, status).await?;
        storage.save().await?;
        Ok(epic.into())
    }

    /// Add a dependency between stories.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, either story is missing, the
    /// edge is a duplicate or would create a cycle, or storage fails.
    pub async fn dep(
        &self,
        story_id: &str,
        depends_on_id: &str,
        workspace_root: Option<&str>,
    ) -> Result<String> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let mut storage = storage.write().await;

        let from = StoryId::new(story_id);
        let to = StoryId::new(depends_on_id);

        storage.add_dependency(&from, &to).await?;
        storage.save().await?;

        Ok(format!(
            "Added dependency: {story_id} depends on {depends_on_id}"
        ))
    }

    /// Remove a dependency between stories.
    ///
    /// Removing an edge that doesn't exist is reported, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, either story is missing, or
    /// storage fails.
    pub async fn undep(
        &self,
        story_id: &str,
        depends_on_id: &str,
        workspace_root: Option<&str>,
    ) -> Result<String> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let mut storage = storage.write().await;

        let from = StoryId::new(story_id);
        let to = StoryId::new(depends_on_id);

        let removed = storage.remove_dependency(&from, &to).await?;
        storage.save().await?;

        if removed {
            Ok(format!(
                "Removed dependency: {story_id} no longer depends on {depends_on_id}"
            ))
        } else {
            Ok(format!(
                "No dependency from {story_id} on {depends_on_id} existed"
            ))
        }
    }

    /// Claim the next ready story.
    ///
    /// The returned story has already been moved to `in_progress`; `None`
    /// means nothing is ready right now.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set or storage operations fail.
    pub async fn next_ready(&self, workspace_root: Option<&str>) -> Result<Option<McpStory>> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let mut storage = storage.write().await;

        let story = storage.next_ready_story().await?;
        if story.is_some() {
            storage.save().await?;
        }
        Ok(story.map(Into::into))
    }

    /// Preview the ready queue without claiming anything.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set or storage operations fail.
    pub async fn ready(
        &self,
        limit: Option<usize>,
        workspace_root: Option<&str>,
    ) -> Result<Vec<McpStory>> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let storage = storage.read().await;

        let mut stories = storage.ready_stories().await?;
        if let Some(limit) = limit {
            stories.truncate(limit);
        }
        Ok(stories.into_iter().map(Into::into).collect())
    }

    /// Get blocked stories with their blockers.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set or storage operations fail.
    pub async fn blocked(&self, workspace_root: Option<&str>) -> Result<Vec<BlockedStoryResponse>> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let storage = storage.read().await;

        let blocked = storage.blocked_stories().await?;
        Ok(blocked
            .into_iter()
            .map(|(story, blockers)| BlockedStoryResponse {
                story: story.into(),
                blockers: blockers.into_iter().map(Into::into).collect(),
            })
            .collect())
    }

    /// Add a comment to a story.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, the story is not found,
    /// validation fails, or storage fails.
    pub async fn comment(
        &self,
        story_id: &str,
        author: &str,
        body: &str,
        workspace_root: Option<&str>,
    ) -> Result<McpStory> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let mut storage = storage.write().await;

        let id = StoryId::new(story_id);
        let story = storage.add_comment(&id, author, body).await?;
        storage.save().await?;
        Ok(story.into())
    }
}
