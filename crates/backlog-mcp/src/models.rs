//! MCP request parameters and response models.
//!
//! Parameter structs derive `JsonSchema` so rmcp can publish tool schemas;
//! response types wrap or flatten backlog domain types for MCP transport.

use backlog::domain::{
    AcceptanceCriterion, Comment, Epic, EpicStatus, Story, StoryStatus, TaskItem,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =========================================================================
// Tool parameters
// =========================================================================

/// Parameters for the `set_context` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetContextParams {
    /// Absolute path to the workspace root (directory containing `.backlog/`).
    pub workspace_root: String,
}

/// Parameters for the `create_epic` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateEpicParams {
    /// Epic title.
    pub title: String,

    /// Epic description.
    pub description: Option<String>,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `create_story` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateStoryParams {
    /// ID of the epic this story belongs to.
    pub epic_id: String,

    /// Story title.
    pub title: String,

    /// Story description.
    pub description: Option<String>,

    /// Priority; higher values are more urgent. Defaults to 0.
    pub priority: Option<i32>,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `show` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ShowParams {
    /// ID of the story to show.
    pub story_id: String,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `list` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListParams {
    /// Filter by status: todo, in_progress, review, done.
    pub status: Option<String>,

    /// Filter by owning epic.
    pub epic_id: Option<String>,

    /// Filter by exact priority.
    pub priority: Option<i32>,

    /// Maximum number of stories to return.
    pub limit: Option<usize>,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `update` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateParams {
    /// ID of the story to update.
    pub story_id: String,

    /// New title.
    pub title: Option<String>,

    /// New description.
    pub description: Option<String>,

    /// New status: todo, in_progress, review, done.
    pub status: Option<String>,

    /// New priority.
    pub priority: Option<i32>,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `epic_status` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EpicStatusParams {
    /// ID of the epic.
    pub epic_id: String,

    /// New status: draft, ready, in_progress, done, on_hold.
    pub status: String,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `dep` and `undep` tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DepParams {
    /// The story that depends on another.
    pub story_id: String,

    /// The story it depends on (must finish first).
    pub depends_on_id: String,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `next_ready` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NextReadyParams {
    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `ready` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadyParams {
    /// Maximum number of stories to return.
    pub limit: Option<usize>,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `blocked` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BlockedParams {
    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `comment` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CommentParams {
    /// ID of the story to comment on.
    pub story_id: String,

    /// Comment author.
    pub author: String,

    /// Comment body.
    pub body: String,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

// =========================================================================
// Responses
// =========================================================================

/// Response from the `set_context` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetContextResponse {
    /// The workspace root that was set.
    pub workspace_root: String,

    /// The path to the data file.
    pub data_path: String,

    /// Status message.
    pub message: String,
}

/// Response from the `where_am_i` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WhereAmIResponse {
    /// The current workspace root, if set.
    pub workspace_root: Option<String>,

    /// The current data file path, if set.
    pub data_path: Option<String>,

    /// Whether a context is currently set.
    pub context_set: bool,
}

/// Story representation for MCP responses.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpStory {
    /// Unique identifier.
    pub id: String,

    /// Owning epic.
    pub epic_id: String,

    /// Story title.
    pub title: String,

    /// Story description.
    pub description: String,

    /// Current status.
    pub status: String,

    /// Priority; higher values are more urgent.
    pub priority: i32,

    /// Checklist tasks.
    pub tasks: Vec<McpTask>,

    /// Acceptance criteria.
    pub acceptance_criteria: Vec<McpCriterion>,

    /// Comments.
    pub comments: Vec<McpComment>,

    /// IDs of stories this one depends on.
    pub depends_on: Vec<String>,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Last update timestamp (ISO 8601).
    pub updated_at: String,
}

impl From<Story> for McpStory {
    fn from(story: Story) -> Self {
        Self {
            id: story.id.to_string(),
            epic_id: story.epic_id.to_string(),
            title: story.title,
            description: story.description,
            status: story.status.as_str().to_string(),
            priority: story.priority,
            tasks: story.tasks.into_iter().map(Into::into).collect(),
            acceptance_criteria: story
                .acceptance_criteria
                .into_iter()
                .map(Into::into)
                .collect(),
            comments: story.comments.into_iter().map(Into::into).collect(),
            depends_on: story.depends_on.iter().map(ToString::to_string).collect(),
            created_at: story.created_at.to_rfc3339(),
            updated_at: story.updated_at.to_rfc3339(),
        }
    }
}

/// Epic representation for MCP responses.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpEpic {
    /// Unique identifier.
    pub id: String,

    /// Epic title.
    pub title: String,

    /// Epic description.
    pub description: String,

    /// Current status.
    pub status: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Last update timestamp (ISO 8601).
    pub updated_at: String,
}

impl From<Epic> for McpEpic {
    fn from(epic: Epic) -> Self {
        Self {
            id: epic.id.to_string(),
            title: epic.title,
            description: epic.description,
            status: epic.status.as_str().to_string(),
            created_at: epic.created_at.to_rfc3339(),
            updated_at: epic.updated_at.to_rfc3339(),
        }
    }
}

/// Checklist task representation for MCP responses.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpTask {
    /// Task identifier within the story.
    pub id: String,

    /// Position in the checklist.
    pub order: u32,

    /// What needs doing.
    pub description: String,

    /// Whether the task is done.
    pub done: bool,
}

impl From<TaskItem> for McpTask {
    fn from(task: TaskItem) -> Self {
        Self {
            id: task.id,
            order: task.order,
            description: task.description,
            done: task.done,
        }
    }
}

/// Acceptance criterion representation for MCP responses.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpCriterion {
    /// Criterion identifier within the story.
    pub id: String,

    /// Position in the list.
    pub order: u32,

    /// The criterion text.
    pub text: String,

    /// Whether the criterion has been met.
    pub met: bool,
}

impl From<AcceptanceCriterion> for McpCriterion {
    fn from(criterion: AcceptanceCriterion) -> Self {
        Self {
            id: criterion.id,
            order: criterion.order,
            text: criterion.text,
            met: criterion.met,
        }
    }
}

/// Comment representation for MCP responses.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpComment {
    /// Comment identifier within the story.
    pub id: String,

    /// Comment author.
    pub author: String,

    /// Comment body.
    pub body: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

impl From<Comment> for McpComment {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            author: comment.author,
            body: comment.body,
            created_at: comment.created_at.to_rfc3339(),
        }
    }
}

/// Blocked story response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BlockedStoryResponse {
    /// The blocked story.
    pub story: McpStory,

    /// Unfinished stories blocking this one.
    pub blockers: Vec<McpStory>,
}

// Parse helpers for string arguments

/// Parse a status string into a `StoryStatus`.
#[must_use]
pub fn parse_story_status(s: &str) -> Option<StoryStatus> {
    s.parse().ok()
}

/// Parse a status string into an `EpicStatus`.
#[must_use]
pub fn parse_epic_status(s: &str) -> Option<EpicStatus> {
    s.parse().ok()
}
